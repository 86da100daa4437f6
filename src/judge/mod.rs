//! The Robo Judge collaborator boundary.
//!
//! Supplies account snapshots, the security universe, and per-security
//! sentiment signals through one capability trait with two
//! implementations:
//! - `StubJudge`: in-process canned dataset
//! - `RemoteJudge`: networked client with endpoint + API key

mod remote;
mod stub;
mod traits;
mod types;

pub use remote::RemoteJudge;
pub use stub::StubJudge;
pub use traits::SignalSource;
pub use types::*;

#[cfg(test)]
pub use traits::MockSignalSource;
