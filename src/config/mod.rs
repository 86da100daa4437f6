//! Configuration management for the rebalancing engine.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Robo Judge collaborator selection and credentials
    #[serde(default)]
    pub judge: JudgeConfig,
    /// Engine tuning parameters
    #[serde(default)]
    pub engine: EngineConfig,
    /// Market impact curve constants
    #[serde(default)]
    pub impact: ImpactConfig,
    /// Order lifecycle parameters
    #[serde(default)]
    pub orders: OrderConfig,
}

/// Which signal source implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeMode {
    /// In-process canned dataset
    Stub,
    /// Networked Robo Judge client
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Signal source selection (stub or remote)
    #[serde(default = "default_judge_mode")]
    pub mode: JudgeMode,
    /// Base URL of the remote Robo Judge (remote mode only)
    #[serde(default)]
    pub base_url: String,
    /// API key sent as X-API-Key on every remote request
    #[serde(default)]
    pub api_key: String,
    /// Timeout applied to every Judge call, in seconds
    #[serde(default = "default_judge_timeout")]
    pub timeout_secs: u64,
}

/// How sentiment scores are rescaled into a weight-like distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// Shift by the minimum score and divide by the shifted sum
    Minmax,
    /// Softmax over the raw scores
    Softmax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sentiment-to-weight rescaling function
    #[serde(default = "default_normalization")]
    pub normalization: NormalizationMode,
    /// Iteration bound for the constraint projection loop
    #[serde(default = "default_max_projection_iterations")]
    pub max_projection_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// Asymptotic slippage fraction as participation grows
    #[serde(default = "default_impact_max")]
    pub impact_max: Decimal,
    /// Steepness of the logistic impact curve
    #[serde(default = "default_steepness")]
    pub steepness: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Seconds a proposed order stays acknowledgeable before lazy expiry
    #[serde(default = "default_order_ttl")]
    pub ttl_secs: u64,
    /// Tradable lot size; 1 = whole shares, smaller values allow fractional lots
    #[serde(default = "default_lot_size")]
    pub lot_size: Decimal,
}

// Default value functions
fn default_judge_mode() -> JudgeMode {
    JudgeMode::Stub
}

fn default_judge_timeout() -> u64 {
    10
}

fn default_normalization() -> NormalizationMode {
    NormalizationMode::Minmax
}

fn default_max_projection_iterations() -> u32 {
    50
}

fn default_impact_max() -> Decimal {
    Decimal::new(2, 3) // 0.002
}

fn default_steepness() -> Decimal {
    Decimal::new(4, 0) // 4.0
}

fn default_order_ttl() -> u64 {
    900 // 15 minutes
}

fn default_lot_size() -> Decimal {
    Decimal::ONE
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("ROBO"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.judge.timeout_secs >= 1,
            "judge timeout must be at least 1 second"
        );

        if self.judge.mode == JudgeMode::Remote {
            anyhow::ensure!(
                !self.judge.base_url.is_empty(),
                "remote judge mode requires a base_url"
            );
        }

        anyhow::ensure!(
            self.engine.max_projection_iterations >= 1,
            "max_projection_iterations must be at least 1"
        );

        anyhow::ensure!(
            self.impact.impact_max > Decimal::ZERO && self.impact.impact_max < Decimal::ONE,
            "impact_max must be between 0 and 1"
        );

        anyhow::ensure!(
            self.impact.steepness > Decimal::ZERO,
            "steepness must be positive"
        );

        anyhow::ensure!(
            self.orders.lot_size > Decimal::ZERO,
            "lot_size must be positive"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            judge: JudgeConfig::default(),
            engine: EngineConfig::default(),
            impact: ImpactConfig::default(),
            orders: OrderConfig::default(),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            mode: default_judge_mode(),
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_judge_timeout(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalization: default_normalization(),
            max_projection_iterations: default_max_projection_iterations(),
        }
    }
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            impact_max: default_impact_max(),
            steepness: default_steepness(),
        }
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_order_ttl(),
            lot_size: default_lot_size(),
        }
    }
}
