//! Constraint-aware projection of raw target weights.

use crate::engine::weights::WeightVector;
use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Per-request rebalance constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    /// Accounts to rebalance; empty means all accounts the Judge serves
    #[serde(default)]
    pub account_ids: Vec<String>,
    /// Minimum cash weight floor
    #[serde(default = "default_min_cash_pct")]
    pub min_cash_pct: Decimal,
    /// Cap on any single security's weight
    #[serde(default = "default_max_security_weight")]
    pub max_security_weight: Decimal,
    /// Cap on the summed weight of any sector's securities
    #[serde(default = "default_max_sector_weight")]
    pub max_sector_weight: Decimal,
}

fn default_min_cash_pct() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_max_security_weight() -> Decimal {
    Decimal::new(10, 2) // 0.10
}

fn default_max_sector_weight() -> Decimal {
    Decimal::new(25, 2) // 0.25
}

impl Filters {
    /// Request-level validation, performed before any Judge traffic.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_cash_pct < Decimal::ZERO || self.min_cash_pct > Decimal::ONE {
            return Err(EngineError::InfeasibleConstraints(format!(
                "minCashPct {} outside [0, 1]",
                self.min_cash_pct
            )));
        }
        if self.max_security_weight <= Decimal::ZERO || self.max_security_weight > Decimal::ONE {
            return Err(EngineError::InfeasibleConstraints(format!(
                "maxSecurityWeight {} outside (0, 1]",
                self.max_security_weight
            )));
        }
        if self.max_sector_weight <= Decimal::ZERO || self.max_sector_weight > Decimal::ONE {
            return Err(EngineError::InfeasibleConstraints(format!(
                "maxSectorWeight {} outside (0, 1]",
                self.max_sector_weight
            )));
        }
        if self.max_security_weight > self.max_sector_weight {
            return Err(EngineError::InfeasibleConstraints(format!(
                "maxSecurityWeight {} exceeds maxSectorWeight {}",
                self.max_security_weight, self.max_sector_weight
            )));
        }
        Ok(())
    }
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            account_ids: Vec::new(),
            min_cash_pct: default_min_cash_pct(),
            max_security_weight: default_max_security_weight(),
            max_sector_weight: default_max_sector_weight(),
        }
    }
}

/// Projects a raw target weight vector onto the feasible set defined by
/// [`Filters`] via iterative proportional scaling.
///
/// Each pass clips per-security weights, scales offending sectors down to
/// their cap, then scales everything uniformly so cash can hold its
/// floor; the loop repeats until no cap is violated or the iteration
/// bound is hit (cap interactions can cycle).
pub struct ConstraintProjector {
    max_iterations: u32,
}

impl ConstraintProjector {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    /// Project `raw` onto the feasible set, with `sectors` mapping each
    /// ticker to its sector. A ticker without a sector entry forms its
    /// own singleton sector.
    pub fn project(
        &self,
        raw: &WeightVector,
        sectors: &HashMap<String, String>,
        filters: &Filters,
    ) -> Result<WeightVector, EngineError> {
        let tol = Decimal::new(1, 12);

        if filters.min_cash_pct > Decimal::ONE {
            return Err(EngineError::InfeasibleConstraints(format!(
                "minCashPct {} exceeds 1",
                filters.min_cash_pct
            )));
        }

        // Group the universe by sector once.
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for ticker in raw.weights.keys() {
            let sector = sectors
                .get(ticker)
                .cloned()
                .unwrap_or_else(|| ticker.clone());
            groups.entry(sector).or_default().push(ticker.clone());
        }

        // A cap combination that cannot reach full allocation even with
        // every sector at its cap is rejected outright.
        let capacity = filters.min_cash_pct
            + Decimal::from(groups.len() as u64) * filters.max_sector_weight;
        if capacity < Decimal::ONE {
            return Err(EngineError::InfeasibleConstraints(format!(
                "minCashPct {} plus {} sector caps of {} cannot reach 1",
                filters.min_cash_pct,
                groups.len(),
                filters.max_sector_weight
            )));
        }

        let invested_cap = Decimal::ONE - filters.min_cash_pct;
        let mut weights: BTreeMap<String, Decimal> = raw
            .weights
            .iter()
            .map(|(t, w)| (t.clone(), (*w).max(Decimal::ZERO)))
            .collect();

        let mut feasible = false;
        for iteration in 0..self.max_iterations {
            // (a) clip every security to its cap
            for weight in weights.values_mut() {
                if *weight > filters.max_security_weight {
                    *weight = filters.max_security_weight;
                }
            }

            // (b) scale each offending sector down to its cap exactly
            for members in groups.values() {
                let sector_total: Decimal = members.iter().map(|t| weights[t]).sum();
                if sector_total > filters.max_sector_weight && sector_total > Decimal::ZERO {
                    let scale = filters.max_sector_weight / sector_total;
                    for ticker in members {
                        if let Some(weight) = weights.get_mut(ticker) {
                            *weight *= scale;
                        }
                    }
                }
            }

            // (c) scale uniformly so cash can hold its floor
            let total: Decimal = weights.values().sum();
            if total > invested_cap && total > Decimal::ZERO {
                let scale = invested_cap / total;
                for weight in weights.values_mut() {
                    *weight *= scale;
                }
            }

            if Self::satisfies(&weights, &groups, filters, invested_cap, tol) {
                debug!(iterations = iteration + 1, "Projection converged");
                feasible = true;
                break;
            }
        }

        if !feasible {
            return Err(EngineError::InfeasibleConstraints(format!(
                "caps still violated after {} iterations",
                self.max_iterations
            )));
        }

        let total: Decimal = weights.values().sum();
        Ok(WeightVector::new(weights, Decimal::ONE - total))
    }

    fn satisfies(
        weights: &BTreeMap<String, Decimal>,
        groups: &BTreeMap<String, Vec<String>>,
        filters: &Filters,
        invested_cap: Decimal,
        tol: Decimal,
    ) -> bool {
        if weights
            .values()
            .any(|w| *w > filters.max_security_weight + tol || *w < Decimal::ZERO)
        {
            return false;
        }
        for members in groups.values() {
            let sector_total: Decimal = members.iter().map(|t| weights[t]).sum();
            if sector_total > filters.max_sector_weight + tol {
                return false;
            }
        }
        let total: Decimal = weights.values().sum();
        total <= invested_cap + tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sectors(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(t, s)| (t.to_string(), s.to_string()))
            .collect()
    }

    fn raw(pairs: &[(&str, Decimal)]) -> WeightVector {
        let weights: BTreeMap<String, Decimal> = pairs
            .iter()
            .map(|(t, w)| (t.to_string(), *w))
            .collect();
        let total: Decimal = weights.values().sum();
        WeightVector::new(weights, Decimal::ONE - total)
    }

    fn assert_feasible(vector: &WeightVector, sectors: &HashMap<String, String>, filters: &Filters) {
        let tol = dec!(0.000000001);
        assert!((vector.total() - Decimal::ONE).abs() < tol);
        assert!(vector.cash >= filters.min_cash_pct - tol);
        for (ticker, weight) in &vector.weights {
            assert!(*weight >= Decimal::ZERO, "{ticker} went negative");
            assert!(
                *weight <= filters.max_security_weight + tol,
                "{ticker} exceeds the security cap"
            );
        }
        let mut by_sector: HashMap<&str, Decimal> = HashMap::new();
        for (ticker, weight) in &vector.weights {
            *by_sector
                .entry(sectors.get(ticker).map(|s| s.as_str()).unwrap_or(ticker))
                .or_default() += *weight;
        }
        for (sector, total) in by_sector {
            assert!(
                total <= filters.max_sector_weight + tol,
                "sector {sector} exceeds its cap"
            );
        }
    }

    // Default caps need at least four sectors in the universe to pass the
    // capacity precheck, so tests pad with zero-weight tickers the way the
    // allocator's raw vectors carry the whole universe.

    #[test]
    fn test_feasible_input_passes_through_unchanged() {
        let filters = Filters::default();
        let sectors = sectors(&[
            ("AAPL", "Information Technology"),
            ("V", "Financials"),
            ("JNJ", "Health Care"),
            ("XOM", "Energy"),
        ]);
        let input = raw(&[
            ("AAPL", dec!(0.05)),
            ("V", dec!(0.08)),
            ("JNJ", dec!(0)),
            ("XOM", dec!(0)),
        ]);

        let projected = ConstraintProjector::new(50)
            .project(&input, &sectors, &filters)
            .unwrap();
        assert_eq!(projected, input);
    }

    #[test]
    fn test_security_cap_clips_and_cash_absorbs() {
        let filters = Filters::default();
        let sectors = sectors(&[
            ("AAPL", "Information Technology"),
            ("V", "Financials"),
            ("JNJ", "Health Care"),
            ("XOM", "Energy"),
        ]);
        let input = raw(&[
            ("AAPL", dec!(0.40)),
            ("V", dec!(0.05)),
            ("JNJ", dec!(0)),
            ("XOM", dec!(0)),
        ]);

        let projected = ConstraintProjector::new(50)
            .project(&input, &sectors, &filters)
            .unwrap();

        assert_eq!(projected.weight("AAPL"), dec!(0.10));
        assert_eq!(projected.weight("V"), dec!(0.05));
        assert_eq!(projected.cash, dec!(0.85));
        assert_feasible(&projected, &sectors, &filters);
    }

    #[test]
    fn test_sector_cap_scales_members_proportionally() {
        let filters = Filters::default();
        let sectors = sectors(&[
            ("AAPL", "Information Technology"),
            ("MSFT", "Information Technology"),
            ("NVDA", "Information Technology"),
            ("V", "Financials"),
            ("JNJ", "Health Care"),
            ("XOM", "Energy"),
        ]);
        // Each member survives the security cap but the sector sums to 0.30.
        let input = raw(&[
            ("AAPL", dec!(0.10)),
            ("MSFT", dec!(0.10)),
            ("NVDA", dec!(0.10)),
            ("V", dec!(0)),
            ("JNJ", dec!(0)),
            ("XOM", dec!(0)),
        ]);

        let projected = ConstraintProjector::new(50)
            .project(&input, &sectors, &filters)
            .unwrap();

        let it_total =
            projected.weight("AAPL") + projected.weight("MSFT") + projected.weight("NVDA");
        assert!((it_total - dec!(0.25)).abs() < dec!(0.000000001));
        // Proportional scaling keeps the members equal.
        assert_eq!(projected.weight("AAPL"), projected.weight("MSFT"));
        assert_feasible(&projected, &sectors, &filters);
    }

    #[test]
    fn test_cash_floor_scales_total_down() {
        let filters = Filters {
            min_cash_pct: dec!(0.10),
            max_security_weight: dec!(0.30),
            max_sector_weight: dec!(0.30),
            ..Filters::default()
        };
        let sectors = sectors(&[
            ("AAPL", "Information Technology"),
            ("V", "Financials"),
            ("JNJ", "Health Care"),
            ("XOM", "Energy"),
        ]);
        let input = raw(&[
            ("AAPL", dec!(0.30)),
            ("V", dec!(0.30)),
            ("JNJ", dec!(0.25)),
            ("XOM", dec!(0.15)),
        ]);

        let projected = ConstraintProjector::new(50)
            .project(&input, &sectors, &filters)
            .unwrap();

        assert!(projected.cash >= dec!(0.10) - dec!(0.000000001));
        assert_feasible(&projected, &sectors, &filters);
    }

    #[test]
    fn test_negative_raw_weights_clamp_to_zero() {
        let filters = Filters::default();
        let sectors = sectors(&[
            ("AAPL", "Information Technology"),
            ("TSLA", "Consumer Discretionary"),
            ("V", "Financials"),
            ("JNJ", "Health Care"),
        ]);
        let input = raw(&[
            ("AAPL", dec!(0.05)),
            ("TSLA", dec!(-0.03)),
            ("V", dec!(0)),
            ("JNJ", dec!(0)),
        ]);

        let projected = ConstraintProjector::new(50)
            .project(&input, &sectors, &filters)
            .unwrap();
        assert_eq!(projected.weight("TSLA"), Decimal::ZERO);
        assert_feasible(&projected, &sectors, &filters);
    }

    #[test]
    fn test_min_cash_above_one_is_infeasible() {
        let filters = Filters {
            min_cash_pct: dec!(1.5),
            ..Filters::default()
        };
        let sectors = sectors(&[("AAPL", "Information Technology")]);
        let input = raw(&[("AAPL", dec!(0.05))]);

        let err = ConstraintProjector::new(50)
            .project(&input, &sectors, &filters)
            .unwrap_err();
        assert_eq!(err.kind(), "INFEASIBLE_CONSTRAINTS");
    }

    #[test]
    fn test_insufficient_cap_capacity_is_infeasible() {
        // One sector capped at 0.25 with a 0.5 cash floor: 0.75 < 1.
        let filters = Filters {
            min_cash_pct: dec!(0.5),
            ..Filters::default()
        };
        let sectors = sectors(&[("AAPL", "Information Technology")]);
        let input = raw(&[("AAPL", dec!(0.05))]);

        let err = ConstraintProjector::new(50)
            .project(&input, &sectors, &filters)
            .unwrap_err();
        assert_eq!(err.kind(), "INFEASIBLE_CONSTRAINTS");
    }

    #[test]
    fn test_single_iteration_bound_still_converges() {
        let filters = Filters::default();
        let sectors = sectors(&[
            ("AAPL", "Information Technology"),
            ("MSFT", "Information Technology"),
            ("NVDA", "Information Technology"),
            ("V", "Financials"),
            ("JNJ", "Health Care"),
            ("XOM", "Energy"),
        ]);
        let input = raw(&[
            ("AAPL", dec!(0.50)),
            ("MSFT", dec!(0.20)),
            ("NVDA", dec!(0.20)),
            ("V", dec!(0.08)),
            ("JNJ", dec!(0)),
            ("XOM", dec!(0)),
        ]);

        let projected = ConstraintProjector::new(1)
            .project(&input, &sectors, &filters)
            .unwrap();
        assert_feasible(&projected, &sectors, &filters);
    }

    #[test]
    fn test_filters_validation() {
        assert!(Filters::default().validate().is_ok());

        let bad = Filters {
            max_security_weight: dec!(0.30),
            max_sector_weight: dec!(0.25),
            ..Filters::default()
        };
        assert_eq!(bad.validate().unwrap_err().kind(), "INFEASIBLE_CONSTRAINTS");

        let bad = Filters {
            min_cash_pct: dec!(1.2),
            ..Filters::default()
        };
        assert!(bad.validate().is_err());

        let bad = Filters {
            max_security_weight: Decimal::ZERO,
            ..Filters::default()
        };
        assert!(bad.validate().is_err());
    }
}
