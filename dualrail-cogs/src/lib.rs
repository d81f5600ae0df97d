//! COGS Calculator (C9): attributes cost-ledger entries to meters and
//! periods, and computes margin analysis against rating-engine output.

pub mod attribution;
pub mod calculator;
pub mod error;

pub use attribution::allowlist_for_meter;
pub use calculator::{
    CogsCalculator, MarginAnalysis, MeterCogs, MeterMargin, PeriodCogs, ProfitabilityScore,
    RevenueLine,
};
pub use error::CogsError;
