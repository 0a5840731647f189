//! Stats module - EC stability and growth statistics

mod calculator;

pub use calculator::{CorrelationRow, EcStats, GrowthSummary, SiteFilter, StatsCalculator};
