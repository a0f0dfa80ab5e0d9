pub mod averaging_down;
pub mod calculator;
pub mod opportunity_buys;
pub mod profit_taking;
pub mod rebalance;
pub mod registry;
pub mod service;
pub mod weight_based;

#[cfg(test)]
mod test_support;

pub use averaging_down::AveragingDownCalculator;
pub use calculator::*;
pub use opportunity_buys::OpportunityBuysCalculator;
pub use profit_taking::ProfitTakingCalculator;
pub use rebalance::{RebalanceBuysCalculator, RebalanceSellsCalculator};
pub use registry::{default_registry, CalculatorRegistry};
pub use service::{OpportunityReport, OpportunityService};
pub use weight_based::WeightBasedCalculator;
