use std::sync::{Arc, RwLock};

use planning_core::PlanningError;
use tracing::warn;

use crate::averaging_down::AveragingDownCalculator;
use crate::calculator::OpportunityCalculator;
use crate::opportunity_buys::OpportunityBuysCalculator;
use crate::profit_taking::ProfitTakingCalculator;
use crate::rebalance::{RebalanceBuysCalculator, RebalanceSellsCalculator};
use crate::weight_based::WeightBasedCalculator;

/// Name-keyed calculator table. Registration order is preserved so that
/// running "all" calculators is deterministic.
#[derive(Default)]
pub struct CalculatorRegistry {
    calculators: RwLock<Vec<Arc<dyn OpportunityCalculator>>>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calculator, replacing any existing one with the same name.
    pub fn register(&self, calculator: Arc<dyn OpportunityCalculator>) {
        let mut guard = match self.calculators.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(slot) = guard.iter_mut().find(|c| c.name() == calculator.name()) {
            warn!(name = calculator.name(), "Replacing registered calculator");
            *slot = calculator;
        } else {
            guard.push(calculator);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OpportunityCalculator>> {
        self.read().iter().find(|c| c.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.read().iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Resolve the enabled subset in the requested order.
    ///
    /// An empty list means every registered calculator.
    pub fn enabled(
        &self,
        names: &[String],
    ) -> Result<Vec<Arc<dyn OpportunityCalculator>>, PlanningError> {
        if names.is_empty() {
            return Ok(self.read().clone());
        }
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| PlanningError::UnknownModule(format!("calculator {}", name)))
            })
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn OpportunityCalculator>>> {
        match self.calculators.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Build a registry holding every built-in calculator.
pub fn default_registry() -> CalculatorRegistry {
    let registry = CalculatorRegistry::new();
    registry.register(Arc::new(ProfitTakingCalculator));
    registry.register(Arc::new(AveragingDownCalculator));
    registry.register(Arc::new(OpportunityBuysCalculator));
    registry.register(Arc::new(RebalanceSellsCalculator));
    registry.register(Arc::new(RebalanceBuysCalculator));
    registry.register(Arc::new(WeightBasedCalculator));
    registry
}
