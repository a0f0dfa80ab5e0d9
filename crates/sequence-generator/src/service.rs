use std::collections::HashSet;
use std::sync::Arc;

use planning_core::{ActionSequence, OpportunitiesByCategory, PlannerConfig, PlanningError};
use tracing::{debug, info, warn};

use crate::expanders::{default_expanders, SequenceExpander};
use crate::pattern::PatternGenerator;
use crate::patterns::default_patterns;
use crate::registry::NamedRegistry;

/// Turns grouped candidates into a deduplicated, sells-first sequence set.
pub struct SequenceService {
    patterns: Arc<NamedRegistry<dyn PatternGenerator>>,
    expanders: Arc<NamedRegistry<dyn SequenceExpander>>,
}

impl Default for SequenceService {
    fn default() -> Self {
        Self::new(Arc::new(default_patterns()), Arc::new(default_expanders()))
    }
}

impl SequenceService {
    pub fn new(
        patterns: Arc<NamedRegistry<dyn PatternGenerator>>,
        expanders: Arc<NamedRegistry<dyn SequenceExpander>>,
    ) -> Self {
        Self {
            patterns,
            expanders,
        }
    }

    pub fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let patterns = self.patterns.resolve(&config.enabled_patterns)?;
        let expanders = if config.single_action_only {
            Vec::new()
        } else {
            self.expanders.resolve(&config.enabled_expanders)?
        };

        let mut sequences = Vec::new();
        for (name, pattern) in patterns {
            match pattern.generate(opportunities, &config.params_for(&name)) {
                Ok(generated) => {
                    debug!(pattern = %name, count = generated.len(), "Pattern generated sequences");
                    sequences.extend(generated);
                }
                Err(e) => warn!(pattern = %name, error = %e, "Pattern failed, skipping"),
            }
        }

        for (name, expander) in expanders {
            match expander.expand(&sequences, &config.params_for(&name)) {
                Ok(expanded) => {
                    debug!(
                        expander = %name,
                        before = sequences.len(),
                        after = expanded.len(),
                        "Expander applied"
                    );
                    sequences = expanded;
                }
                Err(e) => warn!(expander = %name, error = %e, "Expander failed, keeping previous set"),
            }
        }

        if config.single_action_only {
            sequences.retain(|s| s.len() == 1);
        }

        let unique = finalize(sequences);
        info!(sequences = unique.len(), "Sequences generated");
        Ok(unique)
    }
}

/// Enforce sells-first ordering, drop empty sequences and deduplicate by
/// hash, keeping the first occurrence.
pub fn finalize(sequences: Vec<ActionSequence>) -> Vec<ActionSequence> {
    let mut seen = HashSet::new();
    sequences
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(ActionSequence::sells_first)
        .filter(|s| seen.insert(s.sequence_hash.clone()))
        .collect()
}
