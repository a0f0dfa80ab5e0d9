use std::sync::Arc;

use planning_core::{ActionCandidate, ActionSequence, Params, PlanningError};

use crate::registry::NamedRegistry;

/// Transforms a sequence set, usually by growing it under a cap.
pub trait SequenceExpander: Send + Sync {
    fn name(&self) -> &'static str;

    fn expand(
        &self,
        sequences: &[ActionSequence],
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError>;
}

/// Appends pairwise unions of the input sequences, first-encountered pairs
/// first, until `max_combinations` unions have been added.
#[derive(Debug, Default)]
pub struct CombinatorialExpander;

impl CombinatorialExpander {
    /// `a` followed by the actions of `b` it does not already contain.
    /// Trading the same symbol twice with a different side or size conflicts.
    fn union(a: &ActionSequence, b: &ActionSequence, max_len: usize) -> Option<Vec<ActionCandidate>> {
        let mut actions = a.actions.clone();
        let mut added = false;
        for action in &b.actions {
            match actions.iter().find(|x| x.symbol == action.symbol) {
                Some(existing)
                    if existing.side == action.side && existing.quantity == action.quantity => {}
                Some(_) => return None,
                None => {
                    actions.push(action.clone());
                    added = true;
                }
            }
        }
        (added && actions.len() <= max_len).then_some(actions)
    }
}

impl SequenceExpander for CombinatorialExpander {
    fn name(&self) -> &'static str {
        "combinatorial"
    }

    fn expand(
        &self,
        sequences: &[ActionSequence],
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let max_combinations = params.get_usize("max_combinations", 50);
        let max_len = params.get_usize("max_depth", 5).max(1);

        let mut out = sequences.to_vec();
        let mut added = 0usize;
        'outer: for (i, a) in sequences.iter().enumerate() {
            for b in &sequences[i + 1..] {
                if added >= max_combinations {
                    break 'outer;
                }
                if let Some(actions) = Self::union(a, b, max_len) {
                    out.push(ActionSequence::new(actions, self.name()));
                    added += 1;
                }
            }
        }
        Ok(out)
    }
}

/// Appends every non-empty strict prefix of each multi-action sequence.
#[derive(Debug, Default)]
pub struct PartialExecutionExpander;

impl SequenceExpander for PartialExecutionExpander {
    fn name(&self) -> &'static str {
        "partial_execution"
    }

    fn expand(
        &self,
        sequences: &[ActionSequence],
        _params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let mut out = sequences.to_vec();
        for seq in sequences.iter().filter(|s| s.len() > 1) {
            for end in 1..seq.len() {
                out.push(ActionSequence::new(seq.actions[..end].to_vec(), self.name()));
            }
        }
        Ok(out)
    }
}

/// Pass-through; constraints are enforced after selection.
#[derive(Debug, Default)]
pub struct ConstraintRelaxationExpander;

impl SequenceExpander for ConstraintRelaxationExpander {
    fn name(&self) -> &'static str {
        "constraint_relaxation"
    }

    fn expand(
        &self,
        sequences: &[ActionSequence],
        _params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        Ok(sequences.to_vec())
    }
}

pub fn default_expanders() -> NamedRegistry<dyn SequenceExpander> {
    let registry: NamedRegistry<dyn SequenceExpander> = NamedRegistry::new("expander");
    let expanders: Vec<Arc<dyn SequenceExpander>> = vec![
        Arc::new(CombinatorialExpander),
        Arc::new(PartialExecutionExpander),
        Arc::new(ConstraintRelaxationExpander),
    ];
    for expander in expanders {
        registry.register(expander.name(), expander);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::candidate;
    use planning_core::TradeSide;

    fn seq(symbols: &[(&str, TradeSide)]) -> ActionSequence {
        ActionSequence::new(
            symbols
                .iter()
                .map(|(s, side)| candidate(s, *side, 0.5, 100.0))
                .collect(),
            "test",
        )
    }

    #[test]
    fn test_combinatorial_caps_in_first_encountered_order() {
        let input = vec![
            seq(&[("A", TradeSide::Buy)]),
            seq(&[("B", TradeSide::Buy)]),
            seq(&[("C", TradeSide::Buy)]),
        ];
        let out = CombinatorialExpander
            .expand(&input, &Params::new().with("max_combinations", 2))
            .unwrap();
        assert_eq!(out.len(), 5);
        let combos: Vec<Vec<&str>> = out[3..]
            .iter()
            .map(|s| s.actions.iter().map(|a| a.symbol.as_str()).collect())
            .collect();
        assert_eq!(combos, vec![vec!["A", "B"], vec!["A", "C"]]);
    }

    #[test]
    fn test_combinatorial_skips_conflicts_and_duplicates() {
        let input = vec![
            seq(&[("A", TradeSide::Buy)]),
            seq(&[("A", TradeSide::Sell)]),
            seq(&[("A", TradeSide::Buy)]),
        ];
        let out = CombinatorialExpander.expand(&input, &Params::new()).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_partial_execution_emits_strict_prefixes() {
        let input = vec![
            seq(&[("A", TradeSide::Sell), ("B", TradeSide::Buy), ("C", TradeSide::Buy)]),
            seq(&[("D", TradeSide::Buy)]),
        ];
        let out = PartialExecutionExpander.expand(&input, &Params::new()).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[2].len(), 1);
        assert_eq!(out[3].len(), 2);
        assert_eq!(out[3].actions[1].symbol, "B");
    }

    #[test]
    fn test_constraint_relaxation_is_identity() {
        let input = vec![seq(&[("A", TradeSide::Buy)])];
        let out = ConstraintRelaxationExpander
            .expand(&input, &Params::new())
            .unwrap();
        assert_eq!(out, input);
    }
}
