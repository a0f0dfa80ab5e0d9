use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::types::{ActionCandidate, TradeSide};

/// An ordered group of candidates meant to be executed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSequence {
    pub actions: Vec<ActionCandidate>,
    pub pattern_type: String,
    pub priority: f64,
    pub sequence_hash: String,
}

impl ActionSequence {
    /// Build a sequence; priority is the sum of action priorities.
    pub fn new(actions: Vec<ActionCandidate>, pattern_type: &str) -> Self {
        let priority = actions.iter().map(|a| a.priority).sum();
        let sequence_hash = hash_actions(&actions);
        Self {
            actions,
            pattern_type: pattern_type.to_string(),
            priority,
            sequence_hash,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Move every SELL ahead of every BUY, keeping relative order within
    /// each side, and refresh the hash.
    pub fn sells_first(mut self) -> Self {
        if !is_sells_first(&self.actions) {
            let (sells, buys): (Vec<_>, Vec<_>) =
                self.actions.into_iter().partition(|a| a.side == TradeSide::Sell);
            self.actions = sells;
            self.actions.extend(buys);
        }
        self.sequence_hash = hash_actions(&self.actions);
        self
    }

    pub fn cash_required(&self) -> f64 {
        self.actions
            .iter()
            .filter(|a| a.is_buy())
            .map(|a| a.value)
            .sum()
    }

    pub fn cash_generated(&self) -> f64 {
        self.actions
            .iter()
            .filter(|a| a.is_sell())
            .map(|a| a.value)
            .sum()
    }
}

pub fn is_sells_first(actions: &[ActionCandidate]) -> bool {
    let mut seen_buy = false;
    for action in actions {
        match action.side {
            TradeSide::Buy => seen_buy = true,
            TradeSide::Sell if seen_buy => return false,
            TradeSide::Sell => {}
        }
    }
    true
}

#[derive(Serialize)]
struct HashEntry<'a> {
    symbol: &'a str,
    side: TradeSide,
    quantity: u64,
}

/// MD5 hex digest of the ordered `(symbol, side, quantity)` tuples.
///
/// Used only as a deterministic identity for deduplication and caching.
pub fn hash_actions(actions: &[ActionCandidate]) -> String {
    let entries: Vec<HashEntry<'_>> = actions
        .iter()
        .map(|a| HashEntry {
            symbol: &a.symbol,
            side: a.side,
            quantity: a.quantity,
        })
        .collect();
    let encoded = serde_json::to_vec(&entries).unwrap_or_default();
    hex::encode(Md5::digest(&encoded))
}
