use crate::types::TradingDecision;
use std::collections::VecDeque;

/// Default number of decisions retained.
pub const DEFAULT_CAPACITY: usize = 50;

/// Bounded decision history. Pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    entries: VecDeque<TradingDecision>,
    capacity: usize,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, decision: TradingDecision) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(decision);
    }

    /// Last `n` decisions, oldest first.
    pub fn recent(&self, n: usize) -> Vec<TradingDecision> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DecisionLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
