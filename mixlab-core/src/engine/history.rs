//! Persistent round history.
//!
//! An `Arc`-linked list, newest record first. Pushing a record returns a new
//! `History` that shares the entire prefix with the old one, so every earlier
//! `MixtureState` keeps its own complete history at O(1) cost per round.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::strategy::Hyperparameters;

/// Everything that happened in one accepted round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Zero-based count of accepted rounds before this one.
    pub round: usize,
    pub experts: Vec<f64>,
    pub observation: f64,
    pub prediction: f64,
    /// Weights the prediction was made with.
    pub weights: Vec<f64>,
    pub expert_losses: Vec<f64>,
    pub forecaster_loss: f64,
    pub hyperparameters: Hyperparameters,
}

#[derive(Debug)]
struct Node {
    record: RoundRecord,
    prev: Option<Arc<Node>>,
}

// Unlink iteratively; the default recursive drop overflows the stack on long runs.
impl Drop for Node {
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(node) = prev {
            match Arc::try_unwrap(node) {
                Ok(mut inner) => prev = inner.prev.take(),
                Err(_) => break,
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    head: Option<Arc<Node>>,
    len: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: RoundRecord) -> Self {
        Self {
            head: Some(Arc::new(Node {
                record,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last(&self) -> Option<&RoundRecord> {
        self.head.as_deref().map(|n| &n.record)
    }

    /// Newest first.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    /// Oldest first.
    pub fn records(&self) -> Vec<&RoundRecord> {
        let mut out: Vec<&RoundRecord> = self.iter().collect();
        out.reverse();
        out
    }

    /// Whether both histories are the same shared list.
    pub fn shares_with(&self, other: &History) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

pub struct Iter<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RoundRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.prev.as_deref();
        Some(&node.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(round: usize) -> RoundRecord {
        RoundRecord {
            round,
            experts: vec![1.0],
            observation: 1.0,
            prediction: 1.0,
            weights: vec![1.0],
            expert_losses: vec![0.0],
            forecaster_loss: 0.0,
            hyperparameters: Hyperparameters::default(),
        }
    }

    #[test]
    fn push_leaves_original_intact() {
        let a = History::new().push(record(0));
        let b = a.push(record(1));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert_eq!(b.records().iter().map(|r| r.round).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(a.last().map(|r| r.round), Some(0));
    }

    #[test]
    fn long_history_drops_without_recursion() {
        let mut h = History::new();
        for t in 0..200_000 {
            h = h.push(record(t));
        }
        assert_eq!(h.len(), 200_000);
        drop(h);
    }

    #[test]
    fn branches_share_prefix() {
        let base = History::new().push(record(0));
        let left = base.push(record(1));
        let right = base.push(record(1));
        assert!(!left.shares_with(&right));
        assert_eq!(left.iter().nth(1), right.iter().nth(1));
        drop(base);
        assert_eq!(left.records().len(), 2);
    }
}
