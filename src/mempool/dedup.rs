//! Bounded, oldest-evicted set of seen transaction hashes.
//!
//! Shared by both transports: a subscription reconnect or a fresh poll
//! filter can replay hashes that were already emitted.

use alloy::primitives::TxHash;
use std::collections::{HashSet, VecDeque};

#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    seen: HashSet<TxHash>,
    order: VecDeque<TxHash>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Record `hash`; returns true the first time it is seen.
    pub fn insert(&mut self, hash: TxHash) -> bool {
        if !self.seen.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
