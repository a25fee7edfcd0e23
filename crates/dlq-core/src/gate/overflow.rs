//! Holding area for requests submitted while every slot is busy.
//!
//! Not synchronized; only touched while the gate lock is held.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::GateError;

/// Order in which held requests are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseOrder {
    /// Oldest held request first.
    #[default]
    Fifo,
    /// Newest held request first.
    Lifo,
}

/// Unbounded buffer of held items.
#[derive(Debug)]
pub struct OverflowBuffer<T> {
    items: VecDeque<T>,
    order: ReleaseOrder,
}

impl<T> Default for OverflowBuffer<T> {
    fn default() -> Self {
        Self::new(ReleaseOrder::default())
    }
}

impl<T> OverflowBuffer<T> {
    pub fn new(order: ReleaseOrder) -> Self {
        Self {
            items: VecDeque::new(),
            order,
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Remove the next item according to the release order.
    pub fn pop_next(&mut self) -> Result<T, GateError> {
        let next = match self.order {
            ReleaseOrder::Fifo => self.items.pop_front(),
            ReleaseOrder::Lifo => self.items.pop_back(),
        };
        next.ok_or(GateError::EmptyBuffer)
    }

    pub fn peek_next(&self) -> Option<&T> {
        match self.order {
            ReleaseOrder::Fifo => self.items.front(),
            ReleaseOrder::Lifo => self.items.back(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn order(&self) -> ReleaseOrder {
        self.order
    }
}
