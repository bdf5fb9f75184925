use std::collections::HashMap;

use flowshop_protocol::PALETTE_SIZE;
use serde::{Deserialize, Serialize};

use crate::model::Slot;

/// Job id → palette index, fixed the first time a job is seen in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobColors {
    assigned: HashMap<u32, usize>,
    next: usize,
}

impl JobColors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color of `job`, assigning the next palette slot if it is new.
    pub fn assign(&mut self, job: u32) -> usize {
        if let Some(&color) = self.assigned.get(&job) {
            return color;
        }
        let color = self.next % PALETTE_SIZE;
        self.next += 1;
        self.assigned.insert(job, color);
        color
    }

    /// Assign colors to every job in `slots`, in encounter order.
    pub fn assign_all(&mut self, slots: &[Slot]) {
        for slot in slots {
            self.assign(slot.job);
        }
    }

    pub fn get(&self, job: u32) -> Option<usize> {
        self.assigned.get(&job).copied()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_seen_order_and_stability() {
        let mut colors = JobColors::new();
        assert_eq!(colors.assign(9), 0);
        assert_eq!(colors.assign(2), 1);
        assert_eq!(colors.assign(9), 0);
        assert_eq!(colors.get(2), Some(1));
        assert_eq!(colors.get(5), None);
    }

    #[test]
    fn wraps_after_palette_is_exhausted() {
        let mut colors = JobColors::new();
        for job in 0..PALETTE_SIZE as u32 {
            colors.assign(job);
        }
        assert_eq!(colors.assign(1000), 0);
        assert_eq!(colors.assign(1001), 1);
        assert_eq!(colors.len(), PALETTE_SIZE + 2);
    }

    #[test]
    fn clear_restarts_the_palette() {
        let mut colors = JobColors::new();
        colors.assign(4);
        colors.assign(8);
        colors.clear();
        assert!(colors.is_empty());
        assert_eq!(colors.assign(8), 0);
    }
}
