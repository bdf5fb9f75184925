//! Per-run accumulator of reported slots, keyed by iteration.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::layout::JobColors;
use crate::model::{Iteration, Slot};

/// Whether an appended slot landed in a frame that was still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotArrival {
    Open,
    /// The frame was already marked complete; the slot is kept but nothing
    /// is re-rendered until the next `FRAME_END` for it.
    Late,
}

#[derive(Debug, Default)]
struct StoreState {
    frames: HashMap<Iteration, Vec<Slot>>,
    completed: HashSet<Iteration>,
    last_complete: Option<Iteration>,
    colors: JobColors,
}

/// Concurrency-safe slot buffer plus the run's job color assignment.
///
/// Every operation takes the same lock, so a slot appended before
/// [`mark_complete`](Self::mark_complete) is always part of its snapshot.
#[derive(Debug, Default)]
pub struct IterationStore {
    state: Mutex<StoreState>,
}

impl IterationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Poisoning is ignored: no critical section leaves a partial write.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn append(&self, slot: Slot) -> SlotArrival {
        let mut state = self.lock();
        let arrival = if state.completed.contains(&slot.iteration) {
            SlotArrival::Late
        } else {
            SlotArrival::Open
        };
        state.frames.entry(slot.iteration).or_default().push(slot);
        arrival
    }

    /// Mark `iteration` complete and return a copy of its slots in arrival
    /// order. An iteration with no slots yields an empty list.
    pub fn mark_complete(&self, iteration: Iteration) -> Vec<Slot> {
        let mut state = self.lock();
        state.completed.insert(iteration);
        state.last_complete = state.last_complete.max(Some(iteration));
        state.frames.get(&iteration).cloned().unwrap_or_default()
    }

    /// Copy of the slots recorded for `iteration`, without marking it.
    pub fn snapshot(&self, iteration: Iteration) -> Vec<Slot> {
        self.lock()
            .frames
            .get(&iteration)
            .cloned()
            .unwrap_or_default()
    }

    /// Highest iteration for which a completion marker has been seen.
    pub fn last_complete(&self) -> Option<Iteration> {
        self.lock().last_complete
    }

    pub fn is_complete(&self, iteration: Iteration) -> bool {
        self.lock().completed.contains(&iteration)
    }

    pub fn frame_count(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn slot_count(&self) -> usize {
        self.lock().frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Run `f` against the run's color assignment under the store lock.
    pub fn with_colors<R>(&self, f: impl FnOnce(&mut JobColors) -> R) -> R {
        f(&mut self.lock().colors)
    }

    /// Drop every frame and every color assignment.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.frames.clear();
        state.completed.clear();
        state.last_complete = None;
        state.colors.clear();
    }
}
