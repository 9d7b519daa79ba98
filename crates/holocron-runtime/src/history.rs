use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use holocron_core::models::CanonicalState;

/// A state that was replaced, and the action that replaced it.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub at: DateTime<Utc>,
    pub action: &'static str,
    pub state: CanonicalState,
}

/// Bounded stack of prior states, oldest evicted first.
#[derive(Debug)]
pub struct UndoHistory {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl UndoHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record the state an action is about to replace.
    pub fn push(&mut self, action: &'static str, state: CanonicalState) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(UndoEntry {
            at: Utc::now(),
            action,
            state,
        });
    }

    /// Most recent entry, removed from the history.
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
