use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Bounded FIFO of the most recent broadcast payloads.
#[derive(Debug)]
pub struct FrameBuffer {
    capacity: usize,
    frames: Mutex<VecDeque<Value>>,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            frames: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends, evicting the oldest frame once full.
    pub fn push(&self, frame: Value) {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        while frames.len() >= self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
