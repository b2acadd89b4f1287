//! Session wide suppression of repeated plates.
//!
//! Matching is on the exact string: a misread character makes a new plate.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
    // first-seen order for the end of session summary
    order: Vec<String>,
}

impl DedupTracker {

    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time `plate` is offered, `false` ever after.
    pub fn should_emit(&mut self, plate: &str) -> bool {
        if self.seen.contains(plate) {
            return false;
        }
        self.seen.insert(plate.to_string());
        self.order.push(plate.to_string());
        true
    }

    pub fn seen(&self) -> &[String] {
        &self.order
    }
}
