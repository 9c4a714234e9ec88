//! Owned, append-only operation logs
//!
//! Stages and the executor keep one log per instance. Readers only ever get a
//! copy; the live sequence is never handed out.

use serde::Serialize;

/// Append-only log of operation records
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct OperationLog<T> {
    entries: Vec<T>,
}

impl<T> Default for OperationLog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> OperationLog<T> {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record
    pub fn append(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// Copy of all records in insertion order
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.clone()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
