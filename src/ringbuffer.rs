//! Ringbuffer module for retaining recent stream messages.
//!
//! This module provides a fixed-size ringbuffer with predictable memory
//! usage: once full, every push overwrites the oldest entry.

/// A circular buffer for storing entries with fixed capacity.
///
/// A capacity of zero disables retention entirely; pushes are discarded.
#[derive(Debug, Clone)]
pub struct Ringbuffer<T> {
    entries: Vec<T>,
    capacity: usize,
    write_index: usize,
}

impl<T: Clone> Ringbuffer<T> {
    /// Creates a new ringbuffer with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
        }
    }

    /// Pushes a new entry into the ringbuffer.
    ///
    /// If the buffer is full, the oldest entry will be overwritten.
    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }

        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            self.entries[self.write_index] = entry;
        }
        self.write_index = (self.write_index + 1) % self.capacity;
    }

    /// Returns all entries in chronological order (oldest to newest).
    pub fn get_history(&self) -> Vec<T> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(self.entries.len());

        if self.entries.len() < self.capacity {
            // Buffer not yet full, entries are in insertion order
            result.extend_from_slice(&self.entries);
        } else {
            // Buffer is full, oldest entry sits at write_index
            result.extend_from_slice(&self.entries[self.write_index..]);
            result.extend_from_slice(&self.entries[..self.write_index]);
        }

        result
    }

    /// Returns the most recently pushed entry.
    pub fn latest(&self) -> Option<&T> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        self.entries.get(idx)
    }

    /// Drops all entries, keeping the capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.write_index = 0;
    }

    /// Returns the current number of entries in the buffer.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the maximum capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
