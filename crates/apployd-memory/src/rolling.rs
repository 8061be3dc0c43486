//! Bounded FIFO logs stored as delimited context strings.

use std::collections::VecDeque;

/// Delimiter used for the comma-joined topic log.
pub const TOPIC_DELIMITER: char = ',';
/// Delimiter used for the opinion and fact logs.
pub const CLAIM_DELIMITER: char = '|';

/// Distinct-entry log with FIFO eviction once `capacity` is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingLog {
    entries: VecDeque<String>,
    capacity: usize,
    delimiter: char,
}

impl RollingLog {
    /// Create an empty log.
    pub fn new(delimiter: char, capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            delimiter,
        }
    }

    /// Parse a stored context value. Missing or empty values yield an empty log.
    ///
    /// A stored value longer than `capacity` keeps its newest entries.
    pub fn parse(raw: Option<&str>, delimiter: char, capacity: usize) -> Self {
        let mut log = Self::new(delimiter, capacity);
        if let Some(raw) = raw {
            for entry in raw.split(delimiter) {
                let entry = entry.trim();
                if !entry.is_empty() {
                    log.entries.push_back(entry.to_string());
                }
            }
        }
        while log.entries.len() > log.capacity {
            log.entries.pop_front();
        }
        log
    }

    /// Append an entry unless an equal one is already present.
    ///
    /// The delimiter is replaced by a space so an entry never splits on re-read.
    /// Returns `true` when the log changed.
    pub fn push_unique(&mut self, entry: &str) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let entry = entry.replace(self.delimiter, " ");
        let entry = entry.trim();
        if entry.is_empty() || self.entries.iter().any(|existing| existing == entry) {
            return false;
        }
        self.entries.push_back(entry.to_string());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Join entries with the delimiter for storage.
    pub fn render(&self) -> String {
        let mut delimiter = [0u8; 4];
        let delimiter: &str = self.delimiter.encode_utf8(&mut delimiter);
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}
