//! Session memory
//!
//! Filenames the user has declared ("budget.csv is a file") are
//! remembered for the lifetime of the session so later bare mentions can
//! be recalled as read targets. The set is insertion-ordered, lower-cased
//! and bounded: past capacity the oldest entry is evicted.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::VecDeque;

lazy_static! {
    static ref DECLARE_RE: Regex =
        Regex::new(r"(?i)\b([A-Za-z0-9_\-./]+)\b\s+is\s+a\s+file").unwrap();
}

/// Default number of remembered filenames.
pub const DEFAULT_CAPACITY: usize = 256;

/// Per-session set of declared filenames.
#[derive(Debug)]
pub struct SessionMemory {
    files: VecDeque<String>,
    capacity: usize,
}

impl Default for SessionMemory {
    fn default() -> Self {
        SessionMemory::new(DEFAULT_CAPACITY)
    }
}

impl SessionMemory {
    pub fn new(capacity: usize) -> Self {
        SessionMemory {
            files: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Harvest every "`X` is a file" declaration in `text`.
    pub fn learn_from(&mut self, text: &str) {
        for caps in DECLARE_RE.captures_iter(text) {
            self.remember(&caps[1]);
        }
    }

    /// Remember one filename (lower-cased), evicting the oldest entry
    /// once capacity is exceeded.
    pub fn remember(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        if name.is_empty() || self.files.contains(&name) {
            return;
        }
        self.files.push_back(name);
        if self.files.len() > self.capacity {
            self.files.pop_front();
        }
    }

    /// First remembered filename mentioned as a whole word in `text`,
    /// case-insensitively.
    pub fn recall(&self, text: &str) -> Option<&str> {
        for name in &self.files {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(name));
            if let Ok(re) = Regex::new(&pattern) {
                if re.is_match(text) {
                    return Some(name);
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == &name.to_lowercase())
    }

    /// Drop everything remembered this session.
    pub fn reset(&mut self) {
        self.files.clear();
    }
}
