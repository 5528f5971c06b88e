//! Sets of source lines grouped by file
//!
//! Used for both the coverable universe and the reconstructed coverage.
//! Files and lines iterate in ascending order so rendered output is stable.

use crate::line_table::SourceLine;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineSet {
    files: BTreeMap<String, BTreeSet<u32>>,
}

impl LineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line, returning true if it was not present
    pub fn insert(&mut self, file: &str, line: u32) -> bool {
        match self.files.get_mut(file) {
            Some(lines) => lines.insert(line),
            None => {
                self.files.insert(file.to_string(), BTreeSet::from([line]));
                true
            }
        }
    }

    pub fn insert_frames(&mut self, frames: &[SourceLine]) {
        for frame in frames {
            self.insert(&frame.file, frame.line);
        }
    }

    /// Register a file with no lines yet
    pub fn ensure_file(&mut self, file: &str) {
        if !self.files.contains_key(file) {
            self.files.insert(file.to_string(), BTreeSet::new());
        }
    }

    pub fn contains(&self, file: &str, line: u32) -> bool {
        self.files
            .get(file)
            .is_some_and(|lines| lines.contains(&line))
    }

    pub fn lines(&self, file: &str) -> Option<&BTreeSet<u32>> {
        self.files.get(file)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<u32>)> {
        self.files.iter().map(|(file, lines)| (file.as_str(), lines))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn line_count(&self) -> usize {
        self.files.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True if every line of `self` is also in `other`
    pub fn is_subset(&self, other: &LineSet) -> bool {
        self.files.iter().all(|(file, lines)| {
            other
                .files
                .get(file)
                .is_some_and(|theirs| lines.is_subset(theirs))
        })
    }
}
