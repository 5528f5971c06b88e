//! Per-instruction source line information
//!
//! Each instruction address maps to an inlining chain of (file, line)
//! frames, innermost first, or to `Unknown` when the debug info has no
//! location for it.

use crate::disasm::Address;
use crate::line_set::LineSet;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A line table lookup failed for an address that must be resolved
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no line information for instruction {0:#x}")]
pub struct MissingLineInfo(pub Address);

/// One source location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLine {
    /// Path relative to the source root
    pub file: String,
    pub line: u32,
}

impl SourceLine {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// Line information of one instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEntry {
    /// Resolver reported `??:?`
    Unknown,
    /// Inlining chain, innermost frame first
    Resolved(Vec<SourceLine>),
}

impl LineEntry {
    /// An empty chain is unresolved
    pub fn from_chain(chain: Vec<SourceLine>) -> Self {
        if chain.is_empty() {
            Self::Unknown
        } else {
            Self::Resolved(chain)
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn frames(&self) -> &[SourceLine] {
        match self {
            Self::Unknown => &[],
            Self::Resolved(frames) => frames,
        }
    }
}

/// Line information for every indexed instruction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineTable {
    entries: FnvHashMap<Address, LineEntry>,
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: Address, entry: LineEntry) {
        self.entries.insert(address, entry);
    }

    pub fn get(&self, address: Address) -> Option<&LineEntry> {
        self.entries.get(&address)
    }

    /// Lookup that treats a missing entry as an input error
    pub fn require(&self, address: Address) -> Result<&LineEntry, MissingLineInfo> {
        self.entries.get(&address).ok_or(MissingLineInfo(address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unknown_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_unknown()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &LineEntry)> {
        self.entries.iter()
    }

    /// Every (file, line) pair any instruction resolves to
    pub fn universe(&self) -> LineSet {
        let mut set = LineSet::new();
        for entry in self.entries.values() {
            set.insert_frames(entry.frames());
        }
        set
    }
}
