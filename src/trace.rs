//! Instruction-pointer trace input
//!
//! The fuzzer writes one pointer per line as a `0x`-prefixed literal. The
//! prefix is stripped and the rest parsed as hex, giving the same address
//! value the disassembly indexer produced.

use crate::disasm::Address;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse one trace line into an address
pub fn parse_pointer(text: &str) -> Option<Address> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    Address::from_str_radix(digits, 16).ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub lines: usize,
    pub malformed: usize,
}

/// Sampled instruction pointers in recorded order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    addresses: Vec<Address>,
}

impl Trace {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<(Self, TraceStats)> {
        let mut addresses = Vec::new();
        let mut stats = TraceStats::default();
        for line in reader.lines() {
            let line = line.context("Failed to read trace")?;
            if line.trim().is_empty() {
                continue;
            }
            stats.lines += 1;
            match parse_pointer(&line) {
                Some(address) => addresses.push(address),
                None => {
                    tracing::warn!("Skipping malformed trace entry: {:?}", line);
                    stats.malformed += 1;
                }
            }
        }
        Ok((Self { addresses }, stats))
    }

    pub fn load(path: &Path) -> Result<(Self, TraceStats)> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open trace: {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Drop repeated addresses, keeping the first occurrence of each.
    /// Returns how many entries were removed.
    pub fn dedup(&mut self) -> usize {
        let before = self.addresses.len();
        let mut seen = HashSet::with_capacity(before);
        self.addresses.retain(|address| seen.insert(*address));
        before - self.addresses.len()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
