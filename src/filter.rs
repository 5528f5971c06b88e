//! Source file filtering for coverable-line enumeration
//!
//! Patterns are regular expressions searched anywhere in the root-relative
//! path, so `^/fs/` restricts to one subsystem and `\.c$` to C sources.

use anyhow::{Context, Result};
use regex::Regex;

/// Decides which source files count towards the coverable universe
#[derive(Debug, Clone)]
pub struct FileFilter {
    pattern: Regex,
}

impl FileFilter {
    /// Compile a filter expression
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .with_context(|| format!("Invalid file filter regex: {}", pattern))?;
        Ok(Self { pattern })
    }

    /// Check if a file's lines should be counted
    pub fn matches(&self, file: &str) -> bool {
        self.pattern.is_match(file)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}
