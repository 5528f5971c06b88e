//! Line-set file format
//!
//! ```text
//! file_count:2 line_count:3
//! file:/fs/open.c
//! 165
//! 170
//!
//! file:/include/linux/file.h
//! 60
//!
//! ```
//!
//! Coverable-line files, raw covered-line files and intersections all use
//! this format. A malformed header is fatal: every count derived from the
//! file would be meaningless.

use crate::line_set::LineSet;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

const FILE_PREFIX: &str = "file:";

#[derive(Error, Debug)]
pub enum LineFileError {
    #[error("Bad file format: malformed header {0:?}")]
    BadHeader(String),

    #[error("Bad file format: line {line_no} has a line number outside of any file section")]
    OrphanLine { line_no: usize },

    #[error("Bad file format: line {line_no} is not a line number: {text:?}")]
    BadLine { line_no: usize, text: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts recorded in the first line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFileHeader {
    pub file_count: usize,
    pub line_count: usize,
}

impl LineFileHeader {
    pub fn of(set: &LineSet) -> Self {
        Self {
            file_count: set.file_count(),
            line_count: set.line_count(),
        }
    }

    fn parse(text: &str) -> Result<Self, LineFileError> {
        let bad = || LineFileError::BadHeader(text.to_string());
        let mut fields = text.split_whitespace();
        let file_count = fields
            .next()
            .and_then(|f| f.strip_prefix("file_count:"))
            .and_then(|v| v.parse().ok())
            .ok_or_else(bad)?;
        let line_count = fields
            .next()
            .and_then(|f| f.strip_prefix("line_count:"))
            .and_then(|v| v.parse().ok())
            .ok_or_else(bad)?;
        if fields.next().is_some() {
            return Err(bad());
        }
        Ok(Self {
            file_count,
            line_count,
        })
    }
}

/// Render a line set in the line-set file format
pub fn render(set: &LineSet) -> String {
    let header = LineFileHeader::of(set);
    let mut out = format!(
        "file_count:{} line_count:{}\n",
        header.file_count, header.line_count
    );
    for (file, lines) in set.iter() {
        let _ = writeln!(out, "{FILE_PREFIX}{file}");
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        out.push('\n');
    }
    out
}

pub fn save(set: &LineSet, path: &Path) -> Result<(), LineFileError> {
    let mut file = fs::File::create(path)?;
    file.write_all(render(set).as_bytes())?;
    Ok(())
}

/// Parse a line-set file, returning its header and contents
pub fn parse(text: &str) -> Result<(LineFileHeader, LineSet), LineFileError> {
    let mut lines = text.lines();
    let header = LineFileHeader::parse(lines.next().unwrap_or(""))?;

    let mut set = LineSet::new();
    let mut current: Option<&str> = None;
    for (offset, line) in lines.enumerate() {
        let line_no = offset + 2;
        if let Some(file) = line.strip_prefix(FILE_PREFIX) {
            set.ensure_file(file);
            current = Some(file);
        } else if !line.trim().is_empty() {
            let file = current.ok_or(LineFileError::OrphanLine { line_no })?;
            let number = line.trim().parse().map_err(|_| LineFileError::BadLine {
                line_no,
                text: line.to_string(),
            })?;
            set.insert(file, number);
        }
    }
    Ok((header, set))
}

pub fn load(path: &Path) -> Result<(LineFileHeader, LineSet), LineFileError> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}
