//! Coverable-line enumeration
//!
//! One in-order pass over the instruction order collects every (file, line)
//! frame whose file passes the filter. Unresolved instructions are counted
//! and skipped.

use crate::disasm::Address;
use crate::filter::FileFilter;
use crate::line_set::LineSet;
use crate::line_table::{LineEntry, LineTable, MissingLineInfo};

const PROGRESS_INTERVAL: usize = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverableStats {
    pub instructions: usize,
    /// Instructions the resolver could not map to a source line
    pub unknown: usize,
    pub files: usize,
    pub lines: usize,
}

/// Build the coverable-line universe for `order`
pub fn enumerate_coverable(
    order: &[Address],
    lines: &LineTable,
    filter: &FileFilter,
) -> Result<(LineSet, CoverableStats), MissingLineInfo> {
    let mut coverable = LineSet::new();
    let mut stats = CoverableStats {
        instructions: order.len(),
        ..CoverableStats::default()
    };

    for (i, address) in order.iter().enumerate() {
        match lines.require(*address)? {
            LineEntry::Unknown => stats.unknown += 1,
            LineEntry::Resolved(frames) => {
                for frame in frames.iter().filter(|f| filter.matches(&f.file)) {
                    coverable.insert(&frame.file, frame.line);
                }
            }
        }

        if (i + 1) % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                "{} of {} instructions ({}%)",
                i + 1,
                order.len(),
                (i + 1) * 100 / order.len()
            );
        }
    }

    stats.files = coverable.file_count();
    stats.lines = coverable.line_count();
    Ok((coverable, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_table::SourceLine;

    fn table() -> LineTable {
        let mut table = LineTable::new();
        table.insert(
            0x10,
            LineEntry::Resolved(vec![
                SourceLine::new("/include/linux/file.h", 60),
                SourceLine::new("/fs/open.c", 165),
            ]),
        );
        table.insert(0x14, LineEntry::Resolved(vec![SourceLine::new("/fs/open.c", 166)]));
        table.insert(0x18, LineEntry::Unknown);
        table.insert(0x1c, LineEntry::Resolved(vec![SourceLine::new("/fs/open.c", 165)]));
        table
    }

    #[test]
    fn test_enumerate_applies_filter_per_frame() {
        let filter = FileFilter::from_pattern("^/fs/").unwrap();
        let (set, stats) = enumerate_coverable(&[0x10, 0x14, 0x18, 0x1c], &table(), &filter).unwrap();

        assert_eq!(set.file_count(), 1);
        assert!(set.contains("/fs/open.c", 165));
        assert!(set.contains("/fs/open.c", 166));
        assert!(!set.contains("/include/linux/file.h", 60));
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.instructions, 4);
    }

    #[test]
    fn test_enumerate_with_filter_matching_nothing() {
        let filter = FileFilter::from_pattern("^/drivers/").unwrap();
        let (set, stats) = enumerate_coverable(&[0x10, 0x14, 0x18], &table(), &filter).unwrap();
        assert!(set.is_empty());
        assert_eq!(stats.files, 0);
        assert_eq!(stats.lines, 0);
    }

    #[test]
    fn test_enumerate_missing_entry_is_fatal() {
        let filter = FileFilter::from_pattern(".").unwrap();
        let result = enumerate_coverable(&[0x10, 0x99], &table(), &filter);
        assert_eq!(result.unwrap_err(), MissingLineInfo(0x99));
    }
}
