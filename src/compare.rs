//! Covered vs coverable comparison
//!
//! Intersects reconstructed coverage with a coverable universe loaded from a
//! line-set file. Paths are compared by exact string equality; covered
//! files outside the universe simply contribute nothing.

use crate::line_set::LineSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Coverage of one file (or directory, when aggregated)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCoverage {
    pub file: String,
    pub covered: usize,
    pub coverable: usize,
}

impl FileCoverage {
    pub fn percentage(&self) -> f64 {
        percentage(self.covered, self.coverable)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    /// Covered lines that are also coverable
    #[serde(skip)]
    pub matched: LineSet,
    /// Files with at least one matched line
    pub per_file: Vec<FileCoverage>,
    pub matched_total: usize,
    pub coverable_total: usize,
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Intersect covered lines with the coverable universe
pub fn compare(covered: &LineSet, coverable: &LineSet) -> Comparison {
    let mut matched = LineSet::new();
    let mut per_file = Vec::new();

    for (file, covered_lines) in covered.iter() {
        let Some(coverable_lines) = coverable.lines(file) else {
            continue;
        };
        let mut count = 0;
        for line in covered_lines.intersection(coverable_lines) {
            matched.insert(file, *line);
            count += 1;
        }
        if count > 0 {
            per_file.push(FileCoverage {
                file: file.to_string(),
                covered: count,
                coverable: coverable_lines.len(),
            });
        }
    }

    Comparison {
        matched_total: matched.line_count(),
        coverable_total: coverable.line_count(),
        matched,
        per_file,
    }
}

impl Comparison {
    pub fn percentage(&self) -> f64 {
        percentage(self.matched_total, self.coverable_total)
    }

    /// `M of T (P%) lines are covered in <name>`
    pub fn summary_line(&self, coverable_name: &Path) -> String {
        format!(
            "{} of {} ({:.1}%) lines are covered in {}",
            self.matched_total,
            self.coverable_total,
            self.percentage(),
            coverable_name.display()
        )
    }

    /// Aggregate per-file rows by parent directory
    pub fn per_directory(&self) -> Vec<FileCoverage> {
        let mut dirs: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for row in &self.per_file {
            let dir = match row.file.rfind('/') {
                Some(0) => "/".to_string(),
                Some(pos) => row.file[..pos].to_string(),
                None => ".".to_string(),
            };
            let entry = dirs.entry(dir).or_default();
            entry.0 += row.covered;
            entry.1 += row.coverable;
        }
        dirs.into_iter()
            .map(|(file, (covered, coverable))| FileCoverage {
                file,
                covered,
                coverable,
            })
            .collect()
    }
}

/// Render coverage rows as an aligned text table
pub fn render_table(rows: &[FileCoverage], first_column: &str) -> String {
    let width = rows
        .iter()
        .map(|r| r.file.len())
        .chain(std::iter::once(first_column.len()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>8}  {:>9}  {:>7}",
        first_column, "covered", "coverable", "percent"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<width$}  {:>8}  {:>9}  {:>6.1}%",
            row.file,
            row.covered,
            row.coverable,
            row.percentage()
        );
    }
    out
}
