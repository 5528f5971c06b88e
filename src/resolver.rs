//! Address-to-source-line resolution
//!
//! Every indexed instruction is resolved to its inlining chain in fixed-size
//! batches. Two backends implement [`SourceResolver`]:
//! - [`crate::dwarf::DwarfContext`], in-process via the addr2line crate
//! - [`Addr2lineTool`], the binutils `addr2line -p -i` executable
//!
//! Paths are normalized here once so that every later stage can compare
//! them by plain string equality.

use crate::disasm::Address;
use crate::line_table::{LineEntry, LineTable, SourceLine};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// File name reported for addresses without debug info
pub const UNKNOWN_FILE: &str = "??";

const INLINED_PREFIX: &str = " (inlined by) ";

/// One frame as reported by a backend, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub file: String,
    /// `None` when the backend printed `?` or 0
    pub line: Option<u32>,
}

impl RawFrame {
    pub fn new(file: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// Resolves batches of addresses to inlining chains, innermost frame first
pub trait SourceResolver {
    /// Must return exactly one chain per input address, in input order
    fn resolve_batch(&mut self, addresses: &[Address]) -> Result<Vec<Vec<RawFrame>>>;
}

/// Which resolver implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverBackend {
    /// In-process DWARF parsing
    #[default]
    Dwarf,
    /// External binutils addr2line
    Addr2line,
}

/// Rewrites resolver paths relative to the source tree root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathNormalizer {
    source_root: Option<String>,
}

impl PathNormalizer {
    pub fn new(source_root: Option<&Path>) -> Self {
        Self {
            source_root: source_root
                .map(|root| root.to_string_lossy().trim_end_matches('/').to_string()),
        }
    }

    /// Use the directory containing the binary as the source root
    pub fn for_binary(binary: &Path) -> Self {
        Self::new(binary.parent().filter(|p| !p.as_os_str().is_empty()))
    }

    /// Strip the source root, drop `.` and empty segments, keep a leading `/`
    pub fn normalize(&self, path: &str) -> String {
        let relative = self
            .source_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root))
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(path);
        relative
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .fold(String::new(), |mut out, segment| {
                out.push('/');
                out.push_str(segment);
                out
            })
    }
}

/// Turn a backend chain into a line table entry
///
/// Frames without a usable line number are dropped; a chain whose innermost
/// frame is `??`, or that ends up empty, is unresolved.
pub fn to_line_entry(chain: Vec<RawFrame>, normalizer: &PathNormalizer) -> LineEntry {
    if chain.first().map_or(true, |frame| frame.file == UNKNOWN_FILE) {
        return LineEntry::Unknown;
    }
    let frames = chain
        .into_iter()
        .filter(|frame| frame.file != UNKNOWN_FILE)
        .filter_map(|frame| match frame.line {
            Some(line) if line > 0 => Some(SourceLine::new(normalizer.normalize(&frame.file), line)),
            _ => None,
        })
        .collect();
    LineEntry::from_chain(frames)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub addresses: usize,
    pub batches: usize,
    pub unknown: usize,
}

/// Resolve every address of the instruction order
pub fn resolve_all(
    order: &[Address],
    resolver: &mut dyn SourceResolver,
    batch_size: usize,
    normalizer: &PathNormalizer,
) -> Result<(LineTable, ResolveStats)> {
    if batch_size == 0 {
        bail!("Resolver batch size must be greater than zero");
    }

    let mut table = LineTable::new();
    let mut stats = ResolveStats::default();
    let batch_count = order.len().div_ceil(batch_size);

    for batch in order.chunks(batch_size) {
        let chains = resolver.resolve_batch(batch)?;
        if chains.len() != batch.len() {
            bail!(
                "Resolver returned {} results for {} addresses",
                chains.len(),
                batch.len()
            );
        }
        for (address, chain) in batch.iter().zip(chains) {
            let entry = to_line_entry(chain, normalizer);
            if entry.is_unknown() {
                stats.unknown += 1;
            }
            table.insert(*address, entry);
        }
        stats.batches += 1;
        stats.addresses += batch.len();
        tracing::info!(
            "{} of {} batches ({}%)",
            stats.batches,
            batch_count,
            stats.batches * 100 / batch_count
        );
    }

    Ok((table, stats))
}

/// Parse `file:line` as printed by `addr2line -p`
///
/// The split uses the last colon. Anything after the line number, such as
/// ` (discriminator 3)`, is ignored.
fn parse_location(text: &str) -> RawFrame {
    let location = text.split(' ').next().unwrap_or("");
    match location.rsplit_once(':') {
        Some((file, line)) => RawFrame::new(file, line.parse().ok()),
        None => RawFrame::new(location, None),
    }
}

/// Split `addr2line -p -i` output into one chain per queried address
pub fn parse_addr2line_output(output: &str) -> Vec<Vec<RawFrame>> {
    let mut chains: Vec<Vec<RawFrame>> = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match line.strip_prefix(INLINED_PREFIX) {
            Some(inlined) => match chains.last_mut() {
                Some(chain) => chain.push(parse_location(inlined)),
                None => tracing::warn!("Inlined frame without a leading location: {}", line),
            },
            None => chains.push(vec![parse_location(line)]),
        }
    }
    chains
}

/// Runs the external `addr2line` executable once per batch
#[derive(Debug, Clone)]
pub struct Addr2lineTool {
    program: PathBuf,
    binary: PathBuf,
}

impl Addr2lineTool {
    pub fn new(program: impl Into<PathBuf>, binary: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            binary: binary.into(),
        }
    }
}

impl SourceResolver for Addr2lineTool {
    fn resolve_batch(&mut self, addresses: &[Address]) -> Result<Vec<Vec<RawFrame>>> {
        let output = Command::new(&self.program)
            .args(["-p", "-i", "-C", "-e"])
            .arg(&self.binary)
            .args(addresses.iter().map(|address| format!("{:#x}", address)))
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(parse_addr2line_output(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Resolver backed by a fixed map, for exercising batching
    struct MapResolver {
        chains: HashMap<Address, Vec<RawFrame>>,
        batch_sizes: Vec<usize>,
    }

    impl SourceResolver for MapResolver {
        fn resolve_batch(&mut self, addresses: &[Address]) -> Result<Vec<Vec<RawFrame>>> {
            self.batch_sizes.push(addresses.len());
            Ok(addresses
                .iter()
                .map(|a| {
                    self.chains
                        .get(a)
                        .cloned()
                        .unwrap_or_else(|| vec![RawFrame::new("??", None)])
                })
                .collect())
        }
    }

    #[test]
    fn test_normalize_strips_root_and_dot_segments() {
        let normalizer = PathNormalizer::new(Some(Path::new("/opt/kernel/linux")));
        assert_eq!(
            normalizer.normalize("/opt/kernel/linux/./fs/open.c"),
            "/fs/open.c"
        );
        assert_eq!(
            normalizer.normalize("/opt/kernel/linux/include/linux//file.h"),
            "/include/linux/file.h"
        );
        assert_eq!(normalizer.normalize("/usr/include/stdio.h"), "/usr/include/stdio.h");
        assert_eq!(
            normalizer.normalize("/opt/kernel/linux-next/fs/open.c"),
            "/opt/kernel/linux-next/fs/open.c"
        );
    }

    #[test]
    fn test_normalizer_for_binary_uses_parent() {
        let normalizer = PathNormalizer::for_binary(Path::new("/opt/kernel/linux/vmlinux"));
        assert_eq!(normalizer.normalize("/opt/kernel/linux/mm/slab.c"), "/mm/slab.c");
        assert_eq!(
            PathNormalizer::for_binary(Path::new("vmlinux")),
            PathNormalizer::default()
        );
    }

    #[test]
    fn test_parse_addr2line_output_groups_inlined_frames() {
        let output = "/src/include/linux/file.h:60\n \
                      (inlined by) /src/fs/open.c:165\n\
                      /src/fs/open.c:170 (discriminator 2)\n\
                      ??:?\n\
                      ??:0\n";
        let chains = parse_addr2line_output(output);
        assert_eq!(chains.len(), 4);
        assert_eq!(
            chains[0],
            vec![
                RawFrame::new("/src/include/linux/file.h", Some(60)),
                RawFrame::new("/src/fs/open.c", Some(165)),
            ]
        );
        assert_eq!(chains[1], vec![RawFrame::new("/src/fs/open.c", Some(170))]);
        assert_eq!(chains[2], vec![RawFrame::new("??", None)]);
        assert_eq!(chains[3], vec![RawFrame::new("??", Some(0))]);
    }

    #[test]
    fn test_to_line_entry() {
        let normalizer = PathNormalizer::new(Some(Path::new("/src")));
        assert!(to_line_entry(vec![RawFrame::new("??", None)], &normalizer).is_unknown());
        assert!(to_line_entry(Vec::new(), &normalizer).is_unknown());
        assert!(to_line_entry(vec![RawFrame::new("/src/a.c", Some(0))], &normalizer).is_unknown());

        let entry = to_line_entry(
            vec![
                RawFrame::new("/src/./a.h", Some(3)),
                RawFrame::new("/src/b.c", None),
                RawFrame::new("/src/c.c", Some(9)),
            ],
            &normalizer,
        );
        assert_eq!(
            entry,
            LineEntry::Resolved(vec![SourceLine::new("/a.h", 3), SourceLine::new("/c.c", 9)])
        );
    }

    #[test]
    fn test_resolve_all_batches() {
        let mut resolver = MapResolver {
            chains: HashMap::from([(0x10, vec![RawFrame::new("/src/a.c", Some(1))])]),
            batch_sizes: Vec::new(),
        };
        let order: Vec<Address> = (0..5).map(|i| 0x10 + i * 4).collect();
        let normalizer = PathNormalizer::new(Some(Path::new("/src")));

        let (table, stats) = resolve_all(&order, &mut resolver, 2, &normalizer).unwrap();

        assert_eq!(resolver.batch_sizes, vec![2, 2, 1]);
        assert_eq!(table.len(), 5);
        assert_eq!(stats.unknown, 4);
        assert_eq!(stats.batches, 3);
        assert_eq!(
            table.get(0x10),
            Some(&LineEntry::Resolved(vec![SourceLine::new("/a.c", 1)]))
        );
    }

    #[test]
    fn test_resolve_all_rejects_zero_batch_size() {
        let mut resolver = MapResolver {
            chains: HashMap::new(),
            batch_sizes: Vec::new(),
        };
        assert!(resolve_all(&[0x10], &mut resolver, 0, &PathNormalizer::default()).is_err());
    }

    #[test]
    fn test_resolve_all_rejects_short_results() {
        struct Short;
        impl SourceResolver for Short {
            fn resolve_batch(&mut self, _: &[Address]) -> Result<Vec<Vec<RawFrame>>> {
                Ok(Vec::new())
            }
        }
        let result = resolve_all(&[0x10], &mut Short, 10, &PathNormalizer::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_addr2line_tool_missing_program() {
        let mut tool = Addr2lineTool::new("/nonexistent/addr2line", "/nonexistent/vmlinux");
        assert!(tool.resolve_batch(&[0x10]).is_err());
    }
}
