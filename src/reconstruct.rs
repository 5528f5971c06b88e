//! Covered-line reconstruction from a sampled trace
//!
//! A trace only holds isolated program-counter samples. Each sample is
//! extended forward through the instruction order until the next
//! control-flow transfer, assuming straight-line fall-through execution,
//! and every source line met on the way is marked covered.
//!
//! Walk for one sample:
//! - sample not in the index: counted as not found, nothing recorded
//! - unresolved instruction: walk stops
//! - jump instruction: its lines are recorded, then the walk stops
//! - end of the instruction order: walk aborted
//!
//! A missing line table entry for an indexed instruction means the
//! artifacts do not belong together and aborts the whole run.

use crate::disasm::{Address, InstructionIndex};
use crate::line_set::LineSet;
use crate::line_table::{LineEntry, LineTable, MissingLineInfo, SourceLine};
use serde::Serialize;

const PROGRESS_INTERVAL: usize = 10_000;

/// How a single forward walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Start address unknown to the static index
    NotFound,
    /// Reached an instruction without source information
    Unresolved,
    /// Reached (and recorded) a control-flow transfer
    ReachedJump,
    /// Fell off the end of the instruction order
    RanOffEnd,
}

/// Diagnostic counters for one reconstruction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructStats {
    /// Trace entries walked
    pub entries: u64,
    pub not_found: u64,
    pub unresolved: u64,
    pub reached_jump: u64,
    pub ran_off_end: u64,
    /// Steps where the outermost file changed without a jump in between
    pub inconsistent_files: u64,
}

impl ReconstructStats {
    fn record(&mut self, outcome: WalkOutcome) {
        self.entries += 1;
        match outcome {
            WalkOutcome::NotFound => self.not_found += 1,
            WalkOutcome::Unresolved => self.unresolved += 1,
            WalkOutcome::ReachedJump => self.reached_jump += 1,
            WalkOutcome::RanOffEnd => self.ran_off_end += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub covered: LineSet,
    pub stats: ReconstructStats,
}

/// Accumulates covered lines over any number of walks
pub struct Reconstructor<'a> {
    index: &'a InstructionIndex,
    lines: &'a LineTable,
    covered: LineSet,
    stats: ReconstructStats,
    progress_interval: usize,
}

impl<'a> Reconstructor<'a> {
    pub fn new(index: &'a InstructionIndex, lines: &'a LineTable) -> Self {
        Self {
            index,
            lines,
            covered: LineSet::new(),
            stats: ReconstructStats::default(),
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Walk forward from one sampled address
    pub fn walk(&mut self, start: Address) -> Result<WalkOutcome, MissingLineInfo> {
        let outcome = self.walk_from(start)?;
        self.stats.record(outcome);
        Ok(outcome)
    }

    fn walk_from(&mut self, start: Address) -> Result<WalkOutcome, MissingLineInfo> {
        let index = self.index;
        let lines = self.lines;

        let Some(mut info) = index.get(start) else {
            return Ok(WalkOutcome::NotFound);
        };
        let mut cursor = start;
        let mut last_recorded: Option<&[SourceLine]> = None;

        loop {
            let frames = match lines.require(cursor)? {
                LineEntry::Unknown => return Ok(WalkOutcome::Unresolved),
                LineEntry::Resolved(frames) => frames.as_slice(),
            };

            if let Some(previous) = last_recorded {
                if outermost_file(previous) != outermost_file(frames) {
                    self.stats.inconsistent_files += 1;
                }
            }

            if last_recorded != Some(frames) {
                self.covered.insert_frames(frames);
                last_recorded = Some(frames);
            }

            if info.is_jump {
                return Ok(WalkOutcome::ReachedJump);
            }

            match index.successor(info) {
                Some((next, next_info)) => {
                    cursor = next;
                    info = next_info;
                }
                None => {
                    tracing::debug!(
                        "Walk from {:#x} ran out of instructions at {:#x}",
                        start,
                        cursor
                    );
                    return Ok(WalkOutcome::RanOffEnd);
                }
            }
        }
    }

    /// Walk every trace entry in order
    pub fn run(mut self, trace: &[Address]) -> Result<Reconstruction, MissingLineInfo> {
        for (i, address) in trace.iter().enumerate() {
            self.walk(*address)?;
            if self.progress_interval > 0 && (i + 1) % self.progress_interval == 0 {
                tracing::info!(
                    "{}/{} trace entries ({}%)",
                    i + 1,
                    trace.len(),
                    (i + 1) * 100 / trace.len()
                );
            }
        }
        Ok(self.finish())
    }

    pub fn finish(self) -> Reconstruction {
        Reconstruction {
            covered: self.covered,
            stats: self.stats,
        }
    }
}

/// Inlining chains are compared on their last frame only
fn outermost_file(frames: &[SourceLine]) -> Option<&str> {
    frames.last().map(|frame| frame.file.as_str())
}

/// Reconstruct covered lines for a whole trace
pub fn reconstruct(
    trace: &[Address],
    index: &InstructionIndex,
    lines: &LineTable,
) -> Result<Reconstruction, MissingLineInfo> {
    Reconstructor::new(index, lines).run(trace)
}
