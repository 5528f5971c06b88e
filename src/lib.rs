//! asmcov - source-line coverage reconstruction from sampled instruction pointers
//!
//! A fuzzer records instruction pointers from a kernel under test. This
//! library turns those samples into per-file sets of covered source lines,
//! using a disassembly listing of the kernel image and its debug info.
//!
//! The pipeline is a sequence of independent stages, each reading and
//! writing complete artifacts:
//!
//! 1. [`disasm`] indexes an `objdump -d` listing into instruction order and
//!    jump info.
//! 2. [`resolver`] (backed by [`dwarf`] or an external addr2line) maps every
//!    instruction to its inlining chain of source lines.
//! 3. [`coverable`] enumerates every line of the selected files that
//!    compiled code can reach.
//! 4. [`reconstruct`] walks forward from each sampled pointer to the next
//!    jump, recording every line it crosses.
//! 5. [`compare`] intersects covered lines with the coverable universe.

pub mod artifact;
pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod coverable;
pub mod disasm;
pub mod dwarf;
pub mod filter;
pub mod line_file;
pub mod line_set;
pub mod line_table;
pub mod reconstruct;
pub mod resolver;
pub mod trace;
