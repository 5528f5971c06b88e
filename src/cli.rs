//! CLI argument parsing for asmcov

use crate::resolver::ResolverBackend;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for coverage summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "asmcov")]
#[command(version)]
#[command(about = "Reconstruct source-line coverage from sampled instruction pointers", long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index a disassembly listing into instruction order and jump info
    Index(IndexArgs),
    /// Resolve every indexed instruction to its source lines
    Resolve(ResolveArgs),
    /// Enumerate coverable lines of files matching a filter
    Coverable(CoverableArgs),
    /// Reconstruct covered lines from an instruction-pointer trace
    Covered(CoveredArgs),
    /// Intersect covered lines with a coverable-lines file
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Listing produced by `objdump -dj .text`
    #[arg(long, value_name = "FILE")]
    pub objdump: PathBuf,

    /// Where to write the instruction order
    #[arg(long, value_name = "FILE")]
    pub output_order: PathBuf,

    /// Where to write the jump info
    #[arg(long, value_name = "FILE")]
    pub output_jumps: PathBuf,

    /// Width of the listing's address field
    #[arg(long, value_name = "N")]
    pub address_width: Option<usize>,

    /// Column where the mnemonic starts
    #[arg(long, value_name = "N")]
    pub mnemonic_column: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Binary with debug info (e.g. vmlinux)
    #[arg(long, value_name = "FILE")]
    pub binary: PathBuf,

    /// Instruction order written by `asmcov index`
    #[arg(long, value_name = "FILE")]
    pub instr_order: PathBuf,

    /// Where to write the line info
    #[arg(long, value_name = "FILE")]
    pub output_lines: PathBuf,

    /// Prefix stripped from source paths (default: the binary's directory)
    #[arg(long, value_name = "DIR")]
    pub source_root: Option<PathBuf>,

    /// Addresses per resolver invocation
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Resolver implementation
    #[arg(long, value_enum)]
    pub backend: Option<ResolverBackend>,

    /// addr2line executable for the addr2line backend
    #[arg(long, value_name = "PATH")]
    pub addr2line: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CoverableArgs {
    /// Instruction order written by `asmcov index`
    #[arg(long, value_name = "FILE")]
    pub instr_order: PathBuf,

    /// Line info written by `asmcov resolve`
    #[arg(long, value_name = "FILE")]
    pub instr_lines: PathBuf,

    /// Regex selecting the source files to consider (e.g. "^/fs/")
    #[arg(long, value_name = "REGEX")]
    pub file_filter: String,

    /// Where to write the coverable lines
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct CoveredArgs {
    /// Instruction-pointer trace, one 0x-prefixed address per line
    #[arg(long, value_name = "FILE")]
    pub instr_ptrs: PathBuf,

    /// Instruction order written by `asmcov index`
    #[arg(long, value_name = "FILE")]
    pub instr_order: PathBuf,

    /// Jump info written by `asmcov index`
    #[arg(long, value_name = "FILE")]
    pub instr_jumps: PathBuf,

    /// Line info written by `asmcov resolve`
    #[arg(long, value_name = "FILE")]
    pub instr_lines: PathBuf,

    /// Coverable lines written by `asmcov coverable`; when given, only
    /// covered lines that are also coverable are written
    #[arg(long, value_name = "FILE")]
    pub all_coverable_lines: Option<PathBuf>,

    /// Where to write the covered lines
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,

    /// Walk each distinct trace address only once
    #[arg(long)]
    pub dedup_trace: bool,

    /// Print per-file coverage (requires --all-coverable-lines)
    #[arg(long, requires = "all_coverable_lines")]
    pub per_file: bool,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Covered lines written by `asmcov covered`
    #[arg(long, value_name = "FILE")]
    pub covered: PathBuf,

    /// Coverable lines written by `asmcov coverable`
    #[arg(long, value_name = "FILE")]
    pub coverable: PathBuf,

    /// Where to write the intersection
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,

    /// Print per-file coverage
    #[arg(long)]
    pub per_file: bool,

    /// Print coverage aggregated per directory
    #[arg(long)]
    pub per_directory: bool,

    /// Summary output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,
}
