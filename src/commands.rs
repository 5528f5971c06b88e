//! Stage runners behind each subcommand
//!
//! Each runner loads complete input artifacts, runs one pipeline stage and
//! writes a complete output artifact. Final counts go to stdout; progress
//! and tolerated anomalies go through `tracing`.

use crate::artifact;
use crate::cli::{CompareArgs, CoverableArgs, CoveredArgs, IndexArgs, OutputFormat, ResolveArgs};
use crate::compare::{compare, render_table, Comparison};
use crate::config::PipelineConfig;
use crate::coverable::enumerate_coverable;
use crate::disasm::{index_listing, InstructionIndex};
use crate::dwarf::DwarfContext;
use crate::filter::FileFilter;
use crate::line_file::{self, LineFileHeader};
use crate::line_set::LineSet;
use crate::reconstruct::Reconstructor;
use crate::resolver::{resolve_all, Addr2lineTool, PathNormalizer, ResolverBackend, SourceResolver};
use crate::trace::Trace;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

pub fn run_index(args: &IndexArgs, config: &PipelineConfig) -> Result<()> {
    let started = Instant::now();
    let mut layout = config.listing;
    if let Some(width) = args.address_width {
        layout.address_width = width;
    }
    if let Some(column) = args.mnemonic_column {
        layout.mnemonic_column = column;
    }
    anyhow::ensure!(
        layout.mnemonic_column > layout.address_width,
        "mnemonic column ({}) must be past the address field ({})",
        layout.mnemonic_column,
        layout.address_width
    );

    let file = File::open(&args.objdump)
        .with_context(|| format!("Failed to open listing: {}", args.objdump.display()))?;
    let (index, stats) = index_listing(BufReader::new(file), &layout)
        .with_context(|| format!("Failed to index {}", args.objdump.display()))?;

    artifact::save_index(&index, &args.output_order, &args.output_jumps)?;

    println!(
        "useless_instr: {} count of nop: {}",
        stats.useless_lines, stats.nops
    );
    if stats.empty_mnemonics > 0 {
        println!("instructions without mnemonic: {}", stats.empty_mnemonics);
    }
    println!(
        "Indexed {} instructions ({} jumps) from {} lines",
        stats.instructions,
        index.jump_count(),
        stats.total_lines
    );
    println!("{:.1} seconds after start", started.elapsed().as_secs_f64());
    Ok(())
}

pub fn run_resolve(args: &ResolveArgs, config: &PipelineConfig) -> Result<()> {
    let started = Instant::now();
    let order = artifact::load_order(&args.instr_order)?;
    tracing::info!("Instruction order loaded with {} instructions", order.len());

    let batch_size = args.batch_size.unwrap_or(config.resolver.batch_size);
    let backend = args.backend.unwrap_or(config.resolver.backend);
    let normalizer = match args
        .source_root
        .as_deref()
        .or(config.resolver.source_root.as_deref())
    {
        Some(root) => PathNormalizer::new(Some(root)),
        None => PathNormalizer::for_binary(&args.binary),
    };

    let mut resolver: Box<dyn SourceResolver> = match backend {
        ResolverBackend::Dwarf => Box::new(DwarfContext::load(&args.binary)?),
        ResolverBackend::Addr2line => Box::new(Addr2lineTool::new(
            args.addr2line
                .clone()
                .unwrap_or_else(|| config.resolver.addr2line.clone()),
            &args.binary,
        )),
    };

    let (table, stats) = resolve_all(&order, resolver.as_mut(), batch_size, &normalizer)?;
    artifact::save_lines(&table, &args.output_lines)?;

    println!(
        "Resolved {} addresses in {} batches, {} unknown",
        stats.addresses, stats.batches, stats.unknown
    );
    println!("{:.1} seconds after start", started.elapsed().as_secs_f64());
    Ok(())
}

pub fn run_coverable(args: &CoverableArgs) -> Result<()> {
    let filter = FileFilter::from_pattern(&args.file_filter)?;
    let order = artifact::load_order(&args.instr_order)?;
    tracing::info!("Instruction order loaded");
    let lines = artifact::load_lines(&args.instr_lines)?;
    tracing::info!("Line info loaded");

    let (coverable, stats) = enumerate_coverable(&order, &lines, &filter)?;
    println!("Count of unknown: {} of {}", stats.unknown, stats.instructions);
    println!("Found {} files with {} lines", stats.files, stats.lines);

    line_file::save(&coverable, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Saved all lines to {}", args.output.display());
    Ok(())
}

fn load_index(order_path: &Path, jumps_path: &Path) -> Result<InstructionIndex> {
    let order = artifact::load_order(order_path)?;
    let jumps = artifact::load_jumps(jumps_path)?;
    InstructionIndex::from_parts(order, jumps).with_context(|| {
        format!(
            "{} and {} do not describe the same listing",
            order_path.display(),
            jumps_path.display()
        )
    })
}

/// Load a line-set file, warning when its header disagrees with its body
fn load_line_file(path: &Path) -> Result<LineSet> {
    let (header, set) = line_file::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    if header != LineFileHeader::of(&set) {
        tracing::warn!(
            "{} header says {} files / {} lines but contains {} / {}",
            path.display(),
            header.file_count,
            header.line_count,
            set.file_count(),
            set.line_count()
        );
    }
    Ok(set)
}

fn print_rows(comparison: &Comparison, per_file: bool, per_directory: bool) {
    if per_file {
        print!("{}", render_table(&comparison.per_file, "file"));
    }
    if per_directory {
        print!("{}", render_table(&comparison.per_directory(), "directory"));
    }
}

pub fn run_covered(args: &CoveredArgs, config: &PipelineConfig) -> Result<()> {
    let started = Instant::now();
    let index = load_index(&args.instr_order, &args.instr_jumps)?;
    tracing::info!("Instruction index loaded with {} instructions", index.len());
    let lines = artifact::load_lines(&args.instr_lines)?;
    tracing::info!("Line info loaded");
    let (mut trace, trace_stats) = Trace::load(&args.instr_ptrs)?;
    tracing::info!("Trace loaded with {} entries", trace.len());
    if args.dedup_trace {
        let removed = trace.dedup();
        tracing::info!("Dropped {} repeated trace entries", removed);
    }

    let result = Reconstructor::new(&index, &lines)
        .with_progress_interval(config.reconstruct.progress_interval)
        .run(trace.addresses())?;

    println!(
        "Found {} files with {} covered lines",
        result.covered.file_count(),
        result.covered.line_count()
    );
    println!(
        "not found: {} inconsistent files: {} ran off end: {} malformed trace lines: {}",
        result.stats.not_found,
        result.stats.inconsistent_files,
        result.stats.ran_off_end,
        trace_stats.malformed
    );

    match &args.all_coverable_lines {
        Some(coverable_path) => {
            let coverable = load_line_file(coverable_path)?;
            let comparison = compare(&result.covered, &coverable);
            line_file::save(&comparison.matched, &args.output)
                .with_context(|| format!("Failed to write {}", args.output.display()))?;
            print_rows(&comparison, args.per_file, false);
            println!("{}", comparison.summary_line(coverable_path));
        }
        None => {
            line_file::save(&result.covered, &args.output)
                .with_context(|| format!("Failed to write {}", args.output.display()))?;
        }
    }
    println!("Saved all covered lines to {}", args.output.display());
    println!("{:.1} seconds after start", started.elapsed().as_secs_f64());
    Ok(())
}

pub fn run_compare(args: &CompareArgs) -> Result<()> {
    let covered = load_line_file(&args.covered)?;
    let coverable = load_line_file(&args.coverable)?;

    let comparison = compare(&covered, &coverable);
    line_file::save(&comparison.matched, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    match args.format {
        OutputFormat::Text => {
            print_rows(&comparison, args.per_file, args.per_directory);
            println!("{}", comparison.summary_line(&args.coverable));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
    }
    Ok(())
}
