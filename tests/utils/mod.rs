// Shared fixtures for integration tests
//
// A small listing with two functions and a resolver that answers from a
// fixed map, so the whole pipeline runs without a real kernel image.

#![allow(dead_code)]

use anyhow::Result;
use asmcov::artifact;
use asmcov::disasm::{index_listing, Address, InstructionIndex, ListingLayout};
use asmcov::line_table::LineTable;
use asmcov::resolver::{resolve_all, PathNormalizer, RawFrame, SourceResolver};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const SOURCE_ROOT: &str = "/src/linux";

pub const A: Address = 0x8100_0000;
pub const B: Address = 0x8100_0001;
pub const C: Address = 0x8100_0008;
pub const D: Address = 0x8100_000d;
pub const E: Address = 0x8100_000e;
pub const F: Address = 0x8100_0020;
pub const G: Address = 0x8100_0022;
pub const H: Address = 0x8100_0023;
pub const NOT_INDEXED: Address = 0xdead_beef;

pub fn listing_line(address: Address, bytes: &str, instruction: &str) -> String {
    format!("{:>8x}:\t{:<21}\t{}", address, bytes, instruction)
}

/// do_open: A push, B mov, nopl, C call, D pop, E ret, nop
/// helper:  F xor, G ret, H mov (falls off the end)
pub fn listing() -> String {
    let mut lines = vec![
        String::new(),
        "vmlinux:     file format elf64-x86-64".to_string(),
        String::new(),
        "Disassembly of section .text:".to_string(),
        String::new(),
        "81000000 <do_open>:".to_string(),
        listing_line(A, "55", "push   %rbp"),
        listing_line(B, "48 89 e5", "mov    %rsp,%rbp"),
        listing_line(0x8100_0004, "0f 1f 40 00", "nopl   0x0(%rax)"),
        listing_line(C, "e8 13 00 00 00", "call   81000020 <helper>"),
        listing_line(D, "5d", "pop    %rbp"),
        listing_line(E, "c3", "ret"),
        listing_line(0x8100_000f, "90", "nop"),
        String::new(),
        "81000020 <helper>:".to_string(),
        listing_line(F, "31 c0", "xor    %eax,%eax"),
        listing_line(G, "c3", "ret"),
        listing_line(H, "89 c3", "mov    %eax,%ebx"),
    ];
    lines.push(String::new());
    lines.join("\n")
}

pub fn frame(path: &str, line: u32) -> RawFrame {
    RawFrame::new(format!("{SOURCE_ROOT}{path}"), Some(line))
}

/// Resolver answering from a fixed map; unknown addresses resolve to `??`
pub struct MapResolver {
    chains: HashMap<Address, Vec<RawFrame>>,
    pub calls: usize,
}

impl MapResolver {
    pub fn fixture() -> Self {
        let chains = HashMap::from([
            (A, vec![frame("/fs/open.c", 10)]),
            (
                B,
                vec![frame("/include/linux/file.h", 60), frame("/fs/open.c", 11)],
            ),
            (C, vec![frame("/fs/open.c", 12)]),
            (D, vec![frame("/fs/open.c", 13)]),
            (E, vec![frame("/fs/namei.c", 99)]),
            (F, vec![frame("/mm/util.c", 5)]),
            (H, vec![frame("/mm/util.c", 7)]),
        ]);
        Self { chains, calls: 0 }
    }
}

impl SourceResolver for MapResolver {
    fn resolve_batch(&mut self, addresses: &[Address]) -> Result<Vec<Vec<RawFrame>>> {
        self.calls += 1;
        Ok(addresses
            .iter()
            .map(|address| {
                self.chains
                    .get(address)
                    .cloned()
                    .unwrap_or_else(|| vec![RawFrame::new("??", None)])
            })
            .collect())
    }
}

pub fn index_fixture() -> InstructionIndex {
    let (index, _) = index_listing(listing().as_bytes(), &ListingLayout::default()).unwrap();
    index
}

pub fn line_table_fixture(index: &InstructionIndex) -> LineTable {
    let normalizer = PathNormalizer::new(Some(Path::new(SOURCE_ROOT)));
    let (table, _) = resolve_all(index.order(), &mut MapResolver::fixture(), 3, &normalizer).unwrap();
    table
}

/// Paths of the static artifacts written by [`write_artifacts`]
pub struct Artifacts {
    pub listing: PathBuf,
    pub order: PathBuf,
    pub jumps: PathBuf,
    pub lines: PathBuf,
}

/// Write the listing plus order, jumps and line info artifacts into `dir`
pub fn write_artifacts(dir: &Path) -> Artifacts {
    let artifacts = Artifacts {
        listing: dir.join("vmlinux.objdump"),
        order: dir.join("instr_order.bin"),
        jumps: dir.join("instr_jumps.bin"),
        lines: dir.join("instr_lines.bin"),
    };
    std::fs::write(&artifacts.listing, listing()).unwrap();

    let index = index_fixture();
    artifact::save_index(&index, &artifacts.order, &artifacts.jumps).unwrap();
    artifact::save_lines(&line_table_fixture(&index), &artifacts.lines).unwrap();
    artifacts
}

pub fn trace_text(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(|address| format!("{:#x}\n", address))
        .collect()
}
