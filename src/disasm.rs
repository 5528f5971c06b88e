//! Disassembly listing indexer
//!
//! Turns an `objdump -d` style listing into the two structures the
//! reconstructor walks:
//! - the instruction order (listing order, used as "next instruction")
//! - the jump classification of every instruction plus its position in that order
//!
//! No-op instructions are dropped from both.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::BufRead;
use std::sync::OnceLock;
use thiserror::Error;

/// Machine instruction address
pub type Address = u64;

/// Operand-size letters combined with base mnemonics (`nopw`, `callq`, `retq`, ...)
const SIZE_AFFIXES: [char; 4] = ['b', 'w', 'l', 'q'];

const NOP_MNEMONICS: &[&str] = &["nop"];

const JUMP_MNEMONICS: &[&str] = &[
    "jmp", "je", "jne", "jg", "jge", "ja", "jae", "jl", "jle", "jb", "jbe", "jo", "jno", "jz",
    "jnz", "js", "jns", "call", "loop", "loopcc", "loope", "loopne", "loopnz", "loopz", "ret",
    "iret",
];

/// Errors raised while building or reloading an instruction index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("instruction order has {order} entries but jump info has {jumps}")]
    LengthMismatch { order: usize, jumps: usize },

    #[error("instruction {address:#x} has no jump info")]
    MissingJumpInfo { address: Address },

    #[error("instruction {address:#x} is at position {position} but jump info says {recorded}")]
    Inconsistent {
        address: Address,
        position: usize,
        recorded: usize,
    },
}

/// A base mnemonic set expanded with every operand-size prefix/suffix combination
#[derive(Debug, Clone)]
pub struct MnemonicFamily {
    names: HashSet<String>,
}

impl MnemonicFamily {
    /// Expand `bases` into `base`, `xbase`, `basey` and `xbasey` for x, y in b/w/l/q
    pub fn expand(bases: &[&str]) -> Self {
        let mut names = HashSet::new();
        for base in bases {
            names.insert((*base).to_string());
            for x in SIZE_AFFIXES {
                names.insert(format!("{x}{base}"));
                names.insert(format!("{base}{x}"));
                for y in SIZE_AFFIXES {
                    names.insert(format!("{x}{base}{y}"));
                }
            }
        }
        Self { names }
    }

    pub fn contains(&self, mnemonic: &str) -> bool {
        self.names.contains(mnemonic)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// No-operation family (`nop`, `nopw`, `nopl`, ...)
pub fn nop_family() -> &'static MnemonicFamily {
    static FAMILY: OnceLock<MnemonicFamily> = OnceLock::new();
    FAMILY.get_or_init(|| MnemonicFamily::expand(NOP_MNEMONICS))
}

/// Control-flow transfer family (branches, calls, returns)
pub fn jump_family() -> &'static MnemonicFamily {
    static FAMILY: OnceLock<MnemonicFamily> = OnceLock::new();
    FAMILY.get_or_init(|| MnemonicFamily::expand(JUMP_MNEMONICS))
}

/// Column layout of the disassembly listing
///
/// The default matches `objdump -d` output for addresses up to eight hex
/// digits: the address right-aligned in eight columns, a colon, a tab, the
/// 21-column instruction bytes field, a tab, then the mnemonic at column 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingLayout {
    /// Width of the address field; the colon sits at this offset
    pub address_width: usize,
    /// Byte offset where the mnemonic field starts
    pub mnemonic_column: usize,
    /// Log progress every N listing lines
    pub progress_interval: usize,
}

impl Default for ListingLayout {
    fn default() -> Self {
        Self {
            address_width: 8,
            mnemonic_column: 32,
            progress_interval: 100_000,
        }
    }
}

/// Jump classification of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpInfo {
    pub is_jump: bool,
    /// Position of the instruction in the instruction order
    pub index: usize,
}

/// Instruction order and jump info, kept index-consistent
#[derive(Debug, Clone, Default)]
pub struct InstructionIndex {
    order: Vec<Address>,
    jumps: FnvHashMap<Address, JumpInfo>,
}

impl InstructionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction. Returns false (and changes nothing) if the
    /// address is already indexed.
    pub fn push(&mut self, address: Address, is_jump: bool) -> bool {
        if self.jumps.contains_key(&address) {
            return false;
        }
        self.jumps.insert(
            address,
            JumpInfo {
                is_jump,
                index: self.order.len(),
            },
        );
        self.order.push(address);
        true
    }

    /// Rebuild an index from separately persisted parts, checking that every
    /// address's recorded position matches its place in `order`
    pub fn from_parts(
        order: Vec<Address>,
        jumps: FnvHashMap<Address, JumpInfo>,
    ) -> Result<Self, IndexError> {
        if order.len() != jumps.len() {
            return Err(IndexError::LengthMismatch {
                order: order.len(),
                jumps: jumps.len(),
            });
        }
        for (position, address) in order.iter().enumerate() {
            let info = jumps.get(address).ok_or(IndexError::MissingJumpInfo {
                address: *address,
            })?;
            if info.index != position {
                return Err(IndexError::Inconsistent {
                    address: *address,
                    position,
                    recorded: info.index,
                });
            }
        }
        Ok(Self { order, jumps })
    }

    pub fn order(&self) -> &[Address] {
        &self.order
    }

    pub fn jumps(&self) -> &FnvHashMap<Address, JumpInfo> {
        &self.jumps
    }

    pub fn get(&self, address: Address) -> Option<&JumpInfo> {
        self.jumps.get(&address)
    }

    /// The instruction listed right after the one described by `info`
    pub fn successor(&self, info: &JumpInfo) -> Option<(Address, &JumpInfo)> {
        let next = *self.order.get(info.index + 1)?;
        self.jumps.get(&next).map(|next_info| (next, next_info))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn jump_count(&self) -> usize {
        self.jumps.values().filter(|info| info.is_jump).count()
    }
}

/// Line accounting for one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Non-blank listing lines
    pub total_lines: usize,
    /// Instructions added to the index
    pub instructions: usize,
    /// Dropped no-op instructions
    pub nops: usize,
    /// Headers, labels, byte continuation lines and duplicates
    pub useless_lines: usize,
    /// Instruction lines with nothing in the mnemonic column
    pub empty_mnemonics: usize,
}

/// Split an instruction line into address and mnemonic
///
/// Returns `None` for anything that is not an instruction line: too short,
/// no colon at `address_width`, or an address field that is not hex.
/// The mnemonic may be empty.
pub fn parse_instruction_line<'a>(
    line: &'a str,
    layout: &ListingLayout,
) -> Option<(Address, &'a str)> {
    if line.len() <= layout.mnemonic_column
        || line.as_bytes().get(layout.address_width) != Some(&b':')
    {
        return None;
    }
    let address_field = line.get(..layout.address_width)?.trim();
    let address = Address::from_str_radix(address_field, 16).ok()?;
    let mnemonic = line
        .get(layout.mnemonic_column..)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("");
    Some((address, mnemonic))
}

/// Index a complete disassembly listing
pub fn index_listing<R: BufRead>(
    reader: R,
    layout: &ListingLayout,
) -> Result<(InstructionIndex, IndexStats), IndexError> {
    let nops = nop_family();
    let jumps = jump_family();
    let mut index = InstructionIndex::new();
    let mut stats = IndexStats::default();

    for line in reader.lines() {
        let line = line?;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            continue;
        }
        stats.total_lines += 1;

        match parse_instruction_line(line, layout) {
            Some((_, mnemonic)) if nops.contains(mnemonic) => stats.nops += 1,
            Some((address, mnemonic)) => {
                if mnemonic.is_empty() {
                    tracing::warn!("Instruction line without mnemonic: {}", line);
                    stats.empty_mnemonics += 1;
                }
                if index.push(address, jumps.contains(mnemonic)) {
                    stats.instructions += 1;
                } else {
                    tracing::debug!("Duplicate instruction address {:#x} skipped", address);
                    stats.useless_lines += 1;
                }
            }
            None => stats.useless_lines += 1,
        }

        if layout.progress_interval > 0 && stats.total_lines % layout.progress_interval == 0 {
            tracing::info!(
                "{} listing lines processed, {} instructions",
                stats.total_lines,
                stats.instructions
            );
        }
    }

    Ok((index, stats))
}
