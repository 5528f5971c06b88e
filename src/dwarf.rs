//! DWARF debug info parsing for line resolution
//!
//! Maps instruction addresses to their full inlining chain using the
//! addr2line crate, without spawning the binutils tool.

use crate::disasm::Address;
use crate::resolver::{RawFrame, SourceResolver, UNKNOWN_FILE};
use anyhow::{Context, Result};
use object::{Object, ObjectSection};
use std::fs::File;
use std::path::Path;

/// DWARF debug info context for a binary
pub struct DwarfContext {
    /// addr2line context for DWARF lookups
    context: addr2line::Context<gimli::EndianRcSlice<gimli::RunTimeEndian>>,
}

impl DwarfContext {
    /// Load DWARF debug info from an ELF binary
    pub fn load(binary_path: &Path) -> Result<Self> {
        // Verify binary exists
        if !binary_path.exists() {
            anyhow::bail!("Binary does not exist: {}", binary_path.display());
        }

        // Open and parse ELF binary
        let file = File::open(binary_path)
            .with_context(|| format!("Failed to open binary: {}", binary_path.display()))?;

        let mmap = unsafe { memmap2::Mmap::map(&file) }.context("Failed to memory-map binary")?;

        let object = object::File::parse(&*mmap).context("Failed to parse ELF binary")?;

        let endian = if object.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        // Sections are copied out of the mapping so the context owns its data
        let load_section =
            |id: gimli::SectionId| -> Result<gimli::EndianRcSlice<gimli::RunTimeEndian>> {
                let data = object
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[]));
                let bytes: std::rc::Rc<[u8]> = std::rc::Rc::from(data.into_owned());
                Ok(gimli::EndianRcSlice::new(bytes, endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section).context(
            "Failed to load DWARF sections - binary may not have debug symbols. Compile with -g flag.",
        )?;

        let context =
            addr2line::Context::from_dwarf(dwarf).context("Failed to create DWARF context")?;

        Ok(Self { context })
    }

    /// Inlining chain for one address, innermost frame first
    ///
    /// Falls back to the plain line table when no function DIE covers the
    /// address. An address with no location at all yields `??`.
    pub fn frames(&self, address: Address) -> Result<Vec<RawFrame>> {
        let mut chain = Vec::new();

        let mut frames = self
            .context
            .find_frames(address)
            .skip_all_loads()
            .with_context(|| format!("Failed to read frames for {:#x}", address))?;
        while let Some(frame) = frames
            .next()
            .with_context(|| format!("Corrupt inline info at {:#x}", address))?
        {
            if let Some(location) = frame.location {
                chain.push(RawFrame::new(
                    location.file.unwrap_or(UNKNOWN_FILE),
                    location.line,
                ));
            }
        }

        if chain.is_empty() {
            if let Ok(Some(location)) = self.context.find_location(address) {
                chain.push(RawFrame::new(
                    location.file.unwrap_or(UNKNOWN_FILE),
                    location.line,
                ));
            }
        }

        if chain.is_empty() {
            chain.push(RawFrame::new(UNKNOWN_FILE, None));
        }
        Ok(chain)
    }
}

impl SourceResolver for DwarfContext {
    fn resolve_batch(&mut self, addresses: &[Address]) -> Result<Vec<Vec<RawFrame>>> {
        addresses.iter().map(|address| self.frames(*address)).collect()
    }
}
