//! Persistence of the static index artifacts
//!
//! Instruction order, jump info and line tables are written as MessagePack
//! blobs inside a small envelope that records what the blob holds and which
//! format version wrote it. The format is private to this pipeline.

use crate::disasm::{Address, InstructionIndex, JumpInfo};
use crate::line_table::LineTable;
use fnv::FnvHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

const MAGIC: &str = "asmcov";
const FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode artifact: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode artifact {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: rmp_serde::decode::Error,
    },

    #[error("{0} is not an asmcov artifact")]
    NotAnArtifact(String),

    #[error("Artifact version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Wrong artifact kind: expected {expected:?}, found {found:?}")]
    WrongKind {
        expected: ArtifactKind,
        found: ArtifactKind,
    },
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// What an artifact file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    InstructionOrder,
    JumpInfo,
    LineInfo,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    magic: &'a str,
    version: u32,
    kind: ArtifactKind,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    magic: String,
    version: u32,
    kind: ArtifactKind,
    payload: T,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError {
    let path = path.display().to_string();
    move |source| ArtifactError::Io { path, source }
}

/// Write `payload` as an artifact of the given kind
pub fn save<T: Serialize>(path: &Path, kind: ArtifactKind, payload: &T) -> Result<()> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    let envelope = EnvelopeRef {
        magic: MAGIC,
        version: FORMAT_VERSION,
        kind,
        payload,
    };
    rmp_serde::encode::write_named(&mut writer, &envelope)?;
    writer.flush().map_err(io_error(path))?;
    Ok(())
}

/// Read an artifact, checking its kind and version
pub fn load<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<T> {
    let file = File::open(path).map_err(io_error(path))?;
    let envelope: Envelope<T> =
        rmp_serde::from_read(BufReader::new(file)).map_err(|source| ArtifactError::Decode {
            path: path.display().to_string(),
            source,
        })?;

    if envelope.magic != MAGIC {
        return Err(ArtifactError::NotAnArtifact(path.display().to_string()));
    }
    if envelope.version != FORMAT_VERSION {
        return Err(ArtifactError::VersionMismatch {
            expected: FORMAT_VERSION,
            found: envelope.version,
        });
    }
    if envelope.kind != kind {
        return Err(ArtifactError::WrongKind {
            expected: kind,
            found: envelope.kind,
        });
    }
    Ok(envelope.payload)
}

/// Persist both halves of an instruction index
pub fn save_index(index: &InstructionIndex, order_path: &Path, jumps_path: &Path) -> Result<()> {
    save(order_path, ArtifactKind::InstructionOrder, &index.order())?;
    save(jumps_path, ArtifactKind::JumpInfo, index.jumps())
}

pub fn load_order(path: &Path) -> Result<Vec<Address>> {
    load(path, ArtifactKind::InstructionOrder)
}

pub fn load_jumps(path: &Path) -> Result<FnvHashMap<Address, JumpInfo>> {
    load(path, ArtifactKind::JumpInfo)
}

pub fn save_lines(table: &LineTable, path: &Path) -> Result<()> {
    save(path, ArtifactKind::LineInfo, table)
}

pub fn load_lines(path: &Path) -> Result<LineTable> {
    load(path, ArtifactKind::LineInfo)
}
