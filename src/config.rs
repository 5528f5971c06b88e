//! Pipeline configuration
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional `asmcov.toml`, then command-line flags.
//!
//! # Example asmcov.toml
//!
//! ```toml
//! [listing]
//! address_width = 16
//! mnemonic_column = 40
//!
//! [resolver]
//! backend = "addr2line"
//! batch_size = 50000
//! source_root = "/opt/kernel/linux"
//! ```

use crate::disasm::ListingLayout;
use crate::resolver::ResolverBackend;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub listing: ListingLayout,
    pub resolver: ResolverConfig,
    pub reconstruct: ReconstructConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Addresses per resolver invocation
    pub batch_size: usize,
    pub backend: ResolverBackend,
    /// Executable used by the addr2line backend
    pub addr2line: PathBuf,
    /// Prefix stripped from resolved paths; defaults to the binary's directory
    pub source_root: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            batch_size: 50_000,
            backend: ResolverBackend::Dwarf,
            addr2line: PathBuf::from("addr2line"),
            source_root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconstructConfig {
    /// Log progress every N trace entries
    pub progress_interval: usize,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            progress_interval: 10_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listing.mnemonic_column <= self.listing.address_width {
            bail!(
                "mnemonic_column ({}) must be greater than address_width ({})",
                self.listing.mnemonic_column,
                self.listing.address_width
            );
        }
        if self.resolver.batch_size == 0 {
            bail!("resolver batch_size must be greater than zero");
        }
        Ok(())
    }
}
