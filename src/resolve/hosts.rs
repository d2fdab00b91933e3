//! Static host table.
//!
//! # Responsibilities
//! - Parse hosts-file formatted text into address → names entries
//! - Forward lookup (name → owning addresses), case-insensitive
//! - Reverse lookup (address → names)
//!
//! # Design Decisions
//! - Entries keep source line order, so "first match" is deterministic
//! - A repeated address extends its existing entry instead of adding a new one
//! - The file is re-read on every lookup; there is no cache to invalidate

use std::path::{Path, PathBuf};

use crate::error::{ProxyError, Result};

/// One address and every name listed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub address: String,
    pub names: Vec<String>,
}

/// Parsed host table, ordered by first appearance of each address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTable {
    entries: Vec<HostEntry>,
}

impl HostTable {
    /// Parse hosts-file content.
    ///
    /// Blank lines and lines starting with `#` or `;` are skipped. The first
    /// token of a data line is the address; the rest are names. A line with
    /// no names contributes nothing.
    pub fn parse(content: &str) -> Self {
        let mut table = HostTable::default();

        for line in content.trim().split('\n') {
            let line = line.trim().replace('\t', " ");
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let Some((address, rest)) = line.split_once(' ') else {
                continue;
            };
            if address.is_empty() {
                continue;
            }

            let names: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            if names.is_empty() {
                continue;
            }

            table.insert(address, names);
        }

        table
    }

    fn insert(&mut self, address: &str, names: Vec<String>) {
        match self.entries.iter_mut().find(|e| e.address == address) {
            Some(entry) => entry.names.extend(names),
            None => self.entries.push(HostEntry {
                address: address.to_string(),
                names,
            }),
        }
    }

    /// Every address listing `name`, in table order.
    ///
    /// Matching ignores case and surrounding whitespace on both sides.
    pub fn find_addresses(&self, name: &str) -> Vec<String> {
        let wanted = name.trim().to_lowercase();
        let mut found = Vec::new();

        for entry in &self.entries {
            for candidate in &entry.names {
                if candidate.trim().to_lowercase() == wanted {
                    found.push(entry.address.clone());
                }
            }
        }

        found
    }

    /// Names listed for `address`, or an empty list.
    pub fn find_names(&self, address: &str) -> Vec<String> {
        self.entries
            .iter()
            .find(|e| e.address == address)
            .map(|e| e.names.clone())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A host table backed by a file on disk.
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file. Fails with `SourceUnavailable` when unreadable.
    pub async fn load(&self) -> Result<HostTable> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ProxyError::SourceUnavailable {
                path: self.path.display().to_string(),
                source,
            })?;

        let table = HostTable::parse(&String::from_utf8_lossy(&bytes));
        tracing::trace!(
            path = %self.path.display(),
            entries = table.entries().len(),
            "Host table loaded"
        );
        Ok(table)
    }

    /// Forward lookup against a fresh read of the file.
    pub async fn find_addresses(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.load().await?.find_addresses(name))
    }

    /// Reverse lookup against a fresh read of the file.
    pub async fn find_names(&self, address: &str) -> Result<Vec<String>> {
        Ok(self.load().await?.find_names(address))
    }
}
