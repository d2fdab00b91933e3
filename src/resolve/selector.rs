//! Backend selection.
//!
//! # Responsibilities
//! - Pick exactly one backend address for a hostname
//! - Consult the host table first, the fallback resolver only on a miss
//! - Recognize backends that point back at this proxy
//!
//! # Design Decisions
//! - The host table's first match wins (source line order)
//! - Host table read errors are hard failures; the fallback is not tried

use std::sync::Arc;

use crate::error::{ProxyError, Result};
use crate::resolve::fallback::Fallback;
use crate::resolve::hosts::HostsFile;

/// Two-tier hostname → backend resolution.
#[derive(Clone)]
pub struct BackendSelector {
    hosts: HostsFile,
    fallback: Arc<dyn Fallback>,
}

impl BackendSelector {
    pub fn new(hosts: HostsFile, fallback: Arc<dyn Fallback>) -> Self {
        Self { hosts, fallback }
    }

    /// Resolve `hostname` to a backend address.
    ///
    /// Fails with `HostNotFound` only when both tiers come up empty.
    pub async fn select(&self, hostname: &str) -> Result<String> {
        let addresses = self.hosts.find_addresses(hostname).await?;
        if let Some(first) = addresses.into_iter().next() {
            tracing::debug!(hostname = %hostname, backend = %first, "Resolved via host table");
            return Ok(first);
        }

        match self.fallback.lookup(hostname).await {
            Some(address) => {
                tracing::debug!(hostname = %hostname, backend = %address, "Resolved via fallback");
                Ok(address)
            }
            None => Err(ProxyError::HostNotFound {
                hostname: hostname.to_string(),
            }),
        }
    }
}

/// Addresses that identify this proxy itself.
#[derive(Debug, Clone)]
pub struct LoopGuard {
    identities: Vec<String>,
}

impl LoopGuard {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            identities: identities
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_self(&self, backend: &str) -> bool {
        let backend = backend.trim().to_lowercase();
        self.identities.iter().any(|id| *id == backend)
    }

    /// Reject `backend` with `LoopDetected` when it is this proxy.
    pub fn check(&self, backend: &str) -> Result<()> {
        if self.is_self(backend) {
            return Err(ProxyError::LoopDetected {
                backend: backend.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(["127.0.0.1", "localhost"])
    }
}
