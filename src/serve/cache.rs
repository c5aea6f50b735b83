//! Process-wide cache of the parsed index, keyed by archive identity.
//!
//! The index is loaded on first use and kept until the archive name read
//! from configuration changes. Concurrent cold loads are not coordinated:
//! each one parses the same bytes, and the last insert wins.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::archive::Index;

/// How often the archive name is re-read from the config store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameRefresh {
    /// Read it on every request, so a rotated archive is picked up immediately.
    #[default]
    EveryRequest,
    /// Reuse the last name until it is older than the given duration.
    Ttl(Duration),
    /// Read it once for the life of the process.
    Never,
}

#[derive(Debug)]
struct CachedName {
    name: String,
    resolved_at: Instant,
}

#[derive(Debug, Default)]
pub struct IndexCache {
    policy: NameRefresh,
    name: RwLock<Option<CachedName>>,
    index: RwLock<Option<(String, Arc<Index>)>>,
}

impl IndexCache {
    pub fn new(policy: NameRefresh) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Previously resolved archive name, if the refresh policy still allows reusing it.
    pub fn cached_name(&self) -> Option<String> {
        let guard = self.name.read().unwrap_or_else(|e| e.into_inner());
        let cached = guard.as_ref()?;
        let fresh = match self.policy {
            NameRefresh::EveryRequest => false,
            NameRefresh::Ttl(ttl) => cached.resolved_at.elapsed() < ttl,
            NameRefresh::Never => true,
        };
        fresh.then(|| cached.name.clone())
    }

    pub fn store_name(&self, name: &str) {
        let mut guard = self.name.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(CachedName {
            name: name.to_string(),
            resolved_at: Instant::now(),
        });
    }

    /// Cached index for `archive`; `None` if nothing is cached or it belongs to another archive.
    pub fn get(&self, archive: &str) -> Option<Arc<Index>> {
        let guard = self.index.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some((key, index)) if key == archive => Some(index.clone()),
            _ => None,
        }
    }

    /// Cache `index` as the index of `archive`, replacing whatever was there.
    pub fn insert(&self, archive: &str, index: Index) -> Arc<Index> {
        let index = Arc::new(index);
        let mut guard = self.index.write().unwrap_or_else(|e| e.into_inner());
        if let Some((previous, _)) = guard.as_ref() {
            if previous != archive {
                log::info!("archive changed from {} to {}, replacing index", previous, archive);
            }
        }
        *guard = Some((archive.to_string(), index.clone()));
        index
    }

    /// Archive name the cached index belongs to.
    pub fn current_archive(&self) -> Option<String> {
        let guard = self.index.read().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|(key, _)| key.clone())
    }

    /// Drop both the cached name and the cached index.
    pub fn invalidate(&self) {
        *self.name.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self.index.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
