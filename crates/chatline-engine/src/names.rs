//! Display-name resolution for contacts and groups.
//!
//! Lookups are cache-first. A miss asks the [`NameLookup`] collaborator; a
//! failed or empty lookup falls back to the bare identifier and is not
//! cached, so a later lookup can still succeed. Name-change signals overwrite
//! the cache unconditionally. There is no expiry: identifier cardinality is
//! bounded by real contact and group counts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use chatline_shared::types::user_part;
use chatline_shared::NameKind;

use crate::error::EngineError;

/// External name/metadata directory.
#[async_trait]
pub trait NameLookup: Send + Sync {
    /// `Ok(None)` means "not found".
    async fn lookup(&self, id: &str, kind: NameKind) -> Result<Option<String>, EngineError>;
}

/// Lookup that never finds anything; names come only from signals.
pub struct NoLookup;

#[async_trait]
impl NameLookup for NoLookup {
    async fn lookup(&self, _id: &str, _kind: NameKind) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}

/// Name shown when nothing better is known: the identifier without its server part.
pub fn fallback_name(id: &str) -> String {
    user_part(id).to_string()
}

type CacheKey = (NameKind, String);

pub struct NameResolver {
    lookup: Arc<dyn NameLookup>,
    cache: RwLock<HashMap<CacheKey, String>>,
}

impl NameResolver {
    pub fn new(lookup: Arc<dyn NameLookup>) -> Self {
        Self {
            lookup,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver backed by the cache and name-change signals only.
    pub fn offline() -> Self {
        Self::new(Arc::new(NoLookup))
    }

    pub fn cached(&self, id: &str, kind: NameKind) -> Option<String> {
        self.cache.read().get(&(kind, id.to_string())).cloned()
    }

    pub async fn resolve(&self, id: &str, kind: NameKind) -> String {
        if let Some(name) = self.cached(id, kind) {
            return name;
        }

        match self.lookup.lookup(id, kind).await {
            Ok(Some(name)) if !name.trim().is_empty() => {
                let mut cache = self.cache.write();
                // A name-change signal that landed during the lookup is fresher.
                cache
                    .entry((kind, id.to_string()))
                    .or_insert(name)
                    .clone()
            }
            Ok(_) => {
                debug!(id = %id, ?kind, "name not found, using identifier");
                fallback_name(id)
            }
            Err(e) => {
                warn!(id = %id, ?kind, error = %e, "name lookup failed, using identifier");
                fallback_name(id)
            }
        }
    }

    /// Apply an authoritative name-change signal. Returns `true` when the
    /// cached name changed. Blank names are ignored.
    pub fn observe(&self, id: &str, kind: NameKind, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let previous = self
            .cache
            .write()
            .insert((kind, id.to_string()), name.to_string());
        previous.as_deref() != Some(name)
    }

    pub fn invalidate(&self, id: &str, kind: NameKind) -> Option<String> {
        self.cache.write().remove(&(kind, id.to_string()))
    }

    /// Bulk-load entries restored from persistence.
    pub fn seed<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (NameKind, String, String)>,
    {
        let mut cache = self.cache.write();
        for (kind, id, name) in entries {
            cache.insert((kind, id), name);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
