//! Session cache capability.
//!
//! The gateway is a client of a session store, never the store itself.
//! `MemorySessionCache` backs local development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionCacheError {
    #[error("session cache unavailable: {0}")]
    Unavailable(String),

    #[error("session cache error: {0}")]
    Backend(String),
}

/// Read/delete access to the external session cache.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Fetch `fields` of the session stored under `key`.
    ///
    /// Returns `None` when the key does not exist; otherwise one entry per
    /// requested field, `None` for fields the session lacks.
    async fn get(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, SessionCacheError>;

    /// Delete the session. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, SessionCacheError>;

    async fn exists(&self, key: &str) -> Result<bool, SessionCacheError>;
}

/// In-process session cache.
#[derive(Clone, Default)]
pub struct MemorySessionCache {
    inner: Arc<DashMap<String, HashMap<String, String>>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session with the given fields, replacing any previous one.
    pub fn insert<I, K, V>(&self, key: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.inner.insert(key.into(), fields);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, SessionCacheError> {
        Ok(self.inner.get(key).map(|session| {
            fields
                .iter()
                .map(|field| session.get(*field).cloned())
                .collect()
        }))
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionCacheError> {
        Ok(self.inner.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionCacheError> {
        Ok(self.inner.contains_key(key))
    }
}
