//! In-process cache for standalone runs and tests.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use super::{Cache, CacheError};

#[derive(Debug)]
enum Value {
    String(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Expiry is evaluated lazily against the tokio clock, so paused-time tests can
/// advance past a TTL.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
        entries.remove(key);
    }

    entries.get_mut(key)
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::String(value.to_string()),
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if live(&mut entries, key, now).is_some() {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::String(value.to_string()),
                expires_at: now + ttl,
            },
        );

        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;

        Ok(
            live(&mut entries, key, Instant::now()).and_then(|entry| match &entry.value {
                Value::String(value) => Some(value.clone()),
                Value::Hash(_) => None,
            }),
        )
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;

        Ok(live(&mut entries, key, Instant::now()).is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.remove(key);

        Ok(())
    }

    async fn hash_set_if_exists(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let Some(entry) = live(&mut entries, key, now) else {
            return Ok(false);
        };

        let Value::Hash(hash) = &mut entry.value else {
            return Ok(false);
        };

        hash.insert(field.to_string(), value.to_string());
        entry.expires_at = now + ttl;

        Ok(true)
    }

    async fn hash_set_many(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let mut hash = match live(&mut entries, key, now).map(|entry| &mut entry.value) {
            Some(Value::Hash(hash)) => std::mem::take(hash),
            Some(Value::String(_)) | None => HashMap::new(),
        };

        hash.extend(fields.iter().cloned());

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Hash(hash),
                expires_at: now + ttl,
            },
        );

        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut entries = self.entries.lock().await;

        Ok(
            match live(&mut entries, key, Instant::now()).map(|entry| &entry.value) {
                Some(Value::Hash(hash)) => hash.clone(),
                Some(Value::String(_)) | None => HashMap::new(),
            },
        )
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let emptied = match live(&mut entries, key, now).map(|entry| &mut entry.value) {
            Some(Value::Hash(hash)) => {
                hash.remove(field);
                hash.is_empty()
            }
            Some(Value::String(_)) | None => false,
        };

        if emptied {
            entries.remove(key);
        }

        Ok(())
    }
}
