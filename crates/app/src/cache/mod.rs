//! Cache store abstraction.
//!
//! Only the operations the consistency components rely on: string keys with a
//! TTL, set-if-absent, and hashes that expire as a whole.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

pub mod keys;
mod memory;
mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache command failed")]
    Redis(#[from] ::redis::RedisError),
}

#[automock]
#[async_trait]
pub trait Cache: Send + Sync {
    /// Store a string value with a TTL, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Store a string value only when the key is absent. Returns whether it was stored.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Set one field of an existing hash and refresh the TTL of the whole hash,
    /// atomically. A missing hash is left missing. Returns whether it was written.
    async fn hash_set_if_exists(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Set several hash fields and refresh the TTL of the whole hash atomically.
    async fn hash_set_many(
        &self,
        key: &str,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), CacheError>;
}
