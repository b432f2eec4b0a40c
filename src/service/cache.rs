//! Redis cache for per-source partial annotations

use std::env;

use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};

use crate::model::{AnnotationSource, PartialAnnotation};

// Environment variable names
const ENV_REDIS_HOST: &str = "VARIANT_INTEL_REDIS_HOST";
const ENV_REDIS_PORT: &str = "VARIANT_INTEL_REDIS_PORT";
const ENV_REDIS_PASSWORD: &str = "VARIANT_INTEL_REDIS_PASSWORD";
const ENV_REDIS_DB: &str = "VARIANT_INTEL_REDIS_DB";
const ENV_CACHE_TTL: &str = "VARIANT_INTEL_CACHE_TTL";

// Default values
const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
const DEFAULT_REDIS_PORT: &str = "6379";
const DEFAULT_REDIS_DB: &str = "0";
const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60; // 1 day

const PREFIX_ANNOTATION: &str = "annotation:";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache miss for key: {0}")]
    Miss(String),
}

/// Redis-based cache for source annotations
#[derive(Clone)]
pub struct AnnotationCache {
    client: Client,
    ttl_seconds: u64,
}

impl AnnotationCache {
    /// Create a new cache instance and verify connection
    ///
    /// Configuration via environment variables:
    /// - `VARIANT_INTEL_REDIS_HOST` - Redis host (default: 127.0.0.1)
    /// - `VARIANT_INTEL_REDIS_PORT` - Redis port (default: 6379)
    /// - `VARIANT_INTEL_REDIS_PASSWORD` - Redis password (default: none)
    /// - `VARIANT_INTEL_REDIS_DB` - Redis database number (default: 0)
    /// - `VARIANT_INTEL_CACHE_TTL` - Cache TTL in seconds (default: 86400)
    pub async fn new() -> Result<Self, CacheError> {
        let host = env::var(ENV_REDIS_HOST).unwrap_or_else(|_| DEFAULT_REDIS_HOST.to_string());
        let port = env::var(ENV_REDIS_PORT).unwrap_or_else(|_| DEFAULT_REDIS_PORT.to_string());
        let password = env::var(ENV_REDIS_PASSWORD).ok();
        let db = env::var(ENV_REDIS_DB).unwrap_or_else(|_| DEFAULT_REDIS_DB.to_string());

        let ttl_seconds = env::var(ENV_CACHE_TTL)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECONDS);

        let redis_url = redis_url(&host, &port, password.as_deref(), &db);

        tracing::debug!(host = %host, port = %port, db = %db, "Connecting to Redis");

        let client = Client::open(redis_url)?;
        let cache = Self {
            client,
            ttl_seconds,
        };
        cache.ping().await?;

        tracing::info!(host = %host, port = %port, "Redis connection established");

        Ok(cache)
    }

    /// Round-trip a PING to the server
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Get the cached annotation one source produced for a variant query
    pub async fn get_annotation(
        &self,
        source: AnnotationSource,
        key_hash: &str,
    ) -> Result<PartialAnnotation, CacheError> {
        self.get(&annotation_key(source, key_hash)).await
    }

    /// Cache the annotation one source produced for a variant query
    pub async fn set_annotation(
        &self,
        source: AnnotationSource,
        key_hash: &str,
        data: &PartialAnnotation,
    ) -> Result<(), CacheError> {
        self.set(&annotation_key(source, key_hash), data).await
    }

    async fn get<T: DeserializeOwned>(&self, full_key: &str) -> Result<T, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let data: Option<String> = conn.get(full_key).await?;

        match data {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| CacheError::Serialization(e.to_string()))
            }
            None => Err(CacheError::Miss(full_key.to_string())),
        }
    }

    async fn set<T: Serialize>(&self, full_key: &str, data: &T) -> Result<(), CacheError> {
        let json =
            serde_json::to_string(data).map_err(|e| CacheError::Serialization(e.to_string()))?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(full_key, json, self.ttl_seconds).await?;

        tracing::debug!(key = %full_key, ttl = self.ttl_seconds, "Cached data");
        Ok(())
    }
}

// redis://[:password@]host:port/db
fn redis_url(host: &str, port: &str, password: Option<&str>, db: &str) -> String {
    match password {
        Some(pwd) if !pwd.is_empty() => format!("redis://:{}@{}:{}/{}", pwd, host, port, db),
        _ => format!("redis://{}:{}/{}", host, port, db),
    }
}

fn annotation_key(source: AnnotationSource, key_hash: &str) -> String {
    format!("{}{}:{}", PREFIX_ANNOTATION, source.name(), key_hash)
}
