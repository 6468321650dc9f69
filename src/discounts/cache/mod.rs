// Discount result cache
//
// Entries are keyed by (shop, generation, product, quantity). Invalidating a
// shop bumps its generation, so every entry computed before the bump becomes
// unreachable in O(1) and simply ages out.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::discounts::error::{DiscountError, DiscountResult};
use crate::discounts::metrics::DiscountMetrics;
use crate::discounts::resolver::Resolution;

pub use self::memory::MemoryDiscountCache;
pub use self::redis::RedisDiscountCache;

/// Default time-to-live for cached results (1 hour)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache key for one calculation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub shop_id: String,
    pub generation: u64,
    pub product_id: String,
    pub quantity: i64,
    /// Sorted, comma-joined, escaped collection ids when the caller supplied them
    pub collections: Option<String>,
}

impl CacheKey {
    pub fn new(
        shop_id: &str,
        generation: u64,
        product_id: &str,
        quantity: i64,
        collection_ids: Option<&[String]>,
    ) -> Self {
        let collections = collection_ids.map(|ids| {
            let mut ids: Vec<String> = ids.iter().map(|id| escape_segment(id).into_owned()).collect();
            ids.sort();
            ids.dedup();
            ids.join(",")
        });

        Self {
            shop_id: shop_id.to_string(),
            generation,
            product_id: product_id.to_string(),
            quantity,
            collections,
        }
    }
}

/// Percent-encode the characters that delimit key segments
fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains(['%', ':', ',', '[', ']']) {
        return Cow::Borrowed(segment);
    }
    let mut escaped = String::with_capacity(segment.len() + 8);
    for c in segment.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            ',' => escaped.push_str("%2C"),
            '[' => escaped.push_str("%5B"),
            ']' => escaped.push_str("%5D"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discount:{}:{}:{}:{}",
            escape_segment(&self.shop_id),
            self.generation,
            escape_segment(&self.product_id),
            self.quantity
        )?;
        if let Some(collections) = &self.collections {
            write!(f, ":[{}]", collections)?;
        }
        Ok(())
    }
}

/// Storage backend for resolved discounts
#[async_trait]
pub trait DiscountCache: Send + Sync {
    /// Current generation of a shop (0 if never invalidated)
    async fn generation(&self, shop_id: &str) -> CacheResult<u64>;

    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Resolution>>;

    async fn put(&self, key: &CacheKey, value: &Resolution, ttl: Duration) -> CacheResult<()>;

    /// Make every entry of the shop unreachable; other shops are untouched
    async fn invalidate_shop(&self, shop_id: &str) -> CacheResult<()>;
}

/// Purges a shop's cached results after any change to its rules or memberships
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn DiscountCache>,
    metrics: DiscountMetrics,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn DiscountCache>, metrics: DiscountMetrics) -> Self {
        Self { cache, metrics }
    }

    /// Completes before the caller responds, so the next calculation for the
    /// shop never observes a pre-mutation result
    pub async fn invalidate_shop(&self, shop_id: &str) -> DiscountResult<()> {
        self.cache.invalidate_shop(shop_id).await.map_err(|e| {
            tracing::error!("Failed to invalidate discount cache for shop {}: {}", shop_id, e);
            DiscountError::CacheUnavailable(e.to_string())
        })?;

        self.metrics.record_invalidation();
        tracing::debug!("Invalidated discount cache for shop {}", shop_id);
        Ok(())
    }
}
