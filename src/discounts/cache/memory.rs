// In-process discount cache

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{CacheKey, CacheResult, DiscountCache};
use crate::discounts::resolver::Resolution;

/// Upper bound on stored entries
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Minimum spacing between sweeps for expired entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct CacheState {
    // One counter per shop; dropping one could hand out a generation again
    generations: HashMap<String, u64>,
    entries: HashMap<CacheKey, (Resolution, Instant)>,
    last_sweep: Option<Instant>,
}

/// Discount cache held in process memory
///
/// Used when no Redis URL is configured and in tests. Holds at most
/// `max_entries` results; when full, expired entries are swept (at most once
/// per interval) and new results are not stored until room frees up.
#[derive(Debug)]
pub struct MemoryDiscountCache {
    state: RwLock<CacheState>,
    max_entries: usize,
}

impl Default for MemoryDiscountCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryDiscountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries,
        }
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DiscountCache for MemoryDiscountCache {
    async fn generation(&self, shop_id: &str) -> CacheResult<u64> {
        let state = self.state.read().await;
        Ok(state.generations.get(shop_id).copied().unwrap_or(0))
    }

    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Resolution>> {
        let state = self.state.read().await;
        let hit = state
            .entries
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone());
        Ok(hit)
    }

    async fn put(&self, key: &CacheKey, value: &Resolution, ttl: Duration) -> CacheResult<()> {
        let mut state = self.state.write().await;

        // Written under a generation that has since been invalidated
        let current = state.generations.get(&key.shop_id).copied().unwrap_or(0);
        if key.generation != current {
            return Ok(());
        }

        let now = Instant::now();
        if !state.entries.contains_key(key) && state.entries.len() >= self.max_entries {
            let sweep_due = state
                .last_sweep
                .map_or(true, |at| now.duration_since(at) >= SWEEP_INTERVAL);
            if sweep_due {
                state.entries.retain(|_, (_, expires_at)| now < *expires_at);
                state.last_sweep = Some(now);
            }
            if state.entries.len() >= self.max_entries {
                tracing::debug!("Discount cache full, not storing {}", key);
                return Ok(());
            }
        }
        state.entries.insert(key.clone(), (value.clone(), now + ttl));
        Ok(())
    }

    async fn invalidate_shop(&self, shop_id: &str) -> CacheResult<()> {
        let mut state = self.state.write().await;
        *state.generations.entry(shop_id.to_string()).or_insert(0) += 1;
        state.entries.retain(|key, _| key.shop_id != shop_id);
        Ok(())
    }
}
