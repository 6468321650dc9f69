// Redis-backed discount cache shared by every server instance

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

use super::{escape_segment, CacheKey, CacheResult, DiscountCache};
use crate::discounts::resolver::Resolution;

pub struct RedisDiscountCache {
    manager: ConnectionManager,
}

impl RedisDiscountCache {
    /// Connect to Redis and keep a multiplexed, auto-reconnecting connection
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        tracing::debug!("Connecting to Redis discount cache");

        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        tracing::info!("Redis discount cache connected");
        Ok(Self { manager })
    }

    fn generation_key(shop_id: &str) -> String {
        format!("discount:gen:{}", escape_segment(shop_id))
    }
}

#[async_trait]
impl DiscountCache for RedisDiscountCache {
    async fn generation(&self, shop_id: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();
        let generation: Option<u64> = redis::cmd("GET")
            .arg(Self::generation_key(shop_id))
            .query_async(&mut conn)
            .await?;
        Ok(generation.unwrap_or(0))
    }

    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Resolution>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, value: &Resolution, ttl: Duration) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key.to_string())
            .arg(json)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn invalidate_shop(&self, shop_id: &str) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let generation: u64 = redis::cmd("INCR")
            .arg(Self::generation_key(shop_id))
            .query_async(&mut conn)
            .await?;
        tracing::debug!("Shop {} discount cache now at generation {}", shop_id, generation);
        Ok(())
    }
}
