// Discount Resolver
//
// Determines the best discount for (shop, product, quantity): fetch the
// applicable rules, take the highest qualifying tier of each rule and keep the
// rule with the largest value. Results are cached per shop generation.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::discounts::cache::{CacheKey, DiscountCache, DEFAULT_CACHE_TTL};
use crate::discounts::error::{DiscountError, DiscountResult};
use crate::discounts::metrics::DiscountMetrics;
use crate::discounts::models::{DiscountRule, Tier};
use crate::discounts::store::{bounded, RuleStore, DEFAULT_STORE_TIMEOUT};
use crate::discounts::types::DiscountType;

/// Outcome of a calculation
///
/// `value` is a fraction (0.10 = 10% off) for percentage rules and a per-unit
/// amount for fixed rules. With no qualifying rule it is zero and the other
/// fields are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub discount_type: Option<DiscountType>,
    pub value: Decimal,
    pub rule_id: Option<Uuid>,
    pub min_quantity: Option<i32>,
}

impl Resolution {
    pub fn none() -> Self {
        Self {
            discount_type: None,
            value: Decimal::ZERO,
            rule_id: None,
            min_quantity: None,
        }
    }
}

/// Highest-threshold tier whose quantity is at most `quantity`
pub fn best_tier(tiers: &[Tier], quantity: i64) -> Option<&Tier> {
    tiers
        .iter()
        .filter(|tier| i64::from(tier.quantity) <= quantity)
        .max_by_key(|tier| tier.quantity)
}

/// Tier value as reported to callers; percentages become fractions
pub fn effective_value(discount_type: DiscountType, tier: &Tier) -> Decimal {
    match discount_type {
        DiscountType::Percentage => tier.discount / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => tier.discount,
    }
}

/// Pick the best discount among candidate rules
///
/// Candidates are expected newest first. Values are compared as-is across
/// discount types, and on equal values the earlier candidate is kept.
pub fn resolve(rules: &[DiscountRule], quantity: i64) -> Resolution {
    let mut best = Resolution::none();

    for rule in rules {
        let Some(tier) = best_tier(&rule.tiers, quantity) else {
            continue;
        };
        let value = effective_value(rule.discount_type, tier);

        if best.rule_id.is_none() || value > best.value {
            best = Resolution {
                discount_type: Some(rule.discount_type),
                value,
                rule_id: Some(rule.id),
                min_quantity: Some(tier.quantity),
            };
        }
    }

    best
}

/// A resolution and whether it came from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub resolution: Resolution,
    pub cached: bool,
}

/// Cached discount lookups on top of a rule store
#[derive(Clone)]
pub struct DiscountResolver {
    store: Arc<dyn RuleStore>,
    cache: Arc<dyn DiscountCache>,
    metrics: DiscountMetrics,
    cache_ttl: Duration,
    store_timeout: Duration,
}

impl DiscountResolver {
    pub fn new(
        store: Arc<dyn RuleStore>,
        cache: Arc<dyn DiscountCache>,
        metrics: DiscountMetrics,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
            cache_ttl: DEFAULT_CACHE_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Best discount for a product at a quantity
    ///
    /// `collection_ids` are the product's collections; when `None` they are
    /// read from the stored memberships. Cache failures degrade to a direct
    /// store lookup; store failures are returned.
    pub async fn calculate(
        &self,
        shop_id: &str,
        product_id: &str,
        quantity: i64,
        collection_ids: Option<Vec<String>>,
    ) -> DiscountResult<Calculation> {
        if shop_id.trim().is_empty() {
            return Err(DiscountError::InvalidArgument("shopId is required".to_string()));
        }
        if product_id.trim().is_empty() {
            return Err(DiscountError::InvalidArgument("productId is required".to_string()));
        }
        if quantity <= 0 {
            return Err(DiscountError::InvalidArgument(
                "quantity must be a positive integer".to_string(),
            ));
        }

        let _timer = self.metrics.start_calculation();

        // Generation is read before the lookup; a result computed across an
        // invalidation is written under the old generation and never served
        let key = match self.cache.generation(shop_id).await {
            Ok(generation) => Some(CacheKey::new(
                shop_id,
                generation,
                product_id,
                quantity,
                collection_ids.as_deref(),
            )),
            Err(e) => {
                tracing::warn!("Discount cache unavailable, bypassing: {}", e);
                self.metrics.record_cache_error();
                None
            }
        };

        if let Some(key) = &key {
            match self.cache.get(key).await {
                Ok(Some(resolution)) => {
                    self.metrics.record_cache_hit();
                    tracing::debug!("Discount cache hit for {}", key);
                    return Ok(Calculation {
                        resolution,
                        cached: true,
                    });
                }
                Ok(None) => self.metrics.record_cache_miss(),
                Err(e) => {
                    tracing::warn!("Discount cache read failed for {}: {}", key, e);
                    self.metrics.record_cache_error();
                }
            }
        }

        let collection_ids = match collection_ids {
            Some(ids) => ids,
            None => {
                bounded(
                    self.store_timeout,
                    self.store.collections_for_product(shop_id, product_id),
                )
                .await?
            }
        };

        let rules = bounded(
            self.store_timeout,
            self.store
                .find_applicable(shop_id, product_id, &collection_ids, Utc::now()),
        )
        .await?;

        let resolution = resolve(&rules, quantity);
        tracing::debug!(
            "Resolved discount for shop {} product {} x{}: {:?} {} (rule {:?})",
            shop_id,
            product_id,
            quantity,
            resolution.discount_type,
            resolution.value,
            resolution.rule_id
        );

        if let Some(key) = &key {
            if let Err(e) = self.cache.put(key, &resolution, self.cache_ttl).await {
                tracing::warn!("Discount cache write failed for {}: {}", key, e);
                self.metrics.record_cache_error();
            }
        }

        Ok(Calculation {
            resolution,
            cached: false,
        })
    }
}
