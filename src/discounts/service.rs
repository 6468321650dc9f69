use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::discounts::cache::CacheInvalidator;
use crate::discounts::error::{DiscountError, DiscountResult};
use crate::discounts::models::{DiscountRule, RuleDraft, RuleFilters, RulePatch};
use crate::discounts::store::{bounded, PurgeSummary, RuleStore, DEFAULT_STORE_TIMEOUT};

/// Service layer for rule management and platform notifications
///
/// Every mutation invalidates the owning shop's cached discounts before it
/// returns, so a caller that sees success never reads a stale discount.
#[derive(Clone)]
pub struct RuleService {
    store: Arc<dyn RuleStore>,
    invalidator: CacheInvalidator,
    store_timeout: Duration,
}

impl RuleService {
    pub fn new(store: Arc<dyn RuleStore>, invalidator: CacheInvalidator) -> Self {
        Self {
            store,
            invalidator,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Run a store mutation under the store timeout
    ///
    /// A mutation that fails with `StoreUnavailable` may still have been
    /// committed (a timeout can fire after the commit), so the shop's cache
    /// is dropped before the error is returned.
    async fn mutate<T, F>(&self, shop_id: Option<&str>, operation: F) -> DiscountResult<T>
    where
        F: Future<Output = DiscountResult<T>>,
    {
        match bounded(self.store_timeout, operation).await {
            Err(err @ DiscountError::StoreUnavailable(_)) => {
                if let Some(shop_id) = shop_id.filter(|shop| !shop.trim().is_empty()) {
                    if let Err(e) = self.invalidator.invalidate_shop(shop_id).await {
                        tracing::warn!(
                            "Could not invalidate shop {} after a failed mutation: {}",
                            shop_id,
                            e
                        );
                    }
                }
                Err(err)
            }
            result => result,
        }
    }

    /// Create a rule
    ///
    /// 1. Validates and persists the draft
    /// 2. Invalidates the shop's cached discounts
    pub async fn create_rule(&self, draft: RuleDraft) -> DiscountResult<DiscountRule> {
        let shop_id = draft.shop_id.clone();
        let rule = self
            .mutate(shop_id.as_deref(), self.store.create(draft))
            .await?;
        self.invalidator.invalidate_shop(&rule.shop_id).await?;

        tracing::info!("Created discount rule {} for shop {}", rule.id, rule.shop_id);
        Ok(rule)
    }

    pub async fn get_rule(&self, id: Uuid, shop_id: &str) -> DiscountResult<DiscountRule> {
        bounded(self.store_timeout, self.store.get(id, Some(shop_id))).await
    }

    pub async fn list_rules(
        &self,
        shop_id: &str,
        filters: RuleFilters,
    ) -> DiscountResult<Vec<DiscountRule>> {
        bounded(self.store_timeout, self.store.list_by_shop(shop_id, filters)).await
    }

    /// Update a rule
    ///
    /// 1. Merges the patch over the stored rule and re-validates it
    /// 2. Persists the merged rule
    /// 3. Invalidates the shop's cached discounts
    pub async fn update_rule(
        &self,
        id: Uuid,
        shop_id: &str,
        patch: RulePatch,
    ) -> DiscountResult<DiscountRule> {
        let rule = self
            .mutate(Some(shop_id), self.store.update(id, Some(shop_id), patch))
            .await?;
        self.invalidator.invalidate_shop(&rule.shop_id).await?;

        tracing::info!("Updated discount rule {} for shop {}", rule.id, rule.shop_id);
        Ok(rule)
    }

    pub async fn delete_rule(&self, id: Uuid, shop_id: &str) -> DiscountResult<()> {
        let rule = self
            .mutate(Some(shop_id), self.store.delete(id, Some(shop_id)))
            .await?;
        self.invalidator.invalidate_shop(&rule.shop_id).await?;

        tracing::info!("Deleted discount rule {} for shop {}", rule.id, rule.shop_id);
        Ok(())
    }

    /// A collection's member list changed on the platform
    pub async fn collection_updated(
        &self,
        shop_id: &str,
        collection_id: &str,
        product_ids: &[String],
    ) -> DiscountResult<()> {
        self.mutate(
            Some(shop_id),
            self.store
                .replace_collection_members(shop_id, collection_id, product_ids),
        )
        .await?;
        self.invalidator.invalidate_shop(shop_id).await?;

        tracing::info!(
            "Collection {} of shop {} now has {} products",
            collection_id,
            shop_id,
            product_ids.len()
        );
        Ok(())
    }

    /// A product changed on the platform; memberships are replaced only
    /// when the notification carries them
    pub async fn product_updated(
        &self,
        shop_id: &str,
        product_id: &str,
        collection_ids: Option<&[String]>,
    ) -> DiscountResult<()> {
        if let Some(collection_ids) = collection_ids {
            self.mutate(
                Some(shop_id),
                self.store
                    .replace_product_collections(shop_id, product_id, collection_ids),
            )
            .await?;
        }
        self.invalidator.invalidate_shop(shop_id).await?;

        tracing::info!("Product {} of shop {} updated", product_id, shop_id);
        Ok(())
    }

    /// The shop removed the app: drop all of its data
    pub async fn app_uninstalled(&self, shop_id: &str) -> DiscountResult<PurgeSummary> {
        let summary = self
            .mutate(Some(shop_id), self.store.purge_shop(shop_id))
            .await?;
        self.invalidator.invalidate_shop(shop_id).await?;

        tracing::info!(
            "Purged shop {}: {} rules, {} memberships",
            shop_id,
            summary.rules_deleted,
            summary.memberships_deleted
        );
        Ok(summary)
    }
}
