// Rule store: durable, shop-partitioned persistence of discount rules and
// the product/collection memberships used for scope matching

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::discounts::error::{DiscountError, DiscountResult};
use crate::discounts::models::{DiscountRule, NewRule, RuleDraft, RuleFilters, RulePatch};
use crate::discounts::validator;

pub use self::memory::MemoryRuleStore;
pub use self::postgres::PgRuleStore;

/// Default bound on a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Rows removed when a shop uninstalls the app
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeSummary {
    pub rules_deleted: u64,
    pub memberships_deleted: u64,
}

/// Persistence operations for discount rules
///
/// Every query is scoped to a shop. `shop_scope` on the single-rule
/// operations makes a rule owned by another shop indistinguishable from a
/// missing one.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Validate and persist a new rule with a fresh id and timestamps
    async fn create(&self, draft: RuleDraft) -> DiscountResult<DiscountRule>;

    async fn get(&self, id: Uuid, shop_scope: Option<&str>) -> DiscountResult<DiscountRule>;

    /// Merge the patch over the stored rule, re-validate the result and
    /// persist it atomically; shop, id and creation time never change
    async fn update(
        &self,
        id: Uuid,
        shop_scope: Option<&str>,
        patch: RulePatch,
    ) -> DiscountResult<DiscountRule>;

    /// Hard delete, returning the removed rule
    async fn delete(&self, id: Uuid, shop_scope: Option<&str>) -> DiscountResult<DiscountRule>;

    /// All of a shop's rules, newest first
    async fn list_by_shop(
        &self,
        shop_id: &str,
        filters: RuleFilters,
    ) -> DiscountResult<Vec<DiscountRule>>;

    /// Active rules of the shop whose window contains `now` and whose scope
    /// covers the product, newest first
    async fn find_applicable(
        &self,
        shop_id: &str,
        product_id: &str,
        collection_ids: &[String],
        now: DateTime<Utc>,
    ) -> DiscountResult<Vec<DiscountRule>>;

    /// Stored collection memberships of a product
    async fn collections_for_product(
        &self,
        shop_id: &str,
        product_id: &str,
    ) -> DiscountResult<Vec<String>>;

    /// Replace the member list of a collection
    async fn replace_collection_members(
        &self,
        shop_id: &str,
        collection_id: &str,
        product_ids: &[String],
    ) -> DiscountResult<()>;

    /// Replace the collections a product belongs to
    async fn replace_product_collections(
        &self,
        shop_id: &str,
        product_id: &str,
        collection_ids: &[String],
    ) -> DiscountResult<()>;

    /// Delete every rule and membership of the shop
    async fn purge_shop(&self, shop_id: &str) -> DiscountResult<PurgeSummary>;
}

/// Run a store call with an upper bound on its duration
pub async fn bounded<T, F>(timeout: Duration, operation: F) -> DiscountResult<T>
where
    F: Future<Output = DiscountResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Rule store call timed out after {}ms", timeout.as_millis());
            Err(DiscountError::StoreUnavailable(format!(
                "timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}

pub(crate) fn validate_draft(draft: &RuleDraft) -> DiscountResult<NewRule> {
    validator::validate(draft).map_err(DiscountError::Validation)
}

/// Merged view of a stored rule with a patch applied, validated as a whole
pub(crate) fn merge_patch(existing: &DiscountRule, patch: RulePatch) -> DiscountResult<NewRule> {
    let mut draft = RuleDraft::from(existing);
    patch.apply_to(&mut draft);
    validate_draft(&draft)
}

pub(crate) fn visible_to(rule: &DiscountRule, shop_scope: Option<&str>) -> bool {
    shop_scope.map_or(true, |shop| rule.shop_id == shop)
}
