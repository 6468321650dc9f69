use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::discounts::types::{DiscountType, RuleScope};

/// A (minimum quantity, discount value) pair within a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tier {
    pub quantity: i32,
    pub discount: Decimal,
}

/// Domain model representing a stored discount rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRule {
    pub id: Uuid,
    pub shop_id: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub scope: RuleScope,
    pub product_id: Option<String>,
    pub collection_id: Option<String>,
    pub product_ids: Vec<String>,
    pub collection_ids: Vec<String>,
    /// Sorted by ascending quantity
    pub tiers: Vec<Tier>,
    pub active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscountRule {
    /// Whether the rule's scope covers the product, directly or through
    /// one of the collections it belongs to
    pub fn applies_to(&self, product_id: &str, collection_ids: &[String]) -> bool {
        match self.scope {
            RuleScope::All => true,
            RuleScope::Product => self.product_id.as_deref() == Some(product_id),
            RuleScope::Collection => self
                .collection_id
                .as_ref()
                .map_or(false, |id| collection_ids.contains(id)),
            RuleScope::Products => self.product_ids.iter().any(|id| id == product_id),
            RuleScope::Collections => self
                .collection_ids
                .iter()
                .any(|id| collection_ids.contains(id)),
        }
    }

    /// Active and inside its (inclusive) validity window at `now`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.start_date.map_or(true, |start| start <= now)
            && self.end_date.map_or(true, |end| now <= end)
    }
}

/// Tier as submitted by a client; both values are optional so that missing
/// ones can be reported alongside every other violation
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TierInput {
    pub quantity: Option<i64>,
    pub discount: Option<Decimal>,
}

impl From<&Tier> for TierInput {
    fn from(tier: &Tier) -> Self {
        Self {
            quantity: Some(i64::from(tier.quantity)),
            discount: Some(tier.discount),
        }
    }
}

/// Unvalidated rule input, used for creation and as the merge target of updates
///
/// `type` and `scope` stay raw strings so that unknown values end up in the
/// violation list instead of failing JSON extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub shop_id: Option<String>,
    #[serde(rename = "type")]
    pub discount_type: Option<String>,
    /// Inferred from the target fields when omitted
    pub scope: Option<String>,
    pub product_id: Option<String>,
    pub collection_id: Option<String>,
    pub product_ids: Option<Vec<String>>,
    pub collection_ids: Option<Vec<String>>,
    pub tiers: Option<Vec<TierInput>>,
    pub active: Option<bool>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl From<&DiscountRule> for RuleDraft {
    fn from(rule: &DiscountRule) -> Self {
        let non_empty = |ids: &Vec<String>| (!ids.is_empty()).then(|| ids.clone());

        Self {
            shop_id: Some(rule.shop_id.clone()),
            discount_type: Some(rule.discount_type.to_string()),
            scope: Some(rule.scope.to_string()),
            product_id: rule.product_id.clone(),
            collection_id: rule.collection_id.clone(),
            product_ids: non_empty(&rule.product_ids),
            collection_ids: non_empty(&rule.collection_ids),
            tiers: Some(rule.tiers.iter().map(TierInput::from).collect()),
            active: Some(rule.active),
            start_date: rule.start_date.map(|d| d.to_rfc3339()),
            end_date: rule.end_date.map(|d| d.to_rfc3339()),
        }
    }
}

/// Validated rule ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub shop_id: String,
    pub discount_type: DiscountType,
    pub scope: RuleScope,
    pub product_id: Option<String>,
    pub collection_id: Option<String>,
    pub product_ids: Vec<String>,
    pub collection_ids: Vec<String>,
    pub tiers: Vec<Tier>,
    pub active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Distinguishes "field absent" (`None`) from "field explicitly null"
/// (`Some(None)`) in partial updates
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update for a rule; omitted fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    #[serde(rename = "type")]
    pub discount_type: Option<String>,
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub product_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub collection_id: Option<Option<String>>,
    pub product_ids: Option<Vec<String>>,
    pub collection_ids: Option<Vec<String>>,
    pub tiers: Option<Vec<TierInput>>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub end_date: Option<Option<String>>,
}

impl RulePatch {
    fn touches_target(&self) -> bool {
        self.scope.is_some()
            || self.product_id.is_some()
            || self.collection_id.is_some()
            || self.product_ids.is_some()
            || self.collection_ids.is_some()
    }

    /// Merge this patch over an existing draft
    ///
    /// Any change to the scope or one of its target fields replaces the whole
    /// target: fields not named in the patch are cleared and the scope is
    /// re-inferred unless given.
    pub fn apply_to(self, draft: &mut RuleDraft) {
        if self.touches_target() {
            draft.scope = self.scope;
            draft.product_id = self.product_id.flatten();
            draft.collection_id = self.collection_id.flatten();
            draft.product_ids = self.product_ids;
            draft.collection_ids = self.collection_ids;
        }
        if let Some(discount_type) = self.discount_type {
            draft.discount_type = Some(discount_type);
        }
        if let Some(tiers) = self.tiers {
            draft.tiers = Some(tiers);
        }
        if let Some(active) = self.active {
            draft.active = Some(active);
        }
        if let Some(start_date) = self.start_date {
            draft.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            draft.end_date = end_date;
        }
    }
}

/// Optional filters for listing a shop's rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFilters {
    pub active: Option<bool>,
    pub scope: Option<RuleScope>,
}

impl RuleFilters {
    pub fn matches(&self, rule: &DiscountRule) -> bool {
        self.active.map_or(true, |active| rule.active == active)
            && self.scope.map_or(true, |scope| rule.scope == scope)
    }
}

/// Query parameters for GET /api/rules
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListRulesQuery {
    #[validate(length(min = 1, message = "shopId is required"))]
    pub shop_id: String,
    pub active: Option<bool>,
    pub scope: Option<RuleScope>,
}

impl ListRulesQuery {
    pub fn filters(&self) -> RuleFilters {
        RuleFilters {
            active: self.active,
            scope: self.scope,
        }
    }
}

/// Owning shop on single-rule endpoints
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ShopScopeQuery {
    /// The rule must belong to this shop
    #[validate(length(min = 1, message = "shopId is required"))]
    pub shop_id: String,
}

/// Query parameters for GET /api/discount
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DiscountQuery {
    #[validate(length(min = 1, message = "shopId is required"))]
    pub shop_id: String,
    #[validate(length(min = 1, message = "productId is required"))]
    pub product_id: String,
    pub quantity: i64,
    /// Comma-separated collection ids; looked up from stored memberships when omitted
    pub collection_ids: Option<String>,
    /// Unit price, enables the price breakdown in the response
    pub price: Option<Decimal>,
}

impl DiscountQuery {
    pub fn collection_ids(&self) -> Option<Vec<String>> {
        self.collection_ids.as_ref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// Per-unit and total effect of a discount on a given unit price
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub unit_price: Decimal,
    pub discounted_unit_price: Decimal,
    pub quantity: i64,
    pub original_total: Decimal,
    pub discounted_total: Decimal,
    pub savings: Decimal,
}

/// Response body for GET /api/discount
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountResponse {
    /// Fraction of the price for percentage rules, absolute per-unit amount for fixed rules
    pub discount: Decimal,
    /// Absent when no rule qualifies
    #[serde(rename = "type")]
    pub discount_type: Option<DiscountType>,
    pub rule_id: Option<Uuid>,
    pub min_quantity: Option<i32>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PriceBreakdown>,
}

/// Collection membership change notification
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CollectionUpdateWebhook {
    #[validate(length(min = 1, message = "shopId is required"))]
    pub shop_id: String,
    #[validate(length(min = 1, message = "collectionId is required"))]
    pub collection_id: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

/// Product change notification; `collectionIds`, when present, replaces the
/// product's stored memberships
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdateWebhook {
    #[validate(length(min = 1, message = "shopId is required"))]
    pub shop_id: String,
    #[validate(length(min = 1, message = "productId is required"))]
    pub product_id: String,
    pub collection_ids: Option<Vec<String>>,
}

/// App uninstall notification
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AppUninstalledWebhook {
    #[validate(length(min = 1, message = "shopId is required"))]
    pub shop_id: String,
}
