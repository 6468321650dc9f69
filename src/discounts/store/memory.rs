// In-memory rule store, used for tests and local development

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{merge_patch, validate_draft, visible_to, PurgeSummary, RuleStore};
use crate::discounts::error::{DiscountError, DiscountResult};
use crate::discounts::models::{DiscountRule, NewRule, RuleDraft, RuleFilters, RulePatch};

#[derive(Debug)]
struct StoredRule {
    /// Insertion order, breaks ties between equal creation timestamps
    seq: u64,
    rule: DiscountRule,
}

#[derive(Debug, Default)]
struct StoreState {
    rules: HashMap<Uuid, StoredRule>,
    /// (shop, product, collection)
    memberships: BTreeSet<(String, String, String)>,
    next_seq: u64,
}

impl StoreState {
    /// Rules matching the predicate, newest first
    fn newest_first<F>(&self, predicate: F) -> Vec<DiscountRule>
    where
        F: Fn(&DiscountRule) -> bool,
    {
        let mut matching: Vec<&StoredRule> = self
            .rules
            .values()
            .filter(|stored| predicate(&stored.rule))
            .collect();
        matching.sort_by(|a, b| {
            (b.rule.created_at, b.seq).cmp(&(a.rule.created_at, a.seq))
        });
        matching.into_iter().map(|stored| stored.rule.clone()).collect()
    }

    fn visible_mut(&mut self, id: Uuid, shop_scope: Option<&str>) -> DiscountResult<&mut StoredRule> {
        self.rules
            .get_mut(&id)
            .filter(|stored| visible_to(&stored.rule, shop_scope))
            .ok_or(DiscountError::NotFound(id))
    }
}

fn apply(rule: &mut DiscountRule, validated: NewRule, now: DateTime<Utc>) {
    rule.discount_type = validated.discount_type;
    rule.scope = validated.scope;
    rule.product_id = validated.product_id;
    rule.collection_id = validated.collection_id;
    rule.product_ids = validated.product_ids;
    rule.collection_ids = validated.collection_ids;
    rule.tiers = validated.tiers;
    rule.active = validated.active;
    rule.start_date = validated.start_date;
    rule.end_date = validated.end_date;
    rule.updated_at = now;
}

#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    state: RwLock<StoreState>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn create(&self, draft: RuleDraft) -> DiscountResult<DiscountRule> {
        let validated = validate_draft(&draft)?;
        let now = Utc::now();
        let rule = DiscountRule {
            id: Uuid::new_v4(),
            shop_id: validated.shop_id,
            discount_type: validated.discount_type,
            scope: validated.scope,
            product_id: validated.product_id,
            collection_id: validated.collection_id,
            product_ids: validated.product_ids,
            collection_ids: validated.collection_ids,
            tiers: validated.tiers,
            active: validated.active,
            start_date: validated.start_date,
            end_date: validated.end_date,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.rules.insert(
            rule.id,
            StoredRule {
                seq,
                rule: rule.clone(),
            },
        );
        Ok(rule)
    }

    async fn get(&self, id: Uuid, shop_scope: Option<&str>) -> DiscountResult<DiscountRule> {
        let state = self.state.read().await;
        state
            .rules
            .get(&id)
            .map(|stored| &stored.rule)
            .filter(|rule| visible_to(rule, shop_scope))
            .cloned()
            .ok_or(DiscountError::NotFound(id))
    }

    async fn update(
        &self,
        id: Uuid,
        shop_scope: Option<&str>,
        patch: RulePatch,
    ) -> DiscountResult<DiscountRule> {
        // Held across read, merge and write so concurrent patches serialise
        let mut state = self.state.write().await;
        let stored = state.visible_mut(id, shop_scope)?;

        let validated = merge_patch(&stored.rule, patch)?;
        apply(&mut stored.rule, validated, Utc::now());
        Ok(stored.rule.clone())
    }

    async fn delete(&self, id: Uuid, shop_scope: Option<&str>) -> DiscountResult<DiscountRule> {
        let mut state = self.state.write().await;
        state.visible_mut(id, shop_scope)?;
        state
            .rules
            .remove(&id)
            .map(|stored| stored.rule)
            .ok_or(DiscountError::NotFound(id))
    }

    async fn list_by_shop(
        &self,
        shop_id: &str,
        filters: RuleFilters,
    ) -> DiscountResult<Vec<DiscountRule>> {
        let state = self.state.read().await;
        Ok(state.newest_first(|rule| rule.shop_id == shop_id && filters.matches(rule)))
    }

    async fn find_applicable(
        &self,
        shop_id: &str,
        product_id: &str,
        collection_ids: &[String],
        now: DateTime<Utc>,
    ) -> DiscountResult<Vec<DiscountRule>> {
        let state = self.state.read().await;
        Ok(state.newest_first(|rule| {
            rule.shop_id == shop_id
                && rule.is_live_at(now)
                && rule.applies_to(product_id, collection_ids)
        }))
    }

    async fn collections_for_product(
        &self,
        shop_id: &str,
        product_id: &str,
    ) -> DiscountResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .filter(|(shop, product, _)| shop == shop_id && product == product_id)
            .map(|(_, _, collection)| collection.clone())
            .collect())
    }

    async fn replace_collection_members(
        &self,
        shop_id: &str,
        collection_id: &str,
        product_ids: &[String],
    ) -> DiscountResult<()> {
        let mut state = self.state.write().await;
        state
            .memberships
            .retain(|(shop, _, collection)| !(shop == shop_id && collection == collection_id));
        for product_id in product_ids {
            state.memberships.insert((
                shop_id.to_string(),
                product_id.clone(),
                collection_id.to_string(),
            ));
        }
        Ok(())
    }

    async fn replace_product_collections(
        &self,
        shop_id: &str,
        product_id: &str,
        collection_ids: &[String],
    ) -> DiscountResult<()> {
        let mut state = self.state.write().await;
        state
            .memberships
            .retain(|(shop, product, _)| !(shop == shop_id && product == product_id));
        for collection_id in collection_ids {
            state.memberships.insert((
                shop_id.to_string(),
                product_id.to_string(),
                collection_id.clone(),
            ));
        }
        Ok(())
    }

    async fn purge_shop(&self, shop_id: &str) -> DiscountResult<PurgeSummary> {
        let mut state = self.state.write().await;

        let rules_before = state.rules.len();
        state.rules.retain(|_, stored| stored.rule.shop_id != shop_id);
        let memberships_before = state.memberships.len();
        state.memberships.retain(|(shop, _, _)| shop != shop_id);

        Ok(PurgeSummary {
            rules_deleted: (rules_before - state.rules.len()) as u64,
            memberships_deleted: (memberships_before - state.memberships.len()) as u64,
        })
    }
}
