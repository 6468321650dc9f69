// Quantity Discounts Module
//
// Tiered quantity discounts for a multi-tenant storefront platform:
// - Rule store: per-shop persistence of discount rules and collection memberships
// - Resolver: picks the single best applicable rule for a product and quantity
// - Validator: reports every invariant a rule violates
// - Cache: per-shop discount cache with generation-based invalidation

pub mod error;
pub mod types;
pub mod models;
pub mod validator;
pub mod store;
pub mod cache;
pub mod resolver;
pub mod pricing;
pub mod metrics;
pub mod service;
pub mod handlers;

pub use error::{DiscountError, DiscountResult};
pub use types::{DiscountType, RuleScope};
pub use models::{DiscountRule, RuleDraft, RulePatch, Tier};
pub use store::{MemoryRuleStore, PgRuleStore, RuleStore};
pub use cache::{CacheInvalidator, DiscountCache, MemoryDiscountCache, RedisDiscountCache};
pub use resolver::{Calculation, DiscountResolver, Resolution};
pub use metrics::DiscountMetrics;
pub use service::RuleService;
