// Domain type definitions for quantity discount rules
// Shared by the store, the validator and the resolver

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Type of discount granted by a rule's tiers
///
/// Determines how a tier's discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Tier discount is a percentage of the unit price (e.g., 10 = 10% off)
    Percentage,

    /// Tier discount is an absolute amount off each unit (e.g., 2.00 = $2 off)
    Fixed,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::Fixed => write!(f, "fixed"),
        }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            _ => Err(format!("Invalid discount type: {}", s)),
        }
    }
}

/// Product-matching breadth of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Every product in the shop
    All,

    /// A single product (`productId`)
    Product,

    /// Every member of a single collection (`collectionId`)
    Collection,

    /// An explicit list of products (`productIds`)
    Products,

    /// Members of any collection in an explicit list (`collectionIds`)
    Collections,
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleScope::All => write!(f, "all"),
            RuleScope::Product => write!(f, "product"),
            RuleScope::Collection => write!(f, "collection"),
            RuleScope::Products => write!(f, "products"),
            RuleScope::Collections => write!(f, "collections"),
        }
    }
}

impl std::str::FromStr for RuleScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(RuleScope::All),
            "product" => Ok(RuleScope::Product),
            "collection" => Ok(RuleScope::Collection),
            "products" => Ok(RuleScope::Products),
            "collections" => Ok(RuleScope::Collections),
            _ => Err(format!("Invalid scope: {}", s)),
        }
    }
}

impl Default for RuleScope {
    fn default() -> Self {
        RuleScope::All
    }
}
