// Rule Validator
//
// Pure invariant checks for discount rules. Every violation is collected so the
// caller can report all of them in a single response.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;

use crate::discounts::models::{NewRule, RuleDraft, Tier};
use crate::discounts::types::{DiscountType, RuleScope};

/// Ceiling for percentage tier discounts
const MAX_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;

/// Validate a rule draft
///
/// Checks, in order: presence of shop/type/tiers, per-tier values (including
/// the percentage ceiling), unique tier quantities, date formats, date order
/// and finally scope consistency. On success the draft is returned normalised:
/// ids trimmed, tiers sorted by ascending quantity, dates parsed.
pub fn validate(draft: &RuleDraft) -> Result<NewRule, Vec<String>> {
    let mut errors = Vec::new();

    let shop_id = non_blank(&draft.shop_id);
    if shop_id.is_none() {
        errors.push("Shop ID is required".to_string());
    }

    let discount_type = match non_blank(&draft.discount_type) {
        None => {
            errors.push("Discount type is required".to_string());
            None
        }
        Some(raw) => match DiscountType::from_str(&raw) {
            Ok(discount_type) => Some(discount_type),
            Err(_) => {
                errors.push(
                    "Invalid discount type. Must be either \"percentage\" or \"fixed\"".to_string(),
                );
                None
            }
        },
    };

    let tiers = match &draft.tiers {
        None => {
            errors.push("Discount tiers are required".to_string());
            Vec::new()
        }
        Some(tiers) if tiers.is_empty() => {
            errors.push("At least one discount tier is required".to_string());
            Vec::new()
        }
        Some(tiers) => {
            let mut valid = Vec::with_capacity(tiers.len());
            for (index, tier) in tiers.iter().enumerate() {
                let n = index + 1;
                let (quantity, discount) = match (tier.quantity, tier.discount) {
                    (Some(quantity), Some(discount)) => (quantity, discount),
                    _ => {
                        errors.push(format!(
                            "Tier {} must have both quantity and discount values",
                            n
                        ));
                        continue;
                    }
                };

                let mut tier_ok = true;
                if quantity <= 0 {
                    errors.push(format!("Tier {} quantity must be greater than 0", n));
                    tier_ok = false;
                } else if quantity > i64::from(i32::MAX) {
                    errors.push(format!("Tier {} quantity is too large", n));
                    tier_ok = false;
                }
                if discount < Decimal::ZERO {
                    errors.push(format!("Tier {} discount cannot be negative", n));
                    tier_ok = false;
                }
                if discount_type == Some(DiscountType::Percentage) && discount > MAX_PERCENTAGE {
                    errors.push(format!(
                        "Tier {} percentage discount cannot exceed 100%",
                        n
                    ));
                    tier_ok = false;
                }

                if tier_ok {
                    // Bounds checked above
                    valid.push(Tier {
                        quantity: quantity as i32,
                        discount,
                    });
                }
            }

            let mut seen = HashSet::new();
            let mut reported = HashSet::new();
            for tier in &valid {
                if !seen.insert(tier.quantity) && reported.insert(tier.quantity) {
                    errors.push(format!(
                        "Tier quantities must be unique (quantity {} appears more than once)",
                        tier.quantity
                    ));
                }
            }

            valid.sort_by_key(|tier| tier.quantity);
            valid
        }
    };

    let start_date = parse_date(&draft.start_date, "start", &mut errors);
    let end_date = parse_date(&draft.end_date, "end", &mut errors);
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            errors.push("End date must be after start date".to_string());
        }
    }

    let target = validate_scope(draft, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    // Every None below has pushed an error above
    let (Some(shop_id), Some(discount_type), Some(target)) = (shop_id, discount_type, target)
    else {
        return Err(vec!["Rule is incomplete".to_string()]);
    };

    Ok(NewRule {
        shop_id,
        discount_type,
        scope: target.scope,
        product_id: target.product_id,
        collection_id: target.collection_id,
        product_ids: target.product_ids,
        collection_ids: target.collection_ids,
        tiers,
        active: draft.active.unwrap_or(true),
        start_date,
        end_date,
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
pub fn parse_date_str(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_date(
    value: &Option<String>,
    label: &str,
    errors: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let raw = non_blank(value)?;
    let parsed = parse_date_str(&raw);
    if parsed.is_none() {
        errors.push(format!("Invalid {} date format", label));
    }
    parsed
}

struct Target {
    scope: RuleScope,
    product_id: Option<String>,
    collection_id: Option<String>,
    product_ids: Vec<String>,
    collection_ids: Vec<String>,
}

fn clean_ids(ids: &Option<Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .flatten()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

fn validate_scope(draft: &RuleDraft, errors: &mut Vec<String>) -> Option<Target> {
    let product_id = non_blank(&draft.product_id);
    let collection_id = non_blank(&draft.collection_id);
    let product_ids = clean_ids(&draft.product_ids);
    let collection_ids = clean_ids(&draft.collection_ids);

    let scope = match non_blank(&draft.scope) {
        Some(raw) => match RuleScope::from_str(&raw) {
            Ok(scope) => scope,
            Err(_) => {
                errors.push(
                    "Invalid scope. Must be one of \"all\", \"product\", \"collection\", \"products\" or \"collections\""
                        .to_string(),
                );
                return None;
            }
        },
        None if product_id.is_some() => RuleScope::Product,
        None if collection_id.is_some() => RuleScope::Collection,
        None if !product_ids.is_empty() => RuleScope::Products,
        None if !collection_ids.is_empty() => RuleScope::Collections,
        None => RuleScope::All,
    };

    if product_id.is_some() && collection_id.is_some() {
        errors.push("A rule cannot target both a product and a collection".to_string());
        return None;
    }

    let present = [
        ("productId", product_id.is_some()),
        ("collectionId", collection_id.is_some()),
        ("productIds", !product_ids.is_empty()),
        ("collectionIds", !collection_ids.is_empty()),
    ];
    let allowed = match scope {
        RuleScope::All => None,
        RuleScope::Product => Some("productId"),
        RuleScope::Collection => Some("collectionId"),
        RuleScope::Products => Some("productIds"),
        RuleScope::Collections => Some("collectionIds"),
    };

    let before = errors.len();
    for (field, is_set) in present {
        if is_set && Some(field) != allowed {
            errors.push(format!("Scope \"{}\" does not accept {}", scope, field));
        }
    }
    match scope {
        RuleScope::All => {}
        RuleScope::Product if product_id.is_none() => {
            errors.push("Scope \"product\" requires a product ID".to_string());
        }
        RuleScope::Collection if collection_id.is_none() => {
            errors.push("Scope \"collection\" requires a collection ID".to_string());
        }
        RuleScope::Products if product_ids.is_empty() => {
            errors.push("Scope \"products\" requires at least one product ID".to_string());
        }
        RuleScope::Collections if collection_ids.is_empty() => {
            errors.push("Scope \"collections\" requires at least one collection ID".to_string());
        }
        _ => {}
    }
    if errors.len() > before {
        return None;
    }

    Some(Target {
        scope,
        product_id,
        collection_id,
        product_ids,
        collection_ids,
    })
}
