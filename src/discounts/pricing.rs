// Price preview
//
// Applies a resolved discount to a unit price. Totals never go below zero.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::discounts::error::{DiscountError, DiscountResult};
use crate::discounts::models::PriceBreakdown;
use crate::discounts::resolver::Resolution;
use crate::discounts::types::DiscountType;

/// Round a monetary amount to cents
fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn out_of_range() -> DiscountError {
    DiscountError::InvalidArgument("price or quantity is too large to preview".to_string())
}

/// Discount amount for the whole line
fn line_discount(
    resolution: &Resolution,
    original_total: Decimal,
    quantity: Decimal,
) -> DiscountResult<Decimal> {
    let amount = match resolution.discount_type {
        Some(DiscountType::Percentage) => original_total.checked_mul(resolution.value),
        Some(DiscountType::Fixed) => resolution.value.checked_mul(quantity),
        None => Some(Decimal::ZERO),
    };
    amount.ok_or_else(out_of_range)
}

/// Breakdown of `quantity` units at `unit_price` with the discount applied
///
/// Fails with `InvalidArgument` when the totals do not fit a `Decimal`.
pub fn price_breakdown(
    resolution: &Resolution,
    unit_price: Decimal,
    quantity: i64,
) -> DiscountResult<PriceBreakdown> {
    let units = Decimal::from(quantity);
    let original_total = money(unit_price.checked_mul(units).ok_or_else(out_of_range)?);
    let discount = line_discount(resolution, original_total, units)?;
    let remaining = original_total.checked_sub(discount).ok_or_else(out_of_range)?;
    let discounted_total = money(remaining.max(Decimal::ZERO));

    let discounted_unit_price = if quantity > 0 {
        money(discounted_total / units)
    } else {
        money(unit_price)
    };

    Ok(PriceBreakdown {
        unit_price,
        discounted_unit_price,
        quantity,
        original_total,
        discounted_total,
        savings: original_total - discounted_total,
    })
}
