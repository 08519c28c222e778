//! Pricing engine.
//!
//! Pure computation of cart totals. The rounding order is part of the
//! contract: every add-on line is rounded to two decimals before the lines
//! are summed, the promo discount comes off the pre-tax subtotal, and tax is
//! rounded on its own. Client estimates and server settlement both follow
//! this order, and their totals are compared later.
//!
//! ```text
//! games_total   = Σ slot.effective_price()
//! line_total    = round2(unit * (1 - bundle%) * quantity)
//! add_ons_total = Σ line_total
//! subtotal      = games_total + add_ons_total
//! tax           = round2((subtotal - discount) * tax_rate)
//! total         = subtotal - discount + tax
//! ```

use crate::error::{BookingError, Result};
use crate::money::{Money, round2};
use crate::types::{AddOn, AddOnCharge, AddOnLine, AppliedPromo, Cart, GameSelection, Slot, VariantId};
use serde::{Deserialize, Serialize};

/// Prices the engine reads from the catalog.
#[derive(Clone, Copy, Debug)]
pub struct CatalogPrices<'a> {
    /// Slots of the selected event, as last fetched
    pub slots: &'a [Slot],
    /// Add-on catalog
    pub add_ons: &'a [AddOn],
}

/// Checkout-specific pricing parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingContext {
    /// Tax rate as a fraction (0.18 = 18%); 0 when tax does not apply
    pub tax_rate: f64,
}

/// Result of [`compute_totals`]. Every field is a two-decimal amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of selected slot prices
    pub games_total: Money,
    /// Sum of per-line rounded add-on totals
    pub add_ons_total: Money,
    /// `games_total + add_ons_total`
    pub subtotal: Money,
    /// Promo discount, at most `subtotal`
    pub discount: Money,
    /// Tax on the discounted subtotal
    pub tax: Money,
    /// Amount to pay
    pub total: Money,
}

/// Per-item amounts, as sent with the booking and printed on receipts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// One entry per selected game
    pub games: Vec<GameSelection>,
    /// One entry per add-on line
    pub add_ons: Vec<AddOnCharge>,
}

/// Unit price of an add-on line before any bundle discount:
/// `variant.price ?? (add_on.price + variant.price_modifier)`.
///
/// # Errors
///
/// Returns `Validation` if `variant_id` does not belong to `add_on`.
pub fn resolve_variant_price(add_on: &AddOn, variant_id: Option<VariantId>) -> Result<Money> {
    let Some(variant_id) = variant_id else {
        return Ok(add_on.price);
    };
    let variant = add_on.variant(variant_id).ok_or_else(|| {
        BookingError::validation(
            "add_on_selections",
            format!("Variant {variant_id} is not offered for {}", add_on.name),
        )
    })?;
    Ok(variant.price.unwrap_or(add_on.price + variant.price_modifier))
}

/// Prices one add-on line, rounding the line total to two decimals.
///
/// # Errors
///
/// Returns `Validation` for a zero quantity or an unknown variant.
pub fn price_add_on_line(add_on: &AddOn, line: &AddOnLine) -> Result<AddOnCharge> {
    if line.quantity == 0 {
        return Err(BookingError::validation(
            "add_on_selections",
            format!("Quantity for {} must be at least 1", add_on.name),
        ));
    }
    let base = resolve_variant_price(add_on, line.variant_id)?;
    let mut unit = base.as_major();
    if let Some(bundle) = add_on.bundle_discount.filter(|b| b.applies_to(line.quantity)) {
        unit *= 1.0 - bundle.discount_percentage / 100.0;
    }
    let line_total = to_money(round2(unit * f64::from(line.quantity)), "add_on_selections")?;
    let unit_price = to_money(round2(unit), "add_on_selections")?;
    Ok(AddOnCharge {
        line: *line,
        unit_price,
        line_total,
    })
}

/// Prices every selected game.
///
/// # Errors
///
/// Returns `Validation` if a selected slot is not in the catalog view; a
/// missing price is never silently treated as zero.
pub fn price_games(cart: &Cart, slots: &[Slot]) -> Result<Vec<GameSelection>> {
    cart.slot_selections
        .iter()
        .map(|selected| {
            let slot = slots
                .iter()
                .find(|s| s.slot_id == selected.slot_id)
                .ok_or_else(|| {
                    BookingError::validation(
                        "slot_selections",
                        format!("Slot {} is no longer available", selected.slot_id),
                    )
                })?;
            Ok(GameSelection {
                game_id: selected.game_id,
                slot_id: Some(selected.slot_id),
                price: slot.effective_price(),
            })
        })
        .collect()
}

/// Prices every add-on line.
///
/// # Errors
///
/// Returns `Validation` for unknown add-ons, unknown variants or zero quantities.
pub fn price_add_ons(cart: &Cart, add_ons: &[AddOn]) -> Result<Vec<AddOnCharge>> {
    cart.add_on_selections
        .iter()
        .map(|line| {
            let add_on = add_ons
                .iter()
                .find(|a| a.id == line.add_on_id)
                .ok_or_else(|| {
                    BookingError::validation(
                        "add_on_selections",
                        format!("Add-on {} is no longer available", line.add_on_id),
                    )
                })?;
            price_add_on_line(add_on, line)
        })
        .collect()
}

/// Per-item amounts for the cart.
///
/// # Errors
///
/// See [`price_games`] and [`price_add_ons`].
pub fn price_breakdown(cart: &Cart, prices: CatalogPrices<'_>) -> Result<PriceBreakdown> {
    Ok(PriceBreakdown {
        games: price_games(cart, prices.slots)?,
        add_ons: price_add_ons(cart, prices.add_ons)?,
    })
}

/// Computes cart totals. Pure: the same inputs always give the same totals.
///
/// # Errors
///
/// Returns `Validation` when the cart references items missing from the
/// catalog view, or when `context.tax_rate` is negative or not finite.
pub fn compute_totals(
    cart: &Cart,
    prices: CatalogPrices<'_>,
    applied_promo: Option<&AppliedPromo>,
    context: PricingContext,
) -> Result<Totals> {
    if !context.tax_rate.is_finite() || context.tax_rate < 0.0 {
        return Err(BookingError::validation(
            "tax_rate",
            format!("Tax rate {} is not a valid rate", context.tax_rate),
        ));
    }

    let breakdown = price_breakdown(cart, prices)?;
    Ok(totals_from_breakdown(&breakdown, applied_promo, context))
}

/// Aggregates an already priced breakdown.
#[must_use]
pub fn totals_from_breakdown(
    breakdown: &PriceBreakdown,
    applied_promo: Option<&AppliedPromo>,
    context: PricingContext,
) -> Totals {
    let games_total: Money = breakdown.games.iter().map(|g| g.price).sum();
    let add_ons_total: Money = breakdown.add_ons.iter().map(|a| a.line_total).sum();
    let subtotal = games_total + add_ons_total;

    let discount = applied_promo
        .map_or(Money::ZERO, |promo| promo.discount)
        .min(subtotal);
    let taxable = subtotal.saturating_sub(discount);
    let tax = taxable.scale(context.tax_rate);
    let total = taxable + tax;

    Totals {
        games_total,
        add_ons_total,
        subtotal,
        discount,
        tax,
        total,
    }
}

fn to_money(amount: f64, field: &str) -> Result<Money> {
    Money::from_major(amount)
        .ok_or_else(|| BookingError::validation(field, format!("Amount {amount} is out of range")))
}
