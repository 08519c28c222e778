//! Step validation. Failures block the step advance and are shown to the user.

use super::CheckoutState;
use crate::error::{BookingError, Result};
use crate::pricing;
use chrono::NaiveDate;

/// Checks everything step 1 collects.
///
/// # Errors
///
/// Returns the first `Validation` or `SlotClosed` problem found.
pub fn validate_details(state: &CheckoutState, today: NaiveDate) -> Result<()> {
    let parent = &state.cart.parent_info;
    if parent.name.trim().is_empty() {
        return Err(BookingError::validation("parent_name", "Parent name is required"));
    }
    let email = parent.email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(BookingError::validation("email", "Enter a valid email address"));
    }
    if parent.phone.chars().filter(char::is_ascii_digit).count() < 10 {
        return Err(BookingError::validation("phone", "Enter a valid 10-digit mobile number"));
    }

    let child = &state.cart.child_info;
    if child.name.trim().is_empty() {
        return Err(BookingError::validation("child_name", "Child's name is required"));
    }
    match child.date_of_birth {
        None => {
            return Err(BookingError::validation(
                "date_of_birth",
                "Child's date of birth is required",
            ));
        }
        Some(dob) if dob > today => {
            return Err(BookingError::validation(
                "date_of_birth",
                "Date of birth cannot be in the future",
            ));
        }
        Some(_) => {}
    }

    if state.cart.city_selection.is_none() {
        return Err(BookingError::validation("city", "Select a city"));
    }
    if state.cart.event_selection.is_none() {
        return Err(BookingError::validation("event", "Select an event"));
    }
    if state.cart.slot_selections.is_empty() {
        return Err(BookingError::validation("slot_selections", "Select at least one game slot"));
    }
    for selected in state.cart.slot_selections.iter() {
        let slot = state
            .slots
            .iter()
            .find(|s| s.slot_id == selected.slot_id)
            .ok_or_else(|| {
                BookingError::validation(
                    "slot_selections",
                    "A selected slot is no longer available",
                )
            })?;
        if !slot.is_open() {
            return Err(BookingError::SlotClosed {
                slot_id: slot.slot_id,
            });
        }
    }
    Ok(())
}

/// Checks the add-on lines of step 2.
///
/// # Errors
///
/// Returns `Validation` for unknown add-ons, missing or unknown variants,
/// zero quantities and out-of-stock variants.
pub fn validate_add_ons(state: &CheckoutState) -> Result<()> {
    for line in &state.cart.add_on_selections {
        let Some(add_on) = state.add_ons.iter().find(|a| a.id == line.add_on_id) else {
            return Err(BookingError::validation(
                "add_on_selections",
                "A selected add-on is no longer available",
            ));
        };
        match line.variant_id {
            None if !add_on.variants.is_empty() => {
                return Err(BookingError::validation(
                    "add_on_selections",
                    format!("Choose an option for {}", add_on.name),
                ));
            }
            Some(variant_id) => {
                if let Some(variant) = add_on.variant(variant_id) {
                    if variant.stock_quantity < line.quantity {
                        return Err(BookingError::validation(
                            "add_on_selections",
                            format!("Only {} left of {} {}", variant.stock_quantity, add_on.name, variant.name),
                        ));
                    }
                }
            }
            None => {}
        }
        pricing::price_add_on_line(add_on, line)?;
    }
    Ok(())
}

/// Checks the whole cart before a booking is created.
///
/// # Errors
///
/// Returns the first problem of steps 1 and 2, or a `Validation` error when
/// the terms are not accepted.
pub fn validate_submission(state: &CheckoutState, today: NaiveDate) -> Result<()> {
    validate_details(state, today)?;
    validate_add_ons(state)?;
    if !state.cart.terms_accepted {
        return Err(BookingError::validation("terms", "Accept the terms and conditions to continue"));
    }
    Ok(())
}
