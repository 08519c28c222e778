//! Ticket payload handed to the notification service after a successful payment.
//!
//! Delivery (email, WhatsApp, PDF) is external. This module only assembles
//! the data a ticket needs.

use crate::error::{BookingError, Result};
use crate::money::Money;
use crate::pricing::{PriceBreakdown, Totals};
use crate::types::{AddOn, BookingReceipt, Cart, EventSummary, Slot};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One booked game on the ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketGame {
    /// Game or custom slot title
    pub title: String,
    /// Slot start
    pub start_time: DateTime<Utc>,
    /// Slot end
    pub end_time: DateTime<Utc>,
    /// Price charged
    pub price: Money,
}

/// One add-on line on the receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketAddOn {
    /// Add-on name, with the variant name when one was chosen
    pub name: String,
    /// Units
    pub quantity: u32,
    /// Line total
    pub amount: Money,
}

/// Everything a ticket or receipt shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPayload {
    /// Booking reference
    pub booking_ref: String,
    /// Gateway transaction id
    pub transaction_id: String,
    /// Parent name
    pub parent_name: String,
    /// Parent email
    pub email: String,
    /// Parent phone
    pub phone: String,
    /// Child name
    pub child_name: String,
    /// Event title
    pub event_title: String,
    /// Event date
    pub event_date: NaiveDate,
    /// Venue, if known
    pub venue: Option<String>,
    /// Booked games
    pub games: Vec<TicketGame>,
    /// Purchased add-ons
    pub add_ons: Vec<TicketAddOn>,
    /// Discount applied
    pub discount: Money,
    /// Amount paid, as settled by the server
    pub amount_paid: Money,
}

/// Inputs of [`build_ticket`].
#[derive(Clone, Copy, Debug)]
pub struct TicketSource<'a> {
    /// The cart as submitted
    pub cart: &'a Cart,
    /// The booked event
    pub event: &'a EventSummary,
    /// Slots of the event
    pub slots: &'a [Slot],
    /// Add-on catalog
    pub add_ons: &'a [AddOn],
    /// Per-line amounts
    pub breakdown: &'a PriceBreakdown,
    /// Client totals
    pub totals: &'a Totals,
    /// What the booking service settled
    pub receipt: &'a BookingReceipt,
}

/// Builds the ticket payload for a paid booking.
///
/// # Errors
///
/// Returns `Validation` if a booked slot is missing from `source.slots`.
pub fn build_ticket(source: TicketSource<'_>, transaction_id: &str) -> Result<TicketPayload> {
    let games = source
        .breakdown
        .games
        .iter()
        .map(|game| {
            let slot = source
                .slots
                .iter()
                .find(|s| Some(s.slot_id) == game.slot_id)
                .ok_or_else(|| {
                    BookingError::validation("slot_selections", "Booked slot missing from catalog")
                })?;
            Ok(TicketGame {
                title: slot.display_title().to_string(),
                start_time: slot.start_time,
                end_time: slot.end_time,
                price: game.price,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let add_ons = source
        .breakdown
        .add_ons
        .iter()
        .map(|charge| {
            let add_on = source.add_ons.iter().find(|a| a.id == charge.line.add_on_id);
            let base = add_on.map_or_else(|| charge.line.add_on_id.to_string(), |a| a.name.clone());
            let variant = add_on
                .zip(charge.line.variant_id)
                .and_then(|(a, v)| a.variant(v))
                .map(|v| v.name.as_str());
            TicketAddOn {
                name: match variant {
                    Some(variant) => format!("{base} ({variant})"),
                    None => base,
                },
                quantity: charge.line.quantity,
                amount: charge.line_total,
            }
        })
        .collect();

    Ok(TicketPayload {
        booking_ref: source.receipt.booking_ref.clone(),
        transaction_id: transaction_id.to_string(),
        parent_name: source.cart.parent_info.name.clone(),
        email: source.cart.parent_info.email.clone(),
        phone: source.cart.parent_info.phone.clone(),
        child_name: source.cart.child_info.name.clone(),
        event_title: source.event.title.clone(),
        event_date: source.event.event_date,
        venue: source.event.venue.clone(),
        games,
        add_ons,
        discount: source.totals.discount,
        amount_paid: source.receipt.total_amount,
    })
}
