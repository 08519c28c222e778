//! Domain types for event bookings.
//!
//! Catalog entities (cities, events, slots, add-ons, promo codes) are read-only
//! views delivered by external services. The cart, booking and payment types
//! are owned by the checkout flow.

use crate::money::Money;
use crate::slots::SlotSelection;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw catalog id
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw id
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a city
    CityId
);
id_type!(
    /// Identifier of a catalog event
    EventId
);
id_type!(
    /// Identifier of a game (activity) offered at events
    GameId
);
id_type!(
    /// Identifier of a bookable slot; the authoritative slot identity
    SlotId
);
id_type!(
    /// Identifier of an add-on product
    AddOnId
);
id_type!(
    /// Identifier of an add-on variant
    VariantId
);
id_type!(
    /// Identifier of a booking row
    BookingId
);
id_type!(
    /// Identifier of an authenticated user
    UserId
);

// ============================================================================
// People
// ============================================================================

/// Contact details of the booking parent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentInfo {
    /// Full name
    pub name: String,
    /// Email for receipts
    pub email: String,
    /// Mobile number (10 digits)
    pub phone: String,
}

/// The child who takes part in the games.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildInfo {
    /// Child's name
    pub name: String,
    /// Date of birth, drives age-based game eligibility
    pub date_of_birth: Option<NaiveDate>,
    /// Gender as entered
    pub gender: Option<String>,
    /// School name, optional
    pub school: Option<String>,
}

/// Age in completed months on `on`, or `None` if born after `on`.
#[must_use]
pub fn age_in_months(date_of_birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    if date_of_birth > on {
        return None;
    }
    let years = i64::from(on.year()) - i64::from(date_of_birth.year());
    let months = i64::from(on.month0()) - i64::from(date_of_birth.month0());
    let mut total = years * 12 + months;
    if on.day() < date_of_birth.day() {
        total -= 1;
    }
    u32::try_from(total).ok()
}

// ============================================================================
// Catalog views
// ============================================================================

/// A city with events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// City id
    pub id: CityId,
    /// Display name
    pub name: String,
}

/// An event held in a city on one date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event id
    pub id: EventId,
    /// City hosting the event
    pub city_id: CityId,
    /// Event title
    pub title: String,
    /// Event date
    pub event_date: NaiveDate,
    /// Venue name
    pub venue: Option<String>,
}

/// One bookable time window of one game at one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Authoritative slot identity
    pub slot_id: SlotId,
    /// Event the slot belongs to
    pub event_id: EventId,
    /// Game played in this slot
    pub game_id: GameId,
    /// Game name from the game catalog
    pub game_name: String,
    /// Slot-specific title, when the organiser renamed the game for this slot
    pub custom_title: Option<String>,
    /// Start of the window
    pub start_time: DateTime<Utc>,
    /// End of the window
    pub end_time: DateTime<Utc>,
    /// Slot-level price; overrides `listed_price` when present and non-zero
    pub price: Option<Money>,
    /// Game-level listed price
    pub listed_price: Money,
    /// Capacity; `0` or less means closed for selection
    pub max_participants: i32,
    /// When the slot was created in the catalog
    pub created_at: DateTime<Utc>,
}

impl Slot {
    /// Price charged for this slot, falling back to the game's listed price.
    #[must_use]
    pub fn effective_price(&self) -> Money {
        match self.price {
            Some(price) if price.is_positive() => price,
            _ => self.listed_price,
        }
    }

    /// `true` when the slot can still be selected.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.max_participants > 0
    }

    /// Title shown to the user: the custom title if set, else the game name.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.custom_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.game_name)
    }
}

/// Percentage discount on an add-on line once a minimum quantity is bought.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleDiscount {
    /// Quantity at which the discount activates
    pub min_quantity: u32,
    /// Discount in percent (10.0 = 10%)
    pub discount_percentage: f64,
}

impl BundleDiscount {
    /// `true` when this discount applies to `quantity`.
    #[must_use]
    pub fn applies_to(&self, quantity: u32) -> bool {
        quantity >= self.min_quantity && self.discount_percentage > 0.0
    }
}

/// A variant of an add-on (size, colour...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddOnVariant {
    /// Variant id
    pub id: VariantId,
    /// Display name
    pub name: String,
    /// Absolute variant price, if the catalog sets one
    pub price: Option<Money>,
    /// Added to the base add-on price when `price` is absent
    pub price_modifier: Money,
    /// Units left
    pub stock_quantity: u32,
}

/// Purchasable extra (t-shirt, photo pack...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
    /// Add-on id
    pub id: AddOnId,
    /// Display name
    pub name: String,
    /// Base price
    pub price: Money,
    /// Variants, possibly empty
    pub variants: Vec<AddOnVariant>,
    /// Optional bundle discount
    pub bundle_discount: Option<BundleDiscount>,
}

impl AddOn {
    /// Looks up a variant.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&AddOnVariant> {
        self.variants.iter().find(|v| v.id == id)
    }
}

/// One add-on in the cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnLine {
    /// Which add-on
    pub add_on_id: AddOnId,
    /// Which variant, if the add-on has variants
    pub variant_id: Option<VariantId>,
    /// Units, always at least 1
    pub quantity: u32,
}

// ============================================================================
// Promo codes
// ============================================================================

/// How a promo code discounts the subtotal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    /// Percent of the pre-discount subtotal
    Percentage(f64),
    /// Flat amount
    Fixed(Money),
}

/// Promo code as delivered by the promo service; `valid_to` is unparsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoCodeRecord {
    /// The code
    pub code: String,
    /// Expiry as sent by the service
    pub valid_to: String,
    /// Admin switch
    pub is_active: bool,
    /// Discount rule
    pub discount: Discount,
    /// Description for display
    pub description: Option<String>,
}

/// A usable promo code with a parsed expiry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    /// The code
    pub code: String,
    /// Last instant the code is valid
    pub valid_to: DateTime<Utc>,
    /// Admin switch
    pub is_active: bool,
    /// Discount rule
    pub discount: Discount,
    /// Description for display
    pub description: Option<String>,
}

/// Authoritative answer of the promo validation service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoValidation {
    /// Whether the code may be used for this cart
    pub is_valid: bool,
    /// Discount in major units as computed by the service
    pub discount_amount: f64,
    /// Reason or confirmation text
    pub message: Option<String>,
}

/// A promo code applied to the cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromo {
    /// The code as validated
    pub code: String,
    /// Discount to subtract before tax
    pub discount: Money,
}

// ============================================================================
// Cart
// ============================================================================

/// Checkout cart, owned by exactly one checkout session.
///
/// Prices are never stored here; they are derived by the pricing engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Parent contact details
    pub parent_info: ParentInfo,
    /// Child details
    pub child_info: ChildInfo,
    /// Chosen city
    pub city_selection: Option<CityId>,
    /// Chosen event
    pub event_selection: Option<EventId>,
    /// At most one slot per game
    pub slot_selections: SlotSelection,
    /// Add-on lines
    pub add_on_selections: Vec<AddOnLine>,
    /// Promo code the user entered
    pub promo_code: Option<String>,
    /// Terms and conditions accepted
    pub terms_accepted: bool,
}

// ============================================================================
// Bookings and payments
// ============================================================================

/// Payment state of a booking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting payment
    #[default]
    Pending,
    /// Paid
    Successful,
    /// Payment failed; booking kept for a new attempt
    Failed,
    /// Money returned
    Refunded,
}

/// A game booked within a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSelection {
    /// Game
    pub game_id: GameId,
    /// Slot, when the link was recorded
    pub slot_id: Option<SlotId>,
    /// Price charged for the game
    pub price: Money,
}

/// Add-on line with its settled amounts, sent with the booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnCharge {
    /// The cart line
    pub line: AddOnLine,
    /// Unit price after bundle discount
    pub unit_price: Money,
    /// Rounded line total
    pub line_total: Money,
}

/// Payload handed to the booking service on submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingPayload {
    /// Booking user
    pub user_id: UserId,
    /// Parent details
    pub parent: ParentInfo,
    /// Child details
    pub child: ChildInfo,
    /// Event
    pub event_id: EventId,
    /// Selected games with their slot and price
    pub game_selections: Vec<GameSelection>,
    /// Add-ons with amounts
    pub add_ons: Vec<AddOnCharge>,
    /// Applied promo code
    pub promo_code: Option<String>,
    /// Totals as estimated by the client
    pub totals: crate::pricing::Totals,
    /// Terms accepted at submission
    pub terms_accepted: bool,
}

/// What the booking service returns once the booking row exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReceipt {
    /// Booking id, needed before any payment
    pub booking_id: BookingId,
    /// Human-stable reference shown to the user
    pub booking_ref: String,
    /// Total settled by the server, immutable from here on
    pub total_amount: Money,
}

/// A booking as stored by the booking service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id
    pub booking_id: BookingId,
    /// Human-stable reference
    pub booking_ref: String,
    /// Settled total
    pub total_amount: Money,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Booked games
    pub game_selections: Vec<GameSelection>,
    /// Title of the booked event
    pub event_title: String,
    /// Date of the booked event
    pub event_date: NaiveDate,
    /// Name of the booked game, used when the slot link is missing
    pub game_name: String,
    /// When the booking was created
    pub created_at: DateTime<Utc>,
}

/// Normalised gateway settlement state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayStatus {
    /// Money captured
    Success,
    /// Not settled yet; must be re-polled
    Pending,
    /// Explicitly failed, or unknown
    Failed,
}

impl GatewayStatus {
    /// `true` for `Success` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl From<GatewayStatus> for PaymentStatus {
    fn from(status: GatewayStatus) -> Self {
        match status {
            GatewayStatus::Success => Self::Successful,
            GatewayStatus::Pending => Self::Pending,
            GatewayStatus::Failed => Self::Failed,
        }
    }
}

/// One payment attempt for a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// Globally unique idempotency key
    pub transaction_id: String,
    /// Booking being paid
    pub booking_id: BookingId,
    /// Amount charged
    pub amount: Money,
    /// Last known gateway state
    pub gateway_state: GatewayStatus,
    /// When the attempt was created
    pub created_at: DateTime<Utc>,
}

/// Payment row written next to the booking once the gateway accepted the attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Booking being paid
    pub booking_id: BookingId,
    /// Gateway transaction id
    pub transaction_id: String,
    /// Amount sent to the gateway
    pub amount: Money,
    /// Status at the time of writing
    pub status: PaymentStatus,
}

/// Identity of the signed-in user driving a checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// User id
    pub user_id: UserId,
    /// Mobile number registered with the account
    pub mobile: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_months() {
        assert_eq!(age_in_months(date(2024, 1, 15), date(2025, 1, 15)), Some(12));
        assert_eq!(age_in_months(date(2024, 1, 15), date(2025, 1, 14)), Some(11));
        assert_eq!(age_in_months(date(2024, 3, 31), date(2024, 4, 30)), Some(0));
        assert_eq!(age_in_months(date(2025, 1, 1), date(2024, 1, 1)), None);
    }

    #[test]
    fn effective_price_falls_back_to_listed_price() {
        let mut slot = Slot {
            slot_id: SlotId::new(1),
            event_id: EventId::new(1),
            game_id: GameId::new(1),
            game_name: "Baby Crawling".to_string(),
            custom_title: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            price: Some(Money::ZERO),
            listed_price: Money::from_major_units(650),
            max_participants: 10,
            created_at: Utc::now(),
        };
        assert_eq!(slot.effective_price(), Money::from_major_units(650));
        slot.price = None;
        assert_eq!(slot.effective_price(), Money::from_major_units(650));
        slot.price = Some(Money::from_major_units(800));
        assert_eq!(slot.effective_price(), Money::from_major_units(800));
    }

    #[test]
    fn bundle_discount_needs_quantity_and_positive_percentage() {
        let bundle = BundleDiscount { min_quantity: 2, discount_percentage: 10.0 };
        assert!(!bundle.applies_to(1));
        assert!(bundle.applies_to(2));
        let zero = BundleDiscount { min_quantity: 1, discount_percentage: 0.0 };
        assert!(!zero.applies_to(5));
    }

    #[test]
    fn discount_serializes_with_type_tag() {
        let json = serde_json::to_value(Discount::Percentage(10.0)).unwrap();
        assert_eq!(json["type"], "percentage");
    }
}
