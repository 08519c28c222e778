//! Checkout state.

use super::Step;
use crate::error::Result;
use crate::pricing::{self, CatalogPrices, PriceBreakdown, PricingContext, Totals};
use crate::types::{
    AddOn, AppliedPromo, BookingId, BookingReceipt, Cart, City, EventSummary, PromoCode, Slot,
    UserContext,
};
use serde::{Deserialize, Serialize};

/// Severity of a user-facing notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Confirmation or hint
    Info,
    /// Something changed under the user
    Warning,
    /// Blocking problem
    Error,
}

/// Message shown to the user. Always actionable, never a raw error string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text
    pub message: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    /// Blocking notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Where the booking/payment saga stands.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PaymentPhase {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Waiting for the booking service
    CreatingBooking,
    /// Booking exists, waiting for the gateway
    Initiating {
        /// Booking being paid
        booking_id: BookingId,
    },
    /// User sent to the gateway
    Redirected {
        /// Booking being paid
        booking_id: BookingId,
        /// Attempt in flight
        transaction_id: String,
    },
    /// Back from the gateway, status being polled
    Verifying {
        /// Booking being paid
        booking_id: BookingId,
        /// Attempt being polled
        transaction_id: String,
    },
    /// Gateway still reports pending after the polling budget
    AwaitingConfirmation {
        /// Booking being paid
        booking_id: BookingId,
        /// Attempt still pending
        transaction_id: String,
    },
    /// Paid
    Paid {
        /// Booking paid
        booking_id: BookingId,
        /// Successful attempt
        transaction_id: String,
    },
    /// Initiation or payment failed; the booking is kept for a retry
    Failed {
        /// Booking kept for the retry, if it was created
        booking_id: Option<BookingId>,
    },
}

impl PaymentPhase {
    /// `true` while a collaborator call of the saga is outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::CreatingBooking
                | Self::Initiating { .. }
                | Self::Redirected { .. }
                | Self::Verifying { .. }
        )
    }
}

/// State of one checkout session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutState {
    /// Session key the snapshot store is scoped to
    pub session_id: String,
    /// Current step
    pub step: Step,
    /// The cart
    pub cart: Cart,
    /// Cities, as last fetched
    pub cities: Vec<City>,
    /// Events of the selected city
    pub events: Vec<EventSummary>,
    /// Slots of the selected event for the child's age
    pub slots: Vec<Slot>,
    /// Add-on catalog
    pub add_ons: Vec<AddOn>,
    /// Usable promo codes for the current selection
    pub promos: Vec<PromoCode>,
    /// Code sent for validation and not answered yet
    pub pending_promo: Option<String>,
    /// Promo applied to the cart
    pub applied_promo: Option<AppliedPromo>,
    /// Signed-in user, set on submission
    pub user: Option<UserContext>,
    /// Booking created for this checkout
    pub booking: Option<BookingReceipt>,
    /// Saga progress
    pub payment: PaymentPhase,
    /// Last message for the user
    pub notice: Option<Notice>,
    /// Step requested by a resume, until the snapshot answer arrives
    pub resume_step: Option<Step>,
    /// A snapshot has been restored into this session
    pub restored: bool,
}

impl CheckoutState {
    /// Fresh session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// The selected event, if it is in the loaded event list.
    #[must_use]
    pub fn selected_event(&self) -> Option<&EventSummary> {
        let event_id = self.cart.event_selection?;
        self.events.iter().find(|e| e.id == event_id)
    }

    /// Catalog view used for pricing.
    #[must_use]
    pub fn catalog_prices(&self) -> CatalogPrices<'_> {
        CatalogPrices {
            slots: &self.slots,
            add_ons: &self.add_ons,
        }
    }

    /// Per-line amounts of the cart.
    ///
    /// # Errors
    ///
    /// Propagates pricing validation errors.
    pub fn breakdown(&self) -> Result<PriceBreakdown> {
        pricing::price_breakdown(&self.cart, self.catalog_prices())
    }

    /// Current totals including the applied promo.
    ///
    /// # Errors
    ///
    /// Propagates pricing validation errors.
    pub fn totals(&self, context: PricingContext) -> Result<Totals> {
        pricing::compute_totals(
            &self.cart,
            self.catalog_prices(),
            self.applied_promo.as_ref(),
            context,
        )
    }

    /// Discount currently applied to the cart.
    #[must_use]
    pub fn discount(&self) -> crate::money::Money {
        self.applied_promo
            .as_ref()
            .map_or(crate::money::Money::ZERO, |p| p.discount)
    }

    /// Listed promo codes with the discount each would give on the current
    /// subtotal. The service has the final word once a code is applied.
    ///
    /// # Errors
    ///
    /// Propagates pricing validation errors.
    pub fn promo_offers(&self) -> Result<Vec<PromoOffer<'_>>> {
        let subtotal = self.totals(PricingContext::default())?.subtotal;
        Ok(self
            .promos
            .iter()
            .map(|promo| PromoOffer {
                promo,
                estimated_discount: promo.estimate_discount(subtotal),
            })
            .collect())
    }
}

/// A listed promo code and its estimated discount.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PromoOffer<'a> {
    /// The listed code
    pub promo: &'a PromoCode,
    /// Local estimate, at most the subtotal
    pub estimated_discount: crate::money::Money,
}
