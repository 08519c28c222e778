//! Multi-step checkout session.
//!
//! `Details(1) → AddOns(2) → Payment(3)`, with an authentication interrupt
//! possible at every step-advance boundary. The session is a reducer over
//! [`CheckoutState`]: commands from the UI and results from collaborators
//! both arrive as [`CheckoutAction`]s, and every side effect leaves the
//! reducer as a [`CheckoutEffect`] for the runtime to execute.

mod actions;
mod reducer;
mod state;
mod validation;

#[cfg(test)]
mod tests;

pub use actions::{CheckoutAction, CheckoutEffect};
pub use reducer::{CheckoutEnvironment, CheckoutReducer};
pub use state::{CheckoutState, Notice, NoticeLevel, PaymentPhase, PromoOffer};
pub use validation::{validate_add_ons, validate_details, validate_submission};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Checkout step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Parent, child, city, event and slot selection
    #[default]
    Details,
    /// Optional add-ons
    AddOns,
    /// Review, promo code, terms and payment
    Payment,
}

impl Step {
    /// Step number as shown to the user and carried in return URLs.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Details => 1,
            Self::AddOns => 2,
            Self::Payment => 3,
        }
    }

    /// Parses a step number; anything outside `1..=3` is `None`.
    #[must_use]
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::Details),
            2 => Some(Self::AddOns),
            3 => Some(Self::Payment),
            _ => None,
        }
    }

    /// Following step, `None` from `Payment`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Details => Some(Self::AddOns),
            Self::AddOns => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    /// Preceding step, `None` from `Details`.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Details => None,
            Self::AddOns => Some(Self::Details),
            Self::Payment => Some(Self::AddOns),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}
