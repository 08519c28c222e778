//! Error taxonomy for checkout, payment and reconciliation.

use crate::types::{BookingId, SlotId};
use thiserror::Error;

/// Result type alias for booking operations.
pub type Result<T> = std::result::Result<T, BookingError>;

/// Every failure mode of the booking core.
///
/// Variants carry internal detail for logs. What a user sees comes from
/// [`BookingError::user_message`], never from `Display`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BookingError {
    // ═══════════════════════════════════════════════════════════
    // Local validation (blocks step advance, no retry)
    // ═══════════════════════════════════════════════════════════

    /// A required field is missing or malformed.
    #[error("Validation failed on {field}: {reason}")]
    Validation {
        /// Field (or cart section) that failed
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Slot has no capacity left and cannot be selected.
    #[error("Slot {slot_id} is closed for selection")]
    SlotClosed {
        /// The rejected slot
        slot_id: SlotId,
    },

    // ═══════════════════════════════════════════════════════════
    // Collaborator failures
    // ═══════════════════════════════════════════════════════════

    /// Catalog lookup timed out or returned a server error.
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Promo code explicitly rejected. Not fatal to checkout.
    #[error("Promo code {code} rejected: {reason}")]
    PromoInvalid {
        /// Code the user entered
        code: String,
        /// Reason given by the validator
        reason: String,
    },

    /// Booking persistence refused the booking (e.g. last slot taken).
    #[error("Booking rejected: {0}")]
    BookingRejected(String),

    // ═══════════════════════════════════════════════════════════
    // Payment gateway
    // ═══════════════════════════════════════════════════════════

    /// Gateway configuration missing or malformed. No network call is made.
    #[error("Gateway configuration error: {0}")]
    GatewayConfig(String),

    /// Gateway call exceeded its timeout.
    #[error("Gateway timed out after {seconds}s")]
    GatewayTimeout {
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Gateway returned an error or an unreadable response.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A generated transaction id exceeds the gateway's length ceiling.
    #[error("Transaction id is {len} chars, gateway accepts at most {max}")]
    TransactionIdTooLong {
        /// Generated length
        len: usize,
        /// Gateway ceiling
        max: usize,
    },

    /// Another payment attempt for this booking is still in flight.
    #[error("Payment attempt {transaction_id} already in flight for booking {booking_id}")]
    AttemptInFlight {
        /// Booking being paid
        booking_id: BookingId,
        /// The attempt that is still pending
        transaction_id: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Session and reconciliation
    // ═══════════════════════════════════════════════════════════

    /// Session snapshot could not be written, read or decoded.
    #[error("Session snapshot error: {0}")]
    Snapshot(String),

    /// Reconciliation had to fall back to a guess. Informational only.
    #[error("Reconciliation ambiguous for booking {booking_ref}: {candidates} candidates")]
    ReconciliationAmbiguous {
        /// Booking that was reconciled
        booking_ref: String,
        /// Number of candidates left before the fallback
        candidates: usize,
    },
}

impl BookingError {
    /// Shorthand for a [`BookingError::Validation`].
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying the same operation may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use booking_core::BookingError;
    /// assert!(BookingError::GatewayTimeout { seconds: 15 }.is_retryable());
    /// assert!(!BookingError::GatewayConfig("missing merchant id".into()).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CatalogUnavailable(_) | Self::GatewayTimeout { .. } | Self::Gateway(_)
        )
    }

    /// Returns `true` if the user can fix this by changing their input.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::SlotClosed { .. } | Self::PromoInvalid { .. }
        )
    }

    /// Actionable message for the user: what failed and what to do next.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { reason, .. } => format!("{reason}. Please correct it and continue."),
            Self::SlotClosed { .. } => {
                "This time slot is full. Please pick another slot.".to_string()
            }
            Self::CatalogUnavailable(_) => {
                "We couldn't load the latest event details. Please try again.".to_string()
            }
            Self::PromoInvalid { reason, .. } => {
                format!("Promo code not applied: {reason}. You can continue without it.")
            }
            Self::BookingRejected(_) => {
                "We couldn't confirm your booking, the selected slot may have just filled up. \
                 Please review your selection and try again."
                    .to_string()
            }
            Self::GatewayConfig(_) => {
                "Online payment is temporarily unavailable. Please try again later.".to_string()
            }
            Self::GatewayTimeout { .. } | Self::Gateway(_) => {
                "The payment could not be started. Your booking is saved, please retry the payment."
                    .to_string()
            }
            Self::TransactionIdTooLong { .. } => {
                "The payment could not be started. Please contact support.".to_string()
            }
            Self::AttemptInFlight { .. } => {
                "A payment for this booking is already in progress. Please wait for it to finish."
                    .to_string()
            }
            Self::Snapshot(_) => {
                "We couldn't restore your saved progress. Please start your booking again."
                    .to_string()
            }
            Self::ReconciliationAmbiguous { .. } => {
                "Your booking is confirmed. Our team will verify the slot details.".to_string()
            }
        }
    }
}
