//! Promo service calls.
//!
//! Wraps [`PromoService`] with the call timeout and the expiry filter. Promo
//! failures never block a checkout: listing failures yield no codes and
//! validation failures yield a rejected validation.

use crate::timed;
use booking_core::environment::{Clock, PromoService};
use booking_core::error::{BookingError, Result};
use booking_core::money::Money;
use booking_core::promo;
use booking_core::types::{EventId, GameId, PromoCode, PromoValidation};
use std::sync::Arc;
use std::time::Duration;

/// Promo collaborator with timeouts.
#[derive(Clone)]
pub struct PromoClient {
    service: Arc<dyn PromoService>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl std::fmt::Debug for PromoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromoClient")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl PromoClient {
    /// Creates a client.
    #[must_use]
    pub fn new(service: Arc<dyn PromoService>, clock: Arc<dyn Clock>, call_timeout: Duration) -> Self {
        Self {
            service,
            clock,
            call_timeout,
        }
    }

    fn timeout_error(&self) -> BookingError {
        BookingError::CatalogUnavailable(format!(
            "promo service timed out after {}s",
            self.call_timeout.as_secs()
        ))
    }

    /// Active, unexpired codes for an event and game set.
    ///
    /// # Errors
    ///
    /// Returns the service error or a timeout as `CatalogUnavailable`.
    pub async fn usable_promos(&self, event_id: EventId, game_ids: &[GameId]) -> Result<Vec<PromoCode>> {
        let records = timed(
            self.call_timeout,
            self.service.list_applicable_promos(event_id, game_ids),
            self.timeout_error(),
        )
        .await?;
        Ok(promo::filter_usable(records, self.clock.now()))
    }

    /// Asks the service for the discount of a code.
    ///
    /// Never fails: an unavailable service yields a rejected validation so the
    /// checkout continues without the code.
    pub async fn validate(
        &self,
        code: &str,
        event_id: EventId,
        game_ids: &[GameId],
        subtotal: Money,
    ) -> PromoValidation {
        let result = timed(
            self.call_timeout,
            self.service.validate_promo(code, event_id, game_ids, subtotal),
            self.timeout_error(),
        )
        .await;
        match result {
            Ok(validation) => validation,
            Err(error) => {
                tracing::warn!(code, event_id = %event_id, error = %error, "Promo validation unavailable");
                PromoValidation {
                    is_valid: false,
                    discount_amount: 0.0,
                    message: Some("We couldn't check this code right now. Please try again".to_string()),
                }
            }
        }
    }
}
