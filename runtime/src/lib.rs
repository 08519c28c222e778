//! # Booking Runtime
//!
//! Imperative shell around [`booking_core`].
//!
//! ## Core Components
//!
//! - **`CheckoutStore`**: runs the checkout reducer and executes its effects
//! - **`PaymentAdapter`**: signs gateway requests, tracks attempts, polls statuses
//! - **`BookingReconciler`**: resolves legacy bookings against the live catalog
//! - **`Config`**: environment-driven configuration
//!
//! ## Example
//!
//! ```ignore
//! use booking_runtime::{CheckoutStore, Config, Services};
//! use booking_core::{CheckoutAction, CheckoutEnvironment, CheckoutState};
//!
//! let config = Config::from_env()?;
//! let services = Services::from_config(&config, collaborators);
//! let store = CheckoutStore::new(
//!     CheckoutState::new("session-1"),
//!     CheckoutEnvironment::new(clock, config.checkout.pricing()),
//!     services,
//! );
//!
//! let outbound = store.send(CheckoutAction::Start).await?;
//! let step = store.state(|s| s.step).await;
//! ```

use booking_core::error::{BookingError, Result};
use std::future::Future;
use std::time::Duration;

/// Environment-driven configuration
pub mod config;

/// Payment gateway adapter and HTTP transport
pub mod gateway;

/// Promo service calls with timeouts
pub mod promo;

/// Catalog-backed booking reconciliation
pub mod reconcile;

/// Retry logic with exponential backoff
pub mod retry;

/// Checkout effect execution
pub mod store;

/// Error types for the checkout runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while driving a checkout store.
    ///
    /// Collaborator failures are not store errors: they are fed back to the
    /// reducer as actions.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Effects kept producing actions past the per-send bound
        #[error("Feedback loop exceeded {limit} actions")]
        FeedbackLimit {
            /// Bound that was hit
            limit: usize,
        },
    }
}

pub use config::{Config, ConfigError, GatewayConfig};
pub use error::StoreError;
pub use gateway::{CallbackNotice, Initiation, PaymentAdapter, http::HttpPaymentGateway};
pub use promo::PromoClient;
pub use reconcile::{BookingReconciler, SweepReport};
pub use retry::RetryPolicy;
pub use store::{CheckoutStore, Collaborators, Outbound, Services};

/// Awaits a collaborator call, failing with `on_timeout` after `limit`.
pub(crate) async fn timed<T>(
    limit: Duration,
    future: impl Future<Output = Result<T>>,
    on_timeout: BookingError,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or_else(|_| Err(on_timeout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timed_returns_the_timeout_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(1)
        };
        let result = timed(Duration::from_secs(15), slow, BookingError::GatewayTimeout { seconds: 15 }).await;
        assert_eq!(result, Err(BookingError::GatewayTimeout { seconds: 15 }));
    }

    #[tokio::test]
    async fn timed_passes_through_results() {
        let result = timed(Duration::from_secs(1), async { Ok(7) }, BookingError::GatewayTimeout { seconds: 1 }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
