//! # Booking Core
//!
//! Pure domain logic of the event booking checkout: cart pricing, promo
//! handling, the multi-step checkout session and booking-to-slot
//! reconciliation.
//!
//! Nothing in this crate performs I/O. The checkout session is a
//! [`Reducer`]: it takes the current state and an action, mutates the state
//! and returns effect descriptions. The runtime crate executes those effects
//! against the collaborator traits in [`environment`] and feeds the results
//! back as actions.
//!
//! ## Modules
//!
//! - [`money`]: integer minor-unit amounts and half-up rounding
//! - [`pricing`]: cart totals (games, add-ons, bundle discount, promo, tax)
//! - [`slots`]: one-slot-per-game selection set
//! - [`promo`]: promo code expiry filtering and validation decisions
//! - [`checkout`]: the session reducer with its steps and payment saga
//! - [`snapshot`]: versioned session snapshot used across the login redirect
//! - [`reconciliation`]: booking-to-slot resolution for legacy bookings
//! - [`notification`]: ticket payload assembled after a successful payment
//!
//! ## Example
//!
//! ```
//! use booking_core::{Money, round2};
//!
//! assert_eq!(Money::from_minor(136_880).to_string(), "1368.80");
//! assert!((round2(208.799_999) - 208.8).abs() < f64::EPSILON);
//! ```

pub mod checkout;
pub mod environment;
pub mod error;
pub mod money;
pub mod notification;
pub mod pricing;
pub mod promo;
pub mod reconciliation;
pub mod reducer;
pub mod slots;
pub mod snapshot;
pub mod types;

pub use chrono::{DateTime, NaiveDate, Utc};
pub use smallvec::{SmallVec, smallvec};

pub use checkout::{CheckoutAction, CheckoutEffect, CheckoutEnvironment, CheckoutReducer, CheckoutState, Step};
pub use environment::{
    BookingService, CatalogService, Clock, NotificationSink, PaymentGateway, PromoService,
    SignedPayload, SnapshotStore, SystemClock,
};
pub use error::{BookingError, Result};
pub use money::{Money, round2};
pub use pricing::{PricingContext, Totals};
pub use reducer::{Effects, Reducer};
pub use snapshot::SessionSnapshot;
