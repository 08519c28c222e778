//! Collaborator traits injected into the checkout flow.
//!
//! The core never performs I/O itself. Every external system it talks to is
//! described here as a trait; the runtime crate executes effects against
//! these traits and the testing crate provides in-memory implementations.
//!
//! Async methods return [`BoxFuture`] so environments can hold the
//! collaborators as `Arc<dyn Trait>`.

use crate::error::Result;
use crate::notification::TicketPayload;
use crate::snapshot::SessionSnapshot;
use crate::types::{
    AddOn, BookingId, BookingPayload, BookingReceipt, City, CityId, EventId, EventSummary, GameId,
    PaymentRecord, PaymentStatus, PromoCodeRecord, PromoValidation, Slot,
};
use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Clock trait - abstracts time for testability.
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Read-only catalog of cities, events, games and add-ons.
pub trait CatalogService: Send + Sync {
    /// All cities with events
    fn list_cities(&self) -> BoxFuture<'_, Result<Vec<City>>>;

    /// Upcoming events in a city
    fn list_events_by_city(&self, city_id: CityId) -> BoxFuture<'_, Result<Vec<EventSummary>>>;

    /// Slots of an event's games that accept a child of the given age
    fn list_games_by_event_and_age(
        &self,
        event_id: EventId,
        age_months: u32,
    ) -> BoxFuture<'_, Result<Vec<Slot>>>;

    /// Purchasable add-ons
    fn list_add_ons(&self) -> BoxFuture<'_, Result<Vec<AddOn>>>;

    /// Events matching a title on a date. Used by reconciliation.
    fn find_events(&self, title: &str, date: NaiveDate)
    -> BoxFuture<'_, Result<Vec<EventSummary>>>;

    /// Every slot of an event, regardless of age or capacity. Used by reconciliation.
    fn list_slots_by_event(&self, event_id: EventId) -> BoxFuture<'_, Result<Vec<Slot>>>;
}

/// Promo code listing and authoritative validation.
pub trait PromoService: Send + Sync {
    /// Raw promo records offered for an event and game set
    fn list_applicable_promos(
        &self,
        event_id: EventId,
        game_ids: &[GameId],
    ) -> BoxFuture<'_, Result<Vec<PromoCodeRecord>>>;

    /// Computes the discount a code gives on `subtotal`
    fn validate_promo(
        &self,
        code: &str,
        event_id: EventId,
        game_ids: &[GameId],
        subtotal: Money,
    ) -> BoxFuture<'_, Result<PromoValidation>>;
}

/// Booking persistence.
pub trait BookingService: Send + Sync {
    /// Persists a booking. Fails with `BookingRejected` when a slot filled up.
    fn create_booking(&self, payload: BookingPayload) -> BoxFuture<'_, Result<BookingReceipt>>;

    /// Writes the payment row for an initiated attempt
    fn create_payment_record(&self, record: PaymentRecord) -> BoxFuture<'_, Result<()>>;

    /// Moves a booking's payment status
    fn update_payment_status(
        &self,
        booking_id: BookingId,
        status: PaymentStatus,
    ) -> BoxFuture<'_, Result<()>>;
}

/// A request ready to be sent to the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    /// Gateway endpoint path the token was computed for
    pub endpoint: String,
    /// Base64 of the canonical JSON request
    pub request: String,
    /// Integrity token, sent as `X-VERIFY`
    pub checksum: String,
    /// Transaction id inside the request
    pub transaction_id: String,
}

/// Raw payment gateway. Knows nothing about bookings.
pub trait PaymentGateway: Send + Sync {
    /// Submits a signed pay request and returns the redirect URL
    fn initiate_payment(&self, payload: SignedPayload) -> BoxFuture<'_, Result<String>>;

    /// Raw gateway state for a transaction (e.g. `PAYMENT_SUCCESS`)
    fn query_status(&self, transaction_id: &str) -> BoxFuture<'_, Result<String>>;
}

/// Durable per-session storage holding at most one snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Overwrites the session's snapshot
    fn save(&self, session_id: &str, snapshot: SessionSnapshot) -> BoxFuture<'_, Result<()>>;

    /// Removes and returns the session's snapshot
    fn take(&self, session_id: &str) -> BoxFuture<'_, Result<Option<SessionSnapshot>>>;

    /// Removes the session's snapshot, if any
    fn clear(&self, session_id: &str) -> BoxFuture<'_, Result<()>>;
}

/// Ticket and receipt delivery. Fire-and-forget from the checkout's view.
pub trait NotificationSink: Send + Sync {
    /// Hands over the data for a ticket email or message
    fn ticket_issued(&self, payload: TicketPayload) -> BoxFuture<'_, Result<()>>;
}
