//! In-memory collaborators.
//!
//! Every mock records what it was asked and can be told to fail, so tests
//! can drive the checkout store and the reconciler without I/O.

use booking_core::environment::{
    BookingService, CatalogService, Clock, NotificationSink, PaymentGateway, PromoService,
    SignedPayload, SnapshotStore,
};
use booking_core::error::{BookingError, Result};
use booking_core::money::{Money, round2};
use booking_core::notification::TicketPayload;
use booking_core::promo::same_code;
use booking_core::snapshot::SessionSnapshot;
use booking_core::types::{
    AddOn, BookingId, BookingPayload, BookingReceipt, City, CityId, Discount, EventId, EventSummary,
    GameId, PaymentRecord, PaymentStatus, PromoCodeRecord, PromoValidation, Slot,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::{self, BoxFuture};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use booking_testing::mocks::FixedClock;
/// use booking_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

// ============================================================================
// Catalog
// ============================================================================

/// Catalog served from vectors.
///
/// Games are filtered by event only; age eligibility is the catalog's job
/// and tests assert on [`InMemoryCatalog::age_requests`] instead.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    cities: Vec<City>,
    events: Vec<EventSummary>,
    slots: Vec<Slot>,
    add_ons: Vec<AddOn>,
    failures: Mutex<VecDeque<BookingError>>,
    outage: Mutex<Option<BookingError>>,
    age_requests: Mutex<Vec<(EventId, u32)>>,
    calls: AtomicUsize,
}

impl InMemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cities.
    #[must_use]
    pub fn with_cities(mut self, cities: Vec<City>) -> Self {
        self.cities = cities;
        self
    }

    /// Sets the events.
    #[must_use]
    pub fn with_events(mut self, events: Vec<EventSummary>) -> Self {
        self.events = events;
        self
    }

    /// Sets the slots of every event.
    #[must_use]
    pub fn with_slots(mut self, slots: Vec<Slot>) -> Self {
        self.slots = slots;
        self
    }

    /// Sets the add-ons.
    #[must_use]
    pub fn with_add_ons(mut self, add_ons: Vec<AddOn>) -> Self {
        self.add_ons = add_ons;
        self
    }

    /// Fails the next `times` calls with `error`.
    pub fn fail_next(&self, error: &BookingError, times: usize) {
        lock(&self.failures).extend(std::iter::repeat_n(error.clone(), times));
    }

    /// Fails every call with `error` until [`InMemoryCatalog::restore`].
    pub fn fail_with(&self, error: BookingError) {
        *lock(&self.outage) = Some(error);
    }

    /// Ends an outage started by [`InMemoryCatalog::fail_with`].
    pub fn restore(&self) {
        *lock(&self.outage) = None;
    }

    /// `(event, age in months)` of every game request, in order.
    #[must_use]
    pub fn age_requests(&self) -> Vec<(EventId, u32)> {
        lock(&self.age_requests).clone()
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer<T: Send + 'static>(&self, value: impl FnOnce() -> T) -> BoxFuture<'_, Result<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.outage).clone() {
            return Box::pin(future::ready(Err(error)));
        }
        if let Some(error) = lock(&self.failures).pop_front() {
            return Box::pin(future::ready(Err(error)));
        }
        Box::pin(future::ready(Ok(value())))
    }

    fn slots_of(&self, event_id: EventId) -> Vec<Slot> {
        self.slots
            .iter()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect()
    }
}

impl CatalogService for InMemoryCatalog {
    fn list_cities(&self) -> BoxFuture<'_, Result<Vec<City>>> {
        self.answer(|| self.cities.clone())
    }

    fn list_events_by_city(&self, city_id: CityId) -> BoxFuture<'_, Result<Vec<EventSummary>>> {
        self.answer(|| {
            self.events
                .iter()
                .filter(|e| e.city_id == city_id)
                .cloned()
                .collect()
        })
    }

    fn list_games_by_event_and_age(
        &self,
        event_id: EventId,
        age_months: u32,
    ) -> BoxFuture<'_, Result<Vec<Slot>>> {
        lock(&self.age_requests).push((event_id, age_months));
        self.answer(|| self.slots_of(event_id))
    }

    fn list_add_ons(&self) -> BoxFuture<'_, Result<Vec<AddOn>>> {
        self.answer(|| self.add_ons.clone())
    }

    fn find_events(&self, title: &str, date: NaiveDate) -> BoxFuture<'_, Result<Vec<EventSummary>>> {
        let title = title.trim().to_lowercase();
        self.answer(move || {
            self.events
                .iter()
                .filter(|e| e.event_date == date && e.title.trim().to_lowercase() == title)
                .cloned()
                .collect()
        })
    }

    fn list_slots_by_event(&self, event_id: EventId) -> BoxFuture<'_, Result<Vec<Slot>>> {
        self.answer(|| self.slots_of(event_id))
    }
}

// ============================================================================
// Promo codes
// ============================================================================

/// Promo service backed by a list of records.
///
/// Validation applies the record's discount rule to the subtotal.
#[derive(Debug, Default)]
pub struct InMemoryPromos {
    records: Vec<PromoCodeRecord>,
    outage: Mutex<Option<BookingError>>,
    validations: Mutex<Vec<String>>,
}

impl InMemoryPromos {
    /// Service offering `records` for every event.
    #[must_use]
    pub fn new(records: Vec<PromoCodeRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Fails every call with `error`.
    pub fn fail_with(&self, error: BookingError) {
        *lock(&self.outage) = Some(error);
    }

    /// Codes validated so far, as received.
    #[must_use]
    pub fn validations(&self) -> Vec<String> {
        lock(&self.validations).clone()
    }

    fn outage(&self) -> Option<BookingError> {
        lock(&self.outage).clone()
    }
}

impl PromoService for InMemoryPromos {
    fn list_applicable_promos(
        &self,
        _event_id: EventId,
        _game_ids: &[GameId],
    ) -> BoxFuture<'_, Result<Vec<PromoCodeRecord>>> {
        let result = self.outage().map_or_else(|| Ok(self.records.clone()), Err);
        Box::pin(future::ready(result))
    }

    fn validate_promo(
        &self,
        code: &str,
        _event_id: EventId,
        _game_ids: &[GameId],
        subtotal: Money,
    ) -> BoxFuture<'_, Result<PromoValidation>> {
        lock(&self.validations).push(code.to_string());
        if let Some(error) = self.outage() {
            return Box::pin(future::ready(Err(error)));
        }
        let validation = match self
            .records
            .iter()
            .find(|r| r.is_active && same_code(&r.code, code))
        {
            Some(record) => PromoValidation {
                is_valid: true,
                discount_amount: match record.discount {
                    Discount::Percentage(percent) => round2(subtotal.as_major() * percent / 100.0),
                    Discount::Fixed(amount) => amount.min(subtotal).as_major(),
                },
                message: None,
            },
            None => PromoValidation {
                is_valid: false,
                discount_amount: 0.0,
                message: Some("Invalid promo code".to_string()),
            },
        };
        Box::pin(future::ready(Ok(validation)))
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking service keeping everything it was sent.
#[derive(Debug)]
pub struct InMemoryBookings {
    next_id: AtomicI64,
    settled_total: Mutex<Option<Money>>,
    rejection: Mutex<Option<BookingError>>,
    bookings: Mutex<Vec<(BookingReceipt, BookingPayload)>>,
    payment_records: Mutex<Vec<PaymentRecord>>,
    status_updates: Mutex<Vec<(BookingId, PaymentStatus)>>,
}

impl Default for InMemoryBookings {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBookings {
    /// Service whose first booking gets id 77.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(77),
            settled_total: Mutex::new(None),
            rejection: Mutex::new(None),
            bookings: Mutex::new(Vec::new()),
            payment_records: Mutex::new(Vec::new()),
            status_updates: Mutex::new(Vec::new()),
        }
    }

    /// Settles every booking at `total` instead of the client total.
    pub fn settle_at(&self, total: Money) {
        *lock(&self.settled_total) = Some(total);
    }

    /// Refuses every booking with `error`.
    pub fn reject_with(&self, error: BookingError) {
        *lock(&self.rejection) = Some(error);
    }

    /// Bookings created so far.
    #[must_use]
    pub fn bookings(&self) -> Vec<(BookingReceipt, BookingPayload)> {
        lock(&self.bookings).clone()
    }

    /// Payment rows written so far.
    #[must_use]
    pub fn payment_records(&self) -> Vec<PaymentRecord> {
        lock(&self.payment_records).clone()
    }

    /// Payment status changes so far.
    #[must_use]
    pub fn status_updates(&self) -> Vec<(BookingId, PaymentStatus)> {
        lock(&self.status_updates).clone()
    }
}

impl BookingService for InMemoryBookings {
    fn create_booking(&self, payload: BookingPayload) -> BoxFuture<'_, Result<BookingReceipt>> {
        if let Some(error) = lock(&self.rejection).clone() {
            return Box::pin(future::ready(Err(error)));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let receipt = BookingReceipt {
            booking_id: BookingId::new(id),
            booking_ref: format!("PG{id:06}"),
            total_amount: lock(&self.settled_total).unwrap_or(payload.totals.total),
        };
        lock(&self.bookings).push((receipt.clone(), payload));
        Box::pin(future::ready(Ok(receipt)))
    }

    fn create_payment_record(&self, record: PaymentRecord) -> BoxFuture<'_, Result<()>> {
        lock(&self.payment_records).push(record);
        Box::pin(future::ready(Ok(())))
    }

    fn update_payment_status(
        &self,
        booking_id: BookingId,
        status: PaymentStatus,
    ) -> BoxFuture<'_, Result<()>> {
        lock(&self.status_updates).push((booking_id, status));
        Box::pin(future::ready(Ok(())))
    }
}

// ============================================================================
// Payment gateway
// ============================================================================

/// Gateway answering from a script.
///
/// Status queries pop the next scripted answer and fall back to
/// `PAYMENT_PENDING` once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedGateway {
    redirect_base: String,
    pay_delay: Option<Duration>,
    pay_failure: Mutex<Option<BookingError>>,
    statuses: Mutex<VecDeque<Result<String>>>,
    fallback_status: Mutex<String>,
    pay_requests: Mutex<Vec<SignedPayload>>,
    status_queries: Mutex<Vec<String>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    /// Gateway redirecting to `https://pay.example/redirect/{transaction}`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            redirect_base: "https://pay.example/redirect".to_string(),
            pay_delay: None,
            pay_failure: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: Mutex::new("PAYMENT_PENDING".to_string()),
            pay_requests: Mutex::new(Vec::new()),
            status_queries: Mutex::new(Vec::new()),
        }
    }

    /// Delays every pay request.
    #[must_use]
    pub const fn with_pay_delay(mut self, delay: Duration) -> Self {
        self.pay_delay = Some(delay);
        self
    }

    /// Fails pay requests with `error`.
    pub fn fail_pay(&self, error: BookingError) {
        *lock(&self.pay_failure) = Some(error);
    }

    /// Lets pay requests succeed again.
    pub fn accept_pay(&self) {
        *lock(&self.pay_failure) = None;
    }

    /// Queues a raw status answer such as `PAYMENT_SUCCESS`.
    pub fn push_status(&self, raw: &str) {
        lock(&self.statuses).push_back(Ok(raw.to_string()));
    }

    /// Queues a failed status query.
    pub fn push_status_error(&self, error: BookingError) {
        lock(&self.statuses).push_back(Err(error));
    }

    /// Answer once the script is exhausted.
    pub fn set_fallback_status(&self, raw: &str) {
        *lock(&self.fallback_status) = raw.to_string();
    }

    /// Pay requests received.
    #[must_use]
    pub fn pay_requests(&self) -> Vec<SignedPayload> {
        lock(&self.pay_requests).clone()
    }

    /// Transactions queried.
    #[must_use]
    pub fn status_queries(&self) -> Vec<String> {
        lock(&self.status_queries).clone()
    }
}

impl PaymentGateway for ScriptedGateway {
    fn initiate_payment(&self, payload: SignedPayload) -> BoxFuture<'_, Result<String>> {
        let result = lock(&self.pay_failure).clone().map_or_else(
            || Ok(format!("{}/{}", self.redirect_base, payload.transaction_id)),
            Err,
        );
        lock(&self.pay_requests).push(payload);
        let delay = self.pay_delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }

    fn query_status(&self, transaction_id: &str) -> BoxFuture<'_, Result<String>> {
        lock(&self.status_queries).push(transaction_id.to_string());
        let answer = lock(&self.statuses)
            .pop_front()
            .unwrap_or_else(|| Ok(lock(&self.fallback_status).clone()));
        Box::pin(future::ready(answer))
    }
}

// ============================================================================
// Snapshots and notifications
// ============================================================================

/// Snapshot store holding serialized snapshots, like a durable key-value store.
#[derive(Debug, Default)]
pub struct InMemorySnapshots {
    entries: Mutex<HashMap<String, String>>,
    outage: Mutex<Option<BookingError>>,
}

impl InMemorySnapshots {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every call with `error`.
    pub fn fail_with(&self, error: BookingError) {
        *lock(&self.outage) = Some(error);
    }

    /// Snapshot of a session without removing it.
    #[must_use]
    pub fn peek(&self, session_id: &str) -> Option<SessionSnapshot> {
        lock(&self.entries)
            .get(session_id)
            .and_then(|raw| SessionSnapshot::from_json(raw).ok())
    }

    /// `true` if the session has a snapshot.
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        lock(&self.entries).contains_key(session_id)
    }

    fn run<T>(&self, op: impl FnOnce(&mut HashMap<String, String>) -> Result<T>) -> Result<T> {
        if let Some(error) = lock(&self.outage).clone() {
            return Err(error);
        }
        op(&mut lock(&self.entries))
    }
}

impl SnapshotStore for InMemorySnapshots {
    fn save(&self, session_id: &str, snapshot: SessionSnapshot) -> BoxFuture<'_, Result<()>> {
        let result = self.run(|entries| {
            entries.insert(session_id.to_string(), snapshot.to_json()?);
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn take(&self, session_id: &str) -> BoxFuture<'_, Result<Option<SessionSnapshot>>> {
        let result = self.run(|entries| {
            entries
                .remove(session_id)
                .map(|raw| SessionSnapshot::from_json(&raw))
                .transpose()
        });
        Box::pin(future::ready(result))
    }

    fn clear(&self, session_id: &str) -> BoxFuture<'_, Result<()>> {
        let result = self.run(|entries| {
            entries.remove(session_id);
            Ok(())
        });
        Box::pin(future::ready(result))
    }
}

/// Notification sink recording tickets.
#[derive(Debug, Default)]
pub struct RecordingNotifications {
    tickets: Mutex<Vec<TicketPayload>>,
    outage: Mutex<Option<BookingError>>,
}

impl RecordingNotifications {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every delivery with `error`.
    pub fn fail_with(&self, error: BookingError) {
        *lock(&self.outage) = Some(error);
    }

    /// Tickets delivered so far.
    #[must_use]
    pub fn tickets(&self) -> Vec<TicketPayload> {
        lock(&self.tickets).clone()
    }
}

impl NotificationSink for RecordingNotifications {
    fn ticket_issued(&self, payload: TicketPayload) -> BoxFuture<'_, Result<()>> {
        let result = match lock(&self.outage).clone() {
            Some(error) => Err(error),
            None => {
                lock(&self.tickets).push(payload);
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }
}
