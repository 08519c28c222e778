//! Catalog-backed booking reconciliation.
//!
//! Loads the events and slots a booking could belong to and runs the pure
//! resolver from [`booking_core::reconciliation`].

use crate::retry::{RetryPolicy, retry_if};
use crate::timed;
use booking_core::environment::CatalogService;
use booking_core::error::{BookingError, Result};
use booking_core::reconciliation::{self, BookingFacts, MatchMethod, ReconciliationConfig, Resolution};
use booking_core::types::{Booking, BookingId, EventSummary, Slot};
use std::sync::Arc;
use std::time::Duration;

/// Result of a reconciliation sweep.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepReport {
    /// Bookings resolved, ambiguous ones included
    pub resolved: Vec<(BookingId, Resolution)>,
    /// Bookings whose catalog data could not be loaded; retry them later
    pub failed: Vec<(BookingId, BookingError)>,
}

impl SweepReport {
    /// Resolutions that need a manual audit.
    pub fn ambiguous(&self) -> impl Iterator<Item = &(BookingId, Resolution)> {
        self.resolved.iter().filter(|(_, r)| r.ambiguous)
    }
}

/// Resolves bookings to slots using the live catalog.
pub struct BookingReconciler {
    catalog: Arc<dyn CatalogService>,
    config: ReconciliationConfig,
    call_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for BookingReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingReconciler")
            .field("config", &self.config)
            .field("call_timeout", &self.call_timeout)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl BookingReconciler {
    /// Creates a reconciler. Catalog loads are retried three times by default.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogService>, config: ReconciliationConfig, call_timeout: Duration) -> Self {
        Self {
            catalog,
            config,
            call_timeout,
            retry_policy: RetryPolicy::new()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(200))
                .with_max_delay(Duration::from_secs(2)),
        }
    }

    /// Replaces the retry policy of catalog loads.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn timeout_error(&self) -> BookingError {
        BookingError::CatalogUnavailable(format!(
            "catalog timed out after {}s",
            self.call_timeout.as_secs()
        ))
    }

    async fn load_events(&self, facts: &BookingFacts) -> Result<Vec<EventSummary>> {
        let catalog = &self.catalog;
        let limit = self.call_timeout;
        retry_if(
            &self.retry_policy,
            "find_events",
            move || {
                timed(
                    limit,
                    catalog.find_events(&facts.event_title, facts.event_date),
                    self.timeout_error(),
                )
            },
            BookingError::is_retryable,
        )
        .await
    }

    async fn load_slots(&self, events: &[EventSummary]) -> Result<Vec<Slot>> {
        let mut slots = Vec::new();
        for event in events {
            let catalog = &self.catalog;
            let limit = self.call_timeout;
            let event_id = event.id;
            let loaded = retry_if(
                &self.retry_policy,
                "list_slots_by_event",
                move || timed(limit, catalog.list_slots_by_event(event_id), self.timeout_error()),
                BookingError::is_retryable,
            )
            .await?;
            slots.extend(loaded);
        }
        Ok(slots)
    }

    /// Resolves one booking to a slot. Never fails.
    ///
    /// A booking that already names its slot is resolved without catalog
    /// calls. When the catalog stays unreachable after retries the booking
    /// comes back `Unresolved` and flagged for audit.
    #[tracing::instrument(skip_all, fields(booking_ref = %booking.booking_ref))]
    pub async fn reconcile(&self, booking: &Booking) -> Resolution {
        self.try_reconcile(booking).await.unwrap_or_else(|error| {
            tracing::warn!(
                booking_id = %booking.booking_id,
                error = %error,
                "Catalog unavailable, leaving booking unresolved"
            );
            unreachable_catalog()
        })
    }

    async fn try_reconcile(&self, booking: &Booking) -> Result<Resolution> {
        let facts = BookingFacts::from(booking);
        if facts.slot_id.is_some() {
            return Ok(reconciliation::resolve(&facts, &[], &[], &self.config));
        }

        let events = self.load_events(&facts).await?;
        let slots = self.load_slots(&events).await?;
        let resolution = reconciliation::resolve(&facts, &events, &slots, &self.config);
        tracing::debug!(
            slot_id = ?resolution.slot_id,
            method = %resolution.method,
            candidates = resolution.candidates_considered,
            "Booking reconciled"
        );
        Ok(resolution)
    }

    /// Resolves a batch of bookings, one at a time.
    pub async fn reconcile_pending(&self, bookings: &[Booking]) -> SweepReport {
        let mut report = SweepReport::default();
        for booking in bookings {
            match self.try_reconcile(booking).await {
                Ok(resolution) => report.resolved.push((booking.booking_id, resolution)),
                Err(error) => {
                    tracing::warn!(
                        booking_id = %booking.booking_id,
                        error = %error,
                        "Could not reconcile booking"
                    );
                    report.failed.push((booking.booking_id, error));
                }
            }
        }
        tracing::info!(
            resolved = report.resolved.len(),
            ambiguous = report.ambiguous().count(),
            failed = report.failed.len(),
            "Reconciliation sweep finished"
        );
        report
    }
}

fn unreachable_catalog() -> Resolution {
    metrics::counter!("reconciliation.method", "method" => MatchMethod::Unresolved.as_str()).increment(1);
    Resolution {
        slot_id: None,
        method: MatchMethod::Unresolved,
        ambiguous: true,
        candidates_considered: 0,
    }
}
