//! Reconciliation sweeps against the in-memory catalog.

#![allow(clippy::unwrap_used)]

use booking_core::error::BookingError;
use booking_core::money::Money;
use booking_core::reconciliation::{MatchMethod, ReconciliationConfig};
use booking_core::types::{Booking, BookingId, GameId, GameSelection, PaymentStatus, SlotId};
use booking_runtime::{BookingReconciler, RetryPolicy};
use booking_testing::fixtures;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

fn booking(id: i64, game_name: &str, total: i64) -> Booking {
    Booking {
        booking_id: BookingId::new(id),
        booking_ref: format!("PG{id:06}"),
        total_amount: Money::from_major_units(total),
        payment_status: PaymentStatus::Successful,
        game_selections: vec![GameSelection {
            game_id: GameId::new(1),
            slot_id: None,
            price: Money::from_major_units(total),
        }],
        event_title: "baby olympics ".to_string(),
        event_date: fixtures::event_date(),
        game_name: game_name.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap(),
    }
}

fn reconciler(catalog: Arc<booking_testing::InMemoryCatalog>) -> BookingReconciler {
    BookingReconciler::new(catalog, ReconciliationConfig::default(), Duration::from_secs(5)).with_retry_policy(
        RetryPolicy::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5)),
    )
}

#[tokio::test]
async fn price_picks_the_slot_of_the_booked_game() {
    let reconciler = reconciler(Arc::new(fixtures::catalog()));

    let resolution = reconciler.reconcile(&booking(1, "Running Race", 800)).await;

    assert_eq!(resolution.slot_id, Some(SlotId::new(100)));
    assert_eq!(resolution.method, MatchMethod::Price);
    assert_eq!(resolution.candidates_considered, 2);
    assert!(!resolution.ambiguous);
}

#[tokio::test]
async fn unmatched_heuristics_fall_back_and_flag_the_booking() {
    let reconciler = reconciler(Arc::new(fixtures::catalog()));

    let resolution = reconciler.reconcile(&booking(2, "Running Race", 950)).await;

    assert_eq!(resolution.slot_id, Some(SlotId::new(101)));
    assert_eq!(resolution.method, MatchMethod::Fallback);
    assert!(resolution.ambiguous);
}

#[tokio::test]
async fn linked_booking_needs_no_catalog() {
    let catalog = Arc::new(fixtures::catalog());
    let reconciler = reconciler(catalog.clone());
    let mut linked = booking(3, "Running Race", 800);
    linked.game_selections[0].slot_id = Some(SlotId::new(101));

    let resolution = reconciler.reconcile(&linked).await;

    assert_eq!(resolution.method, MatchMethod::Direct);
    assert_eq!(resolution.slot_id, Some(SlotId::new(101)));
    assert_eq!(catalog.calls(), 0);
}

#[tokio::test]
async fn transient_catalog_errors_are_retried() {
    let catalog = Arc::new(fixtures::catalog());
    catalog.fail_next(&BookingError::CatalogUnavailable("503".to_string()), 2);
    let reconciler = reconciler(catalog.clone());

    let resolution = reconciler.reconcile(&booking(4, "Baby Crawling", 500)).await;

    assert_eq!(resolution.slot_id, Some(SlotId::new(200)));
    assert_eq!(resolution.method, MatchMethod::EventGame);
    assert_eq!(catalog.calls(), 4);
}

#[tokio::test]
async fn catalog_outage_leaves_the_booking_unresolved_for_audit() {
    let catalog = Arc::new(fixtures::catalog());
    catalog.fail_with(BookingError::CatalogUnavailable("maintenance".to_string()));
    let reconciler = reconciler(catalog.clone());

    let resolution = reconciler.reconcile(&booking(7, "Running Race", 800)).await;

    assert_eq!(resolution.slot_id, None);
    assert_eq!(resolution.method, MatchMethod::Unresolved);
    assert!(resolution.ambiguous);
    assert_eq!(catalog.calls(), 3);
}

#[tokio::test]
async fn sweep_reports_failures_and_ambiguities_separately() {
    let catalog = Arc::new(fixtures::catalog());
    let reconciler = reconciler(catalog.clone());
    let bookings = [booking(5, "Running Race", 800), booking(6, "Running Race", 950)];

    let report = reconciler.reconcile_pending(&bookings).await;
    assert_eq!(report.resolved.len(), 2);
    assert!(report.failed.is_empty());
    let ambiguous: Vec<_> = report.ambiguous().map(|(id, _)| *id).collect();
    assert_eq!(ambiguous, vec![BookingId::new(6)]);

    catalog.fail_with(BookingError::CatalogUnavailable("maintenance".to_string()));
    let report = reconciler.reconcile_pending(&bookings).await;
    assert!(report.resolved.is_empty());
    assert_eq!(report.failed.len(), 2);
}
