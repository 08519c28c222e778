//! End-to-end checkout sessions driven through the store.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use booking_core::checkout::{CheckoutAction, NoticeLevel, PaymentPhase, Step};
use booking_core::error::BookingError;
use booking_core::money::Money;
use booking_core::types::{AddOnId, AddOnLine, BookingId, CityId, EventId, GatewayStatus, PaymentStatus, SlotId};
use booking_runtime::{CheckoutStore, Outbound, StoreError};
use booking_testing::fixtures;
use common::Harness;

async fn send(store: &CheckoutStore, action: CheckoutAction) -> Vec<Outbound> {
    store.send(action).await.unwrap()
}

/// Fills step 1 through the store: details, city, event and slot 100.
async fn complete_details(store: &CheckoutStore) {
    send(store, CheckoutAction::Start).await;
    send(store, CheckoutAction::SetParentInfo(fixtures::parent())).await;
    send(store, CheckoutAction::SetChildInfo(fixtures::child())).await;
    send(store, CheckoutAction::SelectCity { city_id: CityId::new(1) }).await;
    send(store, CheckoutAction::SelectEvent { event_id: EventId::new(10) }).await;
    send(store, CheckoutAction::ToggleSlot { slot_id: SlotId::new(100) }).await;
}

async fn choose_two_tshirts(store: &CheckoutStore) {
    send(
        store,
        CheckoutAction::SetAddOn(AddOnLine {
            add_on_id: AddOnId::new(5),
            variant_id: None,
            quantity: 2,
        }),
    )
    .await;
}

/// Drives a signed-in session up to the gateway redirect.
async fn pay(harness: &Harness, store: &CheckoutStore) -> Vec<Outbound> {
    complete_details(store).await;
    send(store, CheckoutAction::AdvanceStep { authenticated: true }).await;
    choose_two_tshirts(store).await;
    send(store, CheckoutAction::AdvanceStep { authenticated: true }).await;
    send(store, CheckoutAction::AcceptTerms { accepted: true }).await;
    assert!(harness.snapshots.contains("s-1"));
    send(store, CheckoutAction::Submit { user: fixtures::user() }).await
}

fn redirect_url(outbound: &[Outbound]) -> String {
    match outbound {
        [Outbound::Navigate { url }] => url.clone(),
        other => panic!("expected one navigation, got {other:?}"),
    }
}

#[tokio::test]
async fn catalog_is_loaded_for_the_child_age() {
    let harness = Harness::new();
    let store = harness.store("s-1");

    complete_details(&store).await;

    assert_eq!(harness.catalog.age_requests(), vec![(EventId::new(10), 32)]);
    let (slots, selected, promos) = store
        .state(|s| (s.slots.len(), s.cart.slot_selections.len(), s.promos.clone()))
        .await;
    assert_eq!(slots, 3);
    assert_eq!(selected, 1);
    let codes: Vec<_> = promos.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, ["ADMIN10", "FLAT50"]);
}

#[tokio::test]
async fn full_checkout_books_before_paying_and_issues_a_ticket() {
    let harness = Harness::new();
    let store = harness.store("s-1");

    let outbound = pay(&harness, &store).await;

    let bookings = harness.bookings.bookings();
    assert_eq!(bookings.len(), 1);
    let (receipt, payload) = &bookings[0];
    assert_eq!(payload.totals.total, Money::from_minor(136_880));
    assert_eq!(payload.totals.tax, Money::from_minor(20_880));
    assert_eq!(receipt.booking_id, BookingId::new(77));

    let url = redirect_url(&outbound);
    let records = harness.bookings.payment_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, PaymentStatus::Pending);
    assert_eq!(records[0].amount, Money::from_minor(136_880));
    assert!(url.ends_with(&records[0].transaction_id));
    assert!(records[0].transaction_id.starts_with("NIBOG77T"));
    assert!(!harness.snapshots.contains("s-1"));

    // Back from the gateway
    harness.gateway.push_status("PAYMENT_PENDING");
    harness.gateway.push_status("PAYMENT_SUCCESS");
    let outbound = send(
        &store,
        CheckoutAction::PaymentReturned {
            booking_id: BookingId::new(77),
            transaction_id: records[0].transaction_id.clone(),
        },
    )
    .await;

    assert!(outbound.is_empty());
    assert_eq!(harness.gateway.status_queries().len(), 2);
    assert_eq!(
        harness.bookings.status_updates(),
        vec![(BookingId::new(77), PaymentStatus::Successful)]
    );
    let tickets = harness.notifications.tickets();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].booking_ref, "PG000077");
    assert_eq!(tickets[0].amount_paid, Money::from_minor(136_880));
    assert!(matches!(store.state(|s| s.payment.clone()).await, PaymentPhase::Paid { .. }));
    let attempt = store.services().payments.attempt_for(BookingId::new(77)).unwrap();
    assert_eq!(attempt.gateway_state, GatewayStatus::Success);
}

#[tokio::test]
async fn settled_total_is_what_the_gateway_charges() {
    let harness = Harness::new();
    harness.bookings.settle_at(Money::from_minor(140_000));
    let store = harness.store("s-1");

    pay(&harness, &store).await;

    let attempt = store.services().payments.attempt_for(BookingId::new(77)).unwrap();
    assert_eq!(attempt.amount, Money::from_minor(140_000));
    assert_eq!(harness.bookings.payment_records()[0].amount, Money::from_minor(140_000));
}

#[tokio::test]
async fn login_interrupt_resumes_on_the_intended_step() {
    let harness = Harness::new();
    let store = harness.store("s-1");
    complete_details(&store).await;
    send(&store, CheckoutAction::AdvanceStep { authenticated: true }).await;
    choose_two_tshirts(&store).await;

    let outbound = send(&store, CheckoutAction::AdvanceStep { authenticated: false }).await;
    assert_eq!(outbound, vec![Outbound::RedirectToLogin { return_step: Step::Payment }]);
    assert_eq!(harness.snapshots.peek("s-1").unwrap().step, Step::Payment);

    // The page reloads after login with nothing but the session id
    let resumed = harness.store("s-1");
    send(&resumed, CheckoutAction::Resume { requested_step: Step::Payment }).await;

    let (step, cart, slots, add_ons) = resumed
        .state(|s| (s.step, s.cart.clone(), s.slots.len(), s.add_ons.len()))
        .await;
    assert_eq!(step, Step::Payment);
    assert!(cart.slot_selections.contains(SlotId::new(100)));
    assert_eq!(cart.add_on_selections.len(), 1);
    assert_eq!(slots, 3);
    assert_eq!(add_ons, 1);
    assert_eq!(harness.catalog.age_requests().last(), Some(&(EventId::new(10), 32)));
    assert!(!harness.snapshots.contains("s-1"));

    send(&resumed, CheckoutAction::AcceptTerms { accepted: true }).await;
    let outbound = send(&resumed, CheckoutAction::Submit { user: fixtures::user() }).await;
    redirect_url(&outbound);
    assert_eq!(harness.bookings.bookings()[0].1.totals.total, Money::from_minor(136_880));
}

#[tokio::test]
async fn deep_link_without_saved_progress_starts_over() {
    let harness = Harness::new();
    let store = harness.store("s-2");

    send(&store, CheckoutAction::Resume { requested_step: Step::Payment }).await;

    let (step, cities, notice) = store
        .state(|s| (s.step, s.cities.len(), s.notice.clone()))
        .await;
    assert_eq!(step, Step::Details);
    assert_eq!(cities, 1);
    assert_eq!(notice.unwrap().level, NoticeLevel::Warning);
}

#[tokio::test]
async fn promo_discount_comes_from_the_promo_service() {
    let harness = Harness::new();
    let store = harness.store("s-1");
    complete_details(&store).await;

    send(&store, CheckoutAction::ApplyPromo { code: "admin10".to_string() }).await;

    let (applied, totals) = store
        .state(|s| (s.applied_promo.clone(), s.totals(harness.config.checkout.pricing()).unwrap()))
        .await;
    assert_eq!(applied.unwrap().code, "ADMIN10");
    assert_eq!(totals.discount, Money::from_major_units(80));
    assert_eq!(totals.total, Money::from_minor(84_960));
    assert_eq!(harness.promos.validations(), vec!["admin10".to_string()]);
}

#[tokio::test]
async fn promo_outage_never_blocks_the_checkout() {
    let harness = Harness::new();
    harness.promos.fail_with(BookingError::CatalogUnavailable("down".to_string()));
    let store = harness.store("s-1");
    complete_details(&store).await;

    send(&store, CheckoutAction::ApplyPromo { code: "ADMIN10".to_string() }).await;

    let (applied, promos, notice) = store
        .state(|s| (s.applied_promo.clone(), s.promos.len(), s.notice.clone()))
        .await;
    assert_eq!(applied, None);
    assert_eq!(promos, 0);
    assert_eq!(notice.unwrap().level, NoticeLevel::Warning);

    send(&store, CheckoutAction::AdvanceStep { authenticated: true }).await;
    assert_eq!(store.state(|s| s.step).await, Step::AddOns);
}

#[tokio::test]
async fn catalog_outage_is_reported_to_the_user() {
    let harness = Harness::new();
    harness.catalog.fail_with(BookingError::CatalogUnavailable("maintenance".to_string()));
    let store = harness.store("s-1");

    send(&store, CheckoutAction::Start).await;

    let notice = store.state(|s| s.notice.clone()).await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("try again"));
    assert_eq!(harness.catalog.calls(), 3);
}

#[tokio::test]
async fn transient_catalog_failure_is_retried_before_giving_up() {
    let harness = Harness::new();
    harness
        .catalog
        .fail_next(&BookingError::CatalogUnavailable("blip".to_string()), 1);
    let store = harness.store("s-1");

    send(&store, CheckoutAction::Start).await;

    let (cities, notice) = store.state(|s| (s.cities.len(), s.notice.clone())).await;
    assert_eq!(cities, 1);
    assert_eq!(notice, None);
    assert_eq!(harness.catalog.calls(), 2);
}

#[tokio::test]
async fn rejected_booking_never_reaches_the_gateway() {
    let harness = Harness::new();
    harness
        .bookings
        .reject_with(BookingError::BookingRejected("slot 100 is full".to_string()));
    let store = harness.store("s-1");

    let outbound = pay(&harness, &store).await;

    assert!(outbound.is_empty());
    assert!(harness.gateway.pay_requests().is_empty());
    assert_eq!(store.state(|s| s.payment.clone()).await, PaymentPhase::Idle);
}

#[tokio::test]
async fn failed_initiation_keeps_the_booking_for_a_retry() {
    let harness = Harness::new();
    harness.gateway.fail_pay(BookingError::Gateway("502 Bad Gateway".to_string()));
    let store = harness.store("s-1");

    let outbound = pay(&harness, &store).await;
    assert!(outbound.is_empty());
    assert_eq!(
        store.state(|s| s.payment.clone()).await,
        PaymentPhase::Failed {
            booking_id: Some(BookingId::new(77))
        }
    );
    assert!(store.services().payments.attempt_for(BookingId::new(77)).is_none());

    harness.gateway.accept_pay();
    let outbound = send(&store, CheckoutAction::RetryPayment).await;

    redirect_url(&outbound);
    assert_eq!(harness.bookings.bookings().len(), 1);
    assert_eq!(harness.gateway.pay_requests().len(), 2);
}

#[tokio::test]
async fn unsettled_payment_stays_pending_after_polling() {
    let harness = Harness::new();
    let store = harness.store("s-1");
    pay(&harness, &store).await;
    let transaction_id = harness.bookings.payment_records()[0].transaction_id.clone();

    send(
        &store,
        CheckoutAction::PaymentReturned {
            booking_id: BookingId::new(77),
            transaction_id,
        },
    )
    .await;

    assert_eq!(harness.gateway.status_queries().len(), 3);
    assert!(matches!(
        store.state(|s| s.payment.clone()).await,
        PaymentPhase::AwaitingConfirmation { .. }
    ));
    assert!(harness.bookings.status_updates().is_empty());
    assert!(harness.notifications.tickets().is_empty());
}

#[tokio::test]
async fn snapshot_outage_does_not_block_progress() {
    let harness = Harness::new();
    harness.snapshots.fail_with(BookingError::Snapshot("store offline".to_string()));
    let store = harness.store("s-1");
    complete_details(&store).await;

    send(&store, CheckoutAction::AdvanceStep { authenticated: true }).await;

    assert_eq!(store.state(|s| s.step).await, Step::AddOns);
}

#[tokio::test]
async fn effect_results_are_broadcast() {
    let harness = Harness::new();
    let store = harness.store("s-1");
    let mut actions = store.subscribe_actions();

    send(&store, CheckoutAction::Start).await;

    let received = actions.try_recv().unwrap();
    assert!(matches!(received, CheckoutAction::CitiesLoaded(cities) if cities.len() == 1));
}

#[tokio::test]
async fn runaway_feedback_is_cut_off() {
    let harness = Harness::new();
    let store = harness.store("s-1").with_max_actions_per_send(1);

    let result = store.send(CheckoutAction::Start).await;

    assert_eq!(result, Err(StoreError::FeedbackLimit { limit: 1 }));
}
