#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use crate::environment::Clock;
use crate::error::BookingError;
use crate::money::Money;
use crate::pricing::PricingContext;
use crate::reducer::{Effects, Reducer};
use crate::snapshot::SessionSnapshot;
use crate::types::{
    AddOn, AddOnId, AddOnLine, AppliedPromo, BookingId, BookingReceipt, BundleDiscount, ChildInfo,
    City, CityId, Discount, EventId, EventSummary, GameId, GatewayStatus, ParentInfo, PaymentStatus,
    PromoCode, PromoValidation, Slot, SlotId, UserContext, UserId,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

struct StoppedClock(DateTime<Utc>);

impl Clock for StoppedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn env() -> CheckoutEnvironment {
    CheckoutEnvironment::new(
        Arc::new(StoppedClock(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())),
        PricingContext { tax_rate: 0.18 },
    )
}

fn slot(slot_id: i64, game_id: i64, price: i64) -> Slot {
    Slot {
        slot_id: SlotId::new(slot_id),
        event_id: EventId::new(10),
        game_id: GameId::new(game_id),
        game_name: format!("Game {game_id}"),
        custom_title: None,
        start_time: Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap(),
        price: Some(Money::from_major_units(price)),
        listed_price: Money::from_major_units(price),
        max_participants: 12,
        created_at: Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap(),
    }
}

fn event() -> EventSummary {
    EventSummary {
        id: EventId::new(10),
        city_id: CityId::new(1),
        title: "Baby Olympics".to_string(),
        event_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
        venue: Some("City Stadium".to_string()),
    }
}

fn tshirt() -> AddOn {
    AddOn {
        id: AddOnId::new(5),
        name: "T-shirt".to_string(),
        price: Money::from_major_units(200),
        variants: Vec::new(),
        bundle_discount: Some(BundleDiscount {
            min_quantity: 2,
            discount_percentage: 10.0,
        }),
    }
}

fn user() -> UserContext {
    UserContext {
        user_id: UserId::new(42),
        mobile: "9876543210".to_string(),
    }
}

/// A session on step 1 with every detail filled in and one slot selected.
fn filled_state() -> CheckoutState {
    let mut state = CheckoutState::new("session-1");
    state.cities = vec![City {
        id: CityId::new(1),
        name: "Pune".to_string(),
    }];
    state.events = vec![event()];
    state.slots = vec![slot(100, 1, 800), slot(101, 1, 900), slot(200, 2, 500)];
    state.add_ons = vec![tshirt()];
    state.cart.parent_info = ParentInfo {
        name: "Asha Rao".to_string(),
        email: "asha@example.com".to_string(),
        phone: "+91 98765 43210".to_string(),
    };
    state.cart.child_info = ChildInfo {
        name: "Kiran".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2022, 5, 10),
        gender: None,
        school: None,
    };
    state.cart.city_selection = Some(CityId::new(1));
    state.cart.event_selection = Some(EventId::new(10));
    let selected = state.slots[0].clone();
    state.cart.slot_selections.toggle(&selected);
    state
}

fn reduce(state: &mut CheckoutState, action: CheckoutAction) -> Effects<CheckoutEffect> {
    CheckoutReducer.reduce(state, action, &env())
}

fn apply_admin10(state: &mut CheckoutState) {
    state.applied_promo = Some(AppliedPromo {
        code: "ADMIN10".to_string(),
        discount: Money::from_major_units(100),
    });
    state.cart.promo_code = Some("ADMIN10".to_string());
}

// ============================================================================
// Slots and promos
// ============================================================================

#[test]
fn toggling_a_slot_clears_the_applied_promo() {
    let mut state = filled_state();
    apply_admin10(&mut state);

    let effects = reduce(&mut state, CheckoutAction::ToggleSlot { slot_id: SlotId::new(200) });

    assert_eq!(state.applied_promo, None);
    assert_eq!(state.discount(), Money::ZERO);
    assert_eq!(state.totals(env().pricing).unwrap().discount, Money::ZERO);
    assert_eq!(
        effects[0],
        CheckoutEffect::FetchPromos {
            event_id: EventId::new(10),
            game_ids: vec![GameId::new(1), GameId::new(2)],
        }
    );
    assert!(matches!(&effects[1], CheckoutEffect::SaveSnapshot(s) if s.cart == state.cart));
    assert_eq!(effects.len(), 2);
}

#[test]
fn sibling_slot_replaces_selection() {
    let mut state = filled_state();
    reduce(&mut state, CheckoutAction::ToggleSlot { slot_id: SlotId::new(101) });
    assert_eq!(state.cart.slot_selections.slot_for(GameId::new(1)), Some(SlotId::new(101)));
    assert_eq!(state.cart.slot_selections.len(), 1);
}

#[test]
fn closed_slot_is_rejected_without_change() {
    let mut state = filled_state();
    state.slots[2].max_participants = 0;
    let before = state.cart.clone();

    let effects = reduce(&mut state, CheckoutAction::ToggleSlot { slot_id: SlotId::new(200) });

    assert!(effects.is_empty());
    assert_eq!(state.cart, before);
    assert_eq!(state.notice.unwrap().level, NoticeLevel::Error);
}

#[test]
fn deselecting_last_slot_clears_promos_without_refetch() {
    let mut state = filled_state();
    let effects = reduce(&mut state, CheckoutAction::ToggleSlot { slot_id: SlotId::new(100) });
    assert!(matches!(effects.as_slice(), [CheckoutEffect::SaveSnapshot(_)]));
    assert!(state.cart.slot_selections.is_empty());
}

#[test]
fn listed_promos_show_an_estimate_for_the_current_cart() {
    let mut state = filled_state();
    let listed = |code: &str, discount| PromoCode {
        code: code.to_string(),
        valid_to: Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap(),
        is_active: true,
        discount,
        description: None,
    };
    reduce(
        &mut state,
        CheckoutAction::PromosLoaded(vec![
            listed("ADMIN10", Discount::Percentage(10.0)),
            listed("FLAT1000", Discount::Fixed(Money::from_major_units(1000))),
        ]),
    );

    let offers = state.promo_offers().unwrap();
    let estimates: Vec<(&str, Money)> = offers
        .iter()
        .map(|o| (o.promo.code.as_str(), o.estimated_discount))
        .collect();
    assert_eq!(
        estimates,
        vec![
            ("ADMIN10", Money::from_major_units(80)),
            ("FLAT1000", Money::from_major_units(800)),
        ]
    );
}

#[test]
fn admin10_discount_is_applied_before_tax() {
    let mut state = filled_state();
    state.slots[0].price = Some(Money::from_major_units(1000));

    let effects = reduce(&mut state, CheckoutAction::ApplyPromo { code: "admin10".to_string() });
    assert_eq!(
        effects.as_slice(),
        &[CheckoutEffect::ValidatePromo {
            code: "admin10".to_string(),
            event_id: EventId::new(10),
            game_ids: vec![GameId::new(1)],
            subtotal: Money::from_major_units(1000),
        }]
    );

    reduce(
        &mut state,
        CheckoutAction::PromoValidated {
            code: "ADMIN10".to_string(),
            validation: PromoValidation {
                is_valid: true,
                discount_amount: 100.0,
                message: None,
            },
        },
    );

    let totals = state.totals(env().pricing).unwrap();
    assert_eq!(totals.discount, Money::from_major_units(100));
    assert_eq!(totals.tax, Money::from_major_units(162));
    assert_eq!(totals.total, Money::from_major_units(1062));
    assert_eq!(state.cart.promo_code.as_deref(), Some("ADMIN10"));
}

#[test]
fn stale_promo_answer_is_ignored() {
    let mut state = filled_state();
    reduce(&mut state, CheckoutAction::ApplyPromo { code: "ADMIN10".to_string() });
    reduce(&mut state, CheckoutAction::ToggleSlot { slot_id: SlotId::new(200) });

    reduce(
        &mut state,
        CheckoutAction::PromoValidated {
            code: "ADMIN10".to_string(),
            validation: PromoValidation {
                is_valid: true,
                discount_amount: 100.0,
                message: None,
            },
        },
    );
    assert_eq!(state.applied_promo, None);
}

#[test]
fn rejected_promo_leaves_checkout_usable() {
    let mut state = filled_state();
    reduce(&mut state, CheckoutAction::ApplyPromo { code: "NOPE".to_string() });
    reduce(
        &mut state,
        CheckoutAction::PromoValidated {
            code: "NOPE".to_string(),
            validation: PromoValidation {
                is_valid: false,
                discount_amount: 0.0,
                message: Some("Code expired".to_string()),
            },
        },
    );
    assert_eq!(state.applied_promo, None);
    let notice = state.notice.unwrap();
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert!(notice.message.contains("Code expired"));
}

#[test]
fn changing_date_of_birth_refetches_games() {
    let mut state = filled_state();
    apply_admin10(&mut state);
    let mut child = state.cart.child_info.clone();
    child.date_of_birth = NaiveDate::from_ymd_opt(2021, 2, 1);

    let effects = reduce(&mut state, CheckoutAction::SetChildInfo(child));

    assert_eq!(state.applied_promo, None);
    assert_eq!(
        effects[0],
        CheckoutEffect::FetchGames {
            event_id: EventId::new(10),
            age_months: 48,
        }
    );
    assert!(matches!(&effects[1], CheckoutEffect::SaveSnapshot(s) if s.step == Step::Details));
}

#[test]
fn every_cart_edit_overwrites_the_saved_progress() {
    let mut state = filled_state();
    state.step = Step::AddOns;

    let effects = reduce(
        &mut state,
        CheckoutAction::SetAddOn(AddOnLine {
            add_on_id: AddOnId::new(5),
            variant_id: None,
            quantity: 2,
        }),
    );
    let [CheckoutEffect::SaveSnapshot(snapshot)] = effects.as_slice() else {
        panic!("expected the progress to be saved, got {effects:?}");
    };
    assert_eq!(snapshot.step, Step::AddOns);
    assert_eq!(snapshot.cart.add_on_selections.len(), 1);

    let effects = reduce(&mut state, CheckoutAction::AcceptTerms { accepted: true });
    assert!(matches!(&effects[..], [CheckoutEffect::SaveSnapshot(s)] if s.cart.terms_accepted));

    // Same value again: nothing changed, nothing saved
    let effects = reduce(&mut state, CheckoutAction::AcceptTerms { accepted: true });
    assert!(effects.is_empty());
}

#[test]
fn cart_edits_after_booking_do_not_save_progress() {
    let mut state = at_payment_step();
    reduce(&mut state, CheckoutAction::Submit { user: user() });
    reduce(&mut state, CheckoutAction::BookingCreated(receipt(136_880)));

    let effects = reduce(&mut state, CheckoutAction::AcceptTerms { accepted: false });

    assert!(effects.is_empty());
}

// ============================================================================
// Steps and the authentication interrupt
// ============================================================================

#[test]
fn incomplete_details_block_advance() {
    let mut state = filled_state();
    state.cart.parent_info.email = "not-an-email".to_string();

    let effects = reduce(&mut state, CheckoutAction::AdvanceStep { authenticated: true });

    assert!(effects.is_empty());
    assert_eq!(state.step, Step::Details);
    assert!(state.notice.unwrap().message.contains("email"));
}

#[test]
fn authenticated_advance_saves_snapshot_and_moves_on() {
    let mut state = filled_state();
    state.add_ons.clear();

    let effects = reduce(&mut state, CheckoutAction::AdvanceStep { authenticated: true });

    assert_eq!(state.step, Step::AddOns);
    assert!(matches!(&effects[0], CheckoutEffect::SaveSnapshot(s) if s.step == Step::AddOns));
    assert_eq!(effects[1], CheckoutEffect::FetchAddOns);
}

#[test]
fn logged_out_user_on_step_two_is_restored_to_step_three() {
    let mut state = filled_state();
    state.step = Step::AddOns;
    state.cart.add_on_selections.push(AddOnLine {
        add_on_id: AddOnId::new(5),
        variant_id: None,
        quantity: 2,
    });

    let effects = reduce(&mut state, CheckoutAction::AdvanceStep { authenticated: false });

    let snapshot = match effects.as_slice() {
        [
            CheckoutEffect::SaveSnapshot(snapshot),
            CheckoutEffect::RedirectToLogin { return_step: Step::Payment },
        ] => snapshot.clone(),
        other => panic!("unexpected effects: {other:?}"),
    };
    assert_eq!(snapshot.step, Step::Payment);
    assert_eq!(state.step, Step::AddOns);
    assert!(state.notice.as_ref().unwrap().message.contains("progress is saved"));

    // Back from login in a fresh session
    let mut resumed = CheckoutState::new("session-1");
    let effects = reduce(&mut resumed, CheckoutAction::Resume { requested_step: Step::Payment });
    assert_eq!(effects.as_slice(), &[CheckoutEffect::LoadSnapshot]);

    let effects = reduce(&mut resumed, CheckoutAction::SnapshotLoaded(Some(snapshot.clone())));
    assert_eq!(resumed.step, Step::Payment);
    assert!(resumed.restored);
    assert_eq!(resumed.cart, snapshot.cart);
    assert_eq!(
        effects.as_slice(),
        &[
            CheckoutEffect::FetchCities,
            CheckoutEffect::FetchEvents { city_id: CityId::new(1) },
            CheckoutEffect::FetchAddOns,
        ]
    );

    // Dependent data is re-resolved: events, then games for the child's age
    let effects = reduce(
        &mut resumed,
        CheckoutAction::EventsLoaded {
            city_id: CityId::new(1),
            events: vec![event()],
        },
    );
    assert_eq!(
        effects.as_slice(),
        &[CheckoutEffect::FetchGames {
            event_id: EventId::new(10),
            age_months: 32,
        }]
    );
    reduce(
        &mut resumed,
        CheckoutAction::GamesLoaded {
            event_id: EventId::new(10),
            slots: vec![slot(100, 1, 800), slot(200, 2, 500)],
        },
    );
    assert_eq!(resumed.step, Step::Payment);
    assert!(resumed.cart.slot_selections.contains(SlotId::new(100)));

    // A second answer never restores again
    let mut other = snapshot;
    other.step = Step::Details;
    reduce(&mut resumed, CheckoutAction::SnapshotLoaded(Some(other)));
    assert_eq!(resumed.step, Step::Payment);
}

#[test]
fn deep_link_without_snapshot_returns_to_step_one() {
    let mut state = CheckoutState::new("session-2");
    reduce(&mut state, CheckoutAction::Resume { requested_step: Step::Payment });
    let effects = reduce(&mut state, CheckoutAction::SnapshotLoaded(None));

    assert_eq!(state.step, Step::Details);
    assert_eq!(effects.as_slice(), &[CheckoutEffect::FetchCities]);
    assert_eq!(state.notice.unwrap().level, NoticeLevel::Warning);
}

#[test]
fn restore_prunes_slots_that_disappeared() {
    let state = filled_state();
    let snapshot = SessionSnapshot::new(Step::Payment, state.cart, env().clock.now());
    let mut resumed = CheckoutState::new("session-1");
    reduce(&mut resumed, CheckoutAction::SnapshotLoaded(Some(snapshot)));

    reduce(
        &mut resumed,
        CheckoutAction::GamesLoaded {
            event_id: EventId::new(10),
            slots: vec![slot(200, 2, 500)],
        },
    );

    assert!(resumed.cart.slot_selections.is_empty());
    assert_eq!(resumed.step, Step::Details);
    assert_eq!(resumed.notice.unwrap().level, NoticeLevel::Warning);
}

#[test]
fn restored_promo_code_is_validated_again() {
    let mut state = filled_state();
    apply_admin10(&mut state);
    let snapshot = SessionSnapshot::new(Step::Payment, state.cart.clone(), env().clock.now());

    let mut resumed = CheckoutState::new("session-1");
    reduce(&mut resumed, CheckoutAction::SnapshotLoaded(Some(snapshot)));
    assert_eq!(resumed.applied_promo, None);

    resumed.events = vec![event()];
    let effects = reduce(
        &mut resumed,
        CheckoutAction::GamesLoaded {
            event_id: EventId::new(10),
            slots: vec![slot(100, 1, 800)],
        },
    );
    assert!(effects.iter().any(|e| matches!(
        e,
        CheckoutEffect::ValidatePromo { code, .. } if code == "ADMIN10"
    )));
}

// ============================================================================
// Booking and payment
// ============================================================================

fn at_payment_step() -> CheckoutState {
    let mut state = filled_state();
    state.step = Step::Payment;
    state.cart.add_on_selections.push(AddOnLine {
        add_on_id: AddOnId::new(5),
        variant_id: None,
        quantity: 2,
    });
    state.cart.terms_accepted = true;
    state
}

fn receipt(total_minor: i64) -> BookingReceipt {
    BookingReceipt {
        booking_id: BookingId::new(77),
        booking_ref: "PG25020177".to_string(),
        total_amount: Money::from_minor(total_minor),
    }
}

#[test]
fn submit_requires_terms() {
    let mut state = at_payment_step();
    state.cart.terms_accepted = false;
    let effects = reduce(&mut state, CheckoutAction::Submit { user: user() });
    assert!(effects.is_empty());
    assert_eq!(state.payment, PaymentPhase::Idle);
}

#[test]
fn submit_sends_client_totals() {
    let mut state = at_payment_step();
    let effects = reduce(&mut state, CheckoutAction::Submit { user: user() });

    let [CheckoutEffect::CreateBooking(payload)] = effects.as_slice() else {
        panic!("expected a booking request, got {effects:?}");
    };
    assert_eq!(payload.totals.total, Money::from_minor(136_880));
    assert_eq!(payload.add_ons[0].line_total, Money::from_major_units(360));
    assert_eq!(payload.game_selections[0].slot_id, Some(SlotId::new(100)));
    assert_eq!(state.payment, PaymentPhase::CreatingBooking);

    // Double submit while the booking call is outstanding does nothing
    assert!(reduce(&mut state, CheckoutAction::Submit { user: user() }).is_empty());
}

#[test]
fn booking_precedes_payment_and_clears_snapshot() {
    let mut state = at_payment_step();
    reduce(&mut state, CheckoutAction::Submit { user: user() });

    let effects = reduce(&mut state, CheckoutAction::BookingCreated(receipt(136_880)));

    assert_eq!(
        effects.as_slice(),
        &[
            CheckoutEffect::ClearSnapshot,
            CheckoutEffect::InitiatePayment {
                booking_id: BookingId::new(77),
                user_id: UserId::new(42),
                amount: Money::from_minor(136_880),
                mobile: "9876543210".to_string(),
                supersede: false,
            },
        ]
    );
}

#[test]
fn settled_total_wins_over_client_estimate() {
    let mut state = at_payment_step();
    reduce(&mut state, CheckoutAction::Submit { user: user() });
    let effects = reduce(&mut state, CheckoutAction::BookingCreated(receipt(140_000)));
    assert!(effects.iter().any(|e| matches!(
        e,
        CheckoutEffect::InitiatePayment { amount, .. } if *amount == Money::from_minor(140_000)
    )));
}

#[test]
fn gateway_redirect_records_payment_then_navigates() {
    let mut state = at_payment_step();
    reduce(&mut state, CheckoutAction::Submit { user: user() });
    reduce(&mut state, CheckoutAction::BookingCreated(receipt(136_880)));

    let effects = reduce(
        &mut state,
        CheckoutAction::PaymentInitiated {
            booking_id: BookingId::new(77),
            transaction_id: "NIBOG77T1735689600000AB12".to_string(),
            amount: Money::from_minor(136_880),
            redirect_url: "https://pay.example/redirect/1".to_string(),
        },
    );

    assert!(matches!(
        &effects[0],
        CheckoutEffect::CreatePaymentRecord(record) if record.status == PaymentStatus::Pending
    ));
    assert_eq!(
        effects[1],
        CheckoutEffect::Navigate {
            url: "https://pay.example/redirect/1".to_string()
        }
    );
}

#[test]
fn success_issues_ticket_and_is_never_downgraded() {
    let mut state = at_payment_step();
    reduce(&mut state, CheckoutAction::Submit { user: user() });
    reduce(&mut state, CheckoutAction::BookingCreated(receipt(136_880)));
    let txn = "NIBOG77T1735689600000AB12".to_string();
    reduce(
        &mut state,
        CheckoutAction::PaymentReturned {
            booking_id: BookingId::new(77),
            transaction_id: txn.clone(),
        },
    );

    let effects = reduce(
        &mut state,
        CheckoutAction::PaymentSettled {
            booking_id: BookingId::new(77),
            transaction_id: txn.clone(),
            status: GatewayStatus::Success,
        },
    );
    assert_eq!(
        effects[0],
        CheckoutEffect::UpdatePaymentStatus {
            booking_id: BookingId::new(77),
            status: PaymentStatus::Successful,
        }
    );
    assert_eq!(effects[1], CheckoutEffect::ClearSnapshot);
    let CheckoutEffect::IssueTicket(ticket) = &effects[2] else {
        panic!("expected a ticket, got {:?}", effects[2]);
    };
    assert_eq!(ticket.booking_ref, "PG25020177");
    assert_eq!(ticket.amount_paid, Money::from_minor(136_880));
    assert_eq!(ticket.add_ons[0].quantity, 2);

    let effects = reduce(
        &mut state,
        CheckoutAction::PaymentSettled {
            booking_id: BookingId::new(77),
            transaction_id: txn,
            status: GatewayStatus::Failed,
        },
    );
    assert!(effects.is_empty());
    assert!(matches!(state.payment, PaymentPhase::Paid { .. }));
}

#[test]
fn failed_payment_keeps_booking_for_retry() {
    let mut state = at_payment_step();
    reduce(&mut state, CheckoutAction::Submit { user: user() });
    reduce(&mut state, CheckoutAction::BookingCreated(receipt(136_880)));
    reduce(
        &mut state,
        CheckoutAction::PaymentFailed(BookingError::GatewayTimeout { seconds: 15 }),
    );

    assert!(state.booking.is_some());
    assert!(state.notice.as_ref().unwrap().message.contains("retry"));

    let effects = reduce(&mut state, CheckoutAction::RetryPayment);
    assert!(matches!(
        effects.as_slice(),
        [CheckoutEffect::InitiatePayment { supersede: true, booking_id, .. }] if *booking_id == BookingId::new(77)
    ));
}

#[test]
fn pending_after_polling_keeps_booking_pending() {
    let mut state = at_payment_step();
    let effects = reduce(
        &mut state,
        CheckoutAction::PaymentSettled {
            booking_id: BookingId::new(77),
            transaction_id: "T1".to_string(),
            status: GatewayStatus::Pending,
        },
    );
    assert!(effects.is_empty());
    assert!(matches!(state.payment, PaymentPhase::AwaitingConfirmation { .. }));
}

#[test]
fn step_numbers_round_trip() {
    for step in [Step::Details, Step::AddOns, Step::Payment] {
        assert_eq!(Step::from_number(step.number()), Some(step));
    }
    assert_eq!(Step::from_number(0), None);
    assert_eq!(Step::Payment.next(), None);
    assert_eq!(Step::Details.previous(), None);
}
