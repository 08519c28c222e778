//! Checkout reducer.

use super::validation::{validate_add_ons, validate_details, validate_submission};
use super::{CheckoutAction, CheckoutEffect, CheckoutState, Notice, PaymentPhase, Step};
use crate::environment::Clock;
use crate::error::BookingError;
use crate::money::Money;
use crate::notification::{TicketSource, build_ticket};
use crate::pricing::{self, PricingContext};
use crate::promo;
use crate::reducer::{Effects, Reducer};
use crate::snapshot::SessionSnapshot;
use crate::types::{
    AddOnId, AddOnLine, BookingId, BookingPayload, BookingReceipt, ChildInfo, CityId, EventId,
    GatewayStatus, PaymentRecord, PaymentStatus, PromoValidation, SlotId, UserContext, VariantId,
    age_in_months,
};
use smallvec::smallvec;
use std::sync::Arc;

/// What the reducer needs from outside: time and pricing parameters.
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Clock for snapshot timestamps and age checks
    pub clock: Arc<dyn Clock>,
    /// Tax settings of this checkout
    pub pricing: PricingContext,
}

impl CheckoutEnvironment {
    /// Creates an environment.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, pricing: PricingContext) -> Self {
        Self { clock, pricing }
    }
}

impl std::fmt::Debug for CheckoutEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutEnvironment")
            .field("now", &self.clock.now())
            .field("pricing", &self.pricing)
            .finish()
    }
}

/// The checkout session reducer.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckoutReducer;

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Effect = CheckoutEffect;
    type Environment = CheckoutEnvironment;

    fn reduce(
        &self,
        state: &mut CheckoutState,
        action: CheckoutAction,
        env: &CheckoutEnvironment,
    ) -> Effects<CheckoutEffect> {
        let cart_before = action.edits_cart().then(|| state.cart.clone());
        let mut effects = dispatch(state, action, env);
        if state.booking.is_none() && cart_before.is_some_and(|cart| cart != state.cart) {
            effects.push(CheckoutEffect::SaveSnapshot(SessionSnapshot::new(
                state.step,
                state.cart.clone(),
                env.clock.now(),
            )));
        }
        effects
    }
}

fn dispatch(
    state: &mut CheckoutState,
    action: CheckoutAction,
    env: &CheckoutEnvironment,
) -> Effects<CheckoutEffect> {
    match action {
        // ========== Commands ==========
        CheckoutAction::Start => smallvec![CheckoutEffect::FetchCities],
        CheckoutAction::SelectCity { city_id } => select_city(state, city_id),
        CheckoutAction::SelectEvent { event_id } => select_event(state, event_id),
        CheckoutAction::SetParentInfo(parent) => {
            state.cart.parent_info = parent;
            Effects::new()
        }
        CheckoutAction::SetChildInfo(child) => set_child_info(state, child),
        CheckoutAction::ToggleSlot { slot_id } => toggle_slot(state, slot_id),
        CheckoutAction::SetAddOn(line) => set_add_on(state, line),
        CheckoutAction::RemoveAddOn {
            add_on_id,
            variant_id,
        } => remove_add_on(state, add_on_id, variant_id),
        CheckoutAction::ApplyPromo { code } => apply_promo(state, &code, env),
        CheckoutAction::RemovePromo => {
            clear_promo(state);
            Effects::new()
        }
        CheckoutAction::AcceptTerms { accepted } => {
            state.cart.terms_accepted = accepted;
            Effects::new()
        }
        CheckoutAction::AdvanceStep { authenticated } => advance_step(state, authenticated, env),
        CheckoutAction::GoBack => {
            if let (false, Some(previous)) = (state.payment.is_busy(), state.step.previous()) {
                state.step = previous;
                state.notice = None;
            }
            Effects::new()
        }
        CheckoutAction::Resume { requested_step } => {
            if state.restored {
                tracing::debug!(session_id = %state.session_id, "Session already restored, ignoring resume");
                return Effects::new();
            }
            state.resume_step = Some(requested_step);
            smallvec![CheckoutEffect::LoadSnapshot]
        }
        CheckoutAction::Submit { user } => submit(state, user, env),
        CheckoutAction::PaymentReturned {
            booking_id,
            transaction_id,
        } => payment_returned(state, booking_id, transaction_id),
        CheckoutAction::RetryPayment => retry_payment(state),

        // ========== Collaborator results ==========
        CheckoutAction::CitiesLoaded(cities) => {
            state.cities = cities;
            Effects::new()
        }
        CheckoutAction::EventsLoaded { city_id, events } => events_loaded(state, city_id, events),
        CheckoutAction::GamesLoaded { event_id, slots } => games_loaded(state, event_id, slots, env),
        CheckoutAction::AddOnsLoaded(add_ons) => {
            state.add_ons = add_ons;
            Effects::new()
        }
        CheckoutAction::PromosLoaded(promos) => {
            state.promos = promos;
            Effects::new()
        }
        CheckoutAction::PromoValidated { code, validation } => {
            promo_validated(state, &code, &validation, env)
        }
        CheckoutAction::CatalogFailed(error) => {
            tracing::warn!(session_id = %state.session_id, error = %error, "Catalog call failed");
            state.notice = Some(Notice::error(error.user_message()));
            Effects::new()
        }
        CheckoutAction::SnapshotLoaded(snapshot) => snapshot_loaded(state, snapshot),
        CheckoutAction::BookingCreated(receipt) => booking_created(state, receipt, env),
        CheckoutAction::BookingFailed(error) => {
            tracing::warn!(session_id = %state.session_id, error = %error, "Booking creation failed");
            state.payment = PaymentPhase::Idle;
            state.notice = Some(Notice::error(error.user_message()));
            Effects::new()
        }
        CheckoutAction::PaymentInitiated {
            booking_id,
            transaction_id,
            amount,
            redirect_url,
        } => payment_initiated(state, booking_id, transaction_id, amount, redirect_url),
        CheckoutAction::PaymentFailed(error) => {
            tracing::warn!(session_id = %state.session_id, error = %error, "Payment initiation failed");
            state.payment = PaymentPhase::Failed {
                booking_id: state.booking.as_ref().map(|b| b.booking_id),
            };
            state.notice = Some(Notice::error(error.user_message()));
            Effects::new()
        }
        CheckoutAction::PaymentSettled {
            booking_id,
            transaction_id,
            status,
        } => payment_settled(state, booking_id, transaction_id, status, env),
    }
}

// ============================================================================
// Cart mutations
// ============================================================================

/// Drops the applied or pending promo. Returns `true` if there was one.
fn clear_promo(state: &mut CheckoutState) -> bool {
    let had_promo = state.applied_promo.is_some() || state.pending_promo.is_some();
    state.applied_promo = None;
    state.pending_promo = None;
    state.cart.promo_code = None;
    had_promo
}

/// Clears the promo after a cart change and tells the user why.
fn invalidate_promo(state: &mut CheckoutState) {
    if clear_promo(state) {
        state.notice = Some(Notice::info(
            "Your selection changed, so the promo code was removed. Apply it again to see the new discount.",
        ));
    }
}

fn promo_refetch(state: &mut CheckoutState) -> Option<CheckoutEffect> {
    let event_id = state.cart.event_selection?;
    if state.cart.slot_selections.is_empty() {
        state.promos.clear();
        return None;
    }
    Some(CheckoutEffect::FetchPromos {
        event_id,
        game_ids: state.cart.slot_selections.game_ids(),
    })
}

fn games_request(state: &CheckoutState) -> Option<CheckoutEffect> {
    let event = state.selected_event()?;
    let date_of_birth = state.cart.child_info.date_of_birth?;
    let age_months = age_in_months(date_of_birth, event.event_date)?;
    Some(CheckoutEffect::FetchGames {
        event_id: event.id,
        age_months,
    })
}

fn reset_event_selection(state: &mut CheckoutState) {
    state.cart.event_selection = None;
    state.slots.clear();
    state.cart.slot_selections.clear();
    state.promos.clear();
}

fn select_city(state: &mut CheckoutState, city_id: CityId) -> Effects<CheckoutEffect> {
    if state.cart.city_selection == Some(city_id) {
        return Effects::new();
    }
    state.cart.city_selection = Some(city_id);
    state.events.clear();
    reset_event_selection(state);
    invalidate_promo(state);
    smallvec![CheckoutEffect::FetchEvents { city_id }]
}

fn select_event(state: &mut CheckoutState, event_id: EventId) -> Effects<CheckoutEffect> {
    if state.cart.event_selection == Some(event_id) {
        return Effects::new();
    }
    reset_event_selection(state);
    state.cart.event_selection = Some(event_id);
    invalidate_promo(state);
    games_request(state).into_iter().collect()
}

fn set_child_info(state: &mut CheckoutState, child: ChildInfo) -> Effects<CheckoutEffect> {
    let dob_changed = state.cart.child_info.date_of_birth != child.date_of_birth;
    state.cart.child_info = child;
    if !dob_changed {
        return Effects::new();
    }
    invalidate_promo(state);
    games_request(state).into_iter().collect()
}

fn toggle_slot(state: &mut CheckoutState, slot_id: SlotId) -> Effects<CheckoutEffect> {
    let Some(slot) = state.slots.iter().find(|s| s.slot_id == slot_id).cloned() else {
        state.notice = Some(Notice::error(
            BookingError::validation("slot_selections", "This slot is no longer available")
                .user_message(),
        ));
        return Effects::new();
    };
    if !slot.is_open() {
        state.notice = Some(Notice::error(BookingError::SlotClosed { slot_id }.user_message()));
        return Effects::new();
    }

    let outcome = state.cart.slot_selections.toggle(&slot);
    tracing::debug!(session_id = %state.session_id, slot_id = %slot_id, ?outcome, "Slot toggled");
    invalidate_promo(state);
    promo_refetch(state).into_iter().collect()
}

fn set_add_on(state: &mut CheckoutState, line: AddOnLine) -> Effects<CheckoutEffect> {
    if line.quantity == 0 {
        return remove_add_on(state, line.add_on_id, line.variant_id);
    }
    let existing = state
        .cart
        .add_on_selections
        .iter_mut()
        .find(|l| l.add_on_id == line.add_on_id && l.variant_id == line.variant_id);
    match existing {
        Some(existing) if existing.quantity == line.quantity => return Effects::new(),
        Some(existing) => existing.quantity = line.quantity,
        None => state.cart.add_on_selections.push(line),
    }
    invalidate_promo(state);
    Effects::new()
}

fn remove_add_on(
    state: &mut CheckoutState,
    add_on_id: AddOnId,
    variant_id: Option<VariantId>,
) -> Effects<CheckoutEffect> {
    let before = state.cart.add_on_selections.len();
    state
        .cart
        .add_on_selections
        .retain(|l| !(l.add_on_id == add_on_id && l.variant_id == variant_id));
    if state.cart.add_on_selections.len() != before {
        invalidate_promo(state);
    }
    Effects::new()
}

// ============================================================================
// Promo codes
// ============================================================================

fn subtotal_without_promo(state: &CheckoutState, env: &CheckoutEnvironment) -> Result<Money, BookingError> {
    pricing::compute_totals(&state.cart, state.catalog_prices(), None, env.pricing).map(|t| t.subtotal)
}

fn apply_promo(state: &mut CheckoutState, code: &str, env: &CheckoutEnvironment) -> Effects<CheckoutEffect> {
    let code = code.trim().to_string();
    if code.is_empty() {
        state.notice = Some(Notice::error(
            BookingError::validation("promo_code", "Enter a promo code").user_message(),
        ));
        return Effects::new();
    }
    let Some(event_id) = state.cart.event_selection else {
        state.notice = Some(Notice::error(
            BookingError::validation("event", "Select an event before applying a promo code").user_message(),
        ));
        return Effects::new();
    };
    if state.cart.slot_selections.is_empty() {
        state.notice = Some(Notice::error(
            BookingError::validation("slot_selections", "Select a game slot before applying a promo code")
                .user_message(),
        ));
        return Effects::new();
    }
    let subtotal = match subtotal_without_promo(state, env) {
        Ok(subtotal) => subtotal,
        Err(error) => {
            state.notice = Some(Notice::error(error.user_message()));
            return Effects::new();
        }
    };

    state.applied_promo = None;
    state.cart.promo_code = None;
    state.pending_promo = Some(code.clone());
    smallvec![CheckoutEffect::ValidatePromo {
        code,
        event_id,
        game_ids: state.cart.slot_selections.game_ids(),
        subtotal,
    }]
}

fn promo_validated(
    state: &mut CheckoutState,
    code: &str,
    validation: &PromoValidation,
    env: &CheckoutEnvironment,
) -> Effects<CheckoutEffect> {
    let current = state
        .pending_promo
        .as_deref()
        .is_some_and(|pending| promo::same_code(pending, code));
    if !current {
        tracing::debug!(session_id = %state.session_id, code, "Ignoring stale promo validation");
        return Effects::new();
    }
    state.pending_promo = None;

    let decision = subtotal_without_promo(state, env)
        .and_then(|subtotal| promo::decide(code, validation, subtotal));
    match decision {
        Ok(applied) => {
            state.notice = Some(Notice::info(format!(
                "Promo code {} applied. You save {}.",
                applied.code, applied.discount
            )));
            state.cart.promo_code = Some(applied.code.clone());
            state.applied_promo = Some(applied);
        }
        Err(error) => {
            tracing::debug!(session_id = %state.session_id, error = %error, "Promo code not applied");
            state.notice = Some(Notice::warning(error.user_message()));
        }
    }
    Effects::new()
}

// ============================================================================
// Steps and session recovery
// ============================================================================

fn advance_step(
    state: &mut CheckoutState,
    authenticated: bool,
    env: &CheckoutEnvironment,
) -> Effects<CheckoutEffect> {
    if state.payment.is_busy() {
        return Effects::new();
    }
    let Some(target) = state.step.next() else {
        return Effects::new();
    };

    let now = env.clock.now();
    let check = match state.step {
        Step::Details => validate_details(state, now.date_naive()),
        Step::AddOns => validate_add_ons(state),
        Step::Payment => Ok(()),
    };
    if let Err(error) = check {
        state.notice = Some(Notice::error(error.user_message()));
        return Effects::new();
    }

    let snapshot = SessionSnapshot::new(target, state.cart.clone(), now);
    if !authenticated {
        tracing::info!(
            session_id = %state.session_id,
            return_step = %target,
            "Login required, saving progress"
        );
        state.notice = Some(Notice::info(
            "Your progress is saved. Please log in to continue with your booking.",
        ));
        return smallvec![
            CheckoutEffect::SaveSnapshot(snapshot),
            CheckoutEffect::RedirectToLogin { return_step: target },
        ];
    }

    state.step = target;
    state.notice = None;
    let mut effects: Effects<CheckoutEffect> = smallvec![CheckoutEffect::SaveSnapshot(snapshot)];
    if target == Step::AddOns && state.add_ons.is_empty() {
        effects.push(CheckoutEffect::FetchAddOns);
    }
    effects
}

fn snapshot_loaded(state: &mut CheckoutState, snapshot: Option<SessionSnapshot>) -> Effects<CheckoutEffect> {
    let requested = state.resume_step.take();
    if state.restored {
        tracing::debug!(session_id = %state.session_id, "Snapshot already restored, ignoring");
        return Effects::new();
    }

    let mut effects: Effects<CheckoutEffect> = smallvec![CheckoutEffect::FetchCities];
    match snapshot {
        Some(snapshot) => {
            tracing::info!(
                session_id = %state.session_id,
                step = %snapshot.step,
                requested = ?requested,
                "Restoring checkout session"
            );
            state.cart = snapshot.cart;
            state.step = snapshot.step;
            state.restored = true;
            state.applied_promo = None;
            state.pending_promo = None;
            state.events.clear();
            state.slots.clear();
            state.notice = Some(Notice::info("Welcome back! Your booking progress has been restored."));

            if let Some(city_id) = state.cart.city_selection {
                effects.push(CheckoutEffect::FetchEvents { city_id });
            }
            if state.step >= Step::AddOns {
                effects.push(CheckoutEffect::FetchAddOns);
            }
        }
        None => {
            if requested.is_some_and(|step| step > Step::Details) {
                tracing::info!(
                    session_id = %state.session_id,
                    requested = ?requested,
                    "No snapshot for deep link, starting over"
                );
                state.step = Step::Details;
                state.notice = Some(Notice::warning(
                    "We couldn't find your saved progress. Please start from the first step.",
                ));
            }
        }
    }
    effects
}

fn events_loaded(
    state: &mut CheckoutState,
    city_id: CityId,
    events: Vec<crate::types::EventSummary>,
) -> Effects<CheckoutEffect> {
    if state.cart.city_selection != Some(city_id) {
        return Effects::new();
    }
    state.events = events;

    let Some(event_id) = state.cart.event_selection else {
        return Effects::new();
    };
    if state.events.iter().any(|e| e.id == event_id) {
        return games_request(state).into_iter().collect();
    }

    tracing::info!(session_id = %state.session_id, event_id = %event_id, "Selected event is gone");
    reset_event_selection(state);
    clear_promo(state);
    state.step = Step::Details;
    state.notice = Some(Notice::warning(
        "The event you selected is no longer available. Please choose another event.",
    ));
    Effects::new()
}

fn games_loaded(
    state: &mut CheckoutState,
    event_id: EventId,
    slots: Vec<crate::types::Slot>,
    env: &CheckoutEnvironment,
) -> Effects<CheckoutEffect> {
    if state.cart.event_selection != Some(event_id) {
        return Effects::new();
    }
    state.slots = slots;

    let dropped = state.cart.slot_selections.retain_available(&state.slots);
    if !dropped.is_empty() {
        tracing::info!(session_id = %state.session_id, dropped = ?dropped, "Pruned unavailable slots");
        clear_promo(state);
        state.notice = Some(Notice::warning(
            "Some selected slots are no longer available and were removed. Please review your selection.",
        ));
        if state.cart.slot_selections.is_empty() {
            state.step = Step::Details;
        }
    }

    let mut effects: Effects<CheckoutEffect> = promo_refetch(state).into_iter().collect();

    // A restored cart keeps its code but must be validated again.
    let revalidate = state.applied_promo.is_none()
        && state.pending_promo.is_none()
        && !state.cart.slot_selections.is_empty();
    if let (true, Some(code)) = (revalidate, state.cart.promo_code.clone()) {
        effects.extend(apply_promo(state, &code, env));
    }
    effects
}

// ============================================================================
// Booking and payment saga
// ============================================================================

fn submit(state: &mut CheckoutState, user: UserContext, env: &CheckoutEnvironment) -> Effects<CheckoutEffect> {
    if state.step != Step::Payment {
        state.notice = Some(Notice::error("Please complete the previous steps first."));
        return Effects::new();
    }
    if state.payment.is_busy() {
        return Effects::new();
    }
    if state.booking.is_some() {
        state.notice = Some(Notice::info(
            "Your booking is already created. Retry the payment to complete it.",
        ));
        return Effects::new();
    }

    let prepared = validate_submission(state, env.clock.now().date_naive()).and_then(|()| {
        let breakdown = state.breakdown()?;
        let totals = state.totals(env.pricing)?;
        let event_id = state
            .cart
            .event_selection
            .ok_or_else(|| BookingError::validation("event", "Select an event"))?;
        Ok(BookingPayload {
            user_id: user.user_id,
            parent: state.cart.parent_info.clone(),
            child: state.cart.child_info.clone(),
            event_id,
            game_selections: breakdown.games,
            add_ons: breakdown.add_ons,
            promo_code: state.applied_promo.as_ref().map(|p| p.code.clone()),
            totals,
            terms_accepted: state.cart.terms_accepted,
        })
    });

    match prepared {
        Ok(payload) => {
            tracing::info!(
                session_id = %state.session_id,
                user_id = %user.user_id,
                total = %payload.totals.total,
                "Submitting booking"
            );
            state.user = Some(user);
            state.payment = PaymentPhase::CreatingBooking;
            state.notice = None;
            smallvec![CheckoutEffect::CreateBooking(payload)]
        }
        Err(error) => {
            state.notice = Some(Notice::error(error.user_message()));
            Effects::new()
        }
    }
}

fn booking_created(
    state: &mut CheckoutState,
    receipt: BookingReceipt,
    env: &CheckoutEnvironment,
) -> Effects<CheckoutEffect> {
    let booking_id = receipt.booking_id;
    if let Ok(estimate) = state.totals(env.pricing) {
        if estimate.total != receipt.total_amount {
            tracing::warn!(
                booking_id = %booking_id,
                client_total = %estimate.total,
                settled_total = %receipt.total_amount,
                "Settled total differs from client estimate, charging the settled total"
            );
        }
    }
    tracing::info!(booking_id = %booking_id, booking_ref = %receipt.booking_ref, "Booking created");

    let amount = receipt.total_amount;
    state.booking = Some(receipt);

    let Some(user) = state.user.clone() else {
        state.payment = PaymentPhase::Failed {
            booking_id: Some(booking_id),
        };
        state.notice = Some(Notice::error("Please log in again to pay for your booking."));
        return smallvec![CheckoutEffect::ClearSnapshot];
    };

    state.payment = PaymentPhase::Initiating { booking_id };
    smallvec![
        CheckoutEffect::ClearSnapshot,
        CheckoutEffect::InitiatePayment {
            booking_id,
            user_id: user.user_id,
            amount,
            mobile: user.mobile,
            supersede: false,
        },
    ]
}

fn payment_initiated(
    state: &mut CheckoutState,
    booking_id: BookingId,
    transaction_id: String,
    amount: Money,
    redirect_url: String,
) -> Effects<CheckoutEffect> {
    if state.payment != (PaymentPhase::Initiating { booking_id }) {
        tracing::warn!(
            booking_id = %booking_id,
            transaction_id = %transaction_id,
            "Payment initiation for a booking that is not being paid, ignoring"
        );
        return Effects::new();
    }
    state.payment = PaymentPhase::Redirected {
        booking_id,
        transaction_id: transaction_id.clone(),
    };
    smallvec![
        CheckoutEffect::CreatePaymentRecord(PaymentRecord {
            booking_id,
            transaction_id,
            amount,
            status: PaymentStatus::Pending,
        }),
        CheckoutEffect::Navigate { url: redirect_url },
    ]
}

fn payment_returned(
    state: &mut CheckoutState,
    booking_id: BookingId,
    transaction_id: String,
) -> Effects<CheckoutEffect> {
    match &state.payment {
        PaymentPhase::Verifying { transaction_id: polling, .. } if *polling == transaction_id => {
            return Effects::new();
        }
        PaymentPhase::Paid { booking_id: paid, .. } if *paid == booking_id => {
            return Effects::new();
        }
        _ => {}
    }
    state.payment = PaymentPhase::Verifying {
        booking_id,
        transaction_id: transaction_id.clone(),
    };
    state.notice = Some(Notice::info("Confirming your payment..."));
    smallvec![CheckoutEffect::PollPaymentStatus {
        booking_id,
        transaction_id,
    }]
}

fn payment_settled(
    state: &mut CheckoutState,
    booking_id: BookingId,
    transaction_id: String,
    status: GatewayStatus,
    env: &CheckoutEnvironment,
) -> Effects<CheckoutEffect> {
    if let PaymentPhase::Paid { booking_id: paid, .. } = &state.payment {
        if *paid == booking_id && status != GatewayStatus::Success {
            tracing::warn!(
                booking_id = %booking_id,
                transaction_id = %transaction_id,
                status = ?status,
                "Keeping recorded success over a later gateway answer"
            );
            return Effects::new();
        }
    }

    match status {
        GatewayStatus::Success => {
            tracing::info!(booking_id = %booking_id, transaction_id = %transaction_id, "Payment successful");
            let mut effects: Effects<CheckoutEffect> = smallvec![
                CheckoutEffect::UpdatePaymentStatus {
                    booking_id,
                    status: PaymentStatus::Successful,
                },
                CheckoutEffect::ClearSnapshot,
            ];
            if let Some(ticket) = ticket_for(state, booking_id, &transaction_id, env) {
                effects.push(CheckoutEffect::IssueTicket(ticket));
            }
            let reference = state
                .booking
                .as_ref()
                .map_or_else(|| booking_id.to_string(), |b| b.booking_ref.clone());
            state.notice = Some(Notice::info(format!(
                "Payment successful! Your booking {reference} is confirmed."
            )));
            state.payment = PaymentPhase::Paid {
                booking_id,
                transaction_id,
            };
            effects
        }
        GatewayStatus::Failed => {
            tracing::warn!(booking_id = %booking_id, transaction_id = %transaction_id, "Payment failed");
            state.payment = PaymentPhase::Failed {
                booking_id: Some(booking_id),
            };
            state.notice = Some(Notice::error(
                "Payment failed. Your booking is saved, please retry the payment.",
            ));
            smallvec![CheckoutEffect::UpdatePaymentStatus {
                booking_id,
                status: PaymentStatus::Failed,
            }]
        }
        GatewayStatus::Pending => {
            state.payment = PaymentPhase::AwaitingConfirmation {
                booking_id,
                transaction_id,
            };
            state.notice = Some(Notice::info(
                "Your payment is still being processed. Your booking will be confirmed as soon as the bank responds.",
            ));
            Effects::new()
        }
    }
}

fn ticket_for(
    state: &CheckoutState,
    booking_id: BookingId,
    transaction_id: &str,
    env: &CheckoutEnvironment,
) -> Option<crate::notification::TicketPayload> {
    let receipt = state.booking.as_ref().filter(|b| b.booking_id == booking_id)?;
    let event = state.selected_event()?;
    let breakdown = state.breakdown().ok()?;
    let totals = state.totals(env.pricing).ok()?;
    let source = TicketSource {
        cart: &state.cart,
        event,
        slots: &state.slots,
        add_ons: &state.add_ons,
        breakdown: &breakdown,
        totals: &totals,
        receipt,
    };
    match build_ticket(source, transaction_id) {
        Ok(ticket) => Some(ticket),
        Err(error) => {
            tracing::warn!(booking_id = %booking_id, error = %error, "Could not build ticket payload");
            None
        }
    }
}

fn retry_payment(state: &mut CheckoutState) -> Effects<CheckoutEffect> {
    let retryable = matches!(
        state.payment,
        PaymentPhase::Failed { booking_id: Some(_) } | PaymentPhase::AwaitingConfirmation { .. }
    );
    let (Some(booking), Some(user), true) = (state.booking.as_ref(), state.user.as_ref(), retryable) else {
        state.notice = Some(Notice::error("There is no payment to retry for this booking."));
        return Effects::new();
    };

    let booking_id = booking.booking_id;
    tracing::info!(booking_id = %booking_id, "Retrying payment");
    let effect = CheckoutEffect::InitiatePayment {
        booking_id,
        user_id: user.user_id,
        amount: booking.total_amount,
        mobile: user.mobile.clone(),
        supersede: true,
    };
    state.payment = PaymentPhase::Initiating { booking_id };
    state.notice = None;
    smallvec![effect]
}
