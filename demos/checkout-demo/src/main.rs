//! Checkout demo.
//!
//! Walks one session through the three steps, including a login interrupt,
//! pays through a scripted gateway and then reconciles two legacy bookings.
//! Every collaborator is in memory; gateway credentials come from the
//! environment (or `.env`) and fall back to sandbox placeholders.

use anyhow::Context;
use booking_core::checkout::{CheckoutAction, CheckoutEnvironment, CheckoutState, Step};
use booking_core::environment::{Clock, SystemClock};
use booking_core::money::Money;
use booking_core::types::{
    AddOnId, AddOnLine, Booking, BookingId, GameId, GameSelection, PaymentStatus, SlotId,
};
use booking_runtime::{BookingReconciler, CheckoutStore, Collaborators, Config, Outbound, Services};
use booking_testing::{
    InMemoryBookings, InMemorySnapshots, RecordingNotifications, ScriptedGateway, fixtures, test_clock,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,booking_runtime=debug".into()),
        )
        .init();

    let config = load_config()?;
    info!(gateway = ?config.gateway, tax_rate = config.checkout.tax_rate, "Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(test_clock());
    let catalog = Arc::new(fixtures::catalog());
    let bookings = Arc::new(InMemoryBookings::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let snapshots = Arc::new(InMemorySnapshots::new());
    let notifications = Arc::new(RecordingNotifications::new());
    let services = Services::from_config(
        &config,
        Collaborators {
            catalog: catalog.clone(),
            promos: Arc::new(fixtures::promos()),
            bookings: bookings.clone(),
            gateway: gateway.clone(),
            snapshots: snapshots.clone(),
            notifications: notifications.clone(),
            clock: Arc::clone(&clock),
        },
    );
    let environment = CheckoutEnvironment::new(clock, config.checkout.pricing());

    // ========== Step 1 and 2, signed out ==========
    let store = CheckoutStore::new(CheckoutState::new("demo-session"), environment.clone(), services.clone());
    for action in [
        CheckoutAction::Start,
        CheckoutAction::SetParentInfo(fixtures::parent()),
        CheckoutAction::SetChildInfo(fixtures::child()),
        CheckoutAction::SelectCity { city_id: fixtures::CITY_ID },
        CheckoutAction::SelectEvent { event_id: fixtures::EVENT_ID },
        CheckoutAction::ToggleSlot { slot_id: SlotId::new(100) },
        CheckoutAction::ApplyPromo { code: "admin10".to_string() },
        CheckoutAction::AdvanceStep { authenticated: true },
        CheckoutAction::SetAddOn(AddOnLine {
            add_on_id: AddOnId::new(5),
            variant_id: None,
            quantity: 2,
        }),
    ] {
        report(store.send(action).await?);
    }
    report(store.send(CheckoutAction::AdvanceStep { authenticated: false }).await?);

    // ========== Back from login ==========
    let store = CheckoutStore::new(CheckoutState::new("demo-session"), environment, services);
    report(store.send(CheckoutAction::Resume { requested_step: Step::Payment }).await?);
    let (step, totals) = store
        .state(|s| (s.step, s.totals(config.checkout.pricing())))
        .await;
    let totals = totals.context("restored cart cannot be priced")?;
    info!(%step, subtotal = %totals.subtotal, discount = %totals.discount, tax = %totals.tax, total = %totals.total, "Session restored");

    report(store.send(CheckoutAction::AcceptTerms { accepted: true }).await?);
    report(store.send(CheckoutAction::Submit { user: fixtures::user() }).await?);

    // ========== Back from the gateway ==========
    let record = bookings
        .payment_records()
        .into_iter()
        .next()
        .context("no payment was initiated")?;
    gateway.push_status("PAYMENT_PENDING");
    gateway.push_status("PAYMENT_SUCCESS");
    report(
        store
            .send(CheckoutAction::PaymentReturned {
                booking_id: record.booking_id,
                transaction_id: record.transaction_id,
            })
            .await?,
    );
    if let Some(notice) = store.state(|s| s.notice.clone()).await {
        info!(message = %notice.message, "Checkout finished");
    }
    for ticket in notifications.tickets() {
        info!(booking_ref = %ticket.booking_ref, amount = %ticket.amount_paid, games = ticket.games.len(), "Ticket issued");
    }

    // ========== Reconciliation ==========
    let reconciler = BookingReconciler::new(catalog, config.reconciliation, config.checkout.call_timeout);
    let legacy = [legacy_booking(501, 800), legacy_booking(502, 950)];
    let sweep = reconciler.reconcile_pending(&legacy).await;
    for (booking_id, resolution) in &sweep.resolved {
        info!(
            booking_id = %booking_id,
            slot_id = ?resolution.slot_id,
            method = %resolution.method,
            ambiguous = resolution.ambiguous,
            "Booking reconciled"
        );
    }
    Ok(())
}

/// Environment configuration, with sandbox placeholders for missing secrets.
fn load_config() -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("invalid configuration")?;
    if config.gateway.validate().is_err() {
        info!("Gateway credentials not set, using sandbox placeholders");
        config.gateway.merchant_id = "DEMOMERCHANT".to_string();
        config.gateway.salt_key = "demo-salt".to_string();
        config.gateway.salt_index = "1".to_string();
        config.gateway.callback_base_url = "http://localhost:3000".to_string();
    }
    if std::env::var("BOOKING_TAX_RATE").is_err() {
        config.checkout.tax_rate = 0.18;
    }
    Ok(config)
}

fn legacy_booking(id: i64, total: i64) -> Booking {
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
        event_title: fixtures::event().title,
        event_date: fixtures::event_date(),
        game_name: "Running Race".to_string(),
        created_at: SystemClock.now(),
    }
}

fn report(outbound: Vec<Outbound>) {
    for instruction in outbound {
        match instruction {
            Outbound::Navigate { url } => info!(%url, "Redirecting to payment page"),
            Outbound::RedirectToLogin { return_step } => {
                info!(%return_step, "Redirecting to login");
            }
        }
    }
}
