//! Checkout store: runs the checkout reducer and executes its effects.
//!
//! Effects of one reduction run in order and every collaborator result is
//! fed back as an action, until no action is left. This is what sequences
//! booking creation strictly before payment initiation. Effects that leave
//! the process (page navigation, login redirect) are returned to the caller
//! as [`Outbound`] instructions.

use crate::config::Config;
use crate::error::StoreError;
use crate::gateway::PaymentAdapter;
use crate::promo::PromoClient;
use crate::retry::{RetryPolicy, retry_if};
use crate::timed;
use booking_core::checkout::{
    CheckoutAction, CheckoutEffect, CheckoutEnvironment, CheckoutReducer, CheckoutState, Step,
};
use booking_core::environment::{
    BookingService, CatalogService, Clock, NotificationSink, PaymentGateway, PromoService,
    SnapshotStore,
};
use booking_core::error::{BookingError, Result};
use booking_core::reducer::Reducer;
use booking_core::types::GatewayStatus;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

/// Default bound on actions processed by one [`CheckoutStore::send`].
pub const DEFAULT_MAX_ACTIONS_PER_SEND: usize = 64;

/// Instruction for the surface hosting the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Full page navigation, e.g. to the gateway's pay page
    Navigate {
        /// Target URL
        url: String,
    },
    /// Send the user to sign in, returning to `return_step`
    RedirectToLogin {
        /// Step to resume at
        return_step: Step,
    },
}

/// Collaborators the store executes effects against.
#[derive(Clone)]
pub struct Services {
    /// Catalog
    pub catalog: Arc<dyn CatalogService>,
    /// Promo service with timeouts
    pub promos: PromoClient,
    /// Booking persistence
    pub bookings: Arc<dyn BookingService>,
    /// Payment gateway adapter
    pub payments: Arc<PaymentAdapter>,
    /// Session snapshots
    pub snapshots: Arc<dyn SnapshotStore>,
    /// Ticket delivery
    pub notifications: Arc<dyn NotificationSink>,
    /// Timeout of every collaborator call
    pub call_timeout: Duration,
    /// Status polling after the gateway return
    pub polling: RetryPolicy,
    /// Retries of catalog reads
    pub catalog_retry: RetryPolicy,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("promos", &self.promos)
            .field("payments", &self.payments)
            .field("call_timeout", &self.call_timeout)
            .field("polling", &self.polling)
            .field("catalog_retry", &self.catalog_retry)
            .finish_non_exhaustive()
    }
}

/// Raw collaborator implementations, before the runtime wraps them.
pub struct Collaborators {
    /// Catalog
    pub catalog: Arc<dyn CatalogService>,
    /// Promo service
    pub promos: Arc<dyn PromoService>,
    /// Booking persistence
    pub bookings: Arc<dyn BookingService>,
    /// Gateway transport
    pub gateway: Arc<dyn PaymentGateway>,
    /// Session snapshots
    pub snapshots: Arc<dyn SnapshotStore>,
    /// Ticket delivery
    pub notifications: Arc<dyn NotificationSink>,
    /// Clock
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Wires collaborators according to the configuration.
    #[must_use]
    pub fn from_config(config: &Config, collaborators: Collaborators) -> Self {
        let call_timeout = config.checkout.call_timeout;
        Self {
            catalog: collaborators.catalog,
            promos: PromoClient::new(collaborators.promos, Arc::clone(&collaborators.clock), call_timeout),
            bookings: collaborators.bookings,
            payments: Arc::new(PaymentAdapter::new(
                config.gateway.clone(),
                collaborators.gateway,
                collaborators.clock,
                call_timeout,
            )),
            snapshots: collaborators.snapshots,
            notifications: collaborators.notifications,
            call_timeout,
            polling: config.polling.policy.clone(),
            catalog_retry: config.catalog.retry.clone(),
        }
    }
}

enum Outcome {
    Feedback(CheckoutAction),
    Outbound(Outbound),
    Done,
}

/// Runtime coordinator of one checkout session.
pub struct CheckoutStore {
    session_id: String,
    state: Arc<RwLock<CheckoutState>>,
    reducer: CheckoutReducer,
    environment: CheckoutEnvironment,
    services: Services,
    max_actions_per_send: usize,
    /// Actions produced by effects, for observers
    action_broadcast: broadcast::Sender<CheckoutAction>,
}

impl CheckoutStore {
    /// Creates a store for a session.
    #[must_use]
    pub fn new(initial_state: CheckoutState, environment: CheckoutEnvironment, services: Services) -> Self {
        let (action_broadcast, _) = broadcast::channel(16);
        Self {
            session_id: initial_state.session_id.clone(),
            state: Arc::new(RwLock::new(initial_state)),
            reducer: CheckoutReducer,
            environment,
            services,
            max_actions_per_send: DEFAULT_MAX_ACTIONS_PER_SEND,
            action_broadcast,
        }
    }

    /// Changes the bound on actions processed by one `send`.
    #[must_use]
    pub const fn with_max_actions_per_send(mut self, limit: usize) -> Self {
        self.max_actions_per_send = limit;
        self
    }

    /// Session this store drives.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Collaborators of this store.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Subscribes to actions produced by effects.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<CheckoutAction> {
        self.action_broadcast.subscribe()
    }

    /// Reads the current state.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&CheckoutState) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Sends an action and runs every resulting effect to completion.
    ///
    /// Returns the instructions the hosting surface must carry out, in order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FeedbackLimit`] if effects keep producing actions
    /// past the configured bound.
    #[tracing::instrument(skip(self, action), fields(session_id = %self.session_id), name = "checkout_send")]
    pub async fn send(&self, action: CheckoutAction) -> std::result::Result<Vec<Outbound>, StoreError> {
        let mut queue = VecDeque::from([action]);
        let mut outbound = Vec::new();
        let mut processed = 0;

        while let Some(action) = queue.pop_front() {
            if processed == self.max_actions_per_send {
                tracing::error!(limit = self.max_actions_per_send, "Checkout feedback loop did not settle");
                return Err(StoreError::FeedbackLimit {
                    limit: self.max_actions_per_send,
                });
            }
            processed += 1;

            let effects = {
                let mut state = self.state.write().await;
                self.reducer.reduce(&mut state, action, &self.environment)
            };

            for effect in effects {
                metrics::counter!("store.effects.executed", "type" => effect_kind(&effect)).increment(1);
                match self.execute(effect).await {
                    Outcome::Feedback(next) => {
                        // No subscribers is fine
                        let _ = self.action_broadcast.send(next.clone());
                        queue.push_back(next);
                    }
                    Outcome::Outbound(instruction) => outbound.push(instruction),
                    Outcome::Done => {}
                }
            }
        }
        Ok(outbound)
    }

    async fn bounded<T>(&self, future: impl Future<Output = Result<T>>, what: &str) -> Result<T> {
        timed(
            self.services.call_timeout,
            future,
            BookingError::CatalogUnavailable(format!(
                "{what} timed out after {}s",
                self.services.call_timeout.as_secs()
            )),
        )
        .await
    }

    /// Catalog read with timeout, retried while the error is transient.
    async fn fetch<T, Fut>(&self, what: &str, mut call: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        retry_if(
            &self.services.catalog_retry,
            what,
            move || self.bounded(call(), what),
            BookingError::is_retryable,
        )
        .await
    }

    #[allow(clippy::too_many_lines)]
    async fn execute(&self, effect: CheckoutEffect) -> Outcome {
        let services = &self.services;
        match effect {
            CheckoutEffect::FetchCities => Outcome::Feedback(
                match self.fetch("city list", || services.catalog.list_cities()).await {
                    Ok(cities) => CheckoutAction::CitiesLoaded(cities),
                    Err(error) => CheckoutAction::CatalogFailed(error),
                },
            ),
            CheckoutEffect::FetchEvents { city_id } => Outcome::Feedback(
                match self
                    .fetch("event list", || services.catalog.list_events_by_city(city_id))
                    .await
                {
                    Ok(events) => CheckoutAction::EventsLoaded { city_id, events },
                    Err(error) => CheckoutAction::CatalogFailed(error),
                },
            ),
            CheckoutEffect::FetchGames {
                event_id,
                age_months,
            } => Outcome::Feedback(
                match self
                    .fetch("game list", || {
                        services.catalog.list_games_by_event_and_age(event_id, age_months)
                    })
                    .await
                {
                    Ok(slots) => CheckoutAction::GamesLoaded { event_id, slots },
                    Err(error) => CheckoutAction::CatalogFailed(error),
                },
            ),
            CheckoutEffect::FetchAddOns => Outcome::Feedback(
                match self.fetch("add-on list", || services.catalog.list_add_ons()).await {
                    Ok(add_ons) => CheckoutAction::AddOnsLoaded(add_ons),
                    Err(error) => CheckoutAction::CatalogFailed(error),
                },
            ),
            CheckoutEffect::FetchPromos { event_id, game_ids } => {
                let promos = match services.promos.usable_promos(event_id, &game_ids).await {
                    Ok(promos) => promos,
                    Err(error) => {
                        tracing::warn!(event_id = %event_id, error = %error, "Promo list unavailable");
                        Vec::new()
                    }
                };
                Outcome::Feedback(CheckoutAction::PromosLoaded(promos))
            }
            CheckoutEffect::ValidatePromo {
                code,
                event_id,
                game_ids,
                subtotal,
            } => {
                let validation = services
                    .promos
                    .validate(&code, event_id, &game_ids, subtotal)
                    .await;
                Outcome::Feedback(CheckoutAction::PromoValidated { code, validation })
            }
            CheckoutEffect::SaveSnapshot(snapshot) => {
                if let Err(error) = self
                    .bounded(services.snapshots.save(&self.session_id, snapshot), "snapshot save")
                    .await
                {
                    tracing::warn!(error = %error, "Could not save session snapshot");
                }
                Outcome::Done
            }
            CheckoutEffect::LoadSnapshot => {
                let snapshot = match self
                    .bounded(services.snapshots.take(&self.session_id), "snapshot load")
                    .await
                {
                    Ok(snapshot) => snapshot,
                    Err(error) => {
                        tracing::warn!(error = %error, "Could not load session snapshot");
                        None
                    }
                };
                Outcome::Feedback(CheckoutAction::SnapshotLoaded(snapshot))
            }
            CheckoutEffect::ClearSnapshot => {
                if let Err(error) = self
                    .bounded(services.snapshots.clear(&self.session_id), "snapshot clear")
                    .await
                {
                    tracing::warn!(error = %error, "Could not clear session snapshot");
                }
                Outcome::Done
            }
            CheckoutEffect::RedirectToLogin { return_step } => {
                Outcome::Outbound(Outbound::RedirectToLogin { return_step })
            }
            CheckoutEffect::CreateBooking(payload) => {
                let result = timed(
                    services.call_timeout,
                    services.bookings.create_booking(payload),
                    BookingError::BookingRejected(format!(
                        "booking service timed out after {}s",
                        services.call_timeout.as_secs()
                    )),
                )
                .await;
                Outcome::Feedback(match result {
                    Ok(receipt) => CheckoutAction::BookingCreated(receipt),
                    Err(error) => CheckoutAction::BookingFailed(error),
                })
            }
            CheckoutEffect::InitiatePayment {
                booking_id,
                user_id,
                amount,
                mobile,
                supersede,
            } => {
                if supersede {
                    services.payments.supersede(booking_id);
                }
                Outcome::Feedback(
                    match services
                        .payments
                        .initiate(booking_id, user_id, amount, &mobile)
                        .await
                    {
                        Ok(initiation) => CheckoutAction::PaymentInitiated {
                            booking_id,
                            transaction_id: initiation.attempt.transaction_id,
                            amount: initiation.attempt.amount,
                            redirect_url: initiation.redirect_url,
                        },
                        Err(error) => CheckoutAction::PaymentFailed(error),
                    },
                )
            }
            CheckoutEffect::CreatePaymentRecord(record) => {
                let booking_id = record.booking_id;
                if let Err(error) = self
                    .bounded(services.bookings.create_payment_record(record), "payment record")
                    .await
                {
                    tracing::error!(booking_id = %booking_id, error = %error, "Could not write payment record");
                }
                Outcome::Done
            }
            CheckoutEffect::PollPaymentStatus {
                booking_id,
                transaction_id,
            } => {
                let status = match services
                    .payments
                    .poll_until_terminal(&transaction_id, &services.polling)
                    .await
                {
                    Ok(status) => status,
                    Err(error) => {
                        tracing::warn!(
                            booking_id = %booking_id,
                            transaction_id = %transaction_id,
                            error = %error,
                            "Status polling failed, leaving payment pending"
                        );
                        GatewayStatus::Pending
                    }
                };
                Outcome::Feedback(CheckoutAction::PaymentSettled {
                    booking_id,
                    transaction_id,
                    status,
                })
            }
            CheckoutEffect::UpdatePaymentStatus { booking_id, status } => {
                if let Err(error) = self
                    .bounded(
                        services.bookings.update_payment_status(booking_id, status),
                        "payment status update",
                    )
                    .await
                {
                    tracing::error!(
                        booking_id = %booking_id,
                        status = ?status,
                        error = %error,
                        "Could not update booking payment status"
                    );
                }
                Outcome::Done
            }
            CheckoutEffect::IssueTicket(ticket) => {
                let booking_ref = ticket.booking_ref.clone();
                if let Err(error) = self
                    .bounded(services.notifications.ticket_issued(ticket), "ticket delivery")
                    .await
                {
                    tracing::warn!(booking_ref = %booking_ref, error = %error, "Ticket delivery failed");
                }
                Outcome::Done
            }
            CheckoutEffect::Navigate { url } => Outcome::Outbound(Outbound::Navigate { url }),
        }
    }
}

const fn effect_kind(effect: &CheckoutEffect) -> &'static str {
    match effect {
        CheckoutEffect::FetchCities => "fetch_cities",
        CheckoutEffect::FetchEvents { .. } => "fetch_events",
        CheckoutEffect::FetchGames { .. } => "fetch_games",
        CheckoutEffect::FetchAddOns => "fetch_add_ons",
        CheckoutEffect::FetchPromos { .. } => "fetch_promos",
        CheckoutEffect::ValidatePromo { .. } => "validate_promo",
        CheckoutEffect::SaveSnapshot(_) => "save_snapshot",
        CheckoutEffect::LoadSnapshot => "load_snapshot",
        CheckoutEffect::ClearSnapshot => "clear_snapshot",
        CheckoutEffect::RedirectToLogin { .. } => "redirect_to_login",
        CheckoutEffect::CreateBooking(_) => "create_booking",
        CheckoutEffect::InitiatePayment { .. } => "initiate_payment",
        CheckoutEffect::CreatePaymentRecord(_) => "create_payment_record",
        CheckoutEffect::PollPaymentStatus { .. } => "poll_payment_status",
        CheckoutEffect::UpdatePaymentStatus { .. } => "update_payment_status",
        CheckoutEffect::IssueTicket(_) => "issue_ticket",
        CheckoutEffect::Navigate { .. } => "navigate",
    }
}
