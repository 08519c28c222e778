//! Store wiring shared by the runtime integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use booking_core::checkout::{CheckoutEnvironment, CheckoutState};
use booking_runtime::{CheckoutStore, Collaborators, Config, GatewayConfig, RetryPolicy, Services};
use booking_testing::{
    InMemoryBookings, InMemoryCatalog, InMemoryPromos, InMemorySnapshots, RecordingNotifications,
    ScriptedGateway, fixtures, test_clock,
};
use std::sync::Arc;
use std::time::Duration;

/// Sandbox credentials; never sent anywhere in tests.
pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        merchant_id: "MERCHANTUAT".to_string(),
        salt_key: "test-salt-key".to_string(),
        salt_index: "1".to_string(),
        callback_base_url: "https://nibog.example".to_string(),
        ..GatewayConfig::default()
    }
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.gateway = gateway_config();
    config.checkout.tax_rate = 0.18;
    config.checkout.call_timeout = Duration::from_secs(5);
    config.polling.policy = RetryPolicy::new()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(20));
    config.catalog.retry = RetryPolicy::new()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5));
    config
}

/// Every collaborator, kept so tests can inspect what the store did.
pub struct Harness {
    pub config: Config,
    pub catalog: Arc<InMemoryCatalog>,
    pub promos: Arc<InMemoryPromos>,
    pub bookings: Arc<InMemoryBookings>,
    pub gateway: Arc<ScriptedGateway>,
    pub snapshots: Arc<InMemorySnapshots>,
    pub notifications: Arc<RecordingNotifications>,
}

impl Harness {
    pub fn new() -> Self {
        booking_testing::init_test_tracing();
        Self {
            config: config(),
            catalog: Arc::new(fixtures::catalog()),
            promos: Arc::new(fixtures::promos()),
            bookings: Arc::new(InMemoryBookings::new()),
            gateway: Arc::new(ScriptedGateway::new()),
            snapshots: Arc::new(InMemorySnapshots::new()),
            notifications: Arc::new(RecordingNotifications::new()),
        }
    }

    pub fn services(&self) -> Services {
        Services::from_config(
            &self.config,
            Collaborators {
                catalog: self.catalog.clone(),
                promos: self.promos.clone(),
                bookings: self.bookings.clone(),
                gateway: self.gateway.clone(),
                snapshots: self.snapshots.clone(),
                notifications: self.notifications.clone(),
                clock: Arc::new(test_clock()),
            },
        )
    }

    /// A fresh store for `session_id` sharing this harness's collaborators.
    pub fn store(&self, session_id: &str) -> CheckoutStore {
        CheckoutStore::new(
            CheckoutState::new(session_id),
            CheckoutEnvironment::new(Arc::new(test_clock()), self.config.checkout.pricing()),
            self.services(),
        )
    }
}
