//! # Booking Testing
//!
//! Testing utilities for the booking core and runtime.
//!
//! This crate provides:
//! - In-memory implementations of every collaborator trait
//! - A fixed clock and catalog fixtures
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```
//! use booking_testing::{fixtures, test_clock};
//! use booking_core::environment::{CatalogService, Clock};
//!
//! let catalog = fixtures::catalog();
//! let cities = futures::executor::block_on(catalog.list_cities()).unwrap_or_default();
//! assert_eq!(cities[0].name, "Pune");
//! assert_eq!(test_clock().now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
//! ```

/// Catalog and customer fixtures
pub mod fixtures;

/// In-memory collaborators
pub mod mocks;


pub use mocks::{
    FixedClock, InMemoryBookings, InMemoryCatalog, InMemoryPromos, InMemorySnapshots,
    RecordingNotifications, ScriptedGateway, test_clock,
};
pub use reducer_test::{ReducerTest, assertions};

/// Installs a test-friendly `tracing` subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
