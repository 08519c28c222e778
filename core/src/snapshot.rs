//! Session snapshot saved across an authentication redirect.

use crate::checkout::Step;
use crate::error::{BookingError, Result};
use crate::types::Cart;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current snapshot layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Cart plus the step the user was heading to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Layout version, checked on restore
    pub version: u32,
    /// Step to land on after restore
    pub step: Step,
    /// Full cart
    pub cart: Cart,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Snapshot of `cart` targeting `step`.
    #[must_use]
    pub const fn new(step: Step, cart: Cart, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            step,
            cart,
            saved_at,
        }
    }

    /// Serializes to JSON for key-value storage.
    ///
    /// # Errors
    ///
    /// Returns `Snapshot` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BookingError::Snapshot(e.to_string()))
    }

    /// Decodes a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Snapshot` for malformed JSON or a layout version this build
    /// does not know.
    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(raw).map_err(|e| BookingError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(BookingError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}
