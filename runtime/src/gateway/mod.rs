//! Payment gateway adapter.
//!
//! Turns a booking into a signed gateway request, keeps at most one pending
//! attempt per booking, and maps the gateway's status vocabulary onto
//! [`GatewayStatus`]. The transport is the [`PaymentGateway`] trait;
//! [`http::HttpPaymentGateway`] is the production implementation.
//!
//! ## Integrity token
//!
//! ```text
//! request  = base64(canonical JSON)
//! X-VERIFY = hex(sha256(request + endpoint + salt_key)) + "###" + salt_index
//! ```

pub mod http;

use crate::config::GatewayConfig;
use crate::retry::RetryPolicy;
use crate::timed;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use booking_core::environment::{Clock, PaymentGateway, SignedPayload};
use booking_core::error::{BookingError, Result};
use booking_core::money::Money;
use booking_core::types::{BookingId, GatewayStatus, PaymentAttempt, UserId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Endpoint of the pay request.
pub const PAY_ENDPOINT: &str = "/pg/v1/pay";

/// Endpoint of the status query for a transaction.
#[must_use]
pub fn status_endpoint(merchant_id: &str, transaction_id: &str) -> String {
    format!("/pg/v1/status/{merchant_id}/{transaction_id}")
}

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 4;

/// Maps the gateway's raw state onto [`GatewayStatus`].
///
/// Unknown values are treated as failures.
#[must_use]
pub fn map_gateway_state(raw: &str) -> GatewayStatus {
    match raw.trim().to_ascii_uppercase().as_str() {
        "PAYMENT_SUCCESS" | "COMPLETED" | "SUCCESS" => GatewayStatus::Success,
        "PAYMENT_PENDING" | "PENDING" | "INITIATED" => GatewayStatus::Pending,
        "PAYMENT_ERROR" | "PAYMENT_DECLINED" | "FAILED" | "TIMED_OUT" | "CANCELLED" => {
            GatewayStatus::Failed
        }
        other => {
            tracing::warn!(state = other, "Unknown gateway state, treating as failed");
            GatewayStatus::Failed
        }
    }
}

/// `hex(sha256(parts...)) + "###" + salt_index`
fn checksum(parts: &[&str], salt_index: &str) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    format!("{:x}###{salt_index}", hasher.finalize())
}

/// Integrity token for a pay request.
#[must_use]
pub fn integrity_token(request_b64: &str, endpoint: &str, salt_key: &str, salt_index: &str) -> String {
    checksum(&[request_b64, endpoint, salt_key], salt_index)
}

/// Integrity token for a status query, which has no body.
#[must_use]
pub fn status_token(config: &GatewayConfig, transaction_id: &str) -> String {
    let endpoint = status_endpoint(&config.merchant_id, transaction_id);
    checksum(&[&endpoint, &config.salt_key], &config.salt_index)
}

/// Canonical pay request. Field order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    /// Merchant id
    pub merchant_id: String,
    /// Transaction id of this attempt
    pub merchant_transaction_id: String,
    /// Payer id on the merchant side
    pub merchant_user_id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Where the user lands after paying
    pub redirect_url: String,
    /// How the user is sent back
    pub redirect_mode: String,
    /// Server-to-server callback
    pub callback_url: String,
    /// Payer mobile
    pub mobile_number: String,
    /// Hosted pay page
    pub payment_instrument: PaymentInstrument,
}

/// Payment instrument of a pay request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    /// Instrument kind
    #[serde(rename = "type")]
    pub kind: String,
}

/// A started payment: where to send the user and the attempt recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Initiation {
    /// Gateway page to redirect the user to
    pub redirect_url: String,
    /// The pending attempt
    pub attempt: PaymentAttempt,
}

/// Outcome carried by a verified server-to-server callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackNotice {
    /// Transaction the callback is about
    pub transaction_id: String,
    /// Mapped status
    pub status: GatewayStatus,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    code: String,
    data: CallbackData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackData {
    merchant_transaction_id: String,
    state: Option<String>,
}

/// Latest attempt per booking.
///
/// Pending attempts stay until they settle or are superseded. Failed ones
/// are dropped at once since they never block a new attempt. Successful ones
/// are kept to refuse a second payment, up to `settled_capacity` bookings,
/// oldest evicted first.
#[derive(Debug)]
struct AttemptRegistry {
    attempts: HashMap<BookingId, PaymentAttempt>,
    settled: VecDeque<BookingId>,
    settled_capacity: usize,
}

impl AttemptRegistry {
    fn new(settled_capacity: usize) -> Self {
        Self {
            attempts: HashMap::new(),
            settled: VecDeque::new(),
            settled_capacity: settled_capacity.max(1),
        }
    }

    fn get(&self, booking_id: BookingId) -> Option<&PaymentAttempt> {
        self.attempts.get(&booking_id)
    }

    fn insert(&mut self, attempt: PaymentAttempt) {
        self.attempts.insert(attempt.booking_id, attempt);
    }

    fn remove(&mut self, booking_id: BookingId) -> Option<PaymentAttempt> {
        self.attempts.remove(&booking_id)
    }

    /// Applies `status` to the attempt of `transaction_id`, keeping a
    /// recorded success. Returns the status in effect.
    fn record(&mut self, transaction_id: &str, status: GatewayStatus) -> GatewayStatus {
        let Some(attempt) = self
            .attempts
            .values_mut()
            .find(|a| a.transaction_id == transaction_id)
        else {
            return status;
        };
        let booking_id = attempt.booking_id;
        match (attempt.gateway_state, status) {
            (GatewayStatus::Success, GatewayStatus::Success) => GatewayStatus::Success,
            (GatewayStatus::Success, reported) => {
                tracing::warn!(
                    booking_id = %booking_id,
                    transaction_id,
                    reported = ?reported,
                    "Gateway reported a downgrade of a recorded success, keeping success"
                );
                GatewayStatus::Success
            }
            (_, GatewayStatus::Failed) => {
                self.attempts.remove(&booking_id);
                GatewayStatus::Failed
            }
            (_, GatewayStatus::Success) => {
                attempt.gateway_state = GatewayStatus::Success;
                self.settled.push_back(booking_id);
                while self.settled.len() > self.settled_capacity {
                    if let Some(oldest) = self.settled.pop_front() {
                        self.attempts.remove(&oldest);
                    }
                }
                GatewayStatus::Success
            }
            (_, GatewayStatus::Pending) => GatewayStatus::Pending,
        }
    }

    fn len(&self) -> usize {
        self.attempts.len()
    }
}

/// Payment gateway adapter.
///
/// Holds the registry of the latest attempt per booking. The registry lock
/// is never held across an `.await`.
pub struct PaymentAdapter {
    config: GatewayConfig,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
    attempts: Mutex<AttemptRegistry>,
}

impl std::fmt::Debug for PaymentAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentAdapter")
            .field("config", &self.config)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl PaymentAdapter {
    /// Creates an adapter over a gateway transport.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        call_timeout: Duration,
    ) -> Self {
        let attempts = Mutex::new(AttemptRegistry::new(config.settled_attempt_capacity));
        Self {
            config,
            gateway,
            clock,
            call_timeout,
            attempts,
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, AttemptRegistry> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_configured(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| BookingError::GatewayConfig(e.to_string()))
    }

    /// Generates `{prefix}{booking_id}T{unix_millis}{4 alnum}`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::TransactionIdTooLong`] instead of truncating
    /// when the id exceeds the gateway's ceiling.
    pub fn generate_transaction_id(&self, booking_id: BookingId) -> Result<String> {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
            .collect();
        let id = format!(
            "{}{}T{}{}",
            self.config.transaction_prefix,
            booking_id,
            self.clock.now().timestamp_millis(),
            suffix
        );
        if id.len() > self.config.max_transaction_id_len {
            tracing::error!(
                booking_id = %booking_id,
                len = id.len(),
                max = self.config.max_transaction_id_len,
                "Generated transaction id is too long"
            );
            return Err(BookingError::TransactionIdTooLong {
                len: id.len(),
                max: self.config.max_transaction_id_len,
            });
        }
        Ok(id)
    }

    /// Builds the canonical request of an attempt.
    #[must_use]
    pub fn pay_request(
        &self,
        booking_id: BookingId,
        transaction_id: &str,
        user_id: UserId,
        amount: Money,
        mobile: &str,
    ) -> PayRequest {
        let base = self.config.callback_base_url.trim_end_matches('/');
        PayRequest {
            merchant_id: self.config.merchant_id.clone(),
            merchant_transaction_id: transaction_id.to_string(),
            merchant_user_id: format!("U{user_id}"),
            amount: amount.minor(),
            redirect_url: format!(
                "{base}/payment-callback?bookingId={booking_id}&transactionId={transaction_id}"
            ),
            redirect_mode: "REDIRECT".to_string(),
            callback_url: format!("{base}/api/payments/callback"),
            mobile_number: mobile.chars().filter(char::is_ascii_digit).collect(),
            payment_instrument: PaymentInstrument {
                kind: "PAY_PAGE".to_string(),
            },
        }
    }

    /// Encodes and signs a pay request.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Gateway`] if the request cannot be serialized.
    pub fn sign(&self, request: &PayRequest) -> Result<SignedPayload> {
        let json = serde_json::to_string(request).map_err(|e| BookingError::Gateway(e.to_string()))?;
        let encoded = STANDARD.encode(json);
        let checksum = integrity_token(
            &encoded,
            PAY_ENDPOINT,
            &self.config.salt_key,
            &self.config.salt_index,
        );
        Ok(SignedPayload {
            endpoint: PAY_ENDPOINT.to_string(),
            request: encoded,
            checksum,
            transaction_id: request.merchant_transaction_id.clone(),
        })
    }

    /// Starts a payment attempt for a booking.
    ///
    /// # Errors
    ///
    /// - [`BookingError::GatewayConfig`] when the gateway is not configured (no network call)
    /// - [`BookingError::Validation`] for a non-positive amount or an already paid booking
    /// - [`BookingError::AttemptInFlight`] while another attempt of the booking is pending
    /// - [`BookingError::TransactionIdTooLong`], [`BookingError::GatewayTimeout`], [`BookingError::Gateway`]
    #[tracing::instrument(skip_all, fields(booking_id = %booking_id, amount = %amount))]
    pub async fn initiate(
        &self,
        booking_id: BookingId,
        user_id: UserId,
        amount: Money,
        mobile: &str,
    ) -> Result<Initiation> {
        self.ensure_configured()?;
        if !amount.is_positive() {
            return Err(BookingError::validation("amount", "Payment amount must be positive"));
        }

        let transaction_id = self.generate_transaction_id(booking_id)?;
        let request = self.pay_request(booking_id, &transaction_id, user_id, amount, mobile);
        let payload = self.sign(&request)?;
        let attempt = PaymentAttempt {
            transaction_id: transaction_id.clone(),
            booking_id,
            amount,
            gateway_state: GatewayStatus::Pending,
            created_at: self.clock.now(),
        };

        {
            let mut registry = self.registry();
            if let Some(existing) = registry.get(booking_id) {
                match existing.gateway_state {
                    GatewayStatus::Pending => {
                        return Err(BookingError::AttemptInFlight {
                            booking_id,
                            transaction_id: existing.transaction_id.clone(),
                        });
                    }
                    GatewayStatus::Success => {
                        return Err(BookingError::validation(
                            "payment",
                            "This booking is already paid",
                        ));
                    }
                    GatewayStatus::Failed => {}
                }
            }
            registry.insert(attempt.clone());
        }

        let result = timed(
            self.call_timeout,
            self.gateway.initiate_payment(payload),
            BookingError::GatewayTimeout {
                seconds: self.call_timeout.as_secs(),
            },
        )
        .await;

        match result {
            Ok(redirect_url) => {
                metrics::counter!("payment.initiated", "outcome" => "ok").increment(1);
                tracing::info!(transaction_id = %transaction_id, "Payment initiated");
                Ok(Initiation {
                    redirect_url,
                    attempt,
                })
            }
            Err(error) => {
                metrics::counter!("payment.initiated", "outcome" => "error").increment(1);
                tracing::warn!(transaction_id = %transaction_id, error = %error, "Payment initiation failed");
                let mut registry = self.registry();
                if registry
                    .get(booking_id)
                    .is_some_and(|a| a.transaction_id == transaction_id)
                {
                    registry.remove(booking_id);
                }
                Err(error)
            }
        }
    }

    /// Abandons the pending attempt of a booking so a new one can start.
    ///
    /// Returns the abandoned attempt. A successful attempt is never abandoned.
    pub fn supersede(&self, booking_id: BookingId) -> Option<PaymentAttempt> {
        let mut registry = self.registry();
        let pending = registry
            .get(booking_id)
            .is_some_and(|a| a.gateway_state == GatewayStatus::Pending);
        if !pending {
            return None;
        }
        let abandoned = registry.remove(booking_id);
        if let Some(attempt) = &abandoned {
            tracing::info!(
                booking_id = %booking_id,
                transaction_id = %attempt.transaction_id,
                "Superseding pending payment attempt"
            );
        }
        abandoned
    }

    /// Latest attempt tracked for a booking.
    ///
    /// `None` once a failed attempt has been dropped or a settled one has
    /// been evicted.
    #[must_use]
    pub fn attempt_for(&self, booking_id: BookingId) -> Option<PaymentAttempt> {
        self.registry().get(booking_id).cloned()
    }

    /// Number of bookings with a tracked attempt.
    #[must_use]
    pub fn tracked_attempts(&self) -> usize {
        self.registry().len()
    }

    fn record_status(&self, transaction_id: &str, status: GatewayStatus) -> GatewayStatus {
        self.registry().record(transaction_id, status)
    }

    /// Queries the gateway once.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::GatewayConfig`], [`BookingError::GatewayTimeout`]
    /// or [`BookingError::Gateway`].
    pub async fn check_status(&self, transaction_id: &str) -> Result<GatewayStatus> {
        self.ensure_configured()?;
        let raw = timed(
            self.call_timeout,
            self.gateway.query_status(transaction_id),
            BookingError::GatewayTimeout {
                seconds: self.call_timeout.as_secs(),
            },
        )
        .await?;
        let status = self.record_status(transaction_id, map_gateway_state(&raw));
        metrics::counter!("payment.status", "status" => status_label(status)).increment(1);
        tracing::debug!(transaction_id, raw = %raw, status = ?status, "Payment status checked");
        Ok(status)
    }

    /// Polls until the attempt is terminal or the policy's attempts run out.
    ///
    /// Returns `Pending` when the budget is exhausted. Transient gateway
    /// errors count as a pending poll.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error.
    pub async fn poll_until_terminal(
        &self,
        transaction_id: &str,
        policy: &RetryPolicy,
    ) -> Result<GatewayStatus> {
        let mut attempt = 0;
        loop {
            match self.check_status(transaction_id).await {
                Ok(status) if status.is_terminal() => return Ok(status),
                Ok(_) => {}
                Err(error) if error.is_retryable() => {
                    tracing::warn!(transaction_id, attempt, error = %error, "Status poll failed");
                }
                Err(error) => return Err(error),
            }
            if !policy.should_retry(attempt + 1) {
                tracing::info!(transaction_id, polls = attempt + 1, "Payment still pending after polling");
                return Ok(GatewayStatus::Pending);
            }
            tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    /// Verifies a server-to-server callback and records its status.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] when the token does not match,
    /// [`BookingError::Gateway`] when the body cannot be decoded.
    pub fn verify_callback(&self, body_b64: &str, x_verify: &str) -> Result<CallbackNotice> {
        self.ensure_configured()?;
        let expected = checksum(&[body_b64, &self.config.salt_key], &self.config.salt_index);
        if expected != x_verify.trim() {
            tracing::warn!("Rejected payment callback with a bad integrity token");
            return Err(BookingError::validation("x_verify", "Callback signature mismatch"));
        }
        let decoded = STANDARD
            .decode(body_b64.trim())
            .map_err(|e| BookingError::Gateway(format!("callback body is not base64: {e}")))?;
        let body: CallbackBody = serde_json::from_slice(&decoded)
            .map_err(|e| BookingError::Gateway(format!("callback body is not valid JSON: {e}")))?;

        let raw = body.data.state.as_deref().unwrap_or(&body.code);
        let status = self.record_status(&body.data.merchant_transaction_id, map_gateway_state(raw));
        Ok(CallbackNotice {
            transaction_id: body.data.merchant_transaction_id,
            status,
        })
    }
}

const fn status_label(status: GatewayStatus) -> &'static str {
    match status {
        GatewayStatus::Success => "success",
        GatewayStatus::Pending => "pending",
        GatewayStatus::Failed => "failed",
    }
}
