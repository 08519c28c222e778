//! Promo code filtering and the apply/reject decision.
//!
//! Discount amounts are computed by the promo service. This module decides
//! which listed codes are usable and whether a validation answer may be
//! applied to the cart.

use crate::error::{BookingError, Result};
use crate::money::{Money, round2};
use crate::types::{AppliedPromo, Discount, PromoCode, PromoCodeRecord, PromoValidation};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parses a promo expiry.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) and a bare `YYYY-MM-DD`,
/// which is valid until the end of that day.
#[must_use]
pub fn parse_valid_to(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(at.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|end_of_day| end_of_day.and_utc())
}

/// Keeps the codes that are active and not expired at `now`.
///
/// Records with an unreadable expiry are dropped, never reported as errors.
#[must_use]
pub fn filter_usable(records: Vec<PromoCodeRecord>, now: DateTime<Utc>) -> Vec<PromoCode> {
    records
        .into_iter()
        .filter_map(|record| {
            let Some(valid_to) = parse_valid_to(&record.valid_to) else {
                tracing::debug!(
                    code = %record.code,
                    valid_to = %record.valid_to,
                    "Dropping promo code with unreadable expiry"
                );
                return None;
            };
            (record.is_active && valid_to >= now).then(|| PromoCode {
                code: record.code,
                valid_to,
                is_active: record.is_active,
                discount: record.discount,
                description: record.description,
            })
        })
        .collect()
}

/// Decides whether a validation answer is applied.
///
/// The discount is applied only when the service marked the code valid, the
/// code is the one that was sent (case-insensitive) and the amount is a
/// positive number. The result is clamped to `subtotal`.
///
/// # Errors
///
/// Returns `PromoInvalid` carrying the service's message, or a generic
/// reason when the answer is unusable.
pub fn decide(code: &str, validation: &PromoValidation, subtotal: Money) -> Result<AppliedPromo> {
    let reject = |reason: &str| BookingError::PromoInvalid {
        code: code.to_string(),
        reason: reason.to_string(),
    };

    if !validation.is_valid {
        let reason = validation
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("This code cannot be used for your selection");
        return Err(reject(reason));
    }

    let discount = Money::from_major(round2(validation.discount_amount))
        .filter(|d| d.is_positive())
        .ok_or_else(|| reject("This code gives no discount on your selection"))?;

    Ok(AppliedPromo {
        code: code.trim().to_uppercase(),
        discount: discount.min(subtotal),
    })
}

/// `true` when `candidate` names the same code as `code`.
#[must_use]
pub fn same_code(code: &str, candidate: &str) -> bool {
    code.trim().eq_ignore_ascii_case(candidate.trim())
}

impl PromoCode {
    /// Local estimate of the discount, shown before the service confirms it.
    #[must_use]
    pub fn estimate_discount(&self, subtotal: Money) -> Money {
        match self.discount {
            Discount::Percentage(pct) => subtotal.scale(pct / 100.0).min(subtotal),
            Discount::Fixed(amount) => amount.min(subtotal),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(code: &str, valid_to: &str, is_active: bool) -> PromoCodeRecord {
        PromoCodeRecord {
            code: code.to_string(),
            valid_to: valid_to.to_string(),
            is_active,
            discount: Discount::Percentage(10.0),
            description: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_supported_formats() {
        assert_eq!(
            parse_valid_to("2025-06-30T10:00:00+05:30"),
            Some(Utc.with_ymd_and_hms(2025, 6, 30, 4, 30, 0).unwrap())
        );
        assert_eq!(
            parse_valid_to("2025-06-30 10:00:00"),
            Some(Utc.with_ymd_and_hms(2025, 6, 30, 10, 0, 0).unwrap())
        );
        assert_eq!(
            parse_valid_to("2025-06-01"),
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 23, 59, 59).unwrap())
        );
        assert_eq!(parse_valid_to("next tuesday"), None);
    }

    #[test]
    fn filter_keeps_active_unexpired_codes() {
        let records = vec![
            record("SUMMER", "2025-12-31", true),
            record("EXPIRED", "2025-05-31", false),
            record("OLD", "2025-05-01T00:00:00Z", true),
            record("OFF", "2025-12-31", false),
            record("BROKEN", "31/12/2025", true),
            record("TODAY", "2025-06-01", true),
        ];
        let codes: Vec<String> = filter_usable(records, now())
            .into_iter()
            .map(|p| p.code)
            .collect();
        assert_eq!(codes, vec!["SUMMER", "TODAY"]);
    }

    #[test]
    fn valid_answer_is_applied() {
        let validation = PromoValidation {
            is_valid: true,
            discount_amount: 100.0,
            message: None,
        };
        let applied = decide("admin10", &validation, Money::from_major_units(1000)).unwrap();
        assert_eq!(applied.code, "ADMIN10");
        assert_eq!(applied.discount, Money::from_major_units(100));
    }

    #[test]
    fn rejection_carries_service_message() {
        let validation = PromoValidation {
            is_valid: false,
            discount_amount: 0.0,
            message: Some("Code expired".to_string()),
        };
        let err = decide("OLD", &validation, Money::from_major_units(1000)).unwrap_err();
        assert_eq!(
            err,
            BookingError::PromoInvalid {
                code: "OLD".to_string(),
                reason: "Code expired".to_string()
            }
        );
    }

    #[test]
    fn unusable_amounts_are_rejected() {
        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let validation = PromoValidation {
                is_valid: true,
                discount_amount: amount,
                message: None,
            };
            assert!(decide("X", &validation, Money::from_major_units(1000)).is_err());
        }
    }

    #[test]
    fn discount_is_clamped_to_subtotal() {
        let validation = PromoValidation {
            is_valid: true,
            discount_amount: 5000.0,
            message: None,
        };
        let applied = decide("BIG", &validation, Money::from_major_units(1200)).unwrap();
        assert_eq!(applied.discount, Money::from_major_units(1200));
    }

    #[test]
    fn estimates_match_discount_kind() {
        let mut promo = filter_usable(vec![record("TEN", "2025-12-31", true)], now())
            .pop()
            .unwrap();
        assert_eq!(
            promo.estimate_discount(Money::from_major_units(1000)),
            Money::from_major_units(100)
        );
        promo.discount = Discount::Fixed(Money::from_major_units(250));
        assert_eq!(
            promo.estimate_discount(Money::from_major_units(200)),
            Money::from_major_units(200)
        );
    }

    #[test]
    fn codes_compare_case_insensitively() {
        assert!(same_code(" admin10 ", "ADMIN10"));
        assert!(!same_code("ADMIN10", "ADMIN1"));
    }
}
