//! Booking-to-slot reconciliation.
//!
//! A settled payment has to be attached to exactly one slot, but older
//! bookings only carry the event title, event date, game name, total and
//! creation time. Resolution runs an ordered chain:
//!
//! 1. direct: the booking already names its slot
//! 2. event and game: slots of the matching `(event, game)` pair
//! 3. price: slot price within a tolerance of the booking total
//! 4. custom title: slots renamed for a specific variant
//! 5. temporal: slot created close to the booking
//! 6. fallback: most recently created candidate, flagged as ambiguous
//!
//! Each step runs only while more than one candidate is left. Steps 3 to 5
//! never empty the set: a step that would eliminate every candidate is
//! skipped. Resolution never fails.

use crate::money::Money;
use crate::types::{Booking, EventId, EventSummary, GameId, Slot, SlotId};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tunables for the heuristic steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// Maximum absolute difference between slot price and booking total
    pub price_tolerance: Money,
    /// Maximum distance between slot and booking creation
    pub temporal_window: Duration,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            price_tolerance: Money::from_major_units(2),
            temporal_window: Duration::hours(24),
        }
    }
}

/// What is known about the booking being reconciled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFacts {
    /// Booking reference, for audit logs
    pub booking_ref: String,
    /// Slot link, when recorded
    pub slot_id: Option<SlotId>,
    /// Event title as stored on the booking
    pub event_title: String,
    /// Event date as stored on the booking
    pub event_date: NaiveDate,
    /// Game name as stored on the booking
    pub game_name: String,
    /// Settled total
    pub total_amount: Money,
    /// When the booking was created
    pub created_at: DateTime<Utc>,
}

impl From<&Booking> for BookingFacts {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_ref: booking.booking_ref.clone(),
            slot_id: booking.game_selections.iter().find_map(|g| g.slot_id),
            event_title: booking.event_title.clone(),
            event_date: booking.event_date,
            game_name: booking.game_name.clone(),
            total_amount: booking.total_amount,
            created_at: booking.created_at,
        }
    }
}

/// A slot under consideration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Slot id
    pub slot_id: SlotId,
    /// Event of the slot
    pub event_id: EventId,
    /// Game of the slot
    pub game_id: GameId,
    /// Catalog game name
    pub game_name: String,
    /// Slot-specific title
    pub custom_title: Option<String>,
    /// Effective price
    pub price: Money,
    /// Slot creation time
    pub created_at: DateTime<Utc>,
}

impl From<&Slot> for Candidate {
    fn from(slot: &Slot) -> Self {
        Self {
            slot_id: slot.slot_id,
            event_id: slot.event_id,
            game_id: slot.game_id,
            game_name: slot.game_name.clone(),
            custom_title: slot.custom_title.clone(),
            price: slot.effective_price(),
            created_at: slot.created_at,
        }
    }
}

/// Step that produced the answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Slot id was on the booking
    Direct,
    /// Single slot for the event and game
    EventGame,
    /// Single slot within the price tolerance
    Price,
    /// Single slot with a custom title
    CustomTitle,
    /// Single slot created near the booking
    Temporal,
    /// Most recent of several candidates
    Fallback,
    /// The catalog has no slot for the event
    Unresolved,
}

impl MatchMethod {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::EventGame => "event_game",
            Self::Price => "price",
            Self::CustomTitle => "custom_title",
            Self::Temporal => "temporal",
            Self::Fallback => "fallback",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Chosen slot; `None` only when the event has no slots at all
    pub slot_id: Option<SlotId>,
    /// Step that decided
    pub method: MatchMethod,
    /// The answer is a guess and should be audited
    pub ambiguous: bool,
    /// Candidates after event and game narrowing
    pub candidates_considered: usize,
}

/// A narrowing step of the chain.
pub type NarrowingStep = fn(&[Candidate], &BookingFacts, &ReconciliationConfig) -> Vec<Candidate>;

/// Heuristic steps in the order they run.
pub const NARROWING_CHAIN: [(MatchMethod, NarrowingStep); 3] = [
    (MatchMethod::Price, by_price),
    (MatchMethod::CustomTitle, by_custom_title),
    (MatchMethod::Temporal, by_created_near),
];

/// Keeps candidates priced within the tolerance of the booking total.
#[must_use]
pub fn by_price(
    candidates: &[Candidate],
    facts: &BookingFacts,
    config: &ReconciliationConfig,
) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| c.price.abs_diff(facts.total_amount) <= config.price_tolerance)
        .cloned()
        .collect()
}

/// Keeps candidates with a non-empty custom title different from the game name.
#[must_use]
pub fn by_custom_title(
    candidates: &[Candidate],
    _facts: &BookingFacts,
    _config: &ReconciliationConfig,
) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| {
            c.custom_title.as_deref().is_some_and(|title| {
                let title = title.trim();
                !title.is_empty() && !title.eq_ignore_ascii_case(c.game_name.trim())
            })
        })
        .cloned()
        .collect()
}

/// Keeps candidates created within the window around the booking.
#[must_use]
pub fn by_created_near(
    candidates: &[Candidate],
    facts: &BookingFacts,
    config: &ReconciliationConfig,
) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| (c.created_at - facts.created_at).abs() <= config.temporal_window)
        .cloned()
        .collect()
}

/// Most recently created candidate; ties go to the higher slot id.
#[must_use]
pub fn most_recent(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.slot_id.cmp(&b.slot_id)))
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Slots of the booked `(event, game)` pair.
///
/// Events are matched on title and date, games on name. When no slot of the
/// matched events carries the booked game name, every slot of those events
/// is a candidate. The result is sorted by slot id.
#[must_use]
pub fn event_game_candidates(
    facts: &BookingFacts,
    events: &[EventSummary],
    slots: &[Slot],
) -> Vec<Candidate> {
    let event_ids: Vec<EventId> = events
        .iter()
        .filter(|e| e.event_date == facts.event_date && same_text(&e.title, &facts.event_title))
        .map(|e| e.id)
        .collect();

    let of_event: Vec<&Slot> = slots
        .iter()
        .filter(|s| event_ids.contains(&s.event_id))
        .collect();
    let of_game: Vec<&Slot> = of_event
        .iter()
        .copied()
        .filter(|s| same_text(&s.game_name, &facts.game_name))
        .collect();

    let matched = if of_game.is_empty() { of_event } else { of_game };
    let mut candidates: Vec<Candidate> = matched
        .into_iter()
        .map(Candidate::from)
        .collect();
    candidates.sort_by_key(|c| c.slot_id);
    candidates.dedup_by_key(|c| c.slot_id);
    candidates
}

/// Resolves the slot of a booking against the catalog view.
///
/// Deterministic: the order of `events` and `slots` does not affect the result.
#[must_use]
pub fn resolve(
    facts: &BookingFacts,
    events: &[EventSummary],
    slots: &[Slot],
    config: &ReconciliationConfig,
) -> Resolution {
    if let Some(slot_id) = facts.slot_id {
        return record(facts, Resolution {
            slot_id: Some(slot_id),
            method: MatchMethod::Direct,
            ambiguous: false,
            candidates_considered: 1,
        });
    }

    let mut candidates = event_game_candidates(facts, events, slots);
    let considered = candidates.len();

    let resolution = match candidates.as_slice() {
        [] => Resolution {
            slot_id: None,
            method: MatchMethod::Unresolved,
            ambiguous: true,
            candidates_considered: 0,
        },
        [only] => Resolution {
            slot_id: Some(only.slot_id),
            method: MatchMethod::EventGame,
            ambiguous: false,
            candidates_considered: 1,
        },
        _ => {
            let mut decided = None;
            for (method, step) in NARROWING_CHAIN {
                let narrowed = step(&candidates, facts, config);
                match narrowed.len() {
                    0 => continue,
                    1 => {
                        decided = narrowed.first().map(|c| (method, c.slot_id));
                        break;
                    }
                    _ => candidates = narrowed,
                }
            }
            match decided {
                Some((method, slot_id)) => Resolution {
                    slot_id: Some(slot_id),
                    method,
                    ambiguous: false,
                    candidates_considered: considered,
                },
                None => Resolution {
                    slot_id: most_recent(&candidates).map(|c| c.slot_id),
                    method: MatchMethod::Fallback,
                    ambiguous: true,
                    candidates_considered: considered,
                },
            }
        }
    };

    record(facts, resolution)
}

fn record(facts: &BookingFacts, resolution: Resolution) -> Resolution {
    metrics::counter!("reconciliation.method", "method" => resolution.method.as_str()).increment(1);
    if resolution.ambiguous {
        metrics::counter!("reconciliation.ambiguous").increment(1);
        tracing::warn!(
            booking_ref = %facts.booking_ref,
            method = %resolution.method,
            slot_id = ?resolution.slot_id,
            candidates = resolution.candidates_considered,
            "Ambiguous slot reconciliation, flagged for audit"
        );
    } else {
        tracing::debug!(
            booking_ref = %facts.booking_ref,
            method = %resolution.method,
            slot_id = ?resolution.slot_id,
            "Booking reconciled"
        );
    }
    resolution
}
