//! Catalog fixtures shared by tests and the demo.
//!
//! One city (Pune) with the "Baby Olympics" event on 2025-02-01. Game 1 runs
//! in slots 100 (₹800) and 101 (₹900), game 2 in slot 200 (₹500). The T-shirt
//! add-on costs ₹200 with 10% off from two pieces.

#![allow(clippy::missing_panics_doc)]

use crate::mocks::{InMemoryCatalog, InMemoryPromos};
use booking_core::money::Money;
use booking_core::types::{
    AddOn, AddOnId, AddOnVariant, BundleDiscount, ChildInfo, City, CityId, Discount, EventId,
    EventSummary, GameId, ParentInfo, PromoCodeRecord, Slot, SlotId, UserContext, UserId, VariantId,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Event of the fixture catalog
pub const EVENT_ID: EventId = EventId::new(10);
/// City of the fixture catalog
pub const CITY_ID: CityId = CityId::new(1);

#[allow(clippy::expect_used)]
fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .expect("fixture timestamp is valid")
}

#[allow(clippy::expect_used)]
fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("fixture date is valid")
}

/// Date of the fixture event.
#[must_use]
pub fn event_date() -> NaiveDate {
    day(2025, 2, 1)
}

/// The fixture city.
#[must_use]
pub fn city() -> City {
    City {
        id: CITY_ID,
        name: "Pune".to_string(),
    }
}

/// The fixture event.
#[must_use]
pub fn event() -> EventSummary {
    EventSummary {
        id: EVENT_ID,
        city_id: CITY_ID,
        title: "Baby Olympics".to_string(),
        event_date: event_date(),
        venue: Some("City Stadium".to_string()),
    }
}

/// An open slot of the fixture event priced at `price` rupees.
#[must_use]
pub fn slot(slot_id: i64, game_id: i64, game_name: &str, price: i64) -> Slot {
    Slot {
        slot_id: SlotId::new(slot_id),
        event_id: EVENT_ID,
        game_id: GameId::new(game_id),
        game_name: game_name.to_string(),
        custom_title: None,
        start_time: at(2025, 2, 1, 9),
        end_time: at(2025, 2, 1, 10),
        price: Some(Money::from_major_units(price)),
        listed_price: Money::from_major_units(price),
        max_participants: 12,
        created_at: at(2024, 12, 1, 0),
    }
}

/// Slots 100, 101 and 200.
#[must_use]
pub fn slots() -> Vec<Slot> {
    vec![
        slot(100, 1, "Running Race", 800),
        slot(101, 1, "Running Race", 900),
        slot(200, 2, "Baby Crawling", 500),
    ]
}

/// T-shirt add-on with a size M variant (+₹50) and a 2-for-10% bundle.
#[must_use]
pub fn tshirt() -> AddOn {
    AddOn {
        id: AddOnId::new(5),
        name: "T-shirt".to_string(),
        price: Money::from_major_units(200),
        variants: vec![AddOnVariant {
            id: VariantId::new(51),
            name: "Size M".to_string(),
            price: None,
            price_modifier: Money::from_major_units(50),
            stock_quantity: 40,
        }],
        bundle_discount: Some(BundleDiscount {
            min_quantity: 2,
            discount_percentage: 10.0,
        }),
    }
}

/// Catalog with the fixture city, event, slots and add-on.
#[must_use]
pub fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_cities(vec![city()])
        .with_events(vec![event()])
        .with_slots(slots())
        .with_add_ons(vec![tshirt()])
}

/// `ADMIN10` (10% off, active), `FLAT50` (₹50, active) and `OLD` (expired).
#[must_use]
pub fn promos() -> InMemoryPromos {
    InMemoryPromos::new(vec![
        PromoCodeRecord {
            code: "ADMIN10".to_string(),
            valid_to: "2025-12-31T23:59:59Z".to_string(),
            is_active: true,
            discount: Discount::Percentage(10.0),
            description: Some("10% off".to_string()),
        },
        PromoCodeRecord {
            code: "FLAT50".to_string(),
            valid_to: "2025-06-30".to_string(),
            is_active: true,
            discount: Discount::Fixed(Money::from_major_units(50)),
            description: None,
        },
        PromoCodeRecord {
            code: "OLD".to_string(),
            valid_to: "2024-06-30T00:00:00Z".to_string(),
            is_active: true,
            discount: Discount::Percentage(50.0),
            description: None,
        },
    ])
}

/// A parent with valid contact details.
#[must_use]
pub fn parent() -> ParentInfo {
    ParentInfo {
        name: "Asha Rao".to_string(),
        email: "asha@example.com".to_string(),
        phone: "+91 98765 43210".to_string(),
    }
}

/// A child born 2022-05-10, 32 months old on the event date.
#[must_use]
pub fn child() -> ChildInfo {
    ChildInfo {
        name: "Kiran".to_string(),
        date_of_birth: Some(day(2022, 5, 10)),
        gender: None,
        school: None,
    }
}

/// Signed-in user 42.
#[must_use]
pub fn user() -> UserContext {
    UserContext {
        user_id: UserId::new(42),
        mobile: "9876543210".to_string(),
    }
}
