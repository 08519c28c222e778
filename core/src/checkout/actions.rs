//! Checkout actions and effects.

use super::Step;
use crate::error::BookingError;
use crate::money::Money;
use crate::notification::TicketPayload;
use crate::snapshot::SessionSnapshot;
use crate::types::{
    AddOn, AddOnId, AddOnLine, BookingId, BookingPayload, BookingReceipt, ChildInfo, City, CityId,
    EventId, EventSummary, GameId, GatewayStatus, ParentInfo, PaymentRecord, PaymentStatus,
    PromoCode, PromoValidation, Slot, SlotId, UserContext, UserId, VariantId,
};

/// Everything that can happen to a checkout session.
#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutAction {
    // ========== Commands ==========
    /// Session opened; loads the city list
    Start,
    /// City picked
    SelectCity {
        /// City
        city_id: CityId,
    },
    /// Event picked
    SelectEvent {
        /// Event
        event_id: EventId,
    },
    /// Parent details edited
    SetParentInfo(ParentInfo),
    /// Child details edited
    SetChildInfo(ChildInfo),
    /// Slot tapped
    ToggleSlot {
        /// Slot
        slot_id: SlotId,
    },
    /// Add-on line added or its quantity changed
    SetAddOn(AddOnLine),
    /// Add-on line removed
    RemoveAddOn {
        /// Add-on
        add_on_id: AddOnId,
        /// Variant of the line
        variant_id: Option<VariantId>,
    },
    /// Promo code entered
    ApplyPromo {
        /// Code as typed
        code: String,
    },
    /// Promo code removed by the user
    RemovePromo,
    /// Terms checkbox changed
    AcceptTerms {
        /// New value
        accepted: bool,
    },
    /// "Continue" pressed
    AdvanceStep {
        /// Whether the user is signed in
        authenticated: bool,
    },
    /// "Back" pressed
    GoBack,
    /// Page loaded from a deep link or an auth return
    Resume {
        /// Step carried by the return URL
        requested_step: Step,
    },
    /// "Pay" pressed
    Submit {
        /// Signed-in user
        user: UserContext,
    },
    /// User came back from the gateway
    PaymentReturned {
        /// Booking the payment was for
        booking_id: BookingId,
        /// Attempt the gateway returned
        transaction_id: String,
    },
    /// "Retry payment" pressed for a booking whose payment failed
    RetryPayment,

    // ========== Collaborator results ==========
    /// City list arrived
    CitiesLoaded(Vec<City>),
    /// Events of a city arrived
    EventsLoaded {
        /// City the list is for
        city_id: CityId,
        /// Events
        events: Vec<EventSummary>,
    },
    /// Slots of an event arrived
    GamesLoaded {
        /// Event the list is for
        event_id: EventId,
        /// Slots for the child's age
        slots: Vec<Slot>,
    },
    /// Add-on catalog arrived
    AddOnsLoaded(Vec<AddOn>),
    /// Usable promo codes arrived
    PromosLoaded(Vec<PromoCode>),
    /// Promo service answered
    PromoValidated {
        /// Code that was validated
        code: String,
        /// The answer
        validation: PromoValidation,
    },
    /// A catalog or promo call failed
    CatalogFailed(BookingError),
    /// Snapshot store answered a resume
    SnapshotLoaded(Option<SessionSnapshot>),
    /// Booking persisted
    BookingCreated(BookingReceipt),
    /// Booking refused or the call failed
    BookingFailed(BookingError),
    /// Gateway accepted the attempt
    PaymentInitiated {
        /// Booking being paid
        booking_id: BookingId,
        /// Attempt id
        transaction_id: String,
        /// Amount sent
        amount: Money,
        /// Where to send the user
        redirect_url: String,
    },
    /// Initiation failed; the booking is kept
    PaymentFailed(BookingError),
    /// Polling reached an answer
    PaymentSettled {
        /// Booking paid
        booking_id: BookingId,
        /// Attempt polled
        transaction_id: String,
        /// Final status, or `Pending` when the polling budget ran out
        status: GatewayStatus,
    },
}

impl CheckoutAction {
    /// `true` for user commands that may change the cart. A change made by
    /// one of these overwrites the saved session snapshot.
    #[must_use]
    pub const fn edits_cart(&self) -> bool {
        matches!(
            self,
            Self::SelectCity { .. }
                | Self::SelectEvent { .. }
                | Self::SetParentInfo(_)
                | Self::SetChildInfo(_)
                | Self::ToggleSlot { .. }
                | Self::SetAddOn(_)
                | Self::RemoveAddOn { .. }
                | Self::ApplyPromo { .. }
                | Self::RemovePromo
                | Self::AcceptTerms { .. }
        )
    }
}

/// Side effects requested by the checkout reducer.
#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutEffect {
    /// Load cities
    FetchCities,
    /// Load events of a city
    FetchEvents {
        /// City
        city_id: CityId,
    },
    /// Load slots for an event and age
    FetchGames {
        /// Event
        event_id: EventId,
        /// Child's age in months on the event date
        age_months: u32,
    },
    /// Load the add-on catalog
    FetchAddOns,
    /// Load promo codes for the selection
    FetchPromos {
        /// Event
        event_id: EventId,
        /// Selected games
        game_ids: Vec<GameId>,
    },
    /// Ask the promo service for a discount
    ValidatePromo {
        /// Code
        code: String,
        /// Event
        event_id: EventId,
        /// Selected games
        game_ids: Vec<GameId>,
        /// Pre-discount subtotal
        subtotal: Money,
    },
    /// Overwrite the session snapshot
    SaveSnapshot(SessionSnapshot),
    /// Take the session snapshot
    LoadSnapshot,
    /// Purge the session snapshot
    ClearSnapshot,
    /// Send the user to sign in, returning to `return_step`
    RedirectToLogin {
        /// Step to come back to
        return_step: Step,
    },
    /// Persist the booking
    CreateBooking(BookingPayload),
    /// Start a gateway payment for a booking
    InitiatePayment {
        /// Booking
        booking_id: BookingId,
        /// Payer
        user_id: UserId,
        /// Amount settled by the booking service
        amount: Money,
        /// Payer mobile
        mobile: String,
        /// Abandon any pending attempt of the booking first
        supersede: bool,
    },
    /// Write the payment row
    CreatePaymentRecord(PaymentRecord),
    /// Poll the gateway until the attempt settles
    PollPaymentStatus {
        /// Booking
        booking_id: BookingId,
        /// Attempt
        transaction_id: String,
    },
    /// Move the booking's payment status
    UpdatePaymentStatus {
        /// Booking
        booking_id: BookingId,
        /// New status
        status: PaymentStatus,
    },
    /// Hand the ticket data to the notification service
    IssueTicket(TicketPayload),
    /// Full page navigation; the session ends here
    Navigate {
        /// Target URL
        url: String,
    },
}
