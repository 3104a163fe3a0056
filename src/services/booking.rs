// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking transaction coordinator.
//!
//! Drives one booking attempt from slot selection to a persisted,
//! confirmed booking:
//!
//! ```text
//! SelectingSlot -> ReadyToPay -> AwaitingOrder -> AwaitingGatewayConfirmation
//!               -> VerifyingPayment -> Confirmed
//! ```
//!
//! Any step after `ReadyToPay` can end in `Failed(reason)`. A failed attempt
//! can be resubmitted by the user; nothing is retried automatically.
//!
//! Invariants:
//! - A booking is written only after the gateway reported `valid == true`
//!   for this attempt's order.
//! - The gateway order id is the booking's idempotency key, so a repeated
//!   completion callback never writes a second row.
//! - A slot hold is taken on entering `ReadyToPay`, dropped on failure or
//!   when the attempt is abandoned, and made permanent on confirmation.

use crate::contact::{validate_contact, ContactError};
use crate::db::{BookingInsert, BookingStore};
use crate::models::{
    Booking, BookingStatus, ContactInfo, CreatedOrder, Identity, PaymentConfirmation, Profile,
};
use crate::services::catalog::{ResolvedSlot, SlotCatalog};
use crate::services::holds::{HoldOutcome, SlotHolds};
use crate::services::notify::{Notice, Notifier};
use crate::services::payment::{OrderRequest, PaymentGateway};
use crate::services::razorpay::to_minor_units;
use crate::time_utils::now_rfc3339;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Gateway limit on receipt length.
pub const MAX_RECEIPT_LEN: usize = 40;

/// Where the user lands after a confirmed booking.
pub const SUCCESS_PATH: &str = "/booking-success";

/// Where the user is sent when a slot cannot be booked.
pub const SLOTS_PATH: &str = "/slots";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    OrderCreationFailed,
    VerificationFailed,
    PersistFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::OrderCreationFailed => "order_creation_failed",
            FailureReason::VerificationFailed => "verification_failed",
            FailureReason::PersistFailed => "persist_failed",
        }
    }

    /// Verification and persistence failures read the same to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureReason::OrderCreationFailed => "Failed to initiate payment. Please try again.",
            FailureReason::VerificationFailed | FailureReason::PersistFailed => {
                "Payment verification failed. Please contact support."
            }
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingState {
    SelectingSlot,
    ReadyToPay,
    AwaitingOrder,
    /// The checkout widget is open with this order
    AwaitingGatewayConfirmation {
        order: CreatedOrder,
    },
    VerifyingPayment,
    Confirmed {
        booking: Booking,
    },
    Failed(FailureReason),
}

impl BookingState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingState::SelectingSlot => "selecting_slot",
            BookingState::ReadyToPay => "ready_to_pay",
            BookingState::AwaitingOrder => "awaiting_order",
            BookingState::AwaitingGatewayConfirmation { .. } => "awaiting_gateway_confirmation",
            BookingState::VerifyingPayment => "verifying_payment",
            BookingState::Confirmed { .. } => "confirmed",
            BookingState::Failed(_) => "failed",
        }
    }
}

/// Why the booking flow could not be entered. This is navigation, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    MissingSlotId,
    UnknownSlot,
    Unavailable,
    HeldByOther,
    AlreadyBooked,
}

impl RedirectReason {
    pub fn path(&self) -> &'static str {
        SLOTS_PATH
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("No slot selected")]
    NoSlotSelected,

    #[error("A payment is already in progress")]
    InFlight,

    #[error("This booking is already confirmed")]
    AlreadyConfirmed,

    #[error("{0}")]
    Invalid(#[from] ContactError),

    #[error("This slot is not available for booking")]
    SlotUnavailable,

    #[error("No payment is awaiting confirmation")]
    NotAwaitingPayment,

    #[error("Payment does not belong to this booking")]
    OrderMismatch,

    #[error("{}", .0.user_message())]
    Failed(FailureReason),
}

/// Contact details to prefill the payment form with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefill {
    pub name: String,
    pub phone: String,
}

/// Shared dependencies for booking attempts. Cheap to clone.
#[derive(Clone)]
pub struct BookingCoordinator {
    catalog: Arc<dyn SlotCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    bookings: Arc<dyn BookingStore>,
    holds: SlotHolds,
    notifier: Arc<dyn Notifier>,
}

impl BookingCoordinator {
    pub fn new(
        catalog: Arc<dyn SlotCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        bookings: Arc<dyn BookingStore>,
        holds: SlotHolds,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            catalog,
            gateway,
            bookings,
            holds,
            notifier,
        }
    }

    /// Start an attempt for `identity` in `SelectingSlot`.
    pub fn attempt(&self, identity: &Identity) -> BookingAttempt {
        BookingAttempt {
            coordinator: self.clone(),
            identity: identity.clone(),
            resolved: None,
            state: BookingState::SelectingSlot,
        }
    }

    /// Enter the booking flow for a slot id taken from navigation.
    pub async fn begin(&self, slot_id: Option<&str>, identity: &Identity) -> EntryOutcome {
        let mut attempt = self.attempt(identity);
        match attempt.select_slot(slot_id).await {
            Ok(()) => EntryOutcome::Ready(attempt),
            Err(reason) => EntryOutcome::Redirect(reason),
        }
    }
}

pub enum EntryOutcome {
    Ready(BookingAttempt),
    Redirect(RedirectReason),
}

impl std::fmt::Debug for EntryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryOutcome::Ready(attempt) => f
                .debug_tuple("Ready")
                .field(&attempt.state.name())
                .finish(),
            EntryOutcome::Redirect(reason) => f.debug_tuple("Redirect").field(reason).finish(),
        }
    }
}

/// One booking attempt by one user for one slot.
pub struct BookingAttempt {
    coordinator: BookingCoordinator,
    identity: Identity,
    resolved: Option<ResolvedSlot>,
    state: BookingState,
}

impl BookingAttempt {
    pub fn state(&self) -> &BookingState {
        &self.state
    }

    pub fn slot(&self) -> Option<&ResolvedSlot> {
        self.resolved.as_ref()
    }

    /// True while a request is in flight or the attempt is done.
    pub fn submit_disabled(&self) -> bool {
        matches!(
            self.state,
            BookingState::SelectingSlot
                | BookingState::AwaitingOrder
                | BookingState::AwaitingGatewayConfirmation { .. }
                | BookingState::VerifyingPayment
                | BookingState::Confirmed { .. }
        )
    }

    /// Path to navigate to once the attempt is confirmed.
    pub fn success_path(&self) -> Option<&'static str> {
        matches!(self.state, BookingState::Confirmed { .. }).then_some(SUCCESS_PATH)
    }

    /// Contact details from the loaded profile, falling back to the identity.
    pub fn prefill(&self, profile: Option<&Profile>) -> Prefill {
        match profile {
            Some(profile) => Prefill {
                name: profile.name.clone(),
                phone: profile.phone.clone().unwrap_or_default(),
            },
            None => Prefill {
                name: self.identity.name.clone(),
                phone: self.identity.phone.clone().unwrap_or_default(),
            },
        }
    }

    fn transition(&mut self, next: BookingState) {
        tracing::debug!(
            user_id = %self.identity.id,
            slot_id = self.resolved.as_ref().map(|r| r.slot.id.as_str()),
            from = self.state.name(),
            to = next.name(),
            "Booking state change"
        );
        self.state = next;
    }

    /// Resolve the slot and take a hold on it.
    pub async fn select_slot(&mut self, slot_id: Option<&str>) -> Result<(), RedirectReason> {
        let Some(slot_id) = slot_id.filter(|id| !id.is_empty()) else {
            return Err(RedirectReason::MissingSlotId);
        };

        let reason = match self.coordinator.catalog.resolve(slot_id).await {
            None => Some(RedirectReason::UnknownSlot),
            Some(resolved) if !resolved.slot.available => Some(RedirectReason::Unavailable),
            Some(resolved) => match self.coordinator.holds.acquire(slot_id, &self.identity.id) {
                HoldOutcome::Acquired => {
                    tracing::info!(user_id = %self.identity.id, slot_id, "Slot hold acquired");
                    self.resolved = Some(resolved);
                    None
                }
                HoldOutcome::HeldByOther => Some(RedirectReason::HeldByOther),
                HoldOutcome::AlreadyBooked => Some(RedirectReason::AlreadyBooked),
            },
        };

        if let Some(reason) = reason {
            tracing::info!(slot_id, ?reason, "Slot cannot be booked, redirecting");
            self.coordinator
                .notifier
                .notify(Notice::error("This slot is not available for booking"));
            return Err(reason);
        }

        self.transition(BookingState::ReadyToPay);
        Ok(())
    }

    /// Submit contact details and create a gateway order for the slot price.
    ///
    /// Invalid contact details leave the state unchanged.
    pub async fn submit(&mut self, name: &str, phone: &str) -> Result<CreatedOrder, BookingError> {
        match &self.state {
            BookingState::ReadyToPay | BookingState::Failed(_) => {}
            BookingState::SelectingSlot => return Err(BookingError::NoSlotSelected),
            BookingState::Confirmed { .. } => return Err(BookingError::AlreadyConfirmed),
            _ => return Err(BookingError::InFlight),
        }
        let Some(resolved) = self.resolved.clone() else {
            return Err(BookingError::NoSlotSelected);
        };
        let slot = resolved.slot;

        let (name, phone) = match validate_contact(name, phone) {
            Ok(contact) => contact,
            Err(e) => {
                self.coordinator.notifier.notify(Notice::error(e.to_string()));
                return Err(e.into());
            }
        };

        if matches!(self.state, BookingState::Failed(_))
            && self.coordinator.holds.acquire(&slot.id, &self.identity.id) != HoldOutcome::Acquired
        {
            self.coordinator
                .notifier
                .notify(Notice::error(BookingError::SlotUnavailable.to_string()));
            return Err(BookingError::SlotUnavailable);
        }

        self.transition(BookingState::AwaitingOrder);

        let request = OrderRequest {
            amount: slot.price,
            receipt: receipt_token(&slot.id, Utc::now()),
            slot_id: slot.id.clone(),
            contact: ContactInfo {
                name,
                phone,
                email: self.identity.email.clone(),
            },
        };

        let expected_minor = to_minor_units(u64::from(slot.price));
        match self.coordinator.gateway.create_order(&request).await {
            Ok(created) if created.order.amount == expected_minor => {
                tracing::info!(
                    user_id = %self.identity.id,
                    slot_id = %slot.id,
                    order_id = %created.order.id,
                    amount = created.order.amount,
                    "Order created, awaiting gateway confirmation"
                );
                self.transition(BookingState::AwaitingGatewayConfirmation {
                    order: created.clone(),
                });
                Ok(created)
            }
            Ok(created) => {
                tracing::error!(
                    order_id = %created.order.id,
                    expected = expected_minor,
                    actual = created.order.amount,
                    "Order amount does not match slot price"
                );
                Err(self.fail(FailureReason::OrderCreationFailed))
            }
            Err(e) => {
                tracing::error!(slot_id = %slot.id, error = %e, "Order creation failed");
                Err(self.fail(FailureReason::OrderCreationFailed))
            }
        }
    }

    /// Completion callback from the checkout widget.
    pub async fn on_payment_success(
        &mut self,
        confirmation: &PaymentConfirmation,
    ) -> Result<Booking, BookingError> {
        match &self.state {
            BookingState::AwaitingGatewayConfirmation { order }
                if order.order.id == confirmation.razorpay_order_id => {}
            BookingState::AwaitingGatewayConfirmation { order } => {
                tracing::warn!(
                    expected = %order.order.id,
                    received = %confirmation.razorpay_order_id,
                    "Payment callback for a different order"
                );
                return Err(BookingError::OrderMismatch);
            }
            BookingState::Confirmed { booking }
                if booking.payment_order_id == confirmation.razorpay_order_id =>
            {
                tracing::info!(order_id = %booking.payment_order_id, "Repeated payment callback ignored");
                return Ok(booking.clone());
            }
            _ => return Err(BookingError::NotAwaitingPayment),
        }
        let Some(resolved) = self.resolved.clone() else {
            return Err(BookingError::NoSlotSelected);
        };

        self.transition(BookingState::VerifyingPayment);
        let order_id = confirmation.razorpay_order_id.as_str();

        match self.coordinator.gateway.verify_payment(confirmation).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(order_id, reason = "verification_failed", "Payment signature rejected");
                return Err(self.fail(FailureReason::VerificationFailed));
            }
            Err(e) => {
                tracing::error!(order_id, reason = "verification_failed", error = %e, "Payment verification request failed");
                return Err(self.fail(FailureReason::VerificationFailed));
            }
        }

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.identity.id.clone(),
            center_name: resolved.center.name.clone(),
            sport_type: resolved.sport.name.clone(),
            booking_date: resolved.slot.date,
            start_time: resolved.slot.start_time.clone(),
            end_time: resolved.slot.end_time.clone(),
            amount: resolved.slot.price,
            status: BookingStatus::Confirmed,
            payment_order_id: confirmation.razorpay_order_id.clone(),
            payment_id: confirmation.razorpay_payment_id.clone(),
            slot_id: resolved.slot.id.clone(),
            created_at: now_rfc3339(),
        };

        let booking = match self.coordinator.bookings.insert_booking(&booking).await {
            Ok(BookingInsert::Inserted) => booking,
            Ok(BookingInsert::Duplicate(existing)) => {
                tracing::info!(order_id, booking_id = %existing.id, "Booking already recorded for order");
                existing
            }
            Err(e) => {
                tracing::error!(order_id, reason = "persist_failed", error = %e, "Verified payment could not be recorded");
                return Err(self.fail(FailureReason::PersistFailed));
            }
        };

        self.coordinator.holds.mark_booked(&resolved.slot.id);
        tracing::info!(
            user_id = %self.identity.id,
            booking_id = %booking.id,
            order_id,
            "Booking confirmed"
        );
        self.transition(BookingState::Confirmed {
            booking: booking.clone(),
        });
        self.coordinator.notifier.notify(Notice::success(
            "Booking confirmed! You'll receive details on your phone.",
        ));
        Ok(booking)
    }

    /// Enter `Failed`, drop the hold and tell the user once.
    fn fail(&mut self, reason: FailureReason) -> BookingError {
        self.transition(BookingState::Failed(reason));
        self.release_hold();
        self.coordinator
            .notifier
            .notify(Notice::error(reason.user_message()));
        BookingError::Failed(reason)
    }

    fn release_hold(&self) {
        if let Some(resolved) = &self.resolved {
            self.coordinator
                .holds
                .release(&resolved.slot.id, &self.identity.id);
        }
    }
}

impl Drop for BookingAttempt {
    fn drop(&mut self) {
        if !matches!(self.state, BookingState::Confirmed { .. }) {
            self.release_hold();
        }
    }
}

/// Receipt reference for an order: `booking-<slot id>-<unix millis>`.
///
/// Long slot ids are shortened so the timestamp always survives the
/// gateway's length limit.
pub fn receipt_token(slot_id: &str, now: DateTime<Utc>) -> String {
    const PREFIX: &str = "booking-";
    let suffix = format!("-{}", now.timestamp_millis());
    let room = MAX_RECEIPT_LEN.saturating_sub(PREFIX.len() + suffix.len());
    let slot: String = slot_id.chars().take(room).collect();
    format!("{}{}{}", PREFIX, slot, suffix)
}
