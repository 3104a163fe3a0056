// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod booking;
pub mod catalog;
pub mod holds;
pub mod identity;
pub mod notify;
pub mod payment;
pub mod profile;
pub mod razorpay;
pub mod session;

pub use booking::{
    BookingAttempt, BookingCoordinator, BookingError, BookingState, EntryOutcome, FailureReason,
    RedirectReason,
};
pub use catalog::{CatalogError, SlotCatalog, StaticCatalog};
pub use holds::SlotHolds;
pub use identity::{GoTrueClient, IdentityProvider, MockIdentityProvider, ProviderError};
pub use notify::{LogNotifier, Notice, Notifier};
pub use payment::{FunctionGatewayClient, GatewayError, PaymentGateway};
pub use profile::ProfileRepository;
pub use razorpay::RazorpayClient;
pub use session::{AuthError, AuthSnapshot, SessionListener, SessionStore};
