// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod booking;
pub mod identity;
pub mod payment;
pub mod profile;
pub mod slot;

pub use booking::{Booking, BookingStatus};
pub use identity::{AuthEvent, AuthEventKind, Identity, Session, TokenMaterial};
pub use payment::{ContactInfo, CreatedOrder, PaymentConfirmation, PaymentOrder};
pub use profile::{Profile, ProfileUpdate, Role};
pub use slot::{Center, Slot, Sport};
