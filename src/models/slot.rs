// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Catalog types: centers, sports and bookable slots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A sports facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Center {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

/// A sport offered at one or more centers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sport {
    pub id: String,
    pub name: String,
}

/// A bookable time slot.
///
/// `available` is only meaningful at the instant it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub center_id: String,
    pub sport_id: String,
    pub date: NaiveDate,
    /// "HH:MM"
    pub start_time: String,
    /// "HH:MM"
    pub end_time: String,
    /// Price in whole currency units
    pub price: u32,
    pub available: bool,
}
