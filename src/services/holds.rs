// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived reservation holds on slots.
//!
//! A hold is taken when a user reaches the payment form and dropped when
//! the attempt fails or is abandoned. A confirmed booking turns the hold
//! into a permanent `Booked` mark so the slot cannot be entered again.
//!
//! Expired holds are swept on every acquire. `Booked` marks are never
//! removed, so the map is bounded by the number of catalog slots.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum HoldEntry {
    Held { holder: String, expires_at: Instant },
    Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Acquired,
    HeldByOther,
    AlreadyBooked,
}

/// Process-wide slot holds. Clones share state.
#[derive(Clone)]
pub struct SlotHolds {
    entries: Arc<DashMap<String, HoldEntry>>,
    ttl: Duration,
}

impl SlotHolds {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Take or refresh a hold. Expired holds by other users are replaced.
    pub fn acquire(&self, slot_id: &str, holder: &str) -> HoldOutcome {
        let now = Instant::now();
        // Must run before `entry`, which keeps its shard locked
        self.purge_expired(now);

        let fresh = HoldEntry::Held {
            holder: holder.to_string(),
            expires_at: now + self.ttl,
        };

        match self.entries.entry(slot_id.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                HoldOutcome::Acquired
            }
            Entry::Occupied(mut occupied) => {
                let blocked = match occupied.get() {
                    HoldEntry::Booked => Some(HoldOutcome::AlreadyBooked),
                    HoldEntry::Held {
                        holder: current,
                        expires_at,
                    } if current != holder && *expires_at > now => Some(HoldOutcome::HeldByOther),
                    HoldEntry::Held { .. } => None,
                };
                if let Some(outcome) = blocked {
                    return outcome;
                }
                occupied.insert(fresh);
                HoldOutcome::Acquired
            }
        }
    }

    fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| match entry {
            HoldEntry::Held { expires_at, .. } => *expires_at > now,
            HoldEntry::Booked => true,
        });
    }

    /// Drop a hold if `holder` still owns it.
    pub fn release(&self, slot_id: &str, holder: &str) {
        self.entries.remove_if(slot_id, |_, entry| {
            matches!(entry, HoldEntry::Held { holder: current, .. } if current == holder)
        });
    }

    /// Mark a slot as permanently taken.
    pub fn mark_booked(&self, slot_id: &str) {
        self.entries.insert(slot_id.to_string(), HoldEntry::Booked);
    }

    pub fn is_booked(&self, slot_id: &str) -> bool {
        self.entries
            .get(slot_id)
            .is_some_and(|e| matches!(*e, HoldEntry::Booked))
    }
}
