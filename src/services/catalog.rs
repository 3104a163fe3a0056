// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slot catalog boundary and a JSON-file backed implementation.

use crate::models::{Center, Slot, Sport};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A slot together with the center and sport it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlot {
    pub slot: Slot,
    pub center: Center,
    pub sport: Sport,
}

/// Lookup of slots, centers and sports by id.
#[async_trait]
pub trait SlotCatalog: Send + Sync {
    async fn slot(&self, id: &str) -> Option<Slot>;
    async fn center(&self, id: &str) -> Option<Center>;
    async fn sport(&self, id: &str) -> Option<Sport>;

    /// Resolve a slot and both of its references. None if any is missing.
    async fn resolve(&self, slot_id: &str) -> Option<ResolvedSlot> {
        let slot = self.slot(slot_id).await?;
        let center = self.center(&slot.center_id).await?;
        let sport = self.sport(&slot.sport_id).await?;
        Some(ResolvedSlot {
            slot,
            center,
            sport,
        })
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    centers: Vec<Center>,
    sports: Vec<Sport>,
    slots: Vec<Slot>,
}

/// Immutable catalog loaded once at startup.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    centers: HashMap<String, Center>,
    sports: HashMap<String, Sport>,
    slots: HashMap<String, Slot>,
}

impl StaticCatalog {
    /// Load a catalog from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load a catalog from a JSON string with `centers`, `sports` and `slots`.
    pub fn load_from_json(json_data: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json_data)
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;
        Ok(Self::new(file.centers, file.sports, file.slots))
    }

    pub fn new(centers: Vec<Center>, sports: Vec<Sport>, slots: Vec<Slot>) -> Self {
        Self {
            centers: centers.into_iter().map(|c| (c.id.clone(), c)).collect(),
            sports: sports.into_iter().map(|s| (s.id.clone(), s)).collect(),
            slots: slots.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[async_trait]
impl SlotCatalog for StaticCatalog {
    async fn slot(&self, id: &str) -> Option<Slot> {
        self.slots.get(id).cloned()
    }

    async fn center(&self, id: &str) -> Option<Center> {
        self.centers.get(id).cloned()
    }

    async fn sport(&self, id: &str) -> Option<Sport> {
        self.sports.get(id).cloned()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "centers": [{"id": "C1", "name": "Koramangala Arena", "address": "80 Ft Rd"}],
        "sports": [{"id": "SP1", "name": "Badminton"}],
        "slots": [
            {"id": "S1", "centerId": "C1", "sportId": "SP1", "date": "2026-10-20",
             "startTime": "18:00", "endTime": "19:00", "price": 500, "available": true},
            {"id": "S2", "centerId": "C9", "sportId": "SP1", "date": "2026-10-20",
             "startTime": "19:00", "endTime": "20:00", "price": 500, "available": true}
        ]
    }"#;

    #[tokio::test]
    async fn test_resolve_slot() {
        let catalog = StaticCatalog::load_from_json(CATALOG).unwrap();
        let resolved = catalog.resolve("S1").await.unwrap();
        assert_eq!(resolved.center.name, "Koramangala Arena");
        assert_eq!(resolved.sport.name, "Badminton");
        assert_eq!(resolved.slot.price, 500);
    }

    #[tokio::test]
    async fn test_dangling_center_does_not_resolve() {
        let catalog = StaticCatalog::load_from_json(CATALOG).unwrap();
        assert!(catalog.slot("S2").await.is_some());
        assert!(catalog.resolve("S2").await.is_none());
        assert!(catalog.resolve("nope").await.is_none());
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            StaticCatalog::load_from_json("{"),
            Err(CatalogError::ParseError(_))
        ));
    }
}
