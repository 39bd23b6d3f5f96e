//! Entity universe — the stable-ordered list of entities to process.
//!
//! Loaded from a CSV of (id, name) pairs. Iteration order is file order,
//! which the checkpoint's `last_index` relies on: reordering the file
//! invalidates a saved checkpoint, so the loader preserves order exactly
//! and only drops duplicates and malformed ids.
//!
//! This is the one input whose failure aborts the run before any batch
//! starts.

use crate::domain::{Entity, EntityId};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse universe CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("universe file contains no usable entities")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct UniverseRow {
    id: String,
    name: Option<String>,
}

/// Ordered, deduplicated entity list.
#[derive(Debug, Clone)]
pub struct EntityUniverse {
    entities: Vec<Entity>,
}

impl EntityUniverse {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut entities: Vec<Entity> = Vec::new();

        for row in reader.deserialize() {
            let row: UniverseRow = row?;
            let id = match EntityId::parse(&row.id) {
                Ok(id) => id,
                Err(e) => {
                    warn!(raw = row.id, error = %e, "skipping malformed universe row");
                    continue;
                }
            };
            if entities.iter().any(|e| e.id == id) {
                continue;
            }
            let name = row.name.unwrap_or_default();
            entities.push(Entity::new(id, name));
        }

        if entities.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok(Self { entities })
    }

    pub fn from_entities(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
