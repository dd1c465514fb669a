use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::ColumnType;

/// Primary key column of an existing entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyColumn {
    pub property: String,
    pub column: String,
    pub column_type: ColumnType,
}

/// What the validator and the wiring engine need to know about an entity
/// that already exists in the project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySummary {
    pub class_name: String,
    pub module: String,
    pub table: String,
    pub primary_keys: Vec<KeyColumn>,
    /// Public field and relation names (default selection plus eager relations).
    pub public_names: BTreeSet<String>,
}

impl EntitySummary {
    pub fn has_composite_key(&self) -> bool {
        self.primary_keys.len() > 1
    }
}

/// Entity registry keyed by class name.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entities: BTreeMap<String, EntitySummary>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, summary: EntitySummary) {
        self.entities.insert(summary.class_name.clone(), summary);
    }

    pub fn get(&self, class_name: &str) -> Option<&EntitySummary> {
        self.entities.get(class_name)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.entities.contains_key(class_name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<EntitySummary> for EntityCatalog {
    fn from_iter<I: IntoIterator<Item = EntitySummary>>(iter: I) -> Self {
        let mut catalog = EntityCatalog::new();
        for summary in iter {
            catalog.insert(summary);
        }
        catalog
    }
}
