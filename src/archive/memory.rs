//! In-memory archive containers
//!
//! Used to embed archives built at runtime and to drive the replay engine
//! in tests without touching the filesystem.

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::table::Table;
use crate::archive::{Container, SegmentOpener};
use std::collections::HashMap;

/// A container whose tables live in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    location: String,
    tables: HashMap<String, Table>,
}

impl MemoryContainer {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            tables: HashMap::new(),
        }
    }

    /// Add or replace a table, keyed by the table's own key
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.key().to_string(), table);
    }

    /// Builder variant of [`MemoryContainer::insert`]
    pub fn with_table(mut self, table: Table) -> Self {
        self.insert(table);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Table> {
        self.tables.remove(key)
    }

    pub fn table_keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl Container for MemoryContainer {
    fn location(&self) -> &str {
        &self.location
    }

    fn table(&mut self, key: &str) -> ArchiveResult<Option<Table>> {
        Ok(self.tables.get(key).cloned())
    }
}

/// Registry of in-memory containers addressed by location
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    containers: HashMap<String, MemoryContainer>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container under its own location
    pub fn register(&mut self, container: MemoryContainer) {
        self.containers
            .insert(container.location().to_string(), container);
    }

    /// Builder variant of [`MemoryOpener::register`]
    pub fn with(mut self, container: MemoryContainer) -> Self {
        self.register(container);
        self
    }
}

impl SegmentOpener for MemoryOpener {
    fn open(&self, location: &str) -> ArchiveResult<Box<dyn Container>> {
        self.containers
            .get(location)
            .cloned()
            .map(|c| Box::new(c) as Box<dyn Container>)
            .ok_or_else(|| ArchiveError::NotFound(location.to_string()))
    }
}
