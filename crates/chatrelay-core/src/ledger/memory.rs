//! In-memory ledger backed by `DashMap`.
//!
//! Used for development (`backend = "memory"`) and throughout the tests.
//! Containers opened with the same database and container id share storage.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use chatrelay_types::error::LedgerError;

use super::{Document, DocumentQuery, Ledger, LedgerContainer, document_id, stamped};

type Docs = Arc<DashMap<String, Document>>;

#[derive(Clone, Default)]
pub struct InMemoryLedger {
    containers: Arc<DashMap<(String, String), Docs>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for InMemoryLedger {
    type Container = InMemoryContainer;

    async fn open_container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<InMemoryContainer, LedgerError> {
        let docs = self
            .containers
            .entry((database_id.to_string(), container_id.to_string()))
            .or_default()
            .clone();
        Ok(InMemoryContainer { docs })
    }
}

#[derive(Clone)]
pub struct InMemoryContainer {
    docs: Docs,
}

impl InMemoryContainer {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.docs.get(id).map(|d| d.value().clone())
    }
}

impl LedgerContainer for InMemoryContainer {
    async fn create(&self, doc: &Document) -> Result<(), LedgerError> {
        let id = document_id(doc)?;
        match self.docs.entry(id.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::Conflict(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(stamped(doc, Utc::now().timestamp()));
                Ok(())
            }
        }
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, LedgerError> {
        query.validate()?;

        let mut hits: Vec<Document> = self
            .docs
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        query.sort(&mut hits);
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        Ok(hits.into_iter().map(|d| query.project(d)).collect())
    }

    async fn upsert(&self, doc: &Document) -> Result<(), LedgerError> {
        let id = document_id(doc)?;
        self.docs
            .insert(id.to_string(), stamped(doc, Utc::now().timestamp()));
        Ok(())
    }
}
