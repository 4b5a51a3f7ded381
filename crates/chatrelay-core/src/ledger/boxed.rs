//! Object-safe wrappers for `Ledger` and `LedgerContainer`.
//!
//! Same shape as `BoxCompletionProvider`: a `*Dyn` trait with boxed futures,
//! a blanket impl for every implementor, and a `Box*` type that implements
//! the original trait by delegation.

use std::future::Future;
use std::pin::Pin;

use chatrelay_types::error::LedgerError;

use super::{Document, DocumentQuery, Ledger, LedgerContainer};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait LedgerContainerDyn: Send + Sync {
    fn create_boxed<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), LedgerError>>;

    fn query_boxed<'a>(
        &'a self,
        query: &'a DocumentQuery,
    ) -> BoxFuture<'a, Result<Vec<Document>, LedgerError>>;

    fn upsert_boxed<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), LedgerError>>;
}

impl<T: LedgerContainer> LedgerContainerDyn for T {
    fn create_boxed<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), LedgerError>> {
        Box::pin(self.create(doc))
    }

    fn query_boxed<'a>(
        &'a self,
        query: &'a DocumentQuery,
    ) -> BoxFuture<'a, Result<Vec<Document>, LedgerError>> {
        Box::pin(self.query(query))
    }

    fn upsert_boxed<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), LedgerError>> {
        Box::pin(self.upsert(doc))
    }
}

/// Type-erased container handle.
pub struct BoxLedgerContainer {
    inner: Box<dyn LedgerContainerDyn>,
}

impl BoxLedgerContainer {
    pub fn new<T: LedgerContainer + 'static>(container: T) -> Self {
        Self {
            inner: Box::new(container),
        }
    }
}

impl LedgerContainer for BoxLedgerContainer {
    async fn create(&self, doc: &Document) -> Result<(), LedgerError> {
        self.inner.create_boxed(doc).await
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, LedgerError> {
        self.inner.query_boxed(query).await
    }

    async fn upsert(&self, doc: &Document) -> Result<(), LedgerError> {
        self.inner.upsert_boxed(doc).await
    }
}

pub trait LedgerDyn: Send + Sync {
    fn open_container_boxed<'a>(
        &'a self,
        database_id: &'a str,
        container_id: &'a str,
    ) -> BoxFuture<'a, Result<BoxLedgerContainer, LedgerError>>;
}

impl<T: Ledger> LedgerDyn for T {
    fn open_container_boxed<'a>(
        &'a self,
        database_id: &'a str,
        container_id: &'a str,
    ) -> BoxFuture<'a, Result<BoxLedgerContainer, LedgerError>> {
        Box::pin(async move {
            self.open_container(database_id, container_id)
                .await
                .map(BoxLedgerContainer::new)
        })
    }
}

/// Type-erased ledger, chosen at startup from configuration.
pub struct BoxLedger {
    inner: Box<dyn LedgerDyn>,
}

impl BoxLedger {
    pub fn new<T: Ledger + 'static>(ledger: T) -> Self {
        Self {
            inner: Box::new(ledger),
        }
    }
}

impl Ledger for BoxLedger {
    type Container = BoxLedgerContainer;

    async fn open_container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<BoxLedgerContainer, LedgerError> {
        self.inner.open_container_boxed(database_id, container_id).await
    }
}
