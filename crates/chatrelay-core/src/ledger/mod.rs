//! Ledger: the abstract document store behind chat history and usage
//! accounting.
//!
//! A `Ledger` hands out container handles (`open_container` creates the
//! database and container on first use). Containers hold schema-less JSON
//! documents keyed by their string `id` field and support:
//!
//! - `create`: insert, failing with `LedgerError::Conflict` if the id exists
//! - `query`: filter / order / limit / project via [`DocumentQuery`]
//! - `upsert`: insert or replace by id
//!
//! Every write stamps the document with `_ts`, the store's last-modified
//! time in Unix seconds, so documents without a timestamp of their own can
//! still be ordered by recency.
//!
//! Implementations: [`memory::InMemoryLedger`] here, `SqliteLedger` in
//! chatrelay-infra.

pub mod boxed;
pub mod lazy;
pub mod memory;

use std::cmp::Ordering;

use serde_json::{Map, Value};

use chatrelay_types::error::LedgerError;

pub use boxed::{BoxLedger, BoxLedgerContainer};
pub use lazy::LazyLedger;
pub use memory::InMemoryLedger;

/// A stored document. Must be a JSON object with a non-empty string `id`.
pub type Document = Value;

/// Name of the discriminator field that separates record kinds sharing a
/// container.
pub const TYPE_FIELD: &str = "type";

/// Entry point to a document store.
///
/// Uses RPITIT (native async fn in traits). Use [`BoxLedger`] where a
/// concrete type cannot be named.
pub trait Ledger: Send + Sync {
    type Container: LedgerContainer + 'static;

    /// Create-if-not-exists the database and container, returning a handle.
    fn open_container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> impl std::future::Future<Output = Result<Self::Container, LedgerError>> + Send;
}

/// Operations on one container of documents.
pub trait LedgerContainer: Send + Sync {
    /// Insert a new document. Fails with `LedgerError::Conflict` when a
    /// document with the same id already exists.
    fn create(
        &self,
        doc: &Document,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    fn query(
        &self,
        query: &DocumentQuery,
    ) -> impl std::future::Future<Output = Result<Vec<Document>, LedgerError>> + Send;

    /// Insert or replace a document by id.
    fn upsert(
        &self,
        doc: &Document,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;
}

/// Extract the id of a document, rejecting documents without one.
pub fn document_id(doc: &Document) -> Result<&str, LedgerError> {
    match doc.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(LedgerError::Serialization(
            "document must be an object with a non-empty string id".to_string(),
        )),
    }
}

/// Field holding the store's last-modified time.
pub const TIMESTAMP_FIELD: &str = "_ts";

/// Copy of `doc` carrying the store timestamp.
pub fn stamped(doc: &Document, ts: i64) -> Document {
    let mut doc = doc.clone();
    if let Value::Object(fields) = &mut doc {
        fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
    }
    doc
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Typed query over a container.
///
/// Every condition applies to top-level fields only. Missing fields never
/// satisfy an equality filter and always sort last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub doc_type: Option<String>,
    pub equals: Vec<(String, Value)>,
    pub present: Vec<String>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
    /// Fields to keep in each result. Empty keeps the whole document.
    pub select: Vec<String>,
}

impl DocumentQuery {
    /// All documents in the container.
    pub fn all() -> Self {
        Self::default()
    }

    /// Documents whose `type` discriminator equals `doc_type`.
    pub fn of_type(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: Some(doc_type.into()),
            ..Self::default()
        }
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn where_present(mut self, field: impl Into<String>) -> Self {
        self.present.push(field.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Reject field names a backend could not address safely.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let names = self
            .equals
            .iter()
            .map(|(f, _)| f)
            .chain(self.present.iter())
            .chain(self.order_by.iter().map(|(f, _)| f))
            .chain(self.select.iter());
        for name in names {
            if !is_valid_field(name) {
                return Err(LedgerError::Query(format!("invalid field name: {name:?}")));
            }
        }
        Ok(())
    }

    /// Whether `doc` satisfies the type, equality and presence conditions.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(doc_type) = &self.doc_type {
            if doc.get(TYPE_FIELD).and_then(Value::as_str) != Some(doc_type.as_str()) {
                return false;
            }
        }
        let equal = self
            .equals
            .iter()
            .all(|(field, expected)| doc.get(field).is_some_and(|v| values_equal(v, expected)));
        equal && self.present.iter().all(|field| doc.get(field).is_some())
    }

    /// Apply the projection to one result document.
    pub fn project(&self, doc: Document) -> Document {
        if self.select.is_empty() {
            return doc;
        }
        let Value::Object(mut fields) = doc else {
            return doc;
        };
        let mut projected = Map::new();
        for name in &self.select {
            if let Some(value) = fields.remove(name) {
                projected.insert(name.clone(), value);
            }
        }
        Value::Object(projected)
    }

    /// Sort documents by the query's order-by field. Ties break on id in the
    /// same direction so results are deterministic.
    pub fn sort(&self, docs: &mut [Document]) {
        let Some((field, order)) = &self.order_by else {
            return;
        };
        docs.sort_by(|a, b| {
            let by_field = match (a.get(field), b.get(field)) {
                (Some(x), Some(y)) => {
                    let ord = compare_values(x, y);
                    if *order == SortOrder::Desc { ord.reverse() } else { ord }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_field.then_with(|| {
                let ida = a.get("id").and_then(Value::as_str).unwrap_or_default();
                let idb = b.get("id").and_then(Value::as_str).unwrap_or_default();
                if *order == SortOrder::Desc { idb.cmp(ida) } else { ida.cmp(idb) }
            })
        });
    }
}

fn is_valid_field(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Equality with numbers compared by value (`1 == 1.0`). Null never matches.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order over JSON values: booleans and numbers, then strings, then
/// everything else by its serialized form.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) | Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) | Value::Object(_) => 3,
        }
    }
    fn numeric(v: &Value) -> f64 {
        match v {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    match rank(a).cmp(&rank(b)) {
        Ordering::Equal => match (a, b) {
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Array(_) | Value::Object(_), _) => a.to_string().cmp(&b.to_string()),
            (Value::Null, _) => Ordering::Equal,
            _ => numeric(a).total_cmp(&numeric(b)),
        },
        other => other,
    }
}
