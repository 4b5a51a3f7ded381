//! SQLite document ledger.
//!
//! Implements `Ledger` / `LedgerContainer` from `chatrelay-core`. Each
//! database id maps to one file `{data_dir}/{database_id}.db`; documents are
//! stored as JSON text and filtered with SQLite's JSON functions.

use std::path::PathBuf;

use chrono::Utc;
use sqlx::Row;
use tracing::{debug, info};

use chatrelay_core::ledger::{
    Document, DocumentQuery, Ledger, LedgerContainer, SortOrder, TYPE_FIELD, document_id, stamped,
};
use chatrelay_types::error::LedgerError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `Ledger`.
pub struct SqliteLedger {
    data_dir: PathBuf,
}

impl SqliteLedger {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl Ledger for SqliteLedger {
    type Container = SqliteContainer;

    async fn open_container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<SqliteContainer, LedgerError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(LedgerError::Unavailable(
                "no data directory configured for the sqlite ledger".to_string(),
            ));
        }
        if !is_valid_database_id(database_id) {
            return Err(LedgerError::Unavailable(format!(
                "invalid database id: {database_id:?}"
            )));
        }
        if container_id.is_empty() {
            return Err(LedgerError::Unavailable("empty container id".to_string()));
        }

        tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
            LedgerError::Unavailable(format!("cannot create {}: {e}", self.data_dir.display()))
        })?;

        let path = self.data_dir.join(format!("{database_id}.db"));
        let pool = DatabasePool::open_file(&path)
            .await
            .map_err(|e| LedgerError::Unavailable(format!("cannot open {}: {e}", path.display())))?;

        sqlx::query(
            "INSERT INTO ledger_containers (id, created_at) VALUES (?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(container_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool.writer)
        .await
        .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        info!(path = %path.display(), container_id, "sqlite ledger container ready");

        Ok(SqliteContainer {
            pool,
            container_id: container_id.to_string(),
        })
    }
}

fn is_valid_database_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// One container inside a SQLite ledger database.
pub struct SqliteContainer {
    pool: DatabasePool,
    container_id: String,
}

impl SqliteContainer {
    fn encode(doc: &Document) -> Result<(String, String, i64), LedgerError> {
        let id = document_id(doc)?.to_string();
        let ts = Utc::now().timestamp();
        let body = serde_json::to_string(&stamped(doc, ts))
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok((id, body, ts))
    }
}

impl LedgerContainer for SqliteContainer {
    async fn create(&self, doc: &Document) -> Result<(), LedgerError> {
        let (id, body, ts) = Self::encode(doc)?;

        let result = sqlx::query(
            "INSERT INTO ledger_documents (container_id, id, body, ts) VALUES (?, ?, ?, ?)",
        )
        .bind(&self.container_id)
        .bind(&id)
        .bind(&body)
        .bind(ts)
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(LedgerError::Conflict(id))
            }
            Err(e) => Err(LedgerError::Query(e.to_string())),
        }
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, LedgerError> {
        query.validate()?;
        let (sql, binds) = build_select(query);
        debug!(%sql, "ledger query");

        let mut statement = sqlx::query(&sql).bind(&self.container_id);
        for value in &binds {
            statement = statement.bind(value);
        }
        let rows = statement
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| LedgerError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let body: String = row
                    .try_get("body")
                    .map_err(|e| LedgerError::Query(e.to_string()))?;
                let doc: Document = serde_json::from_str(&body)
                    .map_err(|e| LedgerError::Serialization(format!("invalid JSON body: {e}")))?;
                Ok(query.project(doc))
            })
            .collect()
    }

    async fn upsert(&self, doc: &Document) -> Result<(), LedgerError> {
        let (id, body, ts) = Self::encode(doc)?;

        sqlx::query(
            r#"INSERT INTO ledger_documents (container_id, id, body, ts) VALUES (?, ?, ?, ?)
               ON CONFLICT(container_id, id) DO UPDATE SET body = excluded.body, ts = excluded.ts"#,
        )
        .bind(&self.container_id)
        .bind(&id)
        .bind(&body)
        .bind(ts)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| LedgerError::Query(e.to_string()))?;

        Ok(())
    }
}

/// SQL text plus the text parameters following the leading container id.
///
/// Field paths are bound as parameters, never spliced into the SQL.
fn build_select(query: &DocumentQuery) -> (String, Vec<String>) {
    let mut sql = String::from("SELECT body FROM ledger_documents WHERE container_id = ?");
    let mut binds = Vec::new();

    if let Some(doc_type) = &query.doc_type {
        sql.push_str(" AND json_extract(body, ?) = ?");
        binds.push(json_path(TYPE_FIELD));
        binds.push(doc_type.clone());
    }
    for (field, value) in &query.equals {
        // json_extract on both sides so numbers, strings and booleans compare
        // the same way they do in the document; JSON null never matches.
        sql.push_str(" AND json_extract(body, ?) = json_extract(?, '$')");
        binds.push(json_path(field));
        binds.push(value.to_string());
    }
    for field in &query.present {
        sql.push_str(" AND json_type(body, ?) IS NOT NULL");
        binds.push(json_path(field));
    }
    if let Some((field, order)) = &query.order_by {
        let dir = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        sql.push_str(&format!(
            " ORDER BY (json_extract(body, ?) IS NULL), json_extract(body, ?) {dir}, id {dir}"
        ));
        binds.push(json_path(field));
        binds.push(json_path(field));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    (sql, binds)
}

fn json_path(field: &str) -> String {
    format!("$.{field}")
}
