//! Postgres-backed part catalog.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `CatalogError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | CatalogError | Scenario |
//! |------------|----------------------|--------------|----------|
//! | Database (unique violation) | `23505` | `AlreadyExists` | `create` with an id that is taken |
//! | Database (check constraint violation) | `23514` | `Corrupt` | Negative quantity or RAW part with a BOM |
//! | Database (deadlock detected) | `40P01` | `Storage` | Lock cycle with a writer outside the engine |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Locking
//!
//! Transactions run at `READ COMMITTED`. Every read inside a transaction is
//! `SELECT ... FOR UPDATE ORDER BY id`. The inventory engine locks a whole addition's
//! parts in one such batch, so concurrent additions sharing a sub-part take their row
//! locks in the same order and queue instead of deadlocking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use partforge_core::{Entity, PartId};
use partforge_parts::{BomEntry, Part, PartKind};

use super::r#trait::{CatalogError, CatalogTransaction, PartCatalog, PartReader};

const SCHEMA: &str = include_str!("../../migrations/0001_parts.sql");

const SELECT_COLUMNS: &str =
    "SELECT id, name, kind, quantity, bill_of_materials, created_at, updated_at FROM parts";

/// Postgres-backed part catalog.
///
/// `PostgresPartCatalog` is `Send + Sync` and cheap to clone; all operations go through the
/// shared SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresPartCatalog {
    pool: Arc<PgPool>,
}

impl PostgresPartCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `parts` table and its index if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), CatalogError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PartCatalog for PostgresPartCatalog {
    type Transaction = PostgresTransaction;

    #[instrument(skip(self), fields(part_id = %id), err)]
    async fn get(&self, id: &PartId) -> Result<Option<Part>, CatalogError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.map(|row| decode(&row)).transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_many(&self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ANY($1)"))
            .bind(id_array(ids))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_many", e))?;
        decode_keyed(&rows)
    }

    #[instrument(skip(self, part), fields(part_id = %part.id()), err)]
    async fn create(&self, part: &Part) -> Result<(), CatalogError> {
        let quantity = quantity_column(part)?;
        let bill_of_materials = serde_json::to_value(part.bill_of_materials())
            .map_err(|e| CatalogError::Corrupt(format!("bill of materials serialization failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO parts (id, name, kind, quantity, bill_of_materials, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(part.id().as_str())
        .bind(part.name())
        .bind(part.kind().as_str())
        .bind(quantity)
        .bind(bill_of_materials)
        .bind(part.created_at())
        .bind(part.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CatalogError::AlreadyExists(part.id().clone())
            } else {
                map_sqlx_error("create", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_all(&self) -> Result<Vec<Part>, CatalogError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_all", e))?;
        rows.iter().map(decode).collect()
    }

    async fn begin(&self) -> Result<Self::Transaction, CatalogError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresTransaction { tx })
    }
}

/// Database transaction holding row locks on every part it has read.
///
/// Dropping it without commit rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl PartReader for PostgresTransaction {
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn read_many(&mut self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE"
        ))
        .bind(id_array(ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("read_many", e))?;
        decode_keyed(&rows)
    }
}

#[async_trait::async_trait]
impl CatalogTransaction for PostgresTransaction {
    #[instrument(skip(self, part), fields(part_id = %part.id(), quantity = part.quantity()), err)]
    async fn save(&mut self, part: &Part) -> Result<(), CatalogError> {
        let quantity = quantity_column(part)?;
        let result = sqlx::query("UPDATE parts SET quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(part.id().as_str())
            .bind(quantity)
            .bind(part.updated_at())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("save", e))?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::Missing(part.id().clone()));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), CatalogError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), CatalogError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn id_array(ids: &[PartId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_owned()).collect()
}

fn quantity_column(part: &Part) -> Result<i64, CatalogError> {
    i64::try_from(part.quantity()).map_err(|_| {
        CatalogError::Corrupt(format!(
            "quantity {} of {} exceeds the BIGINT column",
            part.quantity(),
            part.id()
        ))
    })
}

fn decode(row: &PgRow) -> Result<Part, CatalogError> {
    PartRow::from_row(row)
        .map_err(|e| CatalogError::Corrupt(format!("failed to deserialize part row: {e}")))?
        .try_into()
}

fn decode_keyed(rows: &[PgRow]) -> Result<HashMap<PartId, Part>, CatalogError> {
    rows.iter()
        .map(|row| decode(row).map(|part| (part.id().clone(), part)))
        .collect()
}

/// Map SQLx errors to catalog errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Check constraint violation
                Some("23514") => CatalogError::Corrupt(msg),
                _ => CatalogError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            CatalogError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => CatalogError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct PartRow {
    id: String,
    name: String,
    kind: String,
    quantity: i64,
    bill_of_materials: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for PartRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PartRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            bill_of_materials: row.try_get("bill_of_materials")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<PartRow> for Part {
    type Error = CatalogError;

    fn try_from(row: PartRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| CatalogError::Corrupt(format!("part {}: {what}", row.id));

        let kind: PartKind = row.kind.parse().map_err(|e| corrupt(format!("{e}")))?;
        let quantity = u64::try_from(row.quantity)
            .map_err(|_| corrupt(format!("negative quantity {}", row.quantity)))?;
        let bill_of_materials: Vec<BomEntry> = serde_json::from_value(row.bill_of_materials.clone())
            .map_err(|e| corrupt(format!("bill of materials: {e}")))?;
        let id = PartId::new(row.id.clone()).map_err(|e| corrupt(format!("{e}")))?;

        Part::restore(
            id,
            row.name,
            kind,
            quantity,
            bill_of_materials,
            row.created_at,
            row.updated_at,
        )
        .map_err(|e| CatalogError::Corrupt(e.to_string()))
    }
}
