use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use partforge_core::PartId;
use partforge_parts::Part;

/// Part catalog operation error.
///
/// These are **infrastructure errors** (storage, connectivity, corrupt records) as opposed
/// to domain errors (validation, insufficient stock).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("part already exists: {0}")]
    AlreadyExists(PartId),

    #[error("part disappeared from the catalog: {0}")]
    Missing(PartId),

    #[error("corrupt part record: {0}")]
    Corrupt(String),

    #[error("catalog storage failure: {0}")]
    Storage(String),
}

/// Batch read of parts by id. Ids with no record are simply absent from the result.
#[async_trait::async_trait]
pub trait PartReader: Send {
    async fn read_many(&mut self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError>;
}

/// A unit of work against the catalog.
///
/// Reads through a transaction lock the records they return until the transaction ends,
/// and they observe the transaction's own saves. A batch read locks its rows in ascending
/// id order. Dropping a transaction without
/// committing discards its writes.
#[async_trait::async_trait]
pub trait CatalogTransaction: PartReader + Sized {
    /// Persist the mutable state of an existing part (quantity and `updated_at`).
    async fn save(&mut self, part: &Part) -> Result<(), CatalogError>;

    async fn commit(self) -> Result<(), CatalogError>;

    async fn rollback(self) -> Result<(), CatalogError>;
}

/// Keyed store of parts.
///
/// Implementations:
/// - [`crate::catalog::InMemoryPartCatalog`] for tests/dev
/// - [`crate::catalog::PostgresPartCatalog`] for persistent deployments
#[async_trait::async_trait]
pub trait PartCatalog: Send + Sync {
    type Transaction: CatalogTransaction;

    async fn get(&self, id: &PartId) -> Result<Option<Part>, CatalogError>;

    async fn get_many(&self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError>;

    /// Insert a new part. Fails with [`CatalogError::AlreadyExists`] if the id is taken.
    async fn create(&self, part: &Part) -> Result<(), CatalogError>;

    /// Every part, ordered by `(created_at, id)`.
    async fn list_all(&self) -> Result<Vec<Part>, CatalogError>;

    async fn begin(&self) -> Result<Self::Transaction, CatalogError>;
}

#[async_trait::async_trait]
impl<C> PartCatalog for Arc<C>
where
    C: PartCatalog + ?Sized,
{
    type Transaction = C::Transaction;

    async fn get(&self, id: &PartId) -> Result<Option<Part>, CatalogError> {
        (**self).get(id).await
    }

    async fn get_many(&self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError> {
        (**self).get_many(ids).await
    }

    async fn create(&self, part: &Part) -> Result<(), CatalogError> {
        (**self).create(part).await
    }

    async fn list_all(&self) -> Result<Vec<Part>, CatalogError> {
        (**self).list_all().await
    }

    async fn begin(&self) -> Result<Self::Transaction, CatalogError> {
        (**self).begin().await
    }
}

/// Non-locking reads straight through a catalog.
#[derive(Debug)]
pub struct CatalogReads<'a, C: ?Sized> {
    catalog: &'a C,
}

impl<'a, C: ?Sized> CatalogReads<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }
}

#[async_trait::async_trait]
impl<C> PartReader for CatalogReads<'_, C>
where
    C: PartCatalog + ?Sized,
{
    async fn read_many(&mut self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError> {
        self.catalog.get_many(ids).await
    }
}
