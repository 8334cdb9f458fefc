use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use partforge_core::{Entity, PartId};
use partforge_parts::{OperationError, Part, StockSheet, requested_quantity};

use crate::catalog::{
    CatalogError, CatalogReads, CatalogTransaction, PartCatalog, PartReader, load_bom_closure,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddStockError {
    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Runs stock additions as one catalog transaction each.
///
/// ```text
/// read target + BOM closure (non-locking; BOMs never change)
///   ↓
/// begin
///   ↓
/// lock every closure id in one batch, ascending id order
///   ↓
/// StockSheet::add_stock (pure)
///   ↓
/// save every changed part
///   ↓
/// commit  (any failure above: rollback)
/// ```
///
/// Taking all row locks in a single ordered batch means two additions with overlapping
/// closures always queue behind each other instead of locking in opposite orders.
#[derive(Debug, Clone)]
pub struct InventoryEngine<C> {
    catalog: C,
}

impl<C> InventoryEngine<C>
where
    C: PartCatalog,
{
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub async fn add_stock(&self, part_id: &PartId, quantity: i64) -> Result<Part, AddStockError> {
        self.add_stock_at(part_id, quantity, Utc::now()).await
    }

    #[instrument(skip(self, part_id, now), fields(part_id = %part_id), err)]
    pub async fn add_stock_at(
        &self,
        part_id: &PartId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Part, AddStockError> {
        let quantity = requested_quantity(quantity)?;
        let footprint = self.footprint(part_id).await?;
        let mut tx = self.catalog.begin().await?;

        match apply(&mut tx, part_id, &footprint, quantity, now).await {
            Ok(updated) => {
                tx.commit().await?;
                info!(part_id = %part_id, quantity = updated.quantity(), "stock added");
                Ok(updated)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(part_id = %part_id, error = %rollback_err, "rollback failed");
                }
                debug!(part_id = %part_id, error = %err, "stock addition aborted");
                Err(err)
            }
        }
    }

    /// Ids of the target and every part reachable from its BOM, sorted ascending.
    ///
    /// Parts are never deleted and their BOMs are immutable, so this set is still exact
    /// once the transaction has locked it.
    async fn footprint(&self, part_id: &PartId) -> Result<Vec<PartId>, AddStockError> {
        let target = self
            .catalog
            .get(part_id)
            .await?
            .ok_or_else(|| OperationError::PartNotFound(part_id.clone()))?;
        let bom = target.bill_of_materials().to_vec();

        let mut reads = CatalogReads::new(&self.catalog);
        let closure = load_bom_closure(&mut reads, &bom, HashMap::from([(part_id.clone(), target)])).await?;

        let mut ids: Vec<PartId> = closure.into_keys().collect();
        ids.sort();
        Ok(ids)
    }
}

async fn apply<T>(
    tx: &mut T,
    part_id: &PartId,
    footprint: &[PartId],
    quantity: u64,
    now: DateTime<Utc>,
) -> Result<Part, AddStockError>
where
    T: CatalogTransaction,
{
    let locked = tx.read_many(footprint).await?;

    let mut sheet = StockSheet::new(locked.into_values());
    sheet.add_stock(part_id, quantity)?;

    let changed = sheet.into_changed(now);
    for part in &changed {
        tx.save(part).await?;
    }

    changed
        .into_iter()
        .find(|part| part.id() == part_id)
        .ok_or_else(|| CatalogError::Missing(part_id.clone()).into())
}
