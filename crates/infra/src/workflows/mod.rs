//! Application-level orchestration of the parts domain over a catalog.
//!
//! The workflows compose a [`PartCatalog`] with the pure domain logic in
//! `partforge-parts`; they own no state beyond the catalog handle.

pub mod creation;
pub mod stock;

use std::sync::Arc;

use tracing::instrument;

use partforge_core::PartId;
use partforge_parts::{NewPart, Part};

use crate::catalog::{CatalogError, PartCatalog};

pub use creation::{CreatePartError, PartCreation};
pub use stock::{AddStockError, InventoryEngine};

/// Everything the outer surfaces need, bundled over one shared catalog.
#[derive(Debug)]
pub struct PartService<C> {
    catalog: Arc<C>,
    creation: PartCreation<Arc<C>>,
    engine: InventoryEngine<Arc<C>>,
}

impl<C> Clone for PartService<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            creation: self.creation.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<C> PartService<C>
where
    C: PartCatalog,
{
    pub fn new(catalog: C) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            creation: PartCreation::new(Arc::clone(&catalog)),
            engine: InventoryEngine::new(Arc::clone(&catalog)),
            catalog,
        }
    }

    pub async fn create_part(&self, new_part: NewPart) -> Result<Part, CreatePartError> {
        self.creation.create_part(new_part).await
    }

    pub async fn add_stock(&self, part_id: &PartId, quantity: i64) -> Result<Part, AddStockError> {
        self.engine.add_stock(part_id, quantity).await
    }

    #[instrument(skip(self), err)]
    pub async fn list_all(&self) -> Result<Vec<Part>, CatalogError> {
        self.catalog.list_all().await
    }

    pub async fn get(&self, part_id: &PartId) -> Result<Option<Part>, CatalogError> {
        self.catalog.get(part_id).await
    }
}
