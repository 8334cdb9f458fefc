use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};

use partforge_core::Entity;
use partforge_parts::{NewPart, Part, PartKind, ValidationError, validate_bom};

use crate::catalog::{CatalogError, CatalogReads, PartCatalog, load_bom_closure};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreatePartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Validates and persists new parts.
#[derive(Debug, Clone)]
pub struct PartCreation<C> {
    catalog: C,
}

impl<C> PartCreation<C>
where
    C: PartCatalog,
{
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub async fn create_part(&self, new_part: NewPart) -> Result<Part, CreatePartError> {
        self.create_part_at(new_part, Utc::now()).await
    }

    /// Create a part stamped with `now`, which also feeds a derived id.
    ///
    /// An assembled part's bill of materials is validated against the catalog before
    /// anything is written; on any failure the catalog is left untouched.
    #[instrument(skip(self, new_part), fields(part_name = %new_part.name, kind = %new_part.kind), err)]
    pub async fn create_part_at(
        &self,
        new_part: NewPart,
        now: DateTime<Utc>,
    ) -> Result<Part, CreatePartError> {
        new_part.check_shape()?;
        let id = new_part.resolve_id(now);

        if new_part.kind == PartKind::Assembled {
            let mut reads = CatalogReads::new(&self.catalog);
            let closure =
                load_bom_closure(&mut reads, &new_part.bill_of_materials, HashMap::new()).await?;
            if let Err(err) = validate_bom(&id, &new_part.bill_of_materials, &closure) {
                debug!(part_id = %id, error = %err, "bill of materials rejected");
                return Err(err.into());
            }
        }

        let part = new_part.into_part(id, now);
        self.catalog.create(&part).await.map_err(|err| match err {
            CatalogError::AlreadyExists(id) => {
                CreatePartError::Validation(ValidationError::DuplicatePartId(id))
            }
            other => CreatePartError::Catalog(other),
        })?;

        info!(part_id = %part.id(), "part created");
        Ok(part)
    }
}
