use partforge_core::PartId;
use partforge_infra::catalog::{CatalogError, InMemoryPartCatalog, PostgresPartCatalog};
use partforge_infra::config::StorageConfig;
use partforge_infra::workflows::{AddStockError, CreatePartError, PartService};
use partforge_parts::{NewPart, Part};

/// Service handle shared by every handler; one variant per catalog backend.
#[derive(Debug, Clone)]
pub enum AppServices {
    InMemory(PartService<InMemoryPartCatalog>),
    Persistent(PartService<PostgresPartCatalog>),
}

impl AppServices {
    pub fn in_memory() -> Self {
        AppServices::InMemory(PartService::new(InMemoryPartCatalog::new()))
    }

    pub async fn create_part(&self, new_part: NewPart) -> Result<Part, CreatePartError> {
        match self {
            AppServices::InMemory(s) => s.create_part(new_part).await,
            AppServices::Persistent(s) => s.create_part(new_part).await,
        }
    }

    pub async fn add_stock(&self, part_id: &PartId, quantity: i64) -> Result<Part, AddStockError> {
        match self {
            AppServices::InMemory(s) => s.add_stock(part_id, quantity).await,
            AppServices::Persistent(s) => s.add_stock(part_id, quantity).await,
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Part>, CatalogError> {
        match self {
            AppServices::InMemory(s) => s.list_all().await,
            AppServices::Persistent(s) => s.list_all().await,
        }
    }

    pub async fn get(&self, part_id: &PartId) -> Result<Option<Part>, CatalogError> {
        match self {
            AppServices::InMemory(s) => s.get(part_id).await,
            AppServices::Persistent(s) => s.get(part_id).await,
        }
    }
}

pub async fn build_services(storage: &StorageConfig) -> Result<AppServices, CatalogError> {
    match storage {
        StorageConfig::InMemory => {
            tracing::info!("using in-memory part catalog");
            Ok(AppServices::in_memory())
        }
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => build_persistent_services(database_url, *max_connections).await,
    }
}

async fn build_persistent_services(
    database_url: &str,
    max_connections: u32,
) -> Result<AppServices, CatalogError> {
    let catalog = PostgresPartCatalog::connect(database_url, max_connections).await?;
    catalog.ensure_schema().await?;
    tracing::info!(max_connections, "using Postgres part catalog");
    Ok(AppServices::Persistent(PartService::new(catalog)))
}
