//! Infrastructure layer: part catalogs, workflows, config.

pub mod catalog;
pub mod config;
pub mod workflows;


pub use catalog::{CatalogError, InMemoryPartCatalog, PartCatalog, PostgresPartCatalog};
pub use config::{AppConfig, ConfigError, StorageConfig};
pub use workflows::{AddStockError, CreatePartError, PartService};
