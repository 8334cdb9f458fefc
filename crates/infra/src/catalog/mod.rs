//! Part catalog boundary.
//!
//! Defines the storage abstraction the workflows run against, with an in-memory
//! implementation for tests/dev and a Postgres one for persistent deployments.

pub mod closure;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use closure::load_bom_closure;
pub use in_memory::{InMemoryPartCatalog, InMemoryTransaction};
pub use postgres::{PostgresPartCatalog, PostgresTransaction};
pub use r#trait::{CatalogError, CatalogReads, CatalogTransaction, PartCatalog, PartReader};
