//! Parts domain module: parts, bills of materials and stock deduction.
//!
//! This crate contains business rules for hierarchical inventory, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Catalog access and
//! transactions live in `partforge-infra`.

pub mod bom;
pub mod error;
pub mod part;
pub mod stock;

pub use bom::{PartLookup, validate_bom};
pub use error::{OperationError, ValidationError};
pub use part::{BomEntry, NewPart, Part, PartKind};
pub use stock::{MAX_STOCK, StockSheet, requested_quantity};
