//! Typed failures of the inventory core.

use thiserror::Error;

use partforge_core::PartId;

/// Rejection of a proposed part at creation time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("part name cannot be empty")]
    EmptyName,

    #[error("assembled part requires a non-empty bill of materials")]
    MissingBillOfMaterials,

    /// The sub-part already sits on the current root-to-leaf path.
    #[error("circular dependency detected at {0}")]
    CircularDependency(PartId),

    #[error("sub-part not found: {0}")]
    UnknownSubPart(PartId),

    #[error("part already exists: {0}")]
    DuplicatePartId(PartId),
}

/// Failure of a stock addition. Any of these aborts the whole unit of work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("part not found: {0}")]
    PartNotFound(PartId),

    #[error("sub-part not found: {0}")]
    SubPartNotFound(PartId),

    #[error("insufficient quantity for {part_id}: required {required}, available {available}")]
    InsufficientSubStock {
        part_id: PartId,
        required: u64,
        available: u64,
    },

    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("quantity overflow while processing {0}")]
    QuantityOverflow(PartId),

    /// A stored bill of materials leads back to a part already being deducted.
    #[error("bill of materials loops back to {0}")]
    CircularBom(PartId),
}
