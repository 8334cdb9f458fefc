use core::num::NonZeroU32;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partforge_core::{DomainError, Entity, PartId};

use crate::error::ValidationError;

/// Whether a part is bought in as-is or built from other parts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartKind {
    Raw,
    Assembled,
}

impl PartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PartKind::Raw => "RAW",
            PartKind::Assembled => "ASSEMBLED",
        }
    }
}

impl core::fmt::Display for PartKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RAW" => Ok(PartKind::Raw),
            "ASSEMBLED" => Ok(PartKind::Assembled),
            _ => Err(DomainError::validation(
                "part type must be one of: RAW, ASSEMBLED",
            )),
        }
    }
}

/// One line of a bill of materials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BomEntry {
    pub sub_part_id: PartId,
    pub quantity_per_unit: NonZeroU32,
}

impl BomEntry {
    pub fn new(sub_part_id: PartId, quantity_per_unit: NonZeroU32) -> Self {
        Self {
            sub_part_id,
            quantity_per_unit,
        }
    }

    /// Units of the sub-part consumed when `multiplier` units of the parent are built.
    ///
    /// Returns `None` on overflow.
    pub fn required_for(&self, multiplier: u64) -> Option<u64> {
        u64::from(self.quantity_per_unit.get()).checked_mul(multiplier)
    }
}

/// Entity: Part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    id: PartId,
    name: String,
    kind: PartKind,
    quantity: u64,
    bill_of_materials: Vec<BomEntry>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Part {
    /// Rebuild a part from a stored record.
    ///
    /// Rejects records that break the RAW-has-no-BOM invariant.
    pub fn restore(
        id: PartId,
        name: String,
        kind: PartKind,
        quantity: u64,
        bill_of_materials: Vec<BomEntry>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if kind == PartKind::Raw && !bill_of_materials.is_empty() {
            return Err(DomainError::validation(format!(
                "raw part {id} carries a bill of materials"
            )));
        }
        Ok(Self {
            id,
            name,
            kind,
            quantity,
            bill_of_materials,
            created_at,
            updated_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PartKind {
        self.kind
    }

    pub fn is_assembled(&self) -> bool {
        self.kind == PartKind::Assembled
    }

    /// On-hand stock.
    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// Bill of materials in stored order (empty for RAW parts).
    pub fn bill_of_materials(&self) -> &[BomEntry] {
        &self.bill_of_materials
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn set_quantity(&mut self, quantity: u64) {
        self.quantity = quantity;
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Entity for Part {
    type Id = PartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Strongly-typed request to create a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPart {
    pub id: Option<PartId>,
    pub name: String,
    pub kind: PartKind,
    pub bill_of_materials: Vec<BomEntry>,
}

impl NewPart {
    pub fn raw(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: PartKind::Raw,
            bill_of_materials: Vec::new(),
        }
    }

    pub fn assembled(name: impl Into<String>, bill_of_materials: Vec<BomEntry>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: PartKind::Assembled,
            bill_of_materials,
        }
    }

    pub fn with_id(mut self, id: PartId) -> Self {
        self.id = Some(id);
        self
    }

    /// The id the part will be stored under: the supplied one, or one derived from the
    /// name and `created_at`.
    pub fn resolve_id(&self, created_at: DateTime<Utc>) -> PartId {
        self.id
            .clone()
            .unwrap_or_else(|| PartId::derive(&self.name, created_at))
    }

    /// Checks that need no catalog access.
    pub fn check_shape(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.kind == PartKind::Assembled && self.bill_of_materials.is_empty() {
            return Err(ValidationError::MissingBillOfMaterials);
        }
        Ok(())
    }

    /// Materialize the part with zero stock. A RAW part never keeps a bill of materials.
    pub fn into_part(self, id: PartId, created_at: DateTime<Utc>) -> Part {
        let bill_of_materials = match self.kind {
            PartKind::Raw => Vec::new(),
            PartKind::Assembled => self.bill_of_materials,
        };
        Part {
            id,
            name: self.name,
            kind: self.kind,
            quantity: 0,
            bill_of_materials,
            created_at,
            updated_at: created_at,
        }
    }
}
