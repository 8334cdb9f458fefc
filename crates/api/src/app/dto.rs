use std::num::NonZeroU32;

use serde::Deserialize;

use partforge_core::{DomainError, DomainResult, Entity, PartId};
use partforge_parts::{BomEntry, NewPart, Part, PartKind};

// -------------------------
// Request DTOs
// -------------------------

/// Loosely-typed creation payload, converted to a [`NewPart`] before it reaches the
/// workflow.
#[derive(Debug, Deserialize)]
pub struct CreatePartRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "parts", alias = "billOfMaterials")]
    pub bill_of_materials: Option<Vec<BomLineRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct BomLineRequest {
    #[serde(alias = "id", alias = "subPartId")]
    pub sub_part_id: String,
    #[serde(alias = "quantity", alias = "quantityPerUnit")]
    pub quantity_per_unit: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    pub quantity: i64,
}

impl CreatePartRequest {
    pub fn into_new_part(self) -> DomainResult<NewPart> {
        let kind: PartKind = self
            .kind
            .as_deref()
            .ok_or_else(|| DomainError::validation("type is required (RAW or ASSEMBLED)"))?
            .parse()?;

        let id = self.id.map(PartId::new).transpose()?;

        let bill_of_materials = self
            .bill_of_materials
            .unwrap_or_default()
            .into_iter()
            .map(BomLineRequest::into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewPart {
            id,
            name: self.name,
            kind,
            bill_of_materials,
        })
    }
}

impl BomLineRequest {
    fn into_entry(self) -> DomainResult<BomEntry> {
        let sub_part_id = PartId::new(self.sub_part_id)?;
        let quantity_per_unit = u32::try_from(self.quantity_per_unit)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "quantity_per_unit for {sub_part_id} must be a positive integer, got {}",
                    self.quantity_per_unit
                ))
            })?;
        Ok(BomEntry::new(sub_part_id, quantity_per_unit))
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn part_to_json(part: &Part) -> serde_json::Value {
    serde_json::json!({
        "id": part.id().as_str(),
        "name": part.name(),
        "type": part.kind().as_str(),
        "quantity": part.quantity(),
        "bill_of_materials": part
            .bill_of_materials()
            .iter()
            .map(|line| serde_json::json!({
                "sub_part_id": line.sub_part_id.as_str(),
                "quantity_per_unit": line.quantity_per_unit.get(),
            }))
            .collect::<Vec<_>>(),
        "created_at": part.created_at().to_rfc3339(),
        "updated_at": part.updated_at().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: serde_json::Value) -> CreatePartRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_legacy_field_names() {
        let new_part = request(serde_json::json!({
            "name": "Frame",
            "type": "assembled",
            "parts": [{"id": "bolt", "quantity": 4}],
        }))
        .into_new_part()
        .unwrap();

        assert_eq!(new_part.kind, PartKind::Assembled);
        assert_eq!(new_part.bill_of_materials[0].sub_part_id.as_str(), "bolt");
        assert_eq!(new_part.bill_of_materials[0].quantity_per_unit.get(), 4);
        assert!(new_part.id.is_none());
    }

    #[test]
    fn rejects_non_positive_per_unit_and_missing_type() {
        let zero = request(serde_json::json!({
            "name": "Frame",
            "type": "ASSEMBLED",
            "bill_of_materials": [{"sub_part_id": "bolt", "quantity_per_unit": 0}],
        }));
        assert!(matches!(zero.into_new_part(), Err(DomainError::Validation(_))));

        let untyped = request(serde_json::json!({"name": "Bolt"}));
        assert!(matches!(untyped.into_new_part(), Err(DomainError::Validation(_))));

        let blank_id = request(serde_json::json!({"id": " ", "name": "Bolt", "type": "RAW"}));
        assert!(matches!(blank_id.into_new_part(), Err(DomainError::InvalidId(_))));
    }
}
