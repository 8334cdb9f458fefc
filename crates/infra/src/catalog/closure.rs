//! Loading the transitive closure of a bill of materials.

use std::collections::{HashMap, HashSet};

use partforge_core::PartId;
use partforge_parts::{BomEntry, Part};

use super::r#trait::{CatalogError, PartReader};

/// Load every part reachable from `bom`, one batch read per BOM level.
///
/// `loaded` seeds the result with parts the caller already holds; they are not read
/// again, but their own BOMs are not walked either. Each id is requested at most once,
/// so stored cycles terminate. Ids without a record are left out of the result for the
/// caller to report.
pub async fn load_bom_closure<R>(
    reader: &mut R,
    bom: &[BomEntry],
    mut loaded: HashMap<PartId, Part>,
) -> Result<HashMap<PartId, Part>, CatalogError>
where
    R: PartReader + ?Sized,
{
    let mut requested: HashSet<PartId> = loaded.keys().cloned().collect();
    let mut frontier = next_level(bom, &mut requested);

    while !frontier.is_empty() {
        let level = reader.read_many(&frontier).await?;
        let mut next = Vec::new();
        for part in level.values() {
            next.extend(next_level(part.bill_of_materials(), &mut requested));
        }
        loaded.extend(level);
        frontier = next;
    }

    Ok(loaded)
}

fn next_level(bom: &[BomEntry], requested: &mut HashSet<PartId>) -> Vec<PartId> {
    bom.iter()
        .filter(|entry| requested.insert(entry.sub_part_id.clone()))
        .map(|entry| entry.sub_part_id.clone())
        .collect()
}
