//! Bill-of-materials validation.
//!
//! A proposed BOM is valid when every referenced sub-part resolves and no root-to-leaf
//! path visits the same part twice. The visited set is scoped to the current path, so a
//! sub-part shared by independent branches (a diamond) is accepted while a true cycle is
//! rejected.

use std::collections::{HashMap, HashSet};

use partforge_core::PartId;

use crate::error::ValidationError;
use crate::part::{BomEntry, Part};

/// Read-only access to already-loaded parts.
pub trait PartLookup {
    fn lookup(&self, id: &PartId) -> Option<&Part>;
}

impl PartLookup for HashMap<PartId, Part> {
    fn lookup(&self, id: &PartId) -> Option<&Part> {
        self.get(id)
    }
}

struct Frame<'a> {
    entries: &'a [BomEntry],
    next: usize,
    /// Path member to drop once this frame is exhausted.
    owner: Option<&'a PartId>,
}

/// Validate the bill of materials proposed for the part `root`.
///
/// `root` starts on the path, so a BOM that names the part being created fails with
/// [`ValidationError::CircularDependency`]. Entries are walked depth-first in stored
/// order and the first failure is returned.
pub fn validate_bom<L>(root: &PartId, bom: &[BomEntry], parts: &L) -> Result<(), ValidationError>
where
    L: PartLookup + ?Sized,
{
    let mut path: HashSet<&PartId> = HashSet::from([root]);
    // Assemblies whose whole subtree was already walked without error. Re-walking them
    // from another branch cannot find anything new, since any cycle through the current
    // path would have been hit the first time.
    let mut cleared: HashSet<&PartId> = HashSet::new();
    let mut stack = vec![Frame {
        entries: bom,
        next: 0,
        owner: None,
    }];

    while let Some(frame) = stack.last_mut() {
        let entries = frame.entries;
        let Some(entry) = entries.get(frame.next) else {
            if let Some(owner) = frame.owner {
                path.remove(owner);
                cleared.insert(owner);
            }
            stack.pop();
            continue;
        };
        frame.next += 1;

        let sub_id = &entry.sub_part_id;
        if path.contains(sub_id) {
            return Err(ValidationError::CircularDependency(sub_id.clone()));
        }
        if cleared.contains(sub_id) {
            continue;
        }
        let sub = parts
            .lookup(sub_id)
            .ok_or_else(|| ValidationError::UnknownSubPart(sub_id.clone()))?;

        // Raw parts join and leave the path immediately, so only assemblies are pushed.
        if sub.is_assembled() && !sub.bill_of_materials().is_empty() {
            path.insert(sub_id);
            stack.push(Frame {
                entries: sub.bill_of_materials(),
                next: 0,
                owner: Some(sub_id),
            });
        }
    }

    Ok(())
}
