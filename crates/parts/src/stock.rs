//! Stock addition and recursive sub-part deduction.
//!
//! A [`StockSheet`] is a working copy of one part and the transitive closure of its bill
//! of materials. The infrastructure layer loads it inside a catalog transaction, runs
//! [`StockSheet::add_stock`] on it, then saves [`StockSheet::into_changed`] before commit.
//! The sheet itself performs no IO.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use partforge_core::{PartId, entity::index_by_id};

use crate::error::OperationError;
use crate::part::{BomEntry, Part};

/// Largest stock level a part may hold. Totals must fit a signed 64-bit column.
pub const MAX_STOCK: u64 = i64::MAX as u64;

/// Parse a requested stock quantity. Only positive integers are accepted.
pub fn requested_quantity(raw: i64) -> Result<u64, OperationError> {
    u64::try_from(raw)
        .ok()
        .filter(|quantity| *quantity > 0)
        .ok_or(OperationError::InvalidQuantity(raw))
}

/// Transaction-local working copy of the parts one stock addition may touch.
#[derive(Debug, Clone, Default)]
pub struct StockSheet {
    parts: HashMap<PartId, Part>,
    changed: Vec<PartId>,
    touched: HashSet<PartId>,
}

/// An assembly being built: `multiplier` units of `part_id`, with `bom[next..]` still
/// to consume.
struct Build {
    part_id: PartId,
    multiplier: u64,
    bom: Vec<BomEntry>,
    next: usize,
}

impl StockSheet {
    pub fn new(parts: impl IntoIterator<Item = Part>) -> Self {
        Self {
            parts: index_by_id(parts),
            ..Self::default()
        }
    }

    pub fn get(&self, id: &PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    /// Add `quantity` units of `part_id`.
    ///
    /// A RAW part is simply credited. An ASSEMBLED part first consumes its sub-parts
    /// (level by level, with the multiplier carried down) and is then credited.
    /// On error the sheet is left exactly as it was before the call.
    pub fn add_stock(&mut self, part_id: &PartId, quantity: u64) -> Result<&Part, OperationError> {
        let is_assembled = self
            .parts
            .get(part_id)
            .map(Part::is_assembled)
            .ok_or_else(|| OperationError::PartNotFound(part_id.clone()))?;

        let before = self.clone();
        let outcome = if is_assembled {
            self.deduct(part_id, quantity)
        } else {
            Ok(())
        }
        .and_then(|()| self.credit(part_id, quantity));

        if let Err(err) = outcome {
            *self = before;
            return Err(err);
        }
        self.parts
            .get(part_id)
            .ok_or_else(|| OperationError::PartNotFound(part_id.clone()))
    }

    /// Parts modified so far, in first-touch order.
    pub fn changed(&self) -> impl Iterator<Item = &Part> {
        self.changed.iter().filter_map(|id| self.parts.get(id))
    }

    /// Consume the sheet, returning the modified parts stamped with `at`.
    pub fn into_changed(mut self, at: DateTime<Utc>) -> Vec<Part> {
        self.changed
            .iter()
            .filter_map(|id| self.parts.remove(id))
            .map(|mut part| {
                part.touch(at);
                part
            })
            .collect()
    }

    /// Consume the sub-parts needed to build `multiplier` units of `root`.
    ///
    /// Each assembly's BOM is checked against current stock before any of its lines is
    /// deducted. Lines are then processed in stored order. An assembled sub-part is built
    /// from its own sub-parts *and*, once that finishes, reduced from its own stock by the
    /// same amount: building the parent both builds the intermediate assembly and consumes
    /// existing units of it. Whether that double effect is intended is an open question;
    /// it is kept as is.
    ///
    /// Assemblies are walked with an explicit stack, so BOM depth is bounded by memory
    /// rather than by the thread's stack.
    fn deduct(&mut self, root: &PartId, multiplier: u64) -> Result<(), OperationError> {
        let mut path: HashSet<PartId> = HashSet::new();
        let mut stack = vec![self.enter(root, multiplier, &mut path)?];

        while let Some(build) = stack.last_mut() {
            if build.next == build.bom.len() {
                let Some(done) = stack.pop() else { break };
                path.remove(&done.part_id);
                // The root is credited by the caller; sub-assemblies are drawn down.
                if !stack.is_empty() {
                    self.withdraw(&done.part_id, done.multiplier)?;
                }
                continue;
            }

            let line = build.bom[build.next].clone();
            build.next += 1;
            let required = line
                .required_for(build.multiplier)
                .ok_or_else(|| OperationError::QuantityOverflow(line.sub_part_id.clone()))?;

            let sub_is_assembled = self
                .parts
                .get(&line.sub_part_id)
                .map(Part::is_assembled)
                .ok_or_else(|| OperationError::SubPartNotFound(line.sub_part_id.clone()))?;

            if sub_is_assembled {
                let child = self.enter(&line.sub_part_id, required, &mut path)?;
                stack.push(child);
            } else {
                self.withdraw(&line.sub_part_id, required)?;
            }
        }

        Ok(())
    }

    /// Start building `multiplier` units of `part_id`: reject a cycle on the current path,
    /// then check every BOM line against current stock before anything at this level moves.
    fn enter(
        &self,
        part_id: &PartId,
        multiplier: u64,
        path: &mut HashSet<PartId>,
    ) -> Result<Build, OperationError> {
        if path.contains(part_id) {
            return Err(OperationError::CircularBom(part_id.clone()));
        }
        let bom = self
            .parts
            .get(part_id)
            .ok_or_else(|| OperationError::SubPartNotFound(part_id.clone()))?
            .bill_of_materials()
            .to_vec();

        for line in &bom {
            let required = line
                .required_for(multiplier)
                .ok_or_else(|| OperationError::QuantityOverflow(line.sub_part_id.clone()))?;
            let sub = self
                .parts
                .get(&line.sub_part_id)
                .ok_or_else(|| OperationError::SubPartNotFound(line.sub_part_id.clone()))?;
            if sub.quantity() < required {
                return Err(OperationError::InsufficientSubStock {
                    part_id: line.sub_part_id.clone(),
                    required,
                    available: sub.quantity(),
                });
            }
        }

        path.insert(part_id.clone());
        Ok(Build {
            part_id: part_id.clone(),
            multiplier,
            bom,
            next: 0,
        })
    }

    /// Subtract from current stock. Shared sub-parts may have been drawn down since the
    /// pre-check, so the subtraction is checked again here.
    fn withdraw(&mut self, id: &PartId, quantity: u64) -> Result<(), OperationError> {
        let part = self
            .parts
            .get_mut(id)
            .ok_or_else(|| OperationError::SubPartNotFound(id.clone()))?;
        let available = part.quantity();
        let remaining =
            available
                .checked_sub(quantity)
                .ok_or_else(|| OperationError::InsufficientSubStock {
                    part_id: id.clone(),
                    required: quantity,
                    available,
                })?;
        part.set_quantity(remaining);
        self.mark_changed(id);
        Ok(())
    }

    fn credit(&mut self, id: &PartId, quantity: u64) -> Result<(), OperationError> {
        let part = self
            .parts
            .get_mut(id)
            .ok_or_else(|| OperationError::PartNotFound(id.clone()))?;
        let total = part
            .quantity()
            .checked_add(quantity)
            .filter(|total| *total <= MAX_STOCK)
            .ok_or_else(|| OperationError::QuantityOverflow(id.clone()))?;
        part.set_quantity(total);
        self.mark_changed(id);
        Ok(())
    }

    fn mark_changed(&mut self, id: &PartId) {
        if self.touched.insert(id.clone()) {
            self.changed.push(id.clone());
        }
    }
}

impl FromIterator<Part> for StockSheet {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::num::NonZeroU32;

    use partforge_core::Entity;

    use crate::part::PartKind;

    fn pid(raw: &str) -> PartId {
        PartId::new(raw).unwrap()
    }

    fn entry(id: &str, per_unit: u32) -> BomEntry {
        BomEntry::new(pid(id), NonZeroU32::new(per_unit).unwrap())
    }

    fn raw(id: &str, quantity: u64) -> Part {
        Part::restore(
            pid(id),
            id.to_string(),
            PartKind::Raw,
            quantity,
            vec![],
            Utc::now(),
            Utc::now(),
        )
        .unwrap()
    }

    fn assembled(id: &str, quantity: u64, bom: Vec<BomEntry>) -> Part {
        Part::restore(
            pid(id),
            id.to_string(),
            PartKind::Assembled,
            quantity,
            bom,
            Utc::now(),
            Utc::now(),
        )
        .unwrap()
    }

    fn qty(sheet: &StockSheet, id: &str) -> u64 {
        sheet.get(&pid(id)).unwrap().quantity()
    }

    #[test]
    fn requested_quantity_rejects_non_positive() {
        assert_eq!(requested_quantity(3), Ok(3));
        assert_eq!(requested_quantity(0), Err(OperationError::InvalidQuantity(0)));
        assert_eq!(requested_quantity(-4), Err(OperationError::InvalidQuantity(-4)));
    }

    #[test]
    fn raw_part_is_credited_and_nothing_else_changes() {
        let mut sheet = StockSheet::new(vec![raw("a", 10), raw("b", 1)]);
        let updated = sheet.add_stock(&pid("a"), 5).unwrap();
        assert_eq!(updated.quantity(), 15);
        assert_eq!(qty(&sheet, "b"), 1);
        let changed: Vec<_> = sheet.changed().map(|p| p.id().clone()).collect();
        assert_eq!(changed, vec![pid("a")]);
    }

    #[test]
    fn assembly_consumes_sub_parts_then_fails_on_shortfall() {
        let mut sheet = StockSheet::new(vec![raw("a", 10), assembled("b", 0, vec![entry("a", 2)])]);

        sheet.add_stock(&pid("b"), 3).unwrap();
        assert_eq!(qty(&sheet, "a"), 4);
        assert_eq!(qty(&sheet, "b"), 3);

        let err = sheet.add_stock(&pid("b"), 5).unwrap_err();
        assert_eq!(
            err,
            OperationError::InsufficientSubStock {
                part_id: pid("a"),
                required: 10,
                available: 4
            }
        );
        assert_eq!(qty(&sheet, "a"), 4);
        assert_eq!(qty(&sheet, "b"), 3);
    }

    #[test]
    fn multiplier_propagates_and_intermediate_assembly_is_also_consumed() {
        // top = [mid x2], mid = [r x3]; mid has 5 on hand.
        let mut sheet = StockSheet::new(vec![
            raw("r", 100),
            assembled("mid", 5, vec![entry("r", 3)]),
            assembled("top", 0, vec![entry("mid", 2)]),
        ]);

        sheet.add_stock(&pid("top"), 2).unwrap();

        // mid is built from r at multiplier 4 (2 x 2) and its own stock drops by 4.
        assert_eq!(qty(&sheet, "r"), 100 - 12);
        assert_eq!(qty(&sheet, "mid"), 1);
        assert_eq!(qty(&sheet, "top"), 2);
    }

    #[test]
    fn deep_shortfall_leaves_sheet_untouched() {
        let mut sheet = StockSheet::new(vec![
            raw("ok", 100),
            raw("scarce", 1),
            assembled("left", 10, vec![entry("ok", 1)]),
            assembled("right", 10, vec![entry("scarce", 5)]),
            assembled("top", 0, vec![entry("left", 1), entry("right", 1)]),
        ]);

        let err = sheet.add_stock(&pid("top"), 1).unwrap_err();
        assert!(matches!(err, OperationError::InsufficientSubStock { ref part_id, .. } if *part_id == pid("scarce")));

        // "left" had already been processed when "right" failed; nothing survives.
        assert_eq!(qty(&sheet, "ok"), 100);
        assert_eq!(qty(&sheet, "left"), 10);
        assert_eq!(qty(&sheet, "right"), 10);
        assert_eq!(qty(&sheet, "top"), 0);
        assert_eq!(sheet.changed().count(), 0);
    }

    #[test]
    fn pre_check_covers_later_lines_before_mutating_earlier_ones() {
        let mut sheet = StockSheet::new(vec![
            raw("a", 10),
            raw("b", 0),
            assembled("kit", 0, vec![entry("a", 1), entry("b", 1)]),
        ]);
        let err = sheet.add_stock(&pid("kit"), 1).unwrap_err();
        assert!(matches!(err, OperationError::InsufficientSubStock { ref part_id, .. } if *part_id == pid("b")));
        assert_eq!(qty(&sheet, "a"), 10);
    }

    #[test]
    fn shared_sub_part_is_charged_against_reduced_stock() {
        // Both branches need 3 of "shared", which only has 5.
        let mut sheet = StockSheet::new(vec![
            raw("shared", 5),
            assembled("left", 10, vec![entry("shared", 3)]),
            assembled("right", 10, vec![entry("shared", 3)]),
            assembled("top", 0, vec![entry("left", 1), entry("right", 1)]),
        ]);
        let err = sheet.add_stock(&pid("top"), 1).unwrap_err();
        assert_eq!(
            err,
            OperationError::InsufficientSubStock {
                part_id: pid("shared"),
                required: 3,
                available: 2
            }
        );
        assert_eq!(qty(&sheet, "shared"), 5);
    }

    #[test]
    fn duplicate_lines_cannot_overdraw() {
        let mut sheet = StockSheet::new(vec![
            raw("a", 3),
            assembled("kit", 0, vec![entry("a", 2), entry("a", 2)]),
        ]);
        let err = sheet.add_stock(&pid("kit"), 1).unwrap_err();
        assert!(matches!(err, OperationError::InsufficientSubStock { available: 1, .. }));
        assert_eq!(qty(&sheet, "a"), 3);
    }

    #[test]
    fn missing_sub_part_is_reported() {
        let mut sheet = StockSheet::new(vec![assembled("kit", 0, vec![entry("ghost", 1)])]);
        assert_eq!(
            sheet.add_stock(&pid("kit"), 1).unwrap_err(),
            OperationError::SubPartNotFound(pid("ghost"))
        );
    }

    #[test]
    fn missing_target_is_reported() {
        let mut sheet = StockSheet::default();
        assert_eq!(
            sheet.add_stock(&pid("nope"), 1).unwrap_err(),
            OperationError::PartNotFound(pid("nope"))
        );
    }

    #[test]
    fn stored_cycle_is_reported_instead_of_recursing_forever() {
        let mut sheet = StockSheet::new(vec![
            assembled("x", 100, vec![entry("y", 1)]),
            assembled("y", 100, vec![entry("x", 1)]),
        ]);
        assert_eq!(
            sheet.add_stock(&pid("x"), 1).unwrap_err(),
            OperationError::CircularBom(pid("x"))
        );
    }

    #[test]
    fn multiplier_overflow_fails_explicitly() {
        let mut sheet = StockSheet::new(vec![
            raw("a", u64::MAX),
            assembled("kit", 0, vec![entry("a", u32::MAX)]),
        ]);
        assert_eq!(
            sheet.add_stock(&pid("kit"), u64::MAX / 2).unwrap_err(),
            OperationError::QuantityOverflow(pid("a"))
        );
    }

    #[test]
    fn credit_beyond_max_stock_fails_explicitly() {
        let mut sheet = StockSheet::new(vec![raw("a", MAX_STOCK - 1)]);
        sheet.add_stock(&pid("a"), 1).unwrap();
        assert_eq!(qty(&sheet, "a"), MAX_STOCK);

        assert_eq!(
            sheet.add_stock(&pid("a"), 1).unwrap_err(),
            OperationError::QuantityOverflow(pid("a"))
        );
        assert_eq!(qty(&sheet, "a"), MAX_STOCK);
    }

    #[test]
    fn assembled_credit_beyond_max_stock_rolls_back_consumption() {
        let mut sheet = StockSheet::new(vec![
            raw("a", 10),
            assembled("kit", MAX_STOCK, vec![entry("a", 1)]),
        ]);
        assert_eq!(
            sheet.add_stock(&pid("kit"), 1).unwrap_err(),
            OperationError::QuantityOverflow(pid("kit"))
        );
        assert_eq!(qty(&sheet, "a"), 10);
        assert_eq!(sheet.changed().count(), 0);
    }

    #[test]
    fn very_deep_chain_is_built_without_recursion() {
        // p0 = [p1], p1 = [p2], ... down to a raw leaf; every part holds 10.
        const DEPTH: usize = 50_000;
        let parts = (0..DEPTH).map(|i| {
            let id = format!("p{i}");
            if i + 1 == DEPTH {
                raw(&id, 10)
            } else {
                assembled(&id, 10, vec![entry(&format!("p{}", i + 1), 1)])
            }
        });
        let mut sheet = StockSheet::new(parts);

        assert_eq!(sheet.add_stock(&pid("p0"), 1).unwrap().quantity(), 11);

        assert_eq!(qty(&sheet, "p1"), 9);
        assert_eq!(qty(&sheet, &format!("p{}", DEPTH / 2)), 9);
        assert_eq!(qty(&sheet, &format!("p{}", DEPTH - 1)), 9);
        assert_eq!(sheet.changed().count(), DEPTH);
    }

    #[test]
    fn very_deep_chain_shortfall_at_the_leaf_rolls_back() {
        const DEPTH: usize = 50_000;
        let parts = (0..DEPTH).map(|i| {
            let id = format!("p{i}");
            if i + 1 == DEPTH {
                raw(&id, 0)
            } else {
                assembled(&id, 10, vec![entry(&format!("p{}", i + 1), 1)])
            }
        });
        let mut sheet = StockSheet::new(parts);

        let err = sheet.add_stock(&pid("p0"), 1).unwrap_err();

        assert!(matches!(err, OperationError::InsufficientSubStock { ref part_id, .. } if *part_id == pid(&format!("p{}", DEPTH - 1))));
        assert_eq!(qty(&sheet, "p1"), 10);
        assert_eq!(sheet.changed().count(), 0);
    }

    #[test]
    fn into_changed_stamps_updated_at() {
        let mut sheet = StockSheet::new(vec![raw("a", 10), assembled("b", 0, vec![entry("a", 1)])]);
        sheet.add_stock(&pid("b"), 1).unwrap();

        let at = Utc::now() + chrono::Duration::seconds(5);
        let changed = sheet.into_changed(at);
        let ids: Vec<_> = changed.iter().map(|p| p.id().clone()).collect();
        assert_eq!(ids, vec![pid("a"), pid("b")]);
        assert!(changed.iter().all(|p| p.updated_at() == at));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        /// Independent model of the consumption rule: every path from the target to a
        /// sub-part contributes `product(per_unit) x quantity`.
        fn expected_consumption(
            parts: &HashMap<PartId, Part>,
            id: &PartId,
            multiplier: u64,
            out: &mut HashMap<PartId, u64>,
        ) {
            for line in parts[id].bill_of_materials() {
                let need = u64::from(line.quantity_per_unit.get()) * multiplier;
                *out.entry(line.sub_part_id.clone()).or_default() += need;
                if parts[&line.sub_part_id].is_assembled() {
                    expected_consumption(parts, &line.sub_part_id, need, out);
                }
            }
        }

        fn layered_parts(
            size: usize,
            edges: &[(usize, usize, u32)],
            stock: &[u64],
        ) -> HashMap<PartId, Part> {
            let mut boms: Vec<Vec<BomEntry>> = vec![Vec::new(); size];
            for &(from, to, per_unit) in edges {
                let (from, to) = (from % size, to % size);
                if from < to {
                    boms[from].push(entry(&format!("p{to}"), per_unit));
                }
            }
            boms.into_iter()
                .enumerate()
                .map(|(i, bom)| {
                    let id = format!("p{i}");
                    let quantity = stock[i % stock.len()];
                    let part = if bom.is_empty() {
                        raw(&id, quantity)
                    } else {
                        assembled(&id, quantity, bom)
                    };
                    (pid(&id), part)
                })
                .collect()
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: a stock addition either applies exactly the modelled consumption or
            /// changes nothing at all.
            #[test]
            fn addition_is_exact_or_nothing(
                size in 1usize..8,
                edges in prop::collection::vec((0usize..8, 0usize..8, 1u32..4), 0..16),
                stock in prop::collection::vec(0u64..200, 1..8),
                quantity in 1u64..5,
            ) {
                let parts = layered_parts(size, &edges, &stock);
                let target = pid("p0");
                let mut sheet: StockSheet = parts.values().cloned().collect();

                let mut consumed = HashMap::new();
                if parts[&target].is_assembled() {
                    expected_consumption(&parts, &target, quantity, &mut consumed);
                }
                let feasible = consumed
                    .iter()
                    .all(|(id, need)| parts[id].quantity() >= *need);

                match sheet.add_stock(&target, quantity) {
                    Ok(updated) => {
                        prop_assert!(feasible, "succeeded although model says infeasible");
                        prop_assert_eq!(updated.quantity(), parts[&target].quantity() + quantity);
                        for (id, before) in &parts {
                            if *id == target {
                                continue;
                            }
                            let need = consumed.get(id).copied().unwrap_or(0);
                            prop_assert_eq!(sheet.get(id).unwrap().quantity(), before.quantity() - need);
                        }
                    }
                    Err(OperationError::InsufficientSubStock { .. }) => {
                        prop_assert!(!feasible, "failed although model says feasible");
                        for (id, before) in &parts {
                            prop_assert_eq!(sheet.get(id).unwrap().quantity(), before.quantity());
                        }
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
        }
    }
}
