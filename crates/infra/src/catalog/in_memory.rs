use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use partforge_core::{Entity, PartId};
use partforge_parts::Part;

use super::r#trait::{CatalogError, CatalogTransaction, PartCatalog, PartReader};

/// In-memory part catalog.
///
/// Intended for tests/dev. A single async mutex guards every record; an open transaction
/// holds it until commit, rollback or drop, so transactions run one at a time in the order
/// they called `begin`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPartCatalog {
    records: Arc<Mutex<HashMap<PartId, Part>>>,
}

impl InMemoryPartCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with `parts`, bypassing creation checks.
    pub fn with_parts(parts: impl IntoIterator<Item = Part>) -> Self {
        Self {
            records: Arc::new(Mutex::new(partforge_core::entity::index_by_id(parts))),
        }
    }
}

#[async_trait::async_trait]
impl PartCatalog for InMemoryPartCatalog {
    type Transaction = InMemoryTransaction;

    async fn get(&self, id: &PartId) -> Result<Option<Part>, CatalogError> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn get_many(&self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError> {
        let records = self.records.lock().await;
        Ok(collect(ids, |id| records.get(id)))
    }

    async fn create(&self, part: &Part) -> Result<(), CatalogError> {
        let mut records = self.records.lock().await;
        if records.contains_key(part.id()) {
            return Err(CatalogError::AlreadyExists(part.id().clone()));
        }
        records.insert(part.id().clone(), part.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Part>, CatalogError> {
        let mut parts: Vec<Part> = self.records.lock().await.values().cloned().collect();
        parts.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(parts)
    }

    async fn begin(&self) -> Result<Self::Transaction, CatalogError> {
        let guard = Arc::clone(&self.records).lock_owned().await;
        Ok(InMemoryTransaction {
            records: guard,
            staged: HashMap::new(),
        })
    }
}

/// Exclusive unit of work over an [`InMemoryPartCatalog`].
///
/// Saves are staged and only reach the shared map on commit.
#[derive(Debug)]
pub struct InMemoryTransaction {
    records: OwnedMutexGuard<HashMap<PartId, Part>>,
    staged: HashMap<PartId, Part>,
}

impl InMemoryTransaction {
    fn current(&self, id: &PartId) -> Option<&Part> {
        self.staged.get(id).or_else(|| self.records.get(id))
    }
}

#[async_trait::async_trait]
impl PartReader for InMemoryTransaction {
    async fn read_many(&mut self, ids: &[PartId]) -> Result<HashMap<PartId, Part>, CatalogError> {
        Ok(collect(ids, |id| self.current(id)))
    }
}

#[async_trait::async_trait]
impl CatalogTransaction for InMemoryTransaction {
    async fn save(&mut self, part: &Part) -> Result<(), CatalogError> {
        if self.current(part.id()).is_none() {
            return Err(CatalogError::Missing(part.id().clone()));
        }
        self.staged.insert(part.id().clone(), part.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), CatalogError> {
        let staged = std::mem::take(&mut self.staged);
        self.records.extend(staged);
        Ok(())
    }

    async fn rollback(self) -> Result<(), CatalogError> {
        Ok(())
    }
}

fn collect<'a>(
    ids: &[PartId],
    lookup: impl Fn(&PartId) -> Option<&'a Part>,
) -> HashMap<PartId, Part> {
    ids.iter()
        .filter_map(|id| lookup(id).map(|part| (id.clone(), part.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use partforge_parts::{NewPart, StockSheet};

    fn pid(raw: &str) -> PartId {
        PartId::new(raw).unwrap()
    }

    fn raw(id: &str) -> Part {
        NewPart::raw(id).into_part(pid(id), Utc::now())
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let catalog = InMemoryPartCatalog::new();
        catalog.create(&raw("a")).await.unwrap();
        assert_eq!(
            catalog.create(&raw("a")).await,
            Err(CatalogError::AlreadyExists(pid("a")))
        );
    }

    #[tokio::test]
    async fn list_all_orders_by_creation_then_id() {
        let now = Utc::now();
        let catalog = InMemoryPartCatalog::with_parts(vec![
            NewPart::raw("late").into_part(pid("late"), now + Duration::seconds(1)),
            NewPart::raw("b").into_part(pid("b"), now),
            NewPart::raw("a").into_part(pid("a"), now),
        ]);
        let ids: Vec<_> = catalog
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|p| p.id().clone())
            .collect();
        assert_eq!(ids, vec![pid("a"), pid("b"), pid("late")]);
    }

    #[tokio::test]
    async fn commit_publishes_staged_saves() {
        let catalog = InMemoryPartCatalog::with_parts(vec![raw("a")]);

        let mut tx = catalog.begin().await.unwrap();
        let mut sheet = StockSheet::new(tx.read_many(&[pid("a")]).await.unwrap().into_values());
        sheet.add_stock(&pid("a"), 7).unwrap();
        for part in sheet.into_changed(Utc::now()) {
            tx.save(&part).await.unwrap();
        }
        // The transaction sees its own write.
        let seen = tx.read_many(&[pid("a")]).await.unwrap();
        assert_eq!(seen[&pid("a")].quantity(), 7);
        tx.commit().await.unwrap();

        assert_eq!(catalog.get(&pid("a")).await.unwrap().unwrap().quantity(), 7);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let catalog = InMemoryPartCatalog::with_parts(vec![raw("a")]);
        {
            let mut tx = catalog.begin().await.unwrap();
            let mut sheet = StockSheet::new(tx.read_many(&[pid("a")]).await.unwrap().into_values());
            sheet.add_stock(&pid("a"), 3).unwrap();
            for part in sheet.into_changed(Utc::now()) {
                tx.save(&part).await.unwrap();
            }
        }
        assert_eq!(catalog.get(&pid("a")).await.unwrap().unwrap().quantity(), 0);
    }

    #[tokio::test]
    async fn save_of_unknown_part_is_rejected() {
        let catalog = InMemoryPartCatalog::new();
        let mut tx = catalog.begin().await.unwrap();
        assert_eq!(
            tx.save(&raw("ghost")).await,
            Err(CatalogError::Missing(pid("ghost")))
        );
        tx.rollback().await.unwrap();
    }
}
