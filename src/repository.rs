//! Storage-agnostic persistence boundary. The engine core only ever
//! depends on these traits; a concrete backend (Postgres, in-memory,
//! whatever the host application already runs) plugs in underneath.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::ResolverError;
use crate::queue::{QueueFilter, QueueItem};
use crate::record::SourceRecord;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<SourceRecord>, ResolverError>;
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<SourceRecord>, ResolverError>;
    async fn find_by_blocking_keys(&self, keys: &[String]) -> Result<Vec<SourceRecord>, ResolverError>;
    async fn count(&self) -> Result<usize, ResolverError>;
    async fn insert(&self, record: SourceRecord) -> Result<(), ResolverError>;
    async fn update(&self, record: SourceRecord) -> Result<(), ResolverError>;
    async fn delete(&self, id: &str) -> Result<(), ResolverError>;
    async fn batch_insert(&self, records: Vec<SourceRecord>) -> Result<(), ResolverError>;
    async fn batch_update(&self, records: Vec<SourceRecord>) -> Result<(), ResolverError>;
}

#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn insert_item(&self, item: QueueItem) -> Result<(), ResolverError>;
    async fn update_item(&self, item: QueueItem) -> Result<(), ResolverError>;
    async fn find_item(&self, id: &str) -> Result<Option<QueueItem>, ResolverError>;
    async fn find_items(&self, filter: &QueueFilter) -> Result<Vec<QueueItem>, ResolverError>;
    async fn count_items(&self, filter: &QueueFilter) -> Result<usize, ResolverError>;
    async fn delete_item(&self, id: &str) -> Result<(), ResolverError>;
    async fn batch_insert_items(&self, items: Vec<QueueItem>) -> Result<(), ResolverError>;
}

/// Reference `Repository` implementation backed by an in-memory map.
/// Intended for tests and examples, not production storage.
#[derive(Default)]
pub struct InMemoryRepository {
    records: RwLock<HashMap<String, SourceRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_all(&self) -> Result<Vec<SourceRecord>, ResolverError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<SourceRecord>, ResolverError> {
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn find_by_blocking_keys(&self, keys: &[String]) -> Result<Vec<SourceRecord>, ResolverError> {
        // In-memory reference store has no index; a real backend would
        // look these up through a `blocking_key -> record_id` table.
        let _ = keys;
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, ResolverError> {
        Ok(self.records.read().await.len())
    }

    async fn insert(&self, record: SourceRecord) -> Result<(), ResolverError> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update(&self, record: SourceRecord) -> Result<(), ResolverError> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ResolverError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn batch_insert(&self, records: Vec<SourceRecord>) -> Result<(), ResolverError> {
        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn batch_update(&self, records: Vec<SourceRecord>) -> Result<(), ResolverError> {
        self.batch_insert(records).await
    }
}

/// Reference `QueueRepository` implementation backed by an in-memory
/// map, reusing `ReviewQueue`'s filter semantics.
#[derive(Default)]
pub struct InMemoryQueueRepository {
    queue: RwLock<crate::queue::ReviewQueue>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn insert_item(&self, item: QueueItem) -> Result<(), ResolverError> {
        self.queue.write().await.insert(item);
        Ok(())
    }

    async fn update_item(&self, item: QueueItem) -> Result<(), ResolverError> {
        self.queue.write().await.insert(item);
        Ok(())
    }

    async fn find_item(&self, id: &str) -> Result<Option<QueueItem>, ResolverError> {
        Ok(self.queue.read().await.get(id).cloned())
    }

    async fn find_items(&self, filter: &QueueFilter) -> Result<Vec<QueueItem>, ResolverError> {
        Ok(self.queue.read().await.find(filter).into_iter().cloned().collect())
    }

    async fn count_items(&self, filter: &QueueFilter) -> Result<usize, ResolverError> {
        Ok(self.queue.read().await.count(filter))
    }

    async fn delete_item(&self, id: &str) -> Result<(), ResolverError> {
        self.queue.write().await.delete(id).map(|_| ())
    }

    async fn batch_insert_items(&self, items: Vec<QueueItem>) -> Result<(), ResolverError> {
        let mut queue = self.queue.write().await;
        for item in items {
            queue.insert(item);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::record::Record;

    #[tokio::test]
    async fn in_memory_repository_roundtrips() {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        repo.insert(SourceRecord::new("r1", Record::new(), now, now)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        let found = repo.find_by_ids(&["r1".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1);
        repo.delete("r1").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn in_memory_queue_repository_roundtrips() {
        let repo = InMemoryQueueRepository::new();
        let item = QueueItem::new("q1", Record::new(), vec![], 0);
        repo.insert_item(item).await.unwrap();
        assert_eq!(repo.count_items(&QueueFilter::default()).await.unwrap(), 1);
        let found = repo.find_item("q1").await.unwrap();
        assert!(found.is_some());
        repo.delete_item("q1").await.unwrap();
        assert!(repo.find_item("q1").await.unwrap().is_none());
    }
}
