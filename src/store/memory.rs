//! 内存仓库：HashMap + tokio RwLock，适用于任意 Record

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{DockError, DockResult};
use crate::store::{sort_and_page, Page, Patch, Record, Repository, SortOrder};

pub struct MemoryRepository<T: Record> {
    records: RwLock<HashMap<String, T>>,
}

impl<T: Record> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// 用一组记录预填充（启动时载入种子描述符）
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|r| (r.id().to_string(), r))
                    .collect(),
            ),
        }
    }
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn create(&self, record: T) -> DockResult<T> {
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(DockError::Persistence(format!(
                "record {} already exists",
                record.id()
            )));
        }
        records.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> DockResult<Option<T>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: Patch<T>) -> DockResult<Option<T>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(id).map(|record| {
            patch(record);
            record.clone()
        }))
    }

    async fn delete_by_id(&self, id: &str) -> DockResult<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn query(&self, filter: &T::Filter, page: Option<Page>, sort: SortOrder) -> DockResult<Vec<T>> {
        let matched: Vec<T> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.matches(filter))
            .cloned()
            .collect();
        Ok(sort_and_page(matched, page, sort))
    }

    async fn count(&self, filter: &T::Filter) -> DockResult<usize> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.matches(filter))
            .count())
    }

    async fn clear(&self) -> DockResult<usize> {
        let mut records = self.records.write().await;
        let n = records.len();
        records.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{AgentDescriptor, AgentFilter};

    #[tokio::test]
    async fn test_crud_and_paging() {
        let repo = MemoryRepository::new();
        for i in 0..5 {
            let mut d = AgentDescriptor::new(format!("a{i}"), "custom", format!("Agent {i}"));
            d.created_at = chrono::Utc::now() + chrono::Duration::seconds(i);
            repo.create(d).await.unwrap();
        }
        assert!(repo
            .create(AgentDescriptor::new("a0", "custom", "dup"))
            .await
            .is_err());

        let page = repo
            .query(&AgentFilter::default(), Some(Page::new(1, 2)), SortOrder::NewestFirst)
            .await
            .unwrap();
        assert_eq!(page.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["a4", "a3"]);

        let updated = repo
            .update("a1", Box::new(|d: &mut AgentDescriptor| d.is_active = false))
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_active);

        let active = AgentFilter {
            is_active: Some(true),
            ..AgentFilter::default()
        };
        assert_eq!(repo.count(&active).await.unwrap(), 4);

        assert!(repo.delete_by_id("a2").await.unwrap());
        assert!(!repo.delete_by_id("a2").await.unwrap());
        assert!(repo.update("a2", Box::new(|_: &mut AgentDescriptor| {})).await.unwrap().is_none());
    }
}
