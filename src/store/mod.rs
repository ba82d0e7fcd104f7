//! 持久化协作方：窄 CRUD 接口
//!
//! 核心只依赖 create / find_by_id / update / delete_by_id / query 这几个操作，不依赖具体存储引擎。
//! 内存实现适用于全部三类记录；审计记录另有 SQLite 实现（见 sqlite.rs）。

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::DockResult;

pub use memory::MemoryRepository;
pub use sqlite::SqliteAuditStore;

/// 可持久化记录：id、创建时间（默认排序键）与过滤匹配
pub trait Record: Clone + Send + Sync + 'static {
    type Filter: Default + Send + Sync;

    fn id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    fn matches(&self, filter: &Self::Filter) -> bool;
}

/// 分页：page 从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit,
        }
    }

    pub fn skip(&self) -> usize {
        (self.page.max(1) - 1) * self.limit
    }
}

/// 按创建时间排序，默认新的在前
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// 就地修改一条记录的补丁
pub type Patch<T> = Box<dyn FnOnce(&mut T) + Send>;

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn create(&self, record: T) -> DockResult<T>;

    async fn find_by_id(&self, id: &str) -> DockResult<Option<T>>;

    /// 记录不存在时返回 Ok(None)
    async fn update(&self, id: &str, patch: Patch<T>) -> DockResult<Option<T>>;

    async fn delete_by_id(&self, id: &str) -> DockResult<bool>;

    async fn query(&self, filter: &T::Filter, page: Option<Page>, sort: SortOrder) -> DockResult<Vec<T>>;

    async fn count(&self, filter: &T::Filter) -> DockResult<usize>;

    /// 删除所有记录，返回删除条数
    async fn clear(&self) -> DockResult<usize>;
}

/// 在已按过滤条件选出的记录上应用排序与分页（内存实现与 SQLite 实现共用）
pub(crate) fn sort_and_page<T: Record>(mut records: Vec<T>, page: Option<Page>, sort: SortOrder) -> Vec<T> {
    match sort {
        SortOrder::NewestFirst => records.sort_by_key(|r| std::cmp::Reverse(r.created_at())),
        SortOrder::OldestFirst => records.sort_by_key(|r| r.created_at()),
    }
    match page {
        Some(p) => records.into_iter().skip(p.skip()).take(p.limit).collect(),
        None => records,
    }
}
