//! SQLite 审计仓库
//!
//! 每条记录整体以 JSON 存入 body 列，agent_id / tool_id / user_id / status / timestamp 另存一列用于过滤与排序。
//! rusqlite 为同步 API，所有访问放在 spawn_blocking 中，连接由 Mutex 串行化。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::audit::{AuditFilter, AuditRecord};
use crate::core::{DockError, DockResult};
use crate::store::{Page, Patch, Repository, SortOrder};

pub struct SqliteAuditStore {
    conn: Arc<Mutex<Connection>>,
}

fn persist_err(e: impl std::fmt::Display) -> DockError {
    DockError::Persistence(e.to_string())
}

impl SqliteAuditStore {
    pub fn open(path: impl AsRef<Path>) -> DockResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(persist_err)?;
        }
        let conn = Connection::open(path).map_err(persist_err)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> DockResult<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(persist_err)?)
    }

    fn from_connection(conn: Connection) -> DockResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_records (
                id TEXT PRIMARY KEY,
                agent_id TEXT,
                tool_id TEXT,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_agent ON audit_records(agent_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_records(user_id, timestamp);",
        )
        .map_err(persist_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<R, F>(&self, f: F) -> DockResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&Connection) -> DockResult<R> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| DockError::Persistence("audit store lock poisoned".into()))?;
            f(&conn)
        })
        .await
        .map_err(persist_err)?
    }
}

fn write_record(conn: &Connection, record: &AuditRecord, replace: bool) -> DockResult<()> {
    let body = serde_json::to_string(record).map_err(persist_err)?;
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    conn.execute(
        &format!(
            "{verb} INTO audit_records (id, agent_id, tool_id, user_id, status, timestamp, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            record.id,
            record.agent_id,
            record.tool_id,
            record.user_id,
            record.status.as_str(),
            record.timestamp.timestamp_millis(),
            body,
        ],
    )
    .map_err(persist_err)?;
    Ok(())
}

fn read_record(conn: &Connection, id: &str) -> DockResult<Option<AuditRecord>> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM audit_records WHERE id = ?1", params![id], |row| row.get(0))
        .optional()
        .map_err(persist_err)?;
    body.map(|b| serde_json::from_str(&b).map_err(persist_err)).transpose()
}

/// 把过滤条件转成 WHERE 子句与参数（全部为字符串）
fn where_clause(filter: &AuditFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    let mut push = |column: &str, value: Option<&str>| {
        if let Some(v) = value {
            values.push(v.to_string());
            conditions.push(format!("{column} = ?{}", values.len()));
        }
    };
    push("agent_id", filter.agent_id.as_deref());
    push("tool_id", filter.tool_id.as_deref());
    push("user_id", filter.user_id.as_deref());
    push("status", filter.status.map(|s| s.as_str()));
    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

#[async_trait]
impl Repository<AuditRecord> for SqliteAuditStore {
    async fn create(&self, record: AuditRecord) -> DockResult<AuditRecord> {
        self.with_conn(move |conn| {
            write_record(conn, &record, false)?;
            Ok(record)
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> DockResult<Option<AuditRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| read_record(conn, &id)).await
    }

    async fn update(&self, id: &str, patch: Patch<AuditRecord>) -> DockResult<Option<AuditRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let Some(mut record) = read_record(conn, &id)? else {
                return Ok(None);
            };
            patch(&mut record);
            write_record(conn, &record, true)?;
            Ok(Some(record))
        })
        .await
    }

    async fn delete_by_id(&self, id: &str) -> DockResult<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let n = conn
                .execute("DELETE FROM audit_records WHERE id = ?1", params![id])
                .map_err(persist_err)?;
            Ok(n > 0)
        })
        .await
    }

    async fn query(&self, filter: &AuditFilter, page: Option<Page>, sort: SortOrder) -> DockResult<Vec<AuditRecord>> {
        let (clause, values) = where_clause(filter);
        let order = match sort {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        };
        let paging = page
            .map(|p| format!(" LIMIT {} OFFSET {}", p.limit, p.skip()))
            .unwrap_or_default();
        let sql = format!("SELECT body FROM audit_records{clause} ORDER BY timestamp {order}{paging}");
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(persist_err)?;
            let bodies = stmt
                .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))
                .map_err(persist_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(persist_err)?;
            bodies
                .iter()
                .map(|b| serde_json::from_str(b).map_err(persist_err))
                .collect()
        })
        .await
    }

    async fn count(&self, filter: &AuditFilter) -> DockResult<usize> {
        let (clause, values) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_records{clause}");
        self.with_conn(move |conn| {
            let n: i64 = conn
                .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
                .map_err(persist_err)?;
            Ok(n as usize)
        })
        .await
    }

    async fn clear(&self) -> DockResult<usize> {
        self.with_conn(|conn| conn.execute("DELETE FROM audit_records", []).map_err(persist_err))
            .await
    }
}
