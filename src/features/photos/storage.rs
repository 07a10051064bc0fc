use std::{path::Path, str::FromStr};

use sqlx::{
    ConnectOptions, Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::error::StoreError;

use super::models::PhotoRecord;

/// 照片列表键
pub const PHOTO_LIST_KEY: &str = "wedding:photos";
/// 照片计数器键
pub const PHOTO_COUNT_KEY: &str = "wedding:photos:count";

/// 列表中的一个条目：行号即条目身份，越大越新
#[derive(Debug, Clone)]
pub struct StoredPhoto {
    pub seq: i64,
    pub record: PhotoRecord,
}

/// 照片列表 + 计数器存储（SQLite）。
///
/// 语义上等价于一个按键组织的列表（头插、全量读取、按值删除）加一个冗余计数器；
/// 复合操作都放在事务里执行，计数器只随实际发生的增删变化。
#[derive(Clone)]
pub struct PhotoStore {
    pub pool: SqlitePool,
}

impl PhotoStore {
    pub async fn connect_sqlite(path: &str, wal: bool) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.into()))?;
        }
        let opt = SqliteConnectOptions::new()
            .filename(Path::new(path))
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Off);
        let pool = SqlitePool::connect_with(opt).await?;
        if wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&pool)
                .await
                .ok();
        }
        sqlx::query("PRAGMA synchronous=NORMAL;")
            .execute(&pool)
            .await
            .ok();
        Ok(Self { pool })
    }

    /// 内存数据库（单连接，连接不回收，否则数据随连接丢失）
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opt = SqliteConnectOptions::from_str("sqlite::memory:")?
            .log_statements(tracing::log::LevelFilter::Off);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opt)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let ddl = r#"
        CREATE TABLE IF NOT EXISTS list_entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            list_key TEXT NOT NULL,
            entry TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_list_entries_key_seq ON list_entries(list_key, seq DESC);

        CREATE TABLE IF NOT EXISTS counters (
            counter_key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        "#;
        sqlx::query(ddl).execute(&self.pool).await?;
        Ok(())
    }

    /// 头插一条记录并递增计数器（同一事务）
    pub async fn push_front(&self, record: &PhotoRecord) -> Result<i64, StoreError> {
        let entry = serde_json::to_string(record)?;
        let mut tx = self.pool.begin().await?;
        let seq = sqlx::query("INSERT INTO list_entries(list_key, entry) VALUES(?, ?)")
            .bind(PHOTO_LIST_KEY)
            .bind(&entry)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        sqlx::query(
            "INSERT INTO counters(counter_key, value) VALUES(?, 1)
             ON CONFLICT(counter_key) DO UPDATE SET value = value + 1",
        )
        .bind(PHOTO_COUNT_KEY)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(seq)
    }

    /// 读取整个列表（最新在前）
    pub async fn range_all(&self) -> Result<Vec<StoredPhoto>, StoreError> {
        let rows = sqlx::query(
            "SELECT seq, entry FROM list_entries WHERE list_key = ? ORDER BY seq DESC",
        )
        .bind(PHOTO_LIST_KEY)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let entry: String = row.try_get("entry")?;
            out.push(StoredPhoto {
                seq: row.try_get("seq")?,
                record: serde_json::from_str(&entry)?,
            });
        }
        Ok(out)
    }

    /// 按列表顺序线性查找第一个匹配项
    pub async fn find_first(&self, ident: &str) -> Result<Option<StoredPhoto>, StoreError> {
        Ok(self
            .range_all()
            .await?
            .into_iter()
            .find(|p| p.record.matches(ident)))
    }

    /// 删除指定条目；仅在确实删除了一行时递减计数器。返回是否删除。
    pub async fn remove_entry(&self, seq: i64) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM list_entries WHERE list_key = ? AND seq = ?")
            .bind(PHOTO_LIST_KEY)
            .bind(seq)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed > 0 {
            sqlx::query(
                "UPDATE counters SET value = MAX(value - ?, 0) WHERE counter_key = ?",
            )
            .bind(removed as i64)
            .bind(PHOTO_COUNT_KEY)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(removed > 0)
    }

    /// 清空 `seq <= max_seq` 的条目，计数器重置为剩余长度（无剩余则删除计数器）。
    ///
    /// 以快照中的最大行号为界，快照之后并发写入的条目会被保留。
    pub async fn clear_through(&self, max_seq: i64) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM list_entries WHERE list_key = ? AND seq <= ?")
            .bind(PHOTO_LIST_KEY)
            .bind(max_seq)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM list_entries WHERE list_key = ?")
                .bind(PHOTO_LIST_KEY)
                .fetch_one(&mut *tx)
                .await?;
        if remaining == 0 {
            sqlx::query("DELETE FROM counters WHERE counter_key = ?")
                .bind(PHOTO_COUNT_KEY)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE counters SET value = ? WHERE counter_key = ?")
                .bind(remaining)
                .bind(PHOTO_COUNT_KEY)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    /// 计数器当前值（键不存在时为 0）
    pub async fn count(&self) -> Result<i64, StoreError> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT value FROM counters WHERE counter_key = ?")
                .bind(PHOTO_COUNT_KEY)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.unwrap_or(0))
    }
}
