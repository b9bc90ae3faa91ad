// ==========================================
// 检验验证与工作流状态引擎 - SQLite 草稿仓储
// ==========================================
// 职责: inspection_draft 表的版本化读写
// 红线: 版本号在同一事务内读取与递增
// ==========================================

use crate::repository::draft_store::{DraftKey, DraftRecord, DraftStore};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde_json::Value;
use std::sync::{Arc, Mutex};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteDraftRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDraftRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table_and_indexes()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table_and_indexes(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS inspection_draft (
              draft_key TEXT PRIMARY KEY,
              call_number TEXT NOT NULL,
              discipline TEXT,
              payload_json TEXT NOT NULL,
              version INTEGER NOT NULL DEFAULT 1,
              saved_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_inspection_draft_call ON inspection_draft(call_number);
            CREATE INDEX IF NOT EXISTS idx_inspection_draft_saved_at ON inspection_draft(saved_at);
            "#,
        )?;
        Ok(())
    }

    /// 写入一条草稿并返回记录；调用方负责版本校验
    fn write_locked(
        conn: &Connection,
        key: &DraftKey,
        payload: &Value,
        current_version: i64,
    ) -> RepositoryResult<DraftRecord> {
        let payload_json = serde_json::to_string(payload)?;
        let saved_at = Utc::now().naive_utc();
        let next_version = current_version + 1;

        conn.execute(
            r#"
            INSERT INTO inspection_draft (
              draft_key, call_number, discipline, payload_json, version, saved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(draft_key) DO UPDATE SET
              payload_json = excluded.payload_json,
              version = excluded.version,
              saved_at = excluded.saved_at
            "#,
            params![
                key.storage_key(),
                key.call_number,
                key.discipline,
                payload_json,
                next_version,
                saved_at.format(DATETIME_FMT).to_string(),
            ],
        )?;

        Ok(DraftRecord {
            key: key.clone(),
            payload: payload.clone(),
            version: next_version,
            saved_at,
        })
    }

    fn current_version(conn: &Connection, key: &DraftKey) -> RepositoryResult<i64> {
        let version: Option<i64> = conn
            .query_row(
                "SELECT version FROM inspection_draft WHERE draft_key = ?1",
                params![key.storage_key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.unwrap_or(0))
    }

    /// 草稿总数（启动摘要用）
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM inspection_draft", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl DraftStore for SqliteDraftRepository {
    fn save(&self, key: &DraftKey, payload: &Value) -> RepositoryResult<DraftRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let current = Self::current_version(&tx, key)?;
        let record = Self::write_locked(&tx, key, payload, current)?;
        tx.commit()?;
        Ok(record)
    }

    fn save_versioned(
        &self,
        key: &DraftKey,
        payload: &Value,
        expected_version: i64,
    ) -> RepositoryResult<DraftRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let actual = Self::current_version(&tx, key)?;
        if actual != expected_version {
            return Err(RepositoryError::VersionConflict {
                key: key.storage_key(),
                expected: expected_version,
                actual,
            });
        }
        let record = Self::write_locked(&tx, key, payload, actual)?;
        tx.commit()?;
        Ok(record)
    }

    fn load(&self, key: &DraftKey) -> RepositoryResult<Option<DraftRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT draft_key, payload_json, version, saved_at
            FROM inspection_draft
            WHERE draft_key = ?1
            "#,
        )?;

        match stmt.query_row(params![key.storage_key()], |row| map_row(row)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &DraftKey) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM inspection_draft WHERE draft_key = ?1",
            params![key.storage_key()],
        )?;
        Ok(rows > 0)
    }

    fn remove_call(&self, call_number: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM inspection_draft WHERE call_number = ?1",
            params![call_number],
        )?;
        Ok(rows)
    }

    fn keys_for_call(&self, call_number: &str) -> RepositoryResult<Vec<DraftKey>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT draft_key
            FROM inspection_draft
            WHERE call_number = ?1
            ORDER BY draft_key
            "#,
        )?;
        let keys = stmt
            .query_map(params![call_number], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(keys.iter().map(|k| DraftKey::parse(k)).collect())
    }

    fn purge_older_than(&self, cutoff: NaiveDateTime) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM inspection_draft WHERE saved_at < ?1",
            params![cutoff.format(DATETIME_FMT).to_string()],
        )?;
        Ok(rows)
    }
}

fn map_row(row: &Row) -> SqliteResult<DraftRecord> {
    let draft_key: String = row.get(0)?;
    let payload_json: String = row.get(1)?;
    let version: i64 = row.get(2)?;
    let saved_at_str: String = row.get(3)?;

    let payload: Value = serde_json::from_str(&payload_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let saved_at = NaiveDateTime::parse_from_str(&saved_at_str, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(DraftRecord {
        key: DraftKey::parse(&draft_key),
        payload,
        version,
        saved_at,
    })
}
