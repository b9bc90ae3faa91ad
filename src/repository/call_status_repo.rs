// ==========================================
// 检验验证与工作流状态引擎 - 报验单状态仓储
// ==========================================
// 职责: call_status 表（最近一次显式写入的生命周期状态）
// 红线: 只存储显式状态；展示状态由派生规则计算，不落库
// ==========================================

use crate::domain::types::CallStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use serde_json::Value;
use std::sync::{Arc, Mutex};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct CallStatusRecord {
    pub call_number: String,
    pub status: CallStatus,
    pub metadata: Value, // 原因、备注、班次、检验日期等
    pub updated_at: NaiveDateTime,
}

pub struct CallStatusRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CallStatusRepository {
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
            CREATE TABLE IF NOT EXISTS call_status (
              call_number TEXT PRIMARY KEY,
              status TEXT NOT NULL CHECK(status IN (
                'PENDING', 'SCHEDULED', 'UNDER_INSPECTION', 'PAUSED',
                'WITHHELD', 'CANCELLED', 'COMPLETED'
              )),
              metadata_json TEXT NOT NULL DEFAULT '{}',
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_call_status_status ON call_status(status);
            "#,
        )?;
        Ok(())
    }

    /// 写入（覆盖）报验单状态
    pub fn upsert(
        &self,
        call_number: &str,
        status: CallStatus,
        metadata: &Value,
    ) -> RepositoryResult<CallStatusRecord> {
        let conn = self.get_conn()?;
        let updated_at = Utc::now().naive_utc();
        conn.execute(
            r#"
            INSERT INTO call_status (call_number, status, metadata_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(call_number) DO UPDATE SET
              status = excluded.status,
              metadata_json = excluded.metadata_json,
              updated_at = excluded.updated_at
            "#,
            params![
                call_number,
                status.as_str(),
                serde_json::to_string(metadata)?,
                updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(CallStatusRecord {
            call_number: call_number.to_string(),
            status,
            metadata: metadata.clone(),
            updated_at,
        })
    }

    pub fn find(&self, call_number: &str) -> RepositoryResult<Option<CallStatusRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT call_number, status, metadata_json, updated_at
            FROM call_status
            WHERE call_number = ?1
            "#,
        )?;
        match stmt.query_row(params![call_number], |row| map_row(row)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_by_status(&self, status: CallStatus) -> RepositoryResult<Vec<CallStatusRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT call_number, status, metadata_json, updated_at
            FROM call_status
            WHERE status = ?1
            ORDER BY updated_at DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![status.as_str()], |row| map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete(&self, call_number: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM call_status WHERE call_number = ?1",
            params![call_number],
        )?;
        Ok(rows)
    }
}

fn map_row(row: &Row) -> SqliteResult<CallStatusRecord> {
    let call_number: String = row.get(0)?;
    let status_str: String = row.get(1)?;
    let metadata_json: String = row.get(2)?;
    let updated_at_str: String = row.get(3)?;

    let metadata: Value = serde_json::from_str(&metadata_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CallStatusRecord {
        call_number,
        status: CallStatus::parse(&status_str),
        metadata,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> CallStatusRepository {
        let conn = Connection::open_in_memory().unwrap();
        CallStatusRepository::new(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_upsert_overwrites() {
        let r = repo();
        r.upsert("C1", CallStatus::Scheduled, &json!({})).unwrap();
        r.upsert("C1", CallStatus::Withheld, &json!({"reason": "VENDOR_WITHDRAWN"}))
            .unwrap();
        let rec = r.find("C1").unwrap().unwrap();
        assert_eq!(rec.status, CallStatus::Withheld);
        assert_eq!(rec.metadata["reason"], "VENDOR_WITHDRAWN");
        assert!(r.find("C2").unwrap().is_none());
    }

    #[test]
    fn test_list_by_status() {
        let r = repo();
        r.upsert("C1", CallStatus::Paused, &json!({})).unwrap();
        r.upsert("C2", CallStatus::Paused, &json!({})).unwrap();
        r.upsert("C3", CallStatus::Completed, &json!({})).unwrap();
        assert_eq!(r.list_by_status(CallStatus::Paused).unwrap().len(), 2);
        assert_eq!(r.delete("C3").unwrap(), 1);
    }
}
