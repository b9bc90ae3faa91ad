// ==========================================
// 检验验证与工作流状态引擎 - 草稿存储
// ==========================================
// 职责: 草稿持久化边界（trait）、内存实现、按报验单作用域的快照服务
// 红线: 键为 `<call>` 或 `<call>:<discipline>`；会话结束后拒绝保存
// 红线: Repository 不含业务逻辑，恢复规则在领域模型中
// ==========================================

use crate::domain::draft::{DraftSnapshot, InspectionDraftState};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

// ==========================================
// DraftKey - 草稿键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DraftKey {
    pub call_number: String,
    pub discipline: Option<String>,
}

impl DraftKey {
    /// 整单快照键 `<call>`
    pub fn for_call(call_number: &str) -> Self {
        Self {
            call_number: call_number.to_string(),
            discipline: None,
        }
    }

    /// 科目数据键 `<call>:<discipline>`
    pub fn for_discipline(call_number: &str, discipline: &str) -> Self {
        Self {
            call_number: call_number.to_string(),
            discipline: Some(discipline.to_string()),
        }
    }

    pub fn storage_key(&self) -> String {
        match &self.discipline {
            Some(d) => format!("{}:{}", self.call_number, d),
            None => self.call_number.clone(),
        }
    }

    pub fn parse(storage_key: &str) -> Self {
        match storage_key.split_once(':') {
            Some((call, discipline)) => Self::for_discipline(call, discipline),
            None => Self::for_call(storage_key),
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// 草稿记录
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecord {
    pub key: DraftKey,
    pub payload: Value,
    pub version: i64,
    pub saved_at: NaiveDateTime,
}

// ==========================================
// DraftStore Trait - 持久化边界
// ==========================================

/// 草稿持久化边界
///
/// # 版本规则
/// - 每次保存 version + 1（新键从 1 开始）
/// - `save` 为最后写入者胜出
/// - `save_versioned` 在当前版本 ≠ expected_version 时返回 VersionConflict
///   （expected_version = 0 表示键必须不存在）
pub trait DraftStore: Send + Sync {
    fn save(&self, key: &DraftKey, payload: &Value) -> RepositoryResult<DraftRecord>;

    fn save_versioned(
        &self,
        key: &DraftKey,
        payload: &Value,
        expected_version: i64,
    ) -> RepositoryResult<DraftRecord>;

    fn load(&self, key: &DraftKey) -> RepositoryResult<Option<DraftRecord>>;

    fn remove(&self, key: &DraftKey) -> RepositoryResult<bool>;

    /// 删除报验单作用域内全部键，返回删除数
    fn remove_call(&self, call_number: &str) -> RepositoryResult<usize>;

    fn keys_for_call(&self, call_number: &str) -> RepositoryResult<Vec<DraftKey>>;

    /// 清理早于截止时间的草稿，返回删除数
    fn purge_older_than(&self, cutoff: NaiveDateTime) -> RepositoryResult<usize>;
}

// ==========================================
// InMemoryDraftStore - 内存实现
// ==========================================
#[derive(Default)]
pub struct InMemoryDraftStore {
    records: Mutex<BTreeMap<String, DraftRecord>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, BTreeMap<String, DraftRecord>>> {
        self.records
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn write(
        records: &mut BTreeMap<String, DraftRecord>,
        key: &DraftKey,
        payload: &Value,
        next_version: i64,
    ) -> DraftRecord {
        let record = DraftRecord {
            key: key.clone(),
            payload: payload.clone(),
            version: next_version,
            saved_at: Utc::now().naive_utc(),
        };
        records.insert(key.storage_key(), record.clone());
        record
    }
}

impl DraftStore for InMemoryDraftStore {
    fn save(&self, key: &DraftKey, payload: &Value) -> RepositoryResult<DraftRecord> {
        let mut records = self.lock()?;
        let next = records.get(&key.storage_key()).map_or(1, |r| r.version + 1);
        Ok(Self::write(&mut records, key, payload, next))
    }

    fn save_versioned(
        &self,
        key: &DraftKey,
        payload: &Value,
        expected_version: i64,
    ) -> RepositoryResult<DraftRecord> {
        let mut records = self.lock()?;
        let actual = records.get(&key.storage_key()).map_or(0, |r| r.version);
        if actual != expected_version {
            return Err(RepositoryError::VersionConflict {
                key: key.storage_key(),
                expected: expected_version,
                actual,
            });
        }
        Ok(Self::write(&mut records, key, payload, actual + 1))
    }

    fn load(&self, key: &DraftKey) -> RepositoryResult<Option<DraftRecord>> {
        Ok(self.lock()?.get(&key.storage_key()).cloned())
    }

    fn remove(&self, key: &DraftKey) -> RepositoryResult<bool> {
        Ok(self.lock()?.remove(&key.storage_key()).is_some())
    }

    fn remove_call(&self, call_number: &str) -> RepositoryResult<usize> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| r.key.call_number != call_number);
        Ok(before - records.len())
    }

    fn keys_for_call(&self, call_number: &str) -> RepositoryResult<Vec<DraftKey>> {
        Ok(self
            .lock()?
            .values()
            .filter(|r| r.key.call_number == call_number)
            .map(|r| r.key.clone())
            .collect())
    }

    fn purge_older_than(&self, cutoff: NaiveDateTime) -> RepositoryResult<usize> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| r.saved_at >= cutoff);
        Ok(before - records.len())
    }
}

// ==========================================
// DraftSnapshotStore - 按报验单作用域的快照服务
// ==========================================
pub struct DraftSnapshotStore {
    store: Arc<dyn DraftStore>,
    ended_sessions: Mutex<HashSet<String>>,
}

impl DraftSnapshotStore {
    pub fn new(store: Arc<dyn DraftStore>) -> Self {
        Self {
            store,
            ended_sessions: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn DraftStore> {
        &self.store
    }

    fn sessions(&self) -> RepositoryResult<std::sync::MutexGuard<'_, HashSet<String>>> {
        self.ended_sessions
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_session_open(&self, call_number: &str) -> RepositoryResult<()> {
        if self.sessions()?.contains(call_number) {
            tracing::warn!(%call_number, "检验会话已结束,拒绝保存草稿");
            return Err(RepositoryError::SessionEnded {
                call_number: call_number.to_string(),
            });
        }
        Ok(())
    }

    pub fn is_session_ended(&self, call_number: &str) -> RepositoryResult<bool> {
        Ok(self.sessions()?.contains(call_number))
    }

    /// 重新开放会话（新的检验周期）
    pub fn reset_session(&self, call_number: &str) -> RepositoryResult<()> {
        self.sessions()?.remove(call_number);
        Ok(())
    }

    // ===== 整单快照 =====

    /// 保存整单快照（最后写入者胜出）
    pub fn save_snapshot(
        &self,
        call_number: &str,
        state: &InspectionDraftState,
    ) -> RepositoryResult<DraftSnapshot> {
        self.ensure_session_open(call_number)?;
        let record = self
            .store
            .save(&DraftKey::for_call(call_number), &serde_json::to_value(state)?)?;
        tracing::debug!(%call_number, version = record.version, "草稿快照已保存");
        Ok(to_snapshot(call_number, record, state.clone()))
    }

    /// 保存整单快照（乐观版本校验）
    pub fn save_snapshot_versioned(
        &self,
        call_number: &str,
        state: &InspectionDraftState,
        expected_version: i64,
    ) -> RepositoryResult<DraftSnapshot> {
        self.ensure_session_open(call_number)?;
        let record = self.store.save_versioned(
            &DraftKey::for_call(call_number),
            &serde_json::to_value(state)?,
            expected_version,
        )?;
        Ok(to_snapshot(call_number, record, state.clone()))
    }

    pub fn load_snapshot(&self, call_number: &str) -> RepositoryResult<Option<DraftSnapshot>> {
        match self.store.load(&DraftKey::for_call(call_number))? {
            Some(record) => {
                let state: InspectionDraftState = serde_json::from_value(record.payload.clone())?;
                Ok(Some(to_snapshot(call_number, record, state)))
            }
            None => Ok(None),
        }
    }

    /// 读取快照并填充内存中为空的字段
    ///
    /// # 返回
    /// - 被填充的字段数（无快照时为 0）
    pub fn restore_into(
        &self,
        call_number: &str,
        state: &mut InspectionDraftState,
    ) -> RepositoryResult<usize> {
        let Some(snapshot) = self.load_snapshot(call_number)? else {
            return Ok(0);
        };
        let filled = state.fill_missing_from(&snapshot.state);
        tracing::info!(
            %call_number,
            version = snapshot.version,
            saved_at = %snapshot.saved_at,
            filled,
            "草稿已恢复"
        );
        Ok(filled)
    }

    // ===== 科目数据 =====

    pub fn save_discipline<T: Serialize>(
        &self,
        call_number: &str,
        discipline: &str,
        data: &T,
    ) -> RepositoryResult<i64> {
        self.ensure_session_open(call_number)?;
        let record = self.store.save(
            &DraftKey::for_discipline(call_number, discipline),
            &serde_json::to_value(data)?,
        )?;
        Ok(record.version)
    }

    pub fn load_discipline<T: DeserializeOwned>(
        &self,
        call_number: &str,
        discipline: &str,
    ) -> RepositoryResult<Option<T>> {
        match self
            .store
            .load(&DraftKey::for_discipline(call_number, discipline))?
        {
            Some(record) => Ok(Some(serde_json::from_value(record.payload)?)),
            None => Ok(None),
        }
    }

    /// 是否存在持久化的实质数据
    ///
    /// # 规则
    /// - 整单快照含实质录入（班次+日期、备注、色标、投产数）
    /// - 或任一科目键存在且非空
    pub fn has_durable_data(&self, call_number: &str) -> RepositoryResult<bool> {
        if let Some(snapshot) = self.load_snapshot(call_number)? {
            if snapshot.state.has_substantive_data() {
                return Ok(true);
            }
        }
        for key in self.store.keys_for_call(call_number)? {
            if key.discipline.is_none() {
                continue;
            }
            if let Some(record) = self.store.load(&key)? {
                if !is_empty_payload(&record.payload) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// 结束会话: 删除全部报验单作用域键并阻止后续保存
    pub fn end_session(&self, call_number: &str) -> RepositoryResult<usize> {
        self.sessions()?.insert(call_number.to_string());
        let removed = self.store.remove_call(call_number)?;
        tracing::info!(%call_number, removed, "检验会话结束,草稿已清理");
        Ok(removed)
    }
}

fn to_snapshot(call_number: &str, record: DraftRecord, state: InspectionDraftState) -> DraftSnapshot {
    DraftSnapshot {
        call_number: call_number.to_string(),
        saved_at: record.saved_at,
        version: record.version,
        state,
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
