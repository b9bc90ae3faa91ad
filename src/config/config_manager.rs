// ==========================================
// 检验验证与工作流状态引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::inspection_config::{
    InspectionConfigReader, DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_DRAFT_RETENTION_DAYS,
};
use crate::db::open_sqlite_connection;
use crate::domain::types::ProductModel;
use crate::engine::tolerance::ToleranceRules;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明: 会对传入连接再次应用统一 PRAGMA（幂等），并确保 config_kv 表存在
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            conn_guard.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS config_kv (
                  scope_id TEXT NOT NULL,
                  key TEXT NOT NULL,
                  value TEXT NOT NULL,
                  PRIMARY KEY (scope_id, key)
                );
                "#,
            )?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            if key.starts_with("__meta_") {
                continue;
            }
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// InspectionConfigReader 实现
// ==========================================
#[async_trait]
impl InspectionConfigReader for ConfigManager {
    async fn get_tolerance_rules(&self) -> Result<ToleranceRules, Box<dyn Error>> {
        match self.get_config_value(config_keys::TOLERANCE_RULES)? {
            Some(raw) => match serde_json::from_str::<ToleranceRules>(&raw) {
                Ok(rules) => Ok(rules),
                Err(e) => {
                    tracing::warn!(error = %e, "tolerance_rules 配置格式错误,使用默认值");
                    Ok(ToleranceRules::default())
                }
            },
            None => Ok(ToleranceRules::default()),
        }
    }

    async fn get_autosave_interval_secs(&self) -> Result<u64, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::AUTOSAVE_INTERVAL_SECS,
            &DEFAULT_AUTOSAVE_INTERVAL_SECS.to_string(),
        )?;
        Ok(value.parse::<u64>().unwrap_or(DEFAULT_AUTOSAVE_INTERVAL_SECS))
    }

    async fn get_draft_retention_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::DRAFT_RETENTION_DAYS,
            &DEFAULT_DRAFT_RETENTION_DAYS.to_string(),
        )?;
        Ok(value.parse::<i64>().unwrap_or(DEFAULT_DRAFT_RETENTION_DAYS))
    }

    async fn get_default_product_model(&self) -> Result<ProductModel, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_PRODUCT_MODEL, "MK-III")?;
        Ok(ProductModel::detect_or_default(&value))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 公差规则 （JSON，结构同 ToleranceRules）
    pub const TOLERANCE_RULES: &str = "tolerance_rules";

    // 草稿
    pub const AUTOSAVE_INTERVAL_SECS: &str = "autosave_interval_secs";
    pub const DRAFT_RETENTION_DAYS: &str = "draft_retention_days";

    // 产品型号
    pub const DEFAULT_PRODUCT_MODEL: &str = "default_product_model";
}
