// ==========================================
// 检验验证与工作流状态引擎 - 检验配置
// ==========================================
// 职责: 检验配置结构、默认值、配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::ProductModel;
use crate::engine::tolerance::ToleranceRules;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 默认自动保存间隔（秒）
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// 默认草稿保留天数
pub const DEFAULT_DRAFT_RETENTION_DAYS: i64 = 30;

// ==========================================
// InspectionConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionConfig {
    pub tolerance: ToleranceRules,
    pub autosave_interval_secs: u64,
    pub draft_retention_days: i64,
    pub default_product_model: ProductModel,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            tolerance: ToleranceRules::default(),
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            draft_retention_days: DEFAULT_DRAFT_RETENTION_DAYS,
            default_product_model: ProductModel::MkIII,
        }
    }
}

impl InspectionConfig {
    /// 通过读取器加载完整配置
    pub async fn load(reader: &dyn InspectionConfigReader) -> Result<Self, String> {
        let tolerance = reader
            .get_tolerance_rules()
            .await
            .map_err(|e| format!("读取公差规则失败: {}", e))?;
        let autosave_interval_secs = reader
            .get_autosave_interval_secs()
            .await
            .map_err(|e| format!("读取自动保存间隔失败: {}", e))?;
        let draft_retention_days = reader
            .get_draft_retention_days()
            .await
            .map_err(|e| format!("读取草稿保留天数失败: {}", e))?;
        let default_product_model = reader
            .get_default_product_model()
            .await
            .map_err(|e| format!("读取默认产品型号失败: {}", e))?;

        Ok(Self {
            tolerance,
            autosave_interval_secs,
            draft_retention_days,
            default_product_model,
        })
    }
}

// ==========================================
// InspectionConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait InspectionConfigReader: Send + Sync {
    /// 获取公差规则
    ///
    /// # 默认值
    /// - ToleranceRules::default()
    async fn get_tolerance_rules(&self) -> Result<ToleranceRules, Box<dyn Error>>;

    /// 获取自动保存间隔（秒）
    ///
    /// # 默认值
    /// - 30
    async fn get_autosave_interval_secs(&self) -> Result<u64, Box<dyn Error>>;

    /// 获取草稿保留天数
    ///
    /// # 默认值
    /// - 30
    async fn get_draft_retention_days(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取无法识别型号时的默认产品型号
    ///
    /// # 默认值
    /// - MK-III
    async fn get_default_product_model(&self) -> Result<ProductModel, Box<dyn Error>>;
}
