// ==========================================
// 检验验证与工作流状态引擎 - 配置层
// ==========================================
// 职责: 系统配置管理，支持 global 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod inspection_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use inspection_config::{InspectionConfig, InspectionConfigReader};
