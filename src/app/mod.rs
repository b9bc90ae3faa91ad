// ==========================================
// 检验验证与工作流状态引擎 - 应用层
// ==========================================
// 职责: 组装数据库、配置、仓储与 API 实例
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
