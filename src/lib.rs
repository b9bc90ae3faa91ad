// ==========================================
// 检验验证与工作流状态引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 检验判定与报验单工作流（人工最终控制权）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 草稿与状态持久化
pub mod repository;

// 引擎层 - 判定规则与状态机
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CallStatus, Discipline, Disposition, ProcessStageKind, ProductModel, ProductType, ReasonCode,
    Section, SectionOutcome, SectionStatus, Shift, Verdict,
};

// 领域实体
pub use domain::{
    CallSampleSet, DraftSnapshot, Heat, HeatLedgerEntry, HeatSubmoduleData, HeatVerdicts,
    HourlyStageEntry, InspectionCall, InspectionDraftState, StageQuantity,
};

// 引擎
pub use engine::{
    CallLifecycleController, CallStatusDerivation, HeatDispositionAggregator, LifecycleAction,
    SectionApprovalGate, StageLedger, StageQuantityReconciler, SubmoduleValidator, ToleranceRules,
};

// API
pub use api::{ApiError, ApiResult, InspectionApi, InspectorContext, RemoteServices};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "检验验证与工作流状态引擎";

// 数据库版本
pub const DB_VERSION: &str = "v1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
