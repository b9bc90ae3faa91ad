// ==========================================
// 检验验证与工作流状态引擎 - 引擎层错误类型
// ==========================================
// 职责: 状态机/门控/输入一致性的业务拒绝
// 红线: 缺失数据不是错误（→ PENDING）；超差不是错误（→ NOT_OK）
// ==========================================

use crate::domain::types::{CallStatus, ProcessStageKind, Section};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("非法状态转换: {from} → {to}")]
    InvalidTransition { from: CallStatus, to: CallStatus },

    #[error("分段 {section} 不可进入: {reason}")]
    SectionLocked { section: Section, reason: String },

    #[error("分段 {section} 在当前草稿周期内已有结论")]
    SectionAlreadyDecided { section: Section },

    #[error("开始检验前必须选择班次")]
    MissingShift,

    #[error("检验日期无效: {0}")]
    InvalidInspectionDate(String),

    #[error("必须选择原因")]
    MissingReason,

    #[error("Please provide remarks for \"Any other\" reason")]
    MissingRemarks,

    #[error("分段审批未满足: {0}")]
    GateNotSatisfied(String),

    #[error("Manufactured quantity ({manufactured}) cannot be less than rejected quantity ({rejected}) at {stage}")]
    ManufacturedBelowRejected {
        stage: ProcessStageKind,
        manufactured: u32,
        rejected: u32,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
