// ==========================================
// 检验验证与工作流状态引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换 Engine/Repository 错误为用户可读消息
// 红线: 所有错误信息必须包含显式原因；远程失败可恢复，本地状态不变
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 外部调用类别（PO 拉取失败与工作流失败需可区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteOperation {
    PoFetch,
    SectionDecision,
    WorkflowTransition,
    FinishSubmission,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteOperation::PoFetch => "PO_FETCH",
            RemoteOperation::SectionDecision => "SECTION_DECISION",
            RemoteOperation::WorkflowTransition => "WORKFLOW_TRANSITION",
            RemoteOperation::FinishSubmission => "FINISH_SUBMISSION",
        };
        write!(f, "{}", s)
    }
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("业务规则拒绝: {0}")]
    Engine(#[from] EngineError),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 外部调用错误
    // ==========================================
    #[error("外部调用失败 ({operation}): {message}")]
    Remote {
        operation: RemoteOperation,
        message: String,
    },

    #[error("响应已过期,已丢弃: call_number={call_number}, generation={generation}")]
    StaleResponse { call_number: String, generation: u64 },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("版本冲突: {0}")]
    VersionConflict(String),

    #[error("检验会话已结束: {0}")]
    SessionEnded(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionConflict {
                key,
                expected,
                actual,
            } => ApiError::VersionConflict(format!(
                "草稿{}已被其他会话修改(期望version={},实际version={})",
                key, expected, actual
            )),
            RepositoryError::SessionEnded { call_number } => ApiError::SessionEnded(call_number),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::Serialization(msg) => {
                ApiError::InternalError(format!("序列化失败: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl ApiError {
    /// 远程调用失败（可重试，本地状态未改变）
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::Remote { .. } | ApiError::StaleResponse { .. } | ApiError::VersionConflict(_)
        )
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
