// ==========================================
// 检验验证与工作流状态引擎 - 展示状态派生
// ==========================================
// 职责: 存储状态 + 草稿证据 → 展示状态；上游工作流状态映射与可用操作
// 红线: 优先级固定 WITHHELD > PAUSED > 有实质数据（UNDER_INSPECTION） > 存储状态
// ==========================================

use crate::domain::types::CallStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 列表页可用的用户操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAction {
    Schedule,
    Start,
    Reschedule,
    Resume,
    EnterShiftDetails,
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserAction::Schedule => "SCHEDULE",
            UserAction::Start => "START",
            UserAction::Reschedule => "RESCHEDULE",
            UserAction::Resume => "RESUME",
            UserAction::EnterShiftDetails => "ENTER_SHIFT_DETAILS",
        };
        write!(f, "{}", s)
    }
}

/// 展示状态及其依据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayStatus {
    pub status: CallStatus,
    pub reason: String,
}

// ==========================================
// CallStatusDerivation
// ==========================================
pub struct CallStatusDerivation;

impl CallStatusDerivation {
    /// 派生展示状态
    ///
    /// # 规则
    /// 1. 存储状态 WITHHELD → WITHHELD
    /// 2. 存储状态 PAUSED → PAUSED
    /// 3. 存在持久化的实质数据 → UNDER_INSPECTION
    /// 4. 否则 → 存储状态
    ///
    /// # 参数
    /// - stored: 最近一次显式写入的状态
    /// - has_durable_data: 草稿存储中是否有该报验单的实质数据
    pub fn derive_display_status(stored: CallStatus, has_durable_data: bool) -> DisplayStatus {
        let (status, reason) = match stored {
            CallStatus::Withheld => (CallStatus::Withheld, "存储状态为 WITHHELD"),
            CallStatus::Paused => (CallStatus::Paused, "存储状态为 PAUSED"),
            _ if has_durable_data => (CallStatus::UnderInspection, "存在已保存的检验数据"),
            other => (other, "沿用存储状态"),
        };
        DisplayStatus {
            status,
            reason: reason.to_string(),
        }
    }

    /// 上游工作流状态 → 报验单状态
    pub fn map_workflow_status(workflow_status: &str) -> Option<CallStatus> {
        match workflow_status.trim().to_uppercase().as_str() {
            "CALL_REGISTERED" | "PENDING" => Some(CallStatus::Pending),
            "IE_SCHEDULED" | "SCHEDULED" => Some(CallStatus::Scheduled),
            "VERIFY_PO_DETAILS"
            | "ENTER_SHIFT_DETAILS_AND_START_INSPECTION"
            | "ENTRY_INSPECTION_RESULTS"
            | "UNDER_INSPECTION" => Some(CallStatus::UnderInspection),
            "PAUSE_INSPECTION_RESUME_NEXT_DAY" | "INSPECTION_PAUSED" | "PAUSED" => {
                Some(CallStatus::Paused)
            }
            "INSPECTION_COMPLETED" | "INSPECTION_COMPLETE_CONFIRM" | "COMPLETED" => {
                Some(CallStatus::Completed)
            }
            "WITHHELD" => Some(CallStatus::Withheld),
            "CANCELLED" => Some(CallStatus::Cancelled),
            _ => None,
        }
    }

    /// 报验单状态下可用的操作
    pub fn available_actions(status: CallStatus) -> Vec<UserAction> {
        match status {
            CallStatus::Pending => vec![UserAction::Schedule],
            CallStatus::Scheduled => vec![UserAction::Start, UserAction::Reschedule],
            CallStatus::UnderInspection => vec![UserAction::Resume, UserAction::Reschedule],
            CallStatus::Paused => vec![UserAction::EnterShiftDetails],
            CallStatus::Withheld | CallStatus::Cancelled | CallStatus::Completed => Vec::new(),
        }
    }
}
