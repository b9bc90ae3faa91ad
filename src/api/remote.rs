// ==========================================
// 检验验证与工作流状态引擎 - 外部服务接口
// ==========================================
// 职责: PO 数据、分段审批、工作流转换、完成提交 的协作方 trait 与 DTO
// 红线: 只定义接口，不包含 HTTP 实现；失败以 RemoteError 返回
// ==========================================

use crate::api::payload::FinishInspectionPayload;
use crate::domain::heat::Heat;
use crate::domain::types::{Section, SectionStatus};
use crate::engine::section_gate::SectionTransition;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ==========================================
// RemoteError
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("传输失败: {0}")]
    Transport(String),

    #[error("外部服务未配置: {0}")]
    NotConfigured(String),
}

// ==========================================
// PO / 报验数据拉取
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoFetchRequest {
    pub po_number: String,
    pub call_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoHeader {
    pub po_number: String,
    pub po_date: Option<NaiveDate>,
    pub vendor_name: Option<String>,
    pub ordered_qty: Option<f64>,
    pub product_description: Option<String>,
    pub rio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendmentInfo {
    pub amendment_number: String,
    pub amendment_date: Option<NaiveDate>,
}

/// 上游炉号记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatRecordDto {
    pub heat_number: String,
    pub manufacturer: Option<String>,
    pub tc_number: Option<String>,
    pub tc_date: Option<NaiveDate>,
    pub sub_po_number: Option<String>,
    pub sub_po_date: Option<NaiveDate>,
    pub sub_po_qty: Option<f64>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub offered_qty: f64,
}

impl HeatRecordDto {
    /// 转换为领域炉号（色标为人工录入，不来自上游）
    pub fn into_heat(self) -> Heat {
        Heat {
            heat_number: self.heat_number.trim().to_string(),
            manufacturer: self.manufacturer,
            tc_number: self.tc_number,
            tc_date: self.tc_date,
            sub_po_number: self.sub_po_number,
            sub_po_date: self.sub_po_date,
            sub_po_qty: self.sub_po_qty,
            invoice_number: self.invoice_number,
            invoice_date: self.invoice_date,
            offered_weight: self.offered_qty,
            color_code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoDataResponse {
    pub header: PoHeader,
    pub amendment: Option<AmendmentInfo>,
    #[serde(default)]
    pub heats: Vec<HeatRecordDto>,
}

// ==========================================
// 分段保存
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSaveRequest {
    pub call_number: String,
    pub section: Section,
    pub section_payload: Value,
    pub status: SectionStatus,
}

// ==========================================
// 工作流动作词表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    IeScheduled,
    VerifyPoDetails,
    RequestCorrectionToCm,
    VerifyMaterialAvailability,
    EnterShiftDetailsAndStartInspection,
    PauseInspectionResumeNextDay,
    EntryInspectionResults,
    InspectionCompleteConfirm,
    Withheld,
    Cancelled,
}

impl WorkflowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowAction::IeScheduled => "IE_SCHEDULED",
            WorkflowAction::VerifyPoDetails => "VERIFY_PO_DETAILS",
            WorkflowAction::RequestCorrectionToCm => "REQUEST_CORRECTION_TO_CM",
            WorkflowAction::VerifyMaterialAvailability => "VERIFY_MATERIAL_AVAILABILITY",
            WorkflowAction::EnterShiftDetailsAndStartInspection => {
                "ENTER_SHIFT_DETAILS_AND_START_INSPECTION"
            }
            WorkflowAction::PauseInspectionResumeNextDay => "PAUSE_INSPECTION_RESUME_NEXT_DAY",
            WorkflowAction::EntryInspectionResults => "ENTRY_INSPECTION_RESULTS",
            WorkflowAction::InspectionCompleteConfirm => "INSPECTION_COMPLETE_CONFIRM",
            WorkflowAction::Withheld => "WITHHELD",
            WorkflowAction::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTransitionRequest {
    pub workflow_transition_id: Option<String>,
    pub request_id: String,
    pub action: WorkflowAction,
    pub remarks: Option<String>,
    pub action_by: String,
    pub pincode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_available: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTransitionResponse {
    pub workflow_transition_id: Option<String>,
    pub status: Option<String>,
}

// ==========================================
// 协作方 Trait
// ==========================================

#[async_trait]
pub trait PoDataService: Send + Sync {
    async fn fetch_po_data(&self, request: &PoFetchRequest) -> Result<PoDataResponse, RemoteError>;
}

/// 分段保存与审批（同一报验单+分段幂等）
#[async_trait]
pub trait SectionService: Send + Sync {
    async fn save_section(&self, request: &SectionSaveRequest) -> Result<(), RemoteError>;

    async fn decide_section(&self, transition: &SectionTransition) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn perform_transition(
        &self,
        request: &WorkflowTransitionRequest,
    ) -> Result<WorkflowTransitionResponse, RemoteError>;
}

#[async_trait]
pub trait InspectionSubmissionService: Send + Sync {
    async fn submit_finish(&self, payload: &FinishInspectionPayload) -> Result<(), RemoteError>;
}

// ==========================================
// RemoteServices - 协作方集合
// ==========================================
#[derive(Clone)]
pub struct RemoteServices {
    pub po_data: Arc<dyn PoDataService>,
    pub sections: Arc<dyn SectionService>,
    pub workflow: Arc<dyn WorkflowService>,
    pub submission: Arc<dyn InspectionSubmissionService>,
}

impl RemoteServices {
    /// 离线模式: 所有外部调用返回 NotConfigured，草稿仍可编辑
    pub fn unconfigured() -> Self {
        let remote = Arc::new(UnconfiguredRemote);
        Self {
            po_data: remote.clone(),
            sections: remote.clone(),
            workflow: remote.clone(),
            submission: remote,
        }
    }
}

/// 未配置的外部服务
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredRemote;

#[async_trait]
impl PoDataService for UnconfiguredRemote {
    async fn fetch_po_data(&self, _request: &PoFetchRequest) -> Result<PoDataResponse, RemoteError> {
        Err(RemoteError::NotConfigured("po_data".to_string()))
    }
}

#[async_trait]
impl SectionService for UnconfiguredRemote {
    async fn save_section(&self, _request: &SectionSaveRequest) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured("sections".to_string()))
    }

    async fn decide_section(&self, _transition: &SectionTransition) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured("sections".to_string()))
    }
}

#[async_trait]
impl WorkflowService for UnconfiguredRemote {
    async fn perform_transition(
        &self,
        _request: &WorkflowTransitionRequest,
    ) -> Result<WorkflowTransitionResponse, RemoteError> {
        Err(RemoteError::NotConfigured("workflow".to_string()))
    }
}

#[async_trait]
impl InspectionSubmissionService for UnconfiguredRemote {
    async fn submit_finish(&self, _payload: &FinishInspectionPayload) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured("submission".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_request_wire_format() {
        let request = WorkflowTransitionRequest {
            workflow_transition_id: Some("WT-9".to_string()),
            request_id: "CALL-1".to_string(),
            action: WorkflowAction::PauseInspectionResumeNextDay,
            remarks: None,
            action_by: "IE-7".to_string(),
            pincode: Some("110001".to_string()),
            material_available: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["action"], "PAUSE_INSPECTION_RESUME_NEXT_DAY");
        assert_eq!(json["workflowTransitionId"], "WT-9");
        assert!(json.get("materialAvailable").is_none());
    }

    #[test]
    fn test_heat_record_into_heat() {
        let dto = HeatRecordDto {
            heat_number: " H-1 ".to_string(),
            manufacturer: Some("Mill".to_string()),
            tc_number: None,
            tc_date: None,
            sub_po_number: None,
            sub_po_date: None,
            sub_po_qty: None,
            invoice_number: None,
            invoice_date: None,
            offered_qty: 25.0,
        };
        let heat = dto.into_heat();
        assert_eq!(heat.heat_number, "H-1");
        assert_eq!(heat.offered_weight, 25.0);
        assert!(heat.color_code.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_remote_fails_recoverably() {
        let services = RemoteServices::unconfigured();
        let err = services
            .po_data
            .fetch_po_data(&PoFetchRequest {
                po_number: "PO".to_string(),
                call_number: "C".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotConfigured(_)));
    }
}
