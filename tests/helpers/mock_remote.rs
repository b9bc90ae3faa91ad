// ==========================================
// Mock 外部服务 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use inspection_engine::api::remote::{
    HeatRecordDto, InspectionSubmissionService, PoDataResponse, PoDataService, PoFetchRequest,
    PoHeader, RemoteError, RemoteServices, SectionSaveRequest, SectionService, WorkflowAction,
    WorkflowService, WorkflowTransitionRequest, WorkflowTransitionResponse,
};
use inspection_engine::api::FinishInspectionPayload;
use inspection_engine::engine::SectionTransition;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 可编排的外部服务 Mock
#[derive(Default)]
pub struct MockRemote {
    pub fail_po_fetch: AtomicBool,
    pub fail_sections: AtomicBool,
    pub fail_workflow: AtomicBool,
    pub fail_submission: AtomicBool,
    /// 依次弹出的 PO 响应（空时返回默认响应）
    pub po_responses: Mutex<VecDeque<(Duration, PoDataResponse)>>,
    /// 依次弹出的分段调用延迟（空时立即返回）
    pub section_delays: Mutex<VecDeque<Duration>>,
    /// 依次弹出的工作流调用延迟（空时立即返回）
    pub workflow_delays: Mutex<VecDeque<Duration>>,
    pub decisions: Mutex<Vec<SectionTransition>>,
    pub workflow_requests: Mutex<Vec<WorkflowTransitionRequest>>,
    pub submissions: Mutex<Vec<FinishInspectionPayload>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn services(self: &Arc<Self>) -> RemoteServices {
        RemoteServices {
            po_data: self.clone(),
            sections: self.clone(),
            workflow: self.clone(),
            submission: self.clone(),
        }
    }

    pub fn push_po_response(&self, delay: Duration, response: PoDataResponse) {
        self.po_responses.lock().unwrap().push_back((delay, response));
    }

    pub fn push_section_delay(&self, delay: Duration) {
        self.section_delays.lock().unwrap().push_back(delay);
    }

    pub fn push_workflow_delay(&self, delay: Duration) {
        self.workflow_delays.lock().unwrap().push_back(delay);
    }

    pub fn workflow_actions(&self) -> Vec<WorkflowAction> {
        self.workflow_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.action)
            .collect()
    }

    async fn delay_from(queue: &Mutex<VecDeque<Duration>>) {
        let delay = queue.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn unavailable() -> RemoteError {
        RemoteError::Http {
            status: 503,
            message: "service unavailable".to_string(),
        }
    }
}

/// 构造 PO 响应
pub fn po_response(description: &str, heats: &[(&str, f64)]) -> PoDataResponse {
    PoDataResponse {
        header: PoHeader {
            po_number: "PO-2026-001".to_string(),
            vendor_name: Some("Vendor".to_string()),
            ordered_qty: Some(1000.0),
            product_description: Some(description.to_string()),
            rio: Some("Eastern".to_string()),
            ..Default::default()
        },
        amendment: None,
        heats: heats
            .iter()
            .map(|(heat_number, qty)| HeatRecordDto {
                heat_number: heat_number.to_string(),
                manufacturer: Some("Mill".to_string()),
                tc_number: Some(format!("TC-{}", heat_number)),
                tc_date: None,
                sub_po_number: None,
                sub_po_date: None,
                sub_po_qty: None,
                invoice_number: None,
                invoice_date: None,
                offered_qty: *qty,
            })
            .collect(),
    }
}

#[async_trait]
impl PoDataService for MockRemote {
    async fn fetch_po_data(&self, _request: &PoFetchRequest) -> Result<PoDataResponse, RemoteError> {
        let next = self.po_responses.lock().unwrap().pop_front();
        let (delay, response) =
            next.unwrap_or_else(|| (Duration::ZERO, po_response("ERC MK-III", &[("H1", 12.5)])));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_po_fetch.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(response)
    }
}

#[async_trait]
impl SectionService for MockRemote {
    async fn save_section(&self, _request: &SectionSaveRequest) -> Result<(), RemoteError> {
        Self::delay_from(&self.section_delays).await;
        if self.fail_sections.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    async fn decide_section(&self, transition: &SectionTransition) -> Result<(), RemoteError> {
        Self::delay_from(&self.section_delays).await;
        if self.fail_sections.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.decisions.lock().unwrap().push(transition.clone());
        Ok(())
    }
}

#[async_trait]
impl WorkflowService for MockRemote {
    async fn perform_transition(
        &self,
        request: &WorkflowTransitionRequest,
    ) -> Result<WorkflowTransitionResponse, RemoteError> {
        Self::delay_from(&self.workflow_delays).await;
        if self.fail_workflow.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let mut requests = self.workflow_requests.lock().unwrap();
        requests.push(request.clone());
        Ok(WorkflowTransitionResponse {
            workflow_transition_id: Some(format!("WT-{}", requests.len())),
            status: Some(request.action.as_str().to_string()),
        })
    }
}

#[async_trait]
impl InspectionSubmissionService for MockRemote {
    async fn submit_finish(&self, payload: &FinishInspectionPayload) -> Result<(), RemoteError> {
        if self.fail_submission.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.submissions.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
