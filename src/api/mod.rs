// ==========================================
// 检验验证与工作流状态引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口，协调引擎、草稿存储与外部服务
// ==========================================

pub mod error;
pub mod inspection_api;
pub mod payload;
pub mod remote;
pub mod request_guard;

// 重导出核心类型
pub use error::{ApiError, ApiResult, RemoteOperation};
pub use inspection_api::{CallOverview, InspectionApi, InspectorContext, StageSummary};
pub use payload::{FinishInspectionPayload, HeatFinalResult, PreInspectionSummary, ProcessStageSummary};
pub use remote::{
    InspectionSubmissionService, PoDataResponse, PoDataService, PoFetchRequest, PoHeader,
    RemoteError, RemoteServices, SectionService, WorkflowAction, WorkflowService,
    WorkflowTransitionRequest, WorkflowTransitionResponse,
};
pub use request_guard::{RequestChannel, RequestGuard, RequestTicket};
