// ==========================================
// 检验验证与工作流状态引擎 - 引擎层
// ==========================================
// 职责: 实现判定规则、数量核对、审批门控与生命周期状态机
// 红线: Engine 不拼 SQL，不发起网络调用；所有判定必须输出 reason
// ==========================================

pub mod call_lifecycle;
pub mod error;
pub mod events;
pub mod heat_disposition;
pub mod section_gate;
pub mod stage_reconciler;
pub mod status_derivation;
pub mod submodule_validator;
pub mod tolerance;

// 重导出核心引擎
pub use call_lifecycle::{
    CallLifecycleController, FinishReadiness, LifecycleAction, LifecycleTransition,
};
pub use error::{EngineError, EngineResult};
pub use events::{
    InspectionEvent, InspectionEventPublisher, InspectionEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use heat_disposition::{HeatDispositionAggregator, HeatLedger, LedgerTotals};
pub use section_gate::{SectionApprovalGate, SectionTransition};
pub use stage_reconciler::{
    CrossStageWarning, FinalCheckRejections, StageLedger, StageQuantityReconciler,
};
pub use status_derivation::{CallStatusDerivation, DisplayStatus, UserAction};
pub use submodule_validator::{SubmoduleValidator, ValidationOutcome};
pub use tolerance::{ProcessField, ToleranceCheck, ToleranceRules, ToleranceWindow};
