// ==========================================
// 检验验证与工作流状态引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、样本数据结构
// 红线: 不含数据访问逻辑，不含引擎逻辑
// ==========================================

pub mod call;
pub mod draft;
pub mod heat;
pub mod samples;
pub mod stage;
pub mod types;

// 重导出核心类型
pub use call::{generate_ic_number, InspectionCall, SectionStates};
pub use draft::{DraftSnapshot, InspectionDraftState};
pub use heat::{Heat, HeatDisposition, HeatLedgerEntry, HeatVerdicts};
pub use samples::{
    CallSampleSet, ChecklistAnswer, ChemistrySample, DimensionalSamples, HeatSubmoduleData,
    MaterialTestSample, PackingChecklist, VisualSelection, NO_DEFECT, STANDARD_VISUAL_DEFECTS,
};
pub use stage::{
    production_lot_key, HourlyStageEntry, StageQuantity, ALL_LOTS, DEFAULT_LINE,
};
pub use types::{
    CallStatus, Discipline, Disposition, ProcessStageKind, ProductModel,
    ProductType, ReasonCode, Section, SectionOutcome, SectionStatus, Shift, Verdict,
};
