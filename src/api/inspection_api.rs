// ==========================================
// 检验验证与工作流状态引擎 - 检验业务 API
// ==========================================
// 职责: 串联 Engine 判定、草稿持久化、外部服务调用
// 红线: 外部调用成功后才提交本地状态；不在持锁期间 await
// 红线: 同一报验单同一通道被新请求取代后，旧响应一律丢弃
// 流程: plan（引擎校验） → 外部调用 → commit（本地提交） → 事件
// ==========================================

use crate::api::error::{ApiError, ApiResult, RemoteOperation};
use crate::api::payload::FinishInspectionPayload;
use crate::api::remote::{
    AmendmentInfo, PoDataResponse, PoFetchRequest, PoHeader, RemoteError, RemoteServices,
    SectionSaveRequest, WorkflowAction, WorkflowTransitionRequest,
};
use crate::api::request_guard::{RequestChannel, RequestGuard, RequestTicket};
use crate::config::InspectionConfig;
use crate::domain::call::{generate_ic_number, InspectionCall, SectionStates};
use crate::domain::draft::{DraftSnapshot, InspectionDraftState};
use crate::domain::heat::{Heat, HeatLedgerEntry};
use crate::domain::samples::{
    CallSampleSet, ChemistrySample, DimensionalSamples, MaterialTestSample, PackingChecklist,
    VisualSelection,
};
use crate::domain::stage::{HourlyStageEntry, StageQuantity, DEFAULT_LINE};
use crate::domain::types::{
    CallStatus, Discipline, ProcessStageKind, ProductModel, ProductType, ReasonCode, Section,
    SectionOutcome, Shift,
};
use crate::engine::call_lifecycle::{
    CallLifecycleController, FinishReadiness, LifecycleAction, LifecycleTransition,
};
use crate::engine::events::{InspectionEvent, InspectionEventType, OptionalEventPublisher};
use crate::engine::heat_disposition::{HeatDispositionAggregator, HeatLedger};
use crate::engine::section_gate::SectionApprovalGate;
use crate::engine::stage_reconciler::{CrossStageWarning, StageLedger};
use crate::engine::status_derivation::{CallStatusDerivation, DisplayStatus, UserAction};
use crate::engine::submodule_validator::SubmoduleValidator;
use crate::engine::tolerance::{ProcessField, ToleranceCheck};
use crate::engine::EngineError;
use crate::repository::call_status_repo::CallStatusRepository;
use crate::repository::draft_store::DraftSnapshotStore;
use crate::repository::error::RepositoryError;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// 逐小时记录在草稿存储中的科目键
const HOURLY_DRAFT_KEY: &str = "hourly";

// ==========================================
// InspectorContext - 当前检验工程师
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct InspectorContext {
    pub action_by: String,
    pub pincode: Option<String>,
    pub ie_short_name: String,
}

impl InspectorContext {
    pub fn new(action_by: impl Into<String>, ie_short_name: impl Into<String>) -> Self {
        Self {
            action_by: action_by.into(),
            pincode: None,
            ie_short_name: ie_short_name.into(),
        }
    }
}

// ==========================================
// CallSession - 单报验单内存状态
// ==========================================
struct CallSession {
    call: InspectionCall,
    heats: Vec<Heat>,
    header: Option<PoHeader>,
    amendment: Option<AmendmentInfo>,
    gate: SectionApprovalGate,
    draft: InspectionDraftState,
    stages: StageLedger,
    hourly: BTreeMap<ProcessStageKind, Vec<HourlyStageEntry>>,
    selected_line: String,
    selected_lot: Option<String>,
    workflow_transition_id: Option<String>,
}

impl CallSession {
    /// 将门控与工序状态同步进草稿
    fn sync_draft(&mut self) {
        self.draft.sections = self.gate.states();
        self.draft.manufactured = self.stages.manufactured_map();
    }

    fn refresh_stage_rejections(&mut self) {
        self.stages
            .refresh_rejections(&self.hourly, self.selected_lot.as_deref());
    }

    /// 切换产线/批号视图并刷新拒收数
    fn select_view(&mut self, line: String, lot: Option<String>) {
        self.stages.select(&line, lot.as_deref());
        self.selected_line = line;
        self.selected_lot = lot;
        self.refresh_stage_rejections();
    }

    fn hourly_rows(&self) -> usize {
        self.hourly.values().map(Vec::len).sum()
    }
}

/// 报验单概览
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOverview {
    pub call: InspectionCall,
    pub heats: Vec<Heat>,
    pub header: Option<PoHeader>,
    pub amendment: Option<AmendmentInfo>,
    pub visible_sections: Vec<Section>,
    pub draft: InspectionDraftState,
}

/// 工序数量汇总与跨工序告警
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stages: Vec<StageQuantity>,
    pub total_rejected: u32,
    pub process_accepted: Option<u32>,
    pub warnings: Vec<CrossStageWarning>,
}

// ==========================================
// InspectionApi
// ==========================================
pub struct InspectionApi {
    drafts: Arc<DraftSnapshotStore>,
    call_status_repo: Arc<CallStatusRepository>,
    config: InspectionConfig,
    validator: SubmoduleValidator,
    remote: RemoteServices,
    request_guard: RequestGuard,
    event_publisher: OptionalEventPublisher,
    inspector: InspectorContext,
    sessions: Mutex<HashMap<String, CallSession>>,
}

impl InspectionApi {
    pub fn new(
        drafts: Arc<DraftSnapshotStore>,
        call_status_repo: Arc<CallStatusRepository>,
        config: InspectionConfig,
        remote: RemoteServices,
        event_publisher: OptionalEventPublisher,
        inspector: InspectorContext,
    ) -> Self {
        let validator = SubmoduleValidator::new(config.tolerance.clone());
        Self {
            drafts,
            call_status_repo,
            config,
            validator,
            remote,
            request_guard: RequestGuard::new(),
            event_publisher,
            inspector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &InspectionConfig {
        &self.config
    }

    fn sessions(&self) -> ApiResult<MutexGuard<'_, HashMap<String, CallSession>>> {
        self.sessions
            .lock()
            .map_err(|e| ApiError::InternalError(format!("会话锁获取失败: {}", e)))
    }

    fn with_session<R>(
        &self,
        call_number: &str,
        f: impl FnOnce(&mut CallSession) -> ApiResult<R>,
    ) -> ApiResult<R> {
        let mut sessions = self.sessions()?;
        let session = sessions
            .get_mut(call_number)
            .ok_or_else(|| ApiError::NotFound(format!("报验单{}未加载", call_number)))?;
        f(session)
    }

    /// 自动保存: 会话已结束时静默跳过
    fn autosave(&self, session: &mut CallSession) -> ApiResult<()> {
        session.sync_draft();
        match self
            .drafts
            .save_snapshot(&session.call.call_number, &session.draft)
        {
            Ok(_) => Ok(()),
            Err(RepositoryError::SessionEnded { call_number }) => {
                tracing::debug!(%call_number, "会话已结束,跳过自动保存");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 显式保存: 会话已结束时返回错误
    fn save_session(&self, session: &mut CallSession) -> ApiResult<DraftSnapshot> {
        session.sync_draft();
        Ok(self
            .drafts
            .save_snapshot(&session.call.call_number, &session.draft)?)
    }

    /// 外部调用返回后校验凭据，已被新请求取代时丢弃响应
    fn ensure_current(&self, ticket: &RequestTicket) -> ApiResult<()> {
        if self.request_guard.is_current(ticket) {
            return Ok(());
        }
        tracing::warn!(
            call_number = %ticket.call_number,
            channel = %ticket.channel,
            generation = ticket.generation,
            "响应已过期,丢弃"
        );
        Err(ApiError::StaleResponse {
            call_number: ticket.call_number.clone(),
            generation: ticket.generation,
        })
    }

    fn remote_error(operation: RemoteOperation) -> impl Fn(RemoteError) -> ApiError {
        move |err| {
            tracing::warn!(%operation, error = %err, "外部调用失败,本地状态未改变");
            ApiError::Remote {
                operation,
                message: err.to_string(),
            }
        }
    }

    // ==========================================
    // 报验单加载 / 数据拉取
    // ==========================================

    /// 加载报验单并恢复草稿
    ///
    /// # 规则
    /// - 已持久化的状态优先于传入状态
    /// - 草稿只填充内存中为空的字段
    pub fn load_call(&self, mut call: InspectionCall, heats: Vec<Heat>) -> ApiResult<CallOverview> {
        if let Some(record) = self.call_status_repo.find(&call.call_number)? {
            call.status = record.status;
        }

        let mut draft = InspectionDraftState {
            sections: call.sections,
            ..Default::default()
        };
        let filled = self.drafts.restore_into(&call.call_number, &mut draft)?;
        call.sections = draft.sections;

        let mut stages = StageLedger::default();
        stages.restore_manufactured(&draft.manufactured);
        let hourly: BTreeMap<ProcessStageKind, Vec<HourlyStageEntry>> = self
            .drafts
            .load_discipline(&call.call_number, HOURLY_DRAFT_KEY)?
            .unwrap_or_default();
        stages.refresh_rejections(&hourly, None);

        tracing::info!(
            call_number = %call.call_number,
            status = %call.status,
            heats = heats.len(),
            filled,
            "报验单已加载"
        );

        let session = CallSession {
            gate: SectionApprovalGate::from_call(&call),
            call,
            heats,
            header: None,
            amendment: None,
            draft,
            stages,
            hourly,
            selected_line: DEFAULT_LINE.to_string(),
            selected_lot: None,
            workflow_transition_id: None,
        };
        let overview = Self::overview_of(&session);
        self.sessions()?
            .insert(session.call.call_number.clone(), session);
        Ok(overview)
    }

    fn overview_of(session: &CallSession) -> CallOverview {
        CallOverview {
            call: session.call.clone(),
            heats: session.heats.clone(),
            header: session.header.clone(),
            amendment: session.amendment.clone(),
            visible_sections: session.gate.visible_sections(),
            draft: session.draft.clone(),
        }
    }

    pub fn overview(&self, call_number: &str) -> ApiResult<CallOverview> {
        self.with_session(call_number, |session| Ok(Self::overview_of(session)))
    }

    /// 拉取 PO / 炉号数据
    ///
    /// # 规则
    /// - 同一报验单仅采纳最新请求的响应，过期响应丢弃
    /// - 新数据视为上游重新提交，分段全部重置为 UNSET
    pub async fn fetch_po_data(&self, call_number: &str) -> ApiResult<CallOverview> {
        let ticket = self.request_guard.begin(call_number, RequestChannel::PoData);
        let request = self.with_session(call_number, |session| {
            Ok(PoFetchRequest {
                po_number: session.call.po_number.clone(),
                call_number: session.call.call_number.clone(),
            })
        })?;

        let result = self.remote.po_data.fetch_po_data(&request).await;

        self.ensure_current(&ticket)?;
        let response = result.map_err(Self::remote_error(RemoteOperation::PoFetch))?;

        let overview = self.with_session(call_number, |session| {
            self.apply_po_data(session, response)?;
            Ok(Self::overview_of(session))
        })?;

        self.event_publisher.publish(InspectionEvent::new(
            call_number,
            InspectionEventType::DataRefetched,
            Some(format!("heats={}", overview.heats.len())),
        ));
        Ok(overview)
    }

    fn apply_po_data(&self, session: &mut CallSession, response: PoDataResponse) -> ApiResult<()> {
        let PoDataResponse {
            header,
            amendment,
            heats,
        } = response;

        session.call.product_model = header
            .product_description
            .as_deref()
            .and_then(ProductModel::detect)
            .unwrap_or(self.config.default_product_model);
        session.heats = heats.into_iter().map(|dto| dto.into_heat()).collect();
        session.header = Some(header);
        session.amendment = amendment;

        session.gate.reset_for_resubmission();
        session.call.sections = session.gate.states();

        tracing::info!(
            call_number = %session.call.call_number,
            heats = session.heats.len(),
            model = %session.call.product_model,
            "PO 数据已刷新,分段已重置"
        );
        self.autosave(session)
    }

    // ==========================================
    // 科目数据录入 / 炉号台账
    // ==========================================

    fn record_discipline<T>(
        &self,
        call_number: &str,
        discipline: Discipline,
        heat_number: &str,
        value: T,
    ) -> ApiResult<HeatLedgerEntry>
    where
        T: Serialize + DeserializeOwned,
    {
        // 读-改-写在会话锁内完成，同一报验单的并发录入串行化
        let version = self.with_session(call_number, |session| {
            if !session.heats.iter().any(|h| h.heat_number == heat_number) {
                return Err(ApiError::InvalidInput(format!(
                    "报验单{}不含炉号{}",
                    call_number, heat_number
                )));
            }
            let mut per_heat: BTreeMap<String, T> = self.load_per_heat(call_number, discipline)?;
            per_heat.insert(heat_number.to_string(), value);
            Ok(self
                .drafts
                .save_discipline(call_number, discipline.as_key(), &per_heat)?)
        })?;
        tracing::debug!(%call_number, %discipline, %heat_number, version, "科目数据已保存");

        self.heat_ledger(call_number)?
            .get(heat_number)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("炉号{}", heat_number)))
    }

    pub fn record_calibration(
        &self,
        call_number: &str,
        heat_number: &str,
        sample: ChemistrySample,
    ) -> ApiResult<HeatLedgerEntry> {
        self.record_discipline(call_number, Discipline::Calibration, heat_number, sample)
    }

    pub fn record_visual(
        &self,
        call_number: &str,
        heat_number: &str,
        selection: VisualSelection,
    ) -> ApiResult<HeatLedgerEntry> {
        self.record_discipline(call_number, Discipline::Visual, heat_number, selection)
    }

    pub fn record_dimensional(
        &self,
        call_number: &str,
        heat_number: &str,
        samples: DimensionalSamples,
    ) -> ApiResult<HeatLedgerEntry> {
        self.record_discipline(call_number, Discipline::Dimensional, heat_number, samples)
    }

    pub fn record_material_tests(
        &self,
        call_number: &str,
        heat_number: &str,
        samples: Vec<MaterialTestSample>,
    ) -> ApiResult<HeatLedgerEntry> {
        self.record_discipline(call_number, Discipline::MaterialTesting, heat_number, samples)
    }

    pub fn record_packing(
        &self,
        call_number: &str,
        heat_number: &str,
        checklist: PackingChecklist,
    ) -> ApiResult<HeatLedgerEntry> {
        self.record_discipline(call_number, Discipline::Packing, heat_number, checklist)
    }

    /// 读取全部科目的持久化数据
    pub fn load_samples(&self, call_number: &str) -> ApiResult<CallSampleSet> {
        Ok(CallSampleSet {
            calibration: self.load_per_heat(call_number, Discipline::Calibration)?,
            visual: self.load_per_heat(call_number, Discipline::Visual)?,
            dimensional: self.load_per_heat(call_number, Discipline::Dimensional)?,
            material_testing: self.load_per_heat(call_number, Discipline::MaterialTesting)?,
            packing: self.load_per_heat(call_number, Discipline::Packing)?,
        })
    }

    fn load_per_heat<T: DeserializeOwned>(
        &self,
        call_number: &str,
        discipline: Discipline,
    ) -> ApiResult<BTreeMap<String, T>> {
        Ok(self
            .drafts
            .load_discipline(call_number, discipline.as_key())?
            .unwrap_or_default())
    }

    /// 由最新持久化数据重新计算炉号台账
    pub fn heat_ledger(&self, call_number: &str) -> ApiResult<HeatLedger> {
        let samples = self.load_samples(call_number)?;
        self.with_session(call_number, |session| {
            let data = samples.per_heat(session.heats.iter().map(|h| h.heat_number.as_str()));
            Ok(HeatDispositionAggregator::build_ledger(
                &session.heats,
                &data,
                &self.validator,
                session.call.product_model,
            ))
        })
    }

    // ==========================================
    // 草稿字段
    // ==========================================

    pub fn set_heat_remarks(
        &self,
        call_number: &str,
        heat_number: &str,
        remarks: &str,
    ) -> ApiResult<DraftSnapshot> {
        self.with_session(call_number, |session| {
            session
                .draft
                .heat_remarks
                .insert(heat_number.to_string(), remarks.to_string());
            self.save_session(session)
        })
    }

    pub fn set_color_code(
        &self,
        call_number: &str,
        heat_number: &str,
        color_code: &str,
    ) -> ApiResult<DraftSnapshot> {
        self.with_session(call_number, |session| {
            session
                .draft
                .color_codes
                .insert(heat_number.to_string(), color_code.to_string());
            self.save_session(session)
        })
    }

    pub fn set_final_remarks(&self, call_number: &str, remarks: &str) -> ApiResult<DraftSnapshot> {
        self.with_session(call_number, |session| {
            session.draft.final_remarks = Some(remarks.to_string());
            self.save_session(session)
        })
    }

    /// 保存整单草稿（最后写入者胜出）
    pub fn save_draft(&self, call_number: &str) -> ApiResult<DraftSnapshot> {
        self.with_session(call_number, |session| self.save_session(session))
    }

    /// 保存整单草稿（乐观版本校验）
    pub fn save_draft_versioned(
        &self,
        call_number: &str,
        expected_version: i64,
    ) -> ApiResult<DraftSnapshot> {
        self.with_session(call_number, |session| {
            session.sync_draft();
            Ok(self
                .drafts
                .save_snapshot_versioned(call_number, &session.draft, expected_version)?)
        })
    }

    /// 清理超过保留期的草稿
    pub fn purge_expired_drafts(&self, now: NaiveDateTime) -> ApiResult<usize> {
        let cutoff = now - Duration::days(self.config.draft_retention_days);
        let removed = self.drafts.backend().purge_older_than(cutoff)?;
        tracing::info!(%cutoff, removed, "过期草稿已清理");
        Ok(removed)
    }

    /// 定时自动保存: 写入全部已加载会话的草稿
    ///
    /// # 返回
    /// - Ok(usize): 参与保存的会话数（已结束的会话静默跳过）
    pub fn autosave_loaded_sessions(&self) -> ApiResult<usize> {
        let mut sessions = self.sessions()?;
        let mut saved = 0;
        for session in sessions.values_mut() {
            self.autosave(session)?;
            saved += 1;
        }
        tracing::debug!(saved, "定时自动保存完成");
        Ok(saved)
    }

    // ==========================================
    // 工序数量
    // ==========================================

    /// 替换某工序的逐小时记录并刷新拒收数
    pub fn record_hourly_entries(
        &self,
        call_number: &str,
        stage: ProcessStageKind,
        entries: Vec<HourlyStageEntry>,
    ) -> ApiResult<StageQuantity> {
        self.with_session(call_number, |session| {
            session.hourly.insert(stage, entries);
            session.refresh_stage_rejections();
            self.drafts
                .save_discipline(call_number, HOURLY_DRAFT_KEY, &session.hourly)?;
            Ok(session.stages.get(stage))
        })
    }

    /// 选择批号（None 表示全部批号）
    ///
    /// 投产数按 产线/批号 分别保存，切换后只显示该批号自己的投产数
    pub fn select_lot(&self, call_number: &str, lot: Option<String>) -> ApiResult<Vec<StageQuantity>> {
        self.with_session(call_number, |session| {
            let line = session.selected_line.clone();
            session.select_view(line, lot);
            Ok(session.stages.ordered())
        })
    }

    /// 选择产线（保留当前批号）
    pub fn select_line(&self, call_number: &str, line: &str) -> ApiResult<Vec<StageQuantity>> {
        self.with_session(call_number, |session| {
            let lot = session.selected_lot.clone();
            session.select_view(line.to_string(), lot);
            Ok(session.stages.ordered())
        })
    }

    /// 录入投产数
    ///
    /// # 返回
    /// - Err(Engine(ManufacturedBelowRejected)): 投产数小于拒收数，该值已清空
    pub fn set_manufactured(
        &self,
        call_number: &str,
        stage: ProcessStageKind,
        manufactured: u32,
    ) -> ApiResult<StageQuantity> {
        self.with_session(call_number, |session| {
            let result = session.stages.set_manufactured(stage, manufactured);
            self.autosave(session)?;
            result?;
            Ok(session.stages.get(stage))
        })
    }

    /// 工序汇总
    ///
    /// # 参数
    /// - raw_material_accepted: 原材料阶段合格数（用于一致性告警）
    pub fn stage_summary(
        &self,
        call_number: &str,
        raw_material_accepted: Option<f64>,
    ) -> ApiResult<StageSummary> {
        self.with_session(call_number, |session| {
            let po_ordered_qty = session.header.as_ref().and_then(|h| h.ordered_qty);
            Ok(StageSummary {
                stages: session.stages.ordered(),
                total_rejected: session.stages.total_rejected(),
                process_accepted: session.stages.process_accepted(),
                warnings: session
                    .stages
                    .cross_stage_warnings(raw_material_accepted, po_ordered_qty),
            })
        })
    }

    /// 过程工序字段公差校验（按报验单产品型号）
    pub fn check_process_value(
        &self,
        call_number: &str,
        field_name: &str,
        raw_value: &str,
    ) -> ApiResult<ToleranceCheck> {
        let field = ProcessField::parse(field_name)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知工序字段: {}", field_name)))?;
        let model = self.with_session(call_number, |session| Ok(session.call.product_model))?;
        let check = self
            .config
            .tolerance
            .check_process_field(field, raw_value, model);
        if check.is_applicable && !check.is_valid {
            tracing::warn!(%call_number, field = field_name, raw_value, %model, "工序字段超出公差");
        }
        Ok(check)
    }

    // ==========================================
    // 分段审批
    // ==========================================

    /// 上传分段数据（不改变审批状态）
    pub async fn save_section(
        &self,
        call_number: &str,
        section: Section,
        section_payload: serde_json::Value,
    ) -> ApiResult<()> {
        let request = self.with_session(call_number, |session| {
            session.gate.check_enter(section)?;
            Ok(SectionSaveRequest {
                call_number: call_number.to_string(),
                section,
                section_payload,
                status: session.gate.states().get(section),
            })
        })?;
        let ticket = self.request_guard.begin(call_number, RequestChannel::Sections);
        let result = self.remote.sections.save_section(&request).await;
        self.ensure_current(&ticket)?;
        result.map_err(Self::remote_error(RemoteOperation::SectionDecision))
    }

    /// 批准/拒绝分段
    ///
    /// # 规则
    /// - 外部服务确认后才推进门控
    /// - 确认返回时重新校验进入条件（期间可能已重新拉取数据）
    /// - 拒绝时后续分段重置为 UNSET
    pub async fn decide_section(
        &self,
        call_number: &str,
        section: Section,
        outcome: SectionOutcome,
        remarks: Option<String>,
    ) -> ApiResult<SectionStates> {
        let transition = self.with_session(call_number, |session| {
            Ok(session.gate.plan(call_number, section, outcome, remarks)?)
        })?;

        let ticket = self.request_guard.begin(call_number, RequestChannel::Sections);
        let result = self.remote.sections.decide_section(&transition).await;
        self.ensure_current(&ticket)?;
        result.map_err(Self::remote_error(RemoteOperation::SectionDecision))?;

        let states = self.with_session(call_number, |session| {
            let transition = session.gate.plan(
                call_number,
                transition.section,
                transition.outcome,
                transition.remarks.clone(),
            )?;
            session.gate.apply(&transition);
            session.call.sections = session.gate.states();
            self.autosave(session)?;
            Ok(session.call.sections)
        })?;

        self.event_publisher.publish(InspectionEvent::new(
            call_number,
            InspectionEventType::SectionDecided,
            Some(format!("{}={}", section, outcome)),
        ));
        Ok(states)
    }

    // ==========================================
    // 生命周期
    // ==========================================

    fn workflow_action_for(action: &LifecycleAction) -> WorkflowAction {
        match action {
            LifecycleAction::Schedule { .. } => WorkflowAction::IeScheduled,
            LifecycleAction::Initiate { .. } | LifecycleAction::Resume { .. } => {
                WorkflowAction::EnterShiftDetailsAndStartInspection
            }
            LifecycleAction::Pause { .. } => WorkflowAction::PauseInspectionResumeNextDay,
            LifecycleAction::Withhold { .. } => WorkflowAction::Withheld,
            LifecycleAction::Cancel { .. } => WorkflowAction::Cancelled,
            LifecycleAction::Finish { .. } => WorkflowAction::InspectionCompleteConfirm,
        }
    }

    /// 执行生命周期动作
    ///
    /// # 规则
    /// - 引擎校验失败时不发起任何外部调用
    /// - 完成检验: 数据完备性由当前台账重新计算，备注缺省取草稿完成备注
    /// - 完成检验: 先提交完整载荷，再执行工作流转换
    /// - 完成/扣留/取消: 清理全部草稿并结束会话
    pub async fn perform_lifecycle(
        &self,
        call_number: &str,
        action: LifecycleAction,
    ) -> ApiResult<LifecycleTransition> {
        let heat_ledger = match action {
            LifecycleAction::Finish { .. } => Some(self.heat_ledger(call_number)?),
            _ => None,
        };
        let (transition, request) = self.with_session(call_number, |session| {
            let action = match (action, heat_ledger) {
                (LifecycleAction::Finish { remarks, .. }, Some(ledger)) => LifecycleAction::Finish {
                    remarks: remarks.or_else(|| session.draft.final_remarks.clone()),
                    readiness: FinishReadiness::from_ledgers(
                        &ledger,
                        &session.stages,
                        session.hourly_rows(),
                    ),
                },
                (action, _) => action,
            };
            let transition = CallLifecycleController::plan(&session.call, &action, &session.gate)?;
            let request = WorkflowTransitionRequest {
                workflow_transition_id: session.workflow_transition_id.clone(),
                request_id: call_number.to_string(),
                action: Self::workflow_action_for(&action),
                remarks: transition.remarks.clone(),
                action_by: self.inspector.action_by.clone(),
                pincode: self.inspector.pincode.clone(),
                material_available: None,
            };
            Ok((transition, request))
        })?;

        let ticket = self.request_guard.begin(call_number, RequestChannel::Workflow);
        if transition.to == CallStatus::Completed {
            let payload = self.build_finish_payload(call_number)?;
            let submitted = self.remote.submission.submit_finish(&payload).await;
            self.ensure_current(&ticket)?;
            submitted.map_err(Self::remote_error(RemoteOperation::FinishSubmission))?;
        }

        let result = self.remote.workflow.perform_transition(&request).await;
        self.ensure_current(&ticket)?;
        let response = result.map_err(Self::remote_error(RemoteOperation::WorkflowTransition))?;

        let cleared = self.with_session(call_number, |session| {
            if session.call.status != transition.from {
                return Err(EngineError::InvalidTransition {
                    from: session.call.status,
                    to: transition.to,
                }
                .into());
            }
            CallLifecycleController::commit(&mut session.call, &transition);
            if response.workflow_transition_id.is_some() {
                session.workflow_transition_id = response.workflow_transition_id.clone();
            }
            self.call_status_repo.upsert(
                call_number,
                transition.to,
                &json!({
                    "action": transition.action.name(),
                    "reason": transition.reason.map(ReasonCode::as_str),
                    "remarks": transition.remarks,
                    "shift": transition.shift,
                    "inspection_date": transition.inspection_date,
                    "scheduled_date": transition.scheduled_date,
                }),
            )?;
            self.after_commit(session, &transition)
        })?;

        self.event_publisher.publish(InspectionEvent::new(
            call_number,
            InspectionEventType::LifecycleTransitioned,
            Some(format!("{} -> {}", transition.from, transition.to)),
        ));
        if let Some(removed) = cleared {
            self.event_publisher.publish(InspectionEvent::new(
                call_number,
                InspectionEventType::DraftsCleared,
                Some(format!("removed={}", removed)),
            ));
        }
        Ok(transition)
    }

    /// 提交后的草稿处理，返回被清理的键数
    fn after_commit(
        &self,
        session: &mut CallSession,
        transition: &LifecycleTransition,
    ) -> ApiResult<Option<usize>> {
        let call_number = session.call.call_number.clone();
        match &transition.action {
            LifecycleAction::Initiate { .. } => {
                self.drafts.reset_session(&call_number)?;
                session.draft.shift = transition.shift;
                session.draft.inspection_date = transition.inspection_date;
                self.autosave(session)?;
            }
            LifecycleAction::Resume { .. } => {
                self.drafts.restore_into(&call_number, &mut session.draft)?;
                session.stages.restore_manufactured(&session.draft.manufactured);
                if transition.shift.is_some() {
                    session.draft.shift = transition.shift;
                    session.draft.inspection_date = transition.inspection_date;
                }
                self.autosave(session)?;
            }
            LifecycleAction::Pause { .. } => self.autosave(session)?,
            LifecycleAction::Schedule { .. } => {}
            LifecycleAction::Withhold { .. }
            | LifecycleAction::Cancel { .. }
            | LifecycleAction::Finish { .. } => {
                return Ok(Some(self.drafts.end_session(&call_number)?));
            }
        }
        Ok(None)
    }

    /// 组装完成检验载荷
    pub fn build_finish_payload(&self, call_number: &str) -> ApiResult<FinishInspectionPayload> {
        let samples = self.load_samples(call_number)?;
        let ledger = self.heat_ledger(call_number)?;
        self.with_session(call_number, |session| {
            session.sync_draft();
            let stages = (session.call.product_type == ProductType::ProcessMaterial)
                .then_some(&session.stages);
            Ok(FinishInspectionPayload::build(
                &session.call,
                &session.heats,
                &session.draft,
                &ledger,
                &samples,
                stages,
                Local::now().naive_local(),
            ))
        })
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub async fn schedule(
        &self,
        call_number: &str,
        scheduled_date: NaiveDate,
    ) -> ApiResult<LifecycleTransition> {
        self.perform_lifecycle(call_number, LifecycleAction::Schedule { scheduled_date })
            .await
    }

    pub async fn initiate(
        &self,
        call_number: &str,
        shift: Option<Shift>,
        chosen_date: Option<NaiveDate>,
    ) -> ApiResult<LifecycleTransition> {
        let action = LifecycleAction::Initiate {
            shift,
            chosen_date,
            today: Self::today(),
        };
        self.perform_lifecycle(call_number, action).await
    }

    pub async fn pause(
        &self,
        call_number: &str,
        remarks: Option<String>,
    ) -> ApiResult<LifecycleTransition> {
        self.perform_lifecycle(call_number, LifecycleAction::Pause { remarks })
            .await
    }

    pub async fn resume(
        &self,
        call_number: &str,
        shift: Option<Shift>,
        chosen_date: Option<NaiveDate>,
    ) -> ApiResult<LifecycleTransition> {
        let action = LifecycleAction::Resume {
            shift,
            chosen_date,
            today: Self::today(),
        };
        self.perform_lifecycle(call_number, action).await
    }

    pub async fn withhold(
        &self,
        call_number: &str,
        reason: Option<ReasonCode>,
        remarks: Option<String>,
    ) -> ApiResult<LifecycleTransition> {
        self.perform_lifecycle(call_number, LifecycleAction::Withhold { reason, remarks })
            .await
    }

    pub async fn cancel(
        &self,
        call_number: &str,
        reason: Option<ReasonCode>,
        remarks: Option<String>,
    ) -> ApiResult<LifecycleTransition> {
        self.perform_lifecycle(call_number, LifecycleAction::Cancel { reason, remarks })
            .await
    }

    /// 完成检验（完成备注取草稿 final_remarks）
    pub async fn finish(&self, call_number: &str) -> ApiResult<LifecycleTransition> {
        let action = LifecycleAction::Finish {
            remarks: None,
            readiness: FinishReadiness::default(),
        };
        self.perform_lifecycle(call_number, action).await
    }

    /// 不改变生命周期状态的工作流动作（核对 PO、请求更正、确认物料等）
    pub async fn perform_workflow_action(
        &self,
        call_number: &str,
        action: WorkflowAction,
        remarks: Option<String>,
        material_available: Option<bool>,
    ) -> ApiResult<()> {
        if !matches!(
            action,
            WorkflowAction::VerifyPoDetails
                | WorkflowAction::RequestCorrectionToCm
                | WorkflowAction::VerifyMaterialAvailability
                | WorkflowAction::EntryInspectionResults
        ) {
            return Err(ApiError::InvalidInput(format!(
                "{} 须通过生命周期动作执行",
                action
            )));
        }
        if action == WorkflowAction::RequestCorrectionToCm
            && remarks.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(EngineError::MissingRemarks.into());
        }

        let request = self.with_session(call_number, |session| {
            Ok(WorkflowTransitionRequest {
                workflow_transition_id: session.workflow_transition_id.clone(),
                request_id: call_number.to_string(),
                action,
                remarks,
                action_by: self.inspector.action_by.clone(),
                pincode: self.inspector.pincode.clone(),
                material_available: (action == WorkflowAction::VerifyMaterialAvailability)
                    .then_some(material_available.unwrap_or(false)),
            })
        })?;

        let ticket = self.request_guard.begin(call_number, RequestChannel::Workflow);
        let result = self.remote.workflow.perform_transition(&request).await;
        self.ensure_current(&ticket)?;
        let response = result.map_err(Self::remote_error(RemoteOperation::WorkflowTransition))?;

        self.with_session(call_number, |session| {
            if response.workflow_transition_id.is_some() {
                session.workflow_transition_id = response.workflow_transition_id;
            }
            tracing::info!(%call_number, %action, "工作流动作已执行");
            Ok(())
        })
    }

    // ==========================================
    // 状态展示
    // ==========================================

    /// 展示状态: WITHHELD > PAUSED > 有持久化数据 → UNDER_INSPECTION > 存储状态
    pub fn display_status(&self, call_number: &str) -> ApiResult<DisplayStatus> {
        let stored = match self.call_status_repo.find(call_number)? {
            Some(record) => record.status,
            None => self.with_session(call_number, |session| Ok(session.call.status))?,
        };
        let has_data = self.drafts.has_durable_data(call_number)?;
        Ok(CallStatusDerivation::derive_display_status(stored, has_data))
    }

    pub fn available_actions(&self, call_number: &str) -> ApiResult<Vec<UserAction>> {
        let status = self.display_status(call_number)?.status;
        Ok(CallStatusDerivation::available_actions(status))
    }

    /// 检验证书编号
    pub fn ic_number(&self, call_number: &str) -> ApiResult<String> {
        self.with_session(call_number, |session| {
            let rio = session
                .header
                .as_ref()
                .and_then(|h| h.rio.as_deref())
                .unwrap_or_default();
            generate_ic_number(rio, call_number, &self.inspector.ie_short_name)
                .ok_or_else(|| ApiError::InvalidInput(format!("报验单{}缺少 RIO", call_number)))
        })
    }
}
