// ==========================================
// 检验业务 API 集成测试
// ==========================================
// 测试范围:
// 1. 过期 PO 响应丢弃
// 2. 外部调用失败 → 本地状态不变
// 3. 完整流程: 开始 → A/B/C 批准 → 完成提交 → 草稿清理
// 4. 展示状态优先级、投产数拒绝、重启恢复
// 5. 完成检验的备注与数据完备性守卫
// 6. 分段/工作流响应被新请求取代、确认期间数据重拉
// 7. 投产数按批号隔离、并发科目录入
// ==========================================

#[path = "helpers/mock_remote.rs"]
mod mock_remote;

use inspection_engine::api::{ApiError, InspectorContext, RemoteOperation, WorkflowAction};
use inspection_engine::app::AppState;
use inspection_engine::domain::{
    CallStatus, ChecklistAnswer, ChemistrySample, DimensionalSamples, Disposition, Heat,
    HourlyStageEntry, InspectionCall, MaterialTestSample, PackingChecklist, ProcessStageKind, ProductModel,
    ReasonCode, Section, SectionOutcome, SectionStatus, Shift, VisualSelection, NO_DEFECT,
};
use inspection_engine::engine::{
    EngineError, InspectionEvent, InspectionEventPublisher, InspectionEventType,
    OptionalEventPublisher, SectionApprovalGate,
};
use mock_remote::{po_response, MockRemote};
use std::error::Error;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_helpers::{create_test_db, process_material_call, raw_material_call};

// ==========================================
// 测试辅助
// ==========================================

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<InspectionEvent>>,
}

impl RecordingPublisher {
    fn types(&self) -> Vec<InspectionEventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }
}

impl InspectionEventPublisher for RecordingPublisher {
    fn publish(&self, event: InspectionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        let id = event.event_id.clone();
        self.events.lock().unwrap().push(event);
        Ok(id)
    }
}

async fn app_state(
    db_path: &str,
    remote: &Arc<MockRemote>,
    publisher: &Arc<RecordingPublisher>,
) -> AppState {
    AppState::with_event_publisher(
        db_path.to_string(),
        remote.services(),
        InspectorContext::new("IE-7", "RKS"),
        OptionalEventPublisher::with_publisher(publisher.clone()),
    )
    .await
    .unwrap()
}

fn in_range_chemistry() -> ChemistrySample {
    ChemistrySample {
        carbon: Some(0.55),
        silicon: Some(1.8),
        manganese: Some(0.9),
        phosphorus: Some(0.02),
        sulphur: Some(0.02),
    }
}

/// 开始检验并批准全部必需分段
async fn start_and_approve(state: &AppState, call: InspectionCall, heats: Vec<Heat>) {
    let api = &state.inspection_api;
    let call_number = call.call_number.clone();
    let sections = SectionApprovalGate::from_call(&call).required_sections();
    api.load_call(call, heats).unwrap();
    api.initiate(&call_number, Some(Shift::A), None).await.unwrap();
    for section in sections {
        api.decide_section(&call_number, section, SectionOutcome::Approved, None)
            .await
            .unwrap();
    }
}

fn record_all_ok(state: &AppState, call_number: &str, heat: &str) {
    let api = &state.inspection_api;
    api.record_calibration(call_number, heat, in_range_chemistry())
        .unwrap();
    api.record_visual(
        call_number,
        heat,
        VisualSelection::from_pairs([(NO_DEFECT, true)]),
    )
    .unwrap();
    api.record_dimensional(
        call_number,
        heat,
        DimensionalSamples::new(vec![Some(20.60), Some(20.65)]),
    )
    .unwrap();
    api.record_material_tests(
        call_number,
        heat,
        vec![MaterialTestSample {
            chemistry: in_range_chemistry(),
            grain_size: Some(7.0),
            decarb_depth: Some(0.20),
            inclusion_a: Some(1.5),
            inclusion_b: Some(1.0),
            inclusion_c: Some(0.5),
            inclusion_d: Some(1.0),
        }],
    )
    .unwrap();
    api.record_packing(
        call_number,
        heat,
        PackingChecklist::uniform(ChecklistAnswer::Yes),
    )
    .unwrap();
}

// ==========================================
// 测试用例
// ==========================================

#[tokio::test]
async fn test_stale_po_response_is_discarded() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let (call, heats) = raw_material_call("C1");
    state.inspection_api.load_call(call, heats).unwrap();

    // 第一次请求较慢，第二次请求先返回
    remote.push_po_response(
        Duration::from_millis(50),
        po_response("ERC MK-V", &[("OLD", 1.0)]),
    );
    remote.push_po_response(
        Duration::ZERO,
        po_response("ERC MK-III", &[("H1", 12.5), ("H2", 7.5)]),
    );

    let api = &state.inspection_api;
    let (first, second) = tokio::join!(api.fetch_po_data("C1"), api.fetch_po_data("C1"));

    assert!(matches!(first, Err(ApiError::StaleResponse { .. })));
    let overview = second.unwrap();
    let heat_numbers: Vec<&str> = overview
        .heats
        .iter()
        .map(|h| h.heat_number.as_str())
        .collect();
    assert_eq!(heat_numbers, vec!["H1", "H2"]);

    let current = api.overview("C1").unwrap();
    assert_eq!(current.call.product_model, ProductModel::MkIII);
    assert_eq!(current.heats.len(), 2);
    assert_eq!(
        publisher.types(),
        vec![InspectionEventType::DataRefetched]
    );
}

#[tokio::test]
async fn test_refetch_resets_sections() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let (call, heats) = raw_material_call("C1");
    let api = &state.inspection_api;
    api.load_call(call, heats).unwrap();

    api.decide_section("C1", Section::A, SectionOutcome::Approved, None)
        .await
        .unwrap();
    assert!(api.overview("C1").unwrap().visible_sections.contains(&Section::B));

    api.fetch_po_data("C1").await.unwrap();
    let overview = api.overview("C1").unwrap();
    assert_eq!(overview.call.sections.section_a, SectionStatus::Unset);
    assert_eq!(overview.visible_sections, vec![Section::A]);
}

#[tokio::test]
async fn test_remote_failures_leave_local_state_unchanged() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let (call, heats) = raw_material_call("C1");
    let api = &state.inspection_api;
    api.load_call(call, heats).unwrap();

    remote.fail_po_fetch.store(true, Ordering::SeqCst);
    let err = api.fetch_po_data("C1").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Remote {
            operation: RemoteOperation::PoFetch,
            ..
        }
    ));
    assert!(err.is_recoverable());
    assert_eq!(api.overview("C1").unwrap().heats.len(), 2);

    remote.fail_sections.store(true, Ordering::SeqCst);
    let err = api
        .decide_section("C1", Section::A, SectionOutcome::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Remote {
            operation: RemoteOperation::SectionDecision,
            ..
        }
    ));
    assert_eq!(
        api.overview("C1").unwrap().call.sections.section_a,
        SectionStatus::Unset
    );

    remote.fail_workflow.store(true, Ordering::SeqCst);
    let err = api
        .withhold("C1", Some(ReasonCode::VendorWithdrawn), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Remote {
            operation: RemoteOperation::WorkflowTransition,
            ..
        }
    ));
    assert_eq!(api.overview("C1").unwrap().call.status, CallStatus::Pending);
    assert!(state.call_status_repo.find("C1").unwrap().is_none());
    assert!(publisher.types().is_empty());

    // 服务恢复后可重试
    remote.fail_sections.store(false, Ordering::SeqCst);
    let states = api
        .decide_section("C1", Section::A, SectionOutcome::Approved, None)
        .await
        .unwrap();
    assert_eq!(states.section_a, SectionStatus::Approved);
}

#[tokio::test]
async fn test_engine_rejection_makes_no_remote_call() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let (call, heats) = raw_material_call("C1");
    let api = &state.inspection_api;
    api.load_call(call, heats).unwrap();

    let err = api.initiate("C1", None, None).await.unwrap_err();
    assert!(matches!(err, ApiError::Engine(EngineError::MissingShift)));

    let err = api
        .cancel("C1", Some(ReasonCode::AnyOther), Some(" ".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Engine(EngineError::MissingRemarks)));

    let err = api
        .decide_section("C1", Section::B, SectionOutcome::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Engine(EngineError::SectionLocked { .. })
    ));

    let err = api
        .perform_workflow_action("C1", WorkflowAction::RequestCorrectionToCm, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Engine(EngineError::MissingRemarks)));

    assert!(remote.workflow_actions().is_empty());
    assert!(remote.decisions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_full_raw_material_flow() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let (call, heats) = raw_material_call("C1");
    let api = &state.inspection_api;
    api.load_call(call, heats).unwrap();

    api.schedule("C1", chrono::Local::now().date_naive())
        .await
        .unwrap();
    api.initiate("C1", Some(Shift::A), None).await.unwrap();
    assert_eq!(
        api.display_status("C1").unwrap().status,
        CallStatus::UnderInspection
    );

    record_all_ok(&state, "C1", "H1");
    record_all_ok(&state, "C1", "H2");
    let h2 = api
        .record_packing(
            "C1",
            "H2",
            PackingChecklist {
                tags_attached: Some(ChecklistAnswer::No),
                ..PackingChecklist::uniform(ChecklistAnswer::Yes)
            },
        )
        .unwrap();
    assert_eq!(h2.disposition.disposition, Disposition::Rejected);

    api.set_color_code("C1", "H1", "Red").unwrap();
    api.set_heat_remarks("C1", "H2", "tags missing").unwrap();
    api.set_final_remarks("C1", "H1 accepted").unwrap();

    // 分段未全部批准前不能完成
    let err = api.finish("C1").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Engine(EngineError::GateNotSatisfied(_))
    ));
    assert!(remote.submissions.lock().unwrap().is_empty());

    for section in [Section::A, Section::B, Section::C] {
        api.save_section("C1", section, serde_json::json!({"checked": true}))
            .await
            .unwrap();
        api.decide_section("C1", section, SectionOutcome::Approved, None)
            .await
            .unwrap();
    }

    let transition = api.finish("C1").await.unwrap();
    assert_eq!(transition.to, CallStatus::Completed);

    let submissions = remote.submissions.lock().unwrap().clone();
    assert_eq!(submissions.len(), 1);
    let payload = &submissions[0];
    assert_eq!(payload.summary.shift, Some(Shift::A));
    assert_eq!(payload.summary.total_accepted_weight, 12.5);
    assert_eq!(payload.summary.total_rejected_weight, 7.5);
    assert_eq!(payload.heats[0].color_code.as_deref(), Some("Red"));
    assert_eq!(payload.heats[1].remarks.as_deref(), Some("tags missing"));
    assert_eq!(payload.final_remarks.as_deref(), Some("H1 accepted"));
    assert!(payload.process.is_none());
    assert_eq!(payload.samples.calibration.len(), 2);

    assert_eq!(
        remote.workflow_actions(),
        vec![
            WorkflowAction::IeScheduled,
            WorkflowAction::EnterShiftDetailsAndStartInspection,
            WorkflowAction::InspectionCompleteConfirm,
        ]
    );

    // 完成后草稿全部清理，会话不再接受保存
    assert!(!state.draft_store.has_durable_data("C1").unwrap());
    assert_eq!(
        api.display_status("C1").unwrap().status,
        CallStatus::Completed
    );
    assert!(api.available_actions("C1").unwrap().is_empty());
    let err = api.set_heat_remarks("C1", "H1", "late edit").unwrap_err();
    assert!(matches!(err, ApiError::SessionEnded(_)));

    let types = publisher.types();
    assert!(types.contains(&InspectionEventType::SectionDecided));
    assert_eq!(types.last(), Some(&InspectionEventType::DraftsCleared));
}

#[tokio::test]
async fn test_display_status_precedence_through_api() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;

    let (call, heats) = raw_material_call("C1");
    api.load_call(call, heats).unwrap();
    api.schedule("C1", chrono::Local::now().date_naive())
        .await
        .unwrap();
    assert_eq!(api.display_status("C1").unwrap().status, CallStatus::Scheduled);

    // 有实质草稿 → 检验中
    api.set_heat_remarks("C1", "H1", "surface ok").unwrap();
    assert_eq!(
        api.display_status("C1").unwrap().status,
        CallStatus::UnderInspection
    );

    api.initiate("C1", Some(Shift::General), None).await.unwrap();
    api.pause("C1", Some("continue tomorrow".to_string()))
        .await
        .unwrap();
    assert_eq!(api.display_status("C1").unwrap().status, CallStatus::Paused);
    assert_eq!(
        api.available_actions("C1").unwrap(),
        vec![inspection_engine::engine::UserAction::EnterShiftDetails]
    );

    api.resume("C1", None, None).await.unwrap();
    api.withhold(
        "C1",
        Some(ReasonCode::AnyOther),
        Some("vendor asked for re-offer".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(api.display_status("C1").unwrap().status, CallStatus::Withheld);

    let record = state.call_status_repo.find("C1").unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Withheld);
    assert_eq!(record.metadata["reason"], "ANY_OTHER");
    assert!(!state.draft_store.has_durable_data("C1").unwrap());
}

#[tokio::test]
async fn test_manufactured_below_rejected_is_refused() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;

    let (call, heats) = process_material_call("P1");
    api.load_call(call, heats).unwrap();

    let stage = api
        .record_hourly_entries(
            "P1",
            ProcessStageKind::Shearing,
            vec![
                HourlyStageEntry::for_lot("L1").with_rejected(6),
                HourlyStageEntry::for_lot("L2").with_rejected(4),
            ],
        )
        .unwrap();
    assert_eq!(stage.rejected, 10);

    let err = api
        .set_manufactured("P1", ProcessStageKind::Shearing, 5)
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Engine(EngineError::ManufacturedBelowRejected {
            manufactured: 5,
            rejected: 10,
            ..
        })
    ));
    let summary = api.stage_summary("P1", None).unwrap();
    let shearing = summary
        .stages
        .iter()
        .find(|s| s.stage == ProcessStageKind::Shearing)
        .unwrap();
    assert_eq!(shearing.manufactured, None);

    let accepted = api
        .set_manufactured("P1", ProcessStageKind::Shearing, 100)
        .unwrap();
    assert_eq!(accepted.accepted(), Some(90));
    assert_eq!(
        api.stage_summary("P1", None).unwrap().process_accepted,
        Some(90)
    );

    // 按批号过滤
    let by_lot = api.select_lot("P1", Some("L2".to_string())).unwrap();
    let shearing = by_lot
        .iter()
        .find(|s| s.stage == ProcessStageKind::Shearing)
        .unwrap();
    assert_eq!(shearing.rejected, 4);
}

#[tokio::test]
async fn test_drafts_survive_restart() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());

    {
        let state = app_state(&db_path, &remote, &publisher).await;
        let (call, heats) = raw_material_call("C1");
        state.inspection_api.load_call(call, heats).unwrap();
        state
            .inspection_api
            .initiate("C1", Some(Shift::B), None)
            .await
            .unwrap();
        state
            .inspection_api
            .set_heat_remarks("C1", "H1", "ok")
            .unwrap();
        state
            .inspection_api
            .record_calibration("C1", "H1", in_range_chemistry())
            .unwrap();
    }

    let state = app_state(&db_path, &remote, &publisher).await;
    let (call, heats) = raw_material_call("C1");
    let overview = state.inspection_api.load_call(call, heats).unwrap();

    assert_eq!(overview.call.status, CallStatus::UnderInspection);
    assert_eq!(overview.draft.shift, Some(Shift::B));
    assert_eq!(
        overview.draft.heat_remarks.get("H1").map(String::as_str),
        Some("ok")
    );
    let samples = state.inspection_api.load_samples("C1").unwrap();
    assert_eq!(samples.calibration.get("H1"), Some(&in_range_chemistry()));

    // 乐观版本: 过期版本被拒绝
    let current = state
        .draft_store
        .load_snapshot("C1")
        .unwrap()
        .unwrap()
        .version;
    let err = state
        .inspection_api
        .save_draft_versioned("C1", current - 1)
        .unwrap_err();
    assert!(matches!(err, ApiError::VersionConflict(_)));
    let saved = state
        .inspection_api
        .save_draft_versioned("C1", current)
        .unwrap();
    assert_eq!(saved.version, current + 1);
}

#[tokio::test]
async fn test_process_value_check_uses_call_model() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;

    let (call, heats) = process_material_call("P1");
    api.load_call(call, heats).unwrap();

    // 默认 MK-III
    assert!(!api.check_process_value("P1", "dia", "22.9").unwrap().is_valid);

    remote.push_po_response(Duration::ZERO, po_response("ERC MK-V", &[("H10", 3.0)]));
    api.fetch_po_data("P1").await.unwrap();
    assert!(api.check_process_value("P1", "dia", "22.9").unwrap().is_valid);

    let empty = api.check_process_value("P1", "forgingTemperature", "").unwrap();
    assert!(!empty.is_applicable);

    let err = api.check_process_value("P1", "noSuchField", "1").unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[tokio::test]
async fn test_finish_requires_final_remarks() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;
    let (call, heats) = raw_material_call("C1");
    start_and_approve(&state, call, heats).await;
    record_all_ok(&state, "C1", "H1");
    record_all_ok(&state, "C1", "H2");

    let err = api.finish("C1").await.unwrap_err();
    assert!(matches!(err, ApiError::Engine(EngineError::MissingRemarks)));
    api.set_final_remarks("C1", "   ").unwrap();
    let err = api.finish("C1").await.unwrap_err();
    assert!(matches!(err, ApiError::Engine(EngineError::MissingRemarks)));

    assert!(remote.submissions.lock().unwrap().is_empty());
    assert_eq!(
        remote.workflow_actions(),
        vec![WorkflowAction::EnterShiftDetailsAndStartInspection]
    );
    assert_eq!(api.overview("C1").unwrap().call.status, CallStatus::UnderInspection);

    api.set_final_remarks("C1", "both heats accepted").unwrap();
    let transition = api.finish("C1").await.unwrap();
    assert_eq!(transition.remarks.as_deref(), Some("both heats accepted"));
    let requests = remote.workflow_requests.lock().unwrap().clone();
    assert_eq!(
        requests.last().and_then(|r| r.remarks.as_deref()),
        Some("both heats accepted")
    );
}

#[tokio::test]
async fn test_finish_requires_every_heat_decided() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;
    let (call, heats) = raw_material_call("C1");
    start_and_approve(&state, call, heats).await;
    api.set_final_remarks("C1", "done").unwrap();

    // 没有任何科目数据: 两个炉号均 PENDING
    let err = api.finish("C1").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Engine(EngineError::GateNotSatisfied(ref reason)) if reason.contains('2')
    ));

    record_all_ok(&state, "C1", "H1");
    let err = api.finish("C1").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Engine(EngineError::GateNotSatisfied(_))
    ));
    assert!(remote.submissions.lock().unwrap().is_empty());

    record_all_ok(&state, "C1", "H2");
    api.finish("C1").await.unwrap();
    let submissions = remote.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].summary.pending_heats, 0);
}

#[tokio::test]
async fn test_process_finish_requires_stage_data() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;
    let (call, heats) = process_material_call("P1");
    start_and_approve(&state, call, heats).await;
    api.set_final_remarks("P1", "process ok").unwrap();

    let err = api.finish("P1").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Engine(EngineError::GateNotSatisfied(_))
    ));
    assert!(remote.submissions.lock().unwrap().is_empty());

    api.set_manufactured("P1", ProcessStageKind::Shearing, 200)
        .unwrap();
    api.finish("P1").await.unwrap();
    let submissions = remote.submissions.lock().unwrap();
    let process = submissions[0].process.as_ref().unwrap();
    assert_eq!(process.process_accepted, Some(200));
}

#[tokio::test]
async fn test_superseded_section_and_workflow_responses_are_discarded() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;
    let (call, heats) = raw_material_call("C1");
    api.load_call(call, heats).unwrap();

    // 分段: 慢的批准被随后的拒绝取代
    remote.push_section_delay(Duration::from_millis(50));
    remote.push_section_delay(Duration::ZERO);
    let (approve, reject) = tokio::join!(
        api.decide_section("C1", Section::A, SectionOutcome::Approved, None),
        api.decide_section(
            "C1",
            Section::A,
            SectionOutcome::Rejected,
            Some("PO mismatch".to_string())
        ),
    );
    assert!(matches!(approve, Err(ApiError::StaleResponse { .. })));
    assert_eq!(reject.unwrap().section_a, SectionStatus::Rejected);
    assert_eq!(
        api.overview("C1").unwrap().call.sections.section_a,
        SectionStatus::Rejected
    );

    // 工作流: 慢的扣留被随后的取消取代
    remote.push_workflow_delay(Duration::from_millis(50));
    remote.push_workflow_delay(Duration::ZERO);
    let (withhold, cancel) = tokio::join!(
        api.withhold("C1", Some(ReasonCode::VendorWithdrawn), None),
        api.cancel("C1", Some(ReasonCode::MaterialNotAvailable), None),
    );
    assert!(matches!(withhold, Err(ApiError::StaleResponse { .. })));
    assert_eq!(cancel.unwrap().to, CallStatus::Cancelled);
    assert_eq!(api.overview("C1").unwrap().call.status, CallStatus::Cancelled);
    let record = state.call_status_repo.find("C1").unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Cancelled);
    assert_eq!(record.metadata["reason"], "MATERIAL_NOT_AVAILABLE");
}

#[tokio::test]
async fn test_stale_workflow_action_is_discarded() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;
    let (call, heats) = raw_material_call("C1");
    api.load_call(call, heats).unwrap();

    remote.push_workflow_delay(Duration::from_millis(50));
    remote.push_workflow_delay(Duration::ZERO);
    let (first, second) = tokio::join!(
        api.perform_workflow_action("C1", WorkflowAction::VerifyPoDetails, None, None),
        api.perform_workflow_action(
            "C1",
            WorkflowAction::VerifyMaterialAvailability,
            None,
            Some(true)
        ),
    );
    assert!(matches!(first, Err(ApiError::StaleResponse { .. })));
    second.unwrap();
}

#[tokio::test]
async fn test_section_decision_rechecked_after_refetch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;
    let (call, heats) = raw_material_call("C1");
    api.load_call(call, heats).unwrap();
    api.decide_section("C1", Section::A, SectionOutcome::Approved, None)
        .await
        .unwrap();

    // B 的确认在途时重新拉取 PO 数据，A 被重置
    remote.push_section_delay(Duration::from_millis(50));
    let (decision, refetch) = tokio::join!(
        api.decide_section("C1", Section::B, SectionOutcome::Approved, None),
        api.fetch_po_data("C1"),
    );
    refetch.unwrap();
    assert!(matches!(
        decision,
        Err(ApiError::Engine(EngineError::SectionLocked {
            section: Section::B,
            ..
        }))
    ));

    let sections = api.overview("C1").unwrap().call.sections;
    assert_eq!(sections.section_a, SectionStatus::Unset);
    assert_eq!(sections.section_b, SectionStatus::Unset);
}

#[tokio::test]
async fn test_manufactured_is_kept_per_lot() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());

    {
        let state = app_state(&db_path, &remote, &publisher).await;
        let api = &state.inspection_api;
        let (call, heats) = process_material_call("P1");
        api.load_call(call, heats).unwrap();
        api.record_hourly_entries(
            "P1",
            ProcessStageKind::Shearing,
            vec![
                HourlyStageEntry::for_lot("L1").with_rejected(6),
                HourlyStageEntry::for_lot("L2").with_rejected(4),
            ],
        )
        .unwrap();

        api.select_lot("P1", Some("L1".to_string())).unwrap();
        let l1 = api
            .set_manufactured("P1", ProcessStageKind::Shearing, 50)
            .unwrap();
        assert_eq!(l1.accepted(), Some(44));

        let by_lot = api.select_lot("P1", Some("L2".to_string())).unwrap();
        let shearing = by_lot
            .iter()
            .find(|s| s.stage == ProcessStageKind::Shearing)
            .unwrap();
        assert_eq!(shearing.manufactured, None);
        assert_eq!(shearing.rejected, 4);

        let l2 = api
            .set_manufactured("P1", ProcessStageKind::Shearing, 20)
            .unwrap();
        assert_eq!(l2.accepted(), Some(16));

        let by_lot = api.select_lot("P1", Some("L1".to_string())).unwrap();
        let shearing = by_lot
            .iter()
            .find(|s| s.stage == ProcessStageKind::Shearing)
            .unwrap();
        assert_eq!(shearing.manufactured, Some(50));

        // 同批号换产线也互不影响
        let other_line = api.select_line("P1", "LINE-2").unwrap();
        assert!(other_line.iter().all(|s| s.manufactured.is_none()));
    }

    // 重启后按批号恢复
    let state = app_state(&db_path, &remote, &publisher).await;
    let api = &state.inspection_api;
    let (call, heats) = process_material_call("P1");
    let overview = api.load_call(call, heats).unwrap();
    assert_eq!(overview.draft.manufactured.len(), 2);
    let by_lot = api.select_lot("P1", Some("L2".to_string())).unwrap();
    let shearing = by_lot
        .iter()
        .find(|s| s.stage == ProcessStageKind::Shearing)
        .unwrap();
    assert_eq!(shearing.manufactured, Some(20));
}

#[tokio::test]
async fn test_concurrent_discipline_records_keep_every_heat() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let remote = MockRemote::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let state = app_state(&db_path, &remote, &publisher).await;
    let (call, heats) = raw_material_call("C1");
    state.inspection_api.load_call(call, heats).unwrap();

    let workers: Vec<_> = ["H1", "H2"]
        .into_iter()
        .map(|heat| {
            let api = state.inspection_api.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..25 {
                    api.record_calibration("C1", heat, in_range_chemistry())
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    let samples = state.inspection_api.load_samples("C1").unwrap();
    assert_eq!(samples.calibration.len(), 2);
    assert!(samples.calibration.contains_key("H1"));
    assert!(samples.calibration.contains_key("H2"));
}
