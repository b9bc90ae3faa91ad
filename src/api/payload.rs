// ==========================================
// 检验验证与工作流状态引擎 - 完成检验提交载荷
// ==========================================
// 职责: 汇总预检信息、逐炉号最终结果、原始科目样本、工序数量为一次提交
// 红线: 只做组装，不做判定；判定结果来自 HeatLedger
// ==========================================

use crate::domain::call::InspectionCall;
use crate::domain::draft::InspectionDraftState;
use crate::domain::heat::{Heat, HeatVerdicts};
use crate::domain::samples::CallSampleSet;
use crate::domain::stage::StageQuantity;
use crate::domain::types::{Disposition, ProcessStageKind, ProductModel, ProductType, Shift};
use crate::engine::heat_disposition::HeatLedger;
use crate::engine::stage_reconciler::StageLedger;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 预检汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreInspectionSummary {
    pub shift: Option<Shift>,
    pub inspection_date: Option<NaiveDate>,
    pub offered_qty: f64,
    pub heat_count: usize,
    pub total_offered_weight: f64,
    pub total_accepted_weight: f64,
    pub total_rejected_weight: f64,
    pub pending_heats: usize,
}

/// 单炉号最终结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatFinalResult {
    pub heat_number: String,
    pub color_code: Option<String>,
    pub remarks: Option<String>,
    pub verdicts: HeatVerdicts,
    pub disposition: Disposition,
    pub offered_weight: f64,
    pub accepted_weight: f64,
    pub rejected_weight: f64,
}

/// 工序数量汇总（仅过程材料）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStageSummary {
    pub stages: Vec<StageQuantity>,
    pub total_rejected: u32,
    pub process_accepted: Option<u32>,
    /// `产线/批号` → 工序 → 投产数
    pub manufactured_by_lot: BTreeMap<String, BTreeMap<ProcessStageKind, u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishInspectionPayload {
    pub call_number: String,
    pub po_number: String,
    pub product_type: ProductType,
    pub product_model: ProductModel,
    pub summary: PreInspectionSummary,
    pub heats: Vec<HeatFinalResult>,
    pub samples: CallSampleSet,
    pub process: Option<ProcessStageSummary>,
    pub final_remarks: Option<String>,
    pub submitted_at: NaiveDateTime,
}

impl FinishInspectionPayload {
    /// 组装完成检验载荷
    ///
    /// # 规则
    /// - 炉号顺序沿用上游返回顺序
    /// - 色标/备注优先取草稿，色标缺失时回退到炉号主数据
    /// - 工序汇总仅在提供 StageLedger 时输出
    pub fn build(
        call: &InspectionCall,
        heats: &[Heat],
        draft: &InspectionDraftState,
        ledger: &HeatLedger,
        samples: &CallSampleSet,
        stages: Option<&StageLedger>,
        submitted_at: NaiveDateTime,
    ) -> Self {
        let totals = ledger.totals();

        let heat_results = heats
            .iter()
            .filter_map(|heat| {
                let entry = ledger.get(&heat.heat_number)?;
                let color_code = draft
                    .color_codes
                    .get(&heat.heat_number)
                    .cloned()
                    .or_else(|| heat.color_code.clone());
                Some(HeatFinalResult {
                    heat_number: heat.heat_number.clone(),
                    color_code,
                    remarks: draft.heat_remarks.get(&heat.heat_number).cloned(),
                    verdicts: entry.verdicts,
                    disposition: entry.disposition.disposition,
                    offered_weight: entry.offered_weight,
                    accepted_weight: entry.disposition.accepted_weight,
                    rejected_weight: entry.disposition.rejected_weight,
                })
            })
            .collect();

        let process = stages.map(|ledger| ProcessStageSummary {
            stages: ledger.ordered(),
            total_rejected: ledger.total_rejected(),
            process_accepted: ledger.process_accepted(),
            manufactured_by_lot: ledger.manufactured_map(),
        });

        Self {
            call_number: call.call_number.clone(),
            po_number: call.po_number.clone(),
            product_type: call.product_type,
            product_model: call.product_model,
            summary: PreInspectionSummary {
                shift: draft.shift,
                inspection_date: draft.inspection_date,
                offered_qty: call.offered_qty,
                heat_count: heats.len(),
                total_offered_weight: totals.offered_weight,
                total_accepted_weight: totals.accepted_weight,
                total_rejected_weight: totals.rejected_weight,
                pending_heats: totals.pending_heats,
            },
            heats: heat_results,
            samples: samples.clone(),
            process,
            final_remarks: draft.final_remarks.clone(),
            submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::heat::{HeatDisposition, HeatLedgerEntry};
    use crate::domain::types::Verdict;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn ledger_with(heat: &str, weight: f64, verdict: Verdict, disposition: Disposition) -> HeatLedger {
        let (accepted, rejected) = match disposition {
            Disposition::Accepted => (weight, 0.0),
            Disposition::Rejected => (0.0, weight),
            Disposition::Pending => (0.0, 0.0),
        };
        let mut entries = BTreeMap::new();
        entries.insert(
            heat.to_string(),
            HeatLedgerEntry {
                heat_number: heat.to_string(),
                offered_weight: weight,
                verdicts: HeatVerdicts::uniform(verdict),
                disposition: HeatDisposition {
                    disposition,
                    accepted_weight: accepted,
                    rejected_weight: rejected,
                },
            },
        );
        HeatLedger { entries }
    }

    fn submitted_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_build_prefers_draft_color_code() {
        let call = InspectionCall::new("C1", "PO1", ProductType::RawMaterial, 10.0);
        let mut heat = Heat::new("H1", 10.0);
        heat.color_code = Some("BLUE".to_string());
        let mut draft = InspectionDraftState::default();
        draft.color_codes.insert("H1".to_string(), "RED".to_string());
        draft.heat_remarks.insert("H1".to_string(), "ok".to_string());

        let ledger = ledger_with("H1", 10.0, Verdict::Ok, Disposition::Accepted);
        let payload = FinishInspectionPayload::build(
            &call,
            &[heat],
            &draft,
            &ledger,
            &CallSampleSet::default(),
            None,
            submitted_at(),
        );

        assert_eq!(payload.heats.len(), 1);
        assert_eq!(payload.heats[0].color_code.as_deref(), Some("RED"));
        assert_eq!(payload.heats[0].remarks.as_deref(), Some("ok"));
        assert_eq!(payload.summary.total_accepted_weight, 10.0);
        assert!(payload.process.is_none());
    }

    #[test]
    fn test_build_includes_process_summary() {
        let call = InspectionCall::new("C2", "PO1", ProductType::ProcessMaterial, 100.0);
        let heat = Heat::new("H1", 5.0);
        let ledger = ledger_with("H1", 5.0, Verdict::Pending, Disposition::Pending);
        let mut stages = StageLedger::default();
        stages.set_manufactured(ProcessStageKind::Shearing, 100).unwrap();

        let payload = FinishInspectionPayload::build(
            &call,
            &[heat],
            &InspectionDraftState::default(),
            &ledger,
            &CallSampleSet::default(),
            Some(&stages),
            submitted_at(),
        );

        let process = payload.process.unwrap();
        assert_eq!(process.stages.len(), 7);
        assert_eq!(process.process_accepted, Some(100));
        assert_eq!(process.manufactured_by_lot["DEFAULT/*"][&ProcessStageKind::Shearing], 100);
        assert_eq!(payload.summary.pending_heats, 1);
    }
}
