// ==========================================
// 检验验证与工作流状态引擎 - 炉号领域模型
// ==========================================
// 职责: 炉号主数据、五科目判定集合、处置结果与台账条目
// ==========================================

use crate::domain::types::{Disposition, Verdict};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Heat - 炉号（原材料可追溯批次）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heat {
    pub heat_number: String,              // 炉号（主键）
    pub manufacturer: Option<String>,     // 钢厂
    pub tc_number: Option<String>,        // 质保书编号
    pub tc_date: Option<NaiveDate>,       // 质保书日期
    pub sub_po_number: Option<String>,    // 子 PO 编号
    pub sub_po_date: Option<NaiveDate>,   // 子 PO 日期
    pub sub_po_qty: Option<f64>,          // 子 PO 数量
    pub invoice_number: Option<String>,   // 发票编号
    pub invoice_date: Option<NaiveDate>,  // 发票日期
    pub offered_weight: f64,              // 报验重量
    pub color_code: Option<String>,       // 人工录入的色标
}

impl Heat {
    /// 仅含炉号与报验重量的最小记录
    pub fn new(heat_number: impl Into<String>, offered_weight: f64) -> Self {
        Self {
            heat_number: heat_number.into(),
            manufacturer: None,
            tc_number: None,
            tc_date: None,
            sub_po_number: None,
            sub_po_date: None,
            sub_po_qty: None,
            invoice_number: None,
            invoice_date: None,
            offered_weight,
            color_code: None,
        }
    }
}

// ==========================================
// HeatVerdicts - 单炉号五科目判定
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatVerdicts {
    pub calibration: Verdict,
    pub visual: Verdict,
    pub dimensional: Verdict,
    pub material_testing: Verdict,
    pub packing: Verdict,
}

impl HeatVerdicts {
    pub fn all_pending() -> Self {
        Self::uniform(Verdict::Pending)
    }

    pub fn uniform(verdict: Verdict) -> Self {
        Self {
            calibration: verdict,
            visual: verdict,
            dimensional: verdict,
            material_testing: verdict,
            packing: verdict,
        }
    }

    pub fn as_array(&self) -> [Verdict; 5] {
        [
            self.calibration,
            self.visual,
            self.dimensional,
            self.material_testing,
            self.packing,
        ]
    }
}

// ==========================================
// HeatDisposition - 处置结论与重量分配
// ==========================================
// 已决时恰有一侧重量等于报验重量；待定时两侧均为 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatDisposition {
    pub disposition: Disposition,
    pub accepted_weight: f64,
    pub rejected_weight: f64,
}

// ==========================================
// HeatLedgerEntry - 炉号台账条目（派生）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatLedgerEntry {
    pub heat_number: String,
    pub offered_weight: f64,
    pub verdicts: HeatVerdicts,
    pub disposition: HeatDisposition,
}
