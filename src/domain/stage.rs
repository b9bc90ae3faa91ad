// ==========================================
// 检验验证与工作流状态引擎 - 过程工序数量模型
// ==========================================
// 职责: 工序逐小时记录、工序数量（投产/拒收/合格）
// 红线: accepted 只能派生，不单独录入
// ==========================================

use crate::domain::types::ProcessStageKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// HourlyStageEntry - 工序逐小时记录
// ==========================================
/// 单行逐小时记录
///
/// - `rejected_qty`: 剪切/车削/磁粉探伤等工序的按样本拒收数
/// - `rejections`: 锻造/淬火/终检等工序的按字段拒收数（字段名 → 数量）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyStageEntry {
    #[serde(default)]
    pub hour_label: Option<String>,
    #[serde(default)]
    pub lot_no: Option<String>,
    #[serde(default)]
    pub rejected_qty: Vec<u32>,
    #[serde(default)]
    pub rejections: BTreeMap<String, u32>,
}

impl HourlyStageEntry {
    pub fn for_lot(lot_no: impl Into<String>) -> Self {
        Self {
            lot_no: Some(lot_no.into()),
            ..Default::default()
        }
    }

    pub fn with_rejected(mut self, qty: u32) -> Self {
        self.rejected_qty.push(qty);
        self
    }

    pub fn with_field(mut self, field: &str, qty: u32) -> Self {
        self.rejections.insert(field.to_string(), qty);
        self
    }

    /// 指定字段的拒收数，缺失按 0
    pub fn field(&self, field: &str) -> u32 {
        self.rejections.get(field).copied().unwrap_or(0)
    }
}

// ==========================================
// 投产数键 - 产线 + 批号
// ==========================================
/// 未指定产线时使用的产线名
pub const DEFAULT_LINE: &str = "DEFAULT";

/// 未选批号（全部批号）时的批号占位
pub const ALL_LOTS: &str = "*";

/// 投产数按 `产线/批号` 分别记录
pub fn production_lot_key(line: &str, lot: Option<&str>) -> String {
    format!("{}/{}", line, lot.unwrap_or(ALL_LOTS))
}

// ==========================================
// StageQuantity - 工序数量
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageQuantity {
    pub stage: ProcessStageKind,
    pub manufactured: Option<u32>, // 用户录入
    pub rejected: u32,             // 逐小时汇总
}

impl StageQuantity {
    pub fn new(stage: ProcessStageKind) -> Self {
        Self {
            stage,
            manufactured: None,
            rejected: 0,
        }
    }

    /// 合格数 = 投产数 − 拒收数 （未录入投产数时为 None）
    pub fn accepted(&self) -> Option<u32> {
        self.manufactured
            .map(|manufactured| manufactured.saturating_sub(self.rejected))
    }
}
