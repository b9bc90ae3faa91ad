// ==========================================
// 检验验证与工作流状态引擎 - 草稿快照模型
// ==========================================
// 职责: 单报验单全部可变状态的快照与恢复规则
// 红线: 恢复只填充内存中为空的字段，绝不覆盖已有值
// ==========================================

use crate::domain::call::SectionStates;
use crate::domain::types::{ProcessStageKind, Section, SectionStatus, Shift};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// InspectionDraftState - 可变状态
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionDraftState {
    #[serde(default)]
    pub shift: Option<Shift>,
    #[serde(default)]
    pub inspection_date: Option<NaiveDate>,
    #[serde(default)]
    pub sections: SectionStates,
    #[serde(default)]
    pub heat_remarks: BTreeMap<String, String>,
    #[serde(default)]
    pub color_codes: BTreeMap<String, String>,
    /// `产线/批号` → 工序 → 投产数
    #[serde(default)]
    pub manufactured: BTreeMap<String, BTreeMap<ProcessStageKind, u32>>,
    #[serde(default)]
    pub final_remarks: Option<String>,
}

impl InspectionDraftState {
    /// 用草稿填充内存中为空的字段
    ///
    /// # 规则
    /// - Option 字段: 内存为 None 时取草稿值
    /// - 字符串映射: 内存缺失该键或值为空白时取草稿值
    /// - 分段状态: 内存为 UNSET 时取草稿值
    /// - 投产数: 按 产线/批号 + 工序 逐项填充缺失值
    ///
    /// # 返回
    /// - 实际被填充的字段数
    pub fn fill_missing_from(&mut self, draft: &InspectionDraftState) -> usize {
        let mut filled = 0;

        if self.shift.is_none() && draft.shift.is_some() {
            self.shift = draft.shift;
            filled += 1;
        }
        if self.inspection_date.is_none() && draft.inspection_date.is_some() {
            self.inspection_date = draft.inspection_date;
            filled += 1;
        }
        if is_blank(self.final_remarks.as_deref()) && !is_blank(draft.final_remarks.as_deref()) {
            self.final_remarks = draft.final_remarks.clone();
            filled += 1;
        }

        for section in Section::ALL {
            let restored = draft.sections.get(section);
            if self.sections.get(section) == SectionStatus::Unset && restored != SectionStatus::Unset {
                self.sections.set(section, restored);
                filled += 1;
            }
        }

        filled += fill_string_map(&mut self.heat_remarks, &draft.heat_remarks);
        filled += fill_string_map(&mut self.color_codes, &draft.color_codes);

        for (lot_key, by_stage) in &draft.manufactured {
            let target = self.manufactured.entry(lot_key.clone()).or_default();
            for (stage, qty) in by_stage {
                if !target.contains_key(stage) {
                    target.insert(*stage, *qty);
                    filled += 1;
                }
            }
        }
        self.manufactured.retain(|_, by_stage| !by_stage.is_empty());

        filled
    }

    /// 是否含有实质性录入
    pub fn has_substantive_data(&self) -> bool {
        (self.shift.is_some() && self.inspection_date.is_some())
            || self.heat_remarks.values().any(|v| !v.trim().is_empty())
            || self.color_codes.values().any(|v| !v.trim().is_empty())
            || self.manufactured.values().any(|by_stage| !by_stage.is_empty())
            || !is_blank(self.final_remarks.as_deref())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn fill_string_map(target: &mut BTreeMap<String, String>, source: &BTreeMap<String, String>) -> usize {
    let mut filled = 0;
    for (key, value) in source {
        if value.trim().is_empty() {
            continue;
        }
        let current_blank = target.get(key).map_or(true, |v| v.trim().is_empty());
        if current_blank {
            target.insert(key.clone(), value.clone());
            filled += 1;
        }
    }
    filled
}

// ==========================================
// DraftSnapshot - 带时间戳与版本的快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub call_number: String,
    pub saved_at: NaiveDateTime,
    pub version: i64,
    pub state: InspectionDraftState,
}
