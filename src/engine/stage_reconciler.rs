// ==========================================
// 检验验证与工作流状态引擎 - 工序数量核对
// ==========================================
// 职责: 逐小时拒收汇总、投产数录入校验、跨工序一致性检查
// 红线: 投产数 < 已知拒收数 → 拒绝并清空；跨工序检查仅告警，不阻断
// 红线: 数量汇总饱和累加，录入异常大值不得 panic
// ==========================================

use crate::domain::stage::{production_lot_key, HourlyStageEntry, StageQuantity, DEFAULT_LINE};
use crate::domain::types::ProcessStageKind;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// 各工序拒收字段
// ==========================================
pub mod rejection_fields {
    pub const FORGING: [&str; 5] = [
        "forgingTemperatureRejected",
        "forgingStabilisationRejected",
        "improperForgingRejected",
        "forgingDefectRejected",
        "embossingDefectRejected",
    ];

    pub const QUENCHING: [&str; 4] = [
        "quenchingHardnessRejected",
        "boxGaugeRejected",
        "flatBearingAreaRejected",
        "fallingGaugeRejected",
    ];

    pub const FINAL_CHECK_VISUAL: [&str; 3] = [
        "surfaceDefectRejected",
        "embossingDefectRejected",
        "markingRejected",
    ];

    pub const FINAL_CHECK_DIMENSIONAL: [&str; 3] = [
        "boxGaugeRejected",
        "flatBearingAreaRejected",
        "fallingGaugeRejected",
    ];

    pub const FINAL_CHECK_HARDNESS: [&str; 1] = ["temperingHardnessRejected"];
}

/// 终检三类拒收
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalCheckRejections {
    pub visual: u32,
    pub dimensional: u32,
    pub hardness: u32,
}

impl FinalCheckRejections {
    pub fn total(&self) -> u32 {
        self.visual
            .saturating_add(self.dimensional)
            .saturating_add(self.hardness)
    }
}

// ==========================================
// StageQuantityReconciler - 纯函数
// ==========================================
pub struct StageQuantityReconciler;

impl StageQuantityReconciler {
    /// 按批号过滤逐小时记录；未选批号时返回全部
    fn rows_for_lot<'a>(
        entries: &'a [HourlyStageEntry],
        lot: Option<&'a str>,
    ) -> impl Iterator<Item = &'a HourlyStageEntry> + 'a {
        entries.iter().filter(move |entry| match lot {
            Some(lot) => entry.lot_no.as_deref() == Some(lot),
            None => true,
        })
    }

    fn sum_fields(entries: &[HourlyStageEntry], lot: Option<&str>, fields: &[&str]) -> u32 {
        Self::rows_for_lot(entries, lot)
            .flat_map(move |entry| fields.iter().map(move |f| entry.field(f)))
            .fold(0, u32::saturating_add)
    }

    fn sum_rejected_qty(entries: &[HourlyStageEntry], lot: Option<&str>) -> u32 {
        Self::rows_for_lot(entries, lot)
            .flat_map(|entry| entry.rejected_qty.iter().copied())
            .fold(0, u32::saturating_add)
    }

    /// 终检拒收: 外观（表面/压印/标记）、尺寸（箱规/平面支承/落规）、硬度（回火硬度）
    pub fn final_check_rejections(
        entries: &[HourlyStageEntry],
        lot: Option<&str>,
    ) -> FinalCheckRejections {
        FinalCheckRejections {
            visual: Self::sum_fields(entries, lot, &rejection_fields::FINAL_CHECK_VISUAL),
            dimensional: Self::sum_fields(entries, lot, &rejection_fields::FINAL_CHECK_DIMENSIONAL),
            hardness: Self::sum_fields(entries, lot, &rejection_fields::FINAL_CHECK_HARDNESS),
        }
    }

    /// 计算工序拒收总数
    ///
    /// # 规则
    /// - 锻造: 5 个拒收字段之和
    /// - 淬火: 4 个拒收字段之和
    /// - 回火: 终检 外观 + 尺寸 + 硬度 拒收之和（取终检记录）
    /// - 其他工序: 各行 rejected_qty 之和
    ///
    /// # 参数
    /// - hourly: 工序 → 逐小时记录
    /// - lot: 已选批号（None 表示全部）
    pub fn rejected_for_stage(
        stage: ProcessStageKind,
        hourly: &BTreeMap<ProcessStageKind, Vec<HourlyStageEntry>>,
        lot: Option<&str>,
    ) -> u32 {
        let rows = |kind: ProcessStageKind| hourly.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        match stage {
            ProcessStageKind::Forging => {
                Self::sum_fields(rows(stage), lot, &rejection_fields::FORGING)
            }
            ProcessStageKind::Quenching => {
                Self::sum_fields(rows(stage), lot, &rejection_fields::QUENCHING)
            }
            ProcessStageKind::Tempering => {
                Self::final_check_rejections(rows(ProcessStageKind::FinalCheck), lot).total()
            }
            _ => Self::sum_rejected_qty(rows(stage), lot),
        }
    }

    /// 校验投产数录入
    ///
    /// # 返回
    /// - Ok(accepted): 合格数
    /// - Err(ManufacturedBelowRejected): 投产数小于已知拒收数
    pub fn check_manufactured(
        stage: ProcessStageKind,
        manufactured: u32,
        rejected: u32,
    ) -> EngineResult<u32> {
        if manufactured < rejected {
            return Err(EngineError::ManufacturedBelowRejected {
                stage,
                manufactured,
                rejected,
            });
        }
        Ok(manufactured - rejected)
    }
}

// ==========================================
// 跨工序告警
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossStageWarning {
    /// 过程合格数超过原材料合格数
    ExceedsRawMaterialAccepted { process_accepted: f64, raw_material_accepted: f64 },
    /// 过程合格数超过 PO 订货数
    ExceedsPoQuantity { process_accepted: f64, po_ordered_qty: f64 },
    /// 下游工序投产数超过上游工序合格数
    ExceedsPreviousStage {
        stage: ProcessStageKind,
        manufactured: u32,
        previous: ProcessStageKind,
        previous_accepted: u32,
    },
    /// 拒收数在投产数录入后增加，导致投产数不足
    RejectedExceedsManufactured { stage: ProcessStageKind, manufactured: u32, rejected: u32 },
}

impl fmt::Display for CrossStageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossStageWarning::ExceedsRawMaterialAccepted {
                process_accepted,
                raw_material_accepted,
            } => write!(
                f,
                "过程合格数 {} 超过原材料合格数 {}",
                process_accepted, raw_material_accepted
            ),
            CrossStageWarning::ExceedsPoQuantity {
                process_accepted,
                po_ordered_qty,
            } => write!(f, "过程合格数 {} 超过 PO 订货数 {}", process_accepted, po_ordered_qty),
            CrossStageWarning::ExceedsPreviousStage {
                stage,
                manufactured,
                previous,
                previous_accepted,
            } => write!(
                f,
                "{} 投产数 {} 超过 {} 合格数 {}",
                stage, manufactured, previous, previous_accepted
            ),
            CrossStageWarning::RejectedExceedsManufactured {
                stage,
                manufactured,
                rejected,
            } => write!(f, "{} 拒收数 {} 超过投产数 {}", stage, rejected, manufactured),
        }
    }
}

// ==========================================
// StageLedger - 单报验单工序台账
// ==========================================
/// 拒收数随当前批号视图刷新；投产数按 `产线/批号` 分别保存，
/// 切换批号不会把其他批号的投产数带入当前视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLedger {
    active_key: String,
    rejected: BTreeMap<ProcessStageKind, u32>,
    manufactured: BTreeMap<String, BTreeMap<ProcessStageKind, u32>>,
}

impl Default for StageLedger {
    fn default() -> Self {
        Self {
            active_key: production_lot_key(DEFAULT_LINE, None),
            rejected: BTreeMap::new(),
            manufactured: BTreeMap::new(),
        }
    }
}

impl StageLedger {
    /// 当前视图的 `产线/批号` 键
    pub fn active_key(&self) -> &str {
        &self.active_key
    }

    /// 切换产线/批号视图（拒收数需随后调用 refresh_rejections 刷新）
    pub fn select(&mut self, line: &str, lot: Option<&str>) {
        self.active_key = production_lot_key(line, lot);
        tracing::debug!(key = %self.active_key, "工序台账切换批号视图");
    }

    pub fn get(&self, stage: ProcessStageKind) -> StageQuantity {
        StageQuantity {
            stage,
            manufactured: self
                .manufactured
                .get(&self.active_key)
                .and_then(|by_stage| by_stage.get(&stage))
                .copied(),
            rejected: self.rejected.get(&stage).copied().unwrap_or(0),
        }
    }

    /// 按工序顺序返回全部数量
    pub fn ordered(&self) -> Vec<StageQuantity> {
        ProcessStageKind::ORDER.iter().map(|kind| self.get(*kind)).collect()
    }

    /// 从逐小时记录刷新所有工序拒收数
    pub fn refresh_rejections(
        &mut self,
        hourly: &BTreeMap<ProcessStageKind, Vec<HourlyStageEntry>>,
        lot: Option<&str>,
    ) {
        for kind in ProcessStageKind::ORDER {
            let rejected = StageQuantityReconciler::rejected_for_stage(kind, hourly, lot);
            self.rejected.insert(kind, rejected);
        }
    }

    /// 录入当前视图的投产数
    ///
    /// # 规则
    /// - 投产数 ≥ 已知拒收数 → 保存并返回合格数
    /// - 否则 → 清空该工序投产数并返回错误
    pub fn set_manufactured(&mut self, stage: ProcessStageKind, manufactured: u32) -> EngineResult<u32> {
        let rejected = self.get(stage).rejected;
        match StageQuantityReconciler::check_manufactured(stage, manufactured, rejected) {
            Ok(accepted) => {
                self.manufactured
                    .entry(self.active_key.clone())
                    .or_default()
                    .insert(stage, manufactured);
                Ok(accepted)
            }
            Err(err) => {
                self.clear_manufactured(stage);
                tracing::warn!(
                    %stage,
                    manufactured,
                    rejected,
                    key = %self.active_key,
                    "投产数小于拒收数,已清空"
                );
                Err(err)
            }
        }
    }

    pub fn clear_manufactured(&mut self, stage: ProcessStageKind) {
        if let Some(by_stage) = self.manufactured.get_mut(&self.active_key) {
            by_stage.remove(&stage);
            if by_stage.is_empty() {
                self.manufactured.remove(&self.active_key);
            }
        }
    }

    /// 全部产线/批号已录入的投产数（用于草稿）
    pub fn manufactured_map(&self) -> BTreeMap<String, BTreeMap<ProcessStageKind, u32>> {
        self.manufactured.clone()
    }

    /// 已录入投产数的 （产线/批号，工序） 条目数
    pub fn manufactured_entries(&self) -> usize {
        self.manufactured.values().map(BTreeMap::len).sum()
    }

    /// 从草稿恢复投产数（不做拒收校验，校验在告警中体现）
    pub fn restore_manufactured(
        &mut self,
        manufactured: &BTreeMap<String, BTreeMap<ProcessStageKind, u32>>,
    ) {
        for (key, by_stage) in manufactured {
            let target = self.manufactured.entry(key.clone()).or_default();
            for (kind, value) in by_stage {
                target.insert(*kind, *value);
            }
        }
    }

    pub fn total_rejected(&self) -> u32 {
        self.rejected.values().copied().fold(0, u32::saturating_add)
    }

    /// 过程合格数 = 剪切投产数 − 全部工序拒收之和（当前视图）
    pub fn process_accepted(&self) -> Option<u32> {
        self.get(ProcessStageKind::Shearing)
            .manufactured
            .map(|lot_qty| lot_qty.saturating_sub(self.total_rejected()))
    }

    /// 跨工序一致性检查（仅告警）
    ///
    /// # 规则
    /// - 原材料合格数 ≥ 过程合格数
    /// - 过程合格数 ≤ PO 订货数
    /// - 各工序投产数 ≤ 上一已录入工序合格数
    /// - 各工序拒收数 ≤ 投产数
    pub fn cross_stage_warnings(
        &self,
        raw_material_accepted: Option<f64>,
        po_ordered_qty: Option<f64>,
    ) -> Vec<CrossStageWarning> {
        let mut warnings = Vec::new();

        let mut previous: Option<StageQuantity> = None;
        for current in self.ordered() {
            if let Some(manufactured) = current.manufactured {
                if current.rejected > manufactured {
                    warnings.push(CrossStageWarning::RejectedExceedsManufactured {
                        stage: current.stage,
                        manufactured,
                        rejected: current.rejected,
                    });
                }
                if let Some(prev) = previous {
                    if let Some(prev_accepted) = prev.accepted() {
                        if manufactured > prev_accepted {
                            warnings.push(CrossStageWarning::ExceedsPreviousStage {
                                stage: current.stage,
                                manufactured,
                                previous: prev.stage,
                                previous_accepted: prev_accepted,
                            });
                        }
                    }
                }
                previous = Some(current);
            }
        }

        if let Some(process_accepted) = self.process_accepted() {
            let process_accepted = f64::from(process_accepted);
            if let Some(rm) = raw_material_accepted {
                if process_accepted > rm {
                    warnings.push(CrossStageWarning::ExceedsRawMaterialAccepted {
                        process_accepted,
                        raw_material_accepted: rm,
                    });
                }
            }
            if let Some(po) = po_ordered_qty {
                if process_accepted > po {
                    warnings.push(CrossStageWarning::ExceedsPoQuantity {
                        process_accepted,
                        po_ordered_qty: po,
                    });
                }
            }
        }

        for warning in &warnings {
            tracing::warn!(warning = %warning, "跨工序一致性告警");
        }
        warnings
    }
}
