// ==========================================
// 检验验证与工作流状态引擎 - 炉号处置汇总
// ==========================================
// 职责: 五科目判定 + 报验重量 → 处置结论与重量台账
// 红线: 幂等、与判定顺序无关；台账每次从科目数据重新计算
// ==========================================

use crate::domain::heat::{Heat, HeatDisposition, HeatLedgerEntry, HeatVerdicts};
use crate::domain::samples::HeatSubmoduleData;
use crate::domain::types::{Disposition, ProductModel, Verdict};
use crate::engine::submodule_validator::SubmoduleValidator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub struct HeatDispositionAggregator;

impl HeatDispositionAggregator {
    /// 汇总判定为处置结论
    ///
    /// # 规则
    /// - 任一 NOT_OK → Rejected
    /// - 全部 OK → Accepted
    /// - 否则 → Pending
    pub fn disposition_of<I>(verdicts: I) -> Disposition
    where
        I: IntoIterator<Item = Verdict>,
    {
        let mut has_not_ok = false;
        let mut all_ok = true;
        for verdict in verdicts {
            match verdict {
                Verdict::NotOk => {
                    has_not_ok = true;
                    all_ok = false;
                }
                Verdict::Pending => all_ok = false,
                Verdict::Ok => {}
            }
        }

        if has_not_ok {
            Disposition::Rejected
        } else if all_ok {
            Disposition::Accepted
        } else {
            Disposition::Pending
        }
    }

    /// 处置结论 + 重量分配
    ///
    /// # 规则
    /// - Accepted: 合格重量 = 报验重量，拒收重量 = 0
    /// - Rejected: 合格重量 = 0，拒收重量 = 报验重量
    /// - Pending: 两者均为 0
    pub fn aggregate(verdicts: &HeatVerdicts, offered_weight: f64) -> HeatDisposition {
        let disposition = Self::disposition_of(verdicts.as_array());
        let (accepted_weight, rejected_weight) = match disposition {
            Disposition::Accepted => (offered_weight, 0.0),
            Disposition::Rejected => (0.0, offered_weight),
            Disposition::Pending => (0.0, 0.0),
        };
        HeatDisposition {
            disposition,
            accepted_weight,
            rejected_weight,
        }
    }

    /// 为整张报验单构建炉号台账
    ///
    /// # 参数
    /// - heats: 炉号主数据
    /// - data: 炉号 → 科目原始数据（缺失按全空处理）
    /// - validator: 科目验证器
    /// - model: 产品型号
    pub fn build_ledger(
        heats: &[Heat],
        data: &BTreeMap<String, HeatSubmoduleData>,
        validator: &SubmoduleValidator,
        model: ProductModel,
    ) -> HeatLedger {
        let empty = HeatSubmoduleData::default();
        let entries = heats
            .iter()
            .map(|heat| {
                let heat_data = data.get(&heat.heat_number).unwrap_or(&empty);
                let verdicts = validator.evaluate_heat(heat_data, model);
                let disposition = Self::aggregate(&verdicts, heat.offered_weight);
                (
                    heat.heat_number.clone(),
                    HeatLedgerEntry {
                        heat_number: heat.heat_number.clone(),
                        offered_weight: heat.offered_weight,
                        verdicts,
                        disposition,
                    },
                )
            })
            .collect();
        HeatLedger { entries }
    }
}

// ==========================================
// HeatLedger - 炉号 → 台账条目
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatLedger {
    pub entries: BTreeMap<String, HeatLedgerEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub offered_weight: f64,
    pub accepted_weight: f64,
    pub rejected_weight: f64,
    pub pending_heats: usize,
}

impl HeatLedger {
    pub fn get(&self, heat_number: &str) -> Option<&HeatLedgerEntry> {
        self.entries.get(heat_number)
    }

    pub fn totals(&self) -> LedgerTotals {
        self.entries.values().fold(
            LedgerTotals {
                offered_weight: 0.0,
                accepted_weight: 0.0,
                rejected_weight: 0.0,
                pending_heats: 0,
            },
            |mut acc, entry| {
                acc.offered_weight += entry.offered_weight;
                acc.accepted_weight += entry.disposition.accepted_weight;
                acc.rejected_weight += entry.disposition.rejected_weight;
                if entry.disposition.disposition == Disposition::Pending {
                    acc.pending_heats += 1;
                }
                acc
            },
        )
    }

    /// 所有炉号均已决
    pub fn is_fully_decided(&self) -> bool {
        self.entries
            .values()
            .all(|e| e.disposition.disposition != Disposition::Pending)
    }
}
