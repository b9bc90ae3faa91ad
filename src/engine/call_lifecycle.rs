// ==========================================
// 检验验证与工作流状态引擎 - 报验单生命周期状态机
// ==========================================
// 职责: 排期/开始/暂停/恢复/扣留/取消/完成 的守卫转换
// 红线: 必填项缺失在本地拦截，不得发起外部调用
// 红线: 先 plan 后 commit，外部调用失败时状态不变
// 红线: 完成检验须分段全部批准、数据完备且填写完成备注
// ==========================================

use crate::domain::call::InspectionCall;
use crate::domain::types::{CallStatus, ProductType, ReasonCode, Shift};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::heat_disposition::HeatLedger;
use crate::engine::section_gate::SectionApprovalGate;
use crate::engine::stage_reconciler::StageLedger;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 生命周期动作
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleAction {
    /// 排期（已排期时视为改期）
    Schedule { scheduled_date: NaiveDate },
    /// 录入班次并开始检验
    Initiate {
        shift: Option<Shift>,
        chosen_date: Option<NaiveDate>,
        today: NaiveDate,
    },
    /// 暂停，次日继续
    Pause { remarks: Option<String> },
    /// 恢复检验（可重新录入班次）
    Resume {
        shift: Option<Shift>,
        chosen_date: Option<NaiveDate>,
        today: NaiveDate,
    },
    Withhold {
        reason: Option<ReasonCode>,
        remarks: Option<String>,
    },
    Cancel {
        reason: Option<ReasonCode>,
        remarks: Option<String>,
    },
    /// 完成检验
    Finish {
        remarks: Option<String>,
        #[serde(default)]
        readiness: FinishReadiness,
    },
}

impl LifecycleAction {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleAction::Schedule { .. } => "SCHEDULE",
            LifecycleAction::Initiate { .. } => "INITIATE",
            LifecycleAction::Pause { .. } => "PAUSE",
            LifecycleAction::Resume { .. } => "RESUME",
            LifecycleAction::Withhold { .. } => "WITHHOLD",
            LifecycleAction::Cancel { .. } => "CANCEL",
            LifecycleAction::Finish { .. } => "FINISH",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ==========================================
// FinishReadiness - 完成检验前的数据完备性
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishReadiness {
    /// 台账中的炉号数
    pub heats: usize,
    /// 仍为 PENDING 的炉号数
    pub pending_heats: usize,
    /// 已录入投产数的条目数（全部产线/批号）
    pub manufactured_entries: usize,
    /// 逐小时记录行数
    pub hourly_rows: usize,
}

impl FinishReadiness {
    pub fn from_ledgers(heats: &HeatLedger, stages: &StageLedger, hourly_rows: usize) -> Self {
        Self {
            heats: heats.entries.len(),
            pending_heats: heats.totals().pending_heats,
            manufactured_entries: stages.manufactured_entries(),
            hourly_rows,
        }
    }
}

// ==========================================
// LifecycleTransition - 已校验的转换
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleTransition {
    pub call_number: String,
    pub from: CallStatus,
    pub to: CallStatus,
    pub action: LifecycleAction,
    pub shift: Option<Shift>,
    pub inspection_date: Option<NaiveDate>,
    pub scheduled_date: Option<NaiveDate>,
    pub reason: Option<ReasonCode>,
    pub remarks: Option<String>,
}

impl LifecycleTransition {
    fn new(call: &InspectionCall, to: CallStatus, action: &LifecycleAction) -> Self {
        Self {
            call_number: call.call_number.clone(),
            from: call.status,
            to,
            action: action.clone(),
            shift: None,
            inspection_date: None,
            scheduled_date: None,
            reason: None,
            remarks: None,
        }
    }
}

// ==========================================
// CallLifecycleController
// ==========================================
pub struct CallLifecycleController;

impl CallLifecycleController {
    /// 解析检验日期
    ///
    /// # 规则
    /// - A/B/General 班: 自动取今天
    /// - C 班: 必须人工选择今天或昨天
    pub fn resolve_inspection_date(
        shift: Shift,
        chosen_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> EngineResult<NaiveDate> {
        match shift {
            Shift::A | Shift::B | Shift::General => Ok(today),
            Shift::C => {
                let date = chosen_date.ok_or_else(|| {
                    EngineError::InvalidInspectionDate("C 班必须选择检验日期".to_string())
                })?;
                let yesterday = today - Duration::days(1);
                if date == today || date == yesterday {
                    Ok(date)
                } else {
                    Err(EngineError::InvalidInspectionDate(format!(
                        "C 班检验日期只能是 {} 或 {},实际 {}",
                        yesterday, today, date
                    )))
                }
            }
        }
    }

    /// 校验扣留/取消原因
    pub fn validate_reason(
        reason: Option<ReasonCode>,
        remarks: Option<&str>,
    ) -> EngineResult<ReasonCode> {
        let reason = reason.ok_or(EngineError::MissingReason)?;
        let has_remarks = remarks.map_or(false, |r| !r.trim().is_empty());
        if reason.requires_remarks() && !has_remarks {
            return Err(EngineError::MissingRemarks);
        }
        Ok(reason)
    }

    /// 完成检验的数据完备性
    ///
    /// # 规则
    /// - 过程材料: 至少录入一项投产数或一行逐小时记录
    /// - 原材料/成品: 至少一个炉号，且没有仍为 PENDING 的炉号
    pub fn ensure_ready_to_finish(
        product_type: ProductType,
        readiness: &FinishReadiness,
    ) -> EngineResult<()> {
        match product_type {
            ProductType::ProcessMaterial => {
                if readiness.manufactured_entries == 0 && readiness.hourly_rows == 0 {
                    return Err(EngineError::GateNotSatisfied(
                        "过程检验尚未录入投产数或逐小时记录".to_string(),
                    ));
                }
            }
            _ => {
                if readiness.heats == 0 {
                    return Err(EngineError::GateNotSatisfied("报验单没有炉号".to_string()));
                }
                if readiness.pending_heats > 0 {
                    return Err(EngineError::GateNotSatisfied(format!(
                        "{} 个炉号仍待判定",
                        readiness.pending_heats
                    )));
                }
            }
        }
        Ok(())
    }

    /// 校验一次生命周期动作，不修改报验单
    ///
    /// # 参数
    /// - call: 当前报验单
    /// - action: 动作
    /// - gate: 分段审批门（完成检验时校验）
    ///
    /// # 完成检验
    /// 依次校验: 分段门控 → 数据完备性 → 完成备注
    pub fn plan(
        call: &InspectionCall,
        action: &LifecycleAction,
        gate: &SectionApprovalGate,
    ) -> EngineResult<LifecycleTransition> {
        let from = call.status;
        let invalid = |to: CallStatus| EngineError::InvalidTransition { from, to };

        match action {
            LifecycleAction::Schedule { scheduled_date } => {
                if !matches!(from, CallStatus::Pending | CallStatus::Scheduled) {
                    return Err(invalid(CallStatus::Scheduled));
                }
                let mut t = LifecycleTransition::new(call, CallStatus::Scheduled, action);
                t.scheduled_date = Some(*scheduled_date);
                Ok(t)
            }
            LifecycleAction::Initiate {
                shift,
                chosen_date,
                today,
            } => {
                if !matches!(from, CallStatus::Pending | CallStatus::Scheduled) {
                    return Err(invalid(CallStatus::UnderInspection));
                }
                let shift = shift.ok_or(EngineError::MissingShift)?;
                let date = Self::resolve_inspection_date(shift, *chosen_date, *today)?;
                let mut t = LifecycleTransition::new(call, CallStatus::UnderInspection, action);
                t.shift = Some(shift);
                t.inspection_date = Some(date);
                Ok(t)
            }
            LifecycleAction::Pause { remarks } => {
                if from != CallStatus::UnderInspection {
                    return Err(invalid(CallStatus::Paused));
                }
                let mut t = LifecycleTransition::new(call, CallStatus::Paused, action);
                t.remarks = remarks.clone();
                Ok(t)
            }
            LifecycleAction::Resume {
                shift,
                chosen_date,
                today,
            } => {
                if from != CallStatus::Paused {
                    return Err(invalid(CallStatus::UnderInspection));
                }
                let mut t = LifecycleTransition::new(call, CallStatus::UnderInspection, action);
                if let Some(shift) = shift {
                    t.shift = Some(*shift);
                    t.inspection_date =
                        Some(Self::resolve_inspection_date(*shift, *chosen_date, *today)?);
                }
                Ok(t)
            }
            LifecycleAction::Withhold { reason, remarks } => {
                Self::plan_terminal(call, CallStatus::Withheld, action, *reason, remarks.as_deref())
            }
            LifecycleAction::Cancel { reason, remarks } => {
                Self::plan_terminal(call, CallStatus::Cancelled, action, *reason, remarks.as_deref())
            }
            LifecycleAction::Finish { remarks, readiness } => {
                if from != CallStatus::UnderInspection {
                    return Err(invalid(CallStatus::Completed));
                }
                gate.ensure_satisfied()?;
                Self::ensure_ready_to_finish(call.product_type, readiness)?;
                let remarks = remarks
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or(EngineError::MissingRemarks)?;
                let mut t = LifecycleTransition::new(call, CallStatus::Completed, action);
                t.remarks = Some(remarks.to_string());
                Ok(t)
            }
        }
    }

    fn plan_terminal(
        call: &InspectionCall,
        to: CallStatus,
        action: &LifecycleAction,
        reason: Option<ReasonCode>,
        remarks: Option<&str>,
    ) -> EngineResult<LifecycleTransition> {
        if call.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                from: call.status,
                to,
            });
        }
        let reason = Self::validate_reason(reason, remarks)?;
        let mut t = LifecycleTransition::new(call, to, action);
        t.reason = Some(reason);
        t.remarks = remarks
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        Ok(t)
    }

    /// 提交已被外部服务确认的转换
    pub fn commit(call: &mut InspectionCall, transition: &LifecycleTransition) {
        tracing::info!(
            call_number = %call.call_number,
            from = %transition.from,
            to = %transition.to,
            action = %transition.action,
            "报验单状态转换"
        );
        call.status = transition.to;
    }
}
