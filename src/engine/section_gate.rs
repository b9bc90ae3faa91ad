// ==========================================
// 检验验证与工作流状态引擎 - 分段审批门
// ==========================================
// 职责: A → B → C 顺序审批的进入/可见/结论规则
// 红线: 先校验（plan），外部调用成功后再提交（apply）；失败时状态不变
// ==========================================

use crate::domain::call::{InspectionCall, SectionStates};
use crate::domain::types::{ProductType, Section, SectionOutcome, SectionStatus};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// 分段审批事件（发送给外部工作流服务）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTransition {
    pub call_number: String,
    pub section: Section,
    pub outcome: SectionOutcome,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionApprovalGate {
    product_type: ProductType,
    section_c_flag: bool,
    states: SectionStates,
}

impl SectionApprovalGate {
    pub fn new(product_type: ProductType, section_c_flag: bool, states: SectionStates) -> Self {
        Self {
            product_type,
            section_c_flag,
            states,
        }
    }

    pub fn from_call(call: &InspectionCall) -> Self {
        Self::new(call.product_type, call.requires_section_c, call.sections)
    }

    pub fn states(&self) -> SectionStates {
        self.states
    }

    /// C 段是否必需
    ///
    /// # 规则
    /// - 原材料: 始终需要
    /// - 过程材料: 仅在标记时需要
    /// - 成品: 从不需要
    pub fn requires_section_c(&self) -> bool {
        match self.product_type {
            ProductType::RawMaterial => true,
            ProductType::ProcessMaterial => self.section_c_flag,
            ProductType::FinalProduct => false,
        }
    }

    pub fn required_sections(&self) -> Vec<Section> {
        Section::ALL
            .iter()
            .copied()
            .filter(|s| *s != Section::C || self.requires_section_c())
            .collect()
    }

    /// 检查分段能否进入
    pub fn check_enter(&self, section: Section) -> EngineResult<()> {
        if section == Section::C && !self.requires_section_c() {
            return Err(EngineError::SectionLocked {
                section,
                reason: format!("{} 不需要 C 段", self.product_type),
            });
        }
        if let Some(previous) = section.previous() {
            let prev_status = self.states.get(previous);
            if prev_status != SectionStatus::Approved {
                return Err(EngineError::SectionLocked {
                    section,
                    reason: format!("{} 段状态为 {}", previous, prev_status),
                });
            }
        }
        Ok(())
    }

    pub fn can_enter(&self, section: Section) -> bool {
        self.check_enter(section).is_ok()
    }

    /// 当前可见（可进入）的分段
    pub fn visible_sections(&self) -> Vec<Section> {
        Section::ALL
            .iter()
            .copied()
            .filter(|s| self.can_enter(*s))
            .collect()
    }

    /// 校验一次审批/拒绝，不修改状态
    pub fn plan(
        &self,
        call_number: &str,
        section: Section,
        outcome: SectionOutcome,
        remarks: Option<String>,
    ) -> EngineResult<SectionTransition> {
        self.check_enter(section)?;
        if self.states.get(section) != SectionStatus::Unset {
            return Err(EngineError::SectionAlreadyDecided { section });
        }
        Ok(SectionTransition {
            call_number: call_number.to_string(),
            section,
            outcome,
            remarks: remarks.filter(|r| !r.trim().is_empty()),
        })
    }

    /// 提交已被外部服务确认的转换
    ///
    /// 拒绝时后续分段全部重置为 UNSET
    pub fn apply(&mut self, transition: &SectionTransition) {
        self.states
            .set(transition.section, SectionStatus::from(transition.outcome));
        if transition.outcome == SectionOutcome::Rejected {
            for later in transition.section.subsequent() {
                self.states.set(*later, SectionStatus::Unset);
            }
        }
        tracing::info!(
            call_number = %transition.call_number,
            section = %transition.section,
            outcome = %transition.outcome,
            "分段审批已提交"
        );
    }

    /// 上游重新提交（重新拉取数据）后全部重置
    pub fn reset_for_resubmission(&mut self) {
        self.states = SectionStates::default();
    }

    /// 所有必需分段均已批准
    pub fn is_satisfied(&self) -> bool {
        self.required_sections()
            .iter()
            .all(|s| self.states.get(*s) == SectionStatus::Approved)
    }

    pub fn ensure_satisfied(&self) -> EngineResult<()> {
        let outstanding: Vec<String> = self
            .required_sections()
            .iter()
            .filter(|s| self.states.get(**s) != SectionStatus::Approved)
            .map(|s| format!("{}={}", s, self.states.get(*s)))
            .collect();
        if outstanding.is_empty() {
            Ok(())
        } else {
            Err(EngineError::GateNotSatisfied(outstanding.join(", ")))
        }
    }
}
