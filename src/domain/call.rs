// ==========================================
// 检验验证与工作流状态引擎 - 报验单领域模型
// ==========================================
// 职责: 报验单主数据、分段审批状态、检验证书编号
// 红线: status 仅由生命周期控制器修改；sections 仅由分段审批门修改
// ==========================================

use crate::domain::types::{CallStatus, ProductModel, ProductType, Section, SectionStatus};
use serde::{Deserialize, Serialize};

// ==========================================
// SectionStates - A/B/C 分段状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionStates {
    pub section_a: SectionStatus,
    pub section_b: SectionStatus,
    pub section_c: SectionStatus,
}

impl SectionStates {
    pub fn get(&self, section: Section) -> SectionStatus {
        match section {
            Section::A => self.section_a,
            Section::B => self.section_b,
            Section::C => self.section_c,
        }
    }

    pub fn set(&mut self, section: Section, status: SectionStatus) {
        match section {
            Section::A => self.section_a = status,
            Section::B => self.section_b = status,
            Section::C => self.section_c = status,
        }
    }
}

// ==========================================
// InspectionCall - 报验单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionCall {
    pub call_number: String,          // 报验单号（主键）
    pub po_number: String,            // 采购订单号
    pub product_type: ProductType,    // 产品类型
    pub stage: Option<String>,        // 上游阶段描述
    pub status: CallStatus,           // 生命周期状态
    pub sections: SectionStates,      // 分段审批状态
    pub offered_qty: f64,             // 报验数量
    pub requires_section_c: bool,     // 过程材料是否需要 C 段
    pub product_model: ProductModel,  // 产品型号（决定尺寸窗口）
}

impl InspectionCall {
    pub fn new(
        call_number: impl Into<String>,
        po_number: impl Into<String>,
        product_type: ProductType,
        offered_qty: f64,
    ) -> Self {
        Self {
            call_number: call_number.into(),
            po_number: po_number.into(),
            product_type,
            stage: None,
            status: CallStatus::Pending,
            sections: SectionStates::default(),
            offered_qty,
            requires_section_c: false,
            product_model: ProductModel::default(),
        }
    }
}

// ==========================================
// 检验证书编号
// ==========================================

/// 生成检验证书（IC）编号: `{RIO 首字母}/{报验单号}/{检验工程师简称}`
///
/// # 参数
/// - rio: 区域检验办公室名称
/// - call_number: 报验单号
/// - ie_short_name: 检验工程师简称
///
/// # 返回
/// - RIO 为空时返回 None
pub fn generate_ic_number(rio: &str, call_number: &str, ie_short_name: &str) -> Option<String> {
    let initial = rio.trim().chars().next()?.to_uppercase().collect::<String>();
    Some(format!("{}/{}/{}", initial, call_number.trim(), ie_short_name.trim()))
}
