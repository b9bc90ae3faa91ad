// ==========================================
// 检验验证与工作流状态引擎 - 领域类型定义
// ==========================================
// 职责: 判定结果、处置结论、产品/阶段分类、状态枚举
// 红线: 判定结果只能派生，不作为事实存储
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 判定结果 (Verdict)
// ==========================================
// 每个检验科目对单个炉号的判定，始终由原始样本数据重新计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Ok,      // 合格
    NotOk,   // 不合格
    Pending, // 尚未录入数据
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::NotOk => write!(f, "NOT_OK"),
            Verdict::Pending => write!(f, "PENDING"),
        }
    }
}

// ==========================================
// 处置结论 (Disposition)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    Accepted, // 接收
    Rejected, // 拒收
    Pending,  // 待定
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Accepted => write!(f, "ACCEPTED"),
            Disposition::Rejected => write!(f, "REJECTED"),
            Disposition::Pending => write!(f, "PENDING"),
        }
    }
}

// ==========================================
// 产品类型 (Product Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    RawMaterial,     // 原材料
    ProcessMaterial, // 过程材料
    FinalProduct,    // 成品
}

impl ProductType {
    /// 从上游字符串解析产品类型（兼容 "Raw Material" / "RAW_MATERIAL" / "RM"）
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "RAW_MATERIAL" | "RM" => Some(ProductType::RawMaterial),
            "PROCESS_MATERIAL" | "PROCESS" => Some(ProductType::ProcessMaterial),
            "FINAL_PRODUCT" | "FINAL" => Some(ProductType::FinalProduct),
            _ => None,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductType::RawMaterial => write!(f, "RAW_MATERIAL"),
            ProductType::ProcessMaterial => write!(f, "PROCESS_MATERIAL"),
            ProductType::FinalProduct => write!(f, "FINAL_PRODUCT"),
        }
    }
}

// ==========================================
// 产品型号 (Product Model)
// ==========================================
// 尺寸公差窗口按型号区分，无法识别时按 MK-III 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductModel {
    #[serde(rename = "MK-III")]
    MkIII,
    #[serde(rename = "MK-V")]
    MkV,
}

impl ProductModel {
    /// 从产品描述中识别型号
    ///
    /// # 规则
    /// - 含 "MK-III" / "MK III" / "MKIII" → MkIII
    /// - 含 "MK-V" / "MK V" / "MKV"（且不是 III）→ MkV
    /// - 其他 → None
    pub fn detect(description: &str) -> Option<Self> {
        let compact: String = description
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if compact.contains("MKIII") {
            Some(ProductModel::MkIII)
        } else if compact.contains("MKV") {
            Some(ProductModel::MkV)
        } else {
            None
        }
    }

    /// 识别型号，失败时回退到 MK-III
    pub fn detect_or_default(description: &str) -> Self {
        Self::detect(description).unwrap_or_default()
    }
}

impl Default for ProductModel {
    fn default() -> Self {
        ProductModel::MkIII
    }
}

impl fmt::Display for ProductModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductModel::MkIII => write!(f, "MK-III"),
            ProductModel::MkV => write!(f, "MK-V"),
        }
    }
}

// ==========================================
// 审批分段 (Section A/B/C)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    A, // PO 信息
    B, // 报验明细
    C, // 子 PO / 炉号明细
}

impl Section {
    pub const ALL: [Section; 3] = [Section::A, Section::B, Section::C];

    /// 前置分段
    pub fn previous(self) -> Option<Section> {
        match self {
            Section::A => None,
            Section::B => Some(Section::A),
            Section::C => Some(Section::B),
        }
    }

    /// 所有后续分段
    pub fn subsequent(self) -> &'static [Section] {
        match self {
            Section::A => &[Section::B, Section::C],
            Section::B => &[Section::C],
            Section::C => &[],
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::A => write!(f, "A"),
            Section::B => write!(f, "B"),
            Section::C => write!(f, "C"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionStatus {
    #[default]
    Unset,
    Approved,
    Rejected,
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionStatus::Unset => write!(f, "UNSET"),
            SectionStatus::Approved => write!(f, "APPROVED"),
            SectionStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// 分段审批结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionOutcome {
    Approved,
    Rejected,
}

impl From<SectionOutcome> for SectionStatus {
    fn from(outcome: SectionOutcome) -> Self {
        match outcome {
            SectionOutcome::Approved => SectionStatus::Approved,
            SectionOutcome::Rejected => SectionStatus::Rejected,
        }
    }
}

impl fmt::Display for SectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        SectionStatus::from(*self).fmt(f)
    }
}

// ==========================================
// 报验生命周期状态 (Call Status)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE （与数据库一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Pending,         // 已登记待排期
    Scheduled,       // 已排期
    UnderInspection, // 检验中
    Paused,          // 已暂停（次日继续）
    Withheld,        // 已扣留
    Cancelled,       // 已取消
    Completed,       // 已完成
}

impl CallStatus {
    /// 当前周期内的终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Withheld | CallStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Pending => "PENDING",
            CallStatus::Scheduled => "SCHEDULED",
            CallStatus::UnderInspection => "UNDER_INSPECTION",
            CallStatus::Paused => "PAUSED",
            CallStatus::Withheld => "WITHHELD",
            CallStatus::Cancelled => "CANCELLED",
            CallStatus::Completed => "COMPLETED",
        }
    }

    /// 从数据库字符串解析，未知值回退为 PENDING
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SCHEDULED" => CallStatus::Scheduled,
            "UNDER_INSPECTION" => CallStatus::UnderInspection,
            "PAUSED" => CallStatus::Paused,
            "WITHHELD" => CallStatus::Withheld,
            "CANCELLED" => CallStatus::Cancelled,
            "COMPLETED" => CallStatus::Completed,
            _ => CallStatus::Pending,
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 班次 (Shift)
// ==========================================
// C 班跨零点，检验日期需人工在今天/昨天之间选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shift {
    A,
    B,
    C,
    General,
}

impl Shift {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(Shift::A),
            "B" => Some(Shift::B),
            "C" => Some(Shift::C),
            "G" | "GENERAL" => Some(Shift::General),
            _ => None,
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::A => write!(f, "A"),
            Shift::B => write!(f, "B"),
            Shift::C => write!(f, "C"),
            Shift::General => write!(f, "GENERAL"),
        }
    }
}

// ==========================================
// 扣留/取消原因 (Reason Code)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    MaterialNotAvailable, // 报验时厂家未备齐全部数量
    PlaceNotAsPerPo,      // 检验地点与 PO 不符
    VendorWithdrawn,      // 厂家撤回报验
    AnyOther,             // 其他（必须填写备注）
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::MaterialNotAvailable => "MATERIAL_NOT_AVAILABLE",
            ReasonCode::PlaceNotAsPerPo => "PLACE_NOT_AS_PER_PO",
            ReasonCode::VendorWithdrawn => "VENDOR_WITHDRAWN",
            ReasonCode::AnyOther => "ANY_OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MATERIAL_NOT_AVAILABLE" => Some(ReasonCode::MaterialNotAvailable),
            "PLACE_NOT_AS_PER_PO" => Some(ReasonCode::PlaceNotAsPerPo),
            "VENDOR_WITHDRAWN" => Some(ReasonCode::VendorWithdrawn),
            "ANY_OTHER" | "OTHER" => Some(ReasonCode::AnyOther),
            _ => None,
        }
    }

    /// 该原因是否强制要求备注
    pub fn requires_remarks(self) -> bool {
        matches!(self, ReasonCode::AnyOther)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 原材料检验科目 (Discipline)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Calibration,     // 标定/化学成分
    Visual,          // 外观检验
    Dimensional,     // 尺寸检验
    MaterialTesting, // 材料试验
    Packing,         // 包装与存储
}

impl Discipline {
    pub const ALL: [Discipline; 5] = [
        Discipline::Calibration,
        Discipline::Visual,
        Discipline::Dimensional,
        Discipline::MaterialTesting,
        Discipline::Packing,
    ];

    /// 草稿存储键中使用的科目标识
    pub fn as_key(self) -> &'static str {
        match self {
            Discipline::Calibration => "calibration",
            Discipline::Visual => "visual",
            Discipline::Dimensional => "dimensional",
            Discipline::MaterialTesting => "material_testing",
            Discipline::Packing => "packing",
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

// ==========================================
// 过程检验工序 (Process Stage)
// ==========================================
// 顺序固定: 剪切 → 车削 → 磁粉探伤 → 锻造 → 淬火 → 回火 → 终检
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStageKind {
    Shearing,
    Turning,
    Mpi,
    Forging,
    Quenching,
    Tempering,
    FinalCheck,
}

impl ProcessStageKind {
    pub const ORDER: [ProcessStageKind; 7] = [
        ProcessStageKind::Shearing,
        ProcessStageKind::Turning,
        ProcessStageKind::Mpi,
        ProcessStageKind::Forging,
        ProcessStageKind::Quenching,
        ProcessStageKind::Tempering,
        ProcessStageKind::FinalCheck,
    ];

    pub fn as_key(self) -> &'static str {
        match self {
            ProcessStageKind::Shearing => "shearing",
            ProcessStageKind::Turning => "turning",
            ProcessStageKind::Mpi => "mpi",
            ProcessStageKind::Forging => "forging",
            ProcessStageKind::Quenching => "quenching",
            ProcessStageKind::Tempering => "tempering",
            ProcessStageKind::FinalCheck => "final_check",
        }
    }
}

impl fmt::Display for ProcessStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_model_detection() {
        assert_eq!(ProductModel::detect("ERC MK-III"), Some(ProductModel::MkIII));
        assert_eq!(ProductModel::detect("erc mk iii"), Some(ProductModel::MkIII));
        assert_eq!(ProductModel::detect("ERC MK-V"), Some(ProductModel::MkV));
        assert_eq!(ProductModel::detect("ERC"), None);
        assert_eq!(ProductModel::detect_or_default(""), ProductModel::MkIII);
    }

    #[test]
    fn test_verdict_serialization() {
        assert_eq!(serde_json::to_string(&Verdict::NotOk).unwrap(), "\"NOT_OK\"");
        assert_eq!(serde_json::to_string(&Verdict::Ok).unwrap(), "\"OK\"");
    }

    #[test]
    fn test_call_status_roundtrip_str() {
        for status in [
            CallStatus::Pending,
            CallStatus::Scheduled,
            CallStatus::UnderInspection,
            CallStatus::Paused,
            CallStatus::Withheld,
            CallStatus::Cancelled,
            CallStatus::Completed,
        ] {
            assert_eq!(CallStatus::parse(status.as_str()), status);
        }
        assert_eq!(CallStatus::parse("garbage"), CallStatus::Pending);
    }

    #[test]
    fn test_section_order() {
        assert_eq!(Section::B.previous(), Some(Section::A));
        assert_eq!(Section::A.subsequent(), &[Section::B, Section::C]);
        assert!(Section::C.subsequent().is_empty());
    }

    #[test]
    fn test_reason_code_remarks_requirement() {
        assert!(ReasonCode::AnyOther.requires_remarks());
        assert!(!ReasonCode::VendorWithdrawn.requires_remarks());
        assert_eq!(ReasonCode::parse("other"), Some(ReasonCode::AnyOther));
    }
}
