// ==========================================
// 检验验证与工作流状态引擎 - 原始样本数据
// ==========================================
// 职责: 定义各检验科目的原始录入数据结构
// 红线: 样本数据只读，验证器不得修改；缺失字段用 None 表示
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// 化学成分样本 (Calibration / Chemistry)
// ==========================================
/// 化学成分百分比，任一字段可缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChemistrySample {
    pub carbon: Option<f64>,
    pub silicon: Option<f64>,
    pub manganese: Option<f64>,
    pub phosphorus: Option<f64>,
    pub sulphur: Option<f64>,
}

impl ChemistrySample {
    /// 是否没有任何字段被填写
    pub fn is_empty(&self) -> bool {
        self.carbon.is_none()
            && self.silicon.is_none()
            && self.manganese.is_none()
            && self.phosphorus.is_none()
            && self.sulphur.is_none()
    }
}

// ==========================================
// 外观检验 (Visual)
// ==========================================
pub const NO_DEFECT: &str = "No Defect";

/// 标准缺陷清单
pub const STANDARD_VISUAL_DEFECTS: [&str; 12] = [
    NO_DEFECT,
    "Distortion",
    "Twist",
    "Kink",
    "Not Straight",
    "Fold",
    "Lap",
    "Crack",
    "Pit",
    "Groove",
    "Excessive Scaling",
    "Internal Defect (Piping, Segregation)",
];

/// 缺陷名 → 是否勾选
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualSelection {
    pub defects: BTreeMap<String, bool>,
}

impl VisualSelection {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self {
            defects: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn is_selected(&self, defect: &str) -> bool {
        self.defects.get(defect).copied().unwrap_or(false)
    }

    /// 已勾选的缺陷名
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.defects
            .iter()
            .filter(|(_, checked)| **checked)
            .map(|(name, _)| name.as_str())
    }
}

// ==========================================
// 尺寸检验 (Dimensional)
// ==========================================
/// 直径读数，未填写的样本为 None
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionalSamples {
    pub diameters: Vec<Option<f64>>,
}

impl DimensionalSamples {
    pub fn new(diameters: Vec<Option<f64>>) -> Self {
        Self { diameters }
    }

    pub fn filled(&self) -> impl Iterator<Item = f64> + '_ {
        self.diameters.iter().filter_map(|d| *d)
    }
}

// ==========================================
// 材料试验 (Material Testing)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialTestSample {
    #[serde(flatten)]
    pub chemistry: ChemistrySample,
    pub grain_size: Option<f64>,
    pub decarb_depth: Option<f64>,
    pub inclusion_a: Option<f64>,
    pub inclusion_b: Option<f64>,
    pub inclusion_c: Option<f64>,
    pub inclusion_d: Option<f64>,
}

impl MaterialTestSample {
    pub fn inclusions(&self) -> [Option<f64>; 4] {
        [
            self.inclusion_a,
            self.inclusion_b,
            self.inclusion_c,
            self.inclusion_d,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.chemistry.is_empty()
            && self.grain_size.is_none()
            && self.decarb_depth.is_none()
            && self.inclusions().iter().all(Option::is_none)
    }
}

// ==========================================
// 包装与存储检查表 (Packing & Storage)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecklistAnswer {
    Yes,
    No,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackingChecklist {
    pub bundling_secure: Option<ChecklistAnswer>,
    pub tags_attached: Option<ChecklistAnswer>,
    pub labels_correct: Option<ChecklistAnswer>,
    pub protection_adequate: Option<ChecklistAnswer>,
    pub storage_condition: Option<ChecklistAnswer>,
    pub moisture_protection: Option<ChecklistAnswer>,
    pub stacking_proper: Option<ChecklistAnswer>,
    pub remarks: Option<String>,
}

impl PackingChecklist {
    /// 固定 7 项 （检查项标识，回答）
    pub fn items(&self) -> [(&'static str, Option<ChecklistAnswer>); 7] {
        [
            ("bundling_secure", self.bundling_secure),
            ("tags_attached", self.tags_attached),
            ("labels_correct", self.labels_correct),
            ("protection_adequate", self.protection_adequate),
            ("storage_condition", self.storage_condition),
            ("moisture_protection", self.moisture_protection),
            ("stacking_proper", self.stacking_proper),
        ]
    }

    /// 所有 7 项统一回答
    pub fn uniform(answer: ChecklistAnswer) -> Self {
        Self {
            bundling_secure: Some(answer),
            tags_attached: Some(answer),
            labels_correct: Some(answer),
            protection_adequate: Some(answer),
            storage_condition: Some(answer),
            moisture_protection: Some(answer),
            stacking_proper: Some(answer),
            remarks: None,
        }
    }
}

// ==========================================
// 单炉号全部科目原始数据
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatSubmoduleData {
    pub calibration: ChemistrySample,
    pub visual: VisualSelection,
    pub dimensional: DimensionalSamples,
    pub material_tests: Vec<MaterialTestSample>,
    pub packing: PackingChecklist,
}

// ==========================================
// 整单科目原始数据（按科目 → 炉号）
// ==========================================
/// 各科目独立持久化，计算时按炉号重新组装
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSampleSet {
    #[serde(default)]
    pub calibration: BTreeMap<String, ChemistrySample>,
    #[serde(default)]
    pub visual: BTreeMap<String, VisualSelection>,
    #[serde(default)]
    pub dimensional: BTreeMap<String, DimensionalSamples>,
    #[serde(default)]
    pub material_testing: BTreeMap<String, Vec<MaterialTestSample>>,
    #[serde(default)]
    pub packing: BTreeMap<String, PackingChecklist>,
}

impl CallSampleSet {
    /// 组装单炉号数据（缺失科目按全空处理）
    pub fn for_heat(&self, heat_number: &str) -> HeatSubmoduleData {
        HeatSubmoduleData {
            calibration: self.calibration.get(heat_number).cloned().unwrap_or_default(),
            visual: self.visual.get(heat_number).cloned().unwrap_or_default(),
            dimensional: self.dimensional.get(heat_number).cloned().unwrap_or_default(),
            material_tests: self
                .material_testing
                .get(heat_number)
                .cloned()
                .unwrap_or_default(),
            packing: self.packing.get(heat_number).cloned().unwrap_or_default(),
        }
    }

    /// 按炉号组装全部数据
    pub fn per_heat<'a, I>(&self, heat_numbers: I) -> BTreeMap<String, HeatSubmoduleData>
    where
        I: IntoIterator<Item = &'a str>,
    {
        heat_numbers
            .into_iter()
            .map(|h| (h.to_string(), self.for_heat(h)))
            .collect()
    }
}
