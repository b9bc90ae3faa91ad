// ==========================================
// 检验验证与工作流状态引擎 - 公差规则表
// ==========================================
// 职责: 化学成分/材料试验/尺寸/过程工序字段的公差窗口
// 红线: 纯数据 + 纯判定，无 I/O；空值不适用，不可解析值判为无效
// ==========================================

use crate::domain::types::ProductModel;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ToleranceWindow - 闭区间窗口（上下限可单侧缺失）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceWindow {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ToleranceWindow {
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub const fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub const fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// 边界值视为合格
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl fmt::Display for ToleranceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "[{}, {}]", min, max),
            (Some(min), None) => write!(f, "≥{}", min),
            (None, Some(max)) => write!(f, "≤{}", max),
            (None, None) => write!(f, "(any)"),
        }
    }
}

/// 按产品型号区分的窗口
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelWindows {
    pub mk_iii: ToleranceWindow,
    pub mk_v: ToleranceWindow,
}

impl ModelWindows {
    pub const fn same(window: ToleranceWindow) -> Self {
        Self {
            mk_iii: window,
            mk_v: window,
        }
    }

    pub fn for_model(&self, model: ProductModel) -> ToleranceWindow {
        match model {
            ProductModel::MkIII => self.mk_iii,
            ProductModel::MkV => self.mk_v,
        }
    }
}

// ==========================================
// 化学成分 / 材料试验限值
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChemistryLimits {
    pub carbon: ToleranceWindow,
    pub silicon: ToleranceWindow,
    pub manganese: ToleranceWindow,
    pub phosphorus: ToleranceWindow,
    pub sulphur: ToleranceWindow,
}

impl Default for ChemistryLimits {
    fn default() -> Self {
        Self {
            carbon: ToleranceWindow::between(0.50, 0.60),
            silicon: ToleranceWindow::between(1.50, 2.00),
            manganese: ToleranceWindow::between(0.80, 1.00),
            phosphorus: ToleranceWindow::at_most(0.030),
            sulphur: ToleranceWindow::at_most(0.030),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialTestLimits {
    pub grain_size: ToleranceWindow,   // 晶粒度 ≥ 6
    pub decarb_depth: ToleranceWindow, // 脱碳层 ≤ 0.25
    pub inclusion: ToleranceWindow,    // 夹杂物 A-D 各 ≤ 2.0
}

impl Default for MaterialTestLimits {
    fn default() -> Self {
        Self {
            grain_size: ToleranceWindow::at_least(6.0),
            decarb_depth: ToleranceWindow::at_most(0.25),
            inclusion: ToleranceWindow::at_most(2.0),
        }
    }
}

// ==========================================
// 过程工序字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessField {
    Weight,
    ToeLoad,
    LengthCutBar,
    Dia,
    ForgingTemperature,
    TemperingTemperature,
    TemperingHardness,
    QuenchingTemperature,
    TurningDia,
    ParallelLength,
    FullLength,
}

impl ProcessField {
    /// 兼容上游 camelCase 字段名
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "weight" => Some(ProcessField::Weight),
            "toeLoad" => Some(ProcessField::ToeLoad),
            "lengthCutBar" => Some(ProcessField::LengthCutBar),
            "dia" => Some(ProcessField::Dia),
            "forgingTemperature" => Some(ProcessField::ForgingTemperature),
            "temperingTemperature" => Some(ProcessField::TemperingTemperature),
            "temperingHardness" => Some(ProcessField::TemperingHardness),
            "quenchingTemperature" => Some(ProcessField::QuenchingTemperature),
            "turningDia" => Some(ProcessField::TurningDia),
            "parallelLength" => Some(ProcessField::ParallelLength),
            "fullLength" => Some(ProcessField::FullLength),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTolerances {
    pub weight: ModelWindows,
    pub toe_load: ModelWindows,
    pub length_cut_bar: ModelWindows,
    pub dia: ModelWindows,
    pub forging_temperature: ModelWindows,
    pub tempering_temperature: ModelWindows,
    pub tempering_hardness: ModelWindows,
    pub quenching_temperature: ModelWindows,
    pub turning_dia: ModelWindows,
    pub parallel_length: ModelWindows,
    pub full_length: ModelWindows,
}

impl Default for ProcessTolerances {
    fn default() -> Self {
        Self {
            weight: ModelWindows {
                mk_iii: ToleranceWindow::between(904.0, 937.0),
                mk_v: ToleranceWindow::between(1068.0, 1108.0),
            },
            toe_load: ModelWindows {
                mk_iii: ToleranceWindow::between(850.0, 1100.0),
                mk_v: ToleranceWindow::between(1200.0, 1500.0),
            },
            length_cut_bar: ModelWindows::same(ToleranceWindow::between(350.0, 351.5)),
            dia: ModelWindows {
                mk_iii: ToleranceWindow::between(20.47, 20.84),
                mk_v: ToleranceWindow::between(22.81, 23.23),
            },
            forging_temperature: ModelWindows::same(ToleranceWindow::at_least(900.0)),
            tempering_temperature: ModelWindows::same(ToleranceWindow::between(400.0, 550.0)),
            tempering_hardness: ModelWindows::same(ToleranceWindow::between(40.0, 44.0)),
            quenching_temperature: ModelWindows::same(ToleranceWindow::at_most(70.0)),
            turning_dia: ModelWindows::same(ToleranceWindow::between(20.47, 20.84)),
            parallel_length: ModelWindows::same(ToleranceWindow::between(81.5, 82.5)),
            full_length: ModelWindows::same(ToleranceWindow::between(89.5, 90.5)),
        }
    }
}

impl ProcessTolerances {
    pub fn windows(&self, field: ProcessField) -> &ModelWindows {
        match field {
            ProcessField::Weight => &self.weight,
            ProcessField::ToeLoad => &self.toe_load,
            ProcessField::LengthCutBar => &self.length_cut_bar,
            ProcessField::Dia => &self.dia,
            ProcessField::ForgingTemperature => &self.forging_temperature,
            ProcessField::TemperingTemperature => &self.tempering_temperature,
            ProcessField::TemperingHardness => &self.tempering_hardness,
            ProcessField::QuenchingTemperature => &self.quenching_temperature,
            ProcessField::TurningDia => &self.turning_dia,
            ProcessField::ParallelLength => &self.parallel_length,
            ProcessField::FullLength => &self.full_length,
        }
    }
}

// ==========================================
// ToleranceRules - 全量规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceRules {
    pub chemistry: ChemistryLimits,
    pub material_test: MaterialTestLimits,
    pub dimensional: ModelWindows, // 原材料直径
    pub process: ProcessTolerances,
}

impl Default for ToleranceRules {
    fn default() -> Self {
        Self {
            chemistry: ChemistryLimits::default(),
            material_test: MaterialTestLimits::default(),
            dimensional: ModelWindows {
                mk_iii: ToleranceWindow::between(20.47, 20.84),
                mk_v: ToleranceWindow::between(22.81, 23.23),
            },
            process: ProcessTolerances::default(),
        }
    }
}

/// 单字段公差检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceCheck {
    pub is_applicable: bool,
    pub is_valid: bool,
}

impl ToleranceRules {
    /// 检查过程工序录入值
    ///
    /// # 规则
    /// - 空白输入 → 不适用（不算失败）
    /// - 无法解析为数字 → 适用且无效
    /// - 否则按型号窗口判定
    pub fn check_process_field(
        &self,
        field: ProcessField,
        raw_value: &str,
        model: ProductModel,
    ) -> ToleranceCheck {
        let trimmed = raw_value.trim();
        if trimmed.is_empty() {
            return ToleranceCheck {
                is_applicable: false,
                is_valid: true,
            };
        }

        let is_valid = match trimmed.parse::<f64>() {
            Ok(value) => self.process.windows(field).for_model(model).contains(value),
            Err(_) => false,
        };

        ToleranceCheck {
            is_applicable: true,
            is_valid,
        }
    }
}
