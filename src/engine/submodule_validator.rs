// ==========================================
// 检验验证与工作流状态引擎 - 科目验证器
// ==========================================
// 职责: 把单炉号单科目的原始样本判定为 OK / NOT_OK / PENDING
// 红线: 纯函数，无 I/O；无数据 → PENDING，超差 → NOT_OK，绝不报错
// 红线: 所有判定必须输出 reason
// ==========================================

use crate::domain::heat::HeatVerdicts;
use crate::domain::samples::{
    ChecklistAnswer, ChemistrySample, DimensionalSamples, HeatSubmoduleData, MaterialTestSample,
    PackingChecklist, VisualSelection, NO_DEFECT,
};
use crate::domain::types::{ProductModel, Verdict};
use crate::engine::tolerance::{ChemistryLimits, ToleranceRules, ToleranceWindow};
use serde::{Deserialize, Serialize};

// ==========================================
// ValidationOutcome - 判定 + 原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub verdict: Verdict,
    pub reasons: Vec<String>,
}

impl ValidationOutcome {
    fn pending(reason: &str) -> Self {
        Self {
            verdict: Verdict::Pending,
            reasons: vec![reason.to_string()],
        }
    }

    fn ok(reason: &str) -> Self {
        Self {
            verdict: Verdict::Ok,
            reasons: vec![reason.to_string()],
        }
    }

    fn from_failures(failures: Vec<String>, ok_reason: &str) -> Self {
        if failures.is_empty() {
            Self::ok(ok_reason)
        } else {
            Self {
                verdict: Verdict::NotOk,
                reasons: failures,
            }
        }
    }
}

// ==========================================
// SubmoduleValidator
// ==========================================
pub struct SubmoduleValidator {
    rules: ToleranceRules,
}

impl SubmoduleValidator {
    pub fn new(rules: ToleranceRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ToleranceRules {
        &self.rules
    }

    /// 标定/化学成分
    ///
    /// # 规则
    /// - 五个字段全空 → PENDING
    /// - 任一已填字段超出窗口 → NOT_OK
    /// - 否则 → OK
    pub fn evaluate_calibration(&self, sample: &ChemistrySample) -> ValidationOutcome {
        if sample.is_empty() {
            return ValidationOutcome::pending("化学成分未录入");
        }
        let failures = chemistry_failures(sample, &self.rules.chemistry);
        ValidationOutcome::from_failures(failures, "化学成分全部在范围内")
    }

    /// 外观检验
    ///
    /// # 规则
    /// - 无勾选 → PENDING
    /// - 勾选 "No Defect" → OK（即使同时勾选其他缺陷）
    /// - 其他任一勾选 → NOT_OK
    pub fn evaluate_visual(&self, selection: &VisualSelection) -> ValidationOutcome {
        let selected: Vec<&str> = selection.selected().collect();
        if selected.is_empty() {
            return ValidationOutcome::pending("外观缺陷未勾选");
        }
        if selection.is_selected(NO_DEFECT) {
            if selected.len() > 1 {
                tracing::debug!(
                    selected = ?selected,
                    "外观检验同时勾选了 No Defect 与其他缺陷,按 No Defect 判定"
                );
            }
            return ValidationOutcome::ok("No Defect");
        }
        ValidationOutcome {
            verdict: Verdict::NotOk,
            reasons: selected.iter().map(|d| format!("缺陷: {}", d)).collect(),
        }
    }

    /// 尺寸检验（直径）
    ///
    /// # 规则
    /// - 窗口按型号: MK-III [20.47, 20.84], MK-V [22.81, 23.23]
    /// - 未填写的样本忽略；全部未填写 → PENDING
    /// - 任一已填样本超出窗口 → NOT_OK
    pub fn evaluate_dimensional(
        &self,
        samples: &DimensionalSamples,
        model: ProductModel,
    ) -> ValidationOutcome {
        let window = self.rules.dimensional.for_model(model);
        let mut filled = 0usize;
        let mut failures = Vec::new();
        for (idx, value) in samples.diameters.iter().enumerate() {
            if let Some(dia) = value {
                filled += 1;
                if !window.contains(*dia) {
                    failures.push(format!("样本{} 直径 {} 超出 {} {}", idx + 1, dia, model, window));
                }
            }
        }
        if filled == 0 {
            return ValidationOutcome::pending("直径样本未录入");
        }
        ValidationOutcome::from_failures(failures, "直径样本全部在范围内")
    }

    /// 材料试验
    ///
    /// # 规则
    /// - 所有样本全空 → PENDING
    /// - 任一样本化学成分/晶粒度（<6）/脱碳层（>0.25）/夹杂物（>2.0） 超差 → NOT_OK
    pub fn evaluate_material_testing(&self, samples: &[MaterialTestSample]) -> ValidationOutcome {
        if samples.iter().all(MaterialTestSample::is_empty) {
            return ValidationOutcome::pending("材料试验未录入");
        }

        let limits = &self.rules.material_test;
        let mut failures = Vec::new();
        for (idx, sample) in samples.iter().enumerate() {
            let label = format!("样本{}", idx + 1);
            for failure in chemistry_failures(&sample.chemistry, &self.rules.chemistry) {
                failures.push(format!("{} {}", label, failure));
            }
            push_if_outside(&mut failures, &label, "晶粒度", sample.grain_size, limits.grain_size);
            push_if_outside(&mut failures, &label, "脱碳层", sample.decarb_depth, limits.decarb_depth);
            for (name, rating) in ["A", "B", "C", "D"].iter().zip(sample.inclusions()) {
                push_if_outside(
                    &mut failures,
                    &label,
                    &format!("夹杂物{}", name),
                    rating,
                    limits.inclusion,
                );
            }
        }
        ValidationOutcome::from_failures(failures, "材料试验全部合格")
    }

    /// 包装与存储
    ///
    /// # 规则
    /// - 7 项均未回答 → PENDING
    /// - 任一 "No" → NOT_OK
    /// - 否则 → OK（部分回答且无 No 也视为 OK）
    pub fn evaluate_packing(&self, checklist: &PackingChecklist) -> ValidationOutcome {
        let items = checklist.items();
        if items.iter().all(|(_, answer)| answer.is_none()) {
            return ValidationOutcome::pending("包装检查表未回答");
        }
        let failures: Vec<String> = items
            .iter()
            .filter(|(_, answer)| *answer == Some(ChecklistAnswer::No))
            .map(|(item, _)| format!("检查项 {} = No", item))
            .collect();
        ValidationOutcome::from_failures(failures, "包装检查表无 No")
    }

    /// 计算单炉号五科目判定
    pub fn evaluate_heat(&self, data: &HeatSubmoduleData, model: ProductModel) -> HeatVerdicts {
        let verdicts = HeatVerdicts {
            calibration: self.evaluate_calibration(&data.calibration).verdict,
            visual: self.evaluate_visual(&data.visual).verdict,
            dimensional: self.evaluate_dimensional(&data.dimensional, model).verdict,
            material_testing: self.evaluate_material_testing(&data.material_tests).verdict,
            packing: self.evaluate_packing(&data.packing).verdict,
        };
        tracing::debug!(?verdicts, %model, "重新计算炉号判定");
        verdicts
    }
}

impl Default for SubmoduleValidator {
    fn default() -> Self {
        Self::new(ToleranceRules::default())
    }
}

// ==========================================
// 内部工具
// ==========================================

fn chemistry_failures(sample: &ChemistrySample, limits: &ChemistryLimits) -> Vec<String> {
    let mut failures = Vec::new();
    let fields = [
        ("C", sample.carbon, limits.carbon),
        ("Si", sample.silicon, limits.silicon),
        ("Mn", sample.manganese, limits.manganese),
        ("P", sample.phosphorus, limits.phosphorus),
        ("S", sample.sulphur, limits.sulphur),
    ];
    for (name, value, window) in fields {
        if let Some(v) = value {
            if !window.contains(v) {
                failures.push(format!("{}={} 超出 {}", name, v, window));
            }
        }
    }
    failures
}

fn push_if_outside(
    failures: &mut Vec<String>,
    label: &str,
    name: &str,
    value: Option<f64>,
    window: ToleranceWindow,
) {
    if let Some(v) = value {
        if !window.contains(v) {
            failures.push(format!("{} {}={} 超出 {}", label, name, v, window));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chem(c: f64, si: f64, mn: f64, p: f64, s: f64) -> ChemistrySample {
        ChemistrySample {
            carbon: Some(c),
            silicon: Some(si),
            manganese: Some(mn),
            phosphorus: Some(p),
            sulphur: Some(s),
        }
    }

    #[test]
    fn test_calibration_in_range_ok() {
        let v = SubmoduleValidator::default();
        let outcome = v.evaluate_calibration(&chem(0.55, 1.8, 0.9, 0.02, 0.02));
        assert_eq!(outcome.verdict, Verdict::Ok);
    }

    #[test]
    fn test_calibration_carbon_high_not_ok() {
        let v = SubmoduleValidator::default();
        let outcome = v.evaluate_calibration(&chem(0.65, 1.8, 0.9, 0.02, 0.02));
        assert_eq!(outcome.verdict, Verdict::NotOk);
        assert_eq!(outcome.reasons.len(), 1);
        assert!(outcome.reasons[0].starts_with("C="));
    }

    #[test]
    fn test_calibration_partial_subset_evaluated() {
        let v = SubmoduleValidator::default();
        let sample = ChemistrySample {
            sulphur: Some(0.031),
            ..Default::default()
        };
        assert_eq!(v.evaluate_calibration(&sample).verdict, Verdict::NotOk);
        assert_eq!(
            v.evaluate_calibration(&ChemistrySample::default()).verdict,
            Verdict::Pending
        );
    }

    #[test]
    fn test_visual_no_defect_wins() {
        let v = SubmoduleValidator::default();
        let sel = VisualSelection::from_pairs([(NO_DEFECT, true), ("Scratch", true)]);
        assert_eq!(v.evaluate_visual(&sel).verdict, Verdict::Ok);
    }

    #[test]
    fn test_visual_defect_and_pending() {
        let v = SubmoduleValidator::default();
        let crack = VisualSelection::from_pairs([("Crack", true)]);
        assert_eq!(v.evaluate_visual(&crack).verdict, Verdict::NotOk);
        let none = VisualSelection::from_pairs([("Crack", false)]);
        assert_eq!(v.evaluate_visual(&none).verdict, Verdict::Pending);
    }

    #[test]
    fn test_dimensional_windows_by_model() {
        let v = SubmoduleValidator::default();
        let out = DimensionalSamples::new(vec![Some(20.90)]);
        let inside = DimensionalSamples::new(vec![Some(20.60), None]);
        assert_eq!(v.evaluate_dimensional(&out, ProductModel::MkIII).verdict, Verdict::NotOk);
        assert_eq!(v.evaluate_dimensional(&inside, ProductModel::MkIII).verdict, Verdict::Ok);
        assert_eq!(v.evaluate_dimensional(&inside, ProductModel::MkV).verdict, Verdict::NotOk);
        let empty = DimensionalSamples::new(vec![None, None]);
        assert_eq!(v.evaluate_dimensional(&empty, ProductModel::MkV).verdict, Verdict::Pending);
    }

    #[test]
    fn test_material_testing_any_failing_sample() {
        let v = SubmoduleValidator::default();
        let good = MaterialTestSample {
            grain_size: Some(7.0),
            decarb_depth: Some(0.2),
            inclusion_a: Some(1.5),
            ..Default::default()
        };
        let bad = MaterialTestSample {
            inclusion_c: Some(2.5),
            ..Default::default()
        };
        assert_eq!(v.evaluate_material_testing(&[good.clone()]).verdict, Verdict::Ok);
        assert_eq!(v.evaluate_material_testing(&[good, bad]).verdict, Verdict::NotOk);
        assert_eq!(
            v.evaluate_material_testing(&[MaterialTestSample::default()]).verdict,
            Verdict::Pending
        );
        assert_eq!(v.evaluate_material_testing(&[]).verdict, Verdict::Pending);
    }

    #[test]
    fn test_material_testing_grain_size_below_six() {
        let v = SubmoduleValidator::default();
        let sample = MaterialTestSample {
            grain_size: Some(5.5),
            ..Default::default()
        };
        assert_eq!(v.evaluate_material_testing(&[sample]).verdict, Verdict::NotOk);
    }

    #[test]
    fn test_packing_checklist() {
        let v = SubmoduleValidator::default();
        assert_eq!(v.evaluate_packing(&PackingChecklist::default()).verdict, Verdict::Pending);
        assert_eq!(
            v.evaluate_packing(&PackingChecklist::uniform(ChecklistAnswer::Yes)).verdict,
            Verdict::Ok
        );
        let mut one_no = PackingChecklist::uniform(ChecklistAnswer::Yes);
        one_no.stacking_proper = Some(ChecklistAnswer::No);
        let outcome = v.evaluate_packing(&one_no);
        assert_eq!(outcome.verdict, Verdict::NotOk);
        assert_eq!(outcome.reasons, vec!["检查项 stacking_proper = No".to_string()]);
    }
}
