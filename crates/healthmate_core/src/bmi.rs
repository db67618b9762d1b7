//! Pure BMI engine.
//!
//! Uses the WHO category boundaries (25.0 and 30.0 as exclusive upper
//! bounds) and a single display precision of one decimal place everywhere.

use crate::HealthError;
use schemars::JsonSchema;
use serde::Serialize;

/// Healthy BMI range quoted back to callers alongside every reading.
pub const HEALTHY_RANGE: &str = "18.5 - 24.9";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub enum BmiCategory {
    Underweight,
    #[serde(rename = "Normal weight")]
    NormalWeight,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn label(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::NormalWeight => "Normal weight",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            BmiCategory::Underweight => &[
                "Consider consulting a healthcare provider about healthy weight gain",
                "Focus on nutrient-dense foods and strength training",
                "Ensure adequate protein intake (1.2-1.6g per kg body weight)",
            ],
            BmiCategory::NormalWeight => &[
                "Maintain your current healthy weight through balanced diet",
                "Continue regular physical activity (150 min/week moderate exercise)",
                "Focus on overall wellness and preventive health measures",
            ],
            BmiCategory::Overweight => &[
                "Consider gradual weight loss through caloric deficit",
                "Increase physical activity to 300 min/week moderate exercise",
                "Focus on whole foods and reduce processed food intake",
            ],
            BmiCategory::Obese => &[
                "Consult healthcare provider for personalized weight management plan",
                "Consider structured diet and exercise program",
                "Regular monitoring of blood pressure and blood sugar levels",
            ],
        }
    }
}

impl std::fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, JsonSchema)]
pub struct BmiReading {
    pub bmi: f64,
    pub category: BmiCategory,
}

/// Compute BMI from height in centimetres and weight in kilograms.
///
/// The value is rounded to one decimal place and the category is derived
/// from the rounded value, so boundary readings like 25.0 classify
/// deterministically.
pub fn calculate_bmi(height_cm: f64, weight_kg: f64) -> Result<BmiReading, HealthError> {
    if !height_cm.is_finite() || height_cm <= 0.0 {
        return Err(HealthError::Validation(
            "height_cm must be a positive number".into(),
        ));
    }
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(HealthError::Validation(
            "weight_kg must be a positive number".into(),
        ));
    }

    let height_m = height_cm / 100.0;
    let bmi = round1(weight_kg / (height_m * height_m));
    Ok(BmiReading {
        bmi,
        category: categorize(bmi),
    })
}

pub fn categorize(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 25.0 {
        BmiCategory::NormalWeight
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_inputs() {
        assert!(calculate_bmi(0.0, 70.0).is_err());
        assert!(calculate_bmi(175.0, 0.0).is_err());
        assert!(calculate_bmi(-170.0, 70.0).is_err());
        assert!(calculate_bmi(f64::NAN, 70.0).is_err());
    }

    #[test]
    fn computes_rounded_value() {
        let r = calculate_bmi(175.0, 70.0).unwrap();
        assert_eq!(r.bmi, 22.9); // 70 / 1.75^2 = 22.857...
        assert_eq!(r.category, BmiCategory::NormalWeight);
    }

    #[test]
    fn boundaries_follow_who_convention() {
        assert_eq!(categorize(18.4), BmiCategory::Underweight);
        assert_eq!(categorize(18.5), BmiCategory::NormalWeight);
        assert_eq!(categorize(24.9), BmiCategory::NormalWeight);
        assert_eq!(categorize(25.0), BmiCategory::Overweight);
        assert_eq!(categorize(29.9), BmiCategory::Overweight);
        assert_eq!(categorize(30.0), BmiCategory::Obese);
    }

    #[test]
    fn boundary_reading_from_raw_measurements() {
        // 64 kg at 160 cm is exactly 25.0: Overweight, not Normal.
        let r = calculate_bmi(160.0, 64.0).unwrap();
        assert_eq!(r.bmi, 25.0);
        assert_eq!(r.category, BmiCategory::Overweight);
    }

    #[test]
    fn monotonic_in_weight_and_inverse_in_height() {
        let base = calculate_bmi(175.0, 70.0).unwrap().bmi;
        let heavier = calculate_bmi(175.0, 80.0).unwrap().bmi;
        let taller = calculate_bmi(185.0, 70.0).unwrap().bmi;
        assert!(heavier >= base);
        assert!(taller <= base);
    }

    #[test]
    fn category_labels() {
        assert_eq!(BmiCategory::NormalWeight.label(), "Normal weight");
        assert_eq!(
            serde_json::to_value(BmiCategory::NormalWeight).unwrap(),
            serde_json::json!("Normal weight")
        );
    }
}
