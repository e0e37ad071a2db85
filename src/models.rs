use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{FieldRangeError, ScoringError};

/// Column order used when the artifact carries no `feature_order` of its own.
pub const DEFAULT_FEATURE_ORDER: [&str; 9] = [
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "work_type",
    "avg_glucose_level",
    "bmi",
    "smoking_status",
    "ever_married",
];

/// Authoritative cutoff for `stroke_pred`. Clients may display their own.
pub const DECISION_THRESHOLD: f64 = 0.5;

struct FieldDomain {
    name: &'static str,
    min: f64,
    max: f64,
}

// Closed intervals, in declaration order.
const DOMAINS: [FieldDomain; 9] = [
    FieldDomain { name: "gender", min: -1.0, max: 1.0 },
    FieldDomain { name: "age", min: 0.0, max: 120.0 },
    FieldDomain { name: "hypertension", min: 0.0, max: 1.0 },
    FieldDomain { name: "heart_disease", min: 0.0, max: 1.0 },
    FieldDomain { name: "work_type", min: -2.0, max: 2.0 },
    FieldDomain { name: "avg_glucose_level", min: 0.0, max: 500.0 },
    FieldDomain { name: "bmi", min: 5.0, max: 100.0 },
    FieldDomain { name: "smoking_status", min: -1.0, max: 2.0 },
    FieldDomain { name: "ever_married", min: 0.0, max: 1.0 },
];

/// One patient as posted to `/predict`. Categorical fields arrive already
/// encoded as integers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PatientRecord {
    #[serde(deserialize_with = "whole_number")]
    pub gender: i64,
    pub age: f64,
    #[serde(deserialize_with = "whole_number")]
    pub hypertension: i64,
    #[serde(deserialize_with = "whole_number")]
    pub heart_disease: i64,
    #[serde(deserialize_with = "whole_number")]
    pub work_type: i64,
    pub avg_glucose_level: f64,
    pub bmi: f64,
    #[serde(deserialize_with = "whole_number")]
    pub smoking_status: i64,
    #[serde(deserialize_with = "whole_number")]
    pub ever_married: i64,
}

/// Accepts `1` as well as `1.0`; anything with a fractional part is an error.
fn whole_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    match number.as_f64() {
        Some(value)
            if value.is_finite()
                && value.fract() == 0.0
                && value >= i64::MIN as f64
                && value < i64::MAX as f64 =>
        {
            Ok(value as i64)
        }
        _ => Err(de::Error::custom(format!("expected an integer, got {number}"))),
    }
}

impl PatientRecord {
    /// Checks every field against its closed interval and reports the first
    /// violation.
    pub fn validate(&self) -> Result<(), FieldRangeError> {
        for domain in &DOMAINS {
            // Every entry in DOMAINS names a field.
            let value = self.feature(domain.name).unwrap_or(f64::NAN);
            if !(domain.min..=domain.max).contains(&value) {
                return Err(FieldRangeError {
                    field: domain.name,
                    min: domain.min,
                    max: domain.max,
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn is_feature(name: &str) -> bool {
        DOMAINS.iter().any(|domain| domain.name == name)
    }

    /// Looks a field up by its wire name.
    pub fn feature(&self, name: &str) -> Option<f64> {
        let value = match name {
            "gender" => self.gender as f64,
            "age" => self.age,
            "hypertension" => self.hypertension as f64,
            "heart_disease" => self.heart_disease as f64,
            "work_type" => self.work_type as f64,
            "avg_glucose_level" => self.avg_glucose_level,
            "bmi" => self.bmi,
            "smoking_status" => self.smoking_status as f64,
            "ever_married" => self.ever_married as f64,
            _ => return None,
        };
        Some(value)
    }

    /// Lays the record out as a single model row following `order`.
    pub fn arrange(&self, order: &[String]) -> Result<Vec<f32>, ScoringError> {
        order
            .iter()
            .map(|name| {
                self.feature(name)
                    .map(|value| value as f32)
                    .ok_or_else(|| ScoringError::UnknownFeature(name.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ScoreResult {
    pub stroke_proba: f64,
    pub stroke_pred: u8,
}

impl ScoreResult {
    pub fn from_probability(probability: f64) -> Result<Self, ScoringError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ScoringError::InvalidProbability(probability));
        }
        Ok(Self {
            stroke_proba: probability,
            stroke_pred: u8::from(probability >= DECISION_THRESHOLD),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub ok: bool,
    #[serde(rename = "try")]
    pub try_paths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_path: String,
    pub features: Vec<String>,
    pub versions: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
