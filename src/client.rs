//! Command-line counterpart of the prediction form: human-readable choices in,
//! encoded `PatientRecord` out, rendered score back.

use std::time::Duration;

use clap::{Args, ValueEnum};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::models::{PatientRecord, ScoreResult};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Gender {
    #[value(name = "Male")]
    Male,
    #[value(name = "Female")]
    Female,
    #[value(name = "Other")]
    Other,
}

impl Gender {
    pub fn code(self) -> i64 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
            Gender::Other => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkType {
    #[value(name = "Private")]
    Private,
    #[value(name = "Self-employed")]
    SelfEmployed,
    #[value(name = "Govt_job")]
    GovtJob,
    #[value(name = "children")]
    Children,
    #[value(name = "Never_worked")]
    NeverWorked,
}

impl WorkType {
    pub fn code(self) -> i64 {
        match self {
            WorkType::Private => 0,
            WorkType::SelfEmployed => 1,
            WorkType::GovtJob => 2,
            WorkType::Children => -1,
            WorkType::NeverWorked => -2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SmokingStatus {
    #[value(name = "never smoked", alias = "never-smoked")]
    NeverSmoked,
    #[value(name = "formerly smoked", alias = "formerly-smoked")]
    FormerlySmoked,
    #[value(name = "smokes")]
    Smokes,
    #[value(name = "Unknown")]
    Unknown,
}

impl SmokingStatus {
    pub fn code(self) -> i64 {
        match self {
            SmokingStatus::NeverSmoked => 0,
            SmokingStatus::FormerlySmoked => 1,
            SmokingStatus::Smokes => 2,
            SmokingStatus::Unknown => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum YesNo {
    #[value(name = "Yes")]
    Yes,
    #[value(name = "No")]
    No,
}

impl YesNo {
    pub fn code(self) -> i64 {
        match self {
            YesNo::Yes => 1,
            YesNo::No => 0,
        }
    }
}

/// Patient details as a person would enter them.
#[derive(Debug, Clone, Args)]
pub struct PatientForm {
    #[arg(long, value_enum, ignore_case = true, default_value = "Female")]
    pub gender: Gender,
    #[arg(long, default_value_t = 60.0)]
    pub age: f64,
    #[arg(long, value_enum, ignore_case = true, default_value = "Yes")]
    pub hypertension: YesNo,
    #[arg(long, value_enum, ignore_case = true, default_value = "No")]
    pub heart_disease: YesNo,
    #[arg(long, value_enum, ignore_case = true, default_value = "Yes")]
    pub ever_married: YesNo,
    #[arg(long, value_enum, ignore_case = true, default_value = "Private")]
    pub work_type: WorkType,
    /// Average glucose level in mg/dL
    #[arg(long, default_value_t = 110.0)]
    pub avg_glucose_level: f64,
    #[arg(long, default_value_t = 27.5)]
    pub bmi: f64,
    #[arg(long, value_enum, ignore_case = true, default_value = "never smoked")]
    pub smoking_status: SmokingStatus,
}

impl PatientForm {
    pub fn to_record(&self) -> PatientRecord {
        PatientRecord {
            gender: self.gender.code(),
            age: self.age,
            hypertension: self.hypertension.code(),
            heart_disease: self.heart_disease.code(),
            work_type: self.work_type.code(),
            avg_glucose_level: self.avg_glucose_level,
            bmi: self.bmi,
            smoking_status: self.smoking_status.code(),
            ever_married: self.ever_married.code(),
        }
    }
}

/// Parses a display threshold, which must lie in [0, 1].
pub fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threshold must be between 0 and 1, got {value}"))
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection error: is the backend at {url} correct and running?")]
    Connection { url: String },
    #[error("HTTP error {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("Error during request: {0}")]
    Request(String),
}

impl ClientError {
    fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_connect() {
            ClientError::Connection {
                url: url.to_string(),
            }
        } else {
            ClientError::Request(err.to_string())
        }
    }
}

/// Blocking client for the prediction service.
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    pub fn predict(
        &self,
        record: &PatientRecord,
        timeout: Duration,
    ) -> Result<ScoreResult, ClientError> {
        let url = self.predict_url();
        let response = self
            .http
            .post(&url)
            .json(record)
            .timeout(timeout)
            .send()
            .map_err(|e| ClientError::from_reqwest(e, &url))?;

        let response = Self::check_status(response)?;
        response
            .json::<ScoreResult>()
            .map_err(|e| ClientError::Request(format!("unexpected response body: {e}")))
    }

    pub fn health(&self, timeout: Duration) -> Result<Value, ClientError> {
        let url = self.health_url();
        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .map_err(|e| ClientError::from_reqwest(e, &url))?;

        let response = Self::check_status(response)?;
        response
            .json::<Value>()
            .map_err(|e| ClientError::Request(format!("unexpected response body: {e}")))
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(ClientError::Http { status, body })
    }
}

pub fn risk_label(pred: u8) -> &'static str {
    if pred == 1 {
        "1 (There is risk)"
    } else {
        "0 (No risk)"
    }
}

/// The server's authoritative result next to an exploratory label computed
/// with a local threshold. The local threshold never leaves this process.
#[derive(Debug, Clone, Copy)]
pub struct PredictionView {
    pub result: ScoreResult,
    pub threshold: f64,
}

impl PredictionView {
    pub fn local_pred(&self) -> u8 {
        u8::from(self.result.stroke_proba >= self.threshold)
    }

    pub fn render(&self) -> String {
        format!(
            "Stroke probability (model): {:.2}%\n\
             Predicted class (backend, 0.5 threshold): {}\n\
             Class decision at threshold {:.2} (display only): {}",
            self.result.stroke_proba * 100.0,
            risk_label(self.result.stroke_pred),
            self.threshold,
            risk_label(self.local_pred()),
        )
    }
}
