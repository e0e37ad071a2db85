use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorBody;

/// A patient field fell outside its closed interval.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field} must be between {min} and {max}, got {value}")]
pub struct FieldRangeError {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

/// Failure while arranging a row or running the model.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("feature `{0}` is not a patient field")]
    UnknownFeature(String),
    #[error("model returned probability {0}, expected a value in [0, 1]")]
    InvalidProbability(f64),
    #[error("{0:#}")]
    Model(anyhow::Error),
}

/// Startup failures. Any of these keeps the server from binding.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed artifact {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not load ONNX model {}: {message}", .path.display())]
    Onnx { path: PathBuf, message: String },
    #[error("artifact has {coefficients} coefficients for {features} features")]
    ShapeMismatch { coefficients: usize, features: usize },
    #[error("unsupported artifact {}, expected a .onnx or .json file", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Everything `/predict` can answer with besides a score. All of it is the
/// caller's problem, so all of it is a 400.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] FieldRangeError),
    #[error("{0}")]
    Payload(String),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}
