//! Loading the model artifact and resolving its metadata once at startup.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::classifier::{Classifier, LogisticClassifier, LogisticParams, OnnxClassifier};
use crate::error::{ArtifactError, ScoringError};
use crate::models::{PatientRecord, ScoreResult, DEFAULT_FEATURE_ORDER};

#[derive(Debug, Default, Deserialize)]
struct ArtifactMetadata {
    #[serde(default)]
    feature_order: Option<Vec<String>>,
    #[serde(default)]
    versions: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct JsonBundle {
    model: LogisticParams,
    #[serde(flatten)]
    metadata: ArtifactMetadata,
}

/// The loaded model together with the metadata resolved for it. Built once,
/// never mutated afterwards.
pub struct ModelArtifact {
    model: Box<dyn Classifier>,
    model_path: String,
    features: Vec<String>,
    versions: Map<String, Value>,
}

impl ModelArtifact {
    /// Loads an artifact, dispatching on the file extension.
    ///
    /// `.onnx` files may have a `<path>.meta.json` sidecar with
    /// `feature_order` and `versions`; `.json` files are logistic-regression
    /// artifacts that carry their metadata inline.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let extension = path.extension().and_then(|ext| ext.to_str());
        let artifact = match extension {
            Some("onnx") => Self::load_onnx(path)?,
            Some("json") => Self::load_json(path)?,
            _ => return Err(ArtifactError::UnsupportedFormat(path.to_path_buf())),
        };

        info!(
            "Loaded model {} with features [{}]",
            artifact.model_path,
            artifact.features.join(", ")
        );
        Ok(artifact)
    }

    fn load_onnx(path: &Path) -> Result<Self, ArtifactError> {
        let metadata = read_sidecar(path)?;
        let features = resolve_features(metadata.feature_order);

        let model = OnnxClassifier::load(path, features.len()).map_err(|e| ArtifactError::Onnx {
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })?;

        Ok(Self::from_parts(
            Box::new(model),
            path.display().to_string(),
            features,
            metadata.versions.unwrap_or_default(),
        ))
    }

    fn load_json(path: &Path) -> Result<Self, ArtifactError> {
        let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |source| ArtifactError::Malformed {
            path: path.to_path_buf(),
            source,
        };

        // A `model` key means a bundle; anything else must be a bare model.
        let value: Value = serde_json::from_str(&raw).map_err(malformed)?;
        let (params, metadata) = if value.get("model").is_some() {
            let bundle: JsonBundle = serde_json::from_value(value).map_err(malformed)?;
            (bundle.model, bundle.metadata)
        } else {
            let params: LogisticParams = serde_json::from_value(value).map_err(malformed)?;
            (params, ArtifactMetadata::default())
        };
        let features = resolve_features(metadata.feature_order);

        let model = LogisticClassifier::new(params);
        if model.n_features() != features.len() {
            return Err(ArtifactError::ShapeMismatch {
                coefficients: model.n_features(),
                features: features.len(),
            });
        }

        Ok(Self::from_parts(
            Box::new(model),
            path.display().to_string(),
            features,
            metadata.versions.unwrap_or_default(),
        ))
    }

    /// Assembles an artifact from an already constructed classifier.
    pub fn from_parts(
        model: Box<dyn Classifier>,
        model_path: String,
        features: Vec<String>,
        versions: Map<String, Value>,
    ) -> Self {
        Self {
            model,
            model_path,
            features,
            versions,
        }
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn versions(&self) -> &Map<String, Value> {
        &self.versions
    }

    /// Runs one fresh single-row inference. The record must already be
    /// validated.
    pub fn score(&self, record: &PatientRecord) -> Result<ScoreResult, ScoringError> {
        let row = record.arrange(&self.features)?;
        let probability = self.model.predict_proba(&row).map_err(ScoringError::Model)?;
        ScoreResult::from_probability(probability)
    }
}

fn sidecar_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

fn read_sidecar(model_path: &Path) -> Result<ArtifactMetadata, ArtifactError> {
    let path = sidecar_path(model_path);
    if !path.exists() {
        return Ok(ArtifactMetadata::default());
    }

    let raw = fs::read_to_string(&path).map_err(|source| ArtifactError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Malformed { path, source })
}

/// Uses the artifact's own ordering when it has a non-empty one.
fn resolve_features(declared: Option<Vec<String>>) -> Vec<String> {
    let features = match declared {
        Some(order) if !order.is_empty() => order,
        _ => DEFAULT_FEATURE_ORDER.iter().map(|name| name.to_string()).collect(),
    };

    for name in &features {
        if !PatientRecord::is_feature(name) {
            warn!("Feature `{name}` is not a patient field; every prediction will be rejected");
        }
    }

    features
}
