//! Binary classifiers that turn one arranged feature row into a positive-class
//! probability.

use std::path::Path;

use anyhow::{ensure, Context};
use ndarray::{Array1, ArrayView1};
use serde::Deserialize;
use tract_onnx::prelude::*;

/// Anything that can score a single row. Shared read-only across workers.
pub trait Classifier: Send + Sync {
    /// Probability of the positive class for `row`, laid out in the
    /// artifact's feature order.
    fn predict_proba(&self, row: &[f32]) -> anyhow::Result<f64>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An ONNX graph taking a `[1, n_features]` f32 input.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    n_features: usize,
}

impl OnnxClassifier {
    /// Loads, optimizes and plans the graph once. Nothing is reloaded per
    /// request.
    pub fn load(path: &Path, n_features: usize) -> TractResult<Self> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, n_features)),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { plan, n_features })
    }
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, row: &[f32]) -> anyhow::Result<f64> {
        ensure!(
            row.len() == self.n_features,
            "expected {} features, got {}",
            self.n_features,
            row.len()
        );

        let input = tract_ndarray::Array2::from_shape_vec((1, row.len()), row.to_vec())?
            .into_tensor();
        let outputs = self.plan.run(tvec!(input.into()))?;

        // Integer label outputs are skipped; probabilities are the last f32 output.
        let probabilities = outputs
            .iter()
            .rev()
            .find(|output| output.datum_type() == f32::datum_type())
            .context("model produced no f32 output")?;
        let view = probabilities.to_array_view::<f32>()?;

        let positive = if view.len() >= 2 {
            view.iter().nth(1)
        } else {
            view.iter().next()
        };
        let probability = positive.copied().context("model produced an empty output")?;

        Ok(f64::from(probability))
    }
}

/// Serialized form of [`LogisticClassifier`].
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticParams {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Plain logistic regression: `sigmoid(w · x + b)`.
#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LogisticClassifier {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            coefficients: Array1::from(params.coefficients),
            intercept: params.intercept,
        }
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }
}

impl Classifier for LogisticClassifier {
    fn predict_proba(&self, row: &[f32]) -> anyhow::Result<f64> {
        ensure!(
            row.len() == self.n_features(),
            "expected {} features, got {}",
            self.n_features(),
            row.len()
        );

        let x: Array1<f64> = ArrayView1::from(row).mapv(f64::from);
        let z = x.dot(&self.coefficients) + self.intercept;

        Ok(1.0 / (1.0 + (-z).exp()))
    }
}
