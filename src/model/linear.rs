use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::ServiceError,
    model::{loader, registry::Model},
    storage,
};

/// Serialized linear classifier: one coefficient row and one intercept per
/// class, plus the class labels emitted in predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearEstimator {
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    pub classes: Vec<Value>,
}

impl LinearEstimator {
    pub fn num_features(&self) -> usize {
        self.coefficients.first().map_or(0, Vec::len)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    fn check_consistent(&self) -> Result<(), ServiceError> {
        let rows = self.coefficients.len();
        if rows == 0 || rows != self.classes.len() || rows != self.intercepts.len() {
            return Err(ServiceError::Other(format!(
                "inconsistent artifact: {} coefficient rows, {} intercepts, {} classes",
                rows,
                self.intercepts.len(),
                self.classes.len()
            )));
        }
        let width = self.num_features();
        if width == 0 || self.coefficients.iter().any(|row| row.len() != width) {
            return Err(ServiceError::Other(
                "inconsistent artifact: ragged or empty coefficient rows".into(),
            ));
        }
        Ok(())
    }

    fn scores(&self, features: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, intercept)| {
                row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + intercept
            })
            .collect()
    }

    fn argmax(scores: &[f64]) -> usize {
        let mut best = 0;
        for (idx, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = idx;
            }
        }
        best
    }

    pub fn predict_label(&self, features: &[f64]) -> Value {
        self.classes[Self::argmax(&self.scores(features))].clone()
    }

    /// Softmax over the decision scores, shifted by the max for stability.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let scores = self.scores(features);
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }

    /// Per-feature contribution (coefficient times feature value) for the
    /// winning class, the standard linear-model explanation.
    pub fn contributions(&self, features: &[f64]) -> (Value, Vec<f64>) {
        let winner = Self::argmax(&self.scores(features));
        let contributions = self.coefficients[winner]
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .collect();
        (self.classes[winner].clone(), contributions)
    }
}

/// Lazily-loaded handle around a [`LinearEstimator`].
///
/// The estimator slot is written exactly once. `load_lock` is held across
/// the whole check-and-load so concurrent first requests serialize; once the
/// slot is populated, readiness checks are a plain read-lock peek and the
/// estimator itself is shared read-only.
#[derive(Debug)]
pub struct LinearModel {
    name: String,
    source: String,
    estimator: RwLock<Option<Arc<LinearEstimator>>>,
    load_lock: Mutex<()>,
}

impl LinearModel {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            estimator: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Runs `init` under the load lock and installs its result, unless a
    /// racing load already did. A failed init leaves the handle unready, so
    /// the next request re-attempts the load.
    pub fn load_with(
        &self,
        init: impl FnOnce() -> Result<LinearEstimator, ServiceError>,
    ) -> Result<(), ServiceError> {
        let _guard = self.load_lock.lock();
        if self.estimator.read().is_some() {
            return Ok(());
        }
        let estimator = init()?;
        estimator.check_consistent()?;
        // Ready becomes observable only after the estimator is complete.
        *self.estimator.write() = Some(Arc::new(estimator));
        tracing::info!(model = %self.name, "model loaded");
        Ok(())
    }

    fn estimator(&self) -> Result<Arc<LinearEstimator>, ServiceError> {
        self.estimator.read().clone().ok_or_else(|| {
            ServiceError::Other(format!("model {} invoked before load", self.name))
        })
    }

    /// Extracts `instances` and parses each entry into a feature vector.
    /// A missing field is an internal-kind failure (the detail stays in the
    /// logs); a malformed instance is a caller-induced value error.
    fn parse_instances(
        &self,
        payload: &Value,
        estimator: &LinearEstimator,
    ) -> Result<Vec<Vec<f64>>, ServiceError> {
        let instances = payload.get("instances").ok_or_else(|| {
            ServiceError::Inference {
                detail: format!("request for model {} has no \"instances\" field", self.name),
            }
        })?;
        let instances = instances
            .as_array()
            .ok_or(ServiceError::InstancesNotAList)?;

        let expected = estimator.num_features();
        instances
            .iter()
            .enumerate()
            .map(|(idx, instance)| {
                let row = instance.as_array().ok_or_else(|| {
                    ServiceError::BadInput(format!(
                        "instance {idx} must be a list of numbers"
                    ))
                })?;
                if row.len() != expected {
                    return Err(ServiceError::BadInput(format!(
                        "instance {idx} has {} features, expected {expected}",
                        row.len()
                    )));
                }
                row.iter()
                    .map(|v| {
                        v.as_f64().ok_or_else(|| {
                            ServiceError::BadInput(format!(
                                "instance {idx} contains a non-numeric value"
                            ))
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

impl Model for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn ready(&self) -> bool {
        self.estimator.read().is_some()
    }

    fn load(&self) -> Result<(), ServiceError> {
        self.load_with(|| {
            let dir = storage::download(&self.source)?;
            loader::load_estimator(&dir)
        })
    }

    fn predict(&self, payload: &Value) -> Result<Value, ServiceError> {
        let estimator = self.estimator()?;
        let rows = self.parse_instances(payload, &estimator)?;
        let probabilities = payload
            .get("probabilities")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let predictions: Vec<Value> = rows
            .iter()
            .map(|features| {
                if probabilities {
                    json!(estimator.predict_proba(features))
                } else {
                    estimator.predict_label(features)
                }
            })
            .collect();

        Ok(json!({ "predictions": predictions }))
    }

    fn explain(&self, payload: &Value) -> Result<Value, ServiceError> {
        let estimator = self.estimator()?;
        let rows = self.parse_instances(payload, &estimator)?;

        let explanations: Vec<Value> = rows
            .iter()
            .map(|features| {
                let (label, contributions) = estimator.contributions(features);
                json!({ "label": label, "contributions": contributions })
            })
            .collect();

        Ok(json!({ "explanations": explanations }))
    }
}
