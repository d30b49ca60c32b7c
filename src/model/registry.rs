use std::{collections::HashMap, sync::Arc};

use serde_json::Value;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::linear::LinearModel,
};

/// Capability set shared by every servable model. One adapter per ML
/// library; the dispatcher only ever sees this trait.
///
/// `load`, `predict` and `explain` are synchronous, potentially blocking
/// calls; the dispatcher runs them on a blocking task.
pub trait Model: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// `true` only once the internal estimator is fully initialized.
    fn ready(&self) -> bool;

    /// Resolves and deserializes the artifact. Must be idempotent and safe
    /// under concurrent first access: at most one load runs per model.
    fn load(&self) -> Result<(), ServiceError>;

    /// Converts the decoded request into the model's native shape. Identity
    /// by default.
    fn preprocess(&self, payload: Value) -> Value {
        payload
    }

    fn predict(&self, payload: &Value) -> Result<Value, ServiceError>;

    fn explain(&self, payload: &Value) -> Result<Value, ServiceError>;

    /// Converts the inference result into the final response shape. Identity
    /// by default.
    fn postprocess(&self, response: Value) -> Value {
        response
    }
}

pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn Model>>,
}

impl ModelRegistry {
    /// Builds one unready handle per configured model. No artifact is
    /// touched here; deserialization is deferred to first use so a registry
    /// holding many names does not pay for models never requested.
    pub fn from_config(config: &AppConfig) -> Self {
        let models = config
            .models
            .iter()
            .map(|m| {
                Arc::new(LinearModel::new(&m.name, &m.source)) as Arc<dyn Model>
            })
            .collect();
        Self::from_models(models)
    }

    pub fn from_models(models: Vec<Arc<dyn Model>>) -> Self {
        let models = models
            .into_iter()
            .map(|m| (m.name().to_string(), m))
            .collect();
        Self { models }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Model>, ServiceError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::ModelNotFound(name.to_string()))
    }

    /// Triggers the lazy load on first use. Load failures propagate
    /// unmapped; translating them is the caller's concern.
    pub fn ensure_ready(&self, model: &dyn Model) -> Result<(), ServiceError> {
        if !model.ready() {
            model.load()?;
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    /// Counts load calls; ready flips only after the configured delay so
    /// racing first requests actually overlap inside `load`.
    #[derive(Debug)]
    struct CountingModel {
        name: String,
        loads: AtomicUsize,
        inner: LinearModel,
    }

    impl CountingModel {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                loads: AtomicUsize::new(0),
                inner: LinearModel::new(name, "/nowhere"),
            }
        }
    }

    impl Model for CountingModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn ready(&self) -> bool {
            self.inner.ready()
        }

        fn load(&self) -> Result<(), ServiceError> {
            self.inner.load_with(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(20));
                Ok(crate::model::linear::LinearEstimator {
                    coefficients: vec![vec![1.0], vec![-1.0]],
                    intercepts: vec![0.0, 0.0],
                    classes: vec!["a".into(), "b".into()],
                })
            })
        }

        fn predict(&self, payload: &Value) -> Result<Value, ServiceError> {
            self.inner.predict(payload)
        }

        fn explain(&self, payload: &Value) -> Result<Value, ServiceError> {
            self.inner.explain(payload)
        }
    }

    fn registry_with(model: Arc<dyn Model>) -> ModelRegistry {
        ModelRegistry::from_models(vec![model])
    }

    #[test]
    fn resolve_unknown_name_is_not_found() {
        let registry = registry_with(Arc::new(CountingModel::new("known")));
        let err = registry.resolve("ghost").unwrap_err();
        assert_eq!(err.to_string(), "Model with name ghost does not exist.");
    }

    #[test]
    fn resolve_does_not_load() {
        let model = Arc::new(CountingModel::new("m"));
        let registry = registry_with(model.clone());
        let handle = registry.resolve("m").unwrap();
        assert!(!handle.ready());
        assert_eq!(model.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ensure_ready_loads_exactly_once() {
        let model = Arc::new(CountingModel::new("m"));
        let registry = registry_with(model.clone());
        let handle = registry.resolve("m").unwrap();

        registry.ensure_ready(handle.as_ref()).unwrap();
        registry.ensure_ready(handle.as_ref()).unwrap();
        registry.ensure_ready(handle.as_ref()).unwrap();

        assert!(handle.ready());
        assert_eq!(model.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_access_performs_one_load() {
        let model = Arc::new(CountingModel::new("m"));
        let registry = Arc::new(registry_with(model.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let handle = registry.resolve("m").unwrap();
                    registry.ensure_ready(handle.as_ref()).unwrap();
                    assert!(handle.ready());
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(model.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn names_are_sorted() {
        let registry = ModelRegistry::from_models(vec![
            Arc::new(CountingModel::new("zeta")) as Arc<dyn Model>,
            Arc::new(CountingModel::new("alpha")) as Arc<dyn Model>,
        ]);
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }
}
