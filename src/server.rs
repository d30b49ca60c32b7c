use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::get,
};
use serde_json::Value;
use tokio::task;
use tower_http::trace::TraceLayer;

use crate::{
    error::ServiceError,
    model::{Model, ModelList, ModelRegistry, ModelStatus},
};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Predict,
    Explain,
}

pub fn build_router(registry: Arc<ModelRegistry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/health", get(health))
        .route("/v1/models", get(list_models))
        .route("/v1/models/:model", get(model_status).post(invoke_model))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList {
        models: state.registry.names(),
    })
}

async fn model_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ModelStatus>, ServiceError> {
    let model = state.registry.resolve(&name)?;
    Ok(Json(ModelStatus {
        name: name.clone(),
        ready: model.ready(),
    }))
}

/// KFServing-style verb routing: the final path segment is `{name}:predict`
/// or `{name}:explain`.
async fn invoke_model(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let (name, verb) = parse_verb(&segment)?;
    let model = state.registry.resolve(name)?;
    let registry = state.registry.clone();

    // Load and inference are blocking by contract; keep them off the
    // async workers.
    let response = task::spawn_blocking(move || run_pipeline(&registry, model, verb, &body))
        .await
        .map_err(|err| ServiceError::Other(format!("inference task failed: {err}")))??;

    Ok(Json(response))
}

fn parse_verb(segment: &str) -> Result<(&str, Verb), ServiceError> {
    let Some((name, verb)) = segment.rsplit_once(':') else {
        return Err(ServiceError::MalformedBody(format!(
            "expected {segment}:predict or {segment}:explain"
        )));
    };
    match verb {
        "predict" => Ok((name, Verb::Predict)),
        "explain" => Ok((name, Verb::Explain)),
        other => Err(ServiceError::MalformedBody(format!(
            "unknown model verb {other:?}"
        ))),
    }
}

/// The shared predict/explain pipeline: ensure-ready, decode, preprocess,
/// validate, invoke, postprocess. Each step maps its own failure kind; load
/// failures pass through untranslated and surface as internal errors.
fn run_pipeline(
    registry: &ModelRegistry,
    model: Arc<dyn Model>,
    verb: Verb,
    body: &[u8],
) -> Result<Value, ServiceError> {
    registry.ensure_ready(model.as_ref())?;

    let payload: Value = serde_json::from_slice(body)
        .map_err(|err| ServiceError::MalformedBody(err.to_string()))?;

    let request = model.preprocess(payload);
    validate(&request)?;

    let result = match verb {
        Verb::Predict => model.predict(&request)?,
        Verb::Explain => model.explain(&request)?,
    };

    Ok(model.postprocess(result))
}

/// Permissive by default: only the recognized `instances` field is
/// shape-checked; everything else passes through.
fn validate(request: &Value) -> Result<(), ServiceError> {
    if let Some(instances) = request.get("instances") {
        if !instances.is_array() {
            return Err(ServiceError::InstancesNotAList);
        }
    }
    Ok(())
}
