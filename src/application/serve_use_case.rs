// ============================================================
// Layer 2 — Serve Use Case
// ============================================================
// Prediction service lifecycle:
//
//   unloaded ──load(registry, name, version)──► ready
//
// Loading happens once, before the socket is bound. If the
// model cannot be resolved, or its input columns are not the
// feature record's columns in order, startup fails and the
// server never listens.
//
// Routes:
//   GET  /         → 200 {"msg": "Hello World"}
//   POST /predict  → 200 {"prediction": f64}
//                    422 {"detail": ...}  body failed validation
//                    500 {"detail": ...}  the model failed
//
// The model is shared read-only across requests through an Arc.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::feature_record::{FeatureRecord, MODEL_COLUMNS};
use crate::domain::run_record::RegistryRef;
use crate::domain::traits::{Model, ModelRegistry};
use crate::infra::tracking::FsTrackingStore;

// ─── Serve Configuration ─────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServeConfig {
    pub tracking_dir:  String,
    pub model_name:    String,
    pub model_version: u32,
    pub host:          String,
    pub port:          u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            tracking_dir:  "mlruns".to_string(),
            model_name:    "Production-model".to_string(),
            model_version: 1,
            host:          "127.0.0.1".to_string(),
            port:          8000,
        }
    }
}

impl ServeConfig {
    pub fn reference(&self) -> RegistryRef {
        RegistryRef::new(&self.model_name, self.model_version)
    }
}

// ─── API types ────────────────────────────────────────────────────────────────
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: f64,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

// ─── PredictionService ────────────────────────────────────────────────────────
/// A service in the ready state: one bound, immutable model.
#[derive(Clone)]
pub struct PredictionService {
    model:     Arc<dyn Model>,
    reference: RegistryRef,
}

impl PredictionService {
    /// Resolve `reference` and check its columns.
    pub fn load(registry: &dyn ModelRegistry, reference: RegistryRef) -> Result<Self> {
        let model = registry
            .resolve(&reference)
            .with_context(|| format!("Cannot load model {reference}"))?;

        if model.input_columns() != MODEL_COLUMNS {
            bail!(
                "{reference} expects columns {:?}, but requests supply {:?}",
                model.input_columns(),
                MODEL_COLUMNS
            );
        }

        tracing::info!("Model {} is ready", reference);
        Ok(Self { model, reference })
    }

    pub fn reference(&self) -> &RegistryRef { &self.reference }

    pub fn predict(&self, record: &FeatureRecord) -> Result<f64> {
        let prediction = self.model.predict(&record.to_frame())?;
        if !prediction.is_finite() {
            bail!("model returned a non-finite prediction ({prediction})");
        }
        Ok(prediction)
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(root))
            .route("/predict", post(predict))
            .with_state(self)
    }
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse { msg: "Hello World".to_string() })
}

async fn predict(
    State(service): State<PredictionService>,
    payload: Result<Json<FeatureRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(record) = payload.map_err(|rejection| {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        ApiError::from(rejection)
    })?;

    let prediction = service.predict(&record).map_err(|e| {
        tracing::warn!("Prediction failed: {:#}", e);
        ApiError::Prediction(e.to_string())
    })?;
    Ok(Json(PredictionResponse { prediction }))
}

// ─── ServeUseCase ─────────────────────────────────────────────────────────────
pub struct ServeUseCase {
    config: ServeConfig,
}

impl ServeUseCase {
    pub fn new(config: ServeConfig) -> Self {
        Self { config }
    }

    /// Load the model, then serve until Ctrl-C.
    pub fn execute(&self) -> Result<()> {
        let cfg     = &self.config;
        let store   = FsTrackingStore::new(&cfg.tracking_dir);
        let service = PredictionService::load(&store, cfg.reference())?;
        let addr    = format!("{}:{}", cfg.host, cfg.port);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Cannot start the async runtime")?;

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Cannot bind {addr}"))?;
            tracing::info!("Serving {} on http://{}", service.reference(), addr);
            axum::serve(listener, service.router())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_record::FeatureFrame;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Returns MedInc * 0.5 and counts calls.
    struct FakeModel {
        columns: Vec<String>,
        calls:   AtomicUsize,
        fail:    bool,
    }

    impl FakeModel {
        fn new(columns: Vec<String>, fail: bool) -> Arc<Self> {
            Arc::new(Self { columns, calls: AtomicUsize::new(0), fail })
        }
    }

    impl Model for FakeModel {
        fn input_columns(&self) -> &[String] { &self.columns }

        fn predict(&self, frame: &FeatureFrame) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("model exploded");
            }
            assert_eq!(frame.columns, self.columns);
            Ok(frame.values[0] * 0.5)
        }
    }

    struct FakeRegistry {
        model: Option<Arc<FakeModel>>,
    }

    impl ModelRegistry for FakeRegistry {
        fn resolve(&self, reference: &RegistryRef) -> Result<Arc<dyn Model>> {
            match &self.model {
                Some(m) if reference.version == 1 => Ok(m.clone()),
                _ => bail!("no such model {reference}"),
            }
        }
    }

    fn columns() -> Vec<String> { MODEL_COLUMNS.iter().map(|c| c.to_string()).collect() }

    fn service(fail: bool) -> (PredictionService, Arc<FakeModel>) {
        let model    = FakeModel::new(columns(), fail);
        let registry = FakeRegistry { model: Some(model.clone()) };
        (PredictionService::load(&registry, ServeConfig::default().reference()).unwrap(), model)
    }

    fn body() -> serde_json::Value {
        serde_json::json!({
            "medinc": 8.3252, "houseage": 41.0, "averooms": 880.0, "avebedrms": 129.0,
            "population": 322.0, "aveoccup": 126.0, "latitude": 37.88, "longitude": -122.23
        })
    }

    async fn post_json(router: Router, value: &serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status   = response.status();
        let bytes    = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_root_says_hello() {
        let (svc, _) = service(false);
        let request  = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = svc.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"msg": "Hello World"}));
    }

    #[tokio::test]
    async fn test_predict_returns_model_output() {
        let (svc, model) = service(false);
        let (status, json) = post_json(svc.router(), &body()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["prediction"].as_f64().unwrap(), 8.3252 * 0.5);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_numeric_strings_are_coerced() {
        let (svc, _) = service(false);
        let mut b = body();
        b["medinc"] = serde_json::json!("4.0");
        let (status, json) = post_json(svc.router(), &b).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["prediction"].as_f64().unwrap(), 2.0);
    }

    #[tokio::test]
    async fn test_missing_field_is_422_and_model_untouched() {
        let (svc, model) = service(false);
        let mut b = body();
        b.as_object_mut().unwrap().remove("latitude");
        let (status, json) = post_json(svc.router(), &b).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["detail"].as_str().unwrap().contains("latitude"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_numeric_field_is_422() {
        let (svc, model) = service(false);
        let mut b = body();
        b["longitude"] = serde_json::json!("not_a_float");
        let (status, json) = post_json(svc.router(), &b).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json.get("detail").is_some());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_failure_is_500() {
        let (svc, _) = service(true);
        let (status, json) = post_json(svc.router(), &body()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["detail"].as_str().unwrap().contains("model exploded"));
    }

    #[tokio::test]
    async fn test_overflowing_prediction_is_500() {
        use crate::ml::estimator::{EstimatorSpec, LinearParams};
        use crate::ml::inferencer::Inferencer;

        // y = 4 * MedInc, so a large but finite MedInc overflows.
        let x = ndarray::Array2::from_shape_fn((20, 8), |(i, j)| ((i * i * (j + 2) + i * j * j + 3 * j) % 13) as f64);
        let y = x.column(0).mapv(|v| v * 4.0);
        let fitted = EstimatorSpec::LinearRegression(LinearParams::default()).fit(x.view(), y.view()).unwrap();
        let svc = PredictionService {
            model:     Arc::new(Inferencer::new(fitted, columns()).unwrap()),
            reference: ServeConfig::default().reference(),
        };

        let mut b = body();
        b["medinc"] = serde_json::json!(1e308);
        let (status, json) = post_json(svc.router(), &b).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["detail"].as_str().unwrap().contains("non-finite"));
    }

    #[test]
    fn test_unknown_version_fails_at_startup() {
        let registry = FakeRegistry { model: Some(FakeModel::new(columns(), false)) };
        assert!(PredictionService::load(&registry, RegistryRef::new("Production-model", 2)).is_err());
        let empty = FakeRegistry { model: None };
        assert!(PredictionService::load(&empty, ServeConfig::default().reference()).is_err());
    }

    #[test]
    fn test_column_mismatch_fails_at_startup() {
        let mut reordered = columns();
        reordered.swap(6, 7);
        let registry = FakeRegistry { model: Some(FakeModel::new(reordered, false)) };
        assert!(PredictionService::load(&registry, ServeConfig::default().reference()).is_err());
    }
}
