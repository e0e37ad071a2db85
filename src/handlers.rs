use actix_cors::Cors;
use actix_web::{web, HttpResponse};
use log::{debug, warn};

use crate::artifact::ModelArtifact;
use crate::error::ApiError;
use crate::models::{HealthResponse, PatientRecord, RootResponse};

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(RootResponse {
        ok: true,
        try_paths: vec!["/health".to_string(), "/predict".to_string()],
    })
}

pub async fn health(artifact: web::Data<ModelArtifact>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        model_path: artifact.model_path().to_string(),
        features: artifact.features().to_vec(),
        versions: artifact.versions().clone(),
    })
}

pub async fn predict(
    artifact: web::Data<ModelArtifact>,
    record: web::Json<PatientRecord>,
) -> Result<HttpResponse, ApiError> {
    let record = record.into_inner();

    if let Err(e) = record.validate() {
        warn!("Rejected patient record: {}", e);
        return Err(e.into());
    }

    let result = artifact.score(&record).map_err(|e| {
        warn!("Prediction failed: {}", e);
        ApiError::from(e)
    })?;

    debug!(
        "Predicted stroke_proba={:.4} stroke_pred={}",
        result.stroke_proba, result.stroke_pred
    );

    Ok(HttpResponse::Ok().json(result))
}

/// Body extraction errors get the same `{detail}` shape as domain errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Rejected request body: {}", err);
        ApiError::Payload(err.to_string()).into()
    })
}

pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::classifier::Classifier;
    use crate::models::{ErrorBody, ScoreResult, DEFAULT_FEATURE_ORDER};

    /// Returns a fixed probability and records every row it is handed.
    struct RecordingClassifier {
        probability: f64,
        calls: Arc<AtomicUsize>,
        rows: Arc<Mutex<Vec<Vec<f32>>>>,
    }

    impl Classifier for RecordingClassifier {
        fn predict_proba(&self, row: &[f32]) -> anyhow::Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().unwrap().push(row.to_vec());
            Ok(self.probability)
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn predict_proba(&self, _row: &[f32]) -> anyhow::Result<f64> {
            anyhow::bail!("input dimension mismatch")
        }
    }

    struct Harness {
        artifact: web::Data<ModelArtifact>,
        calls: Arc<AtomicUsize>,
        rows: Arc<Mutex<Vec<Vec<f32>>>>,
    }

    fn harness(probability: f64, features: &[&str]) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let rows = Arc::new(Mutex::new(Vec::new()));
        let mut versions = Map::new();
        versions.insert("model".to_string(), json!("test-1"));

        let artifact = ModelArtifact::from_parts(
            Box::new(RecordingClassifier {
                probability,
                calls: calls.clone(),
                rows: rows.clone(),
            }),
            "models/test.json".to_string(),
            features.iter().map(|name| name.to_string()).collect(),
            versions,
        );

        Harness {
            artifact: web::Data::new(artifact),
            calls,
            rows,
        }
    }

    fn reference_patient() -> Value {
        json!({
            "gender": 1,
            "age": 67,
            "hypertension": 0,
            "heart_disease": 1,
            "work_type": 0,
            "avg_glucose_level": 228.69,
            "bmi": 36.6,
            "smoking_status": 1,
            "ever_married": 1
        })
    }

    macro_rules! app {
        ($artifact:expr) => {
            test::init_service(
                App::new()
                    .wrap(cors())
                    .app_data($artifact.clone())
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn root_lists_entry_points() {
        let h = harness(0.2, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let req = test::TestRequest::get().uri("/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["try"], json!(["/health", "/predict"]));
    }

    #[actix_rt::test]
    async fn health_reports_resolved_metadata() {
        let h = harness(0.2, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.model_path, "models/test.json");
        assert_eq!(body.features, DEFAULT_FEATURE_ORDER);
        assert_eq!(body.versions["model"], "test-1");
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn predicts_reference_patient() {
        let h = harness(0.73, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(reference_patient())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: ScoreResult = test::read_body_json(resp).await;
        assert!((0.0..=1.0).contains(&body.stroke_proba));
        assert_eq!(body.stroke_pred, 1);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[actix_rt::test]
    async fn label_below_threshold_is_zero() {
        let h = harness(0.49, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(reference_patient())
            .to_request();
        let body: ScoreResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.stroke_pred, 0);
    }

    #[actix_rt::test]
    async fn out_of_range_bmi_never_reaches_model() {
        let h = harness(0.9, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let mut patient = reference_patient();
        patient["bmi"] = json!(200);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(patient)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body.get("stroke_proba").is_none());
        assert_eq!(body["detail"], "bmi must be between 5 and 100, got 200");
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn rejects_each_documented_violation() {
        let h = harness(0.9, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        for (field, value) in [("age", json!(-1)), ("hypertension", json!(2))] {
            let mut patient = reference_patient();
            patient[field] = value;
            let req = test::TestRequest::post()
                .uri("/predict")
                .set_json(patient)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            let body: ErrorBody = test::read_body_json(resp).await;
            assert!(body.detail.starts_with(field), "{}", body.detail);
        }
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn whole_number_floats_are_accepted_for_integer_fields() {
        let h = harness(0.3, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let mut patient = reference_patient();
        patient["gender"] = json!(1.0);
        patient["ever_married"] = json!(1.0);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(patient)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let rows = h.rows.lock().unwrap();
        assert_eq!(rows[0][0], 1.0);
        assert_eq!(rows[0][8], 1.0);
    }

    #[actix_rt::test]
    async fn fractional_integer_field_is_rejected() {
        let h = harness(0.3, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let mut patient = reference_patient();
        patient["hypertension"] = json!(0.5);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(patient)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body.get("stroke_proba").is_none());
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("expected an integer, got 0.5"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn malformed_bodies_get_detail() {
        let h = harness(0.9, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let mut missing = reference_patient();
        missing.as_object_mut().unwrap().remove("bmi");
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(missing)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert!(body.detail.contains("bmi"), "{}", body.detail);

        let req = test::TestRequest::post()
            .uri("/predict")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"gender\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert!(!body.detail.is_empty());

        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn feature_order_ignores_json_key_order() {
        let h = harness(0.3, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let ordered = serde_json::to_string(&reference_patient()).unwrap();
        let shuffled = r#"{"ever_married":1,"bmi":36.6,"gender":1,"smoking_status":1,
            "work_type":0,"age":67,"avg_glucose_level":228.69,"heart_disease":1,"hypertension":0}"#;

        for body in [ordered.as_str(), shuffled] {
            let req = test::TestRequest::post()
                .uri("/predict")
                .insert_header(("content-type", "application/json"))
                .set_payload(body.to_string())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let rows = h.rows.lock().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], rows[1]);
        assert_eq!(rows[0][0], 1.0);
        assert_eq!(rows[0][1], 67.0);
        assert_eq!(rows[0][6], 36.6_f64 as f32);
    }

    #[actix_rt::test]
    async fn health_and_predict_share_artifact_order() {
        let order = ["bmi", "age", "gender"];
        let h = harness(0.3, &order);
        let app = app!(h.artifact);

        let req = test::TestRequest::get().uri("/health").to_request();
        let health: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health.features, order);

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(reference_patient())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let rows = h.rows.lock().unwrap();
        assert_eq!(rows[0], vec![36.6_f64 as f32, 67.0, 1.0]);
    }

    #[actix_rt::test]
    async fn unknown_feature_surfaces_as_client_error() {
        let h = harness(0.3, &["age", "residence_type"]);
        let app = app!(h.artifact);

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(reference_patient())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert!(body.detail.contains("residence_type"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn model_failure_is_a_client_error_with_message() {
        let artifact = web::Data::new(ModelArtifact::from_parts(
            Box::new(FailingClassifier),
            "models/broken.onnx".to_string(),
            DEFAULT_FEATURE_ORDER.iter().map(|name| name.to_string()).collect(),
            Map::new(),
        ));
        let app = app!(artifact);

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(reference_patient())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.detail, "input dimension mismatch");
    }

    #[actix_rt::test]
    async fn invalid_model_output_is_rejected() {
        let h = harness(1.7, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(reference_patient())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body.get("stroke_proba").is_none());
    }

    #[actix_rt::test]
    async fn cors_allows_any_origin() {
        let h = harness(0.3, &DEFAULT_FEATURE_ORDER);
        let app = app!(h.artifact);

        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("origin", "http://localhost:8501"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .contains_key("access-control-allow-origin"));
    }
}
