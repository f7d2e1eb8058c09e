//! HTTP-level tests for the scoring service client.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use qe_prefs::models::OracleError;
use qe_prefs::oracle::HealthStatus;
use qe_prefs::{CometClient, Direction, PrefsError, ScoringPipeline, ScoringTask};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const MODEL: &str = "Unbabel/wmt23-cometkiwi-da-xxl";

fn tasks() -> Vec<ScoringTask> {
    vec![
        ScoringTask::new("Hi", "Dia duit", Direction::EnGaGpt),
        ScoringTask::new("Hi", "Dia dhuit", Direction::EnGa),
    ]
}

fn client(server: &MockServer, api_key: Option<&str>) -> CometClient {
    CometClient::new(server.uri(), MODEL, api_key.map(str::to_string), 5).unwrap()
}

#[tokio::test]
async fn test_predict_sends_batch_and_parses_scores() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(header("authorization", "Bearer qe-test"))
        .and(body_partial_json(json!({
            "model": MODEL,
            "batch_size": 32,
            "data": [
                {"src": "Hi", "mt": "Dia duit", "direction": "en-ga_gpt"},
                {"src": "Hi", "mt": "Dia dhuit", "direction": "en-ga"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scores": [0.7, 0.9],
            "system_score": 0.8
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scores = client(&server, Some("qe-test"))
        .predict(&tasks(), 32)
        .await
        .unwrap();
    assert_eq!(scores.scores, vec![0.7, 0.9]);
    assert_eq!(scores.system_score, 0.8);
}

#[tokio::test]
async fn test_trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scores": [0.1, 0.2],
            "system_score": 0.15
        })))
        .mount(&server)
        .await;

    let client = CometClient::new(format!("{}/", server.uri()), MODEL, None, 5).unwrap();
    assert_eq!(client.base_url(), server.uri());
    assert!(client.predict(&tasks(), 2).await.is_ok());
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server, Some("wrong")).predict(&tasks(), 2).await.unwrap_err();
    assert!(matches!(
        err,
        PrefsError::Oracle(OracleError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn test_not_found_maps_to_model_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server, None).predict(&tasks(), 2).await.unwrap_err();
    match err {
        PrefsError::Oracle(OracleError::ModelNotFound(model)) => assert_eq!(model, MODEL),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_carries_service_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "CUDA out of memory" }
        })))
        .mount(&server)
        .await;

    let err = client(&server, None).predict(&tasks(), 2).await.unwrap_err();
    match err {
        PrefsError::Oracle(OracleError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "CUDA out of memory");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server, None).predict(&tasks(), 2).await.unwrap_err();
    assert!(matches!(
        err,
        PrefsError::Oracle(OracleError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_empty_batch_is_rejected_without_a_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, None).predict(&[], 2).await.unwrap_err();
    assert!(matches!(err, PrefsError::Oracle(OracleError::EmptyBatch)));
}

#[tokio::test]
async fn test_health_check_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let healthy = client(&server, None).health_check().await;
    assert_eq!(healthy.status, HealthStatus::Healthy);
    assert!(healthy.latency_ms.is_some());

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&down)
        .await;

    let unhealthy = client(&down, None).health_check().await;
    assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
    assert_eq!(unhealthy.error.as_deref(), Some("HTTP 503"));
}

/// Scores each task by candidate length; the second call returns 500.
struct FlakyScorer {
    calls: Arc<AtomicUsize>,
}

impl Respond for FlakyScorer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == 2 {
            return ResponseTemplate::new(500).set_body_json(json!({
                "error": { "message": "worker restarted" }
            }));
        }

        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let scores: Vec<f64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["mt"].as_str().unwrap().len() as f64 / 100.0)
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "scores": scores,
            "system_score": 0.5
        }))
    }
}

#[tokio::test]
async fn test_pipeline_over_http_skips_failed_batch() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(FlakyScorer {
            calls: calls.clone(),
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("records.jsonl");
    let output = dir.path().join("scored.jsonl");
    let records: Vec<String> = (0..3)
        .map(|i| {
            json!({
                "en": format!("en {i}"),
                "ga": format!("ga {i}"),
                "gpt_4_en": format!("gpt en {i}"),
                "gpt_4_ga": format!("gpt ga {i}"),
            })
            .to_string()
        })
        .collect();
    std::fs::write(&input, records.join("\n")).unwrap();

    let pipeline =
        ScoringPipeline::new(Arc::new(client(&server, None)), 4).with_progress(false);
    let stats = pipeline.run(&input, &output, false).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(stats.scored_tasks, 8);
    assert_eq!(stats.skipped_batches.len(), 1);
    assert_eq!(stats.skipped_batches[0].start, 4);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap().lines().count(),
        8
    );
}
