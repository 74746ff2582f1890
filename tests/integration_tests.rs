use listing_lens::{
    build_router, AppState, Config, ModelGateway, Provider, ProviderError, MAX_ENCODED_IMAGE_CHARS,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

/// Records every call and answers with a canned reply.
struct StubGateway {
    reply: Result<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl StubGateway {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok("{}".to_string()),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelGateway for StubGateway {
    async fn invoke(
        &self,
        images: &[String],
        mime_type: &str,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((images.to_vec(), mime_type.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply.clone().map_err(ProviderError::Api)
    }
}

fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        llm_provider: Provider::Ollama,
        llm_api_url: "http://localhost:11434/api/chat".to_string(),
        llm_api_key: None,
        llm_model_name: "llava:7b".to_string(),
        llm_temperature: 0.2,
        llm_max_tokens: 1200,
        request_timeout_seconds: 60,
        max_images: 4,
        default_mime_type: "image/jpeg".to_string(),
    }
}

fn create_test_app(gateway: Arc<StubGateway>) -> Router {
    build_router(AppState::new(&create_test_config(), gateway))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn analyze(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(StubGateway::replying("{}"));

    let (status, body) = send(
        app,
        Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["provider"], "ollama");
    assert_eq!(body["model"], "llava:7b");
    assert_eq!(body["max_images"], 4);
}

#[tokio::test]
async fn test_unknown_endpoint() {
    let app = create_test_app(StubGateway::replying("{}"));

    let (status, body) = send(
        app,
        Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "endpoint not found");
}

#[tokio::test]
async fn test_analyze_fenced_reply() {
    let reply = "```json\n{\"vehicle_title\":\"2019 Toyota Hilux\",\"lens_score\":85,\"summary\":\"Solid truck.\",\"market_value_estimate\":\"$28k-$33k\",\"red_flags\":[],\"questions_to_ask\":[\"Any accidents?\"]}\n```";
    let gateway = StubGateway::replying(reply);
    let app = create_test_app(gateway.clone());

    let (status, body) = send(app, analyze(json!({ "images": ["AAAA", "BBBB"] }))).await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["vehicle_title"], "2019 Toyota Hilux");
    assert_eq!(data["lens_score"], 85);
    assert_eq!(data["market_value_estimate"], "$28k-$33k");
    assert_eq!(data["red_flags"], json!([]));
    let questions = data["questions_to_ask"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    assert_eq!(questions[0], "Any accidents?");

    let calls = gateway.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, vec!["AAAA", "BBBB"]);
    assert_eq!(calls[0].1, "image/jpeg");
}

#[tokio::test]
async fn test_analyze_prose_reply_uses_defaults() {
    let app = create_test_app(StubGateway::replying(
        r#"Here you go: {"lens_score": "N/A"} Thanks!"#,
    ));

    let request = analyze(json!({ "image": "AAAA", "mimeType": "image/png" }));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vehicle_title"], "Unknown Vehicle");
    assert_eq!(body["data"]["lens_score"], 50);
    assert_eq!(body["data"]["summary"], "No summary returned.");
    assert_eq!(body["data"]["market_value_estimate"], "Unknown");
    assert_eq!(
        body["data"]["questions_to_ask"].as_array().unwrap().len(),
        3
    );
}

#[tokio::test]
async fn test_analyze_passes_mime_type() {
    let gateway = StubGateway::replying("{}");
    let app = create_test_app(gateway.clone());

    let request = analyze(json!({ "image": "AAAA", "mimeType": "image/png" }));
    let (status, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(gateway.calls.lock().unwrap()[0].1, "image/png");
}

#[tokio::test]
async fn test_analyze_unparseable_reply() {
    let app = create_test_app(StubGateway::replying("No JSON here at all."));

    let (status, body) = send(app, analyze(json!({ "image": "AAAA" }))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "could not parse model output");
    assert_eq!(body["raw"], "No JSON here at all.");
}

#[tokio::test]
async fn test_analyze_raw_preview_is_bounded() {
    let app = create_test_app(StubGateway::replying(&"x".repeat(5000)));

    let (status, body) = send(app, analyze(json!({ "image": "AAAA" }))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["raw"].as_str().unwrap().len(), 2000);
}

#[tokio::test]
async fn test_analyze_provider_failure() {
    let app = create_test_app(StubGateway::failing("invalid api key"));

    let (status, body) = send(app, analyze(json!({ "image": "AAAA" }))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "model provider error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("invalid api key"));
    assert!(body.get("raw").is_none());
}

#[tokio::test]
async fn test_analyze_gateway_timeout() {
    let gateway = StubGateway::slow(Duration::from_secs(5));
    let config = Config {
        request_timeout_seconds: 1,
        ..create_test_config()
    };
    let app = build_router(AppState::new(&config, gateway));

    let (status, body) = send(app, analyze(json!({ "image": "AAAA" }))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "model provider timed out");
}

#[tokio::test]
async fn test_too_many_images_never_reach_gateway() {
    let gateway = StubGateway::replying("{}");
    let app = create_test_app(gateway.clone());

    let (status, body) = send(
        app,
        analyze(json!({ "images": ["A", "B", "C", "D", "E"] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too many images"));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_inputs_never_reach_gateway() {
    let gateway = StubGateway::replying("{}");

    let bodies = [
        json!({}),
        json!({ "images": [] }),
        json!({ "images": ["AAAA", 7] }),
        json!({ "images": "AAAA" }),
        json!({ "image": "A".repeat(MAX_ENCODED_IMAGE_CHARS + 1) }),
    ];

    for body in bodies {
        let app = create_test_app(gateway.clone());
        let (status, response) = send(app, analyze(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["error"].is_string());
    }

    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_single_image_policy() {
    let gateway = StubGateway::replying("{}");
    let config = Config {
        max_images: 1,
        ..create_test_config()
    };
    let app = build_router(AppState::new(&config, gateway.clone()));

    let (status, _) = send(app.clone(), analyze(json!({ "images": ["A", "B"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app, analyze(json!({ "image": "A" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn test_malformed_body() {
    let gateway = StubGateway::replying("{}");
    let app = create_test_app(gateway.clone());

    let (status, body) = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{\"images\": [\"AAAA\""))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("malformed request body"));
    assert_eq!(gateway.call_count(), 0);
}
