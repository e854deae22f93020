//! In-process stand-in for the OpenSubtitles API used by unit tests.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::config::SubtitlesConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const API_KEY: &str = "test-key";
pub(crate) const USERNAME: &str = "user";
pub(crate) const PASSWORD: &str = "secret";
pub(crate) const LOGIN_TOKEN: &str = "login-token";
pub(crate) const INCEPTION_SRT: &str =
    "1\n00:00:01,000 --> 00:00:04,000\nWe need to go deeper.\n";

#[derive(Default)]
struct UpstreamState {
    base_url: String,
    hits: HashMap<String, usize>,
    fail_features: usize,
    stalls: HashMap<String, Duration>,
    last_authorization: Option<String>,
}

type Shared = Arc<Mutex<UpstreamState>>;

pub(crate) struct FakeUpstream {
    pub base_url: String,
    state: Shared,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state: Shared = Arc::new(Mutex::new(UpstreamState {
            base_url: base_url.clone(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/features", get(features))
            .route("/subtitles", get(subtitles))
            .route("/login", post(login))
            .route("/download", post(download))
            .route("/files/{name}", get(file))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, state }
    }

    pub fn hits(&self, route: &str) -> usize {
        self.state.lock().unwrap().hits.get(route).copied().unwrap_or(0)
    }

    pub fn fail_next_features(&self, count: usize) {
        self.state.lock().unwrap().fail_features = count;
    }

    /// Make every request to `route` wait `delay` before answering
    pub fn stall(&self, route: &str, delay: Duration) {
        self.state.lock().unwrap().stalls.insert(route.to_string(), delay);
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.state.lock().unwrap().last_authorization.clone()
    }
}

pub(crate) fn config_for(upstream: &FakeUpstream) -> SubtitlesConfig {
    SubtitlesConfig {
        base_url: upstream.base_url.clone(),
        api_key: Some(API_KEY.to_string()),
        max_retries: 2,
        retry_delay_ms: 1,
        timeout_secs: 5,
        download_timeout_secs: 5,
        ..Default::default()
    }
}

fn record(state: &Shared, route: &str, headers: &HeaderMap) -> Result<(), Response> {
    let mut guard = state.lock().unwrap();
    *guard.hits.entry(route.to_string()).or_default() += 1;

    if route != "files" {
        let key = headers.get("api-key").and_then(|v| v.to_str().ok());
        if key != Some(API_KEY) {
            return Err((StatusCode::FORBIDDEN, "missing api key").into_response());
        }
    }
    Ok(())
}

async fn maybe_stall(state: &Shared, route: &str) {
    let delay = state.lock().unwrap().stalls.get(route).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn is_known(query: &HashMap<String, String>) -> Option<&'static str> {
    match query.get("query").map(|q| q.to_lowercase()) {
        Some(q) if q == "inception" => Some("inception"),
        Some(q) if q == "amelie" => Some("amelie"),
        Some(q) if q == "lost reel" => Some("lost reel"),
        _ => None,
    }
}

async fn features(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = record(&state, "features", &headers) {
        return rejection;
    }
    maybe_stall(&state, "features").await;
    {
        let mut guard = state.lock().unwrap();
        if guard.fail_features > 0 {
            guard.fail_features -= 1;
            return (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response();
        }
    }

    let data = match is_known(&query) {
        Some(title) => json!([{
            "id": "1",
            "type": "feature",
            "attributes": {"title": title, "year": "2010", "feature_type": "Movie"}
        }]),
        None => json!([]),
    };
    Json(json!({ "data": data })).into_response()
}

async fn subtitles(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = record(&state, "subtitles", &headers) {
        return rejection;
    }

    let data = match is_known(&query) {
        Some("inception") => json!([{
            "id": "9001",
            "attributes": {"language": "en", "files": [{"file_id": 42, "file_name": "inception.srt"}]}
        }]),
        Some("amelie") => json!([{
            "id": "9002",
            "attributes": {"language": "fr", "files": [{"file_id": 43, "file_name": "amelie.srt"}]}
        }]),
        Some(_) => json!([{ "id": "not-numeric", "attributes": {"files": []} }]),
        None => json!([]),
    };
    Json(json!({ "data": data })).into_response()
}

async fn login(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = record(&state, "login", &headers) {
        return rejection;
    }

    if body["username"] == USERNAME && body["password"] == PASSWORD {
        Json(json!({ "token": LOGIN_TOKEN, "status": 200 })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "invalid credentials" }))).into_response()
    }
}

async fn download(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = record(&state, "download", &headers) {
        return rejection;
    }

    let base_url = {
        let mut guard = state.lock().unwrap();
        guard.last_authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        guard.base_url.clone()
    };

    match body["file_id"].as_u64() {
        Some(id @ (42 | 43)) => Json(json!({
            "link": format!("{}/files/{}.srt", base_url, id),
            "remaining": 99
        }))
        .into_response(),
        _ => Json(json!({ "message": "file not found" })).into_response(),
    }
}

async fn file(State(state): State<Shared>, headers: HeaderMap, Path(name): Path<String>) -> Response {
    if let Err(rejection) = record(&state, "files", &headers) {
        return rejection;
    }
    maybe_stall(&state, "files").await;

    match name.as_str() {
        "42.srt" => INCEPTION_SRT.as_bytes().to_vec().into_response(),
        // ISO-8859-1 encoded "Amélie"
        "43.srt" => vec![b'A', b'm', 0xE9, b'l', b'i', b'e'].into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
