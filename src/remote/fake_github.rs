//! In-process stand-in for the GitHub repository and contents endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub const OWNER: &str = "ems";
pub const REPO: &str = "roster-data";

#[derive(Default)]
struct FakeState {
    files: HashMap<String, (String, String)>,
    next_sha: u64,
    private: bool,
    read_only: bool,
    stale_next_put: bool,
    failing_paths: Vec<String>,
    last_put_sha: HashMap<String, Option<String>>,
    last_message: Option<String>,
    last_authorization: Option<String>,
    puts: usize,
}

impl FakeState {
    fn new_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("sha-{:04}", self.next_sha)
    }
}

#[derive(Deserialize)]
struct PutBody {
    message: String,
    content: String,
    #[allow(dead_code)]
    branch: String,
    #[serde(default)]
    sha: Option<String>,
}

type Shared = Arc<Mutex<FakeState>>;

/// Running fake server.
pub struct FakeGitHub {
    pub base_url: String,
    state: Shared,
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response()
}

async fn get_repo(
    State(state): State<Shared>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    if owner != OWNER || repo != REPO {
        return not_found();
    }
    let state = state.lock().await;
    Json(json!({
        "full_name": format!("{}/{}", OWNER, REPO),
        "private": state.private,
        "default_branch": "main",
        "description": "Roster data",
    }))
    .into_response()
}

async fn get_contents(
    State(state): State<Shared>,
    Path((owner, repo, path)): Path<(String, String, String)>,
) -> Response {
    if owner != OWNER || repo != REPO {
        return not_found();
    }
    let state = state.lock().await;
    match state.files.get(&path) {
        Some((content, sha)) => {
            // GitHub wraps base64 at 60 columns.
            let wrapped: Vec<String> = content
                .as_bytes()
                .chunks(60)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect();
            Json(json!({
                "type": "file",
                "content": wrapped.join("\n"),
                "sha": sha,
            }))
            .into_response()
        }
        None => not_found(),
    }
}

async fn put_contents(
    State(state): State<Shared>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<PutBody>,
) -> Response {
    if owner != OWNER || repo != REPO {
        return not_found();
    }
    let mut state = state.lock().await;
    state.puts += 1;
    state.last_message = Some(body.message.clone());
    state.last_authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.last_put_sha.insert(path.clone(), body.sha.clone());

    if state.read_only {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Resource not accessible by personal access token" })),
        )
            .into_response();
    }
    if state.failing_paths.contains(&path) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Server Error" })),
        )
            .into_response();
    }
    if state.stale_next_put {
        state.stale_next_put = false;
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": format!("{} does not match", path) })),
        )
            .into_response();
    }

    let current_sha = state.files.get(&path).map(|(_, sha)| sha.clone());
    match (&current_sha, &body.sha) {
        (Some(_), None) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "Invalid request.\n\n\"sha\" wasn't supplied." })),
            )
                .into_response();
        }
        (Some(current), Some(sent)) if current != sent => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "message": format!("{} does not match {}", path, sent) })),
            )
                .into_response();
        }
        _ => {}
    }

    let sha = state.new_sha();
    let commit = state.new_sha();
    state.files.insert(path, (body.content, sha.clone()));

    let status = if current_sha.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (
        status,
        Json(json!({ "content": { "sha": sha }, "commit": { "sha": commit } })),
    )
        .into_response()
}

impl FakeGitHub {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));

        let app = Router::new()
            .route("/repos/{owner}/{repo}", get(get_repo))
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                get(get_contents).put(put_contents),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake GitHub");
        let addr = listener.local_addr().expect("Failed to get addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub async fn set_private(&self, private: bool) {
        self.state.lock().await.private = private;
    }

    pub async fn set_read_only(&self, read_only: bool) {
        self.state.lock().await.read_only = read_only;
    }

    pub async fn reject_next_put_as_stale(&self) {
        self.state.lock().await.stale_next_put = true;
    }

    /// Make every write to `path` fail with a server error.
    pub async fn fail_writes_to(&self, path: &str) {
        self.state.lock().await.failing_paths.push(path.to_string());
    }

    pub async fn insert_document(&self, path: &str, content: &Value) {
        let mut state = self.state.lock().await;
        let sha = state.new_sha();
        let encoded = STANDARD.encode(content.to_string());
        state.files.insert(path.to_string(), (encoded, sha));
    }

    pub async fn document(&self, path: &str) -> Option<Value> {
        let state = self.state.lock().await;
        let (encoded, _) = state.files.get(path)?;
        let bytes = STANDARD.decode(encoded).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub async fn last_put_sha(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .last_put_sha
            .get(path)
            .cloned()
            .flatten()
    }

    pub async fn last_message(&self) -> Option<String> {
        self.state.lock().await.last_message.clone()
    }

    pub async fn last_authorization(&self) -> Option<String> {
        self.state.lock().await.last_authorization.clone()
    }

    pub async fn put_count(&self) -> usize {
        self.state.lock().await.puts
    }
}
