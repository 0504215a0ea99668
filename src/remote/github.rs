//! GitHub contents API client.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::{
    Connectivity, DocumentState, DocumentStore, RemoteDocument, RemoteError,
    RepositoryMetadata, RepositoryValidation, WriteOutcome,
};
use crate::models::RepoCoordinates;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("ems-roster/", env!("CARGO_PKG_VERSION"));

/// `GET /repos/{owner}/{repo}/contents/{path}` response for a file.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: ShaRef,
    commit: ShaRef,
}

#[derive(Debug, Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    full_name: String,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubErrorBody {
    #[serde(default)]
    message: String,
}

/// Document store backed by files in a GitHub repository.
pub struct GitHubDocumentStore {
    client: Client,
    api_base: String,
    repo: RepoCoordinates,
}

impl GitHubDocumentStore {
    pub fn new(api_base: &str, repo: RepoCoordinates) -> Result<Self, RemoteError> {
        if repo.owner.is_empty() || repo.name.is_empty() {
            return Err(RemoteError::Configuration(
                "Repository owner and name are required".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
        })
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base, self.repo.owner, self.repo.name
        )
    }

    fn contents_url(&self, filename: &str) -> String {
        format!("{}/contents/{}{}", self.repo_url(), self.repo.path, filename)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, ACCEPT);
        match &self.repo.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("token {}", token)),
            None => request,
        }
    }

    async fn fetch_contents(&self, filename: &str) -> Result<Option<ContentsResponse>, RemoteError> {
        let response = self
            .authorized(self.client.get(self.contents_url(filename)))
            .query(&[("ref", self.repo.branch.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(classify_read_error(status, &body.message));
        }

        response
            .json::<ContentsResponse>()
            .await
            .map(Some)
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

async fn error_body(response: reqwest::Response) -> GitHubErrorBody {
    response.json().await.unwrap_or_default()
}

fn classify_read_error(status: StatusCode, message: &str) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => {
            RemoteError::PermissionDenied("Authentication failed. Check the access token.".into())
        }
        StatusCode::FORBIDDEN => RemoteError::PermissionDenied(format!(
            "Access forbidden. Check the token permissions. {}",
            message
        )),
        _ => RemoteError::Unexpected {
            status: status.as_u16(),
            message: message.to_string(),
        },
    }
}

/// Map a failed write. `Ok` carries the conflict branch.
fn classify_write_error(status: StatusCode, message: &str) -> Result<WriteOutcome, RemoteError> {
    match status {
        StatusCode::CONFLICT => Ok(WriteOutcome::Conflict {
            message: message.to_string(),
        }),
        StatusCode::UNPROCESSABLE_ENTITY if message.contains("sha") => Ok(WriteOutcome::Conflict {
            message: format!(
                "The document was modified by another writer. {}",
                message
            ),
        }),
        StatusCode::UNPROCESSABLE_ENTITY => Err(RemoteError::Validation(format!(
            "The document might be too large or contain invalid data. {}",
            message
        ))),
        StatusCode::UNAUTHORIZED => Err(RemoteError::PermissionDenied(
            "Authentication failed. Check the access token.".to_string(),
        )),
        StatusCode::FORBIDDEN => {
            let hint = if message.contains("Resource not accessible by personal access token") {
                "The access token does not have write permission (needs 'repo' scope)."
            } else if message.contains("Not Found") {
                "Repository not found or the token has no access to it."
            } else {
                "Access forbidden. Check the token permissions (needs 'repo' scope)."
            };
            Err(RemoteError::PermissionDenied(format!("{} {}", hint, message)))
        }
        StatusCode::NOT_FOUND => Err(RemoteError::NotFound(format!(
            "Repository or path not found. {}",
            message
        ))),
        _ => Err(RemoteError::Unexpected {
            status: status.as_u16(),
            message: message.to_string(),
        }),
    }
}

fn decode_content(encoded: &str) -> Result<serde_json::Value, RemoteError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| RemoteError::Decode(format!("Invalid base64 content: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(format!("Invalid JSON: {}", e)))
}

fn encode_content(content: &serde_json::Value) -> Result<String, RemoteError> {
    let json = serde_json::to_string_pretty(content)
        .map_err(|e| RemoteError::Validation(format!("Unencodable document: {}", e)))?;
    Ok(STANDARD.encode(json))
}

#[async_trait]
impl DocumentStore for GitHubDocumentStore {
    async fn get(&self, filename: &str) -> Result<DocumentState, RemoteError> {
        let Some(file) = self.fetch_contents(filename).await? else {
            return Ok(DocumentState::NotFound);
        };

        if file.kind != "file" {
            return Err(RemoteError::Decode(format!(
                "{} is a {}, not a file",
                filename, file.kind
            )));
        }

        let content = decode_content(file.content.as_deref().unwrap_or_default())?;
        Ok(DocumentState::Fresh(RemoteDocument {
            content,
            revision: file.sha,
        }))
    }

    async fn put(
        &self,
        filename: &str,
        content: &serde_json::Value,
        message: &str,
    ) -> Result<WriteOutcome, RemoteError> {
        let current = self.fetch_contents(filename).await?;

        let body = PutContentsRequest {
            message: format!(
                "{} - {}",
                message,
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            content: encode_content(content)?,
            branch: &self.repo.branch,
            sha: current.map(|file| file.sha),
        };

        let response = self
            .authorized(self.client.put(self.contents_url(filename)))
            .json(&body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            tracing::warn!(
                document = filename,
                status = status.as_u16(),
                "Remote write rejected: {}",
                body.message
            );
            return classify_write_error(status, &body.message);
        }

        let result: PutContentsResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        tracing::debug!(document = filename, revision = %result.content.sha, "Remote write committed");
        Ok(WriteOutcome::Committed {
            revision: result.content.sha,
            commit: result.commit.sha,
        })
    }

    async fn validate_repository(&self) -> RepositoryValidation {
        // Probe without credentials: a public repository must be visible as-is.
        let response = self
            .client
            .get(self.repo_url())
            .header(reqwest::header::ACCEPT, ACCEPT)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return RepositoryValidation::invalid(format!("Network error: {}", e)),
        };

        match response.status() {
            status if status.is_success() => match response.json::<RepositoryResponse>().await {
                Ok(repo) => RepositoryValidation {
                    valid: true,
                    reason: None,
                    repo: Some(repo.full_name),
                    is_private: repo.private,
                    default_branch: Some(repo.default_branch),
                    requires_auth_for_private: repo.private && self.repo.token.is_none(),
                },
                Err(e) => RepositoryValidation::invalid(format!("Invalid repository response: {}", e)),
            },
            StatusCode::NOT_FOUND => RepositoryValidation::invalid(format!(
                "Repository '{}' not found. Check the spelling, create it, or make sure it is public or a valid token is provided.",
                self.repo.full_name()
            )),
            StatusCode::FORBIDDEN => RepositoryValidation {
                requires_auth_for_private: true,
                ..RepositoryValidation::invalid(
                    "Access forbidden. This might be a private repository; provide an access token.",
                )
            },
            status => RepositoryValidation::invalid(format!("GitHub API error: {}", status.as_u16())),
        }
    }

    async fn test_connectivity(&self) -> Connectivity {
        let response = self
            .authorized(self.client.get(self.repo_url()))
            .query(&[("ref", self.repo.branch.as_str())])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Connectivity::unreachable(format!("Network error: {}", e)),
        };

        match response.status() {
            status if status.is_success() => match response.json::<RepositoryResponse>().await {
                Ok(repo) => Connectivity {
                    reachable: true,
                    reason: None,
                    metadata: Some(RepositoryMetadata {
                        full_name: repo.full_name,
                        default_branch: repo.default_branch,
                        is_private: repo.private,
                        description: repo.description,
                    }),
                },
                Err(e) => Connectivity::unreachable(format!("Invalid repository response: {}", e)),
            },
            StatusCode::NOT_FOUND => Connectivity::unreachable(format!(
                "Repository '{}' not found or not accessible with the configured token.",
                self.repo.full_name()
            )),
            StatusCode::FORBIDDEN => Connectivity::unreachable(
                "Access forbidden. Check the access token or repository permissions.",
            ),
            StatusCode::UNAUTHORIZED => {
                Connectivity::unreachable("Authentication failed. Check the access token.")
            }
            status => Connectivity::unreachable(format!(
                "Repository not accessible: {}",
                status.as_u16()
            )),
        }
    }
}
