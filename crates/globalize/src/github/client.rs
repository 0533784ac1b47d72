//! GitHub REST client over reqwest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    DirEntry, EntryKind, HostingApi, HostingConnector, HostingError, NewPullRequest,
    PullRequest, RepoInfo,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_VERSION: &str = "2022-11-28";

fn create_http_client(token: Option<&SecretString>) -> Result<Client, HostingError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static("globalize"));
    headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| HostingError::Transport("token contains invalid characters".into()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .default_headers(headers)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| HostingError::Transport(format!("Failed to create HTTP client: {}", e)))
}

/// GitHub REST API client bound to one set of credentials.
pub struct GitHubClient {
    client: Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<&SecretString>) -> Result<Self, HostingError> {
        Ok(Self {
            client: create_http_client(token)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, HostingError> {
        let response = builder
            .send()
            .await
            .map_err(|e| HostingError::Transport(format!("{}: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        debug!(status = status.as_u16(), what, "GitHub request failed");

        if status.as_u16() == 404 {
            Err(HostingError::NotFound(what.to_string()))
        } else {
            Err(HostingError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, HostingError> {
        self.send(builder, what)
            .await?
            .json()
            .await
            .map_err(|e| HostingError::Decode(format!("{}: {}", what, e)))
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct UserBody {
    login: String,
}

#[derive(Deserialize)]
struct ContentBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Decodes the base64 payload of a contents API response. GitHub wraps the
/// payload at 60 columns.
fn decode_content(body: ContentBody, path: &str) -> Result<String, HostingError> {
    let content = body
        .content
        .ok_or_else(|| HostingError::Decode(format!("{} is not a file", path)))?;
    if body.encoding.as_deref().is_some_and(|e| e != "base64") {
        return Ok(content);
    }
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| HostingError::Decode(format!("{}: {}", path, e)))?;
    String::from_utf8(bytes).map_err(|e| HostingError::Decode(format!("{}: {}", path, e)))
}

fn entry_kind(kind: &str) -> EntryKind {
    match kind {
        "file" => EntryKind::File,
        "dir" => EntryKind::Dir,
        _ => EntryKind::Other,
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn get_repo(&self, owner: &str, repo: &str) -> Result<RepoInfo, HostingError> {
        let path = format!("/repos/{}/{}", owner, repo);
        self.send_json(self.request(Method::GET, &path), &path).await
    }

    async fn create_fork(&self, owner: &str, repo: &str) -> Result<RepoInfo, HostingError> {
        let path = format!("/repos/{}/{}/forks", owner, repo);
        self.send_json(
            self.request(Method::POST, &path).json(&serde_json::json!({})),
            &path,
        )
        .await
    }

    async fn current_user(&self) -> Result<String, HostingError> {
        let user: UserBody = self
            .send_json(self.request(Method::GET, "/user"), "/user")
            .await?;
        Ok(user.login)
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError> {
        let path = format!("/repos/{}/{}/pulls", owner, repo);
        self.send_json(self.request(Method::POST, &path).json(request), &path)
            .await
    }

    async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
    ) -> Result<Option<PullRequest>, HostingError> {
        let path = format!("/repos/{}/{}/pulls", owner, repo);
        let pulls: Vec<PullRequest> = self
            .send_json(
                self.request(Method::GET, &path)
                    .query(&[("head", head), ("state", "open")]),
                &path,
            )
            .await?;
        Ok(pulls.into_iter().next())
    }

    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        file: &str,
    ) -> Result<String, HostingError> {
        let path = format!("/repos/{}/{}/contents/{}", owner, repo, file);
        let body: ContentBody = self
            .send_json(self.request(Method::GET, &path), &path)
            .await?;
        decode_content(body, file)
    }

    async fn list_directory(
        &self,
        owner: &str,
        repo: &str,
        dir: &str,
    ) -> Result<Vec<DirEntry>, HostingError> {
        let path = format!(
            "/repos/{}/{}/contents/{}",
            owner,
            repo,
            dir.trim_start_matches('/')
        );
        let entries: Vec<ContentEntry> = self
            .send_json(self.request(Method::GET, &path), &path)
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| DirEntry {
                kind: entry_kind(&e.kind),
                name: e.name,
            })
            .collect())
    }
}

/// Builds [`GitHubClient`]s against a fixed API base URL.
#[derive(Debug, Clone)]
pub struct GitHubConnector {
    api_base_url: String,
}

impl GitHubConnector {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
        }
    }
}

impl Default for GitHubConnector {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl HostingConnector for GitHubConnector {
    fn connect(&self, token: Option<&SecretString>) -> Result<Arc<dyn HostingApi>, HostingError> {
        Ok(Arc::new(GitHubClient::new(&self.api_base_url, token)?))
    }
}
