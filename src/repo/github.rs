//! GitHub REST API repository proxy
//!
//! Directory listings and file reads use the contents API, file writes use
//! the contents API with a sha lookup, branches use git refs, and pull
//! requests use the pulls API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::{Value, json};

use super::{DirEntry, RepositoryError, RepositoryFactory, RepositoryProxy};
use crate::domain::RepoRef;

/// Default GitHub API base URL
pub const GITHUB_API_BASE: &str = "https://api.github.com";

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Repository proxy backed by the GitHub REST API
pub struct GitHubRepository {
    http: Client,
    api_base: String,
    repo: RepoRef,
}

impl GitHubRepository {
    pub fn new(
        api_base: impl Into<String>,
        token: &str,
        repo: RepoRef,
        timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("aidev"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(GITHUB_API_VERSION));
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header)
                .map_err(|e| RepositoryError::InvalidRequest(format!("invalid GitHub token header: {}", e)))?,
        );

        let http = Client::builder().default_headers(headers).timeout(timeout).build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// `{api}/repos/{owner}/{name}` followed by `segments`
    fn repo_url(&self, segments: &[&str]) -> Result<Url, RepositoryError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| RepositoryError::InvalidRequest(format!("bad API base '{}': {}", self.api_base, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RepositoryError::InvalidRequest(format!("API base '{}' cannot be a base", self.api_base)))?;
            path.pop_if_empty();
            path.extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()]);
            path.extend(segments.iter().filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    /// Contents API URL for `path` at `branch`
    fn contents_url(&self, branch: &str, path: &str) -> Result<Url, RepositoryError> {
        let mut segments = vec!["contents"];
        segments.extend(path.split('/'));
        let mut url = self.repo_url(&segments)?;
        url.query_pairs_mut().append_pair("ref", branch);
        Ok(url)
    }

    /// Git ref URL for a branch; slashes in the name stay path separators
    fn branch_ref_url(&self, branch: &str) -> Result<Url, RepositoryError> {
        let mut segments = vec!["git", "ref", "heads"];
        segments.extend(branch.split('/'));
        self.repo_url(&segments)
    }

    /// Send a request and decode the JSON body, mapping failure statuses
    async fn send(&self, subject: &str, request: RequestBuilder) -> Result<Value, RepositoryError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, subject, &body));
        }

        Ok(response.json().await?)
    }

    /// Fetch raw file bytes, used when the contents API omits large content
    async fn fetch_raw(&self, branch: &str, path: &str) -> Result<Vec<u8>, RepositoryError> {
        let request = self
            .http
            .get(self.contents_url(branch, path)?)
            .header(ACCEPT, "application/vnd.github.raw");
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, path, &body));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Blob sha of an existing file, `None` when the file does not exist yet
    async fn file_sha(&self, branch: &str, path: &str) -> Result<Option<String>, RepositoryError> {
        let url = self.contents_url(branch, path)?;
        match self.send(path, self.http.get(url)).await {
            Ok(body) => Ok(body["sha"].as_str().map(String::from)),
            Err(RepositoryError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RepositoryProxy for GitHubRepository {
    async fn default_branch(&self) -> Result<String, RepositoryError> {
        let body = self.send(&self.repo.to_string(), self.http.get(self.repo_url(&[])?)).await?;
        body["default_branch"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| RepositoryError::Api {
                status: 200,
                message: "repository response has no default_branch".to_string(),
            })
    }

    async fn create_branch(&self, base: &str, branch: &str) -> Result<(), RepositoryError> {
        let ref_url = self.branch_ref_url(base)?;
        let base_ref = self.send(base, self.http.get(ref_url)).await?;
        let sha = base_ref["object"]["sha"].as_str().ok_or_else(|| RepositoryError::Api {
            status: 200,
            message: format!("ref for '{}' has no sha", base),
        })?;

        let payload = json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha
        });
        self.send(branch, self.http.post(self.repo_url(&["git", "refs"])?).json(&payload))
            .await?;
        debug!("Created branch {} from {} at {} in {}", branch, base, sha, self.repo);
        Ok(())
    }

    async fn get_directory(&self, branch: &str, path: &str) -> Result<Vec<DirEntry>, RepositoryError> {
        let body = self.send(path, self.http.get(self.contents_url(branch, path)?)).await?;
        parse_directory(&body, path)
    }

    async fn read_file(&self, branch: &str, path: &str) -> Result<String, RepositoryError> {
        let body = self.send(path, self.http.get(self.contents_url(branch, path)?)).await?;
        match decode_file(&body, path) {
            Err(RepositoryError::TooLarge { path: large, size }) => {
                debug!("{} is {} bytes, fetching raw content", large, size);
                match self.fetch_raw(branch, path).await {
                    Ok(bytes) => text_from_bytes(bytes, path),
                    Err(e) => {
                        debug!("Raw fetch of {} failed: {}", path, e);
                        Err(RepositoryError::TooLarge { path: large, size })
                    }
                }
            }
            other => other,
        }
    }

    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, RepositoryError> {
        let sha = self.file_sha(branch, path).await?;

        let mut payload = json!({
            "message": message,
            "content": STANDARD.encode(content.as_bytes()),
            "branch": branch
        });
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }

        let mut segments = vec!["contents"];
        segments.extend(path.split('/'));
        let url = self.repo_url(&segments)?;

        let body = self.send(path, self.http.put(url).json(&payload)).await?;
        Ok(body["commit"]["sha"].as_str().unwrap_or_default().to_string())
    }

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RepositoryError> {
        let payload = json!({
            "title": title,
            "head": head,
            "base": base,
            "body": body
        });
        let response = self
            .send(head, self.http.post(self.repo_url(&["pulls"])?).json(&payload))
            .await?;
        response["html_url"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| RepositoryError::Api {
                status: 200,
                message: "pull request response has no html_url".to_string(),
            })
    }
}

/// Opens `GitHubRepository` proxies sharing one token and API base
pub struct GitHubRepositoryFactory {
    api_base: String,
    token: String,
    timeout: Duration,
}

impl GitHubRepositoryFactory {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            token: token.into(),
            timeout,
        }
    }
}

impl RepositoryFactory for GitHubRepositoryFactory {
    fn open(&self, repo: &RepoRef) -> Result<Arc<dyn RepositoryProxy>, RepositoryError> {
        let proxy = GitHubRepository::new(self.api_base.clone(), &self.token, repo.clone(), self.timeout)?;
        Ok(Arc::new(proxy))
    }
}

impl std::fmt::Debug for GitHubRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepository")
            .field("api_base", &self.api_base)
            .field("repo", &self.repo)
            .finish()
    }
}

/// Map a failure status to a repository error
fn classify_status(status: StatusCode, subject: &str, body: &str) -> RepositoryError {
    match status.as_u16() {
        404 => RepositoryError::NotFound {
            path: subject.to_string(),
        },
        401 | 403 => RepositoryError::Unauthorized(truncate(body, 300)),
        409 | 422 => RepositoryError::Conflict(format!("{}: {}", subject, truncate(body, 300))),
        code => RepositoryError::Api {
            status: code,
            message: truncate(body, 800),
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Directory listing from a contents API body; a file body is not a directory
fn parse_directory(body: &Value, path: &str) -> Result<Vec<DirEntry>, RepositoryError> {
    let items = body.as_array().ok_or_else(|| RepositoryError::NotFound {
        path: format!("{} (not a directory)", path),
    })?;

    Ok(items
        .iter()
        .filter_map(|item| {
            let name = item["name"].as_str()?;
            let is_dir = item["type"].as_str() == Some("dir");
            Some(DirEntry {
                name: name.to_string(),
                is_dir,
            })
        })
        .collect())
}

/// Text of a file from a contents API body
fn decode_file(body: &Value, path: &str) -> Result<String, RepositoryError> {
    if body.is_array() || body["type"].as_str() == Some("dir") {
        return Err(RepositoryError::NotFound {
            path: format!("{} (is a directory)", path),
        });
    }

    if let Some(encoding) = body["encoding"].as_str() {
        if encoding != "base64" {
            return Err(RepositoryError::TooLarge {
                path: path.to_string(),
                size: body["size"].as_u64().unwrap_or(0),
            });
        }
    }

    let encoded: String = body["content"]
        .as_str()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let bytes = STANDARD.decode(encoded).map_err(|_| RepositoryError::BinaryContent {
        path: path.to_string(),
    })?;
    text_from_bytes(bytes, path)
}

/// File bytes as text; NUL bytes or invalid UTF-8 mark a binary file
fn text_from_bytes(bytes: Vec<u8>, path: &str) -> Result<String, RepositoryError> {
    if bytes.contains(&0) {
        return Err(RepositoryError::BinaryContent {
            path: path.to_string(),
        });
    }

    String::from_utf8(bytes).map_err(|_| RepositoryError::BinaryContent {
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> GitHubRepository {
        GitHubRepository::new(
            GITHUB_API_BASE,
            "ghp_test",
            RepoRef::new("AJFrio", "Wholesale-Builder"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_contents_url() {
        let url = repo().contents_url("ai-dev-REP-1", "src/my file.rs").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/AJFrio/Wholesale-Builder/contents/src/my%20file.rs?ref=ai-dev-REP-1"
        );
    }

    #[test]
    fn test_contents_url_root() {
        let url = repo().contents_url("main", "").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/AJFrio/Wholesale-Builder/contents?ref=main"
        );
    }

    #[test]
    fn test_repo_url_segments() {
        let url = repo().repo_url(&["git", "ref", "heads", "main"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/AJFrio/Wholesale-Builder/git/ref/heads/main"
        );
    }

    #[test]
    fn test_branch_ref_url_keeps_slashes() {
        let url = repo().branch_ref_url("release/1.0").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/AJFrio/Wholesale-Builder/git/ref/heads/release/1.0"
        );
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "a.txt", ""),
            RepositoryError::NotFound { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "a.txt", "denied"),
            RepositoryError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::CONFLICT, "a.txt", "sha mismatch"),
            RepositoryError::Conflict(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "branch", "exists"),
            RepositoryError::Conflict(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "a.txt", "oops"),
            RepositoryError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_parse_directory() {
        let body = json!([
            {"name": "README.md", "type": "file"},
            {"name": "src", "type": "dir"}
        ]);
        let entries = parse_directory(&body, "").unwrap();
        assert_eq!(entries, vec![DirEntry::file("README.md"), DirEntry::dir("src")]);
    }

    #[test]
    fn test_parse_directory_on_file() {
        let body = json!({"name": "README.md", "type": "file", "content": ""});
        assert!(matches!(
            parse_directory(&body, "README.md"),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_decode_file_with_line_breaks() {
        let encoded = STANDARD.encode("hello\nworld\n");
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        let body = json!({"type": "file", "encoding": "base64", "content": wrapped});
        assert_eq!(decode_file(&body, "a.txt").unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_decode_file_without_inline_content() {
        let body = json!({"type": "file", "encoding": "none", "size": 2500000, "content": ""});
        match decode_file(&body, "assets/data.json") {
            Err(RepositoryError::TooLarge { path, size }) => {
                assert_eq!(path, "assets/data.json");
                assert_eq!(size, 2_500_000);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_text_from_raw_bytes() {
        assert_eq!(text_from_bytes(b"{\"a\": 1}".to_vec(), "a.json").unwrap(), "{\"a\": 1}");
        assert!(matches!(
            text_from_bytes(vec![0x00, 0x01], "a.bin"),
            Err(RepositoryError::BinaryContent { .. })
        ));
    }

    #[test]
    fn test_decode_binary_file() {
        let body = json!({"type": "file", "content": STANDARD.encode([0x89u8, 0x50, 0x00, 0xff])});
        assert!(matches!(
            decode_file(&body, "logo.png"),
            Err(RepositoryError::BinaryContent { .. })
        ));
    }

    #[test]
    fn test_decode_directory_is_not_a_file() {
        assert!(matches!(
            decode_file(&json!([]), "src"),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn test_debug_hides_token() {
        let debug_str = format!("{:?}", repo());
        assert!(!debug_str.contains("ghp_test"));
    }
}
