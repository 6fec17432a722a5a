use async_trait::async_trait;
use corvus_core::{detect_language, CorvusError, InlineComment};
use corvus_tools::FileFetcher;
use serde::Deserialize;

use crate::controller::{ChangedFile, ReviewRequest};

/// GitHub pull request client for fetching diffs and posting reviews.
///
/// # Examples
///
/// ```
/// use corvus_agent::forge::parse_pr_reference;
///
/// let (owner, repo, number) = parse_pr_reference("rust-lang/rust#12345").unwrap();
/// assert_eq!(owner, "rust-lang");
/// assert_eq!(repo, "rust");
/// assert_eq!(number, 12345);
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
}

#[derive(Deserialize)]
struct PullRequestFile {
    filename: String,
    status: String,
    additions: u32,
    deletions: u32,
    patch: Option<String>,
}

impl GitHubClient {
    /// Create a client from an explicit token or the `GITHUB_TOKEN`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Config`] if no token is available, or
    /// [`CorvusError::Git`] if the client cannot be built.
    pub fn new(token: Option<&str>) -> Result<Self, CorvusError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                CorvusError::Config(
                    "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
                )
            })?,
        };

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .map_err(|e| CorvusError::Git(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::new();

        Ok(Self {
            octocrab,
            http,
            token,
        })
    }

    /// Fetch a pull request's metadata and per-file patches as a
    /// [`ReviewRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Git`] on network or API errors.
    pub async fn fetch_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<ReviewRequest, CorvusError> {
        let pr = self
            .octocrab
            .pulls(owner, repo)
            .get(pr_number)
            .await
            .map_err(|e| CorvusError::Git(format!("failed to fetch PR: {e}")))?;

        let url =
            format!("https://api.github.com/repos/{owner}/{repo}/pulls/{pr_number}/files?per_page=100");
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "corvus")
            .send()
            .await
            .map_err(|e| CorvusError::Git(format!("failed to fetch PR files: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CorvusError::Git(format!("GitHub API error {status}: {body}")));
        }

        let raw_files: Vec<PullRequestFile> = response
            .json()
            .await
            .map_err(|e| CorvusError::Git(format!("failed to parse PR files: {e}")))?;

        let files = raw_files
            .into_iter()
            .map(|f| {
                let language = detect_language(&f.filename).to_string();
                ChangedFile {
                    filename: f.filename,
                    status: f.status,
                    additions: f.additions,
                    deletions: f.deletions,
                    patch: f.patch,
                    language,
                }
            })
            .collect();

        Ok(ReviewRequest {
            pr_number,
            repository: format!("{owner}/{repo}"),
            title: pr.title.unwrap_or_default(),
            description: pr.body.unwrap_or_default(),
            files,
        })
    }

    /// Post one review: the markdown body plus the valid inline comments.
    ///
    /// Callers must pass only comments whose lines fall inside the diff —
    /// the API rejects (422) positions outside the diff context, which is
    /// why skipped comments are folded into `body` instead.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Git`] on API errors.
    pub async fn post_review(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
        comments: &[InlineComment],
    ) -> Result<(), CorvusError> {
        let review_comments: Vec<serde_json::Value> = comments
            .iter()
            .map(|c| {
                serde_json::json!({
                    "path": c.path,
                    "line": c.line,
                    "side": "RIGHT",
                    "body": c.body,
                })
            })
            .collect();

        let route = format!("/repos/{owner}/{repo}/pulls/{pr_number}/reviews");
        let payload = serde_json::json!({
            "event": "COMMENT",
            "body": body,
            "comments": review_comments,
        });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| CorvusError::Git(format!("failed to post review: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl FileFetcher for GitHubClient {
    async fn fetch(&self, repo: &str, path: &str) -> Result<String, CorvusError> {
        let url = format!("https://api.github.com/repos/{repo}/contents/{path}");
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.raw+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "corvus")
            .send()
            .await
            .map_err(|e| CorvusError::Git(format!("failed to fetch file: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CorvusError::Git(format!(
                "GitHub API error {status} fetching {path}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| CorvusError::Git(format!("failed to read file response: {e}")))
    }
}

/// Parse a PR reference string (`owner/repo#number`) into its components.
///
/// # Errors
///
/// Returns [`CorvusError::Config`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use corvus_agent::forge::parse_pr_reference;
///
/// let (owner, repo, num) = parse_pr_reference("octocat/hello-world#42").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// assert_eq!(num, 42);
/// ```
pub fn parse_pr_reference(pr_ref: &str) -> Result<(String, String, u64), CorvusError> {
    let Some((owner_repo, number_str)) = pr_ref.split_once('#') else {
        return Err(CorvusError::Config(format!(
            "invalid PR reference '{pr_ref}', expected owner/repo#number"
        )));
    };
    let Some((owner, repo)) = owner_repo.split_once('/') else {
        return Err(CorvusError::Config(format!(
            "invalid PR reference '{pr_ref}', expected owner/repo#number"
        )));
    };
    let number: u64 = number_str
        .parse()
        .map_err(|_| CorvusError::Config(format!("invalid PR number: {number_str}")))?;
    Ok((owner.to_string(), repo.to_string(), number))
}
