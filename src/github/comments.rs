//! Pull request and commit comments

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// `github-actions[bot]`
pub const DEFAULT_BOT_USER_ID: u64 = 41898282;
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Comments returned per page when listing
const PER_PAGE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CommentUser {
    pub id: u64,
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub user: Option<CommentUser>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Who wrote earlier reports and how they start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentIdentity {
    pub author_id: u64,
    pub marker: String,
}

impl CommentIdentity {
    pub fn new(author_id: u64, marker: impl Into<String>) -> Self {
        Self {
            author_id,
            marker: marker.into(),
        }
    }

    /// Whether `comment` is a report previously posted by us
    pub fn matches(&self, comment: &Comment) -> bool {
        let author = comment.user.as_ref().map(|u| u.id);
        let body = comment.body.as_deref().unwrap_or_default();
        author == Some(self.author_id) && body.starts_with(&self.marker)
    }

    /// First matching comment, in API order
    pub fn find<'c>(&self, comments: &'c [Comment]) -> Option<&'c Comment> {
        comments.iter().find(|c| self.matches(c))
    }
}

/// What publishing did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created { id: u64 },
    Updated { id: u64 },
    Unchanged { id: u64 },
}

/// What to do with an issue comment given the existing ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    Create,
    Update { id: u64 },
    Skip { id: u64 },
}

/// Update our previous comment, skip if already identical, else create
pub fn plan_comment(identity: &CommentIdentity, existing: &[Comment], body: &str) -> CommentAction {
    match identity.find(existing) {
        Some(comment) if comment.body.as_deref() == Some(body) => CommentAction::Skip { id: comment.id },
        Some(comment) => CommentAction::Update { id: comment.id },
        None => CommentAction::Create,
    }
}

/// Minimal GitHub REST client for comments
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl GithubClient {
    pub fn new(api_url: &str, token: &str, owner: &str, repo: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("lcov-reporter")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub {} failed: {} - {}", action, status, text);
        }
        Ok(response)
    }

    /// All comments on an issue or pull request
    pub async fn list_issue_comments(&self, number: u64) -> Result<Vec<Comment>> {
        let url = self.repo_url(&format!("issues/{}/comments", number));
        let mut comments = Vec::new();
        let mut page = 1;

        loop {
            tracing::debug!(number, page, "listing issue comments");
            let response = self
                .request(reqwest::Method::GET, &url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?;
            let batch: Vec<Comment> = Self::check(response, "comment listing")
                .await?
                .json()
                .await
                .context("Invalid comment list from GitHub")?;

            let done = batch.len() < PER_PAGE;
            comments.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        Ok(comments)
    }

    pub async fn create_issue_comment(&self, number: u64, body: &str) -> Result<u64> {
        let url = self.repo_url(&format!("issues/{}/comments", number));
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": body }))
            .send()
            .await?;
        let comment: Comment = Self::check(response, "comment creation").await?.json().await?;
        Ok(comment.id)
    }

    pub async fn update_issue_comment(&self, id: u64, body: &str) -> Result<u64> {
        let url = self.repo_url(&format!("issues/comments/{}", id));
        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(&json!({ "body": body }))
            .send()
            .await?;
        let comment: Comment = Self::check(response, "comment update").await?.json().await?;
        Ok(comment.id)
    }

    pub async fn create_commit_comment(&self, sha: &str, body: &str) -> Result<u64> {
        let url = self.repo_url(&format!("commits/{}/comments", sha));
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": body }))
            .send()
            .await?;
        let comment: Comment = Self::check(response, "commit comment").await?.json().await?;
        Ok(comment.id)
    }

    /// Post the report on a pull request, reusing our earlier comment when there is one
    pub async fn upsert_pull_request_comment(
        &self,
        number: u64,
        identity: &CommentIdentity,
        body: &str,
    ) -> Result<PublishOutcome> {
        let existing = self.list_issue_comments(number).await?;

        match plan_comment(identity, &existing, body) {
            CommentAction::Skip { id } => Ok(PublishOutcome::Unchanged { id }),
            CommentAction::Update { id } => {
                self.update_issue_comment(id, body).await?;
                Ok(PublishOutcome::Updated { id })
            }
            CommentAction::Create => {
                let id = self.create_issue_comment(number, body).await?;
                Ok(PublishOutcome::Created { id })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: u64, author: u64, body: &str) -> Comment {
        Comment {
            id,
            user: Some(CommentUser {
                id: author,
                login: String::new(),
            }),
            body: Some(body.to_string()),
        }
    }

    #[test]
    fn test_identity_requires_author_and_marker() {
        let identity = CommentIdentity::new(DEFAULT_BOT_USER_ID, "Coverage ");

        assert!(identity.matches(&comment(1, DEFAULT_BOT_USER_ID, "Coverage after merging")));
        assert!(!identity.matches(&comment(2, 7, "Coverage after merging")));
        assert!(!identity.matches(&comment(3, DEFAULT_BOT_USER_ID, "Nice work!")));
        assert!(!identity.matches(&Comment {
            id: 4,
            user: None,
            body: Some("Coverage x".to_string())
        }));
    }

    #[test]
    fn test_plan_comment() {
        let identity = CommentIdentity::new(99, "Coverage ");
        let existing = vec![
            comment(1, 5, "Coverage from a human"),
            comment(2, 99, "Coverage old body"),
            comment(3, 99, "Coverage newer body"),
        ];

        assert_eq!(plan_comment(&identity, &existing, "Coverage new"), CommentAction::Update { id: 2 });
        assert_eq!(plan_comment(&identity, &existing, "Coverage old body"), CommentAction::Skip { id: 2 });
        assert_eq!(plan_comment(&identity, &existing[..1], "Coverage new"), CommentAction::Create);
    }

    #[test]
    fn test_comment_deserialization() {
        let json = r#"[{"id": 10, "user": {"id": 41898282, "login": "github-actions[bot]"}, "body": "Coverage report"},
                       {"id": 11, "user": null, "body": null}]"#;
        let comments: Vec<Comment> = serde_json::from_str(json).unwrap();

        let identity = CommentIdentity::new(DEFAULT_BOT_USER_ID, "Coverage ");
        assert_eq!(identity.find(&comments).map(|c| c.id), Some(10));
    }

    #[test]
    fn test_repo_url() {
        let client = GithubClient::new("https://api.example.com/", "t", "octo", "app", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.repo_url("issues/3/comments"),
            "https://api.example.com/repos/octo/app/issues/3/comments"
        );
    }
}
