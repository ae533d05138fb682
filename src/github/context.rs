//! GitHub Actions run context
//!
//! Reads the event name and payload the runner exposes through the
//! environment and turns them into explicit run metadata.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Where the report should be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Issue comment on a pull request
    PullRequest { number: u64 },
    /// Comment attached to a pushed commit
    Commit { sha: String },
    /// Event we do not publish for
    Unsupported { event: String },
}

/// Metadata for the current workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub event_name: String,
    /// `owner/name`
    pub repository: String,
    pub commit: Option<String>,
    pub head: Option<String>,
    pub base: Option<String>,
    pub workspace: Option<String>,
    pub target: Target,
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    #[serde(default)]
    repository: Option<RepositoryPayload>,
    #[serde(default)]
    pull_request: Option<PullRequestPayload>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    head: BranchPayload,
    base: BranchPayload,
}

#[derive(Debug, Deserialize)]
struct BranchPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

impl RunContext {
    /// Build the context from the process environment
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build the context from an explicit variable set
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let event_name = vars
            .get("GITHUB_EVENT_NAME")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("GITHUB_EVENT_NAME not set"))?;

        let payload = match vars.get("GITHUB_EVENT_PATH") {
            Some(path) => load_payload(Path::new(path))?,
            None => EventPayload::default(),
        };

        Self::from_payload(event_name, payload, vars)
    }

    fn from_payload(
        event_name: String,
        payload: EventPayload,
        vars: &HashMap<String, String>,
    ) -> Result<Self> {
        let repository = payload
            .repository
            .map(|r| r.full_name)
            .or_else(|| vars.get("GITHUB_REPOSITORY").cloned())
            .ok_or_else(|| anyhow::anyhow!("GITHUB_REPOSITORY not set"))?;

        let workspace = vars.get("GITHUB_WORKSPACE").cloned();

        let context = match event_name.as_str() {
            "pull_request" | "pull_request_target" => {
                let pr = payload
                    .pull_request
                    .ok_or_else(|| anyhow::anyhow!("Event payload has no pull_request"))?;
                RunContext {
                    event_name,
                    repository,
                    commit: Some(pr.head.sha),
                    head: Some(pr.head.ref_name),
                    base: Some(pr.base.ref_name),
                    workspace,
                    target: Target::PullRequest { number: pr.number },
                }
            }
            "push" => {
                let sha = payload
                    .after
                    .or_else(|| vars.get("GITHUB_SHA").cloned())
                    .ok_or_else(|| anyhow::anyhow!("Commit SHA not found"))?;
                RunContext {
                    event_name,
                    repository,
                    commit: Some(sha.clone()),
                    head: vars.get("GITHUB_REF").cloned(),
                    base: None,
                    workspace,
                    target: Target::Commit { sha },
                }
            }
            _ => RunContext {
                target: Target::Unsupported {
                    event: event_name.clone(),
                },
                event_name,
                repository,
                commit: vars.get("GITHUB_SHA").cloned(),
                head: vars.get("GITHUB_REF").cloned(),
                base: None,
                workspace,
            },
        };

        Ok(context)
    }

    /// `(owner, name)`
    pub fn owner_and_repo(&self) -> Result<(&str, &str)> {
        self.repository
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Invalid repository name: {}", self.repository))
    }
}

fn load_payload(path: &Path) -> Result<EventPayload> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse event payload: {}", path.display()))
}
