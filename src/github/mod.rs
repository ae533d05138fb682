//! GitHub integration
//!
//! Provides:
//! - Run context from the Actions environment
//! - Comment lookup, creation and update

mod comments;
mod context;

pub use comments::*;
pub use context::*;

use anyhow::Result;

/// Publish `body` wherever the run context points
pub async fn publish_report(
    client: &GithubClient,
    context: &RunContext,
    identity: &CommentIdentity,
    body: &str,
) -> Result<Option<PublishOutcome>> {
    match &context.target {
        Target::PullRequest { number } => {
            let outcome = client.upsert_pull_request_comment(*number, identity, body).await?;
            Ok(Some(outcome))
        }
        Target::Commit { sha } => {
            let id = client.create_commit_comment(sha, body).await?;
            Ok(Some(PublishOutcome::Created { id }))
        }
        Target::Unsupported { event } => {
            tracing::info!(event = %event, "event has no comment target, nothing published");
            Ok(None)
        }
    }
}
