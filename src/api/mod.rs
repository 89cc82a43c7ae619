//! Gemini web service client and types.
//!
//! This module provides the interface for communicating with the Gemini
//! REST API: projects, issues and the configured issue statuses.

pub mod auth;
mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use auth::Auth;
pub use client::GeminiClient;
pub(crate) use client::base_url_with_slash;
pub use error::{ApiError, Result};
pub use types::{IssueRecord, IssuesFilter, ProjectRecord, StatusRecord};

/// The remote calls the provider needs from a Gemini server.
///
/// [`GeminiClient`] implements this over HTTP.
#[async_trait]
pub trait GeminiService: Send + Sync {
    /// List every project visible to the user.
    async fn list_projects(&self) -> Result<Vec<ProjectRecord>>;

    /// List the issues matching a filter.
    async fn filtered_issues(&self, filter: &IssuesFilter) -> Result<Vec<IssueRecord>>;

    /// Fetch a single issue by its numeric ID.
    async fn get_issue(&self, issue_id: i64) -> Result<IssueRecord>;

    /// Submit a modified issue.
    ///
    /// Any JSON the server echoes back is ignored; an empty reply counts as
    /// success.
    async fn update_issue(&self, issue: &IssueRecord) -> Result<()>;

    /// List the issue statuses configured on the server.
    async fn issue_statuses(&self) -> Result<Vec<StatusRecord>>;
}
