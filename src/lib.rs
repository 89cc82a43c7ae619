//! Gemini issue tracking provider.
//!
//! Lets a release host list Gemini projects, find the issues fixed in a
//! release, and update their descriptions and statuses.
//!
//! ```no_run
//! use gemini_provider::{Config, GeminiProvider, IssueTracker};
//!
//! # async fn run() -> gemini_provider::Result<()> {
//! let provider = GeminiProvider::from_config(Config::load()?);
//! provider.validate_connection().await?;
//! for issue in provider.get_issues("2.4.0").await? {
//!     println!("{} [{}]", issue, issue.status());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;

pub use config::{Config, ConnectionSettings};
pub use error::{ProviderError, Result};
pub use provider::{GeminiIssue, GeminiProject, GeminiProvider, IssueTracker};
