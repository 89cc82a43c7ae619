//! Gemini issue record as handed to the host.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::api::IssueRecord;
use crate::error::{ProviderError, Result};

/// Matches an HTML tag, including tags spanning lines.
fn html_tag_regex() -> &'static Regex {
    static HTML_TAG: OnceLock<Regex> = OnceLock::new();
    HTML_TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("HTML tag pattern is valid"))
}

/// A Gemini issue.
///
/// Built from an [`IssueRecord`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeminiIssue {
    id: String,
    status: String,
    title: String,
    description: String,
    release: String,
    is_closed: bool,
}

impl GeminiIssue {
    /// The issue key (e.g., "PROJ-42").
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The status description.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The issue summary.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The long description as plain text.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The release the issue is fixed in.
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Whether Gemini has recorded a closed date for the issue.
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// The numeric issue ID encoded in the key.
    pub fn numeric_id(&self) -> Result<i64> {
        parse_issue_id(&self.id)
    }
}

impl From<IssueRecord> for GeminiIssue {
    fn from(record: IssueRecord) -> Self {
        let is_closed = record.is_closed();
        Self {
            description: clean_description(record.issue_long_desc.as_deref().unwrap_or_default()),
            id: record.issue_key,
            status: record.issue_status_desc,
            title: record.issue_summary,
            release: record.fixed_in_version_number.unwrap_or_default(),
            is_closed,
        }
    }
}

impl fmt::Display for GeminiIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.title)
    }
}

/// Strip HTML tags from a description, then decode HTML entities.
///
/// Entities are decoded last so an escaped `&lt;b&gt;` survives as text.
pub fn clean_description(html: &str) -> String {
    let stripped = html_tag_regex().replace_all(html, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}

/// Extract the numeric issue ID from a key: the text after the last `-`.
///
/// # Errors
///
/// Returns `ProviderError::InvalidIssueId` if the key has no `-` or the
/// suffix is not an integer.
pub fn parse_issue_id(issue_key: &str) -> Result<i64> {
    let (_, suffix) = issue_key
        .rsplit_once('-')
        .ok_or_else(|| ProviderError::InvalidIssueId(issue_key.to_string()))?;

    suffix
        .trim()
        .parse::<i64>()
        .map_err(|_| ProviderError::InvalidIssueId(issue_key.to_string()))
}
