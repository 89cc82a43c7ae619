//! Gemini service request and response types.
//!
//! Field names follow the PascalCase entity names the Gemini web services
//! return (`IssueKey`, `ProjectID`, ...).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel meaning "any value" in an issues filter.
pub const ANY: i64 = -1;

/// A Gemini project.
///
/// Returned by `GET api/projects.ashx/projects`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectRecord {
    /// The numeric project ID.
    #[serde(rename = "ProjectID")]
    pub project_id: i64,
    /// The project display name.
    #[serde(rename = "ProjectName")]
    pub project_name: String,
    /// The short project code used as the issue key prefix.
    #[serde(rename = "ProjectCode", default)]
    pub project_code: Option<String>,
}

impl fmt::Display for ProjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.project_name)
    }
}

/// A Gemini issue.
///
/// Returned by `GET api/issues.ashx/issues/{id}` and the filtered issue list,
/// and sent back whole by `PUT api/issues.ashx/issues`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueRecord {
    /// The numeric issue ID.
    #[serde(rename = "IssueID")]
    pub issue_id: i64,
    /// The issue key (e.g., "PROJ-42").
    #[serde(rename = "IssueKey")]
    pub issue_key: String,
    /// The ID of the issue's current status.
    #[serde(rename = "IssueStatus")]
    pub issue_status: i64,
    /// The current status description (e.g., "Open").
    #[serde(rename = "IssueStatusDesc", default)]
    pub issue_status_desc: String,
    /// The one-line summary.
    #[serde(rename = "IssueSummary", default)]
    pub issue_summary: String,
    /// The long description, usually HTML.
    #[serde(rename = "IssueLongDesc", default)]
    pub issue_long_desc: Option<String>,
    /// The version the issue is fixed in.
    #[serde(rename = "FixedInVersionNumber", default)]
    pub fixed_in_version_number: Option<String>,
    /// When the issue was closed; `0001-01-01T00:00:00` or null when open.
    ///
    /// Values that cannot be read as a date decode as `None` and are left
    /// out of update bodies.
    #[serde(
        rename = "ClosedDate",
        default,
        deserialize_with = "deserialize_gemini_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub closed_date: Option<NaiveDateTime>,
    /// The owning project.
    #[serde(rename = "ProjectID", default)]
    pub project_id: i64,
    /// Fields this client does not model, kept so updates round-trip them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl IssueRecord {
    /// Whether the closed date holds a real value rather than the unset default.
    pub fn is_closed(&self) -> bool {
        self.closed_date.is_some_and(|date| !is_unset_date(&date))
    }
}

impl fmt::Display for IssueRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.issue_key, self.issue_summary)
    }
}

/// The unset date value is midnight on 0001-01-01.
fn is_unset_date(date: &NaiveDateTime) -> bool {
    date.year() == 1
        && date.ordinal() == 1
        && date.num_seconds_from_midnight() == 0
        && date.nanosecond() == 0
}

/// Read a date the way ASP.NET services write them.
///
/// Accepts RFC 3339 (`Z` or an offset), zone-less ISO 8601 and the
/// `/Date(ms)/` form. Offsets are dropped so the unset default is recognized
/// whatever zone it was written in. Anything else reads as `None`.
fn deserialize_gemini_date<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|v| v.as_str()).and_then(parse_gemini_date))
}

fn parse_gemini_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Some(inner) = raw
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
    {
        // "/Date(1300094813000+0100)/": the offset is informational
        let end = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map_or(inner.len(), |(i, _)| i);
        let millis: i64 = inner[..end].parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|date| date.naive_utc());
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.naive_local());
    }

    raw.parse::<NaiveDateTime>().ok()
}

/// An issue status configured in Gemini.
///
/// Returned by `GET api/admin.ashx/issuestatus`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRecord {
    /// The status ID.
    #[serde(rename = "StatusID")]
    pub status_id: i64,
    /// The status name (e.g., "Open", "Closed").
    #[serde(rename = "Description")]
    pub description: String,
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Filter body for `POST api/issues.ashx/issues/filtered`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuesFilter {
    /// Pipe-separated project IDs.
    #[serde(rename = "ProjectIds")]
    pub project_ids: String,
    /// Pipe-separated status IDs, or "-1" for any status.
    #[serde(rename = "StatusIds")]
    pub status_ids: String,
    /// Restrict to a user's issues, or -1 for any user.
    #[serde(rename = "UserId")]
    pub user_id: i64,
}

impl IssuesFilter {
    /// A filter matching every issue of a single project.
    pub fn for_project(project_id: i64) -> Self {
        Self {
            project_ids: project_id.to_string(),
            status_ids: ANY.to_string(),
            user_id: ANY,
        }
    }
}
