//! The issue tracking provider a release host drives.
//!
//! [`IssueTracker`] is the set of operations the host calls.
//! [`GeminiProvider`] implements it by forwarding each operation to a
//! [`GeminiService`], connecting lazily on first use.

mod issue;
mod project;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::api::{self, GeminiClient, GeminiService, IssuesFilter};
use crate::config::{Config, ConnectionSettings};
use crate::error::{ProviderError, Result};

pub use issue::{clean_description, parse_issue_id, GeminiIssue};
pub use project::GeminiProject;

/// Status name used to close issues.
pub const CLOSED_STATUS: &str = "Closed";

/// Path of the issue page, relative to the server URL.
const ISSUE_URL_FORMAT: &str = "issue/ViewIssue.aspx?id=";

/// Category types the provider can filter by.
const CATEGORY_TYPE_NAMES: &[&str] = &["Project"];

/// The operations a release host performs against an issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// List the categories issues can be filtered by.
    async fn list_categories(&self) -> Result<Vec<GeminiProject>>;

    /// Get the issues fixed in a release, within the selected category.
    async fn get_issues(&self, release: &str) -> Result<Vec<GeminiIssue>>;

    /// Whether an issue is closed.
    fn is_issue_closed(&self, issue: &GeminiIssue) -> bool;

    /// Append text to an issue's description.
    async fn append_issue_description(&self, issue_id: &str, text: &str) -> Result<()>;

    /// Change an issue's status, looked up by name.
    async fn change_issue_status(&self, issue_id: &str, status_name: &str) -> Result<()>;

    /// Close an issue.
    async fn close_issue(&self, issue_id: &str) -> Result<()>;

    /// Get a browser link to an issue.
    fn get_issue_url(&self, issue: &GeminiIssue) -> Result<String>;

    /// Check that the tracker can be reached with the current settings.
    async fn validate_connection(&self) -> Result<()>;

    /// Whether the provider can be used on this machine.
    fn is_available(&self) -> bool {
        true
    }

    /// Names of the category levels, outermost first.
    fn category_type_names(&self) -> &'static [&'static str] {
        CATEGORY_TYPE_NAMES
    }

    /// Whether `append_issue_description` is supported.
    fn can_append_issue_descriptions(&self) -> bool {
        true
    }

    /// Whether `change_issue_status` is supported.
    fn can_change_issue_statuses(&self) -> bool {
        true
    }

    /// Whether `close_issue` is supported.
    fn can_close_issues(&self) -> bool {
        true
    }
}

/// Builds a service from connection settings.
pub type Connector<S> = fn(&ConnectionSettings) -> api::Result<S>;

/// Issue tracking provider for CounterSoft Gemini.
pub struct GeminiProvider<S = GeminiClient> {
    settings: ConnectionSettings,
    category_filter: Vec<String>,
    service: OnceCell<S>,
    connect: Connector<S>,
}

impl GeminiProvider<GeminiClient> {
    /// Create a provider that connects over HTTP on first use.
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_connector(settings, GeminiClient::from_settings)
    }

    /// Create a provider from a loaded configuration.
    pub fn from_config(config: Config) -> Self {
        let mut provider = Self::new(config.connection);
        provider.set_category_filter(config.category_filter);
        provider
    }
}

impl<S: GeminiService> GeminiProvider<S> {
    /// Create a provider that builds its service with `connect` on first use.
    pub fn with_connector(settings: ConnectionSettings, connect: Connector<S>) -> Self {
        Self {
            settings,
            category_filter: Vec::new(),
            service: OnceCell::new(),
            connect,
        }
    }

    /// Create a provider around an existing service.
    pub fn with_service(settings: ConnectionSettings, service: S) -> Self {
        Self {
            settings,
            category_filter: Vec::new(),
            service: OnceCell::from(service),
            connect: |_| {
                Err(api::ApiError::InvalidResponse(
                    "service already provided".to_string(),
                ))
            },
        }
    }

    /// The connection settings.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// The selected category IDs.
    pub fn category_filter(&self) -> &[String] {
        &self.category_filter
    }

    /// Select the categories `get_issues` searches. Only the first is used.
    pub fn set_category_filter(&mut self, filter: Vec<String>) {
        self.category_filter = filter;
    }

    /// Link to an issue page, built from the issue key alone.
    ///
    /// Resolved under the same base as the service calls, so a server in a
    /// virtual directory keeps it.
    pub fn issue_url(&self, issue_key: &str) -> Result<String> {
        let id = parse_issue_id(issue_key)?;
        let url = api::base_url_with_slash(&self.settings.base_url)?
            .join(&format!("{}{}", ISSUE_URL_FORMAT, id))
            .map_err(|e| api::ApiError::InvalidUrl(e.to_string()))?;
        Ok(url.to_string())
    }

    /// The service, connecting on first call.
    async fn service(&self) -> Result<&S> {
        let service = self
            .service
            .get_or_try_init(|| async {
                debug!("Connecting to {}", self.settings.base_url);
                (self.connect)(&self.settings)
            })
            .await?;
        Ok(service)
    }

    /// The selected project, if the filter holds a usable project ID.
    fn project_filter(&self) -> Option<i64> {
        let first = self.category_filter.first()?.trim();
        if first.is_empty() {
            return None;
        }

        match first.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Ignoring non-numeric project filter '{}'", first);
                None
            }
        }
    }
}

#[async_trait]
impl<S: GeminiService> IssueTracker for GeminiProvider<S> {
    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<GeminiProject>> {
        let projects = self.service().await?.list_projects().await?;
        Ok(projects.into_iter().map(GeminiProject::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_issues(&self, release: &str) -> Result<Vec<GeminiIssue>> {
        let Some(project_id) = self.project_filter() else {
            debug!("No project selected, returning no issues");
            return Ok(Vec::new());
        };

        let filter = IssuesFilter::for_project(project_id);
        let records = self.service().await?.filtered_issues(&filter).await?;

        let wanted = release.to_lowercase();
        let issues: Vec<GeminiIssue> = records
            .into_iter()
            .filter(|record| {
                record
                    .fixed_in_version_number
                    .as_deref()
                    .is_some_and(|version| version.to_lowercase() == wanted)
            })
            .map(GeminiIssue::from)
            .collect();

        info!(project_id, count = issues.len(), "Found issues for release");
        Ok(issues)
    }

    fn is_issue_closed(&self, issue: &GeminiIssue) -> bool {
        issue.is_closed()
    }

    #[instrument(skip(self, text))]
    async fn append_issue_description(&self, issue_id: &str, text: &str) -> Result<()> {
        let numeric_id = parse_issue_id(issue_id)?;
        let service = self.service().await?;

        let mut issue = service.get_issue(numeric_id).await?;
        issue
            .issue_long_desc
            .get_or_insert_with(String::new)
            .push_str(text);

        service
            .update_issue(&issue)
            .await
            .map_err(|e| ProviderError::from_update("description", e))?;

        info!("Appended {} characters to the description", text.len());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn change_issue_status(&self, issue_id: &str, status_name: &str) -> Result<()> {
        let numeric_id = parse_issue_id(issue_id)?;
        let service = self.service().await?;

        let wanted = status_name.to_lowercase();
        let statuses = service.issue_statuses().await?;
        let mut matches = statuses
            .iter()
            .filter(|status| status.description.to_lowercase() == wanted);

        let status = match (matches.next(), matches.next()) {
            (Some(status), None) => status,
            _ => return Err(ProviderError::InvalidStatus(status_name.to_string())),
        };

        let mut issue = service.get_issue(numeric_id).await?;
        issue.issue_status = status.status_id;

        service
            .update_issue(&issue)
            .await
            .map_err(|e| ProviderError::from_update("status", e))?;

        info!(status_id = status.status_id, "Changed issue status");
        Ok(())
    }

    async fn close_issue(&self, issue_id: &str) -> Result<()> {
        self.change_issue_status(issue_id, CLOSED_STATUS).await
    }

    fn get_issue_url(&self, issue: &GeminiIssue) -> Result<String> {
        self.issue_url(issue.id())
    }

    #[instrument(skip(self))]
    async fn validate_connection(&self) -> Result<()> {
        let projects = self
            .list_categories()
            .await
            .map_err(ProviderError::service_unavailable)?;
        info!("Connection validated, {} projects visible", projects.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::api::{ApiError, IssueRecord, ProjectRecord, StatusRecord};

    /// In-memory Gemini that records every call.
    #[derive(Default)]
    struct FakeGemini {
        projects: Vec<ProjectRecord>,
        issues: Vec<IssueRecord>,
        statuses: Vec<StatusRecord>,
        fail_projects: bool,
        update_error: Mutex<Option<ApiError>>,
        calls: Mutex<Vec<String>>,
        updates: Mutex<Vec<IssueRecord>>,
    }

    impl FakeGemini {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn updates(&self) -> Vec<IssueRecord> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GeminiService for FakeGemini {
        async fn list_projects(&self) -> api::Result<Vec<ProjectRecord>> {
            self.record("list_projects");
            if self.fail_projects {
                return Err(ApiError::ServerError("HTTP 503: unavailable".to_string()));
            }
            Ok(self.projects.clone())
        }

        async fn filtered_issues(&self, filter: &IssuesFilter) -> api::Result<Vec<IssueRecord>> {
            self.record(&format!("filtered_issues:{}", filter.project_ids));
            Ok(self.issues.clone())
        }

        async fn get_issue(&self, issue_id: i64) -> api::Result<IssueRecord> {
            self.record(&format!("get_issue:{}", issue_id));
            self.issues
                .iter()
                .find(|issue| issue.issue_id == issue_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("Issue {} not found", issue_id)))
        }

        async fn update_issue(&self, issue: &IssueRecord) -> api::Result<()> {
            self.record(&format!("update_issue:{}", issue.issue_id));
            if let Some(err) = self.update_error.lock().unwrap().take() {
                return Err(err);
            }
            self.updates.lock().unwrap().push(issue.clone());
            Ok(())
        }

        async fn issue_statuses(&self) -> api::Result<Vec<StatusRecord>> {
            self.record("issue_statuses");
            Ok(self.statuses.clone())
        }
    }

    fn settings() -> ConnectionSettings {
        ConnectionSettings::new("http://gemini:8080/", "build", Some("pw"))
    }

    fn issue(id: i64, version: Option<&str>, long_desc: Option<&str>) -> IssueRecord {
        IssueRecord {
            issue_id: id,
            issue_key: format!("X-{}", id),
            issue_status: 1,
            issue_status_desc: "Open".to_string(),
            issue_summary: format!("Issue {}", id),
            issue_long_desc: long_desc.map(str::to_string),
            fixed_in_version_number: version.map(str::to_string),
            closed_date: None,
            project_id: 12,
            extra: BTreeMap::new(),
        }
    }

    fn status(id: i64, description: &str) -> StatusRecord {
        StatusRecord {
            status_id: id,
            description: description.to_string(),
        }
    }

    fn provider(fake: FakeGemini) -> GeminiProvider<FakeGemini> {
        let mut provider = GeminiProvider::with_service(settings(), fake);
        provider.set_category_filter(vec!["12".to_string()]);
        provider
    }

    fn fake(provider: &GeminiProvider<FakeGemini>) -> &FakeGemini {
        provider.service.get().unwrap()
    }

    #[tokio::test]
    async fn test_get_issues_without_filter_makes_no_call() {
        let provider: GeminiProvider<FakeGemini> =
            GeminiProvider::with_connector(settings(), |_| panic!("must not connect"));

        let issues = provider.get_issues("1.0").await.unwrap();
        assert!(issues.is_empty());
        assert!(!provider.service.initialized());
    }

    #[tokio::test]
    async fn test_get_issues_with_blank_or_non_numeric_filter_is_empty() {
        let mut provider = GeminiProvider::with_service(settings(), FakeGemini::default());

        provider.set_category_filter(vec!["".to_string()]);
        assert!(provider.get_issues("1.0").await.unwrap().is_empty());

        provider.set_category_filter(vec!["web".to_string()]);
        assert!(provider.get_issues("1.0").await.unwrap().is_empty());

        assert!(fake(&provider).calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_issues_matches_release_case_insensitively() {
        let provider = provider(FakeGemini {
            issues: vec![
                issue(1, Some("1.0-Beta"), None),
                issue(2, Some("1.0-beta"), None),
                issue(3, Some("1.1"), None),
                issue(4, None, None),
            ],
            ..Default::default()
        });

        let issues = provider.get_issues("1.0-BETA").await.unwrap();
        let ids: Vec<&str> = issues.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["X-1", "X-2"]);
        assert_eq!(fake(&provider).calls(), vec!["filtered_issues:12"]);
    }

    #[tokio::test]
    async fn test_is_issue_closed_reads_record() {
        let mut closed = issue(1, Some("1.0"), None);
        closed.closed_date = "2011-03-14T09:26:53".parse().ok();
        let provider = provider(FakeGemini {
            issues: vec![closed, issue(2, Some("1.0"), None)],
            ..Default::default()
        });

        let issues = provider.get_issues("1.0").await.unwrap();
        assert!(provider.is_issue_closed(&issues[0]));
        assert!(!provider.is_issue_closed(&issues[1]));
    }

    #[tokio::test]
    async fn test_append_issue_description() {
        let provider = provider(FakeGemini {
            issues: vec![issue(42, None, Some("<p>Original</p>"))],
            ..Default::default()
        });

        provider
            .append_issue_description("X-42", " Fixed in build 17.")
            .await
            .unwrap();

        let updates = fake(&provider).updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].issue_long_desc.as_deref(),
            Some("<p>Original</p> Fixed in build 17.")
        );
    }

    #[tokio::test]
    async fn test_append_to_missing_description() {
        let provider = provider(FakeGemini {
            issues: vec![issue(42, None, None)],
            ..Default::default()
        });

        provider.append_issue_description("X-42", "note").await.unwrap();
        assert_eq!(
            fake(&provider).updates()[0].issue_long_desc.as_deref(),
            Some("note")
        );
    }

    #[tokio::test]
    async fn test_append_rejected_update() {
        let provider = provider(FakeGemini {
            issues: vec![issue(42, None, None)],
            update_error: Mutex::new(Some(ApiError::InvalidResponse(
                "expected value at line 1 column 1".to_string(),
            ))),
            ..Default::default()
        });

        let err = provider
            .append_issue_description("X-42", "note")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::UpdateRejected {
                field: "description",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_append_with_bad_key_fails_before_any_call() {
        let provider = provider(FakeGemini::default());
        let err = provider
            .append_issue_description("nodash", "note")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidIssueId(_)));
        assert!(fake(&provider).calls().is_empty());
    }

    #[tokio::test]
    async fn test_change_issue_status() {
        let provider = provider(FakeGemini {
            issues: vec![issue(7, None, None)],
            statuses: vec![status(1, "Open"), status(3, "In Progress")],
            ..Default::default()
        });

        provider.change_issue_status("X-7", "in progress").await.unwrap();

        let updates = fake(&provider).updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].issue_status, 3);
    }

    #[tokio::test]
    async fn test_change_issue_status_unknown_name() {
        let provider = provider(FakeGemini {
            issues: vec![issue(7, None, None)],
            statuses: vec![status(1, "Open")],
            ..Default::default()
        });

        let err = provider.change_issue_status("X-7", "Shipped").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidStatus(ref name) if name == "Shipped"));
        assert_eq!(fake(&provider).calls(), vec!["issue_statuses"]);
    }

    #[tokio::test]
    async fn test_change_issue_status_ambiguous_name() {
        let provider = provider(FakeGemini {
            issues: vec![issue(7, None, None)],
            statuses: vec![status(1, "Closed"), status(9, "closed")],
            ..Default::default()
        });

        let err = provider.change_issue_status("X-7", "Closed").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidStatus(_)));
        assert!(fake(&provider).updates().is_empty());
        assert!(!fake(&provider).calls().iter().any(|c| c.starts_with("update_issue")));
    }

    #[tokio::test]
    async fn test_change_issue_status_rejected_update() {
        let provider = provider(FakeGemini {
            issues: vec![issue(7, None, None)],
            statuses: vec![status(5, "Closed")],
            update_error: Mutex::new(Some(ApiError::MethodNotAllowed("HTTP 405".to_string()))),
            ..Default::default()
        });

        let err = provider.change_issue_status("X-7", "Closed").await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::UpdateRejected { field: "status", .. }
        ));
    }

    #[tokio::test]
    async fn test_change_issue_status_other_update_errors_pass_through() {
        let provider = provider(FakeGemini {
            issues: vec![issue(7, None, None)],
            statuses: vec![status(5, "Closed")],
            update_error: Mutex::new(Some(ApiError::Forbidden)),
            ..Default::default()
        });

        let err = provider.change_issue_status("X-7", "Closed").await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn test_close_issue_is_change_to_closed() {
        let fixture = || FakeGemini {
            issues: vec![issue(7, None, None)],
            statuses: vec![status(1, "Open"), status(5, "Closed")],
            ..Default::default()
        };

        let closed = provider(fixture());
        closed.close_issue("X-7").await.unwrap();

        let changed = provider(fixture());
        changed.change_issue_status("X-7", "Closed").await.unwrap();

        assert_eq!(fake(&closed).calls(), fake(&changed).calls());
        assert_eq!(fake(&closed).updates(), fake(&changed).updates());
        assert_eq!(fake(&closed).updates()[0].issue_status, 5);
    }

    #[tokio::test]
    async fn test_list_categories() {
        let provider = provider(FakeGemini {
            projects: vec![
                ProjectRecord {
                    project_id: 12,
                    project_name: "Website".to_string(),
                    project_code: None,
                },
                ProjectRecord {
                    project_id: 14,
                    project_name: "Installer".to_string(),
                    project_code: None,
                },
            ],
            ..Default::default()
        });

        let categories = provider.list_categories().await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1].id(), "14");
        assert_eq!(categories[1].name(), "Installer");
    }

    #[tokio::test]
    async fn test_validate_connection_wraps_failures() {
        let provider = provider(FakeGemini {
            fail_projects: true,
            ..Default::default()
        });

        let err = provider.validate_connection().await.unwrap_err();
        match err {
            ProviderError::ServiceUnavailable { message, .. } => {
                assert!(message.contains("HTTP 503"))
            }
            other => panic!("Expected ServiceUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_connection_wraps_connect_failures() {
        let provider: GeminiProvider<FakeGemini> = GeminiProvider::with_connector(settings(), |_| {
            Err(ApiError::InvalidUrl("nope".to_string()))
        });

        let err = provider.validate_connection().await.unwrap_err();
        assert!(matches!(err, ProviderError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_validate_connection_ok() {
        let provider = provider(FakeGemini::default());
        provider.validate_connection().await.unwrap();
        assert_eq!(fake(&provider).calls(), vec!["list_projects"]);
    }

    #[tokio::test]
    async fn test_get_issue_url() {
        let provider = provider(FakeGemini {
            issues: vec![{
                let mut record = issue(5, Some("1.0"), None);
                record.issue_key = "ABC-5".to_string();
                record
            }],
            ..Default::default()
        });

        let issues = provider.get_issues("1.0").await.unwrap();
        assert_eq!(
            provider.get_issue_url(&issues[0]).unwrap(),
            "http://gemini:8080/issue/ViewIssue.aspx?id=5"
        );
    }

    #[test]
    fn test_issue_url_from_key() {
        let provider = GeminiProvider::with_service(settings(), FakeGemini::default());
        assert_eq!(
            provider.issue_url("ABC-5").unwrap(),
            "http://gemini:8080/issue/ViewIssue.aspx?id=5"
        );
        assert!(matches!(
            provider.issue_url("ABC").unwrap_err(),
            ProviderError::InvalidIssueId(_)
        ));
    }

    #[test]
    fn test_issue_url_under_virtual_directory() {
        let settings = ConnectionSettings::new("https://intranet/gemini/", "build", None);
        let provider = GeminiProvider::with_service(settings, FakeGemini::default());
        assert_eq!(
            provider.issue_url("WEB-12").unwrap(),
            "https://intranet/gemini/issue/ViewIssue.aspx?id=12"
        );
    }

    #[test]
    fn test_issue_url_keeps_virtual_directory_without_trailing_slash() {
        let settings = ConnectionSettings::new("https://intranet/gemini", "build", None);
        let provider = GeminiProvider::with_service(settings, FakeGemini::default());
        assert_eq!(
            provider.issue_url("WEB-12").unwrap(),
            "https://intranet/gemini/issue/ViewIssue.aspx?id=12"
        );
    }

    #[test]
    fn test_host_capabilities() {
        let provider = GeminiProvider::with_service(settings(), FakeGemini::default());
        assert!(provider.is_available());
        assert!(provider.can_append_issue_descriptions());
        assert!(provider.can_change_issue_statuses());
        assert!(provider.can_close_issues());
        assert_eq!(provider.category_type_names(), &["Project"]);
    }

    #[test]
    fn test_from_config_keeps_filter() {
        let provider = GeminiProvider::from_config(Config {
            category_filter: vec!["12".to_string()],
            connection: settings(),
        });
        assert_eq!(provider.category_filter(), &["12".to_string()]);
        assert_eq!(provider.settings().username, "build");
    }
}
