//! Gemini API client implementation.
//!
//! This module provides the HTTP client for the Gemini web services. It
//! handles authentication, request/response processing and error mapping.
//! Failures are returned as-is; nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::auth::Auth;
use super::error::{ApiError, Result};
use super::types::{IssueRecord, IssuesFilter, ProjectRecord, StatusRecord};
use super::GeminiService;
use crate::config::ConnectionSettings;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const PROJECTS_PATH: &str = "api/projects.ashx/projects";
const ISSUES_PATH: &str = "api/issues.ashx/issues";
const FILTERED_ISSUES_PATH: &str = "api/issues.ashx/issues/filtered";
const STATUSES_PATH: &str = "api/admin.ashx/issuestatus";

/// The Gemini API client.
#[derive(Debug)]
pub struct GeminiClient {
    /// The HTTP client.
    client: Client,
    /// The base URL of the Gemini server, always ending in `/`.
    base_url: Url,
    /// Authentication credentials.
    auth: Auth,
}

impl GeminiClient {
    /// Create a client from persisted connection settings.
    ///
    /// The password is resolved through [`ConnectionSettings::resolve_password`].
    /// No request is made; use the provider's connection check for that.
    #[instrument(skip(settings), fields(base_url = %settings.base_url, username = %settings.username))]
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self> {
        let password = settings.resolve_password();
        let client = Self::with_credentials(&settings.base_url, &settings.username, &password)?;
        info!("Gemini client created");
        Ok(client)
    }

    /// Create a new client with explicit credentials.
    pub fn with_credentials(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let auth = Auth::new(username, password);
        let client = Self::build_http_client()?;
        let base_url = normalize_base_url(base_url)?;

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    /// Build the HTTP client with appropriate settings.
    fn build_http_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Network)
    }

    /// Resolve a service path against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }

    /// Attach the headers every Gemini request carries.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(header::AUTHORIZATION, self.auth.header_value())
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Perform a GET request and decode the JSON response.
    #[instrument(skip(self), fields(path = %path))]
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let response = self.authorized(self.client.get(url)).send().await?;
        self.handle_response(response).await
    }

    /// Perform a POST request with a JSON body and decode the JSON response.
    #[instrument(skip(self, body), fields(path = %path))]
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(url))
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Perform a PUT request with a JSON body, ignoring any JSON reply.
    #[instrument(skip(self, body), fields(path = %path))]
    async fn put<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: serde::Serialize + Sync + ?Sized,
    {
        let url = self.endpoint(path)?;
        debug!("PUT {}", url);

        let response = self
            .authorized(self.client.put(url))
            .json(body)
            .send()
            .await?;
        self.handle_write_response(response).await
    }

    /// Handle the HTTP response, checking for errors and parsing JSON.
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let url = response.url().to_string();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
        } else {
            let error_body = response.text().await.unwrap_or_default();
            debug!("Error response body: {}", error_body);

            Err(Self::error_from_response(status, &url, &error_body))
        }
    }

    /// Handle the response to a write.
    ///
    /// 204, an empty body and any JSON body are success. A body that is not
    /// JSON, such as an HTML page from the web server, is an invalid response.
    async fn handle_write_response(&self, response: Response) -> Result<()> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            debug!("Error response body: {}", body);
            return Err(Self::error_from_response(status, &url, &body));
        }

        let trimmed = body.trim();
        if trimmed.is_empty() || serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
            return Ok(());
        }

        debug!("Non-JSON write response body: {}", body);
        Err(ApiError::InvalidResponse(format!(
            "HTTP {} from {} did not return JSON",
            status, url
        )))
    }

    /// Create an appropriate error from an HTTP response.
    fn error_from_response(status: StatusCode, url: &str, body: &str) -> ApiError {
        // ASP.NET services report failures as {"Message": ..., "ExceptionMessage": ...}
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
            let message = ["ExceptionMessage", "Message"]
                .iter()
                .find_map(|key| json.get(key).and_then(|v| v.as_str()))
                .filter(|m| !m.is_empty());
            if let Some(message) = message {
                return ApiError::from_status(status, message);
            }
        }

        ApiError::from_status(status, url)
    }
}

#[async_trait]
impl GeminiService for GeminiClient {
    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        let projects: Vec<ProjectRecord> = self.get(PROJECTS_PATH).await?;
        debug!("Found {} projects", projects.len());
        Ok(projects)
    }

    #[instrument(skip(self), fields(projects = %filter.project_ids))]
    async fn filtered_issues(&self, filter: &IssuesFilter) -> Result<Vec<IssueRecord>> {
        let issues: Vec<IssueRecord> = self.post(FILTERED_ISSUES_PATH, filter).await?;
        debug!("Found {} issues", issues.len());
        Ok(issues)
    }

    #[instrument(skip(self))]
    async fn get_issue(&self, issue_id: i64) -> Result<IssueRecord> {
        let path = format!("{}/{}", ISSUES_PATH, issue_id);
        self.get(&path).await.map_err(|e| {
            if matches!(e, ApiError::NotFound(_)) {
                ApiError::NotFound(format!("Issue {} not found", issue_id))
            } else {
                e
            }
        })
    }

    #[instrument(skip(self, issue), fields(issue_key = %issue.issue_key))]
    async fn update_issue(&self, issue: &IssueRecord) -> Result<()> {
        self.put(ISSUES_PATH, issue).await?;
        info!("Updated issue {}", issue.issue_key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn issue_statuses(&self) -> Result<Vec<StatusRecord>> {
        self.get(STATUSES_PATH).await
    }
}

/// Parse the base URL and warn when credentials would travel in clear text.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url> {
    let url = base_url_with_slash(raw)?;

    if url.scheme() != "https" && url.host_str() != Some("localhost") {
        warn!("URL does not use HTTPS: {}. Credentials are sent in clear text.", url);
    }

    Ok(url)
}

/// Parse the base URL and make sure it ends in a slash.
///
/// Paths are resolved relative to it, so a base of `http://host/gemini`
/// must become `http://host/gemini/`.
pub(crate) fn base_url_with_slash(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    Url::parse(&with_slash).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
}
