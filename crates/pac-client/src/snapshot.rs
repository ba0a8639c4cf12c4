//! One-shot REST reads of scheduler state, plus job submission.
//!
//! Reads are fail-soft: a transport or decode failure comes back as
//! [`Fetched::Failed`] rather than an error, and [`Fetched::into_items`]
//! turns it into an empty collection for the store. Callers that care can
//! still tell "nothing there yet" from "could not ask".

use crate::error::ClientError;
use pac_core::{ArrayElement, Job, JobSubmission, Snapshot};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub const JOB_LIST_PATH: &str = "/task/list";
pub const ELEMENT_LIST_PATH: &str = "/resource/antenna/list";
pub const SUBMIT_PATH: &str = "/task/submit";

const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
    /// Extra attempts after the first failure. Zero disables retrying.
    pub retries: u32,
    pub initial_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080/api".to_string(),
            token: None,
            request_timeout: Duration::from_secs(10),
            retries: 0,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub enum Fetched<T> {
    Loaded(Vec<T>),
    Failed(ClientError),
}

impl<T> Fetched<T> {
    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Fetched::Loaded(_) => None,
            Fetched::Failed(err) => Some(err),
        }
    }

    pub fn health(&self) -> ResourceHealth {
        match self {
            Fetched::Loaded(items) if items.is_empty() => ResourceHealth::Empty,
            Fetched::Loaded(items) => ResourceHealth::Loaded(items.len()),
            Fetched::Failed(err) => ResourceHealth::Failed(err.to_string()),
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Fetched::Loaded(items) => items,
            Fetched::Failed(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceHealth {
    #[default]
    NotRequested,
    Loaded(usize),
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotHealth {
    pub jobs: ResourceHealth,
    pub elements: ResourceHealth,
}

#[derive(Debug)]
pub struct SnapshotRead {
    pub jobs: Fetched<Job>,
    pub elements: Fetched<ArrayElement>,
}

impl SnapshotRead {
    pub fn health(&self) -> SnapshotHealth {
        SnapshotHealth {
            jobs: self.jobs.health(),
            elements: self.elements.health(),
        }
    }

    /// Split into what the store loads and what the console reports.
    pub fn into_parts(self) -> (Snapshot, SnapshotHealth) {
        let health = self.health();
        let snapshot = Snapshot {
            jobs: self.jobs.into_items(),
            elements: self.elements.into_items(),
        };
        (snapshot, health)
    }
}

#[derive(Clone, Debug)]
pub struct SnapshotClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retries: u32,
    initial_backoff: Duration,
}

impl SnapshotClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|token| !token.trim().is_empty()),
            retries: config.retries,
            initial_backoff: config.initial_backoff,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_jobs(&self) -> Fetched<Job> {
        self.fetch_list(JOB_LIST_PATH).await
    }

    pub async fn fetch_elements(&self) -> Fetched<ArrayElement> {
        self.fetch_list(ELEMENT_LIST_PATH).await
    }

    /// Both collections, requested concurrently.
    pub async fn fetch_snapshot(&self) -> SnapshotRead {
        let (elements, jobs) = tokio::join!(self.fetch_elements(), self.fetch_jobs());
        SnapshotRead { jobs, elements }
    }

    pub async fn submit_job(&self, submission: &JobSubmission) -> Result<(), ClientError> {
        let url = self.url(SUBMIT_PATH);
        debug!(url = %url, name = %submission.name, "submitting job");
        let response = self
            .request(Method::POST, &url)
            .json(submission)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("submit_failed: status={status} body={body}");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Fetched<T> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        loop {
            match self.get_list(path).await {
                Ok(items) => {
                    debug!(path, count = items.len(), "fetched list");
                    return Fetched::Loaded(items);
                }
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    warn!("fetch_retry: path={path} attempt={attempt} error={err}");
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                }
                Err(err) => {
                    warn!("fetch_failed: path={path} error={err}");
                    return Fetched::Failed(err);
                }
            }
        }
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ClientError> {
        let url = self.url(path);
        let response = self.request(Method::GET, &url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

pub fn next_backoff(current: Duration) -> Duration {
    let next = current + current;
    if next > MAX_BACKOFF {
        MAX_BACKOFF
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(next_backoff(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(8)), MAX_BACKOFF);
    }

    #[test]
    fn fetched_distinguishes_empty_from_failed() {
        let empty: Fetched<Job> = Fetched::Loaded(Vec::new());
        assert_eq!(empty.health(), ResourceHealth::Empty);
        assert!(empty.error().is_none());

        let failed: Fetched<Job> = Fetched::Failed(ClientError::InvalidToken);
        assert!(matches!(failed.error(), Some(ClientError::InvalidToken)));
        assert!(matches!(failed.health(), ResourceHealth::Failed(_)));
        assert!(failed.into_items().is_empty());
    }

    #[test]
    fn base_url_is_normalized() {
        let client = SnapshotClient::new(&ClientConfig {
            api_base: "http://scheduler:8080/api/".to_string(),
            token: Some("  ".to_string()),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://scheduler:8080/api");
        assert_eq!(client.url(JOB_LIST_PATH), "http://scheduler:8080/api/task/list");
        assert!(client.token.is_none());
    }
}
