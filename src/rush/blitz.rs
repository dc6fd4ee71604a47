use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{RushControl, RushExecutor, RushObserver, RushStatus, TimelinePoint};
use crate::error::{BlitzerError, Result, check_status};
use crate::pattern::LoadPattern;

const SERVICE: &str = "blitz.io";
const CLIENT_NAME: &str = "blitzer";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    api_key: Option<String>,
    error: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    job_id: Option<String>,
    error: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    #[serde(default)]
    status: String,
    result: Option<JobResult>,
    error: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    #[serde(default)]
    region: String,
    #[serde(default)]
    timeline: Vec<TimelinePoint>,
}

fn describe(error: String, reason: Option<String>) -> String {
    match reason {
        Some(reason) => format!("{error}: {reason}"),
        None => error,
    }
}

/// blitz.io REST client.
///
/// Logs in once with the account's API user and key, then reuses the
/// session key for every call. Rush progress is polled at `poll_interval`.
pub struct BlitzClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    api_key: String,
    session: OnceCell<String>,
    poll_interval: Duration,
}

impl BlitzClient {
    pub fn new(
        base_url: &str,
        user: impl Into<String>,
        api_key: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("blitzer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(BlitzClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.into(),
            api_key: api_key.into(),
            session: OnceCell::new(),
            poll_interval,
        })
    }

    fn with_credentials(&self, request: RequestBuilder, key: &str) -> RequestBuilder {
        request
            .header("X-API-User", &self.user)
            .header("X-API-Key", key)
            .header("X-API-Client", CLIENT_NAME)
    }

    async fn login(&self) -> Result<String> {
        let url = format!("{}/login/api", self.base_url);
        let response = self
            .with_credentials(self.http.get(url), &self.api_key)
            .send()
            .await?;
        let body: LoginResponse = check_status(SERVICE, response).await?.json().await?;

        if let Some(error) = body.error {
            return Err(BlitzerError::Login(describe(error, body.reason)));
        }
        body.api_key
            .ok_or_else(|| BlitzerError::Login("response carried no api_key".into()))
    }

    async fn session_key(&self) -> Result<&str> {
        let key = self.session.get_or_try_init(|| self.login()).await?;
        Ok(key.as_str())
    }

    /// Queue a rush and return its job id
    pub async fn submit(&self, pattern: &LoadPattern) -> Result<String> {
        let key = self.session_key().await?;
        let url = format!("{}/api/1/curl/execute", self.base_url);
        let response = self
            .with_credentials(self.http.post(url), key)
            .json(&pattern.to_request())
            .send()
            .await?;
        let body: ExecuteResponse = check_status(SERVICE, response).await?.json().await?;

        if let Some(error) = body.error {
            return Err(BlitzerError::RushFailed {
                job_id: String::new(),
                reason: describe(error, body.reason),
            });
        }
        body.job_id.ok_or_else(|| BlitzerError::RushFailed {
            job_id: String::new(),
            reason: "execute response carried no job_id".into(),
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus> {
        let key = self.session_key().await?;
        let url = format!("{}/api/1/jobs/{job_id}/status", self.base_url);
        let response = self
            .with_credentials(self.http.get(url), key)
            .send()
            .await?;
        Ok(check_status(SERVICE, response).await?.json().await?)
    }

    pub async fn abort(&self, job_id: &str) -> Result<()> {
        let key = self.session_key().await?;
        let url = format!("{}/api/1/jobs/{job_id}/abort", self.base_url);
        let response = self
            .with_credentials(self.http.put(url), key)
            .send()
            .await?;
        check_status(SERVICE, response).await?;
        Ok(())
    }
}

#[async_trait]
impl RushExecutor for BlitzClient {
    async fn execute(
        &self,
        pattern: &LoadPattern,
        observer: &mut RushObserver<'_>,
    ) -> Result<RushStatus> {
        let job_id = self.submit(pattern).await?;
        tracing::debug!(job_id = %job_id, "rush queued");

        loop {
            tokio::time::sleep(self.poll_interval).await;

            let job = self.job_status(&job_id).await?;
            if let Some(error) = job.error {
                return Err(BlitzerError::RushFailed {
                    job_id,
                    reason: describe(error, job.reason),
                });
            }

            let completed = job.status == "completed";
            let Some(result) = job.result else {
                if completed {
                    return Err(BlitzerError::RushFailed {
                        job_id,
                        reason: "completed without a result".into(),
                    });
                }
                // Still queued
                continue;
            };

            let snapshot = RushStatus {
                job_id: job_id.clone(),
                region: result.region,
                timeline: result.timeline,
            };

            if completed {
                tracing::debug!(job_id = %job_id, points = snapshot.timeline.len(), "rush completed");
                // The job is over, so an Abort here needs no PUT
                if !snapshot.timeline.is_empty() {
                    observer(&snapshot);
                }
                return Ok(snapshot);
            }

            if snapshot.timeline.is_empty() {
                continue;
            }

            if observer(&snapshot) == RushControl::Abort {
                tracing::debug!(job_id = %job_id, "aborting rush");
                self.abort(&job_id).await?;
                return Ok(snapshot);
            }
        }
    }
}
