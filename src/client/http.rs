//! HTTP metrics API client.
//!
//! Submissions are spawned onto a tokio runtime and never awaited by the
//! caller. Failures surface as warnings from the spawned task.

use chrono::Utc;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{ApiClient, CheckStatus};
use crate::error::{Error, Result};

const SERIES_PATH: &str = "v1/series";
const CHECK_RUN_PATH: &str = "v1/check_run";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpApiClient {
    http: reqwest::Client,
    base: Url,
    api_key: SecretString,
    runtime: Handle,
}

impl HttpApiClient {
    pub fn new(api_url: &str, api_key: &SecretString, runtime: Handle) -> Result<Self> {
        let mut base = api_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| Error::Config(format!("bad api url {api_url:?}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base,
            api_key: SecretString::from(api_key.expose_secret().to_owned()),
            runtime,
        })
    }

    fn submit(&self, path: &'static str, body: serde_json::Value) -> Result<()> {
        let url = self
            .base
            .join(path)
            .map_err(|e| Error::Other(format!("bad api path {path}: {e}")))?;
        let request = self
            .http
            .post(url)
            .header("DD-API-KEY", self.api_key.expose_secret())
            .json(&body);

        self.runtime.spawn(async move {
            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => debug!(path, status = %response.status(), "api submission accepted"),
                Err(e) => warn!(path, error = %e, "api submission failed"),
            }
        });
        Ok(())
    }

    fn series(
        &self,
        name: &str,
        kind: &str,
        value: f64,
        host: Option<&str>,
        tags: &[String],
    ) -> Result<()> {
        let mut point = json!({
            "metric": name,
            "points": [[Utc::now().timestamp(), value]],
            "type": kind,
            "tags": tags,
        });
        if let Some(host) = host {
            point["host"] = json!(host);
        }
        self.submit(SERIES_PATH, json!({ "series": [point] }))
    }
}

impl ApiClient for HttpApiClient {
    fn metric(&self, name: &str, value: f64, host: Option<&str>, tags: &[String]) -> Result<()> {
        self.series(name, "gauge", value, host, tags)
    }

    fn count(&self, name: &str, value: u64, host: Option<&str>, tags: &[String]) -> Result<()> {
        self.series(name, "count", value as f64, host, tags)
    }

    fn service_check(
        &self,
        name: &str,
        status: CheckStatus,
        host: Option<&str>,
        tags: &[String],
    ) -> Result<()> {
        let mut body = json!({
            "check": name,
            "timestamp": Utc::now().timestamp(),
            "status": status.code(),
            "tags": tags,
        });
        if let Some(host) = host {
            body["host_name"] = json!(host);
        }
        self.submit(CHECK_RUN_PATH, body)
    }
}
