//! Thin HTTP client for the signlabd API.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

pub struct ApiClient {
    client: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: format!("{}/api/v1", base.trim_end_matches('/')),
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{path}", self.base);
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("cannot reach signlabd at {url}"))?;
        let body: Value = response.json().await.context("invalid response body")?;
        unwrap_envelope(body)
    }

    pub async fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}{path}", self.base);
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("cannot reach signlabd at {url}"))?;
        let body: Value = response.json().await.context("invalid response body")?;
        unwrap_envelope(body)
    }
}

/// Pull `data` out of a response envelope, or turn `error` into an `Err`.
pub fn unwrap_envelope(mut body: Value) -> Result<Value> {
    if body["success"].as_bool() == Some(true) {
        return Ok(body["data"].take());
    }
    match body.get("error") {
        Some(err) => bail!(
            "{}: {}",
            err["code"].as_str().unwrap_or("ERROR"),
            err["message"].as_str().unwrap_or("request failed")
        ),
        None => Err(anyhow!("unexpected response: {body}")),
    }
}
