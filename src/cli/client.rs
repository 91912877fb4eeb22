use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// Thin client for the operator API. Unwraps the `{"success", "data"}`
/// envelope and turns error envelopes into `anyhow` errors.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let parsed = url::Url::parse(base_url).with_context(|| format!("invalid server URL '{}'", base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("server URL must use http or https: {}", base_url));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        self.request(Method::POST, path, body).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::DELETE, path, None).await
    }

    /// Status and raw body, for /health whose 503 still carries data
    pub async fn get_raw(&self, path: &str) -> anyhow::Result<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.with_context(|| format!("request to {} failed", url))?;
        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .with_context(|| format!("{} returned a non-JSON body ({})", url, status))?;

        unwrap_envelope(status, body)
    }
}

/// `data` of a success envelope, or an error built from a failure envelope
pub fn unwrap_envelope(status: StatusCode, body: Value) -> anyhow::Result<Value> {
    if status.is_success() && body.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(body.get("data").cloned().unwrap_or(Value::Null));
    }

    let message = body.get("error").and_then(Value::as_str).unwrap_or("request failed");
    let code = body.get("code").and_then(Value::as_str).unwrap_or("UNKNOWN");
    Err(anyhow!("{} ({}, HTTP {})", message, code, status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_success_envelope() {
        let data = unwrap_envelope(StatusCode::OK, json!({"success": true, "data": {"slug": "acme"}})).unwrap();
        assert_eq!(data["slug"], "acme");
    }

    #[test]
    fn failure_envelope_becomes_error() {
        let err = unwrap_envelope(
            StatusCode::CONFLICT,
            json!({"success": false, "error": "tenant 'acme' already exists", "code": "CONFLICT"}),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("already exists"));
        assert!(message.contains("CONFLICT"));
        assert!(message.contains("409"));
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(ApiClient::new("ftp://example.com").is_err());
        assert!(ApiClient::new("not a url").is_err());
        assert_eq!(ApiClient::new("http://localhost:3000/").unwrap().base_url(), "http://localhost:3000");
    }
}
