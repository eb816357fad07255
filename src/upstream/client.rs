//! HTTP implementation of the upstream API.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::Method;
use serde_json::{json, Value};
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::session::SessionTokens;
use crate::upstream::types::{RefreshError, UpstreamError, UpstreamRequest, UpstreamResponse};
use crate::upstream::UpstreamApi;

/// `reqwest`-backed client for the upstream REST API.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Url::parse(&config.base_url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join an upstream path onto the base URL, keeping any base path.
    pub fn url(&self, path: &str, query: Option<&str>) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let result: Result<UpstreamResponse, UpstreamError> = async {
            let response = builder.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            UpstreamResponse::from_parts(status, &bytes)
        }
        .await;

        if let Err(e) = &result {
            tracing::error!(operation, error = %e, "Upstream call failed");
            metrics::record_upstream_error(operation);
        }
        result
    }
}

#[async_trait]
impl UpstreamApi for HttpUpstream {
    async fn login(&self, body: Value) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.url("/admin/login", None)?;
        self.send("login", self.client.post(url).json(&body)).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, RefreshError> {
        let url = self.url("/refresh", None)?;
        let request = self
            .client
            .post(url)
            .json(&json!({ "refreshToken": refresh_token }));
        let response = self.send("refresh", request).await?;

        if !response.is_success() {
            return Err(RefreshError::Rejected(response.status));
        }
        tokens_from_body(&response.body).ok_or(RefreshError::MissingAccessToken)
    }

    async fn logout(&self, bearer: Option<&str>) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.url("/logout", None)?;
        let mut request = self.client.post(url);
        if let Some(bearer) = bearer {
            request = request.header(AUTHORIZATION, bearer);
        }
        self.send("logout", request).await
    }

    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.url(&request.path, request.query.as_deref())?;
        let mut builder = self.client.request(request.method.clone(), url);

        if let Some(bearer) = &request.bearer {
            builder = builder.header(AUTHORIZATION, bearer);
        }
        if let Some(id) = &request.request_id {
            builder = builder.header(X_REQUEST_ID, id);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        } else if request.method != Method::GET && request.method != Method::HEAD {
            builder = builder.header(reqwest::header::CONTENT_LENGTH, 0);
        }

        self.send("forward", builder).await
    }
}

/// Tokens from a login or refresh body. `None` without a usable access token.
pub fn tokens_from_body(body: &Value) -> Option<SessionTokens> {
    let access = body
        .get("accessToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())?;
    let refresh = body
        .get("refreshToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Some(SessionTokens {
        access: access.to_string(),
        refresh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base: &str) -> HttpUpstream {
        HttpUpstream::new(&UpstreamConfig {
            base_url: base.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_url_keeps_base_path() {
        let up = upstream("https://api.example.com/v1/");
        let url = up.url("/admin/merchants/7/status", Some("page=2&q=a%20b")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/admin/merchants/7/status?page=2&q=a%20b"
        );

        let bare = up.url("/coupons", Some("")).unwrap();
        assert_eq!(bare.as_str(), "https://api.example.com/v1/coupons");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpUpstream::new(&UpstreamConfig {
            base_url: "not a url".to_string(),
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(UpstreamError::InvalidUrl(_))));
    }

    #[test]
    fn test_tokens_from_body() {
        let tokens = tokens_from_body(&json!({ "accessToken": "AT", "refreshToken": "RT" })).unwrap();
        assert_eq!(tokens.access, "AT");
        assert_eq!(tokens.refresh.as_deref(), Some("RT"));

        let rotated_none = tokens_from_body(&json!({ "accessToken": "AT" })).unwrap();
        assert!(rotated_none.refresh.is_none());

        assert!(tokens_from_body(&json!({ "accessToken": "" })).is_none());
        assert!(tokens_from_body(&json!({ "account": {} })).is_none());
    }
}
