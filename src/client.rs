//! HTTP transport for the lead-gen API.
//!
//! One shared [`ApiClient`] is built per component from [`CoreConfig`], which
//! also fixes the request timeout. The helpers attach bearer tokens when
//! provided and decode non-success responses into structured [`ApiError`]
//! values so callers never inspect raw bodies.

use anyhow::{Result, anyhow};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{Instrument, debug, info_span};
use url::Url;

use crate::APP_USER_AGENT;
use crate::config::CoreConfig;
use crate::error::{ApiError, ErrorBody};

/// Maximum number of error body characters carried into error messages.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub(crate) struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if the base URL cannot be parsed, has no host, or uses
    /// an unsupported scheme, or if the underlying HTTP client cannot be built.
    pub(crate) fn new(config: &CoreConfig) -> Result<Self> {
        let url = Url::parse(config.api_base_url())?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}"));
        }

        url.host()
            .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?;

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url().trim_end_matches('/').to_string(),
        })
    }

    /// Builds a URL from the configured base URL and the provided path.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Posts JSON and decodes a JSON response.
    pub(crate) async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send_post(path, body, bearer).await?;
        decode_json(response).await
    }

    /// Posts JSON and discards the response body, accepting `204` or `{}`.
    pub(crate) async fn post_json_empty<B>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send_post(path, body, bearer).await.map(|_| ())
    }

    /// Fetches JSON with an optional bearer token.
    pub(crate) async fn get_json<T>(&self, path: &str, bearer: Option<&str>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);

        let span = info_span!(
            "api.get",
            http.method = "GET",
            url = %url
        );
        let response = with_bearer(self.http.get(&url), bearer)
            .send()
            .instrument(span)
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let response = reject_error_status(url, response).await?;

        decode_json(response).await
    }

    async fn send_post<B>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);

        let span = info_span!(
            "api.post",
            http.method = "POST",
            url = %url
        );
        let response = with_bearer(self.http.post(&url), bearer)
            .json(body)
            .send()
            .instrument(span)
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        reject_error_status(url, response).await
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Turns non-success responses into [`ApiError::Status`] with a decoded body.
async fn reject_error_status(url: String, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
        message: sanitize_body(&text),
        ..ErrorBody::default()
    });

    debug!("{url} - {status}");

    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ApiError::Protocol(err.to_string()))
}

/// Trims and truncates raw error bodies before carrying them into messages.
fn sanitize_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_ERROR_CHARS).collect())
    }
}
