//! HTTP client for the Vetchi auth endpoints.
//!
//! Centralizes request setup (JSON bodies, timeout policy, user agent) and
//! converts every failure into an [`ApiError`] so callers never see a panic
//! or an uncaught transport error. A specific `message` in a JSON error body
//! takes precedence over the caller's per-operation default.

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, time::Duration};
use url::Url;

use super::types::{
    ErrorBody, SignInRequest, SignInResponse, SignUpRequest, SignUpResponse, TfaRequest,
    TfaResponse,
};
use crate::APP_USER_AGENT;

/// Default request timeout applied to all backend calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

/// Portal flavor, which decides the backend path prefix and whether
/// `client_id` is part of the sign-in credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portal {
    Employer,
    Hub,
}

impl Portal {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Employer => "employer",
            Self::Hub => "hub",
        }
    }

    #[must_use]
    pub const fn sign_in_endpoint(self) -> &'static str {
        // The hub backend calls the operation "login"; same shape otherwise.
        match self {
            Self::Employer => "signin",
            Self::Hub => "login",
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.prefix())
    }
}

#[derive(Clone, Debug)]
pub enum ApiError {
    Network(String),
    Timeout(String),
    Http { status: u16, message: String },
    Parse(String),
}

impl ApiError {
    /// Message to surface in the session state: the backend's own message
    /// when it sent one, otherwise the per-operation default.
    #[must_use]
    pub fn user_message(&self, default: &str) -> String {
        match self {
            Self::Http { message, .. } if !message.is_empty() => message.clone(),
            _ => default.to_string(),
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(message) => write!(formatter, "Network error: {message}"),
            Self::Timeout(message) => write!(formatter, "Timeout: {message}"),
            Self::Http { status, message } => {
                write!(formatter, "Request failed ({status}): {message}")
            }
            Self::Parse(message) => write!(formatter, "Response error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Thin JSON client over the backend auth endpoints for one portal.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    portal: Portal,
}

impl AuthClient {
    /// Builds a client with the default timeout policy.
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: Url, portal: Portal) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            portal,
        })
    }

    /// Reuses an existing `reqwest` client, sharing its connection pool.
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: Url, portal: Portal) -> Self {
        Self {
            http,
            base_url,
            portal,
        }
    }

    #[must_use]
    pub fn portal(&self) -> Portal {
        self.portal
    }

    /// `POST /{portal}/signin` (hub: `/hub/login`).
    pub async fn sign_in(&self, request: &SignInRequest) -> Result<SignInResponse, ApiError> {
        self.post_json(self.portal.sign_in_endpoint(), request).await
    }

    /// `POST /{portal}/tfa`.
    pub async fn verify_second_factor(&self, request: &TfaRequest) -> Result<TfaResponse, ApiError> {
        self.post_json("tfa", request).await
    }

    /// `POST /{portal}/signup`.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse, ApiError> {
        self.post_json("signup", request).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}")))
        } else {
            Err(http_error(status, response.text().await.unwrap_or_default()))
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = format!("{base}/{}/{endpoint}", self.portal.prefix());
        Url::parse(&url).map_err(|err| ApiError::Network(format!("Invalid endpoint URL: {err}")))
    }
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out".to_string())
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Builds an HTTP error, preferring a `message` field in a JSON error body
/// over the raw (truncated) body text.
fn http_error(status: StatusCode, body: String) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| sanitize_body(body));
    ApiError::Http {
        status: status.as_u16(),
        message,
    }
}

fn sanitize_body(body: String) -> String {
    let trimmed = body.trim();
    trimmed.chars().take(MAX_ERROR_CHARS).collect()
}
