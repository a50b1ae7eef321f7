//! Request/response types for the Vetchi auth endpoints.
//!
//! Field names follow the backend's published schemas; the employer portal
//! additionally sends `client_id` on sign-in, which is omitted for the hub.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// Credentials for the primary sign-in factor.
#[derive(Serialize, Debug)]
pub struct SignInRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub email: String,
    #[serde(serialize_with = "expose_password")]
    pub password: SecretString,
}

/// Sign-in response: either a full session token or a token gating the
/// second factor. The employer backend calls the latter `token`, the hub
/// backend `tfa_token`; both mean the second factor is still pending.
#[derive(Deserialize, Debug, Default)]
pub struct SignInResponse {
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub tfa_token: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct TfaRequest {
    pub tfa_token: String,
    pub tfa_code: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub remember_me: bool,
}

#[derive(Deserialize, Debug)]
pub struct TfaResponse {
    pub session_token: String,
}

/// Portal-specific registration payload.
#[derive(Serialize, Debug)]
pub struct SignUpRequest {
    pub full_name: String,
    pub email: String,
    #[serde(serialize_with = "expose_password")]
    pub password: SecretString,
    /// Invite token from a signup completion link, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SignUpResponse {
    pub token: String,
}

/// Error body shape used by the backend for non-2xx responses.
#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub message: Option<String>,
}

/// Minimal profile carried in the session state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

// Passwords stay wrapped in `SecretString` everywhere except the wire.
fn expose_password<S: Serializer>(password: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(password.expose_secret())
}
