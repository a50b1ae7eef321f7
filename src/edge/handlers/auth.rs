//! Auth endpoints: sign-in, second-factor verification, sign-up, sign-out.
//!
//! These handlers drive the session store and own the cookie hand-off to the
//! route guard: a fulfilled operation writes `session_token` or `tfa_token`,
//! sign-out clears both. Tokens never leave the edge in a response body;
//! they travel only as `HttpOnly` cookies.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::{
    edge::{CookiePolicy, EdgeState},
    guard::{SessionCookies, SESSION_COOKIE_NAME, TFA_COOKIE_NAME},
    session::{types::SignUpRequest, SignInCredentials, SignInToken},
};

/// Remember-me stretches the session cookie to a year, the backend's own
/// token validity for remembered sessions.
const REMEMBER_ME_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Deserialize, Debug)]
pub struct SignInForm {
    #[serde(default)]
    pub client_id: Option<String>,
    pub email: String,
    pub password: SecretString,
}

#[derive(Deserialize, Debug)]
pub struct TfaForm {
    pub tfa_code: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Deserialize, Debug)]
pub struct SignUpForm {
    pub full_name: String,
    pub email: String,
    pub password: SecretString,
    #[serde(default)]
    pub token: Option<String>,
}

/// `POST /signin`. Fulfilled sign-ins answer with either a `tfa_token`
/// cookie and `{"status":"tfa_required"}`, or a full `session_token` cookie
/// and `{"status":"ok"}`.
pub async fn sign_in(
    Extension(state): Extension<Arc<EdgeState>>,
    Json(form): Json<SignInForm>,
) -> impl IntoResponse {
    let credentials = SignInCredentials {
        client_id: form.client_id,
        email: form.email,
        password: form.password,
    };

    match state.store.sign_in(credentials).await {
        Ok(SignInToken::Session(token)) => {
            let headers = set_cookie_headers(&[session_cookie(
                &state.cookies,
                &token,
                state.cookies.session_ttl_seconds,
            )]);
            (StatusCode::OK, headers, Json(json!({"status": "ok"}))).into_response()
        }
        Ok(SignInToken::SecondFactor(token)) => {
            let headers = set_cookie_headers(&[tfa_cookie(&state.cookies, &token)]);
            (
                StatusCode::OK,
                headers,
                Json(json!({"status": "tfa_required"})),
            )
                .into_response()
        }
        Err(message) => rejection(message),
    }
}

/// `POST /tfa`. Reads the pending `tfa_token` cookie (the route guard has
/// already required it for the page itself), verifies the code, then swaps
/// the cookies: `session_token` in, `tfa_token` out.
pub async fn verify_second_factor(
    Extension(state): Extension<Arc<EdgeState>>,
    headers: HeaderMap,
    Json(form): Json<TfaForm>,
) -> impl IntoResponse {
    let Some(tfa_token) = SessionCookies::from_headers(&headers).tfa_token else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "No pending second factor"})),
        )
            .into_response();
    };

    let ttl = if form.remember_me {
        REMEMBER_ME_TTL_SECONDS
    } else {
        state.cookies.session_ttl_seconds
    };

    match state
        .store
        .verify_second_factor(tfa_token, form.tfa_code, form.remember_me)
        .await
    {
        Ok(session_token) => {
            let headers = set_cookie_headers(&[
                session_cookie(&state.cookies, &session_token, ttl),
                clear_cookie(&state.cookies, TFA_COOKIE_NAME),
            ]);
            (StatusCode::OK, headers, Json(json!({"status": "ok"}))).into_response()
        }
        Err(message) => rejection(message),
    }
}

/// `POST /signup`. A fulfilled registration signs the user straight in.
pub async fn sign_up(
    Extension(state): Extension<Arc<EdgeState>>,
    Json(form): Json<SignUpForm>,
) -> impl IntoResponse {
    let request = SignUpRequest {
        full_name: form.full_name,
        email: form.email,
        password: form.password,
        token: form.token,
    };

    match state.store.sign_up(request).await {
        Ok(token) => {
            let headers = set_cookie_headers(&[session_cookie(
                &state.cookies,
                &token,
                state.cookies.session_ttl_seconds,
            )]);
            (StatusCode::OK, headers, Json(json!({"status": "ok"}))).into_response()
        }
        Err(message) => rejection(message),
    }
}

/// `POST /signout`. Resets the store and clears both cookies, so the guard's
/// next decision sees an unauthenticated request. Unconditional: signing out
/// without a session is still a 204.
pub async fn sign_out(Extension(state): Extension<Arc<EdgeState>>) -> impl IntoResponse {
    state.store.sign_out();

    let headers = set_cookie_headers(&[
        clear_cookie(&state.cookies, SESSION_COOKIE_NAME),
        clear_cookie(&state.cookies, TFA_COOKIE_NAME),
    ]);
    (StatusCode::NO_CONTENT, headers).into_response()
}

/// 401 with the failing operation's own message. The store's shared `error`
/// slot tracks only the latest operation, so it cannot be read back here
/// without mixing up concurrent callers.
fn rejection(message: String) -> axum::response::Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": message}))).into_response()
}

fn set_cookie_headers(cookies: &[Result<HeaderValue, InvalidHeaderValue>]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        match cookie {
            Ok(value) => {
                headers.append(SET_COOKIE, value.clone());
            }
            Err(err) => error!("Failed to build cookie header: {err}"),
        }
    }
    headers
}

/// Build a secure `HttpOnly` cookie for the session token.
fn session_cookie(
    policy: &CookiePolicy,
    token: &str,
    ttl_seconds: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if policy.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// The TFA cookie is browser-session scoped; it only needs to survive until
/// the code is entered.
fn tfa_cookie(policy: &CookiePolicy, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{TFA_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax");
    if policy.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_cookie(policy: &CookiePolicy, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if policy.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy {
            secure,
            session_ttl_seconds: 12 * 60 * 60,
        }
    }

    #[test]
    fn session_cookie_carries_ttl_and_flags() {
        let cookie = session_cookie(&policy(false), "sess789", 43_200).expect("cookie");
        let value = cookie.to_str().expect("ascii");
        assert!(value.starts_with("session_token=sess789;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=43200"));
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn secure_flag_follows_policy() {
        let cookie = session_cookie(&policy(true), "sess789", 60).expect("cookie");
        assert!(cookie.to_str().expect("ascii").ends_with("; Secure"));
    }

    #[test]
    fn tfa_cookie_has_no_max_age() {
        let cookie = tfa_cookie(&policy(false), "tgt123").expect("cookie");
        assert!(!cookie.to_str().expect("ascii").contains("Max-Age"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_cookie(&policy(false), TFA_COOKIE_NAME).expect("cookie");
        let value = cookie.to_str().expect("ascii");
        assert!(value.starts_with("tfa_token=;"));
        assert!(value.contains("Max-Age=0"));
    }
}
