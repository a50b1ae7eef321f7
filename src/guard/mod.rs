//! Edge route guard.
//!
//! Gates every portal navigation on the `session_token` / `tfa_token`
//! cookies, without touching the session store. `decide` is a pure function
//! of the requested path and the cookie set: no I/O, no mutation, and every
//! input maps to a defined action. Malformed or missing cookies count as
//! "token absent", never as an error.

use axum::http::{header::COOKIE, HeaderMap};
use regex::Regex;

pub const SESSION_COOKIE_NAME: &str = "session_token";
pub const TFA_COOKIE_NAME: &str = "tfa_token";

/// Routing decision for a single navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Allow,
    RedirectTo(String),
}

/// Session cookies as read from a request, absent when missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub session_token: Option<String>,
    pub tfa_token: Option<String>,
}

/// Authentication phase derived from the cookie pair.
///
/// A request is in exactly one phase. When both cookies are present the
/// session token wins: the backend clears `tfa_token` issuance on successful
/// verification, so the overlap is transient and treated as authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    TfaPending,
    Authenticated,
}

impl SessionCookies {
    /// Reads the session cookies out of a request header map.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            session_token: extract_cookie(headers, SESSION_COOKIE_NAME),
            tfa_token: extract_cookie(headers, TFA_COOKIE_NAME),
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.session_token.is_some() {
            SessionPhase::Authenticated
        } else if self.tfa_token.is_some() {
            SessionPhase::TfaPending
        } else {
            SessionPhase::Unauthenticated
        }
    }
}

/// Route-guard policy for one portal deployment.
///
/// The path sets are deployment configuration, not runtime state: an ordered
/// list of public paths, one second-factor path, and optionally a pattern for
/// self-service signup completion links that bypass all checks.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    public_paths: Vec<String>,
    second_factor_path: String,
    sign_in_path: String,
    home_path: String,
    signup_link_pattern: Option<Regex>,
}

impl GuardConfig {
    #[must_use]
    pub fn new(public_paths: Vec<String>, second_factor_path: String) -> Self {
        Self {
            public_paths,
            second_factor_path,
            sign_in_path: "/signin".to_string(),
            home_path: "/".to_string(),
            signup_link_pattern: None,
        }
    }

    #[must_use]
    pub fn with_sign_in_path(mut self, path: String) -> Self {
        self.sign_in_path = path;
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: String) -> Self {
        self.home_path = path;
        self
    }

    #[must_use]
    pub fn with_signup_link_pattern(mut self, pattern: Regex) -> Self {
        self.signup_link_pattern = Some(pattern);
        self
    }

    #[must_use]
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    /// Decides how to route a navigation, in policy order: signup-link
    /// bypass, public paths, the second-factor path, then everything else as
    /// protected.
    #[must_use]
    pub fn decide(&self, path: &str, cookies: &SessionCookies) -> Action {
        if let Some(pattern) = &self.signup_link_pattern {
            if pattern.is_match(path) {
                return Action::Allow;
            }
        }

        if self.public_paths.iter().any(|public| public == path) {
            // Already authenticated users skip the public pages.
            return match cookies.phase() {
                SessionPhase::Authenticated => Action::RedirectTo(self.home_path.clone()),
                SessionPhase::TfaPending | SessionPhase::Unauthenticated => Action::Allow,
            };
        }

        if path == self.second_factor_path {
            return if cookies.tfa_token.is_some() {
                Action::Allow
            } else {
                Action::RedirectTo(self.sign_in_path.clone())
            };
        }

        if cookies.session_token.is_some() {
            Action::Allow
        } else {
            Action::RedirectTo(self.sign_in_path.clone())
        }
    }
}

/// Pulls a single cookie value out of the `Cookie` headers.
///
/// Returns `None` for missing headers, non-UTF8 values, and pairs without a
/// `=`; an empty value also counts as absent.
fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let trimmed = pair.trim();
            let mut parts = trimmed.splitn(2, '=');
            let key = parts.next()?.trim();
            let Some(val) = parts.next() else {
                continue;
            };
            let val = val.trim();
            if key == name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
