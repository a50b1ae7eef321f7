use crate::{
    cli::actions::Action,
    edge::{self, CookiePolicy, EdgeState},
    guard::GuardConfig,
    session::{AuthClient, Portal, SessionStore},
    APP_USER_AGENT,
};
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::Arc;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        upstream,
        backend,
        portal,
        public_paths,
        tfa_path,
        sign_in_path,
        home_path,
        signup_link_pattern,
        session_ttl_seconds,
        secure_cookies,
    } = action;

    let upstream = Url::parse(&upstream).context("Invalid upstream URL")?;
    let backend = Url::parse(&backend).context("Invalid backend URL")?;

    let portal = match portal.as_str() {
        "hub" => Portal::Hub,
        _ => Portal::Employer,
    };

    let mut guard = GuardConfig::new(public_paths, tfa_path)
        .with_sign_in_path(sign_in_path)
        .with_home_path(home_path);
    if let Some(pattern) = signup_link_pattern {
        let pattern = Regex::new(&pattern).context("Invalid signup link pattern")?;
        guard = guard.with_signup_link_pattern(pattern);
    }

    let store = SessionStore::new(AuthClient::new(backend, portal)?);

    // Proxy client passes upstream redirects through instead of chasing them.
    let http = reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let state = Arc::new(EdgeState {
        guard,
        store,
        upstream,
        http,
        cookies: CookiePolicy {
            secure: secure_cookies,
            session_ttl_seconds,
        },
    });

    edge::new(port, state).await?;

    Ok(())
}
