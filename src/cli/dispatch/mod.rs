use crate::cli::actions::Action;
use anyhow::Result;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .map(String::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{name}"))
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        upstream: required("upstream")?,
        backend: required("backend")?,
        portal: required("portal")?,
        public_paths: matches
            .get_many::<String>("public-path")
            .map(|paths| paths.map(String::to_string).collect())
            .unwrap_or_default(),
        tfa_path: required("tfa-path")?,
        sign_in_path: required("signin-path")?,
        home_path: required("home-path")?,
        signup_link_pattern: matches
            .get_one::<String>("signup-link-pattern")
            .map(String::to_string),
        session_ttl_seconds: matches
            .get_one::<u64>("session-ttl")
            .copied()
            .unwrap_or(43_200),
        secure_cookies: matches.get_flag("secure-cookies"),
    })
}
