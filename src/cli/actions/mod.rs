pub mod server;

/// Server configuration resolved from the command line and environment.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        upstream: String,
        backend: String,
        portal: String,
        public_paths: Vec<String>,
        tfa_path: String,
        sign_in_path: String,
        home_path: String,
        signup_link_pattern: Option<String>,
        session_ttl_seconds: u64,
        secure_cookies: bool,
    },
}
