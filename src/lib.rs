//! # Filch (Vetchi Edge Gateway)
//!
//! `filch` sits in front of a Vetchi portal (employer or hub) and gates every
//! navigation on the session cookies, the way the portals' middleware did:
//!
//! - **Route guard**: a pure decision over the requested path and the
//!   `session_token` / `tfa_token` cookies. Public paths bounce already
//!   signed-in users home, the second-factor page requires a pending TFA
//!   token, everything else requires a full session.
//! - **Session store**: in-memory auth state driven by the sign-in,
//!   second-factor, sign-up, and sign-out operations against the Vetchi API.
//!   Each operation is a single pending → fulfilled|rejected transition.
//!
//! The two halves never talk to each other directly: the auth handlers write
//! cookies after a successful operation, and the guard reads them on the next
//! navigation. This keeps the guard free of any in-process state so it can
//! run on every request, cold.

pub mod cli;
pub mod edge;
pub mod guard;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
