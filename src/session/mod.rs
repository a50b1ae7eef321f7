//! Client session store: auth state, operations, and the backend client.

pub mod client;
pub mod state;
pub mod store;
pub mod types;

pub use client::{ApiError, AuthClient, Portal};
pub use state::AuthState;
pub use store::{SessionStore, SignInCredentials, SignInToken};
