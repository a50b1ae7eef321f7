//! In-memory auth state.
//!
//! One instance per session store; never persisted. Only the derived tokens
//! leave this struct, as cookies written by the edge handlers.

use super::types::UserProfile;

/// Auth state snapshot. `loading` is true exactly while an operation is in
/// flight; `error` belongs to the most recent failed operation and is
/// cleared when a new one starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
}
