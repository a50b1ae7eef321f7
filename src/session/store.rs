//! Client session store.
//!
//! Owns [`AuthState`] and exposes the sign-in, second-factor, sign-up, and
//! sign-out operations. Each async operation is a single
//! pending → fulfilled|rejected transition over the shared state; failures
//! land in `AuthState::error`, never as a panic or propagated error.
//!
//! Overlapping operations follow last-writer-wins, strengthened with a
//! generation counter: starting an operation (or signing out) invalidates
//! every response still in flight, so a stale response can never overwrite a
//! newer operation's outcome.

use secrecy::SecretString;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};
use tracing::{debug, warn};

use super::{
    client::AuthClient,
    state::AuthState,
    types::{SignInRequest, SignInResponse, SignUpRequest, TfaRequest},
};

/// Sign-in credentials; `client_id` is the employer org domain, absent for
/// the hub portal.
#[derive(Debug)]
pub struct SignInCredentials {
    pub client_id: Option<String>,
    pub email: String,
    pub password: SecretString,
}

/// Token returned by a fulfilled sign-in, telling the caller which cookie to
/// write: a full session, or a token gating the second factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInToken {
    Session(String),
    SecondFactor(String),
}

impl SignInToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Session(token) | Self::SecondFactor(token) => token,
        }
    }
}

pub struct SessionStore {
    client: AuthClient,
    state: Mutex<AuthState>,
    generation: AtomicU64,
}

impl SessionStore {
    #[must_use]
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            state: Mutex::new(AuthState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Primary-factor sign-in. Fulfilled: records the returned token and
    /// marks the session authenticated. Rejected: records the backend's
    /// message, or "Sign in failed", leaving token and auth flag untouched.
    ///
    /// The error is also handed back to the caller directly: the shared
    /// `error` field belongs to the latest operation, so a caller racing a
    /// newer one must not read its own failure out of the snapshot.
    pub async fn sign_in(
        &self,
        credentials: SignInCredentials,
    ) -> Result<SignInToken, String> {
        let generation = self.begin();
        let request = SignInRequest {
            client_id: credentials.client_id,
            email: credentials.email,
            password: credentials.password,
        };

        match self.client.sign_in(&request).await {
            Ok(response) => match interpret_sign_in(response) {
                Some(token) => {
                    let raw = token.as_str().to_string();
                    self.fulfill(generation, |state| {
                        state.token = Some(raw);
                        state.is_authenticated = true;
                    });
                    Ok(token)
                }
                None => {
                    warn!("Sign-in response carried no token");
                    let message = "Sign in failed".to_string();
                    self.reject(generation, message.clone());
                    Err(message)
                }
            },
            Err(err) => {
                let message = err.user_message("Sign in failed");
                self.reject(generation, message.clone());
                Err(message)
            }
        }
    }

    /// Second-factor verification. The caller must already hold a TFA token
    /// from a prior sign-in; the route guard enforces that precondition on
    /// the page side. Fulfilled: replaces the stored token with the full
    /// session token.
    pub async fn verify_second_factor(
        &self,
        tfa_token: String,
        tfa_code: String,
        remember_me: bool,
    ) -> Result<String, String> {
        let generation = self.begin();
        let request = TfaRequest {
            tfa_token,
            tfa_code,
            remember_me,
        };

        match self.client.verify_second_factor(&request).await {
            Ok(response) => {
                let session_token = response.session_token;
                let recorded = session_token.clone();
                self.fulfill(generation, |state| {
                    state.token = Some(recorded);
                    state.is_authenticated = true;
                });
                Ok(session_token)
            }
            Err(err) => {
                let message = err.user_message("TFA verification failed");
                self.reject(generation, message.clone());
                Err(message)
            }
        }
    }

    /// Portal registration; same lifecycle as sign-in.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<String, String> {
        let generation = self.begin();

        match self.client.sign_up(&request).await {
            Ok(response) => {
                let token = response.token;
                let recorded = token.clone();
                self.fulfill(generation, |state| {
                    state.token = Some(recorded);
                    state.is_authenticated = true;
                });
                Ok(token)
            }
            Err(err) => {
                let message = err.user_message("Sign up failed");
                self.reject(generation, message.clone());
                Err(message)
            }
        }
    }

    /// Synchronous reset to the default state. Also invalidates every
    /// operation still in flight. Cookie clearing is the edge handlers'
    /// responsibility, not the store's.
    pub fn sign_out(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        *state = AuthState::default();
    }

    /// Marks an operation pending and returns its generation.
    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.lock();
        state.loading = true;
        state.error = None;
        generation
    }

    fn fulfill(&self, generation: u64, apply: impl FnOnce(&mut AuthState)) {
        if self.is_stale(generation) {
            return;
        }
        let mut state = self.lock();
        state.loading = false;
        apply(&mut state);
    }

    fn reject(&self, generation: u64, message: String) {
        if self.is_stale(generation) {
            return;
        }
        let mut state = self.lock();
        state.loading = false;
        state.error = Some(message);
    }

    fn is_stale(&self, generation: u64) -> bool {
        let latest = self.generation.load(Ordering::SeqCst);
        if latest != generation {
            debug!(generation, latest, "Discarding stale auth response");
            return true;
        }
        false
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Picks the token out of a sign-in response. `session_token` means the
/// session is complete; `tfa_token` (hub) and `token` (employer) both gate
/// the second factor.
fn interpret_sign_in(response: SignInResponse) -> Option<SignInToken> {
    if let Some(session) = response.session_token {
        return Some(SignInToken::Session(session));
    }
    response
        .tfa_token
        .or(response.token)
        .map(SignInToken::SecondFactor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::client::Portal;
    use axum::{routing::post, Json, Router};
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .await
                .expect("serve mock backend");
        });
        Url::parse(&format!("http://{addr}/")).expect("mock url")
    }

    fn store_for(base: Url) -> SessionStore {
        let client = AuthClient::new(base, Portal::Employer).expect("client");
        SessionStore::new(client)
    }

    fn credentials(password: &str) -> SignInCredentials {
        SignInCredentials {
            client_id: Some("acme.example".to_string()),
            email: "a@b.com".to_string(),
            password: SecretString::from(password),
        }
    }

    #[tokio::test]
    async fn sign_in_records_second_factor_token() {
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|| async { Json(json!({"token": "tgt123"})) }),
        ))
        .await;
        let store = store_for(base);

        let token = store.sign_in(credentials("good")).await;
        assert_eq!(token, Ok(SignInToken::SecondFactor("tgt123".to_string())));

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert!(!state.loading);
        assert_eq!(state.token.as_deref(), Some("tgt123"));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn sign_in_accepts_direct_session_token() {
        // Some deployments skip the second factor and answer with a full
        // session right away.
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|| async { Json(json!({"session_token": "sess42"})) }),
        ))
        .await;
        let store = store_for(base);

        let token = store.sign_in(credentials("good")).await;
        assert_eq!(token, Ok(SignInToken::Session("sess42".to_string())));
        assert_eq!(store.snapshot().token.as_deref(), Some("sess42"));
    }

    #[tokio::test]
    async fn rejected_sign_in_surfaces_backend_message() {
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({"message": "invalid credentials"})),
                )
            }),
        ))
        .await;
        let store = store_for(base);

        let result = store.sign_in(credentials("bad")).await;
        assert_eq!(result, Err("invalid credentials".to_string()));

        let state = store.snapshot();
        assert!(!state.is_authenticated);
        assert!(!state.loading);
        assert!(state.token.is_none());
        assert_eq!(state.error.as_deref(), Some("invalid credentials"));
    }

    #[tokio::test]
    async fn repeated_failing_sign_ins_never_authenticate() {
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|| async { axum::http::StatusCode::UNAUTHORIZED }),
        ))
        .await;
        let store = store_for(base);

        for _ in 0..3 {
            assert!(store.sign_in(credentials("bad")).await.is_err());
            let state = store.snapshot();
            assert!(!state.is_authenticated);
            assert_eq!(state.error.as_deref(), Some("Sign in failed"));
        }
    }

    #[tokio::test]
    async fn transport_failure_uses_operation_default_message() {
        // Nothing listens on this port; bind-then-drop to reserve a dead one.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let store = store_for(Url::parse(&format!("http://{addr}/")).expect("url"));
        assert_eq!(
            store.sign_in(credentials("any")).await,
            Err("Sign in failed".to_string())
        );

        let state = store.snapshot();
        assert!(!state.is_authenticated);
        assert_eq!(state.error.as_deref(), Some("Sign in failed"));
    }

    #[tokio::test]
    async fn second_factor_replaces_token_with_session_token() {
        let base = serve(
            Router::new()
                .route(
                    "/employer/signin",
                    post(|| async { Json(json!({"token": "tgt123"})) }),
                )
                .route(
                    "/employer/tfa",
                    post(|| async { Json(json!({"session_token": "sess789"})) }),
                ),
        )
        .await;
        let store = store_for(base);

        let _ = store.sign_in(credentials("good")).await;
        let session = store
            .verify_second_factor("tgt123".to_string(), "123456".to_string(), true)
            .await;
        assert_eq!(session.as_deref(), Ok("sess789"));

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert_eq!(state.token.as_deref(), Some("sess789"));
    }

    #[tokio::test]
    async fn failed_second_factor_sets_distinct_message() {
        let base = serve(Router::new().route(
            "/employer/tfa",
            post(|| async { axum::http::StatusCode::UNAUTHORIZED }),
        ))
        .await;
        let store = store_for(base);

        let session = store
            .verify_second_factor("tgt123".to_string(), "000000".to_string(), false)
            .await;
        assert_eq!(session, Err("TFA verification failed".to_string()));
        assert_eq!(
            store.snapshot().error.as_deref(),
            Some("TFA verification failed")
        );
    }

    #[tokio::test]
    async fn sign_up_records_session_token() {
        let base = serve(Router::new().route(
            "/employer/signup",
            post(|| async { Json(json!({"token": "fresh-account"})) }),
        ))
        .await;
        let store = store_for(base);

        let request = SignUpRequest {
            full_name: "Argus F".to_string(),
            email: "a@b.com".to_string(),
            password: SecretString::from("good"),
            token: None,
        };
        assert_eq!(store.sign_up(request).await.as_deref(), Ok("fresh-account"));

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert_eq!(state.token.as_deref(), Some("fresh-account"));
    }

    #[tokio::test]
    async fn rejected_sign_up_uses_its_own_default_message() {
        let base = serve(Router::new().route(
            "/employer/signup",
            post(|| async { axum::http::StatusCode::CONFLICT }),
        ))
        .await;
        let store = store_for(base);

        let request = SignUpRequest {
            full_name: "Argus F".to_string(),
            email: "taken@b.com".to_string(),
            password: SecretString::from("good"),
            token: None,
        };
        assert_eq!(store.sign_up(request).await, Err("Sign up failed".to_string()));

        let state = store.snapshot();
        assert!(!state.is_authenticated);
        assert_eq!(state.error.as_deref(), Some("Sign up failed"));
    }

    #[tokio::test]
    async fn sign_out_resets_state_to_default_exactly() {
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|| async { Json(json!({"token": "tgt123"})) }),
        ))
        .await;
        let store = store_for(base);

        let _ = store.sign_in(credentials("good")).await;
        assert!(store.snapshot().is_authenticated);

        store.sign_out();
        assert_eq!(store.snapshot(), AuthState::default());
    }

    #[tokio::test]
    async fn sign_out_invalidates_in_flight_sign_in() {
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Json(json!({"token": "late"}))
            }),
        ))
        .await;
        let store = std::sync::Arc::new(store_for(base));

        let in_flight = {
            let store = store.clone();
            tokio::spawn(async move { store.sign_in(credentials("slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.sign_out();

        let _ = in_flight.await.expect("join sign-in task");
        // The late response must not resurrect the signed-out session.
        assert_eq!(store.snapshot(), AuthState::default());
    }

    #[tokio::test]
    async fn latest_of_two_overlapping_sign_ins_wins() {
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|Json(body): Json<serde_json::Value>| async move {
                if body["password"] == "slow" {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Json(json!({"token": "stale"}))
                } else {
                    Json(json!({"token": "fresh"}))
                }
            }),
        ))
        .await;
        let store = std::sync::Arc::new(store_for(base));

        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.sign_in(credentials("slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = store.sign_in(credentials("fast")).await;

        let _ = slow.await.expect("join slow sign-in");
        assert_eq!(store.snapshot().token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn overlapping_failures_each_get_their_own_message() {
        let base = serve(Router::new().route(
            "/employer/signin",
            post(|Json(body): Json<serde_json::Value>| async move {
                if body["password"] == "slow" {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({"message": "slow-user-error"})),
                    )
                } else {
                    (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({"message": "fast-user-error"})),
                    )
                }
            }),
        ))
        .await;
        let store = std::sync::Arc::new(store_for(base));

        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.sign_in(credentials("slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fast = store.sign_in(credentials("fast")).await;

        // Each caller sees its own backend message, even though the shared
        // error slot only keeps the latest operation's.
        assert_eq!(fast, Err("fast-user-error".to_string()));
        assert_eq!(
            slow.await.expect("join slow sign-in"),
            Err("slow-user-error".to_string())
        );
        assert_eq!(store.snapshot().error.as_deref(), Some("fast-user-error"));
    }
}
