//! Abstract interface over the auth-as-a-service backend.
//!
//! Exactly one concrete backend is compiled into an application; everything
//! in this crate talks to it through [`AuthBackend`].

use crate::{AuthResult, Session};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Event kinds carried by the backend's change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    /// Emitted by some backends synchronously upon listener registration,
    /// carrying whatever session is currently persisted.
    InitialSession,
    /// A session was established.
    SignedIn,
    /// The session ended.
    SignedOut,
}

/// Callback invoked on every backend auth change notification.
pub type AuthChangeCallback = Box<dyn Fn(AuthChangeEvent, Option<Session>) + Send + Sync>;

/// Outcome of a sign-up call.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpData {
    /// The backend established a session right away; a `SignedIn` change
    /// notification follows.
    SessionEstablished(Session),
    /// The account was created but the backend requires a verification step
    /// before a session exists.
    VerificationPending,
}

/// Handle for a registered backend change listener.
///
/// The listener is removed when the guard is dropped, so teardown releases
/// the subscription even if an in-flight operation never completes.
pub struct BackendSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl BackendSubscription {
    /// Wrap a cancellation closure.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener now instead of at drop time.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for BackendSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Narrow interface over the identity provider backend.
///
/// Session issuance, token refresh, and credential validation all live
/// behind this seam.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// One-shot query for the currently persisted session. No side effects.
    async fn get_session(&self) -> AuthResult<Option<Session>>;

    /// Register a durable change listener.
    ///
    /// Registration is synchronous. The callback may fire zero or more
    /// times for the lifetime of the subscription, including synchronously
    /// during registration; consumers must tolerate that first callback.
    fn on_auth_state_change(&self, callback: AuthChangeCallback) -> BackendSubscription;

    /// Authenticate with email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()>;

    /// Create an account with email, password, and profile metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: HashMap<String, Value>,
    ) -> AuthResult<SignUpData>;

    /// Exchange a federated identity token for a session.
    async fn sign_in_with_id_token(&self, provider: &str, id_token: &str) -> AuthResult<()>;

    /// End the current session.
    async fn sign_out(&self) -> AuthResult<()>;
}
