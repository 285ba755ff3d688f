//! Federated credential provider interface (native Google Sign-In).

use async_trait::async_trait;
use thiserror::Error;

/// Failure signals from the native sign-in SDK, mirrored one-to-one from
/// its status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FederatedError {
    /// The user dismissed the interactive sign-in flow.
    #[error("user cancelled the sign-in flow")]
    Cancelled,

    /// A sign-in flow is already running.
    #[error("sign-in already in progress")]
    InProgress,

    /// Platform sign-in services are missing or outdated.
    #[error("platform sign-in services unavailable")]
    ServicesUnavailable,

    /// Any other provider failure.
    #[error("{0}")]
    Other(String),
}

/// Credential produced by a completed federated sign-in.
///
/// The identity token is optional: a malformed provider response may omit
/// it, and consumers must handle the absence without crashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    /// Identity token to exchange with the backend for a session.
    pub id_token: Option<String>,
}

/// Opaque capability producing a third-party identity token.
#[async_trait]
pub trait FederatedIdentityProvider: Send + Sync {
    /// Check that the platform sign-in services are present.
    async fn ensure_available(&self) -> Result<(), FederatedError>;

    /// Run the interactive sign-in flow. May suspend for a long time while
    /// the user interacts with an external UI.
    async fn sign_in(&self) -> Result<FederatedCredential, FederatedError>;

    /// Revoke the provider-side credential (best effort).
    async fn sign_out(&self) -> Result<(), FederatedError>;

    /// Provider identifier used for the backend id-token exchange.
    fn provider_id(&self) -> &str {
        "google"
    }
}
