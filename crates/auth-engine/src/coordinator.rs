//! User-triggered authentication actions.
//!
//! The coordinator runs the multi-step sign-in/sign-up/sign-out sequences
//! and normalizes backend and provider failures into one outcome taxonomy.
//! It never writes to the session store: successful actions surface as a
//! backend change notification, which the synchronizer applies.

use crate::backend::{AuthBackend, SignUpData};
use crate::federated::{FederatedError, FederatedIdentityProvider};
use serde_json::json;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Uniform outcome of a user-initiated credential operation.
///
/// Returned as data, never raised; the UI layer decides what to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The operation completed; any session change arrives through the
    /// backend listener.
    Success,
    /// The account was created but the backend requires verification before
    /// a session exists.
    VerificationPending,
    /// The user dismissed the provider's interactive flow.
    UserCancelled,
    /// An identical operation is already running.
    InProgress,
    /// Platform sign-in services are missing or outdated.
    ProviderUnavailable,
    /// Input rejected locally; no backend call was made.
    Invalid(String),
    /// The backend or provider reported an error.
    Failure(String),
}

/// Sign-up form fields as collected by the UI.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Clears the in-flight flag on every exit path of an operation.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Executes sign-in, sign-up, and sign-out sequences.
pub struct AuthActionCoordinator {
    backend: Arc<dyn AuthBackend>,
    federated: Arc<dyn FederatedIdentityProvider>,
    password_in_flight: AtomicBool,
    federated_in_flight: AtomicBool,
}

impl AuthActionCoordinator {
    /// Create a coordinator over a backend and a federated provider.
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        federated: Arc<dyn FederatedIdentityProvider>,
    ) -> Self {
        Self {
            backend,
            federated,
            password_in_flight: AtomicBool::new(false),
            federated_in_flight: AtomicBool::new(false),
        }
    }

    /// Sign in with email and password.
    ///
    /// Empty fields are rejected locally without a backend call.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> ActionOutcome {
        if email.trim().is_empty() || password.is_empty() {
            return ActionOutcome::Invalid("Please enter email and password.".to_string());
        }

        let Some(_guard) = InFlightGuard::acquire(&self.password_in_flight) else {
            return ActionOutcome::InProgress;
        };

        debug!(email = %email, "attempting password sign-in");
        match self.backend.sign_in_with_password(email, password).await {
            Ok(()) => {
                info!(email = %email, "password sign-in accepted");
                ActionOutcome::Success
            }
            Err(error) => {
                warn!(%error, "password sign-in failed");
                ActionOutcome::Failure(error.to_string())
            }
        }
    }

    /// Create an account from the sign-up form.
    ///
    /// All fields must be present and the passwords must match before any
    /// backend call is made. The full name is stored into the profile
    /// metadata so the home greeting works for password-created accounts.
    pub async fn sign_up_with_password(&self, form: &SignUpForm) -> ActionOutcome {
        if form.first_name.trim().is_empty()
            || form.last_name.trim().is_empty()
            || form.email.trim().is_empty()
            || form.password.is_empty()
            || form.confirm_password.is_empty()
        {
            return ActionOutcome::Invalid("Please fill out all fields.".to_string());
        }
        if form.password != form.confirm_password {
            return ActionOutcome::Invalid("Passwords do not match.".to_string());
        }

        let Some(_guard) = InFlightGuard::acquire(&self.password_in_flight) else {
            return ActionOutcome::InProgress;
        };

        let first = form.first_name.trim();
        let last = form.last_name.trim();
        let full_name = format!("{} {}", first, last).trim().to_string();
        let metadata: HashMap<String, Value> = HashMap::from([
            ("first_name".to_string(), json!(first)),
            ("last_name".to_string(), json!(last)),
            ("full_name".to_string(), json!(full_name)),
        ]);

        debug!(email = %form.email, "attempting sign-up");
        match self
            .backend
            .sign_up(&form.email, &form.password, metadata)
            .await
        {
            Ok(SignUpData::SessionEstablished(session)) => {
                info!(user_id = %session.user_id, "sign-up established a session");
                ActionOutcome::Success
            }
            Ok(SignUpData::VerificationPending) => {
                info!(email = %form.email, "sign-up pending verification");
                ActionOutcome::VerificationPending
            }
            Err(error) => {
                warn!(%error, "sign-up failed");
                ActionOutcome::Failure(error.to_string())
            }
        }
    }

    /// Sign in through the federated provider, then exchange the identity
    /// token with the backend for a session.
    pub async fn sign_in_with_google(&self) -> ActionOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.federated_in_flight) else {
            debug!("federated sign-in already in progress");
            return ActionOutcome::InProgress;
        };

        if let Err(error) = self.federated.ensure_available().await {
            return match error {
                FederatedError::ServicesUnavailable => ActionOutcome::ProviderUnavailable,
                other => {
                    warn!(error = %other, "federated availability check failed");
                    ActionOutcome::Failure(other.to_string())
                }
            };
        }

        let credential = match self.federated.sign_in().await {
            Ok(credential) => credential,
            Err(FederatedError::Cancelled) => {
                debug!("user cancelled the sign-in flow");
                return ActionOutcome::UserCancelled;
            }
            Err(FederatedError::InProgress) => {
                debug!("provider reports a sign-in already in progress");
                return ActionOutcome::InProgress;
            }
            Err(FederatedError::ServicesUnavailable) => {
                return ActionOutcome::ProviderUnavailable;
            }
            Err(FederatedError::Other(message)) => {
                warn!(error = %message, "federated sign-in failed");
                return ActionOutcome::Failure(message);
            }
        };

        let id_token = match credential.id_token.filter(|token| !token.is_empty()) {
            Some(token) => token,
            None => {
                warn!("provider response did not include an identity token");
                return ActionOutcome::Failure(
                    "Provider response did not include an identity token".to_string(),
                );
            }
        };

        match self
            .backend
            .sign_in_with_id_token(self.federated.provider_id(), &id_token)
            .await
        {
            Ok(()) => {
                info!("federated sign-in accepted");
                ActionOutcome::Success
            }
            Err(error) => {
                warn!(%error, "identity token exchange failed");
                ActionOutcome::Failure(error.to_string())
            }
        }
    }

    /// Sign out: revoke the federated credential (best effort), then end the
    /// backend session.
    ///
    /// Only the backend call's result is surfaced; it decides whether the
    /// store transitions to unauthenticated via the listener.
    pub async fn sign_out(&self) -> ActionOutcome {
        if let Err(error) = self.federated.sign_out().await {
            warn!(%error, "federated sign-out failed (non-fatal)");
        }

        match self.backend.sign_out().await {
            Ok(()) => {
                info!("signed out");
                ActionOutcome::Success
            }
            Err(error) => {
                warn!(%error, "sign-out failed");
                ActionOutcome::Failure(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthChangeCallback, BackendSubscription};
    use crate::federated::FederatedCredential;
    use crate::{AuthError, AuthResult};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingBackend {
        sign_in_calls: AtomicUsize,
        sign_up_calls: AtomicUsize,
        id_token_calls: AtomicUsize,
        sign_out_calls: AtomicUsize,
        fail_sign_out: AtomicBool,
    }

    #[async_trait]
    impl AuthBackend for CountingBackend {
        async fn get_session(&self) -> AuthResult<Option<crate::Session>> {
            Ok(None)
        }

        fn on_auth_state_change(&self, _callback: AuthChangeCallback) -> BackendSubscription {
            BackendSubscription::new(|| {})
        }

        async fn sign_in_with_password(&self, _email: &str, _password: &str) -> AuthResult<()> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn sign_up(
            &self,
            _email: &str,
            _password: &str,
            metadata: HashMap<String, Value>,
        ) -> AuthResult<SignUpData> {
            self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(
                metadata.get("full_name").and_then(Value::as_str),
                Some("Ada Lovelace")
            );
            Ok(SignUpData::VerificationPending)
        }

        async fn sign_in_with_id_token(&self, _provider: &str, _id_token: &str) -> AuthResult<()> {
            self.id_token_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn sign_out(&self) -> AuthResult<()> {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_sign_out.load(Ordering::SeqCst) {
                return Err(AuthError::SignOut("server rejected".to_string()));
            }
            Ok(())
        }
    }

    struct StubProvider {
        sign_in_result: std::sync::Mutex<Result<FederatedCredential, FederatedError>>,
        available: Result<(), FederatedError>,
        sign_out_calls: AtomicUsize,
        fail_sign_out: bool,
    }

    impl StubProvider {
        fn new(sign_in_result: Result<FederatedCredential, FederatedError>) -> Self {
            Self {
                sign_in_result: std::sync::Mutex::new(sign_in_result),
                available: Ok(()),
                sign_out_calls: AtomicUsize::new(0),
                fail_sign_out: false,
            }
        }
    }

    #[async_trait]
    impl FederatedIdentityProvider for StubProvider {
        async fn ensure_available(&self) -> Result<(), FederatedError> {
            self.available.clone()
        }

        async fn sign_in(&self) -> Result<FederatedCredential, FederatedError> {
            self.sign_in_result.lock().unwrap().clone()
        }

        async fn sign_out(&self) -> Result<(), FederatedError> {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_sign_out {
                return Err(FederatedError::Other("revoke failed".to_string()));
            }
            Ok(())
        }
    }

    fn coordinator_with(
        backend: Arc<CountingBackend>,
        provider: StubProvider,
    ) -> AuthActionCoordinator {
        AuthActionCoordinator::new(backend, Arc::new(provider))
    }

    fn ok_credential() -> Result<FederatedCredential, FederatedError> {
        Ok(FederatedCredential {
            id_token: Some("token-1".to_string()),
        })
    }

    #[tokio::test]
    async fn test_sign_in_rejects_empty_email_without_backend_call() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let outcome = coordinator.sign_in_with_password("", "pw").await;
        assert!(matches!(outcome, ActionOutcome::Invalid(_)));
        assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_in_rejects_empty_password_without_backend_call() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let outcome = coordinator.sign_in_with_password("e@x.com", "").await;
        assert!(matches!(outcome, ActionOutcome::Invalid(_)));
        assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_in_success() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let outcome = coordinator.sign_in_with_password("e@x.com", "pw").await;
        assert_eq!(outcome, ActionOutcome::Success);
        assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 1);
    }

    fn full_form() -> SignUpForm {
        SignUpForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "pw".to_string(),
            confirm_password: "pw".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_rejects_missing_fields_without_backend_call() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let mut form = full_form();
        form.last_name.clear();

        let outcome = coordinator.sign_up_with_password(&form).await;
        assert!(matches!(outcome, ActionOutcome::Invalid(_)));
        assert_eq!(backend.sign_up_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_mismatched_passwords_without_backend_call() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let mut form = full_form();
        form.confirm_password = "other".to_string();

        let outcome = coordinator.sign_up_with_password(&form).await;
        assert_eq!(
            outcome,
            ActionOutcome::Invalid("Passwords do not match.".to_string())
        );
        assert_eq!(backend.sign_up_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_up_reports_verification_pending() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let outcome = coordinator.sign_up_with_password(&full_form()).await;
        assert_eq!(outcome, ActionOutcome::VerificationPending);
        assert_eq!(backend.sign_up_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_google_sign_in_success_exchanges_token() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let outcome = coordinator.sign_in_with_google().await;
        assert_eq!(outcome, ActionOutcome::Success);
        assert_eq!(backend.id_token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_google_cancellation_maps_to_user_cancelled() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(
            backend.clone(),
            StubProvider::new(Err(FederatedError::Cancelled)),
        );

        let outcome = coordinator.sign_in_with_google().await;
        assert_eq!(outcome, ActionOutcome::UserCancelled);
        assert_eq!(backend.id_token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_google_services_unavailable_maps_to_provider_unavailable() {
        let backend = Arc::new(CountingBackend::default());
        let mut provider = StubProvider::new(ok_credential());
        provider.available = Err(FederatedError::ServicesUnavailable);

        let coordinator = coordinator_with(backend.clone(), provider);
        let outcome = coordinator.sign_in_with_google().await;
        assert_eq!(outcome, ActionOutcome::ProviderUnavailable);
        assert_eq!(backend.id_token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_google_missing_token_fails_without_exchange() {
        let backend = Arc::new(CountingBackend::default());
        let coordinator = coordinator_with(
            backend.clone(),
            StubProvider::new(Ok(FederatedCredential { id_token: None })),
        );

        let outcome = coordinator.sign_in_with_google().await;
        assert!(matches!(outcome, ActionOutcome::Failure(_)));
        assert_eq!(backend.id_token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_out_surfaces_backend_failure() {
        let backend = Arc::new(CountingBackend::default());
        backend.fail_sign_out.store(true, Ordering::SeqCst);
        let coordinator = coordinator_with(backend.clone(), StubProvider::new(ok_credential()));

        let outcome = coordinator.sign_out().await;
        assert!(matches!(outcome, ActionOutcome::Failure(_)));
        assert_eq!(backend.sign_out_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sign_out_ignores_federated_failure() {
        let backend = Arc::new(CountingBackend::default());
        let mut provider = StubProvider::new(ok_credential());
        provider.fail_sign_out = true;

        let coordinator = coordinator_with(backend.clone(), provider);
        let outcome = coordinator.sign_out().await;
        assert_eq!(outcome, ActionOutcome::Success);
        assert_eq!(backend.sign_out_calls.load(Ordering::SeqCst), 1);
    }
}
