//! Supabase GoTrue auth client.

use crate::storage::{SecretsManager, SessionStorage, StoredSession};
use async_trait::async_trait;
use auth_engine::{
    AuthBackend, AuthChangeCallback, AuthChangeEvent, AuthError, AuthResult, BackendSubscription,
    Session, SignUpData,
};
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

/// Supabase token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: HashMap<String, Value>,
}

/// Supabase signup response: a full token grant when the project
/// auto-confirms accounts, or a bare user object when email verification is
/// pending.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<UserPayload>,
}

type ListenerRegistry = Arc<Mutex<Vec<(u64, Arc<AuthChangeCallback>)>>>;

/// Auth backend client over the Supabase GoTrue REST API.
///
/// The client owns durable session storage and fans its own successful
/// calls out to registered change listeners; that listener path is how the
/// rest of the application observes session changes.
pub struct SupabaseAuthClient {
    http_client: Client,
    supabase_url: String,
    publishable_key: String,
    secrets: SecretsManager,
    listeners: ListenerRegistry,
    next_listener_id: AtomicU64,
}

impl SupabaseAuthClient {
    /// Create a client for a Supabase project.
    pub fn new(
        supabase_url: &str,
        publishable_key: &str,
        storage: Box<dyn SessionStorage>,
    ) -> AuthResult<Self> {
        Url::parse(supabase_url)?;

        Ok(Self {
            http_client: Client::new(),
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
            secrets: SecretsManager::new(storage),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
        })
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        let listeners: Vec<Arc<AuthChangeCallback>> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for listener in listeners {
            listener(event, session.clone());
        }
    }

    fn unexpired_session(&self) -> AuthResult<Option<Session>> {
        match self.secrets.get_session()? {
            Some(record) if record.is_expired() => {
                debug!(user_id = %record.user_id, "stored session is expired");
                Ok(None)
            }
            Some(record) => Ok(Some(record.to_session())),
            None => Ok(None),
        }
    }

    fn store_grant(&self, data: TokenResponse) -> AuthResult<Session> {
        let expires_at = Utc::now() + Duration::seconds(data.expires_in);
        let record = StoredSession {
            user_id: data.user.id,
            email: data.user.email,
            metadata: data.user.user_metadata,
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_at: expires_at.to_rfc3339(),
        };
        self.secrets.set_session(&record)?;
        Ok(record.to_session())
    }
}

#[async_trait]
impl AuthBackend for SupabaseAuthClient {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        self.unexpired_session()
    }

    fn on_auth_state_change(&self, callback: AuthChangeCallback) -> BackendSubscription {
        // GoTrue clients report the persisted session synchronously on
        // registration.
        let initial = self.unexpired_session().unwrap_or_else(|error| {
            warn!(%error, "failed to read stored session for initial callback");
            None
        });
        callback(AuthChangeEvent::InitialSession, initial);

        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));

        let listeners = Arc::downgrade(&self.listeners);
        BackendSubscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .unwrap()
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()> {
        let login_url = format!("{}/auth/v1/token?grant_type=password", self.supabase_url);

        debug!(url = %login_url, email = %email, "attempting email/password login");

        let response = self
            .http_client
            .post(&login_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "login failed");
            return Err(AuthError::InvalidCredentials(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let data: TokenResponse = response.json().await?;
        let session = self.store_grant(data)?;

        info!(user_id = %session.user_id, "login successful");
        self.emit(AuthChangeEvent::SignedIn, Some(session));

        Ok(())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: HashMap<String, Value>,
    ) -> AuthResult<SignUpData> {
        let signup_url = format!("{}/auth/v1/signup", self.supabase_url);

        debug!(url = %signup_url, email = %email, "attempting sign-up");

        let response = self
            .http_client
            .post(&signup_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "sign-up failed");
            return Err(AuthError::SignUp(format!("HTTP {}: {}", status, body)));
        }

        let data: SignUpResponse = response.json().await?;

        match (
            data.access_token,
            data.refresh_token,
            data.expires_in,
            data.user,
        ) {
            (Some(access_token), Some(refresh_token), Some(expires_in), Some(user)) => {
                let session = self.store_grant(TokenResponse {
                    access_token,
                    refresh_token,
                    expires_in,
                    user,
                })?;
                info!(user_id = %session.user_id, "sign-up established a session");
                self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
                Ok(SignUpData::SessionEstablished(session))
            }
            _ => {
                info!(email = %email, "sign-up accepted, verification pending");
                Ok(SignUpData::VerificationPending)
            }
        }
    }

    async fn sign_in_with_id_token(&self, provider: &str, id_token: &str) -> AuthResult<()> {
        let token_url = format!("{}/auth/v1/token?grant_type=id_token", self.supabase_url);

        debug!(url = %token_url, provider = %provider, "exchanging identity token");

        let response = self
            .http_client
            .post(&token_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "provider": provider,
                "id_token": id_token,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "identity token exchange failed");
            return Err(AuthError::TokenExchange(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let data: TokenResponse = response.json().await?;
        let session = self.store_grant(data)?;

        info!(user_id = %session.user_id, provider = %provider, "federated login successful");
        self.emit(AuthChangeEvent::SignedIn, Some(session));

        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        // Only revoke server-side when an unexpired token exists; an expired
        // record is cleared locally.
        let access_token = match self.secrets.get_session()? {
            Some(record) if !record.is_expired() => Some(record.access_token),
            _ => None,
        };

        if let Some(access_token) = access_token {
            let logout_url = format!("{}/auth/v1/logout", self.supabase_url);

            debug!(url = %logout_url, "revoking session");

            let response = self
                .http_client
                .post(&logout_url)
                .header("apikey", &self.publishable_key)
                .header("Authorization", format!("Bearer {}", access_token))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "sign-out rejected");
                return Err(AuthError::SignOut(format!("HTTP {}: {}", status, body)));
            }
        }

        self.secrets.clear_session()?;
        info!("signed out");
        self.emit(AuthChangeEvent::SignedOut, None);

        Ok(())
    }
}
