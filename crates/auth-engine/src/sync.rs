//! Auth state synchronizer: bridges backend signals into the session store.
//!
//! Two sources feed the store: the backend's long-lived change listener and
//! a one-shot bootstrap query issued at startup. The listener is
//! authoritative; the bootstrap only exists to settle the state quickly on
//! first paint. The synchronizer is the store's single writer.

use crate::backend::{AuthBackend, BackendSubscription};
use crate::store::{SessionState, SessionStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reconciles backend change notifications and the bootstrap session query
/// into the session store.
pub struct AuthStateSynchronizer {
    store: Arc<SessionStore>,
    backend: Arc<dyn AuthBackend>,
    superseded: Arc<AtomicBool>,
    _listener: BackendSubscription,
}

impl AuthStateSynchronizer {
    /// Register the backend change listener and return the synchronizer.
    ///
    /// The listener is installed synchronously, before any bootstrap query
    /// runs, so a transition arriving between the two is never missed. The
    /// subscription is released when the synchronizer is dropped.
    pub fn attach(store: Arc<SessionStore>, backend: Arc<dyn AuthBackend>) -> Self {
        let superseded = Arc::new(AtomicBool::new(false));

        let listener = {
            let store = store.clone();
            let superseded = superseded.clone();
            backend.on_auth_state_change(Box::new(move |event, session| {
                superseded.store(true, Ordering::SeqCst);
                debug!(
                    ?event,
                    authenticated = session.is_some(),
                    "auth change notification"
                );
                match session {
                    Some(session) => store.set(SessionState::Authenticated(session)),
                    None => store.set(SessionState::Unauthenticated),
                }
            }))
        };

        Self {
            store,
            backend,
            superseded,
            _listener: listener,
        }
    }

    /// Run the one-shot bootstrap session query.
    ///
    /// A listener notification observed before the query resolves wins and
    /// the bootstrap result is discarded. A failed query settles the store
    /// as unauthenticated rather than leaving it undetermined; the error is
    /// logged, never surfaced.
    pub async fn bootstrap(&self) {
        let result = self.backend.get_session().await;

        if self.superseded.load(Ordering::SeqCst) {
            debug!("bootstrap result superseded by listener notification");
            return;
        }

        match result {
            Ok(Some(session)) => self.store.set(SessionState::Authenticated(session)),
            Ok(None) => self.store.set(SessionState::Unauthenticated),
            Err(error) => {
                warn!(%error, "bootstrap session query failed, treating as signed out");
                self.store.set(SessionState::Unauthenticated);
            }
        }
    }

    /// The store this synchronizer writes into.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}
