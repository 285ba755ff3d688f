//! Session state store: the process-wide source of truth for auth state.
//!
//! The store holds a tri-state value (`Unknown`, `Authenticated`,
//! `Unauthenticated`) and notifies subscribers synchronously, in
//! subscription order, on every update. The legal transition set is encoded
//! as an explicit state machine: no input leads back to `Unknown`, so the
//! state can never regress to undetermined once a determination was made.

use crate::Session;
use rust_fsm::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

// Define the FSM using rust-fsm's declarative macro
// This generates a module `session_machine` with:
// - session_machine::State (enum)
// - session_machine::Input (enum)
// - session_machine::StateMachine (type alias)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unknown)

    Unknown => {
        SignedIn => Authenticated,
        SignedOut => Unauthenticated
    },
    Authenticated => {
        SignedIn => Authenticated,
        SignedOut => Unauthenticated
    },
    Unauthenticated => {
        SignedIn => Authenticated,
        SignedOut => Unauthenticated
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Current authentication state as seen by the rest of the application.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No determination made yet (initial state).
    Unknown,
    /// A user is logged in.
    Authenticated(Session),
    /// Determined: nobody is logged in.
    Unauthenticated,
}

impl SessionState {
    /// Returns true if a user is logged in.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Returns true once the state has been determined either way.
    ///
    /// The UI shows a loading indicator while this is false.
    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }

    /// The session, when authenticated.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

/// Callback invoked with the new state on every store update.
pub type StateCallback = Arc<dyn Fn(&SessionState) + Send + Sync>;

struct StoreInner {
    machine: SessionMachine,
    session: Option<Session>,
    subscribers: Vec<(u64, StateCallback)>,
    disposed: bool,
}

impl StoreInner {
    fn current(&self) -> SessionState {
        match self.machine.state() {
            SessionMachineState::Unknown => SessionState::Unknown,
            SessionMachineState::Authenticated => self
                .session
                .clone()
                .map(SessionState::Authenticated)
                .unwrap_or(SessionState::Unauthenticated),
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
        }
    }
}

/// Process-wide observable holding the current authentication state.
///
/// Constructed explicitly and injected where needed; tests get isolation by
/// creating a fresh instance each. Exactly one component (the auth state
/// synchronizer) may call [`SessionStore::set`].
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
    next_subscriber_id: AtomicU64,
}

impl SessionStore {
    /// Create a store in the `Unknown` state with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                machine: SessionMachine::new(),
                session: None,
                subscribers: Vec::new(),
                disposed: false,
            })),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    /// Current state, synchronously.
    pub fn get(&self) -> SessionState {
        self.inner.lock().unwrap().current()
    }

    /// Returns true once the state has been determined either way.
    pub fn is_settled(&self) -> bool {
        self.get().is_settled()
    }

    /// Apply a determined state and notify all current subscribers, in
    /// subscription order, with the new value.
    ///
    /// Writes of `Unknown` are dropped: the state machine has no transition
    /// back to undetermined. Writes after [`SessionStore::dispose`] are
    /// no-ops.
    pub fn set(&self, state: SessionState) {
        let (new_state, subscribers) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.disposed {
                debug!("session store disposed, dropping update");
                return;
            }

            let input = match state {
                SessionState::Unknown => {
                    warn!("ignoring attempt to reset session state to unknown");
                    return;
                }
                SessionState::Authenticated(session) => {
                    inner.session = Some(session);
                    SessionMachineInput::SignedIn
                }
                SessionState::Unauthenticated => {
                    inner.session = None;
                    SessionMachineInput::SignedOut
                }
            };

            if inner.machine.consume(&input).is_err() {
                warn!(?input, "session machine rejected input");
                return;
            }

            let snapshot: Vec<StateCallback> = inner
                .subscribers
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect();
            (inner.current(), snapshot)
        };

        for callback in subscribers {
            callback(&new_state);
        }
    }

    /// Register a callback invoked on every future [`SessionStore::set`].
    ///
    /// The returned handle removes the callback when unsubscribed or
    /// dropped; unsubscribing twice is a no-op.
    pub fn subscribe(
        &self,
        callback: impl Fn(&SessionState) + Send + Sync + 'static,
    ) -> StoreSubscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        if inner.disposed {
            return StoreSubscription {
                inner: Weak::new(),
                id,
            };
        }
        inner.subscribers.push((id, Arc::new(callback)));
        StoreSubscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    /// Tear the store down: drop all subscribers and ignore further writes.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.disposed = true;
        inner.subscribers.clear();
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a registered store subscriber.
///
/// Unsubscribes on drop; [`StoreSubscription::unsubscribe`] does so eagerly
/// and is idempotent.
pub struct StoreSubscription {
    inner: Weak<Mutex<StoreInner>>,
    id: u64,
}

impl StoreSubscription {
    /// Remove the callback now. Calling this more than once is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap();
            inner.subscribers.retain(|(id, _)| *id != self.id);
        }
        self.inner = Weak::new();
    }
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
