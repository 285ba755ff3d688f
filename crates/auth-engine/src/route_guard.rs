//! Route guard: keeps the visible screen consistent with auth state.

use crate::store::{SessionState, SessionStore, StoreSubscription};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Screens the guard can redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Authenticated landing screen.
    Home,
    /// Sign-in screen.
    Login,
}

/// Seam to the navigation layer.
///
/// Auth-driven redirects always *replace* the current entry, never push, so
/// a signed-out user cannot rewind the back stack into authenticated
/// screens.
pub trait Navigator: Send + Sync {
    /// Replace the current screen with `route`.
    fn replace(&self, route: Route);
}

/// Where a given session state should land, if anywhere.
///
/// `Unknown` produces no navigation; the UI shows a loading indicator until
/// the state settles.
pub fn navigation_target(state: &SessionState) -> Option<Route> {
    match state {
        SessionState::Unknown => None,
        SessionState::Authenticated(_) => Some(Route::Home),
        SessionState::Unauthenticated => Some(Route::Login),
    }
}

struct GuardInner {
    navigator: Arc<dyn Navigator>,
    last_issued: Mutex<Option<Route>>,
}

impl GuardInner {
    fn apply(&self, state: &SessionState) {
        let Some(target) = navigation_target(state) else {
            return;
        };

        let mut last = self.last_issued.lock().unwrap();
        if *last == Some(target) {
            return;
        }
        *last = Some(target);
        drop(last);

        debug!(?target, "auth redirect");
        self.navigator.replace(target);
    }
}

/// Subscribes to the session store and redirects on every transition.
///
/// A notification that resolves to the target already issued is skipped, so
/// a state republish never disturbs in-flight user navigation. The store
/// subscription is released when the guard is dropped.
pub struct RouteGuard {
    _subscription: StoreSubscription,
}

impl RouteGuard {
    /// Install the guard on a store. The store's current state is applied
    /// immediately in case it settled before installation.
    pub fn install(store: &SessionStore, navigator: Arc<dyn Navigator>) -> Self {
        let inner = Arc::new(GuardInner {
            navigator,
            last_issued: Mutex::new(None),
        });

        let subscription = {
            let inner = inner.clone();
            store.subscribe(move |state| inner.apply(state))
        };
        inner.apply(&store.get());

        Self {
            _subscription: subscription,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;

    struct RecordingNavigator {
        replaces: Mutex<Vec<Route>>,
    }

    impl RecordingNavigator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                replaces: Mutex::new(Vec::new()),
            })
        }

        fn replaces(&self) -> Vec<Route> {
            self.replaces.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn replace(&self, route: Route) {
            self.replaces.lock().unwrap().push(route);
        }
    }

    #[test]
    fn test_navigation_target_mapping() {
        assert_eq!(navigation_target(&SessionState::Unknown), None);
        assert_eq!(
            navigation_target(&SessionState::Authenticated(Session::new("u"))),
            Some(Route::Home)
        );
        assert_eq!(
            navigation_target(&SessionState::Unauthenticated),
            Some(Route::Login)
        );
    }

    #[test]
    fn test_no_navigation_while_unknown() {
        let store = SessionStore::new();
        let navigator = RecordingNavigator::new();
        let _guard = RouteGuard::install(&store, navigator.clone());

        assert!(navigator.replaces().is_empty());
    }

    #[test]
    fn test_single_replace_per_transition() {
        let store = SessionStore::new();
        let navigator = RecordingNavigator::new();
        let _guard = RouteGuard::install(&store, navigator.clone());

        store.set(SessionState::Authenticated(Session::new("user-1")));
        assert_eq!(navigator.replaces(), vec![Route::Home]);

        store.set(SessionState::Unauthenticated);
        assert_eq!(navigator.replaces(), vec![Route::Home, Route::Login]);
    }

    #[test]
    fn test_republish_of_same_target_is_skipped() {
        let store = SessionStore::new();
        let navigator = RecordingNavigator::new();
        let _guard = RouteGuard::install(&store, navigator.clone());

        store.set(SessionState::Unauthenticated);
        store.set(SessionState::Unauthenticated);
        store.set(SessionState::Unauthenticated);

        assert_eq!(navigator.replaces(), vec![Route::Login]);
    }

    #[test]
    fn test_fresh_session_for_same_user_does_not_renavigate() {
        let store = SessionStore::new();
        let navigator = RecordingNavigator::new();
        let _guard = RouteGuard::install(&store, navigator.clone());

        store.set(SessionState::Authenticated(Session::new("user-1")));
        store.set(SessionState::Authenticated(Session::new("user-1")));

        assert_eq!(navigator.replaces(), vec![Route::Home]);
    }

    #[test]
    fn test_install_applies_already_settled_state() {
        let store = SessionStore::new();
        store.set(SessionState::Authenticated(Session::new("user-1")));

        let navigator = RecordingNavigator::new();
        let _guard = RouteGuard::install(&store, navigator.clone());

        assert_eq!(navigator.replaces(), vec![Route::Home]);
    }

    #[test]
    fn test_dropping_guard_stops_redirects() {
        let store = SessionStore::new();
        let navigator = RecordingNavigator::new();
        let guard = RouteGuard::install(&store, navigator.clone());
        drop(guard);

        store.set(SessionState::Unauthenticated);
        assert!(navigator.replaces().is_empty());
    }
}
