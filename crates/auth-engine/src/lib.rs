//! Session/auth-state engine for the scaffold.
//!
//! This crate provides:
//! - The process-wide session state store and its transition machine
//! - The auth state synchronizer bridging backend change signals into it
//! - The route guard keeping navigation consistent with auth state
//! - The action coordinator for sign-in/sign-up/sign-out sequences
//! - Trait seams for the auth backend and the federated identity provider

mod backend;
mod coordinator;
mod error;
mod federated;
mod route_guard;
mod session;
mod store;
mod sync;

pub use backend::{
    AuthBackend, AuthChangeCallback, AuthChangeEvent, BackendSubscription, SignUpData,
};
pub use coordinator::{ActionOutcome, AuthActionCoordinator, SignUpForm};
pub use error::{AuthError, AuthResult};
pub use federated::{FederatedCredential, FederatedError, FederatedIdentityProvider};
pub use route_guard::{navigation_target, Navigator, Route, RouteGuard};
pub use session::Session;
pub use store::session_machine;
pub use store::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionState, SessionStore,
    StateCallback, StoreSubscription,
};
pub use sync::AuthStateSynchronizer;
