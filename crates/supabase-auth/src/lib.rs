//! Supabase auth backend for the scaffold.
//!
//! This crate provides:
//! - A GoTrue REST client implementing the engine's backend trait
//! - Durable session storage behind a narrow key-value trait
//! - Change-event fan-out to registered listeners

mod client;
mod storage;

pub use client::SupabaseAuthClient;
pub use storage::{
    FileStorage, MemoryStorage, SecretsManager, SessionStorage, StorageError, StorageKeys,
    StorageResult, StoredSession,
};
