//! # invoiceforge-auth
//!
//! Client-side authentication session lifecycle for the InvoiceForge web
//! app: a reactive session store, the startup session fetch, the provider
//! event listener, profile sync on sign-in, and the OAuth callback redirect.
//!
//! ARCHITECTURE
//! ============
//! `runtime::AuthRuntime` owns one `store::SessionStore` and its two
//! producers (`bootstrap`, `listener`). `profile_sync` and `callback` react
//! to state transitions. The identity provider, profile store, and router
//! sit behind the traits in `provider`; `supabase` is the HTTP-backed
//! implementation.

pub mod bootstrap;
pub mod callback;
pub mod config;
pub mod error;
pub mod guard;
pub mod listener;
pub mod model;
pub mod profile_sync;
pub mod provider;
pub mod runtime;
pub mod store;
pub mod supabase;

#[cfg(test)]
pub(crate) mod testing;

pub use error::AuthError;
pub use model::{AuthEvent, AuthEventKind, Identity, ProfileRecord, Session};
pub use runtime::AuthRuntime;
pub use store::{AuthState, SessionStore, WritePolicy};
