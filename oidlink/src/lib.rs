//! # Oidlink
//!
//! Delegates user authentication to an OpenID Connect provider and maps the
//! verified identity onto local application accounts.
//!
//! This crate re-exports the oidlink workspace behind cargo features:
//!
//! - `session`: session-scoped state and login nonces.
//! - `token`: identity token validation.
//! - `provider`: the provider HTTP client.
//! - `store`: identity link storage (`sqlite`, `postgres` for the SQL backends).
//! - `flow`: reconciliation and the login flow controller.
//! - `axum`: axum routes for the login entry points.

pub use oidlink_core::{
    AccountDirectory, AccountId, AuthError, EventSink, ExternalIdentity, IdTokenVerifier,
    IdentityProvider, LocalAccount, LoginEvent, NewAccount, OidcSettings, Prompt,
    ProviderIdentity, VerifiedClaims,
};

pub use oidlink_core as core;

#[cfg(feature = "session")]
pub use oidlink_session as session;

#[cfg(feature = "token")]
pub use oidlink_token as token;

#[cfg(feature = "provider")]
pub use oidlink_provider as provider;

#[cfg(feature = "store")]
pub use oidlink_store as store;

#[cfg(feature = "flow")]
pub use oidlink_flow as flow;

#[cfg(feature = "flow")]
pub use oidlink_flow::{CallbackOutcome, LoginFlowController, Reconciliation};

#[cfg(feature = "axum")]
pub use oidlink_axum as axum;
