//! # Oidlink Flow
//!
//! `oidlink-flow` orchestrates the authorization-code login: it issues the
//! `state` nonce, completes the provider callback and maps the verified
//! identity onto a local account.
//!
//! ## Key Components
//!
//! - **[`LoginFlowController`]**: the login, callback, logout and verification
//!   email entry points.
//! - **[`ReconciliationEngine`]**: signs in, joins or provisions a local account
//!   for a verified identity.

/// Login entry points.
pub mod controller;
/// Identity to account reconciliation.
pub mod reconcile;

pub use controller::{
    CallbackOutcome, CallbackParams, LoginFlowBuilder, LoginFlowController, LoginPage,
    LoginWidget, VerificationNotice, LOGIN_FAILED_NOTICE, VERIFY_EMAIL_NOTICE,
};
pub use reconcile::{Reconciliation, ReconciliationEngine};
