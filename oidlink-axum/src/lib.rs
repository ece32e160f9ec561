//! # Oidlink Axum
//!
//! Routes the oidlink login bridge into an axum application: `/login`, the
//! provider callback, `/logout` and the verification email resend. The
//! session is identified by a cookie; notices travel in a one-shot cookie.

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oidlink_core::settings::CALLBACK_PATH;
use oidlink_core::AuthError;
use oidlink_flow::LoginFlowController;
use oidlink_session::SessionStore;
use std::sync::Arc;
use thiserror::Error;
use tower_cookies::CookieManagerLayer;

pub mod helpers;

pub use helpers::*;

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Only send the cookie over HTTPS.
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "oidlink_session".to_string(),
            secure: true,
        }
    }
}

/// Everything the oidlink routes need.
#[derive(Clone)]
pub struct OidlinkState {
    pub controller: Arc<LoginFlowController>,
    pub session_store: Arc<dyn SessionStore>,
    pub session_config: SessionConfig,
}

impl OidlinkState {
    pub fn new(controller: Arc<LoginFlowController>, session_store: Arc<dyn SessionStore>) -> Self {
        Self {
            controller,
            session_store,
            session_config: SessionConfig::default(),
        }
    }

    pub fn with_session_config(mut self, session_config: SessionConfig) -> Self {
        self.session_config = session_config;
        self
    }

    /// Router serving the login bridge endpoints.
    pub fn axum_router<AppState>(&self) -> axum::Router<AppState>
    where
        AppState: Clone + Send + Sync + 'static,
        OidlinkState: FromRef<AppState>,
    {
        use axum::routing::{get, post};
        axum::Router::new()
            .route("/login", get(helpers::axum_login_handler))
            .route(CALLBACK_PATH, get(helpers::axum_callback_handler))
            .route("/logout", get(helpers::axum_logout_handler))
            .route(VERIFY_EMAIL_PATH, post(helpers::axum_verify_email_handler))
            .layer(CookieManagerLayer::new())
    }
}

#[derive(Debug, Error)]
pub enum OidlinkAxumError {
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for OidlinkAxumError {
    fn from(err: AuthError) -> Self {
        OidlinkAxumError::Internal(err.to_string())
    }
}

impl IntoResponse for OidlinkAxumError {
    fn into_response(self) -> Response {
        log::error!("{self}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
