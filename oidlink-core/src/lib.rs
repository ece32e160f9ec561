//! # Oidlink Core
//!
//! `oidlink-core` holds the types shared by every oidlink crate: the verified
//! [`ExternalIdentity`], the local account view, the [`AuthError`] discriminant,
//! the [`OidcSettings`] and the traits behind which the identity provider, the
//! token verifier, the account system and the event consumer sit.

use async_trait::async_trait;

/// Errors that can occur during a login attempt.
pub mod error;
pub use error::AuthError;

/// External identities and verified token claims.
pub mod identity;
pub use identity::{Audience, ExternalIdentity, ProviderIdentity, VerifiedClaims};

/// Local accounts as seen by the login bridge.
pub mod account;
pub use account::{AccountDirectory, AccountId, LocalAccount, NewAccount};

/// Sign-in and sign-up notifications.
pub mod events;
pub use events::{ChannelEventSink, EventSink, LoginEvent};

/// Bridge configuration.
pub mod settings;
pub use settings::OidcSettings;

/// Secure random values.
pub mod random;

/// How the authorization endpoint should interact with the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Prompt {
    /// Let the provider decide whether to show its login UI.
    #[default]
    Interactive,
    /// `prompt=none`: never show UI, fail with `login_required` instead.
    Silent,
}

/// The identity provider's HTTP surface.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the authorization endpoint URL for `state`.
    fn authorization_url(
        &self,
        prompt: Prompt,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError>;

    /// Exchange an authorization code for the profile and the raw identity token.
    ///
    /// Tokens are never cached; every call performs a fresh exchange.
    async fn exchange_code(&self, code: &str) -> Result<(ExternalIdentity, String), AuthError>;

    /// Fetch the upstream identities of `subject_id`, authorized by `id_token`.
    async fn fetch_identities(
        &self,
        subject_id: &str,
        id_token: &str,
    ) -> Result<Vec<ProviderIdentity>, AuthError>;

    /// Provider logout URL. `client_id = None` logs out of every client.
    fn logout_url(&self, return_to: &str, client_id: Option<&str>) -> Result<String, AuthError>;

    /// Ask the provider to resend the verification email of `subject_id`.
    async fn send_verification_email(
        &self,
        subject_id: &str,
        id_token: &str,
    ) -> Result<(), AuthError>;
}

/// Verifies identity tokens.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    /// Check signature, algorithm, issuer, audience and time claims.
    ///
    /// Any failure is reported as [`AuthError::TokenValidationFailed`].
    async fn verify(&self, id_token: &str) -> Result<VerifiedClaims, AuthError>;
}
