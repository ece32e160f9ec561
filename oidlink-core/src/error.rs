use thiserror::Error;

/// Every way a login attempt can fail.
///
/// The controller switches on the variant to pick between the uniform failure
/// path, the email-verification remediation and benign race recovery.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authorization code could not be exchanged for tokens.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),
    /// Signature, issuer, audience, algorithm or time checks on the identity token failed.
    #[error("Token validation failed: {0}")]
    TokenValidationFailed(String),
    /// The `state` value was not an outstanding nonce of the session.
    #[error("State mismatch: {0}")]
    StateMismatch(String),
    /// The verified token and the user-info profile name different subjects.
    #[error("Subject mismatch: token subject {token} does not match profile subject {profile}")]
    SubjectMismatch {
        /// Subject from the verified identity token.
        token: String,
        /// Subject from the provider profile response.
        profile: String,
    },
    /// A verified email is required but the identity has none.
    #[error("Email not set")]
    EmailNotSet,
    /// The identity's email is unverified where verification is mandatory.
    #[error("Email not verified")]
    EmailNotVerified,
    /// Another request linked the same external subject first.
    #[error("Identity link conflict for subject {0}")]
    IdentityLinkConflict(String),
    /// The local account could not be created.
    #[error("Account provisioning failed: {0}")]
    AccountProvisioningFailed(String),
    /// Transport or protocol failure talking to the identity provider.
    #[error("Provider error: {0}")]
    Provider(String),
    /// Session storage failure.
    #[error("Session error: {0}")]
    Session(String),
    /// Identity link or account storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether this error gets the email-verification remediation instead of
    /// the generic failure page.
    pub fn needs_email_verification(&self) -> bool {
        matches!(self, AuthError::EmailNotVerified)
    }
}
