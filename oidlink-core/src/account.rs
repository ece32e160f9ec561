use crate::error::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a local application account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The slice of a local account the login bridge reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: AccountId,
    pub username: String,
    pub email: Option<String>,
    pub active: bool,
}

/// An account waiting to be saved by [`AccountDirectory::create`].
#[derive(Clone, Default)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub active: bool,
}

impl NewAccount {
    pub fn set_username(&mut self, username: impl Into<String>) -> &mut Self {
        self.username = username.into();
        self
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> &mut Self {
        self.email = email.into();
        self
    }

    pub fn set_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.password = password.into();
        self
    }

    pub fn activate(&mut self) -> &mut Self {
        self.active = true;
        self
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("active", &self.active)
            .finish()
    }
}

/// The application's account system.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Load an account by id.
    async fn load_by_id(&self, id: AccountId) -> Result<Option<LocalAccount>, AuthError>;

    /// Load the account owning `email`.
    async fn load_by_email(&self, email: &str) -> Result<Option<LocalAccount>, AuthError>;

    /// Load the account with `username`.
    async fn load_by_username(&self, username: &str) -> Result<Option<LocalAccount>, AuthError>;

    /// Persist a new account. Fails if the username is already taken.
    async fn create(&self, account: NewAccount) -> Result<LocalAccount, AuthError>;

    /// Mark the session as authenticated for `account`.
    async fn finalize_session(
        &self,
        account: &LocalAccount,
        session_id: &str,
    ) -> Result<(), AuthError>;

    /// Forget whichever account the session was authenticated as.
    async fn end_session(&self, _session_id: &str) -> Result<(), AuthError> {
        Ok(())
    }

    /// The account's canonical profile page.
    fn canonical_url(&self, account: &LocalAccount) -> String {
        format!("/user/{}", account.id)
    }
}
