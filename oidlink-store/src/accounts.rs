use async_trait::async_trait;
use oidlink_core::{AccountDirectory, AccountId, AuthError, LocalAccount, NewAccount};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Directory {
    next_id: i64,
    accounts: HashMap<AccountId, LocalAccount>,
    sessions: HashMap<String, AccountId>,
}

/// A local account directory held in memory.
///
/// Usernames are unique; emails are matched case-insensitively.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    inner: Mutex<Directory>,
}

impl MemoryDirectory {
    /// Add an account that predates the bridge, e.g. a local sign-up.
    pub fn seed(&self, username: &str, email: Option<&str>) -> Result<LocalAccount, AuthError> {
        self.with_directory(|d| {
            d.next_id += 1;
            let account = LocalAccount {
                id: AccountId(d.next_id),
                username: username.to_string(),
                email: email.map(str::to_string),
                active: true,
            };
            d.accounts.insert(account.id, account.clone());
            account
        })
    }

    /// The account a session is authenticated as.
    pub fn session_account(&self, session_id: &str) -> Option<AccountId> {
        self.inner.lock().ok()?.sessions.get(session_id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|d| d.accounts.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_directory<R>(&self, f: impl FnOnce(&mut Directory) -> R) -> Result<R, AuthError> {
        let mut directory = self
            .inner
            .lock()
            .map_err(|_| AuthError::Storage("Account directory lock poisoned".to_string()))?;
        Ok(f(&mut directory))
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn load_by_id(&self, id: AccountId) -> Result<Option<LocalAccount>, AuthError> {
        self.with_directory(|d| d.accounts.get(&id).cloned())
    }

    async fn load_by_email(&self, email: &str) -> Result<Option<LocalAccount>, AuthError> {
        self.with_directory(|d| {
            d.accounts
                .values()
                .find(|a| {
                    a.email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
                })
                .cloned()
        })
    }

    async fn load_by_username(&self, username: &str) -> Result<Option<LocalAccount>, AuthError> {
        self.with_directory(|d| d.accounts.values().find(|a| a.username == username).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<LocalAccount, AuthError> {
        self.with_directory(|d| {
            if d.accounts.values().any(|a| a.username == account.username) {
                return Err(AuthError::AccountProvisioningFailed(format!(
                    "Username {} is taken",
                    account.username
                )));
            }
            d.next_id += 1;
            let created = LocalAccount {
                id: AccountId(d.next_id),
                username: account.username,
                email: Some(account.email).filter(|e| !e.is_empty()),
                active: account.active,
            };
            d.accounts.insert(created.id, created.clone());
            Ok(created)
        })?
    }

    async fn finalize_session(
        &self,
        account: &LocalAccount,
        session_id: &str,
    ) -> Result<(), AuthError> {
        self.with_directory(|d| {
            d.sessions.insert(session_id.to_string(), account.id);
        })
    }

    async fn end_session(&self, session_id: &str) -> Result<(), AuthError> {
        self.with_directory(|d| {
            d.sessions.remove(session_id);
        })
    }
}
