//! # Oidlink Store
//!
//! Persistence of the binding between an external subject and a local account.
//! At most one local account per external subject; the uniqueness is enforced
//! by the storage backend itself so that racing sign-ups cannot both link.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oidlink_core::{AccountId, AuthError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory local account directory.
pub mod accounts;
pub use accounts::MemoryDirectory;

#[cfg(feature = "store-sqlx")]
pub mod sql_store;
#[cfg(feature = "store-sqlx")]
pub use sql_store::SqlLinkStore;

/// One external identity bound to one local account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub external_subject_id: String,
    pub local_account_id: AccountId,
    /// Last seen profile, kept for audit and display.
    pub cached_profile: Value,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityLinkStore: Send + Sync {
    /// The account linked to `subject_id`, if any.
    async fn find_by_external_id(&self, subject_id: &str) -> Result<Option<AccountId>, AuthError>;

    /// Link `subject_id` to `account`.
    ///
    /// Fails with [`AuthError::IdentityLinkConflict`] when the subject is already linked.
    async fn insert(
        &self,
        subject_id: &str,
        account: AccountId,
        profile: &Value,
    ) -> Result<(), AuthError>;

    /// Refresh the cached profile of an existing link.
    ///
    /// A missing link is logged and otherwise ignored.
    async fn update(&self, subject_id: &str, profile: &Value) -> Result<(), AuthError>;
}

/// In-memory identity link store.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    links: Mutex<HashMap<String, IdentityLink>>,
}

impl MemoryLinkStore {
    pub fn get(&self, subject_id: &str) -> Option<IdentityLink> {
        self.links.lock().ok()?.get(subject_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.links.lock().map(|links| links.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_links<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, IdentityLink>) -> R,
    ) -> Result<R, AuthError> {
        let mut links = self
            .links
            .lock()
            .map_err(|_| AuthError::Storage("Link store lock poisoned".to_string()))?;
        Ok(f(&mut links))
    }
}

#[async_trait]
impl IdentityLinkStore for MemoryLinkStore {
    async fn find_by_external_id(&self, subject_id: &str) -> Result<Option<AccountId>, AuthError> {
        self.with_links(|links| links.get(subject_id).map(|link| link.local_account_id))
    }

    async fn insert(
        &self,
        subject_id: &str,
        account: AccountId,
        profile: &Value,
    ) -> Result<(), AuthError> {
        self.with_links(|links| {
            if links.contains_key(subject_id) {
                return Err(AuthError::IdentityLinkConflict(subject_id.to_string()));
            }
            links.insert(
                subject_id.to_string(),
                IdentityLink {
                    external_subject_id: subject_id.to_string(),
                    local_account_id: account,
                    cached_profile: profile.clone(),
                    updated_at: Utc::now(),
                },
            );
            Ok(())
        })?
    }

    async fn update(&self, subject_id: &str, profile: &Value) -> Result<(), AuthError> {
        let updated = self.with_links(|links| match links.get_mut(subject_id) {
            Some(link) => {
                link.cached_profile = profile.clone();
                link.updated_at = Utc::now();
                true
            }
            None => false,
        })?;
        if !updated {
            log::warn!("No identity link to refresh for {subject_id}");
        }
        Ok(())
    }
}
