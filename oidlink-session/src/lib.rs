//! # Oidlink Session
//!
//! Session-scoped storage for the login bridge. The framework owns the session;
//! oidlink reaches it through an explicit, request-scoped [`SessionContext`]
//! backed by a [`SessionStore`].

use async_trait::async_trait;
use oidlink_core::AuthError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Single-use login nonces.
pub mod nonce;
pub use nonce::NonceStore;

/// Key/value storage scoped to a session id.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, AuthError>;

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), AuthError>;

    /// Atomically replace `key` with `new` if its current value equals `expected`.
    ///
    /// Returns `false` when another writer got there first.
    async fn compare_and_swap(
        &self,
        session_id: &str,
        key: &str,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool, AuthError>;

    /// Move every value of `from` under `to`. `from` no longer exists afterwards.
    async fn rename(&self, from: &str, to: &str) -> Result<(), AuthError>;

    /// Drop every value of the session.
    async fn destroy(&self, session_id: &str) -> Result<(), AuthError>;
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    fn with_sessions<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, HashMap<String, Value>>) -> R,
    ) -> Result<R, AuthError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| AuthError::Session("Memory store lock poisoned".to_string()))?;
        Ok(f(&mut sessions))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>, AuthError> {
        self.with_sessions(|s| s.get(session_id).and_then(|values| values.get(key)).cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<(), AuthError> {
        self.with_sessions(|s| {
            s.entry(session_id.to_string())
                .or_default()
                .insert(key.to_string(), value);
        })
    }

    async fn compare_and_swap(
        &self,
        session_id: &str,
        key: &str,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool, AuthError> {
        self.with_sessions(|s| {
            let values = s.entry(session_id.to_string()).or_default();
            if values.get(key) != expected {
                return false;
            }
            values.insert(key.to_string(), new);
            true
        })
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), AuthError> {
        self.with_sessions(|s| {
            if let Some(values) = s.remove(from) {
                s.insert(to.to_string(), values);
            }
        })
    }

    async fn destroy(&self, session_id: &str) -> Result<(), AuthError> {
        self.with_sessions(|s| {
            s.remove(session_id);
        })
    }
}

/// The current request's view of its session.
#[derive(Clone)]
pub struct SessionContext {
    id: Option<String>,
    store: Arc<dyn SessionStore>,
}

impl SessionContext {
    /// Wrap the session identified by `id`, or a not yet started one.
    pub fn new(store: Arc<dyn SessionStore>, id: Option<String>) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.id.is_some()
    }

    /// Start the session if needed and return its id.
    pub fn start(&mut self) -> &str {
        self.id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .as_str()
    }

    /// Move the session to a fresh id, keeping its values.
    ///
    /// The previous id stops naming any session, so an id known before
    /// authentication is worthless after it.
    pub async fn regenerate(&mut self) -> Result<&str, AuthError> {
        let fresh = uuid::Uuid::new_v4().to_string();
        if let Some(previous) = self.id.as_deref() {
            self.store.rename(previous, &fresh).await?;
        }
        Ok(self.id.insert(fresh).as_str())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AuthError> {
        match self.get_raw(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| AuthError::Session(format!("Corrupt session value {key}: {e}"))),
            None => Ok(None),
        }
    }

    /// Store `value`, starting the session first if necessary.
    pub async fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), AuthError> {
        let value = serde_json::to_value(value)
            .map_err(|e| AuthError::Session(format!("Unserializable session value {key}: {e}")))?;
        let store = self.store.clone();
        store.set(self.start(), key, value).await
    }

    pub(crate) async fn get_raw(&self, key: &str) -> Result<Option<Value>, AuthError> {
        match &self.id {
            Some(id) => self.store.get(id, key).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool, AuthError> {
        let id = self
            .id
            .as_deref()
            .ok_or_else(|| AuthError::Session("Session not started".to_string()))?;
        self.store.compare_and_swap(id, key, expected, new).await
    }

    /// Destroy the session. The context is left unstarted.
    pub async fn destroy(&mut self) -> Result<(), AuthError> {
        if let Some(id) = self.id.take() {
            self.store.destroy(&id).await?;
        }
        Ok(())
    }
}
