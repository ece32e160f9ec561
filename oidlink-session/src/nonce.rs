use crate::SessionContext;
use chrono::{DateTime, Duration, Utc};
use oidlink_core::random::{random_token, NONCE_ENTROPY_BYTES};
use oidlink_core::{AuthError, OidcSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;

/// Session key holding the outstanding nonces.
pub const NONCE_KEY: &str = "oidlink.nonces";

const MAX_SWAP_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NonceEntry {
    value: String,
    issued_at: DateTime<Utc>,
}

/// Issues and single-use validates `state` values.
///
/// A session may hold several outstanding nonces at once (one per login tab).
/// Updates go through the session store's compare-and-swap so concurrent
/// consumers of the same session never both win one nonce, and never clobber
/// each other's removals.
#[derive(Debug, Clone)]
pub struct NonceStore {
    ttl: Duration,
    max_outstanding: usize,
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::from_settings(&OidcSettings::default())
    }
}

impl NonceStore {
    pub fn new(ttl: Duration, max_outstanding: usize) -> Self {
        Self {
            ttl,
            max_outstanding: max_outstanding.max(1),
        }
    }

    pub fn from_settings(settings: &OidcSettings) -> Self {
        Self::new(
            Duration::seconds(settings.nonce_ttl_secs),
            settings.max_outstanding_nonces,
        )
    }

    /// Generate a nonce, add it to the session's outstanding set and return it.
    ///
    /// Starts the session if it was not started yet.
    pub async fn issue(&self, session: &mut SessionContext) -> Result<String, AuthError> {
        session.start();
        let value = random_token(NONCE_ENTROPY_BYTES);

        for _ in 0..MAX_SWAP_ATTEMPTS {
            let current = session.get_raw(NONCE_KEY).await?;
            let mut entries = self.live_entries(current.as_ref());
            entries.push(NonceEntry {
                value: value.clone(),
                issued_at: Utc::now(),
            });
            if entries.len() > self.max_outstanding {
                let excess = entries.len() - self.max_outstanding;
                entries.drain(..excess);
            }

            if session
                .compare_and_swap(NONCE_KEY, current.as_ref(), encode(&entries)?)
                .await?
            {
                return Ok(value);
            }
        }

        Err(AuthError::Session(
            "Gave up storing nonce after repeated concurrent updates".to_string(),
        ))
    }

    /// Remove `candidate` from the outstanding set.
    ///
    /// Returns `false` when it is not outstanding: never issued, already
    /// consumed, expired, or the session holds no nonces at all.
    pub async fn consume(
        &self,
        session: &SessionContext,
        candidate: &str,
    ) -> Result<bool, AuthError> {
        if !session.is_started() {
            log::warn!("Couldn't verify state because the session was never started");
            return Ok(false);
        }

        for _ in 0..MAX_SWAP_ATTEMPTS {
            let Some(current) = session.get_raw(NONCE_KEY).await? else {
                log::warn!("Couldn't verify state because there was no nonce in storage");
                return Ok(false);
            };

            let mut entries = self.live_entries(Some(&current));
            let position = entries
                .iter()
                .position(|entry| bool::from(entry.value.as_bytes().ct_eq(candidate.as_bytes())));

            let Some(position) = position else {
                log::warn!(
                    "State not found among {} outstanding nonces",
                    entries.len()
                );
                return Ok(false);
            };

            entries.remove(position);
            if session
                .compare_and_swap(NONCE_KEY, Some(&current), encode(&entries)?)
                .await?
            {
                return Ok(true);
            }
            log::debug!("Nonce set changed concurrently, retrying consume");
        }

        Err(AuthError::Session(
            "Gave up consuming nonce after repeated concurrent updates".to_string(),
        ))
    }

    /// Number of live nonces held by the session.
    pub async fn outstanding(&self, session: &SessionContext) -> Result<usize, AuthError> {
        let current = session.get_raw(NONCE_KEY).await?;
        Ok(self.live_entries(current.as_ref()).len())
    }

    fn live_entries(&self, stored: Option<&Value>) -> Vec<NonceEntry> {
        let mut entries: Vec<NonceEntry> = stored
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        let cutoff = Utc::now() - self.ttl;
        entries.retain(|entry| entry.issued_at > cutoff);
        entries
    }
}

fn encode(entries: &[NonceEntry]) -> Result<Value, AuthError> {
    serde_json::to_value(entries)
        .map_err(|e| AuthError::Session(format!("Failed to encode nonces: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, SessionStore};
    use serde_json::json;
    use std::sync::Arc;

    fn session() -> SessionContext {
        SessionContext::new(Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn nonce_is_single_use() {
        let store = NonceStore::default();
        let mut session = session();
        let nonce = store.issue(&mut session).await.unwrap();

        assert!(store.consume(&session, &nonce).await.unwrap());
        assert!(!store.consume(&session, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn outstanding_nonces_are_independent() {
        let store = NonceStore::default();
        let mut session = session();
        let first = store.issue(&mut session).await.unwrap();
        let second = store.issue(&mut session).await.unwrap();
        assert_ne!(first, second);

        assert!(store.consume(&session, &second).await.unwrap());
        assert_eq!(store.outstanding(&session).await.unwrap(), 1);
        assert!(store.consume(&session, &first).await.unwrap());
        assert_eq!(store.outstanding(&session).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_or_corrupt_list_is_not_found() {
        let store = NonceStore::default();
        let backend = Arc::new(MemoryStore::default());
        let unstarted = SessionContext::new(backend.clone(), None);
        assert!(!store.consume(&unstarted, "anything").await.unwrap());

        let started = SessionContext::new(backend.clone(), Some("sid".into()));
        assert!(!store.consume(&started, "anything").await.unwrap());

        backend.set("sid", NONCE_KEY, json!("garbage")).await.unwrap();
        assert!(!store.consume(&started, "anything").await.unwrap());
    }

    #[tokio::test]
    async fn expired_nonces_never_match() {
        let store = NonceStore::new(Duration::seconds(-1), 20);
        let mut session = session();
        let nonce = store.issue(&mut session).await.unwrap();
        assert!(!store.consume(&session, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn oldest_nonce_is_dropped_past_the_cap() {
        let store = NonceStore::new(Duration::hours(1), 2);
        let mut session = session();
        let oldest = store.issue(&mut session).await.unwrap();
        let middle = store.issue(&mut session).await.unwrap();
        let newest = store.issue(&mut session).await.unwrap();

        assert!(!store.consume(&session, &oldest).await.unwrap());
        assert!(store.consume(&session, &middle).await.unwrap());
        assert!(store.consume(&session, &newest).await.unwrap());
    }

    #[tokio::test]
    async fn racing_consumers_only_one_wins() {
        let store = Arc::new(NonceStore::default());
        let mut session = session();
        let nonce = store.issue(&mut session).await.unwrap();
        let other = store.issue(&mut session).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let session = session.clone();
                let nonce = nonce.clone();
                tokio::spawn(async move { store.consume(&session, &nonce).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(store.consume(&session, &other).await.unwrap());
    }
}
