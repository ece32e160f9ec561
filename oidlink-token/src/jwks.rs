use crate::ValidationError;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Unknown `kid`s trigger at most one refetch per this interval.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const KEYS_TTL: Duration = Duration::from_secs(3600);

/// One entry of the tenant's `jwks.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl Jwk {
    fn component<'a>(&self, value: &'a Option<String>, name: &str) -> Result<&'a str, ValidationError> {
        value.as_deref().ok_or_else(|| {
            ValidationError::InvalidToken(format!("{} key lacks '{name}'", self.kty))
        })
    }

    pub fn to_decoding_key(&self) -> Result<DecodingKey, ValidationError> {
        match self.kty.as_str() {
            "RSA" => Ok(DecodingKey::from_rsa_components(
                self.component(&self.n, "n")?,
                self.component(&self.e, "e")?,
            )?),
            "EC" => Ok(DecodingKey::from_ec_components(
                self.component(&self.x, "x")?,
                self.component(&self.y, "y")?,
            )?),
            other => Err(ValidationError::InvalidToken(format!(
                "Unsupported signing key type {other}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Default)]
struct SigningKeys {
    by_kid: HashMap<String, DecodingKey>,
    /// First usable key, for tokens whose header names no `kid`.
    fallback: Option<DecodingKey>,
    fetched_at: Option<Instant>,
}

impl SigningKeys {
    fn lookup(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self.by_kid.get(kid).cloned(),
            None => self.fallback.clone(),
        }
    }

    fn fresh(&self) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < KEYS_TTL)
    }

    fn recently_fetched(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL)
    }
}

/// Decoding keys of the tenant, keyed by `kid`.
///
/// Keys are reloaded once they are an hour old, or when a token names a `kid`
/// the cache does not hold (the tenant may have rotated its keys).
pub struct JwksCache {
    jwks_uri: String,
    http_client: reqwest::Client,
    keys: RwLock<SigningKeys>,
}

impl JwksCache {
    pub fn new(jwks_uri: String, http_client: reqwest::Client) -> Self {
        Self {
            jwks_uri,
            http_client,
            keys: RwLock::new(SigningKeys::default()),
        }
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Key for a token header's `kid`.
    pub async fn key(&self, kid: Option<&str>) -> Result<DecodingKey, ValidationError> {
        {
            let keys = self.keys.read().await;
            if keys.fresh() {
                if let Some(key) = keys.lookup(kid) {
                    return Ok(key);
                }
            }
        }

        let mut keys = self.keys.write().await;
        // Another caller may have reloaded while we waited for the lock.
        if let Some(key) = keys.lookup(kid).filter(|_| keys.fresh()) {
            return Ok(key);
        }
        if keys.fresh() && keys.recently_fetched() {
            return Err(ValidationError::KeyNotFound);
        }

        *keys = self.fetch().await?;
        keys.lookup(kid).ok_or(ValidationError::KeyNotFound)
    }

    async fn fetch(&self) -> Result<SigningKeys, ValidationError> {
        log::debug!("Fetching signing keys from {}", self.jwks_uri);
        let set: JwkSet = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = SigningKeys {
            fetched_at: Some(Instant::now()),
            ..SigningKeys::default()
        };
        for jwk in set.keys {
            if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
                continue;
            }
            let key = match jwk.to_decoding_key() {
                Ok(key) => key,
                Err(e) => {
                    log::warn!("Skipping signing key {:?}: {e}", jwk.kid);
                    continue;
                }
            };
            if keys.fallback.is_none() {
                keys.fallback = Some(key.clone());
            }
            if let Some(kid) = jwk.kid {
                keys.by_kid.insert(kid, key);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn cache(server: &MockServer) -> JwksCache {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [
                    {"kid": "enc", "kty": "RSA", "use": "enc", "n": "AQAB", "e": "AQAB"},
                    {"kid": "a", "kty": "RSA", "use": "sig", "n": "AQAB", "e": "AQAB"},
                    {"kid": "b", "kty": "RSA", "n": "AQAB", "e": "AQAB"},
                    {"kid": "odd", "kty": "oct"}
                ]
            })))
            .expect(1)
            .mount(server)
            .await;

        JwksCache::new(
            format!("{}/.well-known/jwks.json", server.uri()),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn loads_signing_keys_once() {
        let server = MockServer::start().await;
        let cache = cache(&server).await;

        assert!(cache.key(Some("b")).await.is_ok());
        assert!(cache.key(Some("a")).await.is_ok());
        assert!(cache.key(None).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_kid_does_not_refetch_immediately() {
        let server = MockServer::start().await;
        let cache = cache(&server).await;

        assert!(cache.key(Some("a")).await.is_ok());
        for kid in ["enc", "odd", "missing"] {
            assert!(matches!(
                cache.key(Some(kid)).await,
                Err(ValidationError::KeyNotFound)
            ));
        }
    }

    #[test]
    fn rejects_symmetric_keys() {
        let jwk: Jwk = serde_json::from_value(json!({"kty": "oct", "k": "c2VjcmV0"})).unwrap();
        assert!(jwk.to_decoding_key().is_err());
    }
}
