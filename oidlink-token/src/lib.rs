//! # Oidlink Token
//!
//! Verifies identity tokens returned by the provider's token endpoint.
//! HMAC tokens are checked against the client secret, RSA and EC tokens against the
//! tenant's published JWKS. A token is either fully trusted or rejected.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use oidlink_core::{AuthError, IdTokenVerifier, OidcSettings, VerifiedClaims};
use std::str::FromStr;
use thiserror::Error;

/// JWKS retrieval and caching.
pub mod jwks;
pub use jwks::JwksCache;

/// Why a token was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Algorithm {0:?} is not accepted")]
    UnsupportedAlgorithm(Algorithm),
    #[error("Key not found in JWKS")]
    KeyNotFound,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ValidationError {
    /// Whether the only problem with the token is its age.
    pub fn is_expired(&self) -> bool {
        matches!(
            self,
            ValidationError::Jwt(e)
                if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature)
        )
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Config(msg) => AuthError::Config(msg),
            other => AuthError::TokenValidationFailed(other.to_string()),
        }
    }
}

fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Validates identity tokens for one client of one tenant.
pub struct IdTokenValidator {
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    leeway: u64,
    secret: Option<DecodingKey>,
    jwks: Option<JwksCache>,
}

impl IdTokenValidator {
    /// Build a validator from the bridge settings.
    ///
    /// A shared secret is prepared when an HMAC algorithm is accepted, a JWKS
    /// cache for the tenant when an asymmetric one is.
    pub fn from_settings(
        settings: &OidcSettings,
        http_client: reqwest::Client,
    ) -> Result<Self, ValidationError> {
        let algorithms = settings
            .signing_algorithms
            .iter()
            .map(|name| {
                Algorithm::from_str(name)
                    .map_err(|_| ValidationError::Config(format!("Unknown signing algorithm {name}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if algorithms.is_empty() {
            return Err(ValidationError::Config(
                "At least one signing algorithm must be accepted".to_string(),
            ));
        }

        let secret = if algorithms.iter().copied().any(is_hmac) {
            Some(if settings.secret_base64_encoded {
                DecodingKey::from_base64_secret(&settings.client_secret).map_err(|e| {
                    ValidationError::Config(format!("Client secret is not valid base64: {e}"))
                })?
            } else {
                DecodingKey::from_secret(settings.client_secret.as_bytes())
            })
        } else {
            None
        };

        let jwks = if algorithms.iter().any(|alg| !is_hmac(*alg)) {
            Some(JwksCache::new(
                format!("{}.well-known/jwks.json", settings.issuer()),
                http_client,
            ))
        } else {
            None
        };

        Ok(Self {
            issuer: settings.issuer(),
            audience: settings.client_id.clone(),
            algorithms,
            leeway: settings.leeway(),
            secret,
            jwks,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify `id_token` and decode its claims.
    pub async fn validate(&self, id_token: &str) -> Result<VerifiedClaims, ValidationError> {
        let header = decode_header(id_token)?;
        if !self.algorithms.contains(&header.alg) {
            return Err(ValidationError::UnsupportedAlgorithm(header.alg));
        }

        let key = if is_hmac(header.alg) {
            self.secret
                .clone()
                .ok_or_else(|| ValidationError::Config("No shared secret configured".to_string()))?
        } else {
            let cache = self
                .jwks
                .as_ref()
                .ok_or_else(|| ValidationError::Config("No JWKS configured".to_string()))?;
            cache.key(header.kid.as_deref()).await?
        };

        let mut validation = Validation::new(header.alg);
        validation.algorithms = vec![header.alg];
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<VerifiedClaims>(id_token, &key, &validation)?.claims;

        if claims.sub.is_empty() {
            return Err(ValidationError::InvalidToken("Empty subject".to_string()));
        }
        if let Some(iat) = claims.iat {
            if iat > chrono::Utc::now().timestamp() + self.leeway as i64 {
                return Err(ValidationError::InvalidToken(
                    "Token issued in the future".to_string(),
                ));
            }
        }

        Ok(claims)
    }
}

#[async_trait]
impl IdTokenVerifier for IdTokenValidator {
    async fn verify(&self, id_token: &str) -> Result<VerifiedClaims, AuthError> {
        self.validate(id_token).await.map_err(AuthError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    const SECRET: &str = "a-very-long-test-client-secret-value";

    fn settings() -> OidcSettings {
        OidcSettings {
            domain: "tenant.auth0.com".into(),
            client_id: "client-123".into(),
            client_secret: SECRET.into(),
            signing_algorithms: vec!["HS256".into()],
            ..OidcSettings::default()
        }
    }

    fn validator(settings: &OidcSettings) -> IdTokenValidator {
        IdTokenValidator::from_settings(settings, reqwest::Client::new()).unwrap()
    }

    fn claims() -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "iss": "https://tenant.auth0.com/",
            "sub": "auth0|42",
            "aud": "client-123",
            "iat": now,
            "exp": now + 600,
            "email": "a@example.com"
        })
    }

    fn sign(alg: Algorithm, claims: &Value, secret: &[u8]) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let token = sign(Algorithm::HS256, &claims(), SECRET.as_bytes());
        let verified = validator(&settings()).validate(&token).await.unwrap();
        assert_eq!(verified.sub, "auth0|42");
        assert_eq!(verified.extra.get("email"), Some(&json!("a@example.com")));
    }

    #[tokio::test]
    async fn accepts_audience_list() {
        let mut claims = claims();
        claims["aud"] = json!(["https://api.example.com", "client-123"]);
        let token = sign(Algorithm::HS256, &claims, SECRET.as_bytes());
        assert!(validator(&settings()).validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_foreign_issuer_with_valid_signature() {
        let mut claims = claims();
        claims["iss"] = json!("https://tenant.auth0.com");
        let token = sign(Algorithm::HS256, &claims, SECRET.as_bytes());
        let err = validator(&settings()).validate(&token).await.unwrap_err();
        assert!(matches!(err, ValidationError::Jwt(_)));
    }

    #[tokio::test]
    async fn rejects_algorithm_outside_accepted_set() {
        let token = sign(Algorithm::HS384, &claims(), SECRET.as_bytes());
        let err = validator(&settings()).validate(&token).await.unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedAlgorithm(Algorithm::HS384)));
    }

    #[tokio::test]
    async fn rejects_asymmetric_header_on_hmac_client() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims().to_string());
        let token = format!("{header}.{payload}.c2lnbmF0dXJl");
        let err = validator(&settings()).validate(&token).await.unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedAlgorithm(Algorithm::RS256)));
    }

    #[tokio::test]
    async fn rejects_wrong_audience_and_signature() {
        let mut other_aud = claims();
        other_aud["aud"] = json!("someone-else");
        let token = sign(Algorithm::HS256, &other_aud, SECRET.as_bytes());
        assert!(validator(&settings()).validate(&token).await.is_err());

        let forged = sign(Algorithm::HS256, &claims(), b"not-the-client-secret-at-all");
        assert!(validator(&settings()).validate(&forged).await.is_err());
    }

    #[tokio::test]
    async fn expiry_honours_leeway() {
        let mut stale = claims();
        stale["exp"] = json!(chrono::Utc::now().timestamp() - 10);
        let token = sign(Algorithm::HS256, &stale, SECRET.as_bytes());
        assert!(validator(&settings()).validate(&token).await.is_ok());

        let mut strict = settings();
        strict.jwt_leeway = Some(0);
        let err = validator(&strict).validate(&token).await.unwrap_err();
        assert!(err.is_expired());
    }

    #[tokio::test]
    async fn rejects_future_iat() {
        let mut claims = claims();
        claims["iat"] = json!(chrono::Utc::now().timestamp() + 3600);
        let token = sign(Algorithm::HS256, &claims, SECRET.as_bytes());
        let err = validator(&settings()).validate(&token).await.unwrap_err();
        assert!(matches!(err, ValidationError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn base64_secret_is_decoded() {
        let mut settings = settings();
        settings.secret_base64_encoded = true;
        settings.client_secret = STANDARD.encode(SECRET);
        let token = sign(Algorithm::HS256, &claims(), SECRET.as_bytes());
        assert!(validator(&settings).validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn malformed_token_maps_to_validation_failure() {
        let err = validator(&settings()).verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenValidationFailed(_)));
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let mut settings = settings();
        settings.signing_algorithms = vec!["XX999".into()];
        let err = IdTokenValidator::from_settings(&settings, reqwest::Client::new()).err();
        assert!(matches!(err, Some(ValidationError::Config(_))));
    }
}
