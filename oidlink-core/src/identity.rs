use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider names that mark a credential held by the identity provider itself
/// rather than a federated social or enterprise connection.
pub const NATIVE_PROVIDERS: &[&str] = &["auth0", "database"];

/// One upstream identity attached to a provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Provider name, e.g. `google-oauth2` or `auth0`.
    pub provider: String,
    /// Connection name at the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Whether the connection is a social login.
    #[serde(default, rename = "isSocial")]
    pub is_social: bool,
}

impl ProviderIdentity {
    /// Whether this identity authenticated directly at the provider.
    pub fn is_native(&self) -> bool {
        NATIVE_PROVIDERS.contains(&self.provider.as_str())
    }
}

/// A verified end user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider-unique, immutable subject identifier. Never empty.
    pub subject_id: String,
    /// Email address, if the provider shared one.
    pub email: Option<String>,
    /// Whether the provider vouches for the email.
    pub email_verified: bool,
    /// Short handle used to derive a local username.
    pub nickname: String,
    /// Human readable name.
    pub display_name: Option<String>,
    /// Upstream identities. `None` when the profile response omitted the list.
    pub identities: Option<Vec<ProviderIdentity>>,
    /// Every claim of the profile response, including the ones mapped above.
    pub claims: Map<String, Value>,
}

impl ExternalIdentity {
    /// Build an identity from a user-info profile document.
    ///
    /// The subject comes from `sub`, falling back to the legacy `user_id`.
    pub fn from_profile(profile: Map<String, Value>) -> Result<Self, AuthError> {
        let subject_id = string_claim(&profile, "sub")
            .or_else(|| string_claim(&profile, "user_id"))
            .ok_or_else(|| AuthError::Provider("Profile has no subject".to_string()))?;

        let email = string_claim(&profile, "email");
        let email_verified = match profile.get("email_verified") {
            Some(Value::Bool(verified)) => *verified,
            Some(Value::String(verified)) => verified.eq_ignore_ascii_case("true"),
            _ => false,
        };
        let display_name = string_claim(&profile, "name");
        let nickname = string_claim(&profile, "nickname")
            .or_else(|| display_name.clone())
            .or_else(|| {
                email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let identities = match profile.get("identities") {
            Some(Value::Null) | None => None,
            Some(value) => Some(
                serde_json::from_value::<Vec<ProviderIdentity>>(value.clone()).map_err(|e| {
                    AuthError::Provider(format!("Malformed identities list: {e}"))
                })?,
            ),
        };

        Ok(Self {
            subject_id,
            email,
            email_verified,
            nickname,
            display_name,
            identities,
            claims: profile,
        })
    }

    /// Whether any upstream identity is provider-native.
    ///
    /// Returns `None` when the identities list has not been fetched yet.
    pub fn is_provider_native(&self) -> Option<bool> {
        self.identities
            .as_ref()
            .map(|ids| ids.iter().any(ProviderIdentity::is_native))
    }

    /// The profile snapshot cached on the identity link.
    pub fn cached_profile(&self) -> Value {
        let mut profile = self.claims.clone();
        profile.insert("user_id".into(), Value::String(self.subject_id.clone()));
        if let Some(identities) = &self.identities {
            if let Ok(value) = serde_json::to_value(identities) {
                profile.insert("identities".into(), value);
            }
        }
        Value::Object(profile)
    }
}

fn string_claim(profile: &Map<String, Value>, key: &str) -> Option<String> {
    profile
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience.
    Single(String),
    /// Several audiences.
    Many(Vec<String>),
}

impl Audience {
    /// Whether `client_id` is among the audiences.
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|a| a == client_id),
        }
    }
}

/// Claims of an identity token that passed every validation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedClaims {
    /// Subject.
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: Audience,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued at.
    #[serde(default)]
    pub iat: Option<i64>,
    /// Not before.
    #[serde(default)]
    pub nbf: Option<i64>,
    /// Remaining claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
