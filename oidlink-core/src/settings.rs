use crate::error::AuthError;
use serde::{Deserialize, Serialize};

/// Clock-skew leeway applied to `exp`/`nbf`/`iat` when none is configured.
pub const DEFAULT_JWT_LEEWAY: u64 = 25;

/// Default lifetime of an outstanding login nonce.
pub const DEFAULT_NONCE_TTL_SECS: i64 = 3600;

/// Default cap on outstanding nonces per session.
pub const DEFAULT_MAX_OUTSTANDING_NONCES: usize = 20;

/// Path of the provider callback, relative to the site base URL.
pub const CALLBACK_PATH: &str = "/auth0/callback";

/// Settings of the OIDC login bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcSettings {
    /// Tenant domain at the identity provider, e.g. `tenant.eu.auth0.com`.
    pub domain: String,
    /// Vanity domain serving the authorization and API endpoints.
    pub custom_domain: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    /// Accepted identity token signing algorithms, e.g. `RS256`, `HS256`.
    pub signing_algorithms: Vec<String>,
    /// Whether `client_secret` is base64 encoded.
    pub secret_base64_encoded: bool,
    /// Redirect silently to the provider instead of rendering a login widget.
    pub redirect_for_sso: bool,
    pub requires_verified_email: bool,
    /// Leeway in seconds; [`DEFAULT_JWT_LEEWAY`] when unset.
    pub jwt_leeway: Option<u64>,
    /// Request the `offline_access` scope.
    pub allow_offline_access: bool,
    pub allow_signup: bool,
    pub login_css: Option<String>,
    /// Opaque options handed to the login widget.
    pub lock_extra_settings: Option<serde_json::Value>,
    /// Site root, used for the callback URL and as logout return target.
    pub base_url: String,
    pub nonce_ttl_secs: i64,
    pub max_outstanding_nonces: usize,
}

impl Default for OidcSettings {
    fn default() -> Self {
        Self {
            domain: String::new(),
            custom_domain: None,
            client_id: String::new(),
            client_secret: String::new(),
            signing_algorithms: vec!["RS256".to_string()],
            secret_base64_encoded: false,
            redirect_for_sso: false,
            requires_verified_email: false,
            jwt_leeway: None,
            allow_offline_access: false,
            allow_signup: true,
            login_css: None,
            lock_extra_settings: None,
            base_url: "http://localhost:3000".to_string(),
            nonce_ttl_secs: DEFAULT_NONCE_TTL_SECS,
            max_outstanding_nonces: DEFAULT_MAX_OUTSTANDING_NONCES,
        }
    }
}

impl OidcSettings {
    /// Load settings from `OIDLINK_*` environment variables.
    ///
    /// `OIDLINK_DOMAIN` and `OIDLINK_CLIENT_ID` are required.
    pub fn from_env() -> Result<Self, AuthError> {
        let defaults = Self::default();
        let required = |name: &str| {
            std::env::var(name).map_err(|_| AuthError::Config(format!("{name} must be set")))
        };
        let flag = |name: &str, default: bool| {
            std::env::var(name)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(default)
        };
        let lock_extra_settings = match std::env::var("OIDLINK_LOCK_EXTRA_SETTINGS") {
            Ok(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                AuthError::Config(format!("OIDLINK_LOCK_EXTRA_SETTINGS is not JSON: {e}"))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            domain: required("OIDLINK_DOMAIN")?,
            custom_domain: std::env::var("OIDLINK_CUSTOM_DOMAIN")
                .ok()
                .filter(|d| !d.is_empty()),
            client_id: required("OIDLINK_CLIENT_ID")?,
            client_secret: std::env::var("OIDLINK_CLIENT_SECRET").unwrap_or_default(),
            signing_algorithms: std::env::var("OIDLINK_SIGNING_ALGORITHMS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.signing_algorithms),
            secret_base64_encoded: flag("OIDLINK_SECRET_BASE64_ENCODED", false),
            redirect_for_sso: flag("OIDLINK_REDIRECT_FOR_SSO", false),
            requires_verified_email: flag("OIDLINK_REQUIRES_VERIFIED_EMAIL", false),
            jwt_leeway: std::env::var("OIDLINK_JWT_LEEWAY")
                .ok()
                .and_then(|v| v.parse().ok()),
            allow_offline_access: flag("OIDLINK_ALLOW_OFFLINE_ACCESS", false),
            allow_signup: flag("OIDLINK_ALLOW_SIGNUP", true),
            login_css: std::env::var("OIDLINK_LOGIN_CSS").ok(),
            lock_extra_settings,
            base_url: std::env::var("OIDLINK_BASE_URL").unwrap_or(defaults.base_url),
            nonce_ttl_secs: std::env::var("OIDLINK_NONCE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.nonce_ttl_secs),
            max_outstanding_nonces: std::env::var("OIDLINK_MAX_OUTSTANDING_NONCES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_outstanding_nonces),
        })
    }

    /// Host serving the authorization and API endpoints.
    pub fn auth_domain(&self) -> &str {
        match self.custom_domain.as_deref() {
            Some(custom) if !custom.is_empty() => custom,
            _ => &self.domain,
        }
    }

    /// Base URL of the provider endpoints, without trailing slash.
    pub fn provider_base_url(&self) -> String {
        with_scheme(self.auth_domain())
    }

    /// The trusted issuer: always the tenant domain with a trailing slash.
    pub fn issuer(&self) -> String {
        format!("{}/", with_scheme(&self.domain))
    }

    /// Where the provider sends the user back to.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), CALLBACK_PATH)
    }

    pub fn leeway(&self) -> u64 {
        self.jwt_leeway.unwrap_or(DEFAULT_JWT_LEEWAY)
    }

    /// Scopes requested at the authorization endpoint.
    pub fn scopes(&self) -> Vec<&'static str> {
        let mut scopes = vec!["openid", "profile", "email"];
        if self.allow_offline_access {
            scopes.push("offline_access");
        }
        scopes
    }

    /// CDN base hosting the login widget for the tenant's region.
    pub fn tenant_cdn(&self) -> String {
        let host = self
            .domain
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let region = host
            .strip_suffix(".auth0.com")
            .and_then(|rest| rest.split_once('.'))
            .map(|(_, region)| region)
            .filter(|region| !region.is_empty() && *region != "us");
        match region {
            Some(region) => format!("https://cdn.{region}.auth0.com"),
            None => "https://cdn.auth0.com".to_string(),
        }
    }
}

fn with_scheme(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
