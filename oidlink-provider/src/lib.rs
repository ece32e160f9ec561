use async_trait::async_trait;
use oidlink_core::{
    AuthError, ExternalIdentity, IdentityProvider, OidcSettings, Prompt, ProviderIdentity,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(default)]
    identities: Vec<ProviderIdentity>,
}

/// Talks to the tenant's authorization, token, user-info and management endpoints.
#[derive(Debug, Clone)]
pub struct OidcProviderClient {
    base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    http_client: reqwest::Client,
}

impl OidcProviderClient {
    pub fn new(settings: &OidcSettings, http_client: reqwest::Client) -> Self {
        Self {
            base_url: settings.provider_base_url(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.callback_url(),
            scopes: settings.scopes().join(" "),
            http_client,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| AuthError::Config(format!("Invalid provider URL: {e}")))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalIdentity, AuthError> {
        let response = self
            .http_client
            .get(self.endpoint("/userinfo")?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("User info request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::TokenExchangeFailed(format!(
                "User info endpoint returned {}",
                response.status()
            )));
        }

        let profile = response
            .json::<Map<String, Value>>()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("Malformed user info: {e}")))?;

        ExternalIdentity::from_profile(profile)
    }
}

#[async_trait]
impl IdentityProvider for OidcProviderClient {
    fn authorization_url(
        &self,
        prompt: Prompt,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        let mut url = self.endpoint("/authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("scope", &self.scopes);
            query.append_pair("state", state);
            if prompt == Prompt::Silent {
                query.append_pair("prompt", "none");
            }
        }
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<(ExternalIdentity, String), AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(self.endpoint("/oauth/token")?)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("Malformed token response: {e}")))?;

        let id_token = tokens.id_token.ok_or_else(|| {
            AuthError::TokenExchangeFailed("Token response carried no id_token".to_string())
        })?;

        let identity = self.fetch_profile(&tokens.access_token).await?;
        log::debug!("Exchanged authorization code for {}", identity.subject_id);
        Ok((identity, id_token))
    }

    async fn fetch_identities(
        &self,
        subject_id: &str,
        id_token: &str,
    ) -> Result<Vec<ProviderIdentity>, AuthError> {
        let path = format!("/api/v2/users/{}", urlencoding::encode(subject_id));
        let response = self
            .http_client
            .get(self.endpoint(&path)?)
            .bearer_auth(id_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("User lookup failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "User lookup returned {}",
                response.status()
            )));
        }

        let user = response
            .json::<UserRecord>()
            .await
            .map_err(|e| AuthError::Provider(format!("Malformed user record: {e}")))?;
        Ok(user.identities)
    }

    fn logout_url(&self, return_to: &str, client_id: Option<&str>) -> Result<String, AuthError> {
        let mut url = self.endpoint("/v2/logout")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("returnTo", return_to);
            if let Some(client_id) = client_id {
                query.append_pair("client_id", client_id);
            }
        }
        Ok(url.to_string())
    }

    async fn send_verification_email(
        &self,
        subject_id: &str,
        id_token: &str,
    ) -> Result<(), AuthError> {
        let path = format!(
            "/api/users/{}/send_verification_email",
            urlencoding::encode(subject_id)
        );
        let response = self
            .http_client
            .post(self.endpoint(&path)?)
            .bearer_auth(id_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Verification email request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "Verification email endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
