use crate::reconcile::{Reconciliation, ReconciliationEngine};
use oidlink_core::{
    AccountDirectory, AuthError, EventSink, IdTokenVerifier, IdentityProvider, LocalAccount,
    OidcSettings, Prompt,
};
use oidlink_session::{NonceStore, SessionContext};
use oidlink_store::IdentityLinkStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The only message a failed login ever shows.
pub const LOGIN_FAILED_NOTICE: &str =
    "There was a problem logging you in, sorry for the inconvenience.";
pub const VERIFY_EMAIL_NOTICE: &str =
    "Please verify your email and log in again.";
pub const VERIFICATION_SENT_NOTICE: &str = "An Authorization email was sent to your account";
pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired.";
pub const VERIFICATION_FAILED_NOTICE: &str = "Sorry, we couldn't send the email";

/// Where every failure and notice lands.
pub const SITE_ROOT: &str = "/";

const LOGIN_REQUIRED: &str = "login_required";

/// Query parameters of the provider callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Client-side settings of the hosted login widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginWidget {
    pub client_id: String,
    pub domain: String,
    pub callback_url: String,
    /// Freshly issued nonce, sent back as `state`.
    pub state: String,
    pub scope: String,
    pub show_signup: bool,
    pub lock_options: Option<Value>,
    pub login_css: Option<String>,
    /// CDN base hosting the widget script.
    pub cdn: String,
}

/// What the login entry point should do.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginPage {
    /// Send the browser to the provider.
    Redirect(String),
    /// Render the login widget.
    Render(LoginWidget),
}

/// Result of one provider callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// The session is authenticated as `account`.
    LoggedIn {
        account: LocalAccount,
        signed_up: bool,
        redirect: String,
    },
    /// Silent authentication was impossible; start an interactive login.
    Restart { redirect: String },
    /// The email must be verified first. `id_token` authorizes a resend.
    VerifyEmail { id_token: String },
    /// Anything else. Details went to the log only.
    Failed { notice: &'static str },
}

impl CallbackOutcome {
    /// Redirect target of the outcome.
    pub fn location(&self) -> &str {
        match self {
            CallbackOutcome::LoggedIn { redirect, .. } | CallbackOutcome::Restart { redirect } => {
                redirect
            }
            CallbackOutcome::VerifyEmail { .. } | CallbackOutcome::Failed { .. } => SITE_ROOT,
        }
    }
}

/// Result of a verification email resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationNotice {
    Sent,
    SessionExpired,
    Failed,
}

impl VerificationNotice {
    pub fn message(&self) -> &'static str {
        match self {
            VerificationNotice::Sent => VERIFICATION_SENT_NOTICE,
            VerificationNotice::SessionExpired => SESSION_EXPIRED_NOTICE,
            VerificationNotice::Failed => VERIFICATION_FAILED_NOTICE,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, VerificationNotice::Sent)
    }
}

/// Drives the two legs of an authorization-code login.
pub struct LoginFlowController {
    settings: OidcSettings,
    provider: Arc<dyn IdentityProvider>,
    verifier: Arc<dyn IdTokenVerifier>,
    accounts: Arc<dyn AccountDirectory>,
    nonces: NonceStore,
    engine: ReconciliationEngine,
}

impl LoginFlowController {
    /// Create a new [`LoginFlowBuilder`].
    pub fn builder(settings: OidcSettings) -> LoginFlowBuilder {
        LoginFlowBuilder {
            settings,
            provider: None,
            verifier: None,
            links: None,
            accounts: None,
            events: Arc::new(()),
        }
    }

    pub fn settings(&self) -> &OidcSettings {
        &self.settings
    }

    /// Issue a nonce and decide between the silent redirect and the widget.
    pub async fn start_login(&self, session: &mut SessionContext) -> Result<LoginPage, AuthError> {
        let state = self.nonces.issue(session).await?;

        if self.settings.redirect_for_sso {
            let url = self.provider.authorization_url(
                Prompt::Silent,
                &state,
                &self.settings.callback_url(),
            )?;
            return Ok(LoginPage::Redirect(url));
        }

        Ok(LoginPage::Render(LoginWidget {
            client_id: self.settings.client_id.clone(),
            domain: self.settings.auth_domain().to_string(),
            callback_url: self.settings.callback_url(),
            state,
            scope: self.settings.scopes().join(" "),
            show_signup: self.settings.allow_signup,
            lock_options: self.settings.lock_extra_settings.clone(),
            login_css: self.settings.login_css.clone(),
            cdn: self.settings.tenant_cdn(),
        }))
    }

    /// Complete a login from the provider callback.
    ///
    /// `destination` is honoured only when it is a site-local path.
    pub async fn handle_callback(
        &self,
        params: &CallbackParams,
        session: &mut SessionContext,
        destination: Option<&str>,
    ) -> CallbackOutcome {
        if params.error.as_deref() == Some(LOGIN_REQUIRED) {
            log::debug!("Silent authentication needs interaction, restarting login");
            return match self.restart(session).await {
                Ok(redirect) => CallbackOutcome::Restart { redirect },
                Err(e) => self.fail(e),
            };
        }

        match self.complete(params, session, destination).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail(e),
        }
    }

    /// Destroy the local session and return the provider logout URL.
    pub async fn handle_logout(&self, session: &mut SessionContext) -> Result<String, AuthError> {
        if let Some(session_id) = session.id() {
            self.accounts.end_session(session_id).await?;
        }
        session.destroy().await?;

        let client_id = if self.settings.redirect_for_sso {
            None
        } else {
            Some(self.settings.client_id.as_str())
        };
        self.provider.logout_url(&self.settings.base_url, client_id)
    }

    /// Ask the provider to resend the verification email of the token's subject.
    pub async fn resend_verification_email(&self, id_token: &str) -> VerificationNotice {
        let claims = match self.verifier.verify(id_token).await {
            Ok(claims) => claims,
            Err(e) => {
                log::error!("Failed to verify identity token for the verify email request: {e}");
                return VerificationNotice::SessionExpired;
            }
        };

        match self.provider.send_verification_email(&claims.sub, id_token).await {
            Ok(()) => {
                log::info!("Sent verification email to {}", claims.sub);
                VerificationNotice::Sent
            }
            Err(e) => {
                log::error!("Failed to send verification email to {}: {e}", claims.sub);
                VerificationNotice::Failed
            }
        }
    }

    async fn restart(&self, session: &mut SessionContext) -> Result<String, AuthError> {
        let state = self.nonces.issue(session).await?;
        self.provider
            .authorization_url(Prompt::Interactive, &state, &self.settings.callback_url())
    }

    async fn complete(
        &self,
        params: &CallbackParams,
        session: &mut SessionContext,
        destination: Option<&str>,
    ) -> Result<CallbackOutcome, AuthError> {
        if let Some(error) = &params.error {
            return Err(AuthError::Provider(format!(
                "Provider returned {error}: {}",
                params.error_description.as_deref().unwrap_or("no description")
            )));
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                AuthError::TokenExchangeFailed("Callback carried no authorization code".to_string())
            })?;

        let (identity, id_token) = self.provider.exchange_code(code).await?;
        let claims = self.verifier.verify(&id_token).await?;

        let state = params.state.as_deref().unwrap_or_default();
        if !self.nonces.consume(session, state).await? {
            return Err(AuthError::StateMismatch(
                "State is not an outstanding nonce of this session".to_string(),
            ));
        }

        if claims.sub != identity.subject_id {
            return Err(AuthError::SubjectMismatch {
                token: claims.sub,
                profile: identity.subject_id,
            });
        }

        let reconciliation = match self.engine.resolve(identity, &id_token).await {
            Ok(reconciliation) => reconciliation,
            Err(e) if e.needs_email_verification() => {
                log::info!("Login of {} halted until the email is verified", claims.sub);
                return Ok(CallbackOutcome::VerifyEmail { id_token });
            }
            Err(e) => return Err(e),
        };

        let signed_up = matches!(reconciliation, Reconciliation::SignedUp(_));
        let account = reconciliation.into_account();
        let session_id = session.regenerate().await?.to_string();
        self.accounts.finalize_session(&account, &session_id).await?;

        let redirect = match destination.filter(|d| is_local_path(d)) {
            Some(destination) => destination.to_string(),
            None => self.accounts.canonical_url(&account),
        };

        Ok(CallbackOutcome::LoggedIn {
            account,
            signed_up,
            redirect,
        })
    }

    /// Tokens are never kept past the exchange, so there is no provider
    /// session of ours left to end here.
    fn fail(&self, err: AuthError) -> CallbackOutcome {
        log::error!("Login failed: {err}");
        CallbackOutcome::Failed {
            notice: LOGIN_FAILED_NOTICE,
        }
    }
}

fn is_local_path(destination: &str) -> bool {
    destination.starts_with('/') && !destination.starts_with("//") && !destination.contains('\\')
}

/// Builder for [`LoginFlowController`].
pub struct LoginFlowBuilder {
    settings: OidcSettings,
    provider: Option<Arc<dyn IdentityProvider>>,
    verifier: Option<Arc<dyn IdTokenVerifier>>,
    links: Option<Arc<dyn IdentityLinkStore>>,
    accounts: Option<Arc<dyn AccountDirectory>>,
    events: Arc<dyn EventSink>,
}

impl LoginFlowBuilder {
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn links(mut self, links: Arc<dyn IdentityLinkStore>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn accounts(mut self, accounts: Arc<dyn AccountDirectory>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Build the controller. Every collaborator but the event sink is required.
    pub fn build(self) -> Result<LoginFlowController, AuthError> {
        let missing = |name: &str| AuthError::Config(format!("Login flow needs {name}"));
        let provider = self.provider.ok_or_else(|| missing("an identity provider"))?;
        let verifier = self.verifier.ok_or_else(|| missing("a token verifier"))?;
        let links = self.links.ok_or_else(|| missing("an identity link store"))?;
        let accounts = self.accounts.ok_or_else(|| missing("an account directory"))?;

        let engine = ReconciliationEngine::new(provider.clone(), links, accounts.clone())
            .with_events(self.events)
            .require_verified_email(self.settings.requires_verified_email);

        Ok(LoginFlowController {
            nonces: NonceStore::from_settings(&self.settings),
            settings: self.settings,
            provider,
            verifier,
            accounts,
            engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::tests::{identity, FakeProvider};
    use async_trait::async_trait;
    use oidlink_core::{Audience, ExternalIdentity, ProviderIdentity, VerifiedClaims};
    use oidlink_session::{MemoryStore, SessionStore};
    use oidlink_store::{MemoryDirectory, MemoryLinkStore};
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted provider: one profile per code, counts every call.
    #[derive(Default)]
    struct ScriptedProvider {
        inner: FakeProvider,
        profile: Mutex<Option<ExternalIdentity>>,
        exchanges: AtomicUsize,
        verification_emails: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        fn authorization_url(
            &self,
            prompt: Prompt,
            state: &str,
            redirect_uri: &str,
        ) -> Result<String, AuthError> {
            self.inner.authorization_url(prompt, state, redirect_uri)
        }

        async fn exchange_code(&self, code: &str) -> Result<(ExternalIdentity, String), AuthError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            let profile = self.profile.lock().unwrap().clone();
            match profile {
                Some(profile) if code == "good-code" => Ok((profile, "id-token".to_string())),
                _ => Err(AuthError::TokenExchangeFailed("invalid_grant".into())),
            }
        }

        async fn fetch_identities(
            &self,
            subject_id: &str,
            id_token: &str,
        ) -> Result<Vec<ProviderIdentity>, AuthError> {
            self.inner.fetch_identities(subject_id, id_token).await
        }

        fn logout_url(&self, return_to: &str, client_id: Option<&str>) -> Result<String, AuthError> {
            self.inner.logout_url(return_to, client_id)
        }

        async fn send_verification_email(
            &self,
            _subject_id: &str,
            _id_token: &str,
        ) -> Result<(), AuthError> {
            self.verification_emails.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Accepts only `id-token`, whose subject is configurable.
    struct FakeVerifier {
        sub: String,
    }

    #[async_trait]
    impl IdTokenVerifier for FakeVerifier {
        async fn verify(&self, id_token: &str) -> Result<VerifiedClaims, AuthError> {
            if id_token != "id-token" {
                return Err(AuthError::TokenValidationFailed("bad signature".into()));
            }
            Ok(VerifiedClaims {
                sub: self.sub.clone(),
                iss: "https://tenant.auth0.com/".into(),
                aud: Audience::Single("client-123".into()),
                exp: i64::MAX,
                iat: None,
                nbf: None,
                extra: Map::new(),
            })
        }
    }

    struct Harness {
        provider: Arc<ScriptedProvider>,
        accounts: Arc<MemoryDirectory>,
        links: Arc<MemoryLinkStore>,
        controller: LoginFlowController,
        store: Arc<dyn SessionStore>,
    }

    fn harness(settings: OidcSettings, profile: Option<ExternalIdentity>, token_sub: &str) -> Harness {
        let provider = Arc::new(ScriptedProvider {
            profile: Mutex::new(profile),
            ..ScriptedProvider::default()
        });
        let accounts = Arc::new(MemoryDirectory::default());
        let links = Arc::new(MemoryLinkStore::default());
        let controller = LoginFlowController::builder(settings)
            .provider(provider.clone())
            .verifier(Arc::new(FakeVerifier {
                sub: token_sub.to_string(),
            }))
            .links(links.clone())
            .accounts(accounts.clone())
            .build()
            .unwrap();
        Harness {
            provider,
            accounts,
            links,
            controller,
            store: Arc::new(MemoryStore::default()),
        }
    }

    fn settings() -> OidcSettings {
        OidcSettings {
            domain: "tenant.auth0.com".into(),
            client_id: "client-123".into(),
            base_url: "https://app.example.com".into(),
            ..OidcSettings::default()
        }
    }

    fn callback(code: &str, state: &str) -> CallbackParams {
        CallbackParams {
            code: Some(code.into()),
            state: Some(state.into()),
            ..CallbackParams::default()
        }
    }

    async fn issued_state(h: &Harness, session: &mut SessionContext) -> String {
        match h.controller.start_login(session).await.unwrap() {
            LoginPage::Render(widget) => widget.state,
            LoginPage::Redirect(url) => panic!("unexpected redirect to {url}"),
        }
    }

    #[tokio::test]
    async fn widget_carries_client_settings() {
        let mut settings = settings();
        settings.allow_signup = false;
        settings.login_css = Some("body {}".into());
        let h = harness(settings, None, "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);

        let LoginPage::Render(widget) = h.controller.start_login(&mut session).await.unwrap() else {
            panic!("expected the widget");
        };
        assert_eq!(widget.client_id, "client-123");
        assert_eq!(widget.domain, "tenant.auth0.com");
        assert_eq!(widget.callback_url, "https://app.example.com/auth0/callback");
        assert!(!widget.show_signup);
        assert_eq!(widget.cdn, "https://cdn.auth0.com");
        assert!(session.is_started());
    }

    #[tokio::test]
    async fn sso_mode_redirects_silently() {
        let mut settings = settings();
        settings.redirect_for_sso = true;
        let h = harness(settings, None, "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);

        let LoginPage::Redirect(url) = h.controller.start_login(&mut session).await.unwrap() else {
            panic!("expected a redirect");
        };
        assert!(url.contains("prompt=none"));
    }

    #[tokio::test]
    async fn successful_callback_signs_up_and_finalizes_session() {
        let profile = identity("auth0|1", Some("a@example.com"), true, "alice");
        let h = harness(settings(), Some(profile), "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);
        let state = issued_state(&h, &mut session).await;

        let outcome = h
            .controller
            .handle_callback(&callback("good-code", &state), &mut session, None)
            .await;

        let CallbackOutcome::LoggedIn {
            account,
            signed_up,
            redirect,
        } = outcome
        else {
            panic!("expected a login, got {outcome:?}");
        };
        assert!(signed_up);
        assert_eq!(redirect, format!("/user/{}", account.id));
        assert_eq!(h.accounts.session_account(session.id().unwrap()), Some(account.id));
        assert_eq!(h.links.len(), 1);
    }

    #[tokio::test]
    async fn login_rotates_a_planted_session_id() {
        let profile = identity("auth0|1", Some("a@example.com"), true, "alice");
        let h = harness(settings(), Some(profile), "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), Some("planted-id".to_string()));
        let state = issued_state(&h, &mut session).await;
        assert_eq!(session.id(), Some("planted-id"));

        let outcome = h
            .controller
            .handle_callback(&callback("good-code", &state), &mut session, None)
            .await;

        let CallbackOutcome::LoggedIn { account, .. } = outcome else {
            panic!("expected a login, got {outcome:?}");
        };
        let current = session.id().unwrap();
        assert_ne!(current, "planted-id");
        assert_eq!(h.accounts.session_account(current), Some(account.id));
        assert_eq!(h.accounts.session_account("planted-id"), None);
    }

    #[tokio::test]
    async fn replayed_state_fails_uniformly() {
        let profile = identity("auth0|1", Some("a@example.com"), true, "alice");
        let h = harness(settings(), Some(profile), "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);
        let state = issued_state(&h, &mut session).await;

        let first = h
            .controller
            .handle_callback(&callback("good-code", &state), &mut session, None)
            .await;
        assert!(matches!(first, CallbackOutcome::LoggedIn { .. }));

        let replay = h
            .controller
            .handle_callback(&callback("good-code", &state), &mut session, None)
            .await;
        assert_eq!(
            replay,
            CallbackOutcome::Failed {
                notice: LOGIN_FAILED_NOTICE
            }
        );
        assert_eq!(replay.location(), "/");
    }

    #[tokio::test]
    async fn subject_mismatch_fails_before_reconciliation() {
        let profile = identity("auth0|victim", Some("v@example.com"), true, "victim");
        let h = harness(settings(), Some(profile), "auth0|attacker");
        let mut session = SessionContext::new(h.store.clone(), None);
        let state = issued_state(&h, &mut session).await;

        let outcome = h
            .controller
            .handle_callback(&callback("good-code", &state), &mut session, None)
            .await;
        assert!(matches!(outcome, CallbackOutcome::Failed { .. }));
        assert!(h.accounts.is_empty());
        assert!(h.links.is_empty());
    }

    #[tokio::test]
    async fn exchange_failure_fails_uniformly() {
        let h = harness(settings(), None, "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);
        let state = issued_state(&h, &mut session).await;

        let outcome = h
            .controller
            .handle_callback(&callback("bad-code", &state), &mut session, None)
            .await;
        assert_eq!(
            outcome,
            CallbackOutcome::Failed {
                notice: LOGIN_FAILED_NOTICE
            }
        );
    }

    #[tokio::test]
    async fn login_required_restarts_without_any_exchange() {
        let h = harness(settings(), None, "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);
        let params = CallbackParams {
            error: Some("login_required".into()),
            state: Some("whatever".into()),
            ..CallbackParams::default()
        };

        let outcome = h.controller.handle_callback(&params, &mut session, None).await;
        let CallbackOutcome::Restart { redirect } = outcome else {
            panic!("expected a restart");
        };
        assert!(redirect.starts_with("https://idp.test/authorize"));
        assert!(!redirect.contains("prompt=none"));
        assert_eq!(h.provider.exchanges.load(Ordering::SeqCst), 0);
        assert!(h.accounts.is_empty());
    }

    #[tokio::test]
    async fn other_provider_errors_fail_uniformly() {
        let h = harness(settings(), None, "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);
        let params = CallbackParams {
            error: Some("access_denied".into()),
            error_description: Some("User cancelled".into()),
            ..CallbackParams::default()
        };

        let outcome = h.controller.handle_callback(&params, &mut session, None).await;
        assert!(matches!(outcome, CallbackOutcome::Failed { .. }));
        assert_eq!(h.provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unverified_email_yields_remediation_with_token() {
        let mut settings = settings();
        settings.requires_verified_email = true;
        let profile = identity("auth0|1", Some("a@example.com"), false, "alice");
        let h = harness(settings, Some(profile), "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);
        let state = issued_state(&h, &mut session).await;

        let outcome = h
            .controller
            .handle_callback(&callback("good-code", &state), &mut session, None)
            .await;
        assert_eq!(
            outcome,
            CallbackOutcome::VerifyEmail {
                id_token: "id-token".into()
            }
        );
        assert!(h.accounts.is_empty());
        assert!(h.links.is_empty());
    }

    #[tokio::test]
    async fn only_local_destinations_are_honoured() {
        let profile = identity("auth0|1", Some("a@example.com"), true, "alice");
        let h = harness(settings(), Some(profile), "auth0|1");

        for (destination, local) in [
            ("/node/4", true),
            ("//evil.example.com", false),
            ("https://evil.example.com", false),
        ] {
            let mut session = SessionContext::new(h.store.clone(), None);
            let state = issued_state(&h, &mut session).await;
            let outcome = h
                .controller
                .handle_callback(&callback("good-code", &state), &mut session, Some(destination))
                .await;
            assert_eq!(outcome.location() == destination, local, "{destination}");
        }
    }

    #[tokio::test]
    async fn logout_scopes_to_client_unless_sso() {
        let h = harness(settings(), None, "auth0|1");
        let mut session = SessionContext::new(h.store.clone(), None);
        session.set("k", &1).await.unwrap();

        let url = h.controller.handle_logout(&mut session).await.unwrap();
        assert!(url.contains("client_id=client-123"));
        assert!(!session.is_started());

        let mut sso = settings();
        sso.redirect_for_sso = true;
        let h = harness(sso, None, "auth0|1");
        let url = h
            .controller
            .handle_logout(&mut SessionContext::new(h.store.clone(), None))
            .await
            .unwrap();
        assert!(!url.contains("client_id"));
    }

    #[tokio::test]
    async fn resend_verification_email_notices() {
        let h = harness(settings(), None, "auth0|1");

        assert_eq!(
            h.controller.resend_verification_email("id-token").await,
            VerificationNotice::Sent
        );
        assert_eq!(h.provider.verification_emails.load(Ordering::SeqCst), 1);

        let expired = h.controller.resend_verification_email("stale").await;
        assert_eq!(expired, VerificationNotice::SessionExpired);
        assert!(expired.is_error());
        assert_eq!(h.provider.verification_emails.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn builder_requires_collaborators() {
        let err = LoginFlowController::builder(settings()).build().err();
        assert!(matches!(err, Some(AuthError::Config(_))));
    }
}
