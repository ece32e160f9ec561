use chrono::Utc;
use oidlink_core::random::random_password;
use oidlink_core::{
    AccountDirectory, AccountId, AuthError, EventSink, ExternalIdentity, IdentityProvider,
    LocalAccount, LoginEvent, NewAccount,
};
use oidlink_store::IdentityLinkStore;
use std::sync::Arc;

/// Length of the throwaway password set on provisioned accounts.
const GENERATED_PASSWORD_LEN: usize = 16;

/// Random suffixes tried once both the nickname and its timestamped form are taken.
const USERNAME_SUFFIX_ATTEMPTS: usize = 5;

/// How a verified identity was mapped onto a local account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The identity was already linked.
    SignedIn(LocalAccount),
    /// A new link was created, to a joined or to a freshly provisioned account.
    SignedUp(LocalAccount),
}

impl Reconciliation {
    pub fn account(&self) -> &LocalAccount {
        match self {
            Reconciliation::SignedIn(account) | Reconciliation::SignedUp(account) => account,
        }
    }

    pub fn into_account(self) -> LocalAccount {
        match self {
            Reconciliation::SignedIn(account) | Reconciliation::SignedUp(account) => account,
        }
    }
}

/// Decides whether a verified identity signs in, joins an existing account
/// or gets a new one.
///
/// An existing local account is only ever joined through a verified email.
/// Both email-verification refusals surface as [`AuthError::EmailNotVerified`].
pub struct ReconciliationEngine {
    provider: Arc<dyn IdentityProvider>,
    links: Arc<dyn IdentityLinkStore>,
    accounts: Arc<dyn AccountDirectory>,
    events: Arc<dyn EventSink>,
    requires_verified_email: bool,
}

impl ReconciliationEngine {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        links: Arc<dyn IdentityLinkStore>,
        accounts: Arc<dyn AccountDirectory>,
    ) -> Self {
        Self {
            provider,
            links,
            accounts,
            events: Arc::new(()),
            requires_verified_email: false,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Refuse every identity without a verified email.
    pub fn require_verified_email(mut self, required: bool) -> Self {
        self.requires_verified_email = required;
        self
    }

    /// Resolve `identity` to a local account.
    ///
    /// `id_token` authorizes the lazy identities lookup at the provider.
    pub async fn resolve(
        &self,
        mut identity: ExternalIdentity,
        id_token: &str,
    ) -> Result<Reconciliation, AuthError> {
        if self.requires_verified_email {
            if identity.email.is_none() {
                return Err(AuthError::EmailNotSet);
            }
            if !identity.email_verified {
                return Err(AuthError::EmailNotVerified);
            }
        }

        if let Some(account_id) = self.links.find_by_external_id(&identity.subject_id).await? {
            return self.sign_in(account_id, identity).await;
        }

        if identity.identities.is_none() {
            match self
                .provider
                .fetch_identities(&identity.subject_id, id_token)
                .await
            {
                Ok(identities) => identity.identities = Some(identities),
                Err(e) => log::warn!(
                    "Could not list identities of {}, treating it as federated: {e}",
                    identity.subject_id
                ),
            }
        }
        let native = identity.is_provider_native().unwrap_or(false);

        let candidate = match identity.email.as_deref() {
            Some(email) => self.accounts.load_by_email(email).await?,
            None => None,
        };

        let account = match candidate {
            Some(existing) if identity.email_verified => {
                log::info!(
                    "Joining {} to account {} through verified email",
                    identity.subject_id,
                    existing.id
                );
                existing
            }
            Some(existing) => {
                log::warn!(
                    "Refusing to join {} ({}) to account {} through an unverified email",
                    identity.subject_id,
                    if native { "provider-native" } else { "federated" },
                    existing.id
                );
                return Err(AuthError::EmailNotVerified);
            }
            None => self.provision(&identity).await?,
        };

        match self
            .links
            .insert(&identity.subject_id, account.id, &identity.cached_profile())
            .await
        {
            Ok(()) => {}
            Err(AuthError::IdentityLinkConflict(subject)) => {
                log::warn!(
                    "{subject} was linked by a concurrent login, signing in instead (account {} may be orphaned)",
                    account.id
                );
                let account_id = self
                    .links
                    .find_by_external_id(&subject)
                    .await?
                    .ok_or(AuthError::IdentityLinkConflict(subject))?;
                return self.sign_in(account_id, identity).await;
            }
            Err(e) => return Err(e),
        }

        log::info!("Signed up {} as account {}", identity.subject_id, account.id);
        self.events
            .emit(LoginEvent::SignedUp {
                account: account.clone(),
                identity,
            })
            .await;
        Ok(Reconciliation::SignedUp(account))
    }

    async fn sign_in(
        &self,
        account_id: AccountId,
        identity: ExternalIdentity,
    ) -> Result<Reconciliation, AuthError> {
        let account = self.accounts.load_by_id(account_id).await?.ok_or_else(|| {
            AuthError::Storage(format!(
                "{} is linked to missing account {account_id}",
                identity.subject_id
            ))
        })?;

        self.links
            .update(&identity.subject_id, &identity.cached_profile())
            .await?;

        log::info!("Signed in {} as account {}", identity.subject_id, account.id);
        self.events
            .emit(LoginEvent::SignedIn {
                account: account.clone(),
                identity,
            })
            .await;
        Ok(Reconciliation::SignedIn(account))
    }

    async fn provision(&self, identity: &ExternalIdentity) -> Result<LocalAccount, AuthError> {
        let username = self.unique_username(&identity.nickname).await?;
        let email = identity
            .email
            .clone()
            .unwrap_or_else(|| placeholder_email(&identity.subject_id));

        let mut account = NewAccount::default();
        account
            .set_username(username)
            .set_email(email)
            .set_password(random_password(GENERATED_PASSWORD_LEN))
            .activate();

        self.accounts.create(account).await
    }

    async fn unique_username(&self, nickname: &str) -> Result<String, AuthError> {
        let base = match nickname.trim() {
            "" => "user",
            trimmed => trimmed,
        };
        let stamped = format!("{base}{}", Utc::now().timestamp());

        let mut candidates = vec![base.to_string(), stamped.clone()];
        candidates.extend((0..USERNAME_SUFFIX_ATTEMPTS).map(|_| {
            format!("{stamped}{}", random_password(4).to_ascii_lowercase())
        }));

        for candidate in candidates {
            if self.accounts.load_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AuthError::AccountProvisioningFailed(format!(
            "No free username derived from {base}"
        )))
    }
}

/// A clearly synthetic address for identities that shared no email.
fn placeholder_email(subject_id: &str) -> String {
    let digest: String = subject_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(24)
        .collect();
    format!(
        "change_this_email@{}{}.com",
        digest.to_ascii_lowercase(),
        random_password(8).to_ascii_lowercase()
    )
}
