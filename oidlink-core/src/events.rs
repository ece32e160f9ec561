use crate::account::LocalAccount;
use crate::identity::ExternalIdentity;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Lifecycle notifications emitted after reconciliation.
#[derive(Debug, Clone)]
pub enum LoginEvent {
    /// An already linked account signed in.
    SignedIn {
        account: LocalAccount,
        identity: ExternalIdentity,
    },
    /// A new link was created, either to a fresh or to a joined account.
    SignedUp {
        account: LocalAccount,
        identity: ExternalIdentity,
    },
}

impl LoginEvent {
    /// Stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            LoginEvent::SignedIn { .. } => "oidlink.signin",
            LoginEvent::SignedUp { .. } => "oidlink.signup",
        }
    }

    pub fn account(&self) -> &LocalAccount {
        match self {
            LoginEvent::SignedIn { account, .. } | LoginEvent::SignedUp { account, .. } => account,
        }
    }
}

/// Receiver of [`LoginEvent`]s.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: LoginEvent);
}

#[async_trait]
impl EventSink for () {
    async fn emit(&self, _event: LoginEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<LoginEvent>,
}

impl ChannelEventSink {
    /// Create a sink together with the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoginEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: LoginEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            log::debug!("Dropping {name} event, receiver is gone");
        }
    }
}
