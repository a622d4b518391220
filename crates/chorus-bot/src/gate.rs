//! Authorization gate run before a conversation starts
//!
//! Checks, in order: registration and quota, the remembered password verdict,
//! channel/role membership, then an interactive password challenge over the
//! actor's private channel.

use std::sync::Arc;

use chorus_config::{GateConfig, PasswordMode, ReauthPolicy};
use chorus_store::{CredentialStore, PasswordHash};
use dashmap::DashMap;
use secrecy::ExposeSecret;

use crate::chat::{ChatSink, IncomingMessage, notify};
use crate::replies::ReplyWaiters;

pub const PASSWORD_PROMPT: &str = "🔒 Please provide your password to proceed:";
pub const PASSWORD_ACCEPTED: &str = "✅ Password accepted! You can now use the bot.";

/// How an actor got through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorized {
    /// No membership or password check configured
    Open,
    /// Required channel or role, with membership alone sufficient
    Membership,
    /// Password challenge answered correctly
    Password,
    /// Earlier password verdict reused for the process lifetime
    Remembered,
}

/// Reasons the gate refuses an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthDenied {
    #[error("identity not registered")]
    NotRecognized,
    #[error("usage quota exhausted")]
    QuotaExhausted,
    #[error("not in the required channel or role")]
    NotMember,
    #[error("wrong password")]
    WrongPassword,
    #[error("password challenge timed out")]
    Timeout,
}

impl AuthDenied {
    /// Text shown to the denied actor
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotRecognized => "---Identification not recognized by system---\n---Connection Terminated---",
            Self::QuotaExhausted => "❌ You have reached your usage limit.",
            Self::NotMember => "⛔ You must be in the required channel or hold a required role.",
            Self::WrongPassword => "❌ Incorrect password.",
            Self::Timeout => "⏳ Timeout. You did not provide the password in time.",
        }
    }
}

/// Composite membership, password and quota check
#[derive(Clone)]
pub struct AuthorizationGate {
    config: GateConfig,
    store: CredentialStore,
    attempts: Arc<DashMap<String, bool>>,
    replies: ReplyWaiters,
    sink: Arc<dyn ChatSink>,
    shared: Option<PasswordHash>,
}

impl AuthorizationGate {
    pub fn new(config: GateConfig, store: CredentialStore, replies: ReplyWaiters, sink: Arc<dyn ChatSink>) -> Self {
        let shared = config
            .shared_password
            .as_ref()
            .map(|secret| PasswordHash::new(secret.expose_secret()));

        Self {
            config,
            store,
            attempts: Arc::new(DashMap::new()),
            replies,
            sink,
            shared,
        }
    }

    /// Decide whether the sender of a `generate` command may start a session
    ///
    /// Blocks for up to the configured password timeout while a challenge is
    /// outstanding. Messages to the actor other than the final verdict are
    /// sent here; the denial text is left to the caller.
    pub async fn authorize(&self, message: &IncomingMessage) -> Result<Authorized, AuthDenied> {
        let actor = &message.actor;

        match self.store.get(&actor.name).await {
            Some(credential) if credential.quota.is_exhausted() => return Err(AuthDenied::QuotaExhausted),
            None if self.config.require_registration => return Err(AuthDenied::NotRecognized),
            _ => {}
        }

        match self.config.reauthenticate {
            ReauthPolicy::EverySession => {
                self.attempts.remove(&actor.id);
            }
            ReauthPolicy::Process => {
                if self.attempts.get(&actor.id).is_some_and(|passed| *passed) {
                    return Ok(Authorized::Remembered);
                }
            }
        }

        let membership = self.membership(message);
        let password_required = self.config.password != PasswordMode::Off;

        match membership {
            Some(true) if self.config.membership_sufficient || !password_required => {
                return Ok(Authorized::Membership);
            }
            Some(false) if !password_required => return Err(AuthDenied::NotMember),
            None if !password_required => return Ok(Authorized::Open),
            _ => {}
        }

        self.challenge(message).await
    }

    /// `None` when no membership rule is configured
    fn membership(&self, message: &IncomingMessage) -> Option<bool> {
        let channel = self.config.required_channel.as_deref();
        let roles = &self.config.required_roles;

        if channel.is_none() && roles.is_empty() {
            return None;
        }

        let in_channel = channel.is_some_and(|required| required == message.channel.id);
        let has_role = message.actor.roles.iter().any(|role| roles.contains(role));
        Some(in_channel || has_role)
    }

    async fn challenge(&self, message: &IncomingMessage) -> Result<Authorized, AuthDenied> {
        let actor = &message.actor;
        let direct = self.sink.direct_channel(actor);

        let pending = self.replies.register(&actor.id, &direct);
        notify(self.sink.as_ref(), &direct, PASSWORD_PROMPT).await;

        let Some(reply) = pending.wait_for(self.config.password_timeout).await else {
            tracing::info!(actor = %actor.id, "password challenge timed out");
            return Err(AuthDenied::Timeout);
        };

        if !self.check_password(&actor.name, reply.trim()).await {
            tracing::info!(actor = %actor.id, "password challenge failed");
            self.attempts.insert(actor.id.clone(), false);
            return Err(AuthDenied::WrongPassword);
        }

        self.attempts.insert(actor.id.clone(), true);
        notify(self.sink.as_ref(), &direct, PASSWORD_ACCEPTED).await;
        Ok(Authorized::Password)
    }

    async fn check_password(&self, username: &str, candidate: &str) -> bool {
        match self.config.password {
            PasswordMode::Shared => self.shared.as_ref().is_some_and(|hash| hash.verify(candidate)),
            PasswordMode::PerUser => self.store.verify_password(username, candidate).await,
            PasswordMode::Off => true,
        }
    }

    /// Whether the actor's last challenge succeeded
    pub fn has_passed(&self, actor_id: &str) -> bool {
        self.attempts.get(actor_id).is_some_and(|passed| *passed)
    }
}
