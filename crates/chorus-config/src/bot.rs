use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use url::Url;

/// Chat bot configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Prefix that marks a command, e.g. `/generate` or `!generate`
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Platform user ids allowed to run maintenance commands
    #[serde(default)]
    pub owners: Vec<String>,
    /// Chat platform connection
    pub platform: PlatformConfig,
    /// Authorization gate
    #[serde(default)]
    pub gate: GateConfig,
    /// Conversation behaviour
    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Chat platform connection
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformConfig {
    /// Telegram Bot API over long polling
    Telegram {
        /// Bot token issued by `@BotFather`
        token: SecretString,
        /// Bot API base URL override
        #[serde(default)]
        api_url: Option<Url>,
        /// Long-poll timeout in seconds
        #[serde(default = "default_poll_timeout")]
        poll_timeout: u32,
    },
}

/// Authorization gate composition
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Channel/room the command must be issued in to pass membership
    #[serde(default)]
    pub required_channel: Option<String>,
    /// Roles that pass membership, as a comma-separated list
    #[serde(default, deserialize_with = "comma_separated")]
    pub required_roles: Vec<String>,
    /// Password challenge mode
    #[serde(default)]
    pub password: PasswordMode,
    /// Secret for [`PasswordMode::Shared`]
    #[serde(default)]
    pub shared_password: Option<SecretString>,
    /// Passing membership skips the password challenge
    #[serde(default)]
    pub membership_sufficient: bool,
    /// Whether a successful password is remembered
    #[serde(default)]
    pub reauthenticate: ReauthPolicy,
    /// Only users in the credential store may generate; enables quotas
    #[serde(default = "default_require_registration")]
    pub require_registration: bool,
    /// How long the challenge waits for a reply
    #[serde(default = "default_password_timeout", deserialize_with = "crate::duration::deserialize")]
    pub password_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            required_channel: None,
            required_roles: Vec::new(),
            password: PasswordMode::default(),
            shared_password: None,
            membership_sufficient: false,
            reauthenticate: ReauthPolicy::default(),
            require_registration: default_require_registration(),
            password_timeout: default_password_timeout(),
        }
    }
}

/// Source of the secret checked by the password challenge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordMode {
    /// No challenge
    Off,
    /// One secret for every user
    Shared,
    /// The user's own credential store password
    #[default]
    PerUser,
}

/// Lifetime of a successful password verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReauthPolicy {
    /// Challenge again on every `generate`
    #[default]
    EverySession,
    /// Remember the verdict until the process exits
    Process,
}

/// Conversation behaviour
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    #[serde(default)]
    pub unrecognized_mode: UnrecognizedModePolicy,
}

/// What to do when the mode answer is neither `custom` nor `default`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedModePolicy {
    /// Stay silent and keep waiting
    #[default]
    Ignore,
    /// Repeat the mode prompt
    Reprompt,
}

fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Roles {
        Joined(String),
        List(Vec<String>),
    }

    let items = match Roles::deserialize(deserializer)? {
        Roles::Joined(joined) => joined.split(',').map(str::to_owned).collect(),
        Roles::List(list) => list,
    };

    Ok(items
        .into_iter()
        .map(|role| role.trim().to_owned())
        .filter(|role| !role.is_empty())
        .collect())
}

fn default_command_prefix() -> String {
    "/".to_string()
}

const fn default_poll_timeout() -> u32 {
    30
}

const fn default_require_registration() -> bool {
    true
}

const fn default_password_timeout() -> Duration {
    Duration::from_secs(60)
}
