use secrecy::SecretString;
use serde::Deserialize;

/// Admin panel configuration
///
/// Admin routes are only mounted when `secret` is set, and the HTTP
/// generation endpoint only when `api_key` is set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    /// Value expected in the `x-admin-secret` header
    #[serde(default)]
    pub secret: Option<SecretString>,
    /// Value expected in the `x-api-key` header of `POST /api/generate`
    #[serde(default)]
    pub api_key: Option<SecretString>,
}
