use std::path::Path;

use secrecy::ExposeSecret;

use crate::{Config, PasswordMode};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the gate composition is incomplete or limits are out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_gate()?;
        self.validate_downloads()?;
        Ok(())
    }

    fn validate_gate(&self) -> anyhow::Result<()> {
        let Some(ref bot) = self.bot else {
            return Ok(());
        };

        if bot.command_prefix.is_empty() {
            anyhow::bail!("bot.command_prefix must not be empty");
        }

        let gate = &bot.gate;
        match gate.password {
            PasswordMode::Shared => {
                let missing = gate
                    .shared_password
                    .as_ref()
                    .is_none_or(|secret| secret.expose_secret().is_empty());
                if missing {
                    anyhow::bail!("bot.gate.shared_password is required when password = \"shared\"");
                }
            }
            PasswordMode::PerUser if !gate.require_registration => {
                anyhow::bail!("bot.gate.password = \"per_user\" requires require_registration = true");
            }
            PasswordMode::PerUser | PasswordMode::Off => {}
        }

        if gate.password_timeout.is_zero() {
            anyhow::bail!("bot.gate.password_timeout must be greater than 0");
        }

        Ok(())
    }

    fn validate_downloads(&self) -> anyhow::Result<()> {
        if self.downloads.retention_days == 0 {
            anyhow::bail!("downloads.retention_days must be at least 1");
        }

        if self.generation.progress_interval.is_zero() {
            anyhow::bail!("generation.progress_interval must be greater than 0");
        }

        Ok(())
    }
}
