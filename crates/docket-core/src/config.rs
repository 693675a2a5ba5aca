//! Configuration for Docket
//!
//! Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration for the Docket server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocketConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Actor runtime configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Sync pipeline configuration
    #[serde(default)]
    pub sync: SyncConfig,
}

impl DocketConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.actor.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (default: 0.0.0.0:8700)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Shared secret required in the `x-admin-key` header on admin routes.
    /// Admin routes are disabled when unset.
    #[serde(default)]
    pub admin_key: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8700".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            admin_key: None,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        if !self.bind_address.contains(':') {
            return Err(Error::InvalidConfiguration {
                field: "server.bind_address".into(),
                reason: "must be in host:port format".into(),
            });
        }
        Ok(())
    }
}

/// Actor runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Maximum concurrently activated conversation actors
    #[serde(default = "default_max_actors")]
    pub max_actors_count: usize,

    /// Actor idle timeout before deactivation (milliseconds)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Maximum mailbox depth per actor
    #[serde(default = "default_mailbox_depth")]
    pub mailbox_depth_max: usize,
}

fn default_max_actors() -> usize {
    ACTOR_CONCURRENT_COUNT_MAX
}

fn default_idle_timeout_ms() -> u64 {
    ACTOR_IDLE_TIMEOUT_MS_DEFAULT
}

fn default_mailbox_depth() -> usize {
    MAILBOX_DEPTH_MAX
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            max_actors_count: default_max_actors(),
            idle_timeout_ms: default_idle_timeout_ms(),
            mailbox_depth_max: default_mailbox_depth(),
        }
    }
}

impl ActorConfig {
    fn validate(&self) -> Result<()> {
        if self.max_actors_count > ACTOR_CONCURRENT_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "actor.max_actors_count".into(),
                reason: format!(
                    "{} exceeds limit {}",
                    self.max_actors_count, ACTOR_CONCURRENT_COUNT_MAX
                ),
            });
        }

        if self.idle_timeout_ms > ACTOR_IDLE_TIMEOUT_MS_MAX {
            return Err(Error::InvalidConfiguration {
                field: "actor.idle_timeout_ms".into(),
                reason: format!(
                    "{} exceeds limit {}",
                    self.idle_timeout_ms, ACTOR_IDLE_TIMEOUT_MS_MAX
                ),
            });
        }

        if self.mailbox_depth_max == 0 || self.mailbox_depth_max > MAILBOX_DEPTH_MAX {
            return Err(Error::InvalidConfiguration {
                field: "actor.mailbox_depth_max".into(),
                reason: format!("must be in 1..={}", MAILBOX_DEPTH_MAX),
            });
        }

        Ok(())
    }
}

/// Sync pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reconciliation sweep interval (milliseconds)
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,

    /// Index rows older than this are considered stale (milliseconds)
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

fn default_reconcile_interval_ms() -> u64 {
    RECONCILE_INTERVAL_MS_DEFAULT
}

fn default_stale_after_ms() -> u64 {
    RECONCILE_STALE_AFTER_MS_DEFAULT
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: default_reconcile_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl SyncConfig {
    fn validate(&self) -> Result<()> {
        if self.stale_after_ms <= self.reconcile_interval_ms {
            return Err(Error::InvalidConfiguration {
                field: "sync.stale_after_ms".into(),
                reason: "must be greater than reconcile_interval_ms".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DocketConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_staleness_config() {
        let mut config = DocketConfig::default();
        config.sync.stale_after_ms = 500;
        config.sync.reconcile_interval_ms = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bind_address() {
        let mut config = DocketConfig::default();
        config.server.bind_address = "not-an-address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_mailbox_depth_rejected() {
        let mut config = DocketConfig::default();
        config.actor.mailbox_depth_max = 0;
        assert!(config.validate().is_err());
    }
}
