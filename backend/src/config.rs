//! Engine configuration loaded via OrthoConfig.
//!
//! Every value can come from a `DEFECTS_*` environment variable, a config
//! file or a command-line flag. Unset values fall back to the domain
//! defaults; the repeat lookback carries its default on the field itself.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{HistoryDispatcherConfig, LifecycleConfig, SlaPolicy};
use crate::outbound::persistence::PoolConfig;

/// Configuration values for the defect engine.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DEFECTS")]
pub struct LifecycleSettings {
    /// PostgreSQL connection URL. Without one the engine runs in memory.
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections.
    pub pool_max_size: Option<u32>,
    /// Seconds to wait for a pooled connection.
    pub pool_timeout_secs: Option<u64>,
    /// Days a resolved defect counts towards repeat detection.
    #[ortho_config(default = 30)]
    pub repeat_lookback_days: u32,
    /// History entries buffered before new ones are dropped.
    pub history_queue_capacity: Option<usize>,
    /// Append attempts per history entry.
    pub history_max_attempts: Option<u32>,
    /// SLA hours for critical defects; zero disables the deadline.
    pub sla_critical_hours: Option<u32>,
    /// SLA hours for high-priority defects.
    pub sla_high_hours: Option<u32>,
    /// SLA hours for medium-priority defects.
    pub sla_medium_hours: Option<u32>,
    /// SLA hours for low-priority defects.
    pub sla_low_hours: Option<u32>,
}

impl LifecycleSettings {
    /// Orchestrator tunables.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            repeat_lookback_days: self.repeat_lookback_days,
        }
    }

    /// History queue settings. At least one attempt is always made.
    pub fn history_config(&self) -> HistoryDispatcherConfig {
        let defaults = HistoryDispatcherConfig::default();
        HistoryDispatcherConfig {
            capacity: self
                .history_queue_capacity
                .unwrap_or(defaults.capacity)
                .max(1),
            max_attempts: self
                .history_max_attempts
                .unwrap_or(defaults.max_attempts)
                .max(1),
            ..defaults
        }
    }

    /// SLA hours per priority.
    pub fn sla_policy(&self) -> SlaPolicy {
        let defaults = SlaPolicy::default();
        SlaPolicy {
            critical_hours: self.sla_critical_hours.unwrap_or(defaults.critical_hours),
            high_hours: self.sla_high_hours.unwrap_or(defaults.high_hours),
            medium_hours: self.sla_medium_hours.unwrap_or(defaults.medium_hours),
            low_hours: self.sla_low_hours.unwrap_or(defaults.low_hours),
        }
    }

    /// Pool settings, or `None` when no database is configured.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        let url = self.database_url.as_deref().map(str::trim)?;
        if url.is_empty() {
            return None;
        }
        let mut config = PoolConfig::new(url);
        if let Some(max_size) = self.pool_max_size {
            config = config.with_max_size(max_size.max(1));
        }
        if let Some(secs) = self.pool_timeout_secs {
            config = config.with_connection_timeout(Duration::from_secs(secs));
        }
        Some(config)
    }
}
