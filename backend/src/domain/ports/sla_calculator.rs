//! Port for computing SLA deadlines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::defects::{DefectPriority, PartCategory};

define_port_error! {
    /// Errors raised by SLA calculators.
    pub enum SlaCalculatorError {
        /// The SLA source could not be reached.
        Unavailable { message: String } [transient] =>
            "SLA calculator unavailable: {message}",
        /// The SLA configuration is unusable.
        Misconfigured { message: String } =>
            "SLA configuration invalid: {message}",
    }
}

/// Maps a part category and priority to a due-by time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlaCalculator: Send + Sync {
    /// Deadline for a defect detected at `detected_at`, or `None` when no
    /// SLA applies.
    async fn deadline(
        &self,
        category: PartCategory,
        priority: DefectPriority,
        detected_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SlaCalculatorError>;
}

/// Calculator for deployments without SLA tracking.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSlaCalculator;

#[async_trait]
impl SlaCalculator for FixtureSlaCalculator {
    async fn deadline(
        &self,
        _category: PartCategory,
        _priority: DefectPriority,
        _detected_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SlaCalculatorError> {
        Ok(None)
    }
}
