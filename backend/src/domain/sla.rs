//! Table-driven SLA deadlines.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::defects::{DefectPriority, PartCategory};
use crate::domain::ports::{SlaCalculator, SlaCalculatorError};

/// Hours allowed per priority before a defect breaches its SLA.
///
/// A value of zero disables the SLA for that priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaPolicy {
    /// Critical defects.
    pub critical_hours: u32,
    /// High-priority defects.
    pub high_hours: u32,
    /// Medium-priority defects.
    pub medium_hours: u32,
    /// Low-priority defects.
    pub low_hours: u32,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            critical_hours: 4,
            high_hours: 24,
            medium_hours: 72,
            low_hours: 168,
        }
    }
}

impl SlaPolicy {
    /// Allowed hours for `priority`.
    pub const fn hours_for(&self, priority: DefectPriority) -> u32 {
        match priority {
            DefectPriority::Critical => self.critical_hours,
            DefectPriority::High => self.high_hours,
            DefectPriority::Medium => self.medium_hours,
            DefectPriority::Low => self.low_hours,
        }
    }
}

/// [`SlaCalculator`] backed by an in-process [`SlaPolicy`].
///
/// Per-category overrides replace the policy hours for one category and
/// priority pair.
///
/// # Examples
/// ```
/// use repair_backend::domain::defects::{DefectPriority, PartCategory};
/// use repair_backend::domain::{SlaPolicy, TableSlaCalculator};
///
/// let calculator = TableSlaCalculator::new(SlaPolicy::default())
///     .with_override(PartCategory::Psu, DefectPriority::High, 8);
/// assert_eq!(calculator.hours_for(PartCategory::Psu, DefectPriority::High), 8);
/// assert_eq!(calculator.hours_for(PartCategory::Ram, DefectPriority::High), 24);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableSlaCalculator {
    policy: SlaPolicy,
    overrides: BTreeMap<(PartCategory, DefectPriority), u32>,
}

impl TableSlaCalculator {
    /// Calculator using `policy` for every category.
    pub fn new(policy: SlaPolicy) -> Self {
        Self {
            policy,
            overrides: BTreeMap::new(),
        }
    }

    /// Replace the allowance for one category and priority.
    #[must_use]
    pub fn with_override(
        mut self,
        category: PartCategory,
        priority: DefectPriority,
        hours: u32,
    ) -> Self {
        self.overrides.insert((category, priority), hours);
        self
    }

    /// Effective allowance in hours.
    pub fn hours_for(&self, category: PartCategory, priority: DefectPriority) -> u32 {
        self.overrides
            .get(&(category, priority))
            .copied()
            .unwrap_or_else(|| self.policy.hours_for(priority))
    }
}

#[async_trait]
impl SlaCalculator for TableSlaCalculator {
    async fn deadline(
        &self,
        category: PartCategory,
        priority: DefectPriority,
        detected_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SlaCalculatorError> {
        let hours = self.hours_for(category, priority);
        if hours == 0 {
            return Ok(None);
        }
        let allowance = TimeDelta::try_hours(i64::from(hours)).ok_or_else(|| {
            SlaCalculatorError::misconfigured(format!("{hours} hours is out of range"))
        })?;
        detected_at
            .checked_add_signed(allowance)
            .map(Some)
            .ok_or_else(|| {
                SlaCalculatorError::misconfigured(format!(
                    "deadline {hours} hours after {detected_at} overflows"
                ))
            })
    }
}
