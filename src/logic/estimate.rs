use log::{info, warn};
use std::time::Duration;

use crate::config::PollingConfig;
use crate::error::{Result, WorkflowError};
use crate::model::{CheckEntry, CheckResult, Estimation, ResourceKind, Severity};

/// Outcome of an admission check: the estimate (if the service produced one)
/// and the polling budget derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub estimate: Option<Estimation>,
    pub max_runtime: Duration,
    /// True when no duration estimate was available and the fallback budget applies.
    pub fallback: bool,
}

impl Admission {
    pub fn fallback(polling: &PollingConfig) -> Self {
        Self {
            estimate: None,
            max_runtime: Duration::from_secs(polling.fallback_max_runtime_secs),
            fallback: true,
        }
    }
}

/// Gate a job on its estimate.
///
/// An unprocessable (422) estimate degrades to the fallback budget. A compute
/// resource estimate above `ceiling` is rejected through `reject`. Otherwise the
/// budget is `max(min_timeout, 2 * interval_max)`.
pub fn admit(
    result: Result<Estimation>,
    ceiling: f64,
    polling: &PollingConfig,
    reject: impl FnOnce(f64, f64, Estimation) -> WorkflowError,
) -> Result<Admission> {
    let estimate = match result {
        Ok(estimate) => estimate,
        Err(e) if e.is_unprocessable() => {
            warn!(
                "Estimation not available, assuming max runtime of {} seconds",
                polling.fallback_max_runtime_secs
            );
            return Ok(Admission::fallback(polling));
        }
        Err(e) => return Err(e),
    };

    if let Some(resource) = &estimate.compute_resource {
        info!(
            "Compute resource estimate: {} - {}, expected {}",
            resource.interval_min, resource.interval_max, resource.value
        );
    }

    let over_ceiling = estimate
        .compute_resource
        .as_ref()
        .map(|resource| resource.value)
        .filter(|value| *value > ceiling);
    if let Some(value) = over_ceiling {
        return Err(reject(value, ceiling, estimate));
    }

    let (max_runtime, fallback) = match &estimate.duration {
        Some(duration) => {
            info!(
                "Duration estimate: {} - {}, expected {}",
                duration.interval_min, duration.interval_max, duration.value
            );
            let upper = parse_iso8601_duration(&duration.interval_max)?;
            let doubled = upper.checked_mul(2).unwrap_or(Duration::MAX);
            (Duration::from_secs(polling.min_timeout_secs).max(doubled), false)
        }
        None => {
            warn!(
                "Estimated duration not available, assuming max runtime of {} seconds",
                polling.fallback_max_runtime_secs
            );
            (Duration::from_secs(polling.fallback_max_runtime_secs), true)
        }
    };

    Ok(Admission {
        estimate: Some(estimate),
        max_runtime,
        fallback,
    })
}

/// Apply a pre-flight check: warnings are logged and returned, any error
/// entry fails the step with every entry attached.
pub fn enforce_setup_check(kind: ResourceKind, id: &str, check: CheckResult) -> Result<Vec<CheckEntry>> {
    for entry in &check.entries {
        match entry.severity {
            Severity::Error => warn!("{} {} setup error: {}", kind, id, entry.message),
            Severity::Warning => warn!("{} {} setup warning: {}", kind, id, entry.message),
            _ => info!("{} {} setup: {}", kind, id, entry.message),
        }
    }
    if check.entries.iter().any(|entry| entry.severity == Severity::Error) {
        return Err(WorkflowError::SetupValidation {
            entries: check.entries,
        });
    }
    Ok(check.entries)
}

/// Parse an ISO-8601 duration such as `PT1H30M` or `P1DT2.5S`.
///
/// Week, day, hour, minute and second designators are accepted; calendar years
/// and months have no fixed length and are rejected.
pub fn parse_iso8601_duration(text: &str) -> Result<Duration> {
    let invalid = || WorkflowError::Parse(format!("invalid ISO-8601 duration '{}'", text));

    let rest = text.trim().strip_prefix('P').ok_or_else(invalid)?;
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut seconds = 0.0f64;
    let mut in_time = false;
    let mut number = String::new();
    let mut seen_component = false;

    for c in rest.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            designator => {
                let value: f64 = number.parse().map_err(|_| invalid())?;
                number.clear();
                let unit = match (in_time, designator) {
                    (false, 'W') => 7.0 * 86400.0,
                    (false, 'D') => 86400.0,
                    (true, 'H') => 3600.0,
                    (true, 'M') => 60.0,
                    (true, 'S') => 1.0,
                    _ => return Err(invalid()),
                };
                seconds += value * unit;
                seen_component = true;
            }
        }
    }

    if !number.is_empty() || !seen_component {
        return Err(invalid());
    }

    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}
