use crate::model::{CheckEntry, Estimation, Id, JobStatus, ResourceKind, ResultCategory, Severity};

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;

/// Every failure a workflow step can report to its caller.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("expected {expected} for {query}, found {found}")]
    AmbiguousOrMissingEntity {
        query: String,
        expected: String,
        found: usize,
    },

    #[error("entity key '{0}' has not been resolved")]
    UnknownEntityKey(String),

    #[error("geometry import {import_id} ended with status {status}{}", reason_suffix(.reason))]
    ImportFailed {
        import_id: Id,
        status: JobStatus,
        reason: Option<String>,
    },

    #[error("{kind} {id} not terminal after {waited_secs}s (last status {last_status})")]
    Timeout {
        kind: ResourceKind,
        id: Id,
        last_status: JobStatus,
        waited_secs: u64,
    },

    #[error("boundary condition '{name}' with method {method} requires {missing}")]
    InvalidBoundaryCondition {
        name: String,
        method: String,
        missing: String,
    },

    #[error("specification '{0}' is already finalized; reset the builder before reuse")]
    ReuseWithoutReset(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("mesh estimate {value} exceeds the ceiling of {ceiling} compute units")]
    EstimateExceeded {
        value: f64,
        ceiling: f64,
        estimate: Box<Estimation>,
    },

    #[error("simulation estimate {value} exceeds the ceiling of {ceiling} compute units")]
    TooExpensive {
        value: f64,
        ceiling: f64,
        estimate: Box<Estimation>,
    },

    #[error("setup check reported {} error(s)", error_count(.entries))]
    SetupValidation { entries: Vec<CheckEntry> },

    #[error("no {category} artifact named '{name}' for quantity {}", quantity_label(.quantity))]
    ArtifactNotFound {
        category: ResultCategory,
        name: String,
        quantity: Option<String>,
    },

    #[error("{kind} {id} ended with status {status}{}", reason_suffix(.reason))]
    JobFailed {
        kind: ResourceKind,
        id: Id,
        status: JobStatus,
        reason: Option<String>,
    },

    #[error("waiting on {kind} {id} was cancelled")]
    Cancelled { kind: ResourceKind, id: Id },

    #[error("remote service returned {status} for {method} {path}: {body}")]
    Remote {
        status: u16,
        method: String,
        path: String,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("parse error: {0}")]
    Parse(String),
}

impl WorkflowError {
    pub fn not_found(kind: ResourceKind, name: &str) -> Self {
        WorkflowError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// HTTP 422 from the service, used to signal that an estimate is unavailable.
    pub fn is_unprocessable(&self) -> bool {
        matches!(self, WorkflowError::Remote { status: 422, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WorkflowError::NotFound { .. } | WorkflowError::Remote { status: 404, .. }
        )
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

fn error_count(entries: &[CheckEntry]) -> usize {
    entries
        .iter()
        .filter(|entry| entry.severity == Severity::Error)
        .count()
}

fn quantity_label(quantity: &Option<String>) -> String {
    match quantity {
        Some(q) => format!("'{}'", q),
        None => "(any)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = WorkflowError::ImportFailed {
            import_id: "imp-1".to_string(),
            status: JobStatus::Failed,
            reason: Some("unsupported format".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "geometry import imp-1 ended with status FAILED: unsupported format"
        );

        let err = WorkflowError::not_found(ResourceKind::Project, "Heat sink");
        assert_eq!(err.to_string(), "project 'Heat sink' not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unprocessable_detection() {
        let err = WorkflowError::Remote {
            status: 422,
            method: "POST".to_string(),
            path: "/projects/p/simulations/s/estimate".to_string(),
            body: String::new(),
        };
        assert!(err.is_unprocessable());
        assert!(!WorkflowError::Parse("x".to_string()).is_unprocessable());
    }
}
