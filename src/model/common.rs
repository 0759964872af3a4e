use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// The remote collections a name can be resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Project,
    Geometry,
    Simulation,
    Run,
    MeshOperation,
    GeometryImport,
    ReportJob,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ResourceKind::Project => "project",
            ResourceKind::Geometry => "geometry",
            ResourceKind::Simulation => "simulation",
            ResourceKind::Run => "simulation run",
            ResourceKind::MeshOperation => "mesh operation",
            ResourceKind::GeometryImport => "geometry import",
            ResourceKind::ReportJob => "report job",
        };
        write!(f, "{}", label)
    }
}

/// A remote resource identified by the id the service assigned to it.
///
/// Names are user-supplied and not unique on the service; a reference produced
/// by name resolution points at the first listed match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResourceRef {
    pub kind: ResourceKind,
    pub id: Id,
    pub name: String,
}

impl RemoteResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Status reported by every long-running remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Ready,
    Queued,
    Started,
    Running,
    Finished,
    Canceled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Canceled | JobStatus::Failed
        )
    }

    pub fn is_success(&self) -> bool {
        *self == JobStatus::Finished
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobStatus::Ready => "READY",
            JobStatus::Queued => "QUEUED",
            JobStatus::Started => "STARTED",
            JobStatus::Running => "RUNNING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Canceled => "CANCELED",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{}", label)
    }
}

/// Listed resources that can be looked up by their display name.
pub trait NamedResource {
    const KIND: ResourceKind;

    fn resource_id(&self) -> &str;
    fn resource_name(&self) -> &str;

    fn to_ref(&self) -> RemoteResourceRef {
        RemoteResourceRef::new(Self::KIND, self.resource_id(), self.resource_name())
    }
}

/// Envelope used by the service for every collection listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(rename = "_embedded", default = "Vec::new")]
    pub embedded: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimalVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl DecimalVector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A plain number with its unit, e.g. `{"value": 20, "unit": "°C"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensional {
    pub value: f64,
    pub unit: String,
}

impl Dimensional {
    pub fn new(value: f64, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionValue {
    Constant { value: f64 },
}

/// A value that the service accepts as a function; only constants are produced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionalFunction {
    pub value: FunctionValue,
    pub unit: String,
}

impl DimensionalFunction {
    pub fn constant(value: f64, unit: &str) -> Self {
        Self {
            value: FunctionValue::Constant { value },
            unit: unit.to_string(),
        }
    }

    pub fn constant_value(&self) -> f64 {
        match self.value {
            FunctionValue::Constant { value } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentVectorFunction {
    pub x: FunctionValue,
    pub y: FunctionValue,
    pub z: FunctionValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionalVectorFunction {
    pub value: ComponentVectorFunction,
    pub unit: String,
}

impl DimensionalVectorFunction {
    pub fn constant(v: DecimalVector, unit: &str) -> Self {
        Self {
            value: ComponentVectorFunction {
                x: FunctionValue::Constant { value: v.x },
                y: FunctionValue::Constant { value: v.y },
                z: FunctionValue::Constant { value: v.z },
            },
            unit: unit.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionalVector {
    pub value: DecimalVector,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_deserializes() {
        let status: JobStatus = serde_json::from_str("\"PAUSED\"").unwrap();
        assert_eq!(status, JobStatus::Unknown);
        assert!(!status.is_terminal());

        let status: JobStatus = serde_json::from_str("\"CANCELED\"").unwrap();
        assert!(status.is_terminal());
        assert!(!status.is_success());
    }

    #[test]
    fn test_page_without_embedded_is_empty() {
        let page: Page<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(page.embedded.is_empty());
    }

    #[test]
    fn test_constant_function_shape() {
        let json = serde_json::to_value(DimensionalFunction::constant(20.0, "°C")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"value": {"type": "CONSTANT", "value": 20.0}, "unit": "°C"})
        );
    }
}
