use crate::model::{DecimalVector, DimensionalVector, Id, JobStatus, NamedResource, ResourceKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub measurement_system: Option<String>,
}

impl NamedResource for Project {
    const KIND: ResourceKind = ResourceKind::Project;

    fn resource_id(&self) -> &str {
        &self.project_id
    }

    fn resource_name(&self) -> &str {
        &self.name
    }
}

/// Input model for creating a new project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub measurement_system: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub geometry_id: Id,
    pub name: String,
}

impl NamedResource for Geometry {
    const KIND: ResourceKind = ResourceKind::Geometry;

    fn resource_id(&self) -> &str {
        &self.geometry_id
    }

    fn resource_name(&self) -> &str {
        &self.name
    }
}

/// Pre-signed upload slot in the service's object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSlot {
    pub storage_id: Id,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryImportLocation {
    pub storage_id: Id,
}

/// Flags passed verbatim to the import job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryImportOptions {
    pub facet_split: bool,
    pub sewing: bool,
    pub improve: bool,
    pub optimize_for_lbm_solver: bool,
}

impl Default for GeometryImportOptions {
    fn default() -> Self {
        Self {
            facet_split: false,
            sewing: false,
            improve: true,
            optimize_for_lbm_solver: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryImportRequest {
    pub name: String,
    pub location: GeometryImportLocation,
    pub format: String,
    pub input_unit: String,
    pub options: GeometryImportOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryImport {
    pub geometry_import_id: Id,
    pub status: JobStatus,
    #[serde(default)]
    pub geometry_id: Option<Id>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRef {
    pub geometry_id: Id,
    pub name: String,
    /// `None` when an existing geometry was reused.
    pub import_id: Option<Id>,
    /// Hex SHA-256 of the uploaded bytes, `None` when nothing was uploaded.
    pub sha256: Option<String>,
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub simulation_id: Id,
    pub name: String,
}

impl NamedResource for Simulation {
    const KIND: ResourceKind = ResourceKind::Simulation;

    fn resource_id(&self) -> &str {
        &self.simulation_id
    }

    fn resource_name(&self) -> &str {
        &self.name
    }
}

/// A run as reported by the service. The estimated maximum runtime is not a
/// service field; it is held by `SimulationRunController::max_runtime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub run_id: Id,
    pub name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl NamedResource for SimulationRun {
    const KIND: ResourceKind = ResourceKind::Run;

    fn resource_id(&self) -> &str {
        &self.run_id
    }

    fn resource_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSimulationRun {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshOperation {
    pub mesh_operation_id: Id,
    pub name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub mesh_id: Option<Id>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Numeric estimate with its uncertainty band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericEstimate {
    pub value: f64,
    pub interval_min: f64,
    pub interval_max: f64,
}

/// Duration estimate, each bound an ISO-8601 duration such as `PT1H30M`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationEstimate {
    pub value: String,
    pub interval_min: String,
    pub interval_max: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimation {
    #[serde(default)]
    pub duration: Option<DurationEstimate>,
    #[serde(default)]
    pub compute_resource: Option<NumericEstimate>,
    #[serde(default)]
    pub cell_count: Option<NumericEstimate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckEntry {
    pub severity: Severity,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(default)]
    pub entries: Vec<CheckEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCategory {
    ProbePointPlot,
    AreaAverage,
    AreaIntegral,
    Solution,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for ResultCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ResultCategory::ProbePointPlot => "PROBE_POINT_PLOT",
            ResultCategory::AreaAverage => "AREA_AVERAGE",
            ResultCategory::AreaIntegral => "AREA_INTEGRAL",
            ResultCategory::Solution => "SOLUTION",
            ResultCategory::Other => "OTHER",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub url: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// One entry of a finished run's result manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultArtifact {
    pub result_id: Id,
    pub category: ResultCategory,
    pub name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    pub download: DownloadInfo,
}

/// Geometry primitive point used as a probe location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeometryPrimitive {
    Point { name: String, center: DimensionalVector },
}

impl GeometryPrimitive {
    pub fn point(name: &str, position: DecimalVector) -> Self {
        GeometryPrimitive::Point {
            name: name.to_string(),
            center: DimensionalVector {
                value: position,
                unit: "m".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_id: Id,
    pub status: JobStatus,
    #[serde(default)]
    pub download: Option<DownloadInfo>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSettings {
    pub projection_type: String,
    pub up: DecimalVector,
    pub eye: DecimalVector,
    pub center: DecimalVector,
    pub front_plane_frustum_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPart {
    pub part_identifier: String,
    pub solid_color: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotOutput {
    pub name: String,
    pub format: String,
    pub resolution: [u32; 2],
    pub frame_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotReportProperties {
    pub parts: Vec<ReportPart>,
    pub camera_settings: CameraSettings,
    pub output_settings: ScreenshotOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub name: String,
    pub description: String,
    pub result_ids: Vec<Id>,
    pub report_properties: ScreenshotReportProperties,
}

impl ReportRequest {
    /// Single orthogonal PNG screenshot of one part, 800x800.
    pub fn screenshot(result_id: Id, part_id: &str) -> Self {
        Self {
            name: "Report 1".to_string(),
            description: "Simulation report".to_string(),
            result_ids: vec![result_id],
            report_properties: ScreenshotReportProperties {
                parts: vec![ReportPart {
                    part_identifier: part_id.to_string(),
                    solid_color: [0.8, 0.2, 0.4],
                }],
                camera_settings: CameraSettings {
                    projection_type: "ORTHOGONAL".to_string(),
                    up: DecimalVector::new(0.5, 0.3, 0.2),
                    eye: DecimalVector::new(0.0, 5.0, 10.0),
                    center: DecimalVector::new(10.0, 12.0, 1.0),
                    front_plane_frustum_height: 0.5,
                },
                output_settings: ScreenshotOutput {
                    name: "Output 1".to_string(),
                    format: "PNG".to_string(),
                    resolution: [800, 800],
                    frame_index: 0,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_manifest_deserializes_from_service_json() {
        let json = r#"{
            "resultId": "r-1",
            "category": "AREA_AVERAGE",
            "name": "inlet-outlet",
            "quantity": "T",
            "download": {"url": "https://example.invalid/r-1.csv", "format": "CSV"}
        }"#;
        let artifact: ResultArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.category, ResultCategory::AreaAverage);
        assert_eq!(artifact.quantity.as_deref(), Some("T"));
        assert_eq!(artifact.download.format.as_deref(), Some("CSV"));
    }

    #[test]
    fn test_estimation_with_missing_groups() {
        let json = r#"{"computeResource": {"value": 12.5, "intervalMin": 10, "intervalMax": 15}}"#;
        let estimation: Estimation = serde_json::from_str(json).unwrap();
        assert!(estimation.duration.is_none());
        assert_eq!(estimation.compute_resource.unwrap().value, 12.5);
    }
}
