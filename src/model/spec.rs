//! Typed simulation specification tree.
//!
//! Every variant family the service dispatches on a `type` string is a closed
//! enum here, so the JSON sent to the service is produced by exhaustive matches.

use crate::model::{
    DecimalVector, Dimensional, DimensionalFunction, DimensionalVector, DimensionalVectorFunction,
    EntityRef, Id, TopologicalReference,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an accumulated item. Clones of an item share the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemHandle(Uuid);

impl ItemHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Physics model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurbulenceModel {
    #[serde(rename = "NONE")]
    Laminar,
    #[serde(rename = "KOMEGASST")]
    KOmegaSst,
}

impl std::str::FromStr for TurbulenceModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" | "LAMINAR" => Ok(TurbulenceModel::Laminar),
            "KOMEGASST" => Ok(TurbulenceModel::KOmegaSst),
            other => Err(format!("unknown turbulence model '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FluidModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gravity: Option<DimensionalVector>,
}

impl FluidModel {
    pub fn with_gravity(axis: Axis, value: f64) -> Self {
        let vector = match axis {
            Axis::X => DecimalVector::new(value, 0.0, 0.0),
            Axis::Y => DecimalVector::new(0.0, value, 0.0),
            Axis::Z => DecimalVector::new(0.0, 0.0, value),
        };
        Self {
            gravity: Some(DimensionalVector {
                value: vector,
                unit: "m/s²".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<DimensionalFunction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gauge_pressure: Option<DimensionalFunction>,
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViscosityModel {
    #[serde(rename_all = "camelCase")]
    Newtonian { kinematic_viscosity: Dimensional },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompressibleFluid {
    pub name: String,
    pub viscosity_model: ViscosityModel,
    pub density: Dimensional,
    pub thermal_expansion_coefficient: Dimensional,
    pub reference_temperature: Dimensional,
    pub laminar_prandtl_number: f64,
    pub turbulent_prandtl_number: f64,
    pub specific_heat: Dimensional,
    pub topological_reference: TopologicalReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_in_material: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FluidMaterial {
    Incompressible(IncompressibleFluid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidPreset {
    Water,
    Air,
}

impl FluidPreset {
    pub fn material(&self, name: &str, entities: Vec<EntityRef>) -> FluidMaterial {
        // (kinematic viscosity, density, expansion, reference T, Pr, cp, built-in id)
        let (nu, rho, beta, t_ref, pr, cp, built_in) = match self {
            FluidPreset::Water => (9.3379e-7, 997.33, 2.07e-4, 298.15, 6.5241, 4180.0, "builtInWater"),
            FluidPreset::Air => (1.529e-5, 1.196, 3.43e-3, 273.1, 0.713, 1004.0, "builtInAir"),
        };
        FluidMaterial::Incompressible(IncompressibleFluid {
            name: name.to_string(),
            viscosity_model: ViscosityModel::Newtonian {
                kinematic_viscosity: Dimensional::new(nu, "m²/s"),
            },
            density: Dimensional::new(rho, "kg/m³"),
            thermal_expansion_coefficient: Dimensional::new(beta, "1/K"),
            reference_temperature: Dimensional::new(t_ref, "K"),
            laminar_prandtl_number: pr,
            turbulent_prandtl_number: 0.85,
            specific_heat: Dimensional::new(cp, "J/(kg·K)"),
            topological_reference: TopologicalReference::new(entities),
            built_in_material: Some(built_in.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Conductivity {
    Isotropic {
        thermal_conductivity: DimensionalFunction,
    },
    CrossPlaneOrthotropic {
        in_plane_conductivity: DimensionalFunction,
        cross_plane_conductivity: DimensionalFunction,
        cross_plane_direction: DecimalVector,
    },
}

impl Conductivity {
    pub fn isotropic(k: f64) -> Self {
        Conductivity::Isotropic {
            thermal_conductivity: DimensionalFunction::constant(k, "W/(m·K)"),
        }
    }

    pub fn cross_plane_orthotropic(in_plane: f64, cross_plane: f64, direction: DecimalVector) -> Self {
        Conductivity::CrossPlaneOrthotropic {
            in_plane_conductivity: DimensionalFunction::constant(in_plane, "W/(m·K)"),
            cross_plane_conductivity: DimensionalFunction::constant(cross_plane, "W/(m·K)"),
            cross_plane_direction: direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolidMaterial {
    pub name: String,
    pub conductivity: Conductivity,
    pub density: DimensionalFunction,
    pub specific_heat: DimensionalFunction,
    pub topological_reference: TopologicalReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_in_material: Option<String>,
}

impl SolidMaterial {
    pub const CUSTOM_DENSITY: f64 = 1000.0;
    pub const CUSTOM_SPECIFIC_HEAT: f64 = 1.0;

    /// User-defined solid; density and specific heat take the custom defaults.
    pub fn custom(name: &str, conductivity: Conductivity, entities: Vec<EntityRef>) -> Self {
        Self {
            name: name.to_string(),
            conductivity,
            density: DimensionalFunction::constant(Self::CUSTOM_DENSITY, "kg/m³"),
            specific_heat: DimensionalFunction::constant(Self::CUSTOM_SPECIFIC_HEAT, "J/(kg·K)"),
            topological_reference: TopologicalReference::new(entities),
            built_in_material: None,
        }
    }

    pub fn wood(name: &str, entities: Vec<EntityRef>) -> Self {
        Self {
            name: name.to_string(),
            conductivity: Conductivity::isotropic(0.16),
            density: DimensionalFunction::constant(500.0, "kg/m³"),
            specific_heat: DimensionalFunction::constant(1260.0, "J/(kg·K)"),
            topological_reference: TopologicalReference::new(entities),
            built_in_material: Some("builtInWood".to_string()),
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = DimensionalFunction::constant(density, "kg/m³");
        self
    }

    pub fn with_specific_heat(mut self, specific_heat: f64) -> Self {
        self.specific_heat = DimensionalFunction::constant(specific_heat, "J/(kg·K)");
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoupledMaterials {
    pub fluids: Vec<FluidMaterial>,
    pub solids: Vec<SolidMaterial>,
}

// ---------------------------------------------------------------------------
// Boundary conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VelocityCondition {
    FixedValue { value: DimensionalVectorFunction },
    NoSlip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PressureCondition {
    FixedValue { value: DimensionalFunction },
    TotalPressure { total_pressure: DimensionalFunction },
}

/// The three ways an external wall exchanges heat with its surroundings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ExternalHeatFlux {
    Derived {
        heat_transfer_coefficient: Dimensional,
        ambient_temperature: Dimensional,
    },
    Fixed {
        value: Dimensional,
    },
    FixedPower {
        value: Dimensional,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum TemperatureCondition {
    FixedValue { value: DimensionalFunction },
    #[serde(rename = "EXTERNAL_WALL_HEAT_FLUX_TEMPERATURE")]
    ExternalWallHeatFlux { heat_flux: ExternalHeatFlux },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoundaryConditionKind {
    #[serde(rename = "VELOCITY_INLET_V3", rename_all = "camelCase")]
    VelocityInlet {
        velocity: VelocityCondition,
        temperature: TemperatureCondition,
    },
    #[serde(rename = "PRESSURE_INLET_V31", rename_all = "camelCase")]
    PressureInlet {
        gauge_pressure_rgh: PressureCondition,
        temperature: TemperatureCondition,
    },
    #[serde(rename = "PRESSURE_OUTLET_V30", rename_all = "camelCase")]
    PressureOutlet { gauge_pressure_rgh: PressureCondition },
    #[serde(rename = "WALL_V34", rename_all = "camelCase")]
    Wall {
        velocity: VelocityCondition,
        temperature: TemperatureCondition,
    },
    #[serde(rename = "CONVECTIVE_HEAT_FLUX", rename_all = "camelCase")]
    ConvectiveHeatFlux {
        reference_temperature: DimensionalFunction,
        heat_transfer_coefficient: DimensionalFunction,
    },
}

/// Typed sub-list a boundary condition accumulates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoundaryConditionFamily {
    VelocityInlet,
    PressureInlet,
    PressureOutlet,
    Wall,
    ExternalWallHeatFlux,
    ConvectiveHeatFlux,
}

impl BoundaryConditionFamily {
    /// Order in which sub-lists are concatenated into the specification.
    pub const MERGE_ORDER: [BoundaryConditionFamily; 6] = [
        BoundaryConditionFamily::VelocityInlet,
        BoundaryConditionFamily::PressureInlet,
        BoundaryConditionFamily::PressureOutlet,
        BoundaryConditionFamily::Wall,
        BoundaryConditionFamily::ExternalWallHeatFlux,
        BoundaryConditionFamily::ConvectiveHeatFlux,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryCondition {
    #[serde(skip)]
    pub handle: ItemHandle,
    pub name: String,
    #[serde(flatten)]
    pub kind: BoundaryConditionKind,
    pub topological_reference: TopologicalReference,
}

impl BoundaryCondition {
    pub fn new(name: &str, kind: BoundaryConditionKind, entities: Vec<EntityRef>) -> Self {
        Self {
            handle: ItemHandle::new(),
            name: name.to_string(),
            kind,
            topological_reference: TopologicalReference::new(entities),
        }
    }

    pub fn family(&self) -> BoundaryConditionFamily {
        match &self.kind {
            BoundaryConditionKind::VelocityInlet { .. } => BoundaryConditionFamily::VelocityInlet,
            BoundaryConditionKind::PressureInlet { .. } => BoundaryConditionFamily::PressureInlet,
            BoundaryConditionKind::PressureOutlet { .. } => BoundaryConditionFamily::PressureOutlet,
            BoundaryConditionKind::Wall {
                temperature: TemperatureCondition::ExternalWallHeatFlux { .. },
                ..
            } => BoundaryConditionFamily::ExternalWallHeatFlux,
            BoundaryConditionKind::Wall { .. } => BoundaryConditionFamily::Wall,
            BoundaryConditionKind::ConvectiveHeatFlux { .. } => {
                BoundaryConditionFamily::ConvectiveHeatFlux
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Advanced concepts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSourceMethod {
    /// Total power in W over the assigned bodies.
    Absolute,
    /// Volumetric power in W/m³.
    Specific,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PowerSource {
    Absolute {
        name: String,
        heat_flux: DimensionalFunction,
        topological_reference: TopologicalReference,
    },
    Specific {
        name: String,
        heat_flux: DimensionalFunction,
        topological_reference: TopologicalReference,
    },
}

impl PowerSource {
    pub fn new(name: &str, method: PowerSourceMethod, power: f64, bodies: Vec<EntityRef>) -> Self {
        let topological_reference = TopologicalReference::new(bodies);
        match method {
            PowerSourceMethod::Absolute => PowerSource::Absolute {
                name: name.to_string(),
                heat_flux: DimensionalFunction::constant(power, "W"),
                topological_reference,
            },
            PowerSourceMethod::Specific => PowerSource::Specific {
                name: name.to_string(),
                heat_flux: DimensionalFunction::constant(power, "W/m³"),
                topological_reference,
            },
        }
    }
}

/// Porous media, momentum sources and thermal resistance networks are passed
/// through as the JSON payloads the caller supplies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedConcepts {
    pub power_sources: Vec<PowerSource>,
    pub porous_mediums: Vec<serde_json::Value>,
    pub momentum_sources: Vec<serde_json::Value>,
    pub thermal_resistance_networks: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Numerics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Preconditioner {
    Dilu,
    #[serde(rename = "ILUCP")]
    IluCp { fill_in_level: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum LinearSolver {
    Pbicg {
        absolute_tolerance: f64,
        relative_tolerance: f64,
        preconditioner: Preconditioner,
    },
    Gamg {
        absolute_tolerance: f64,
        relative_tolerance: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaxationFactor {
    pub pressure_rgh_field: f64,
    pub velocity_equation: f64,
    pub temperature_equation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluidSolvers {
    pub velocity_solver: LinearSolver,
    pub temperature_solver: LinearSolver,
    pub pressure_rgh_solver: LinearSolver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schemes {
    pub second_order_convection: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluidNumerics {
    pub relaxation_type: String,
    pub relaxation_factor: RelaxationFactor,
    pub num_non_orthogonal_correctors: u32,
    pub solvers: FluidSolvers,
    pub schemes: Schemes,
}

impl Default for FluidNumerics {
    fn default() -> Self {
        Self {
            relaxation_type: "MANUAL".to_string(),
            relaxation_factor: RelaxationFactor {
                pressure_rgh_field: 0.7,
                velocity_equation: 0.3,
                temperature_equation: 0.9,
            },
            num_non_orthogonal_correctors: 1,
            solvers: FluidSolvers {
                velocity_solver: LinearSolver::Pbicg {
                    absolute_tolerance: 1.0e-15,
                    relative_tolerance: 0.01,
                    preconditioner: Preconditioner::Dilu,
                },
                temperature_solver: LinearSolver::Pbicg {
                    absolute_tolerance: 1.0e-15,
                    relative_tolerance: 0.01,
                    preconditioner: Preconditioner::IluCp { fill_in_level: 1 },
                },
                pressure_rgh_solver: LinearSolver::Gamg {
                    absolute_tolerance: 1.0e-15,
                    relative_tolerance: 0.01,
                },
            },
            schemes: Schemes {
                second_order_convection: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MumpsSolver {
    pub precision_singularity_detection: u32,
    pub stop_if_singular: bool,
    pub matrix_type: String,
    pub memory_percentage_for_pivoting: u32,
    pub linear_system_relative_residual: f64,
    pub preprocessing: bool,
    pub renumbering_method: String,
    pub postprocessing: String,
    pub memory_management: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolidSolver {
    Mumps(MumpsSolver),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidNumerics {
    pub solver: SolidSolver,
}

impl Default for SolidNumerics {
    fn default() -> Self {
        Self {
            solver: SolidSolver::Mumps(MumpsSolver {
                precision_singularity_detection: 8,
                stop_if_singular: true,
                matrix_type: "AUTOMATIC_DETECTION".to_string(),
                memory_percentage_for_pivoting: 20,
                linear_system_relative_residual: 0.00001,
                preprocessing: true,
                renumbering_method: "SCOTCH".to_string(),
                postprocessing: "ACTIVE".to_string(),
                memory_management: "AUTOMATIC".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation and result control
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WriteControl {
    TimeStep { write_interval: u32 },
}

impl WriteControl {
    pub fn every(write_interval: u32) -> Self {
        WriteControl::TimeStep { write_interval }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationControl {
    pub end_time: Dimensional,
    pub delta_t: Dimensional,
    pub write_control: WriteControl,
    pub max_run_time: Dimensional,
    pub num_of_computing_processors: i32,
    pub decompose_algorithm: String,
}

impl Default for SimulationControl {
    fn default() -> Self {
        Self {
            end_time: Dimensional::new(1000.0, "s"),
            delta_t: Dimensional::new(1.0, "s"),
            write_control: WriteControl::every(1000),
            max_run_time: Dimensional::new(40000.0, "s"),
            num_of_computing_processors: -1,
            decompose_algorithm: "SCOTCH".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAggregation {
    AreaAverage,
    AreaIntegral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum SurfaceDataControl {
    AreaAverage {
        name: String,
        write_control: WriteControl,
        topological_reference: TopologicalReference,
    },
    AreaIntegral {
        name: String,
        write_control: WriteControl,
        topological_reference: TopologicalReference,
    },
    #[serde(rename = "HEAT_FLOW")]
    HeatFlow {
        name: String,
        topological_reference: TopologicalReference,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbePointsControl {
    pub name: String,
    pub write_control: WriteControl,
    pub geometry_primitive_uuids: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum FieldCalculation {
    HeatFlux { heat_flux_type: String, name: String },
    Temperature { temperature_type: String, name: String },
}

impl FieldCalculation {
    pub fn wall_heat_flux() -> Self {
        FieldCalculation::HeatFlux {
            heat_flux_type: "FIELD".to_string(),
            name: "Boundary Condition Heat Flux".to_string(),
        }
    }

    pub fn temperature() -> Self {
        FieldCalculation::Temperature {
            temperature_type: "FIELD".to_string(),
            name: "Temperature".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultControls {
    pub surface_data: Vec<SurfaceDataControl>,
    pub probe_points: Vec<ProbePointsControl>,
    pub field_calculations: Vec<FieldCalculation>,
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactDetection {
    #[default]
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondedContact {
    pub name: String,
    pub position_tolerance: Dimensional,
    pub master_topological_reference: TopologicalReference,
    pub slave_topological_reference: TopologicalReference,
}

impl BondedContact {
    pub const POSITION_TOLERANCE_M: f64 = 0.001;

    pub fn new(name: &str, master: Vec<EntityRef>, slave: Vec<EntityRef>) -> Self {
        Self {
            name: name.to_string(),
            position_tolerance: Dimensional::new(Self::POSITION_TOLERANCE_M, "m"),
            master_topological_reference: TopologicalReference::new(master),
            slave_topological_reference: TopologicalReference::new(slave),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Connection {
    BondedContact(BondedContact),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionGroup {
    Contact { connections: Vec<Connection> },
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisType {
    /// Fluid and solid regions solved together.
    ConjugateHeatTransfer,
    /// Solid-only conduction.
    HeatTransfer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConjugateHeatTransferModel {
    pub is_compressible: bool,
    pub turbulence_model: TurbulenceModel,
    pub model: FluidModel,
    pub initial_conditions: InitialConditions,
    pub materials: CoupledMaterials,
    pub numerics: FluidNumerics,
    pub boundary_conditions: Vec<BoundaryCondition>,
    pub advanced_concepts: AdvancedConcepts,
    pub simulation_control: SimulationControl,
    pub result_control: ResultControls,
    pub contact_handling_mode: ContactDetection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connection_groups: Vec<ConnectionGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatTransferModel {
    pub thermal_mesh_element_order: String,
    pub connection_groups: Vec<ConnectionGroup>,
    pub materials: Vec<SolidMaterial>,
    pub initial_conditions: InitialConditions,
    pub boundary_conditions: Vec<BoundaryCondition>,
    pub advanced_concepts: AdvancedConcepts,
    pub numerics: SolidNumerics,
    pub simulation_control: SimulationControl,
    pub result_control: ResultControls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisModel {
    CoupledConjugateHeatTransfer(ConjugateHeatTransferModel),
    HeatTransfer(HeatTransferModel),
}

/// Immutable snapshot sent to the service to create a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSpec {
    pub name: String,
    pub geometry_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_id: Option<Id>,
    pub model: AnalysisModel,
}

impl SimulationSpec {
    pub fn boundary_conditions(&self) -> &[BoundaryCondition] {
        match &self.model {
            AnalysisModel::CoupledConjugateHeatTransfer(m) => &m.boundary_conditions,
            AnalysisModel::HeatTransfer(m) => &m.boundary_conditions,
        }
    }

    pub fn result_control(&self) -> &ResultControls {
        match &self.model {
            AnalysisModel::CoupledConjugateHeatTransfer(m) => &m.result_control,
            AnalysisModel::HeatTransfer(m) => &m.result_control,
        }
    }

    pub fn solid_materials(&self) -> &[SolidMaterial] {
        match &self.model {
            AnalysisModel::CoupledConjugateHeatTransfer(m) => &m.materials.solids,
            AnalysisModel::HeatTransfer(m) => &m.materials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_condition_wire_shape() {
        let bc = BoundaryCondition::new(
            "ExternalWalls",
            BoundaryConditionKind::Wall {
                velocity: VelocityCondition::NoSlip,
                temperature: TemperatureCondition::ExternalWallHeatFlux {
                    heat_flux: ExternalHeatFlux::Fixed {
                        value: Dimensional::new(500.0, "W/m²"),
                    },
                },
            },
            vec![EntityRef::from("B1_TE5")],
        );
        let json = serde_json::to_value(&bc).unwrap();
        assert_eq!(json["type"], "WALL_V34");
        assert_eq!(json["velocity"]["type"], "NO_SLIP");
        assert_eq!(json["temperature"]["type"], "EXTERNAL_WALL_HEAT_FLUX_TEMPERATURE");
        assert_eq!(json["temperature"]["heatFlux"]["type"], "FIXED");
        assert_eq!(json["temperature"]["heatFlux"]["value"]["value"], 500.0);
        assert_eq!(json["topologicalReference"]["entities"][0], "B1_TE5");
        assert!(json.get("handle").is_none());
        assert_eq!(bc.family(), BoundaryConditionFamily::ExternalWallHeatFlux);
    }

    #[test]
    fn test_clones_share_identity() {
        let bc = BoundaryCondition::new(
            "Pressure outlet",
            BoundaryConditionKind::PressureOutlet {
                gauge_pressure_rgh: PressureCondition::FixedValue {
                    value: DimensionalFunction::constant(0.0, "Pa"),
                },
            },
            vec![],
        );
        let twin = bc.clone();
        assert_eq!(bc.handle, twin.handle);

        let other = BoundaryCondition::new("Pressure outlet", twin.kind.clone(), vec![]);
        assert_ne!(bc.handle, other.handle);
    }

    #[test]
    fn test_presets_carry_physical_constants() {
        match FluidPreset::Water.material("Water", vec![]) {
            FluidMaterial::Incompressible(water) => {
                assert_eq!(water.density.value, 997.33);
                assert_eq!(water.specific_heat.value, 4180.0);
                assert_eq!(water.laminar_prandtl_number, 6.5241);
            }
        }
        let wood = SolidMaterial::wood("Wood", vec![]);
        assert_eq!(wood.density.constant_value(), 500.0);
        assert_eq!(wood.specific_heat.constant_value(), 1260.0);
    }

    #[test]
    fn test_turbulence_model_parsing() {
        assert_eq!("KOMEGASST".parse::<TurbulenceModel>(), Ok(TurbulenceModel::KOmegaSst));
        assert_eq!("none".parse::<TurbulenceModel>(), Ok(TurbulenceModel::Laminar));
        assert!("SPALART".parse::<TurbulenceModel>().is_err());
    }
}
