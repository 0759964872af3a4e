use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{Result, WorkflowError};
use crate::files::LabeledPoint;
use crate::model::{
    AdvancedConcepts, AnalysisModel, AnalysisType, Axis, BondedContact, BoundaryCondition,
    BoundaryConditionFamily, BoundaryConditionKind, Conductivity, ConjugateHeatTransferModel,
    Connection, ConnectionGroup, ContactDetection, CoupledMaterials, Dimensional, DimensionalFunction,
    DimensionalVectorFunction, DecimalVector, EntityRef, ExternalHeatFlux, FieldCalculation,
    FluidMaterial, FluidModel, FluidNumerics, FluidPreset, GeometryPrimitive, HeatTransferModel, Id,
    InitialConditions, ItemHandle, PowerSource, PowerSourceMethod, PressureCondition,
    ProbePointsControl, ResultControls, Simulation, SimulationControl, SimulationSpec, SolidMaterial,
    SolidNumerics, SurfaceAggregation, SurfaceDataControl, TemperatureCondition, TopologicalReference,
    TurbulenceModel, VelocityCondition, WriteControl,
};
use crate::remote::{EntityMappingCache, SimulationApi};

/// Write interval used for probe points and surface data unless overridden.
pub const DEFAULT_RESULT_WRITE_INTERVAL: u32 = 10;

/// Lifecycle of a specification builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Empty,
    Accumulating,
    Finalized,
    Submitted,
}

/// How an external wall exchanges heat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatFluxMethod {
    /// Ambient temperature plus heat-transfer coefficient.
    Derived,
    /// Explicit heat flux.
    Fixed,
    /// Explicit power.
    FixedPower,
}

impl HeatFluxMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeatFluxMethod::Derived => "DERIVED",
            HeatFluxMethod::Fixed => "FIXED",
            HeatFluxMethod::FixedPower => "FIXED_POWER",
        }
    }
}

impl std::str::FromStr for HeatFluxMethod {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DERIVED" => Ok(HeatFluxMethod::Derived),
            "FIXED" => Ok(HeatFluxMethod::Fixed),
            "FIXED_POWER" => Ok(HeatFluxMethod::FixedPower),
            other => Err(WorkflowError::Parse(format!("unknown heat flux method '{}'", other))),
        }
    }
}

/// Optional parameters of an external-wall-heat-flux condition. Which ones are
/// required depends on the method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalHeatFluxParams {
    /// °C
    pub ambient_temperature: Option<f64>,
    /// W/(K·m²)
    pub heat_transfer_coefficient: Option<f64>,
    pub heat_flux: Option<f64>,
    /// W
    pub power: Option<f64>,
    /// Unit of `heat_flux`, `W/m²` when not given.
    pub heat_flux_unit: Option<String>,
}

/// Where the points of a probe control come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeSource {
    Single(LabeledPoint),
    Table(Vec<LabeledPoint>),
}

impl ProbeSource {
    pub fn points(&self) -> &[LabeledPoint] {
        match self {
            ProbeSource::Single(point) => std::slice::from_ref(point),
            ProbeSource::Table(points) => points,
        }
    }
}

/// A probe control whose geometry primitives are created on submit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingProbe {
    pub name: String,
    pub write_interval: u32,
    pub source: ProbeSource,
}

/// Accumulates the parts of one simulation specification and assembles them
/// into an immutable [`SimulationSpec`].
///
/// Setters are accepted while the builder is empty or accumulating. `finalize`
/// snapshots and freezes the builder; it must be `reset` before it describes
/// another simulation. Entity mappings live in the shared cache and survive
/// resets.
#[derive(Debug)]
pub struct SpecificationBuilder {
    geometry_id: Id,
    analysis: AnalysisType,
    cache: Arc<EntityMappingCache>,
    state: BuilderState,

    is_compressible: bool,
    turbulence_model: TurbulenceModel,
    fluid_model: FluidModel,
    initial_conditions: InitialConditions,

    boundary_conditions: BTreeMap<BoundaryConditionFamily, Vec<BoundaryCondition>>,
    fluids: Vec<FluidMaterial>,
    solids: Vec<SolidMaterial>,
    advanced: AdvancedConcepts,

    fluid_numerics: Option<FluidNumerics>,
    solid_numerics: Option<SolidNumerics>,
    simulation_control: Option<SimulationControl>,

    surface_data: Vec<SurfaceDataControl>,
    probes: Vec<PendingProbe>,
    field_calculations: Vec<FieldCalculation>,

    contact_detection: ContactDetection,
    bonded_contacts: Vec<BondedContact>,

    finalized: Option<SimulationSpec>,
    simulation_id: Option<Id>,
}

impl SpecificationBuilder {
    pub fn new(geometry_id: &Id, analysis: AnalysisType, cache: Arc<EntityMappingCache>) -> Self {
        Self {
            geometry_id: geometry_id.clone(),
            analysis,
            cache,
            state: BuilderState::Empty,
            is_compressible: false,
            turbulence_model: TurbulenceModel::KOmegaSst,
            fluid_model: FluidModel::with_gravity(Axis::Z, -9.81),
            initial_conditions: InitialConditions::default(),
            boundary_conditions: BTreeMap::new(),
            fluids: Vec::new(),
            solids: Vec::new(),
            advanced: AdvancedConcepts::default(),
            fluid_numerics: None,
            solid_numerics: None,
            simulation_control: None,
            surface_data: Vec::new(),
            probes: Vec::new(),
            field_calculations: Vec::new(),
            contact_detection: ContactDetection::default(),
            bonded_contacts: Vec::new(),
            finalized: None,
            simulation_id: None,
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn analysis(&self) -> AnalysisType {
        self.analysis
    }

    pub fn geometry_id(&self) -> &Id {
        &self.geometry_id
    }

    pub fn cache(&self) -> &Arc<EntityMappingCache> {
        &self.cache
    }

    /// The finalized snapshot, if any.
    pub fn specification(&self) -> Option<&SimulationSpec> {
        self.finalized.as_ref()
    }

    /// Id of the simulation created by `submit`.
    pub fn simulation_id(&self) -> Option<&Id> {
        self.simulation_id.as_ref()
    }

    /// Probe controls waiting for their geometry primitives.
    pub fn pending_probes(&self) -> &[PendingProbe] {
        &self.probes
    }

    fn frozen_error(&self) -> WorkflowError {
        let name = self
            .finalized
            .as_ref()
            .map(|spec| spec.name.clone())
            .unwrap_or_default();
        WorkflowError::ReuseWithoutReset(name)
    }

    fn accumulate(&mut self) -> Result<&mut Self> {
        match self.state {
            BuilderState::Empty => {
                self.state = BuilderState::Accumulating;
                Ok(self)
            }
            BuilderState::Accumulating => Ok(self),
            BuilderState::Finalized | BuilderState::Submitted => Err(self.frozen_error()),
        }
    }

    // ------------------------------------------------------------------
    // Physics
    // ------------------------------------------------------------------

    pub fn compressible(&mut self, is_compressible: bool) -> Result<()> {
        self.accumulate()?.is_compressible = is_compressible;
        Ok(())
    }

    pub fn turbulence_model(&mut self, model: TurbulenceModel) -> Result<()> {
        self.accumulate()?.turbulence_model = model;
        Ok(())
    }

    pub fn gravity(&mut self, axis: Axis, value: f64) -> Result<()> {
        self.accumulate()?.fluid_model = FluidModel::with_gravity(axis, value);
        Ok(())
    }

    pub fn initial_conditions(&mut self, conditions: InitialConditions) -> Result<()> {
        self.accumulate()?.initial_conditions = conditions;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Boundary conditions
    // ------------------------------------------------------------------

    /// Append a boundary condition to the sub-list of its family.
    ///
    /// Adding a clone of an already accumulated condition is harmless; the merge
    /// on `finalize` keeps one entry per identity.
    pub fn add_boundary_condition(&mut self, condition: BoundaryCondition) -> Result<BoundaryCondition> {
        let family = condition.family();
        self.accumulate()?
            .boundary_conditions
            .entry(family)
            .or_default()
            .push(condition.clone());
        debug!("Added {:?} boundary condition '{}'", family, condition.name);
        Ok(condition)
    }

    /// Inlet with a constant velocity (m/s) and temperature (°C).
    pub fn velocity_inlet(
        &mut self,
        name: &str,
        velocity: DecimalVector,
        temperature_c: f64,
        entities: Vec<EntityRef>,
    ) -> Result<BoundaryCondition> {
        self.add_boundary_condition(BoundaryCondition::new(
            name,
            BoundaryConditionKind::VelocityInlet {
                velocity: VelocityCondition::FixedValue {
                    value: DimensionalVectorFunction::constant(velocity, "m/s"),
                },
                temperature: fixed_temperature(temperature_c),
            },
            entities,
        ))
    }

    /// Inlet with a total pressure and temperature (°C).
    pub fn pressure_inlet(
        &mut self,
        name: &str,
        total_pressure: f64,
        unit: &str,
        temperature_c: f64,
        entities: Vec<EntityRef>,
    ) -> Result<BoundaryCondition> {
        self.add_boundary_condition(BoundaryCondition::new(
            name,
            BoundaryConditionKind::PressureInlet {
                gauge_pressure_rgh: PressureCondition::TotalPressure {
                    total_pressure: DimensionalFunction::constant(total_pressure, unit),
                },
                temperature: fixed_temperature(temperature_c),
            },
            entities,
        ))
    }

    /// Outlet held at a fixed gauge pressure.
    pub fn pressure_outlet(
        &mut self,
        name: &str,
        gauge_pressure: f64,
        unit: &str,
        entities: Vec<EntityRef>,
    ) -> Result<BoundaryCondition> {
        self.add_boundary_condition(BoundaryCondition::new(
            name,
            BoundaryConditionKind::PressureOutlet {
                gauge_pressure_rgh: PressureCondition::FixedValue {
                    value: DimensionalFunction::constant(gauge_pressure, unit),
                },
            },
            entities,
        ))
    }

    /// No-slip wall at a fixed temperature (°C).
    pub fn wall(&mut self, name: &str, temperature_c: f64, entities: Vec<EntityRef>) -> Result<BoundaryCondition> {
        self.add_boundary_condition(BoundaryCondition::new(
            name,
            BoundaryConditionKind::Wall {
                velocity: VelocityCondition::NoSlip,
                temperature: fixed_temperature(temperature_c),
            },
            entities,
        ))
    }

    /// No-slip wall exchanging heat with the outside by one of three methods.
    pub fn external_wall_heat_flux(
        &mut self,
        name: &str,
        method: HeatFluxMethod,
        params: ExternalHeatFluxParams,
        entities: Vec<EntityRef>,
    ) -> Result<BoundaryCondition> {
        let heat_flux = external_heat_flux(name, method, &params)?;
        self.add_boundary_condition(BoundaryCondition::new(
            name,
            BoundaryConditionKind::Wall {
                velocity: VelocityCondition::NoSlip,
                temperature: TemperatureCondition::ExternalWallHeatFlux { heat_flux },
            },
            entities,
        ))
    }

    /// Solid surface cooled by convection to a reference temperature (°C).
    pub fn convective_heat_flux(
        &mut self,
        name: &str,
        reference_temperature_c: f64,
        heat_transfer_coefficient: f64,
        entities: Vec<EntityRef>,
    ) -> Result<BoundaryCondition> {
        self.add_boundary_condition(BoundaryCondition::new(
            name,
            BoundaryConditionKind::ConvectiveHeatFlux {
                reference_temperature: DimensionalFunction::constant(reference_temperature_c, "°C"),
                heat_transfer_coefficient: DimensionalFunction::constant(
                    heat_transfer_coefficient,
                    "W/(K·m²)",
                ),
            },
            entities,
        ))
    }

    // ------------------------------------------------------------------
    // Materials
    // ------------------------------------------------------------------

    pub fn fluid_material(&mut self, preset: FluidPreset, name: &str, entities: Vec<EntityRef>) -> Result<()> {
        let material = preset.material(name, entities);
        self.accumulate()?.fluids.push(material);
        Ok(())
    }

    pub fn wood(&mut self, name: &str, entities: Vec<EntityRef>) -> Result<()> {
        let material = SolidMaterial::wood(name, entities);
        self.solid_material(material)
    }

    /// Custom solid assigned to every entity in `entities`.
    pub fn custom_solid(&mut self, name: &str, conductivity: Conductivity, entities: Vec<EntityRef>) -> Result<()> {
        self.solid_material(SolidMaterial::custom(name, conductivity, entities))
    }

    pub fn solid_material(&mut self, material: SolidMaterial) -> Result<()> {
        self.accumulate()?.solids.push(material);
        Ok(())
    }

    /// One isotropic custom solid per group, e.g. from an attribute or colour scan.
    pub fn solids_from_groups(
        &mut self,
        groups: &BTreeMap<String, Vec<EntityRef>>,
        conductivity: &BTreeMap<String, f64>,
    ) -> Result<()> {
        for (material, entities) in groups {
            let k = conductivity.get(material).copied().ok_or_else(|| {
                WorkflowError::InvalidState(format!("no conductivity given for material '{}'", material))
            })?;
            self.custom_solid(material, Conductivity::isotropic(k), entities.clone())?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Advanced concepts
    // ------------------------------------------------------------------

    pub fn power_source(
        &mut self,
        name: &str,
        method: PowerSourceMethod,
        power: f64,
        bodies: Vec<EntityRef>,
    ) -> Result<()> {
        let source = PowerSource::new(name, method, power, bodies);
        self.accumulate()?.advanced.power_sources.push(source);
        Ok(())
    }

    pub fn porous_medium(&mut self, payload: serde_json::Value) -> Result<()> {
        self.accumulate()?.advanced.porous_mediums.push(payload);
        Ok(())
    }

    pub fn momentum_source(&mut self, payload: serde_json::Value) -> Result<()> {
        self.accumulate()?.advanced.momentum_sources.push(payload);
        Ok(())
    }

    pub fn thermal_resistance_network(&mut self, payload: serde_json::Value) -> Result<()> {
        self.accumulate()?.advanced.thermal_resistance_networks.push(payload);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Numerics and control
    // ------------------------------------------------------------------

    pub fn fluid_numerics(&mut self, numerics: FluidNumerics) -> Result<()> {
        self.accumulate()?.fluid_numerics = Some(numerics);
        Ok(())
    }

    pub fn solid_numerics(&mut self, numerics: SolidNumerics) -> Result<()> {
        self.accumulate()?.solid_numerics = Some(numerics);
        Ok(())
    }

    pub fn simulation_control(&mut self, control: SimulationControl) -> Result<()> {
        self.accumulate()?.simulation_control = Some(control);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Result controls
    // ------------------------------------------------------------------

    pub fn surface_data(
        &mut self,
        name: &str,
        aggregation: SurfaceAggregation,
        write_interval: u32,
        entities: Vec<EntityRef>,
    ) -> Result<()> {
        let name = name.to_string();
        let write_control = WriteControl::every(write_interval);
        let topological_reference = TopologicalReference::new(entities);
        let control = match aggregation {
            SurfaceAggregation::AreaAverage => SurfaceDataControl::AreaAverage {
                name,
                write_control,
                topological_reference,
            },
            SurfaceAggregation::AreaIntegral => SurfaceDataControl::AreaIntegral {
                name,
                write_control,
                topological_reference,
            },
        };
        self.accumulate()?.surface_data.push(control);
        Ok(())
    }

    pub fn heat_flow(&mut self, name: &str, entities: Vec<EntityRef>) -> Result<()> {
        let control = SurfaceDataControl::HeatFlow {
            name: name.to_string(),
            topological_reference: TopologicalReference::new(entities),
        };
        self.accumulate()?.surface_data.push(control);
        Ok(())
    }

    pub fn field_calculation(&mut self, calculation: FieldCalculation) -> Result<()> {
        self.accumulate()?.field_calculations.push(calculation);
        Ok(())
    }

    /// Wall heat flux and temperature field outputs.
    pub fn default_field_calculations(&mut self) -> Result<()> {
        self.field_calculation(FieldCalculation::wall_heat_flux())?;
        self.field_calculation(FieldCalculation::temperature())
    }

    /// Probe control over a single point or a table of labeled points.
    pub fn probe_points(&mut self, name: &str, write_interval: u32, source: ProbeSource) -> Result<()> {
        if source.points().is_empty() {
            return Err(WorkflowError::InvalidState(format!(
                "probe control '{}' has no points",
                name
            )));
        }
        self.accumulate()?.probes.push(PendingProbe {
            name: name.to_string(),
            write_interval,
            source,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Contacts
    // ------------------------------------------------------------------

    pub fn contact_detection(&mut self, detection: ContactDetection) -> Result<()> {
        self.accumulate()?.contact_detection = detection;
        Ok(())
    }

    pub fn bonded_contact(&mut self, name: &str, master: Vec<EntityRef>, slave: Vec<EntityRef>) -> Result<()> {
        let contact = BondedContact::new(name, master, slave);
        self.accumulate()?.bonded_contacts.push(contact);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Boundary conditions of every family, in merge order, one per identity.
    fn merged_boundary_conditions(&self) -> Vec<BoundaryCondition> {
        let mut seen: HashSet<ItemHandle> = HashSet::new();
        let mut merged = Vec::new();
        for family in BoundaryConditionFamily::MERGE_ORDER {
            let Some(conditions) = self.boundary_conditions.get(&family) else {
                continue;
            };
            for condition in conditions {
                if seen.insert(condition.handle) {
                    merged.push(condition.clone());
                } else {
                    debug!("Skipping repeated boundary condition '{}'", condition.name);
                }
            }
        }
        merged
    }

    /// Probe controls without primitive ids; `submit` fills them in.
    fn probe_controls(&self) -> Vec<ProbePointsControl> {
        self.probes
            .iter()
            .map(|probe| ProbePointsControl {
                name: probe.name.clone(),
                write_control: WriteControl::every(probe.write_interval),
                geometry_primitive_uuids: Vec::new(),
            })
            .collect()
    }

    fn connection_groups(&self) -> Vec<ConnectionGroup> {
        if self.bonded_contacts.is_empty() {
            return Vec::new();
        }
        vec![ConnectionGroup::Contact {
            connections: self
                .bonded_contacts
                .iter()
                .cloned()
                .map(Connection::BondedContact)
                .collect(),
        }]
    }

    /// Assemble the accumulated parts into a specification named `name`.
    pub fn finalize(&mut self, name: &str) -> Result<SimulationSpec> {
        if matches!(self.state, BuilderState::Finalized | BuilderState::Submitted) {
            return Err(self.frozen_error());
        }

        let boundary_conditions = self.merged_boundary_conditions();
        let result_control = ResultControls {
            surface_data: self.surface_data.clone(),
            probe_points: self.probe_controls(),
            field_calculations: self.field_calculations.clone(),
        };
        let simulation_control = self.simulation_control.clone().unwrap_or_default();

        let model = match self.analysis {
            AnalysisType::ConjugateHeatTransfer => {
                AnalysisModel::CoupledConjugateHeatTransfer(ConjugateHeatTransferModel {
                    is_compressible: self.is_compressible,
                    turbulence_model: self.turbulence_model,
                    model: self.fluid_model.clone(),
                    initial_conditions: self.initial_conditions.clone(),
                    materials: CoupledMaterials {
                        fluids: self.fluids.clone(),
                        solids: self.solids.clone(),
                    },
                    numerics: self.fluid_numerics.clone().unwrap_or_default(),
                    boundary_conditions,
                    advanced_concepts: self.advanced.clone(),
                    simulation_control,
                    result_control,
                    contact_handling_mode: self.contact_detection,
                    connection_groups: self.connection_groups(),
                })
            }
            AnalysisType::HeatTransfer => AnalysisModel::HeatTransfer(HeatTransferModel {
                thermal_mesh_element_order: "SECOND".to_string(),
                connection_groups: self.connection_groups(),
                materials: self.solids.clone(),
                initial_conditions: self.initial_conditions.clone(),
                boundary_conditions,
                advanced_concepts: self.advanced.clone(),
                numerics: self.solid_numerics.clone().unwrap_or_default(),
                simulation_control,
                result_control,
            }),
        };

        let spec = SimulationSpec {
            name: name.to_string(),
            geometry_id: self.geometry_id.clone(),
            mesh_id: None,
            model,
        };
        info!(
            "Finalized specification '{}' with {} boundary condition(s)",
            name,
            spec.boundary_conditions().len()
        );
        self.finalized = Some(spec.clone());
        self.state = BuilderState::Finalized;
        Ok(spec)
    }

    /// Create the probe primitives and the simulation for the finalized
    /// specification.
    pub async fn submit<S>(&mut self, remote: &S, project_id: &Id) -> Result<Simulation>
    where
        S: SimulationApi + ?Sized,
    {
        let mut spec = match (self.state, self.finalized.clone()) {
            (BuilderState::Finalized, Some(spec)) => spec,
            (BuilderState::Submitted, _) => return Err(self.frozen_error()),
            _ => {
                return Err(WorkflowError::InvalidState(
                    "specification must be finalized before it is submitted".to_string(),
                ))
            }
        };

        let mut probe_ids = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let mut ids = Vec::with_capacity(probe.source.points().len());
            for point in probe.source.points() {
                let primitive = GeometryPrimitive::point(&point.label, point.position);
                ids.push(remote.create_geometry_primitive(project_id, &primitive).await?);
            }
            debug!("Created {} probe point(s) for '{}'", ids.len(), probe.name);
            probe_ids.push(ids);
        }

        let controls = match &mut spec.model {
            AnalysisModel::CoupledConjugateHeatTransfer(m) => &mut m.result_control.probe_points,
            AnalysisModel::HeatTransfer(m) => &mut m.result_control.probe_points,
        };
        for (control, ids) in controls.iter_mut().zip(probe_ids) {
            control.geometry_primitive_uuids = ids;
        }

        let simulation = remote.create_simulation(project_id, &spec).await?;
        info!("Created simulation '{}' ({})", simulation.name, simulation.simulation_id);

        self.finalized = Some(spec);
        self.simulation_id = Some(simulation.simulation_id.clone());
        self.state = BuilderState::Submitted;
        Ok(simulation)
    }

    /// Drop every accumulated part and start a new specification. The entity
    /// mapping cache is kept.
    pub fn reset(&mut self) {
        let geometry_id = self.geometry_id.clone();
        let cache = self.cache.clone();
        *self = Self::new(&geometry_id, self.analysis, cache);
        self.state = BuilderState::Accumulating;
    }
}

fn fixed_temperature(celsius: f64) -> TemperatureCondition {
    TemperatureCondition::FixedValue {
        value: DimensionalFunction::constant(celsius, "°C"),
    }
}

fn external_heat_flux(name: &str, method: HeatFluxMethod, params: &ExternalHeatFluxParams) -> Result<ExternalHeatFlux> {
    let missing = |field: &str| WorkflowError::InvalidBoundaryCondition {
        name: name.to_string(),
        method: method.as_str().to_string(),
        missing: field.to_string(),
    };

    match method {
        HeatFluxMethod::Derived => {
            let ambient = params
                .ambient_temperature
                .ok_or_else(|| missing("ambient_temperature"))?;
            let htc = params
                .heat_transfer_coefficient
                .ok_or_else(|| missing("heat_transfer_coefficient"))?;
            Ok(ExternalHeatFlux::Derived {
                heat_transfer_coefficient: Dimensional::new(htc, "W/(K·m²)"),
                ambient_temperature: Dimensional::new(ambient, "°C"),
            })
        }
        HeatFluxMethod::Fixed => {
            let flux = params.heat_flux.ok_or_else(|| missing("heat_flux"))?;
            let unit = params.heat_flux_unit.as_deref().unwrap_or("W/m²");
            Ok(ExternalHeatFlux::Fixed {
                value: Dimensional::new(flux, unit),
            })
        }
        HeatFluxMethod::FixedPower => {
            let power = params.power.ok_or_else(|| missing("power"))?;
            Ok(ExternalHeatFlux::FixedPower {
                value: Dimensional::new(power, "W"),
            })
        }
    }
}
