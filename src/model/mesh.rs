use crate::model::{Dimensional, EntityRef, Id, TopologicalReference};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum MeshSizing {
    /// Global sizing from a fineness level, 0 (coarse) to 10 (fine).
    #[serde(rename = "AUTOMATIC_V9")]
    Automatic { fineness: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum LayerSettings {
    AutomaticLayerOn {
        number_of_layers: u32,
        total_relative_thickness: f64,
        growth_rate: f64,
    },
    AutomaticLayerOff,
}

impl Default for LayerSettings {
    fn default() -> Self {
        LayerSettings::AutomaticLayerOn {
            number_of_layers: 3,
            total_relative_thickness: 0.4,
            growth_rate: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedMeshSettings {
    pub small_feature_tolerance: Dimensional,
    pub gap_elements: f64,
    pub global_gradation_rate: f64,
}

impl Default for AdvancedMeshSettings {
    fn default() -> Self {
        Self {
            small_feature_tolerance: Dimensional::new(5e-5, "m"),
            gap_elements: 0.05,
            global_gradation_rate: 1.22,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum MeshRefinement {
    #[serde(rename = "SIMMETRIX_LOCAL_SIZING_V10")]
    LocalSizing {
        name: String,
        max_element_size: Dimensional,
        topological_reference: TopologicalReference,
    },
}

impl MeshRefinement {
    pub fn local_sizing(name: &str, max_element_size_m: f64, entities: Vec<EntityRef>) -> Self {
        MeshRefinement::LocalSizing {
            name: name.to_string(),
            max_element_size: Dimensional::new(max_element_size_m, "m"),
            topological_reference: TopologicalReference::new(entities),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluidMeshModel {
    pub sizing: MeshSizing,
    pub refinements: Vec<MeshRefinement>,
    pub automatic_layer_settings: LayerSettings,
    pub physics_based_meshing: bool,
    pub hex_core: bool,
    pub num_of_processors: i32,
    pub advanced_simmetrix_settings: AdvancedMeshSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolidMeshModel {
    pub sizing: MeshSizing,
    pub refinements: Vec<MeshRefinement>,
    pub second_order: bool,
    pub num_of_processors: i32,
    pub advanced_simmetrix_settings: AdvancedMeshSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MeshModel {
    #[serde(rename = "SIMMETRIX_MESHING_FLUID_V16")]
    Fluid(FluidMeshModel),
    #[serde(rename = "SIMMETRIX_MESHING_SOLID")]
    Solid(SolidMeshModel),
}

impl MeshModel {
    pub fn refinements_mut(&mut self) -> &mut Vec<MeshRefinement> {
        match self {
            MeshModel::Fluid(m) => &mut m.refinements,
            MeshModel::Solid(m) => &mut m.refinements,
        }
    }

    pub fn advanced_settings_mut(&mut self) -> &mut AdvancedMeshSettings {
        match self {
            MeshModel::Fluid(m) => &mut m.advanced_simmetrix_settings,
            MeshModel::Solid(m) => &mut m.advanced_simmetrix_settings,
        }
    }
}

/// Body of a mesh-operation creation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshOperationRequest {
    pub name: String,
    pub geometry_id: Id,
    pub model: MeshModel,
}

impl MeshOperationRequest {
    /// Physics-based fluid mesh with a hex core and automatic boundary layers.
    pub fn fluid(name: &str, geometry_id: &str, fineness: f64) -> Self {
        Self {
            name: name.to_string(),
            geometry_id: geometry_id.to_string(),
            model: MeshModel::Fluid(FluidMeshModel {
                sizing: MeshSizing::Automatic { fineness },
                refinements: Vec::new(),
                automatic_layer_settings: LayerSettings::default(),
                physics_based_meshing: true,
                hex_core: true,
                num_of_processors: -1,
                advanced_simmetrix_settings: AdvancedMeshSettings::default(),
            }),
        }
    }

    pub fn solid(name: &str, geometry_id: &str, fineness: f64) -> Self {
        Self {
            name: name.to_string(),
            geometry_id: geometry_id.to_string(),
            model: MeshModel::Solid(SolidMeshModel {
                sizing: MeshSizing::Automatic { fineness },
                refinements: Vec::new(),
                second_order: true,
                num_of_processors: -1,
                advanced_simmetrix_settings: AdvancedMeshSettings::default(),
            }),
        }
    }

    pub fn with_layers(mut self, layers: LayerSettings) -> Self {
        if let MeshModel::Fluid(model) = &mut self.model {
            model.automatic_layer_settings = layers;
        }
        self
    }

    pub fn with_refinement(mut self, refinement: MeshRefinement) -> Self {
        self.model.refinements_mut().push(refinement);
        self
    }

    pub fn with_advanced_settings(mut self, settings: AdvancedMeshSettings) -> Self {
        *self.model.advanced_settings_mut() = settings;
        self
    }
}
