use std::fmt;

use super::function::FunctionId;

/// Binding semantic of a varying or vertex attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Semantic {
    Unknown,
    Position,
    Normal,
    Color,
    TexCoord,
}

impl Semantic {
    /// Short tag used when naming generated parameters (`iColor_0`, `oTexcoord_1`, ...).
    pub fn name_tag(self) -> &'static str {
        match self {
            Semantic::Unknown => "Param",
            Semantic::Position => "Pos",
            Semantic::Normal => "Normal",
            Semantic::Color => "Color",
            Semantic::TexCoord => "Texcoord",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Float1,
    Float2,
    Float3,
    Float4,
    Matrix3x3,
    Matrix4x4,
    Int1,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
}

impl ElementType {
    /// Number of scalar components addressable through a swizzle. Matrices and samplers are not
    /// swizzlable and report 0.
    pub fn component_count(self) -> u32 {
        match self {
            ElementType::Float1 | ElementType::Int1 => 1,
            ElementType::Float2 => 2,
            ElementType::Float3 => 3,
            ElementType::Float4 => 4,
            ElementType::Matrix3x3
            | ElementType::Matrix4x4
            | ElementType::Sampler1D
            | ElementType::Sampler2D
            | ElementType::Sampler3D
            | ElementType::SamplerCube => 0,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            ElementType::Sampler1D
                | ElementType::Sampler2D
                | ElementType::Sampler3D
                | ElementType::SamplerCube
        )
    }

    pub fn float_vector(components: u32) -> Option<ElementType> {
        match components {
            1 => Some(ElementType::Float1),
            2 => Some(ElementType::Float2),
            3 => Some(ElementType::Float3),
            4 => Some(ElementType::Float4),
            _ => None,
        }
    }
}

/// Engine-supplied values. The host parameter-binding layer resolves these at draw time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AutoConstantKind {
    WorldMatrix,
    InverseTransposeWorldMatrix,
    ViewMatrix,
    InverseTransposeViewMatrix,
    WorldViewMatrix,
    InverseTransposeWorldViewMatrix,
    WorldViewProjMatrix,
    /// Per texture unit; the int payload selects the unit.
    TextureMatrix,
    SurfaceAmbientColour,
    SurfaceDiffuseColour,
    SurfaceSpecularColour,
    SurfaceEmissiveColour,
    SurfaceShininess,
    AmbientLightColour,
    DerivedAmbientLightColour,
    DerivedSceneColour,
    FogColour,
    FogParams,
}

impl AutoConstantKind {
    pub fn name(self) -> &'static str {
        match self {
            AutoConstantKind::WorldMatrix => "world_matrix",
            AutoConstantKind::InverseTransposeWorldMatrix => "inverse_transpose_world_matrix",
            AutoConstantKind::ViewMatrix => "view_matrix",
            AutoConstantKind::InverseTransposeViewMatrix => "inverse_transpose_view_matrix",
            AutoConstantKind::WorldViewMatrix => "worldview_matrix",
            AutoConstantKind::InverseTransposeWorldViewMatrix => {
                "inverse_transpose_worldview_matrix"
            }
            AutoConstantKind::WorldViewProjMatrix => "worldviewproj_matrix",
            AutoConstantKind::TextureMatrix => "texture_matrix",
            AutoConstantKind::SurfaceAmbientColour => "surface_ambient_colour",
            AutoConstantKind::SurfaceDiffuseColour => "surface_diffuse_colour",
            AutoConstantKind::SurfaceSpecularColour => "surface_specular_colour",
            AutoConstantKind::SurfaceEmissiveColour => "surface_emissive_colour",
            AutoConstantKind::SurfaceShininess => "surface_shininess",
            AutoConstantKind::AmbientLightColour => "ambient_light_colour",
            AutoConstantKind::DerivedAmbientLightColour => "derived_ambient_light_colour",
            AutoConstantKind::DerivedSceneColour => "derived_scene_colour",
            AutoConstantKind::FogColour => "fog_colour",
            AutoConstantKind::FogParams => "fog_params",
        }
    }

    pub fn element_type(self) -> ElementType {
        match self {
            AutoConstantKind::WorldMatrix
            | AutoConstantKind::InverseTransposeWorldMatrix
            | AutoConstantKind::ViewMatrix
            | AutoConstantKind::InverseTransposeViewMatrix
            | AutoConstantKind::WorldViewMatrix
            | AutoConstantKind::InverseTransposeWorldViewMatrix
            | AutoConstantKind::WorldViewProjMatrix
            | AutoConstantKind::TextureMatrix => ElementType::Matrix4x4,
            AutoConstantKind::SurfaceShininess => ElementType::Float1,
            AutoConstantKind::SurfaceAmbientColour
            | AutoConstantKind::SurfaceDiffuseColour
            | AutoConstantKind::SurfaceSpecularColour
            | AutoConstantKind::SurfaceEmissiveColour
            | AutoConstantKind::AmbientLightColour
            | AutoConstantKind::DerivedAmbientLightColour
            | AutoConstantKind::DerivedSceneColour
            | AutoConstantKind::FogColour
            | AutoConstantKind::FogParams => ElementType::Float4,
        }
    }

    /// Kinds whose payload selects an instance and therefore becomes part of the uniform name.
    pub fn is_indexed(self) -> bool {
        matches!(self, AutoConstantKind::TextureMatrix)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AutoConstantData {
    Int(i32),
    Real(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoConstant {
    pub kind: AutoConstantKind,
    pub data: AutoConstantData,
}

impl AutoConstant {
    pub(crate) fn uniform_name(&self) -> String {
        match (self.kind.is_indexed(), self.data) {
            (true, AutoConstantData::Int(index)) => format!("{}{}", self.kind.name(), index),
            _ => self.kind.name().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    name: String,
    ty: ElementType,
    semantic: Semantic,
    index: u32,
    auto_constant: Option<AutoConstant>,
}

impl Parameter {
    pub(crate) fn new(name: String, ty: ElementType, semantic: Semantic, index: u32) -> Self {
        Self {
            name,
            ty,
            semantic,
            index,
            auto_constant: None,
        }
    }

    pub(crate) fn new_auto(auto: AutoConstant) -> Self {
        Self {
            name: auto.uniform_name(),
            ty: auto.kind.element_type(),
            semantic: Semantic::Unknown,
            index: 0,
            auto_constant: Some(auto),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> ElementType {
        self.ty
    }

    pub fn semantic(&self) -> Semantic {
        self.semantic
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn auto_constant(&self) -> Option<&AutoConstant> {
        self.auto_constant.as_ref()
    }

    pub fn is_auto_constant(&self) -> bool {
        self.auto_constant.is_some()
    }
}

/// Which list inside a [`super::Program`] a parameter lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterScope {
    Global,
    Input(FunctionId),
    Output(FunctionId),
    Local(FunctionId),
}

impl ParameterScope {
    pub fn function(self) -> Option<FunctionId> {
        match self {
            ParameterScope::Global => None,
            ParameterScope::Input(id) | ParameterScope::Output(id) | ParameterScope::Local(id) => {
                Some(id)
            }
        }
    }
}

/// Handle to a parameter inside one build's program arena. Only meaningful for the
/// [`super::ProgramSet`] that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParameterId {
    pub(crate) scope: ParameterScope,
    pub(crate) slot: u32,
}

impl ParameterId {
    pub fn scope(self) -> ParameterScope {
        self.scope
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            ParameterScope::Global => write!(f, "global#{}", self.slot),
            ParameterScope::Input(func) => write!(f, "fn{}.in#{}", func.0, self.slot),
            ParameterScope::Output(func) => write!(f, "fn{}.out#{}", func.0, self.slot),
            ParameterScope::Local(func) => write!(f, "fn{}.local#{}", func.0, self.slot),
        }
    }
}
