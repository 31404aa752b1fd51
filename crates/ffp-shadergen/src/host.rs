//! Host engine state consumed and produced at the subsystem boundary.
//!
//! These are plain data snapshots: the host fills them from its own material/scene model and
//! reads back the programs and constants bound onto destination passes.

use std::collections::BTreeMap;
use std::sync::Arc;

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::compiler::GpuProgram;
use crate::math::IDENTITY;

/// Column-major 4x4 matrix.
pub type Mat4 = [[f32; 4]; 4];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LightType {
    Point,
    #[default]
    Directional,
    Spot,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightType,
    /// World-space position (point/spot).
    pub position: [f32; 3],
    /// World-space direction of the light rays (directional/spot).
    pub direction: [f32; 3],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// (range, constant, linear, quadratic).
    pub attenuation: [f32; 4],
    /// Inner and outer cone angles in radians.
    pub spot_inner: f32,
    pub spot_outer: f32,
    pub spot_falloff: f32,
}

impl Light {
    /// A light that contributes nothing; written into slots with no matching scene light.
    pub fn blank(kind: LightType) -> Self {
        Self {
            kind,
            position: [0.0; 3],
            direction: [0.0, 0.0, -1.0],
            diffuse: [0.0; 4],
            specular: [0.0; 4],
            attenuation: [0.0, 1.0, 0.0, 0.0],
            spot_inner: 0.0,
            spot_outer: 0.0,
            spot_falloff: 1.0,
        }
    }

    pub fn directional(direction: [f32; 3], diffuse: [f32; 4]) -> Self {
        Self {
            direction,
            diffuse,
            ..Self::blank(LightType::Directional)
        }
    }

    pub fn point(position: [f32; 3], diffuse: [f32; 4], range: f32) -> Self {
        Self {
            position,
            diffuse,
            attenuation: [range, 1.0, 0.0, 0.0],
            ..Self::blank(LightType::Point)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FogMode {
    #[default]
    None,
    Exp,
    Exp2,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FogSettings {
    pub mode: FogMode,
    pub colour: [f32; 4],
    pub start: f32,
    pub end: f32,
    pub density: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            mode: FogMode::None,
            colour: [1.0, 1.0, 1.0, 1.0],
            start: 0.0,
            end: 1.0,
            density: 0.001,
        }
    }
}

/// Scene-wide state used as a fallback when a pass does not override it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SceneSettings {
    pub fog: FogSettings,
}

bitflags! {
    /// Surface colours taken from the per-vertex colour instead of the material.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TrackVertexColour: u8 {
        const AMBIENT = 1 << 0;
        const DIFFUSE = 1 << 1;
        const SPECULAR = 1 << 2;
        const EMISSIVE = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureType {
    Tex1D,
    #[default]
    Tex2D,
    Tex3D,
    Cube,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerBlendOperation {
    /// Replace with the first argument.
    Source1,
    Source2,
    Modulate,
    ModulateX2,
    ModulateX4,
    Add,
    AddSigned,
    AddSmooth,
    Subtract,
    BlendDiffuseAlpha,
    BlendTextureAlpha,
    BlendCurrentAlpha,
    BlendManual,
    DotProduct,
    BlendDiffuseColour,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerBlendSource {
    /// Result of the previous stage, or the diffuse colour for the first stage.
    Current,
    Texture,
    Diffuse,
    Specular,
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerBlendMode {
    pub operation: LayerBlendOperation,
    pub source1: LayerBlendSource,
    pub source2: LayerBlendSource,
    /// Manual values used by colour blending.
    pub colour_arg1: [f32; 4],
    pub colour_arg2: [f32; 4],
    /// Manual values used by alpha blending.
    pub alpha_arg1: f32,
    pub alpha_arg2: f32,
    /// Blend factor for [`LayerBlendOperation::BlendManual`].
    pub factor: f32,
}

impl Default for LayerBlendMode {
    fn default() -> Self {
        Self {
            operation: LayerBlendOperation::Modulate,
            source1: LayerBlendSource::Texture,
            source2: LayerBlendSource::Current,
            colour_arg1: [1.0; 4],
            colour_arg2: [1.0; 4],
            alpha_arg1: 1.0,
            alpha_arg2: 1.0,
            factor: 0.0,
        }
    }
}

impl LayerBlendMode {
    pub fn new(
        operation: LayerBlendOperation,
        source1: LayerBlendSource,
        source2: LayerBlendSource,
    ) -> Self {
        Self {
            operation,
            source1,
            source2,
            ..Self::default()
        }
    }

    pub fn uses_source(&self, source: LayerBlendSource) -> bool {
        self.source1 == source || self.source2 == source
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvMapType {
    Planar,
    Curved,
    Reflection,
    Normal,
}

/// Frustum a projective texture is cast from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projector {
    pub view: Mat4,
    pub projection: Mat4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureEffect {
    EnvironmentMap(EnvMapType),
    ProjectiveTexture(Projector),
    UScroll,
    VScroll,
    UvScroll,
    Rotate,
    Transform,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureBinding {
    #[default]
    Fragment,
    Vertex,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureUnitState {
    pub texture_type: TextureType,
    pub tex_coord_set: u32,
    pub colour_blend: LayerBlendMode,
    pub alpha_blend: LayerBlendMode,
    pub effects: Vec<TextureEffect>,
    pub transform: Mat4,
    pub binding: TextureBinding,
}

impl Default for TextureUnitState {
    fn default() -> Self {
        Self {
            texture_type: TextureType::Tex2D,
            tex_coord_set: 0,
            colour_blend: LayerBlendMode::default(),
            alpha_blend: LayerBlendMode::default(),
            effects: Vec::new(),
            transform: IDENTITY,
            binding: TextureBinding::Fragment,
        }
    }
}

/// Fixed-function description of one pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PassState {
    pub lighting_enabled: bool,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub emissive: [f32; 4],
    pub shininess: f32,
    pub vertex_colour_tracking: TrackVertexColour,
    pub iterate_per_light: bool,
    pub only_light_type: Option<LightType>,
    /// When set, `fog` replaces the scene fog for this pass.
    pub fog_override: bool,
    pub fog: FogSettings,
    pub texture_units: Vec<TextureUnitState>,
    /// The pass already carries hand-written programs.
    pub programmable: bool,
}

impl Default for PassState {
    fn default() -> Self {
        Self {
            lighting_enabled: true,
            ambient: [1.0; 4],
            diffuse: [1.0; 4],
            specular: [0.0; 4],
            emissive: [0.0; 4],
            shininess: 0.0,
            vertex_colour_tracking: TrackVertexColour::empty(),
            iterate_per_light: false,
            only_light_type: None,
            fog_override: false,
            fog: FogSettings::default(),
            texture_units: Vec::new(),
            programmable: false,
        }
    }
}

impl PassState {
    /// Specular lighting only contributes with a nonzero exponent and a non-black colour.
    pub fn specular_enabled(&self) -> bool {
        self.shininess > 0.0 && self.specular[..3].iter().any(|c| *c != 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstantValue {
    Float(f32),
    Float4([f32; 4]),
    Matrix4(Mat4),
}

/// Named constant values pushed per draw.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GpuProgramParameters {
    constants: BTreeMap<String, ConstantValue>,
}

impl GpuProgramParameters {
    pub fn set_named_constant(&mut self, name: impl Into<String>, value: ConstantValue) {
        self.constants.insert(name.into(), value);
    }

    pub fn named_constant(&self, name: &str) -> Option<&ConstantValue> {
        self.constants.get(name)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn clear(&mut self) {
        self.constants.clear();
    }
}

#[derive(Clone, Debug, Default)]
pub struct Pass {
    pub state: PassState,
    pub vertex_program: Option<Arc<GpuProgram>>,
    pub fragment_program: Option<Arc<GpuProgram>>,
    pub parameters: GpuProgramParameters,
}

impl Pass {
    pub fn new(state: PassState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    pub fn has_programs(&self) -> bool {
        self.vertex_program.is_some() && self.fragment_program.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Technique {
    pub scheme: String,
    pub passes: Vec<Pass>,
}

#[derive(Clone, Debug, Default)]
pub struct Material {
    pub name: String,
    pub techniques: Vec<Technique>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            techniques: Vec::new(),
        }
    }

    /// Adds a technique made of the given passes.
    pub fn with_technique(mut self, scheme: impl Into<String>, passes: Vec<PassState>) -> Self {
        self.techniques.push(Technique {
            scheme: scheme.into(),
            passes: passes.into_iter().map(Pass::new).collect(),
        });
        self
    }

    pub fn technique(&self, scheme: &str) -> Option<&Technique> {
        self.techniques.iter().find(|t| t.scheme == scheme)
    }

    pub fn technique_mut(&mut self, scheme: &str) -> Option<&mut Technique> {
        self.techniques.iter_mut().find(|t| t.scheme == scheme)
    }
}

/// Host-owned material registry.
#[derive(Clone, Debug, Default)]
pub struct MaterialManager {
    materials: HashMap<String, Material>,
}

impl MaterialManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.name.clone(), material);
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Material> {
        self.materials.remove(name)
    }
}

/// Per-draw inputs for dynamic constants.
#[derive(Clone, Copy, Debug)]
pub struct DrawContext<'a> {
    pub lights: &'a [Light],
    pub view_matrix: Mat4,
}
