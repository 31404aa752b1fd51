//! Fixed-function features, each contributing parameters and atoms to a [`ProgramSet`].
//!
//! Every feature runs the same three phases, driven by [`crate::RenderState`] in execution
//! order: `resolve_parameters`, `resolve_dependencies`, `add_function_invocations`. A phase
//! error aborts the whole build.

mod colour;
mod fog;
mod lighting;
mod texture_stage;
mod transform;

pub use colour::{ColourStageFlags, FfpColour};
pub use fog::FfpFog;
pub use lighting::FfpLighting;
pub use texture_stage::{TexCoordCalcMethod, FfpTextureStage};
pub use transform::FfpTransform;

use crate::error::BuildError;
use crate::host::{DrawContext, GpuProgramParameters, PassState};
use crate::ir::ProgramSet;

/// Position of each feature in the composed program.
pub mod execution_order {
    pub const TRANSFORM: i32 = 0;
    pub const COLOUR: i32 = 100;
    pub const LIGHTING: i32 = 200;
    /// Plus the texture unit index.
    pub const TEXTURING: i32 = 300;
    pub const FOG: i32 = 400;
}

/// Atom group orders inside the generated entry points.
pub mod group_order {
    pub const VS_TRANSFORM: i32 = 100;
    pub const VS_COLOUR: i32 = 200;
    pub const VS_LIGHTING: i32 = 300;
    pub const VS_TEXTURING: i32 = 400;
    pub const VS_FOG: i32 = 500;

    pub const PS_COLOUR_BEGIN: i32 = 100;
    /// Plus the texture unit index.
    pub const PS_TEXTURING: i32 = 200;
    pub const PS_COLOUR_END: i32 = 300;
    pub const PS_FOG: i32 = 400;
}

pub const TRANSFORM_TYPE: &str = "FFP_Transform";
pub const COLOUR_TYPE: &str = "FFP_Colour";
pub const LIGHTING_TYPE: &str = "FFP_Lighting";
pub const TEXTURE_STAGE_TYPE: &str = "FFP_TextureStage";
pub const FOG_TYPE: &str = "FFP_Fog";

#[derive(Clone, Debug)]
pub enum SubRenderState {
    Transform(FfpTransform),
    Colour(FfpColour),
    Lighting(FfpLighting),
    TextureStage(FfpTextureStage),
    Fog(FfpFog),
}

impl SubRenderState {
    pub fn type_name(&self) -> &'static str {
        match self {
            SubRenderState::Transform(_) => TRANSFORM_TYPE,
            SubRenderState::Colour(_) => COLOUR_TYPE,
            SubRenderState::Lighting(_) => LIGHTING_TYPE,
            SubRenderState::TextureStage(_) => TEXTURE_STAGE_TYPE,
            SubRenderState::Fog(_) => FOG_TYPE,
        }
    }

    pub fn execution_order(&self) -> i32 {
        match self {
            SubRenderState::Transform(_) => execution_order::TRANSFORM,
            SubRenderState::Colour(_) => execution_order::COLOUR,
            SubRenderState::Lighting(_) => execution_order::LIGHTING,
            SubRenderState::TextureStage(stage) => {
                execution_order::TEXTURING + stage.unit() as i32
            }
            SubRenderState::Fog(_) => execution_order::FOG,
        }
    }

    /// Hash of this feature's configuration only.
    pub fn hash_code(&self) -> u32 {
        match self {
            SubRenderState::Transform(s) => s.hash_code(),
            SubRenderState::Colour(s) => s.hash_code(),
            SubRenderState::Lighting(s) => s.hash_code(),
            SubRenderState::TextureStage(s) => s.hash_code(),
            SubRenderState::Fog(s) => s.hash_code(),
        }
    }

    pub fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        match self {
            SubRenderState::Transform(s) => s.resolve_parameters(set),
            SubRenderState::Colour(s) => s.resolve_parameters(set),
            SubRenderState::Lighting(s) => s.resolve_parameters(set),
            SubRenderState::TextureStage(s) => s.resolve_parameters(set),
            SubRenderState::Fog(s) => s.resolve_parameters(set),
        }
    }

    pub fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        match self {
            SubRenderState::Transform(s) => s.resolve_dependencies(set),
            SubRenderState::Colour(_) => Ok(()),
            SubRenderState::Lighting(s) => s.resolve_dependencies(set),
            SubRenderState::TextureStage(s) => s.resolve_dependencies(set),
            SubRenderState::Fog(s) => s.resolve_dependencies(set),
        }
    }

    pub fn add_function_invocations(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        match self {
            SubRenderState::Transform(s) => s.add_function_invocations(set),
            SubRenderState::Colour(s) => s.add_function_invocations(set),
            SubRenderState::Lighting(s) => s.add_function_invocations(set),
            SubRenderState::TextureStage(s) => s.add_function_invocations(set),
            SubRenderState::Fog(s) => s.add_function_invocations(set),
        }
    }

    /// Pushes the constants that cannot be baked at build time.
    pub fn update_gpu_programs_params(
        &self,
        pass: &PassState,
        params: &mut GpuProgramParameters,
        ctx: &DrawContext<'_>,
    ) {
        match self {
            SubRenderState::Lighting(s) => s.update_gpu_programs_params(pass, params, ctx),
            SubRenderState::TextureStage(s) => s.update_gpu_programs_params(params),
            SubRenderState::Transform(_) | SubRenderState::Colour(_) | SubRenderState::Fog(_) => {}
        }
    }

    /// Colour wiring this feature needs from [`FfpColour`].
    pub fn colour_requirements(&self) -> ColourStageFlags {
        match self {
            SubRenderState::Lighting(s) => s.colour_requirements(),
            SubRenderState::TextureStage(s) => s.colour_requirements(),
            _ => ColourStageFlags::empty(),
        }
    }

    pub fn as_colour(&self) -> Option<&FfpColour> {
        match self {
            SubRenderState::Colour(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_colour_mut(&mut self) -> Option<&mut FfpColour> {
        match self {
            SubRenderState::Colour(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_lighting(&self) -> Option<&FfpLighting> {
        match self {
            SubRenderState::Lighting(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_texture_stage(&self) -> Option<&FfpTextureStage> {
        match self {
            SubRenderState::TextureStage(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fog(&self) -> Option<&FfpFog> {
        match self {
            SubRenderState::Fog(s) => Some(s),
            _ => None,
        }
    }
}

impl From<FfpTransform> for SubRenderState {
    fn from(value: FfpTransform) -> Self {
        SubRenderState::Transform(value)
    }
}

impl From<FfpColour> for SubRenderState {
    fn from(value: FfpColour) -> Self {
        SubRenderState::Colour(value)
    }
}

impl From<FfpLighting> for SubRenderState {
    fn from(value: FfpLighting) -> Self {
        SubRenderState::Lighting(value)
    }
}

impl From<FfpTextureStage> for SubRenderState {
    fn from(value: FfpTextureStage) -> Self {
        SubRenderState::TextureStage(value)
    }
}

impl From<FfpFog> for SubRenderState {
    fn from(value: FfpFog) -> Self {
        SubRenderState::Fog(value)
    }
}
