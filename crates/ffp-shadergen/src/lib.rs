//! `ffp-shadergen` emulates the legacy fixed-function pipeline by generating vertex and fragment
//! programs at runtime.
//!
//! A pass's fixed-function state is split into pluggable features (transform, colour, lighting,
//! texture stages, fog). Each feature contributes parameters and instructions to a small
//! [`ir`], which a [`writer`] turns into WGSL or GLSL source. Compiled programs are cached by
//! the hash of the [`RenderState`] that produced them (see [`program_manager`]).
//!
//! The host drives everything through [`ShaderGenerator`].

mod hash;

pub mod compiler;
pub mod config;
pub mod error;
pub mod factory;
pub mod features;
pub mod generator;
pub mod host;
pub mod ir;
pub mod library;
pub mod math;
pub mod program_manager;
pub mod render_state;
pub mod writer;

pub use compiler::{
    CompileError, GpuProgram, GpuProgramDesc, GpuProgramHandle, NagaProgramCompiler,
    ProgramCompiler,
};
pub use config::{LightCounts, ShaderGeneratorConfig, TargetLanguage};
pub use error::{BuildError, GeneratorError};
pub use factory::{builtin_factories, FeatureContext, SubRenderStateFactory};
pub use features::SubRenderState;
pub use generator::ShaderGenerator;
pub use program_manager::{ProgramManager, ProgramManagerStats};
pub use render_state::RenderState;
