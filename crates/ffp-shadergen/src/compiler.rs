//! Boundary to the GPU program backend.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::TargetLanguage;
use crate::ir::{AutoConstantData, AutoConstantKind, ElementType, Program, ShaderStage};

/// Opaque handle issued by a [`ProgramCompiler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuProgramHandle(pub u64);

#[derive(Clone, Debug)]
pub struct GpuProgramDesc<'a> {
    pub name: &'a str,
    pub stage: ShaderStage,
    pub language: TargetLanguage,
    pub profile: &'a str,
    pub entry_point: &'a str,
    pub source: &'a str,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to compile {stage:?} program `{program}`: {message}")]
pub struct CompileError {
    pub program: String,
    pub stage: ShaderStage,
    pub message: String,
    /// Generated source kept for diagnosis.
    pub source_text: String,
}

impl CompileError {
    pub fn new(desc: &GpuProgramDesc<'_>, message: impl Into<String>) -> Self {
        Self {
            program: desc.name.to_string(),
            stage: desc.stage,
            message: message.into(),
            source_text: desc.source.to_string(),
        }
    }
}

pub trait ProgramCompiler: Send + Sync {
    fn compile(&self, desc: &GpuProgramDesc<'_>) -> Result<GpuProgramHandle, CompileError>;
}

/// Parses and validates WGSL with naga. Other languages are left to a host-supplied compiler.
#[derive(Debug, Default)]
pub struct NagaProgramCompiler {
    next_handle: AtomicU64,
}

impl NagaProgramCompiler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgramCompiler for NagaProgramCompiler {
    fn compile(&self, desc: &GpuProgramDesc<'_>) -> Result<GpuProgramHandle, CompileError> {
        if desc.language != TargetLanguage::Wgsl {
            return Err(CompileError::new(
                desc,
                format!("naga backend cannot compile {}", desc.language),
            ));
        }

        let module = naga::front::wgsl::parse_str(desc.source)
            .map_err(|err| CompileError::new(desc, err.emit_to_string(desc.source)))?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|err| CompileError::new(desc, err.emit_to_string(desc.source)))?;

        let stage = match desc.stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };
        if !module
            .entry_points
            .iter()
            .any(|ep| ep.name == desc.entry_point && ep.stage == stage)
        {
            return Err(CompileError::new(
                desc,
                format!("missing entry point `{}`", desc.entry_point),
            ));
        }

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(GpuProgramHandle(id))
    }
}

/// A uniform the host binding layer fills automatically.
#[derive(Clone, Debug, PartialEq)]
pub struct AutoConstantBinding {
    pub name: String,
    pub kind: AutoConstantKind,
    pub data: AutoConstantData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub unit: u32,
    pub ty: ElementType,
}

/// Durable result of a build: the compiled program and what the host must bind to it.
#[derive(Clone, Debug)]
pub struct GpuProgram {
    pub name: String,
    pub stage: ShaderStage,
    pub language: TargetLanguage,
    pub profile: String,
    pub entry_point: String,
    pub source: String,
    pub handle: GpuProgramHandle,
    pub auto_constants: Vec<AutoConstantBinding>,
    pub samplers: Vec<SamplerBinding>,
}

impl GpuProgram {
    pub(crate) fn new(
        desc: &GpuProgramDesc<'_>,
        handle: GpuProgramHandle,
        program: &Program,
    ) -> Self {
        Self {
            name: desc.name.to_string(),
            stage: desc.stage,
            language: desc.language,
            profile: desc.profile.to_string(),
            entry_point: desc.entry_point.to_string(),
            source: desc.source.to_string(),
            handle,
            auto_constants: program
                .auto_constants()
                .filter_map(|p| {
                    p.auto_constant().map(|auto| AutoConstantBinding {
                        name: p.name().to_string(),
                        kind: auto.kind,
                        data: auto.data,
                    })
                })
                .collect(),
            samplers: program
                .samplers()
                .map(|p| SamplerBinding {
                    name: p.name().to_string(),
                    unit: p.index(),
                    ty: p.element_type(),
                })
                .collect(),
        }
    }

    pub fn has_auto_constant(&self, kind: AutoConstantKind) -> bool {
        self.auto_constants.iter().any(|c| c.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc<'a>(source: &'a str, language: TargetLanguage) -> GpuProgramDesc<'a> {
        GpuProgramDesc {
            name: "fs_test",
            stage: ShaderStage::Fragment,
            language,
            profile: "wgsl",
            entry_point: "fs_main",
            source,
        }
    }

    #[test]
    fn naga_accepts_valid_fragment_program() {
        let source =
            "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}\n";
        let compiler = NagaProgramCompiler::new();
        let a = compiler.compile(&desc(source, TargetLanguage::Wgsl)).unwrap();
        let b = compiler.compile(&desc(source, TargetLanguage::Wgsl)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn naga_rejects_bad_source_and_keeps_it() {
        let source = "fn fs_main( {";
        let err = NagaProgramCompiler::new()
            .compile(&desc(source, TargetLanguage::Wgsl))
            .unwrap_err();
        assert_eq!(err.source_text, source);
        assert_eq!(err.stage, ShaderStage::Fragment);
    }

    #[test]
    fn naga_rejects_missing_entry_point() {
        let source =
            "@fragment\nfn other() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}\n";
        let err = NagaProgramCompiler::new()
            .compile(&desc(source, TargetLanguage::Wgsl))
            .unwrap_err();
        assert!(err.message.contains("fs_main"));
    }

    #[test]
    fn naga_refuses_glsl() {
        assert!(NagaProgramCompiler::new()
            .compile(&desc("void main() {}", TargetLanguage::Glsl))
            .is_err());
    }
}
