//! Source emission for a built [`Program`].
//!
//! Every writer follows the same layout: header, embedded dependency libraries, global uniforms,
//! helper functions, then the entry point. Helpers precede the entry point so every identifier
//! is declared before its first use.

mod expr;
mod glsl;
mod glsl_library;
mod wgsl;
mod wgsl_library;

pub use glsl::GlslProgramWriter;
pub use wgsl::WgslProgramWriter;

use crate::config::TargetLanguage;
use crate::ir::{
    ElementType, IrError, ParameterId, Program, Semantic, ShaderStage, MAX_TEXCOORD_SETS,
};

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error(transparent)]
    Ir(#[from] IrError),
    #[error("unknown parameter {0}")]
    UnknownParameter(ParameterId),
    #[error("`{function}` has no output operand")]
    MissingTarget { function: String },
    #[error("`{function}` has more than one output operand")]
    MultipleTargets { function: String },
    #[error("`{function}` writes to a literal")]
    LiteralTarget { function: String },
    #[error("`{function}` expects {expected} arguments, found {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("no {language} source for library `{library}`")]
    UnknownLibrary {
        language: TargetLanguage,
        library: String,
    },
    #[error("{ty:?} is not supported as {usage}")]
    UnsupportedType { ty: ElementType, usage: &'static str },
    #[error("{semantic:?}{index} is not supported as {usage}")]
    UnsupportedSemantic {
        semantic: Semantic,
        index: u32,
        usage: &'static str,
    },
}

/// Emits source text for one target language.
pub trait ProgramWriter: Send + Sync {
    fn target_language(&self) -> TargetLanguage;

    /// Extension used for on-disk cache files.
    fn file_extension(&self) -> &'static str;

    fn entry_point_name(&self, stage: ShaderStage) -> &'static str;

    fn write_source(&self, program: &Program, profile: &str) -> Result<String, WriterError>;
}

pub fn create_writer(language: TargetLanguage) -> Box<dyn ProgramWriter> {
    match language {
        TargetLanguage::Wgsl => Box::new(WgslProgramWriter),
        TargetLanguage::Glsl => Box::new(GlslProgramWriter),
    }
}

fn vertex_attribute_location(semantic: Semantic, index: u32) -> Result<u32, WriterError> {
    match semantic {
        Semantic::Position => Ok(0),
        Semantic::Normal => Ok(1),
        Semantic::Color => Ok(2 + index),
        Semantic::TexCoord => Ok(4 + index),
        Semantic::Unknown => Err(WriterError::UnsupportedSemantic {
            semantic,
            index,
            usage: "a vertex attribute",
        }),
    }
}

/// Inter-stage location; both stages derive it from (semantic, index) alone so they agree
/// without any linking step.
fn varying_location(semantic: Semantic, index: u32) -> Result<u32, WriterError> {
    match semantic {
        Semantic::Color => Ok(index),
        Semantic::TexCoord => Ok(2 + index),
        Semantic::Normal => Ok(2 + MAX_TEXCOORD_SETS),
        Semantic::Position | Semantic::Unknown => Err(WriterError::UnsupportedSemantic {
            semantic,
            index,
            usage: "a varying",
        }),
    }
}

fn header(program: &Program, language: TargetLanguage) -> String {
    format!(
        "// {} program generated by ffp-shadergen ({language})\n",
        match program.stage() {
            ShaderStage::Vertex => "Vertex",
            ShaderStage::Fragment => "Fragment",
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varyings_do_not_overlap() {
        let mut seen = std::collections::HashSet::new();
        for index in 0..2 {
            assert!(seen.insert(varying_location(Semantic::Color, index).unwrap()));
        }
        for index in 0..MAX_TEXCOORD_SETS {
            assert!(seen.insert(varying_location(Semantic::TexCoord, index).unwrap()));
        }
        assert!(seen.insert(varying_location(Semantic::Normal, 0).unwrap()));
        assert!(seen.iter().all(|loc| *loc < 16));
    }
}
