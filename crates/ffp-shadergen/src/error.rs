use crate::compiler::CompileError;
use crate::config::TargetLanguage;
use crate::ir::IrError;
use crate::writer::WriterError;

/// Failure of a single RenderState build. The pass keeps whatever programs it had before.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Ir(#[from] IrError),
    #[error("{feature} failed to resolve: {reason}")]
    Resolution {
        feature: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("no program writer registered for {0}")]
    UnsupportedLanguage(TargetLanguage),
}

impl BuildError {
    pub(crate) fn resolution(feature: &'static str, reason: impl Into<String>) -> Self {
        BuildError::Resolution {
            feature,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("material `{0}` not found")]
    MaterialNotFound(String),
    #[error("material `{material}` has no technique in scheme `{scheme}`")]
    SourceTechniqueNotFound { material: String, scheme: String },
    #[error("technique `{scheme}` of material `{material}` already uses programmable shaders")]
    ProgrammableSourceTechnique { material: String, scheme: String },
    #[error("material `{material}` already has a technique in scheme `{scheme}`")]
    DestinationTechniqueExists { material: String, scheme: String },
    #[error(
        "material `{material}` already maps scheme `{existing_source}` into `{destination}`, \
         cannot also map `{requested_source}`"
    )]
    SchemeConflict {
        material: String,
        destination: String,
        existing_source: String,
        requested_source: String,
    },
    #[error("no generated technique for material `{material}` in scheme `{scheme}`")]
    TechniqueNotGenerated { material: String, scheme: String },
    #[error("a factory for `{0}` is already registered")]
    DuplicateFactory(String),
    #[error("no factory registered for `{0}`")]
    UnknownFactory(String),
    #[error(transparent)]
    Build(#[from] BuildError),
}
