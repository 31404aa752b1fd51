//! Intermediate representation built by the feature components before source emission.
//!
//! Everything lives in a per-build arena: a [`ProgramSet`] owns two [`Program`]s, a program owns
//! its [`Function`]s and global parameters, and every cross-reference is a [`ParameterId`]
//! handle into that arena.

mod function;
mod parameter;
mod program;

pub use function::{
    Function, FunctionAtom, FunctionId, FunctionInvocation, Mask, Operand, OperandSemantic,
    OperandValue, MAX_COLOR_SETS, MAX_TEXCOORD_SETS,
};
pub use parameter::{
    AutoConstant, AutoConstantData, AutoConstantKind, ElementType, Parameter, ParameterId,
    ParameterScope, Semantic,
};
pub use program::{Program, ProgramSet, ShaderStage, MAX_SAMPLERS};

#[derive(Debug, thiserror::Error)]
pub enum IrError {
    #[error("parameter `{name}` already exists as {existing:?}, requested {requested:?}")]
    TypeMismatch {
        name: String,
        existing: ElementType,
        requested: ElementType,
    },
    #[error("{semantic:?} index {index} exceeds the limit of {limit}")]
    LimitExceeded {
        semantic: Semantic,
        index: u32,
        limit: u32,
    },
    #[error("sampler slot {index} exceeds the limit of {limit}")]
    SamplerLimitExceeded { index: u32, limit: u32 },
    #[error("{ty:?} cannot be used as a {semantic:?} varying")]
    InvalidVarying { semantic: Semantic, ty: ElementType },
    #[error("local `{name}` cannot have type {ty:?}")]
    InvalidLocalType { name: String, ty: ElementType },
    #[error("uniform name `{0}` is already taken")]
    NameCollision(String),
    #[error("function `{function}` references unknown parameter {parameter}")]
    UnknownParameter {
        function: String,
        parameter: ParameterId,
    },
    #[error("unknown function {0:?}")]
    UnknownFunction(FunctionId),
    #[error("program has no entry point")]
    MissingEntryPoint,
    #[error("program IR was released after compilation")]
    ProgramReleased,
}
