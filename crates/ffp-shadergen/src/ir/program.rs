use std::sync::Arc;

use super::function::{Function, FunctionId, OperandValue};
use super::parameter::{
    AutoConstant, AutoConstantData, AutoConstantKind, ElementType, Parameter, ParameterId,
    ParameterScope, Semantic,
};
use super::IrError;
use crate::compiler::GpuProgram;

/// Sampler slots available to a single program.
pub const MAX_SAMPLERS: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn short_name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Fragment => "fs",
        }
    }
}

/// One shader stage under construction.
#[derive(Clone, Debug)]
pub struct Program {
    stage: ShaderStage,
    parameters: Vec<Parameter>,
    functions: Vec<Function>,
    entry_point: Option<FunctionId>,
    dependencies: Vec<String>,
    unnamed_uniforms: u32,
}

impl Program {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            parameters: Vec::new(),
            functions: Vec::new(),
            entry_point: None,
            dependencies: Vec::new(),
            unnamed_uniforms: 0,
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn create_function(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions
            .push(Function::new(id, name.into(), description.into()));
        id
    }

    pub fn set_entry_point(&mut self, id: FunctionId) -> Result<(), IrError> {
        if self.function(id).is_none() {
            return Err(IrError::UnknownFunction(id));
        }
        self.entry_point = Some(id);
        Ok(())
    }

    pub fn entry_point(&self) -> Option<&Function> {
        self.entry_point.and_then(|id| self.function(id))
    }

    pub fn entry_point_mut(&mut self) -> Result<&mut Function, IrError> {
        let id = self.entry_point.ok_or(IrError::MissingEntryPoint)?;
        self.function_mut(id).ok_or(IrError::UnknownFunction(id))
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id.0 as usize)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn is_entry_point(&self, id: FunctionId) -> bool {
        self.entry_point == Some(id)
    }

    /// Global (uniform) parameters in declaration order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Resolves a user uniform shared by all functions. With `Some(index)` the uniform is named
    /// `{name}{index}` and found-or-created; with `None` a fresh uniform named `{name}_u{n}` is
    /// always created.
    pub fn resolve_parameter(
        &mut self,
        ty: ElementType,
        index: Option<u32>,
        name: &str,
    ) -> Result<ParameterId, IrError> {
        let Some(index) = index else {
            let unique = loop {
                let candidate = format!("{name}_u{}", self.unnamed_uniforms);
                self.unnamed_uniforms += 1;
                if self.parameter_by_name(&candidate).is_none() {
                    break candidate;
                }
            };
            return Ok(self.push_global(Parameter::new(unique, ty, Semantic::Unknown, 0)));
        };

        if ty.is_sampler() && index >= MAX_SAMPLERS {
            return Err(IrError::SamplerLimitExceeded {
                index,
                limit: MAX_SAMPLERS,
            });
        }

        let full_name = format!("{name}{index}");
        if let Some(slot) = self.parameters.iter().position(|p| p.name() == full_name) {
            let existing = &self.parameters[slot];
            if existing.element_type() != ty || existing.is_auto_constant() {
                return Err(IrError::TypeMismatch {
                    name: full_name,
                    existing: existing.element_type(),
                    requested: ty,
                });
            }
            return Ok(global_id(slot));
        }
        Ok(self.push_global(Parameter::new(full_name, ty, Semantic::Unknown, index)))
    }

    pub fn resolve_auto_parameter_real(
        &mut self,
        kind: AutoConstantKind,
        data: f32,
    ) -> Result<ParameterId, IrError> {
        self.resolve_auto_parameter(AutoConstant {
            kind,
            data: AutoConstantData::Real(data),
        })
    }

    pub fn resolve_auto_parameter_int(
        &mut self,
        kind: AutoConstantKind,
        data: i32,
    ) -> Result<ParameterId, IrError> {
        self.resolve_auto_parameter(AutoConstant {
            kind,
            data: AutoConstantData::Int(data),
        })
    }

    fn resolve_auto_parameter(&mut self, auto: AutoConstant) -> Result<ParameterId, IrError> {
        if let Some(slot) = self
            .parameters
            .iter()
            .position(|p| p.auto_constant() == Some(&auto))
        {
            return Ok(global_id(slot));
        }
        let name = auto.uniform_name();
        if self.parameters.iter().any(|p| p.name() == name) {
            return Err(IrError::NameCollision(name));
        }
        Ok(self.push_global(Parameter::new_auto(auto)))
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<ParameterId> {
        self.parameters
            .iter()
            .position(|p| p.name() == name)
            .map(global_id)
    }

    pub fn auto_constants(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_auto_constant())
    }

    pub fn samplers(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.element_type().is_sampler())
    }

    /// Looks up any parameter of this program: globals directly, function parameters through
    /// their owning function.
    pub fn parameter(&self, id: ParameterId) -> Option<&Parameter> {
        match id.scope.function() {
            None => self.parameters.get(id.slot as usize),
            Some(func) => self.function(func)?.parameter(id),
        }
    }

    /// Appends a library dependency; duplicates are ignored and first-use order is kept.
    pub fn add_dependency(&mut self, library: &str) {
        if !self.dependencies.iter().any(|d| d == library) {
            self.dependencies.push(library.to_string());
        }
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn sort_atom_instances(&mut self) {
        for function in &mut self.functions {
            function.sort_atom_instances();
        }
    }

    /// Checks that every parameter an atom references is reachable from the atom's function.
    pub fn validate(&self) -> Result<(), IrError> {
        self.entry_point().ok_or(IrError::MissingEntryPoint)?;
        for function in &self.functions {
            for atom in function.atom_instances() {
                let Some(invocation) = atom.as_invocation() else {
                    continue;
                };
                for operand in invocation.operands() {
                    let OperandValue::Parameter(id) = operand.value() else {
                        continue;
                    };
                    let reachable = match id.scope.function() {
                        None => self.parameters.get(id.slot as usize).is_some(),
                        Some(owner) => owner == function.id() && function.parameter(id).is_some(),
                    };
                    if !reachable {
                        return Err(IrError::UnknownParameter {
                            function: function.name().to_string(),
                            parameter: id,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn push_global(&mut self, parameter: Parameter) -> ParameterId {
        self.parameters.push(parameter);
        global_id(self.parameters.len() - 1)
    }
}

fn global_id(slot: usize) -> ParameterId {
    ParameterId {
        scope: ParameterScope::Global,
        slot: slot as u32,
    }
}

/// The vertex + fragment pair generated for one pass.
///
/// Holds the CPU-side IR while a build is in progress; once both stages are compiled the IR is
/// dropped and only the compiled programs remain.
#[derive(Debug)]
pub struct ProgramSet {
    vertex: Option<Program>,
    fragment: Option<Program>,
    vertex_gpu: Option<Arc<GpuProgram>>,
    fragment_gpu: Option<Arc<GpuProgram>>,
}

impl Default for ProgramSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramSet {
    /// Creates both programs with an empty `main` entry point.
    pub fn new() -> Self {
        Self {
            vertex: Some(Self::program_with_entry(ShaderStage::Vertex)),
            fragment: Some(Self::program_with_entry(ShaderStage::Fragment)),
            vertex_gpu: None,
            fragment_gpu: None,
        }
    }

    fn program_with_entry(stage: ShaderStage) -> Program {
        let mut program = Program::new(stage);
        let main = program.create_function("main", "fixed-function emulation entry point");
        program.entry_point = Some(main);
        program
    }

    pub fn vertex_program(&self) -> Option<&Program> {
        self.vertex.as_ref()
    }

    pub fn fragment_program(&self) -> Option<&Program> {
        self.fragment.as_ref()
    }

    pub fn vertex_program_mut(&mut self) -> Result<&mut Program, IrError> {
        self.vertex.as_mut().ok_or(IrError::ProgramReleased)
    }

    pub fn fragment_program_mut(&mut self) -> Result<&mut Program, IrError> {
        self.fragment.as_mut().ok_or(IrError::ProgramReleased)
    }

    pub fn program(&self, stage: ShaderStage) -> Option<&Program> {
        match stage {
            ShaderStage::Vertex => self.vertex_program(),
            ShaderStage::Fragment => self.fragment_program(),
        }
    }

    pub fn vertex_gpu_program(&self) -> Option<&Arc<GpuProgram>> {
        self.vertex_gpu.as_ref()
    }

    pub fn fragment_gpu_program(&self) -> Option<&Arc<GpuProgram>> {
        self.fragment_gpu.as_ref()
    }

    pub fn sort_atom_instances(&mut self) {
        for program in [self.vertex.as_mut(), self.fragment.as_mut()]
            .into_iter()
            .flatten()
        {
            program.sort_atom_instances();
        }
    }

    /// Installs the compiled programs and discards the IR.
    pub(crate) fn bind_gpu_programs(&mut self, vertex: Arc<GpuProgram>, fragment: Arc<GpuProgram>) {
        self.vertex_gpu = Some(vertex);
        self.fragment_gpu = Some(fragment);
        self.vertex = None;
        self.fragment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_parameters_are_found_not_duplicated() {
        let mut program = Program::new(ShaderStage::Vertex);
        let a = program
            .resolve_auto_parameter_int(AutoConstantKind::WorldViewProjMatrix, 0)
            .unwrap();
        let b = program
            .resolve_auto_parameter_int(AutoConstantKind::WorldViewProjMatrix, 0)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(program.parameters().len(), 1);
        assert_eq!(program.parameters()[0].name(), "worldviewproj_matrix");
    }

    #[test]
    fn indexed_auto_parameters_get_distinct_names() {
        let mut program = Program::new(ShaderStage::Vertex);
        program
            .resolve_auto_parameter_int(AutoConstantKind::TextureMatrix, 0)
            .unwrap();
        program
            .resolve_auto_parameter_int(AutoConstantKind::TextureMatrix, 3)
            .unwrap();
        let names: Vec<_> = program.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["texture_matrix0", "texture_matrix3"]);
    }

    #[test]
    fn unindexed_custom_parameters_are_always_fresh() {
        let mut program = Program::new(ShaderStage::Fragment);
        let a = program.resolve_parameter(ElementType::Float4, None, "tmp").unwrap();
        let b = program.resolve_parameter(ElementType::Float4, None, "tmp").unwrap();
        assert_ne!(a, b);
        assert_ne!(
            program.parameter(a).unwrap().name(),
            program.parameter(b).unwrap().name()
        );
    }

    #[test]
    fn sampler_slots_are_bounded() {
        let mut program = Program::new(ShaderStage::Fragment);
        let err = program
            .resolve_parameter(ElementType::Sampler2D, Some(MAX_SAMPLERS), "texture_sampler")
            .unwrap_err();
        assert!(matches!(err, IrError::SamplerLimitExceeded { .. }));
    }

    #[test]
    fn released_program_set_refuses_mutation() {
        let mut set = ProgramSet::new();
        assert!(set.vertex_program_mut().is_ok());
        set.vertex = None;
        assert!(matches!(
            set.vertex_program_mut(),
            Err(IrError::ProgramReleased)
        ));
    }
}
