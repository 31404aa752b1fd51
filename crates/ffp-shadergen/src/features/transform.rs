use super::{group_order, TRANSFORM_TYPE};
use crate::error::BuildError;
use crate::hash::FeatureHasher;
use crate::ir::{
    AutoConstantKind, ElementType, FunctionInvocation, Operand, ParameterId, ProgramSet, Semantic,
};
use crate::library::{FFP_FUNC_TRANSFORM, FFP_LIB_COMMON};

/// Object space to clip space. Present in every generated program.
#[derive(Clone, Debug, Default)]
pub struct FfpTransform {
    resolved: Option<Resolved>,
}

#[derive(Clone, Copy, Debug)]
struct Resolved {
    world_view_proj: ParameterId,
    position_in: ParameterId,
    position_out: ParameterId,
}

impl FfpTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_code(&self) -> u32 {
        FeatureHasher::new(TRANSFORM_TYPE).finish()
    }

    pub(super) fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        let vs = set.vertex_program_mut()?;
        let world_view_proj =
            vs.resolve_auto_parameter_int(AutoConstantKind::WorldViewProjMatrix, 0)?;
        let main = vs.entry_point_mut()?;
        let position_in =
            main.resolve_input_parameter(Semantic::Position, Some(0), ElementType::Float4)?;
        let position_out =
            main.resolve_output_parameter(Semantic::Position, Some(0), ElementType::Float4)?;
        self.resolved = Some(Resolved {
            world_view_proj,
            position_in,
            position_out,
        });
        Ok(())
    }

    pub(super) fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        set.vertex_program_mut()?.add_dependency(FFP_LIB_COMMON);
        Ok(())
    }

    pub(super) fn add_function_invocations(
        &mut self,
        set: &mut ProgramSet,
    ) -> Result<(), BuildError> {
        let r = self
            .resolved
            .ok_or_else(|| BuildError::resolution(TRANSFORM_TYPE, "parameters not resolved"))?;
        set.vertex_program_mut()?.entry_point_mut()?.add_atom_instance(
            FunctionInvocation::new(FFP_FUNC_TRANSFORM, group_order::VS_TRANSFORM, 0)
                .with(Operand::input(r.world_view_proj))
                .with(Operand::input(r.position_in))
                .with(Operand::output(r.position_out)),
        );
        Ok(())
    }
}
