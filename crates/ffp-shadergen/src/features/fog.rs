use super::{group_order, FOG_TYPE};
use crate::error::BuildError;
use crate::hash::FeatureHasher;
use crate::host::{FogMode, FogSettings, PassState, SceneSettings};
use crate::ir::{
    AutoConstantKind, ElementType, FunctionInvocation, Mask, Operand, ParameterId, ProgramSet,
    Semantic,
};
use crate::library::*;

const FOG_PARAMS_LOCAL: &str = "fog_params";
const FOG_COLOUR_LOCAL: &str = "fog_colour";

/// Per-vertex fog. Settings are read once when the feature is created and baked into the
/// generated source as literals; later scene fog changes do not reach built programs.
#[derive(Clone, Debug)]
pub struct FfpFog {
    settings: FogSettings,
    resolved: Option<Resolved>,
}

#[derive(Clone, Copy, Debug)]
struct Resolved {
    world_view_proj: ParameterId,
    position: ParameterId,
    params_local: ParameterId,
    factor_out: ParameterId,
    factor_in: ParameterId,
    colour_local: ParameterId,
    colour_out: ParameterId,
}

impl FfpFog {
    /// `None` for [`FogMode::None`].
    pub fn new(settings: FogSettings) -> Option<Self> {
        if settings.mode == FogMode::None {
            return None;
        }
        Some(Self {
            settings,
            resolved: None,
        })
    }

    /// Fog for a pass: its own settings when it overrides the scene, otherwise the scene's.
    ///
    /// The destination pass has its fixed-function fog disabled either way so the generated
    /// fog is never applied twice.
    pub fn for_pass(
        source: &PassState,
        scene: &SceneSettings,
        destination: &mut PassState,
    ) -> Option<Self> {
        let settings = if source.fog_override {
            source.fog
        } else {
            scene.fog
        };
        destination.fog_override = true;
        destination.fog.mode = FogMode::None;
        Self::new(settings)
    }

    pub fn mode(&self) -> FogMode {
        self.settings.mode
    }

    pub fn fog_colour(&self) -> [f32; 4] {
        self.settings.colour
    }

    /// `(density, start, end, 1 / (end - start))`, with the last term 0 for an empty range.
    pub fn fog_params(&self) -> [f32; 4] {
        let FogSettings {
            start,
            end,
            density,
            ..
        } = self.settings;
        let range = end - start;
        let inverse = if range != 0.0 { 1.0 / range } else { 0.0 };
        [density, start, end, inverse]
    }

    pub fn hash_code(&self) -> u32 {
        let mut hasher = FeatureHasher::new(FOG_TYPE);
        hasher.write_u8(self.settings.mode as u8);
        hasher.write_f32s(&self.settings.colour);
        hasher.write_f32(self.settings.start);
        hasher.write_f32(self.settings.end);
        hasher.write_f32(self.settings.density);
        hasher.finish()
    }

    pub(super) fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        let vs = set.vertex_program_mut()?;
        let world_view_proj =
            vs.resolve_auto_parameter_int(AutoConstantKind::WorldViewProjMatrix, 0)?;
        let main = vs.entry_point_mut()?;
        let position =
            main.resolve_input_parameter(Semantic::Position, Some(0), ElementType::Float4)?;
        let params_local = main.resolve_local_parameter(
            Semantic::Unknown,
            0,
            ElementType::Float4,
            FOG_PARAMS_LOCAL,
        )?;
        let factor_out =
            main.resolve_output_parameter(Semantic::TexCoord, None, ElementType::Float1)?;
        let varying_index = main
            .parameter(factor_out)
            .map(|p| p.index())
            .ok_or_else(|| BuildError::resolution(FOG_TYPE, "lost fog factor output"))?;

        let main = set.fragment_program_mut()?.entry_point_mut()?;
        let factor_in = main.resolve_input_parameter(
            Semantic::TexCoord,
            Some(varying_index),
            ElementType::Float1,
        )?;
        let colour_local = main.resolve_local_parameter(
            Semantic::Unknown,
            0,
            ElementType::Float4,
            FOG_COLOUR_LOCAL,
        )?;
        let colour_out =
            main.resolve_output_parameter(Semantic::Color, Some(0), ElementType::Float4)?;

        self.resolved = Some(Resolved {
            world_view_proj,
            position,
            params_local,
            factor_out,
            factor_in,
            colour_local,
            colour_out,
        });
        Ok(())
    }

    pub(super) fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        set.vertex_program_mut()?.add_dependency(FFP_LIB_FOG);
        Ok(())
    }

    pub(super) fn add_function_invocations(
        &mut self,
        set: &mut ProgramSet,
    ) -> Result<(), BuildError> {
        let r = self
            .resolved
            .ok_or_else(|| BuildError::resolution(FOG_TYPE, "parameters not resolved"))?;
        let callee = match self.settings.mode {
            FogMode::Linear => FFP_FUNC_VERTEX_FOG_LINEAR,
            FogMode::Exp => FFP_FUNC_VERTEX_FOG_EXP,
            FogMode::Exp2 => FFP_FUNC_VERTEX_FOG_EXP2,
            FogMode::None => return Ok(()),
        };

        let vs = set.vertex_program_mut()?.entry_point_mut()?;
        vs.add_atom_instance(construct(
            group_order::VS_FOG,
            10,
            self.fog_params(),
            r.params_local,
        ));
        vs.add_atom_instance(
            FunctionInvocation::new(callee, group_order::VS_FOG, 20)
                .with(Operand::input(r.world_view_proj))
                .with(Operand::input(r.position))
                .with(Operand::input(r.params_local))
                .with(Operand::output(r.factor_out)),
        );

        let ps = set.fragment_program_mut()?.entry_point_mut()?;
        ps.add_atom_instance(construct(
            group_order::PS_FOG,
            10,
            self.fog_colour(),
            r.colour_local,
        ));
        ps.add_atom_instance(
            FunctionInvocation::new(FFP_FUNC_LERP, group_order::PS_FOG, 20)
                .with(Operand::input(r.colour_local).masked(Mask::XYZ))
                .with(Operand::input(r.colour_out).masked(Mask::XYZ))
                .with(Operand::input(r.factor_in))
                .with(Operand::output(r.colour_out).masked(Mask::XYZ)),
        );
        Ok(())
    }
}

fn construct(
    group: i32,
    internal: i32,
    values: [f32; 4],
    target: ParameterId,
) -> FunctionInvocation {
    values
        .into_iter()
        .fold(FunctionInvocation::new(FFP_FUNC_CONSTRUCT, group, internal), |atom, v| {
            atom.with(Operand::literal(v))
        })
        .with(Operand::output(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_fog() -> FogSettings {
        FogSettings {
            mode: FogMode::Exp,
            colour: [0.5, 0.5, 0.5, 1.0],
            start: 0.0,
            end: 1.0,
            density: 0.5,
        }
    }

    #[test]
    fn no_fog_mode_builds_nothing() {
        assert!(FfpFog::new(FogSettings::default()).is_none());
    }

    #[test]
    fn pass_override_wins_over_scene() {
        let source = PassState {
            fog_override: true,
            fog: exp_fog(),
            ..PassState::default()
        };
        let mut destination = source.clone();
        let fog = FfpFog::for_pass(&source, &SceneSettings::default(), &mut destination).unwrap();
        assert_eq!(fog.mode(), FogMode::Exp);
        assert_eq!(fog.fog_params(), [0.5, 0.0, 1.0, 1.0]);
        assert_eq!(destination.fog.mode, FogMode::None);
        assert!(destination.fog_override);
    }

    #[test]
    fn empty_range_has_zero_scale() {
        let fog = FfpFog::new(FogSettings {
            mode: FogMode::Linear,
            start: 5.0,
            end: 5.0,
            ..exp_fog()
        })
        .unwrap();
        assert_eq!(fog.fog_params()[3], 0.0);
    }

    #[test]
    fn fog_factor_uses_a_fresh_texcoord() {
        let mut fog = FfpFog::new(exp_fog()).unwrap();
        let mut set = ProgramSet::new();
        set.vertex_program_mut()
            .unwrap()
            .entry_point_mut()
            .unwrap()
            .resolve_output_parameter(Semantic::TexCoord, Some(0), ElementType::Float2)
            .unwrap();
        fog.resolve_parameters(&mut set).unwrap();
        fog.add_function_invocations(&mut set).unwrap();

        let ps = set.fragment_program().unwrap().entry_point().unwrap();
        assert!(ps
            .input_parameter_by_semantic(Semantic::TexCoord, 1)
            .is_some());
        assert_eq!(ps.atom_instances().len(), 2);
    }
}
