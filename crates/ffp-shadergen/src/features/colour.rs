use bitflags::bitflags;

use super::{group_order, COLOUR_TYPE};
use crate::error::BuildError;
use crate::hash::FeatureHasher;
use crate::ir::{
    ElementType, Function, FunctionInvocation, Mask, Operand, ParameterId, ProgramSet, Semantic,
};
use crate::library::{FFP_FUNC_ADD, FFP_FUNC_ASSIGN, FFP_FUNC_CONSTRUCT};

bitflags! {
    /// Which diffuse/specular colours flow into and out of each stage.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ColourStageFlags: u8 {
        const VS_INPUT_DIFFUSE = 1 << 0;
        const VS_INPUT_SPECULAR = 1 << 1;
        const VS_OUTPUT_DIFFUSE = 1 << 2;
        const VS_OUTPUT_SPECULAR = 1 << 3;
        const PS_INPUT_DIFFUSE = 1 << 4;
        const PS_INPUT_SPECULAR = 1 << 5;
        const PS_OUTPUT_DIFFUSE = 1 << 6;
        const PS_OUTPUT_SPECULAR = 1 << 7;
    }
}

impl ColourStageFlags {
    /// A fragment input can only be read if the vertex stage writes it.
    fn with_implied(self) -> Self {
        let mut flags = self;
        if flags.contains(Self::PS_INPUT_DIFFUSE) {
            flags |= Self::VS_OUTPUT_DIFFUSE;
        }
        if flags.contains(Self::PS_INPUT_SPECULAR) {
            flags |= Self::VS_OUTPUT_SPECULAR;
        }
        flags
    }
}

const DIFFUSE: u32 = 0;
const SPECULAR: u32 = 1;
/// Fragment programs have a single colour target; specular is carried in a local until it is
/// added at the end of the colour pipeline.
const SPECULAR_LOCAL: &str = "specular";

/// Wires per-vertex diffuse/specular colours between stages.
///
/// The flags are negotiated: other features request the colours they need through
/// [`FfpColour::add_resolve_stage_mask`], and only flagged parameters are resolved.
#[derive(Clone, Debug, Default)]
pub struct FfpColour {
    /// Flags set explicitly on this feature; negotiation never removes these.
    base: ColourStageFlags,
    flags: ColourStageFlags,
    resolved: Vec<(ColourStageFlags, ParameterId)>,
}

impl FfpColour {
    pub fn new(flags: ColourStageFlags) -> Self {
        Self {
            base: flags,
            flags: flags.with_implied(),
            resolved: Vec::new(),
        }
    }

    pub fn resolve_stage_flags(&self) -> ColourStageFlags {
        self.flags
    }

    pub fn set_resolve_stage_flags(&mut self, flags: ColourStageFlags) {
        self.base = flags;
        self.flags = flags.with_implied();
    }

    pub fn add_resolve_stage_mask(&mut self, mask: ColourStageFlags) {
        self.base |= mask;
        self.flags = (self.flags | mask).with_implied();
    }

    pub fn remove_resolve_stage_mask(&mut self, mask: ColourStageFlags) {
        self.base.remove(mask);
        self.flags.remove(mask);
    }

    /// Recomputes the flags from this feature's own flags plus what the other features of the
    /// RenderState currently require.
    pub(crate) fn negotiate(&mut self, required: ColourStageFlags) {
        self.flags = (self.base | required).with_implied();
    }

    /// Parameter resolved for `flag` by the last build.
    pub fn resolved_parameter(&self, flag: ColourStageFlags) -> Option<ParameterId> {
        self.resolved
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, id)| *id)
    }

    pub fn resolved_flags(&self) -> ColourStageFlags {
        self.resolved
            .iter()
            .fold(ColourStageFlags::empty(), |acc, (f, _)| acc | *f)
    }

    pub fn hash_code(&self) -> u32 {
        let mut hasher = FeatureHasher::new(COLOUR_TYPE);
        hasher.write_u8(self.flags.bits());
        hasher.finish()
    }

    pub(super) fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        use ColourStageFlags as F;

        let flags = self.flags;
        let mut resolved = Vec::new();

        let vs = set.vertex_program_mut()?.entry_point_mut()?;
        for (flag, index, input) in [
            (F::VS_INPUT_DIFFUSE, DIFFUSE, true),
            (F::VS_INPUT_SPECULAR, SPECULAR, true),
            (F::VS_OUTPUT_DIFFUSE, DIFFUSE, false),
            (F::VS_OUTPUT_SPECULAR, SPECULAR, false),
        ] {
            if flags.contains(flag) {
                resolved.push((flag, resolve_colour(vs, input, index)?));
            }
        }

        let ps = set.fragment_program_mut()?.entry_point_mut()?;
        for (flag, index) in [
            (F::PS_INPUT_DIFFUSE, DIFFUSE),
            (F::PS_INPUT_SPECULAR, SPECULAR),
        ] {
            if flags.contains(flag) {
                resolved.push((flag, resolve_colour(ps, true, index)?));
            }
        }
        if flags.contains(F::PS_OUTPUT_DIFFUSE) {
            resolved.push((F::PS_OUTPUT_DIFFUSE, resolve_colour(ps, false, DIFFUSE)?));
        }
        if flags.contains(F::PS_OUTPUT_SPECULAR) {
            let id = ps.resolve_local_parameter(
                Semantic::Color,
                SPECULAR,
                ElementType::Float4,
                SPECULAR_LOCAL,
            )?;
            resolved.push((F::PS_OUTPUT_SPECULAR, id));
        }

        self.resolved = resolved;
        Ok(())
    }

    pub(super) fn add_function_invocations(
        &mut self,
        set: &mut ProgramSet,
    ) -> Result<(), BuildError> {
        use ColourStageFlags as F;
        let get = |flag| self.resolved_parameter(flag);

        let vs = set.vertex_program_mut()?.entry_point_mut()?;
        if let Some(out) = get(F::VS_OUTPUT_DIFFUSE) {
            vs.add_atom_instance(copy_or_construct(
                group_order::VS_COLOUR,
                10,
                get(F::VS_INPUT_DIFFUSE),
                out,
                1.0,
            ));
        }
        if let Some(out) = get(F::VS_OUTPUT_SPECULAR) {
            vs.add_atom_instance(copy_or_construct(
                group_order::VS_COLOUR,
                20,
                get(F::VS_INPUT_SPECULAR),
                out,
                0.0,
            ));
        }

        let ps = set.fragment_program_mut()?.entry_point_mut()?;
        let diffuse_out = get(F::PS_OUTPUT_DIFFUSE);
        if let Some(out) = diffuse_out {
            ps.add_atom_instance(copy_or_construct(
                group_order::PS_COLOUR_BEGIN,
                10,
                get(F::PS_INPUT_DIFFUSE),
                out,
                1.0,
            ));
        }
        if let Some(specular) = get(F::PS_OUTPUT_SPECULAR) {
            ps.add_atom_instance(copy_or_construct(
                group_order::PS_COLOUR_BEGIN,
                20,
                get(F::PS_INPUT_SPECULAR),
                specular,
                0.0,
            ));
            if let Some(out) = diffuse_out {
                ps.add_atom_instance(
                    FunctionInvocation::new(FFP_FUNC_ADD, group_order::PS_COLOUR_END, 10)
                        .with(Operand::input(out).masked(Mask::XYZ))
                        .with(Operand::input(specular).masked(Mask::XYZ))
                        .with(Operand::output(out).masked(Mask::XYZ)),
                );
            }
        }
        Ok(())
    }
}

fn resolve_colour(
    function: &mut Function,
    input: bool,
    index: u32,
) -> Result<ParameterId, BuildError> {
    let id = if input {
        function.resolve_input_parameter(Semantic::Color, Some(index), ElementType::Float4)?
    } else {
        function.resolve_output_parameter(Semantic::Color, Some(index), ElementType::Float4)?
    };
    Ok(id)
}

fn copy_or_construct(
    group: i32,
    internal: i32,
    source: Option<ParameterId>,
    destination: ParameterId,
    fill: f32,
) -> FunctionInvocation {
    match source {
        Some(source) => FunctionInvocation::new(FFP_FUNC_ASSIGN, group, internal)
            .with(Operand::input(source))
            .with(Operand::output(destination)),
        None => FunctionInvocation::new(FFP_FUNC_CONSTRUCT, group, internal)
            .with(Operand::literal(fill))
            .with(Operand::literal(fill))
            .with(Operand::literal(fill))
            .with(Operand::literal(fill))
            .with(Operand::output(destination)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_inputs_imply_vertex_outputs() {
        let mut colour = FfpColour::new(ColourStageFlags::PS_INPUT_DIFFUSE);
        assert!(colour
            .resolve_stage_flags()
            .contains(ColourStageFlags::VS_OUTPUT_DIFFUSE));
        colour.add_resolve_stage_mask(ColourStageFlags::PS_INPUT_SPECULAR);
        assert!(colour
            .resolve_stage_flags()
            .contains(ColourStageFlags::VS_OUTPUT_SPECULAR));
    }

    #[test]
    fn only_flagged_parameters_are_resolved() {
        let mut colour = FfpColour::new(
            ColourStageFlags::VS_OUTPUT_DIFFUSE | ColourStageFlags::PS_OUTPUT_DIFFUSE,
        );
        let mut set = ProgramSet::new();
        colour.resolve_parameters(&mut set).unwrap();
        colour.add_function_invocations(&mut set).unwrap();

        assert_eq!(
            colour.resolved_flags(),
            ColourStageFlags::VS_OUTPUT_DIFFUSE | ColourStageFlags::PS_OUTPUT_DIFFUSE
        );
        let vs = set.vertex_program().unwrap().entry_point().unwrap();
        assert!(vs.input_parameters().is_empty());
        assert_eq!(vs.output_parameters().len(), 1);
        // No input colour: the output is constructed as opaque white.
        let atom = vs.atom_instances()[0].as_invocation().unwrap();
        assert_eq!(atom.function_name(), FFP_FUNC_CONSTRUCT);
    }

    #[test]
    fn negotiation_drops_requirements_that_went_away() {
        let mut colour = FfpColour::new(ColourStageFlags::PS_OUTPUT_DIFFUSE);
        colour.negotiate(ColourStageFlags::PS_INPUT_SPECULAR);
        assert!(colour
            .resolve_stage_flags()
            .contains(ColourStageFlags::VS_OUTPUT_SPECULAR));

        colour.negotiate(ColourStageFlags::empty());
        assert_eq!(
            colour.resolve_stage_flags(),
            ColourStageFlags::PS_OUTPUT_DIFFUSE
        );
    }

    #[test]
    fn flags_change_the_hash() {
        let a = FfpColour::new(ColourStageFlags::VS_OUTPUT_DIFFUSE);
        let mut b = a.clone();
        assert_eq!(a.hash_code(), b.hash_code());
        b.add_resolve_stage_mask(ColourStageFlags::VS_OUTPUT_SPECULAR);
        assert_ne!(a.hash_code(), b.hash_code());
    }
}
