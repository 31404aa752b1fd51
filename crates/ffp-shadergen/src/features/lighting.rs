use tracing::warn;

use super::{group_order, ColourStageFlags, LIGHTING_TYPE};
use crate::config::LightCounts;
use crate::error::BuildError;
use crate::hash::FeatureHasher;
use crate::host::{
    ConstantValue, DrawContext, GpuProgramParameters, Light, LightType, PassState,
    TrackVertexColour,
};
use crate::ir::{
    AutoConstantKind, ElementType, FunctionInvocation, Mask, Operand, ParameterId, ProgramSet,
    Semantic,
};
use crate::library::*;
use crate::math::{normalize, transform_direction, transform_point};

const LIGHT_POSITION: &str = "light_position_view_space";
const LIGHT_DIRECTION: &str = "light_direction_view_space";
const LIGHT_ATTENUATION: &str = "light_attenuation";
const SPOTLIGHT_PARAMS: &str = "spotlight_params";
const LIGHT_DIFFUSE: &str = "light_diffuse";
const LIGHT_SPECULAR: &str = "light_specular";
const DIFFUSE_TRACKED_LOCAL: &str = "light_diffuse_tracked";
const SPECULAR_TRACKED_LOCAL: &str = "light_specular_tracked";

/// Per-vertex lighting: global illumination plus one diffuse (and optionally specular)
/// accumulation per configured light.
#[derive(Clone, Debug)]
pub struct FfpLighting {
    material: String,
    light_counts: LightCounts,
    tracking: TrackVertexColour,
    specular: bool,
    per_light_iteration: bool,
    resolved: Option<Resolved>,
}

#[derive(Clone, Debug)]
struct Resolved {
    world_view: ParameterId,
    world_view_it: ParameterId,
    position: ParameterId,
    normal: ParameterId,
    vertex_colour: Option<ParameterId>,
    diffuse_out: ParameterId,
    specular_out: Option<ParameterId>,
    global: GlobalIllumination,
    shininess: Option<ParameterId>,
    diffuse_tracked: Option<ParameterId>,
    specular_tracked: Option<ParameterId>,
    lights: Vec<LightParams>,
}

#[derive(Clone, Copy, Debug)]
enum GlobalIllumination {
    SceneColour(ParameterId),
    Tracked {
        /// Ambient light colour when ambient is tracked, derived ambient otherwise.
        ambient: ParameterId,
        /// Surface emissive colour; `None` when emissive is tracked.
        emissive: Option<ParameterId>,
    },
}

#[derive(Clone, Copy, Debug)]
struct LightParams {
    kind: LightType,
    position: Option<ParameterId>,
    direction: Option<ParameterId>,
    attenuation: Option<ParameterId>,
    spot: Option<ParameterId>,
    diffuse: ParameterId,
    specular: Option<ParameterId>,
}

impl FfpLighting {
    pub fn new(
        material: impl Into<String>,
        light_counts: LightCounts,
        tracking: TrackVertexColour,
        specular: bool,
    ) -> Self {
        Self {
            material: material.into(),
            light_counts,
            tracking,
            specular,
            per_light_iteration: false,
            resolved: None,
        }
    }

    /// Lighting for `pass`, or `None` when the pass is unlit.
    pub fn for_pass(material: &str, pass: &PassState, light_counts: LightCounts) -> Option<Self> {
        if !pass.lighting_enabled {
            return None;
        }
        let mut lighting = Self::new(
            material,
            light_counts,
            pass.vertex_colour_tracking,
            pass.specular_enabled(),
        );
        lighting.per_light_iteration = pass.iterate_per_light;
        Some(lighting)
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn light_counts(&self) -> LightCounts {
        self.light_counts
    }

    pub fn specular_enabled(&self) -> bool {
        self.specular
    }

    pub fn is_per_light_iteration(&self) -> bool {
        self.per_light_iteration
    }

    pub fn hash_code(&self) -> u32 {
        let mut hasher = FeatureHasher::new(LIGHTING_TYPE);
        hasher.write_u32(self.light_counts.point);
        hasher.write_u32(self.light_counts.directional);
        hasher.write_u32(self.light_counts.spot);
        hasher.write_u8(self.tracking.bits());
        hasher.write_bool(self.specular);
        hasher.write_bool(self.per_light_iteration);
        hasher.finish()
    }

    pub(super) fn colour_requirements(&self) -> ColourStageFlags {
        if self.per_light_iteration {
            return ColourStageFlags::empty();
        }
        let mut flags = ColourStageFlags::VS_OUTPUT_DIFFUSE;
        if self.specular {
            flags |= ColourStageFlags::VS_OUTPUT_SPECULAR
                | ColourStageFlags::PS_INPUT_SPECULAR
                | ColourStageFlags::PS_OUTPUT_SPECULAR;
        }
        if !self.tracking.is_empty() {
            flags |= ColourStageFlags::VS_INPUT_DIFFUSE;
        }
        flags
    }

    /// Light slots in uniform order: point, then directional, then spot.
    fn slots(&self) -> impl Iterator<Item = LightType> {
        let counts = self.light_counts;
        std::iter::repeat(LightType::Point)
            .take(counts.point as usize)
            .chain(std::iter::repeat(LightType::Directional).take(counts.directional as usize))
            .chain(std::iter::repeat(LightType::Spot).take(counts.spot as usize))
    }

    pub(super) fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        self.resolved = None;
        if self.per_light_iteration {
            warn!(
                material = %self.material,
                "per-light iteration is not supported by generated lighting; pass renders unlit"
            );
            return Ok(());
        }

        let vs = set.vertex_program_mut()?;
        let world_view = vs.resolve_auto_parameter_int(AutoConstantKind::WorldViewMatrix, 0)?;
        let world_view_it =
            vs.resolve_auto_parameter_int(AutoConstantKind::InverseTransposeWorldViewMatrix, 0)?;

        let global = if self
            .tracking
            .intersects(TrackVertexColour::AMBIENT | TrackVertexColour::EMISSIVE)
        {
            let ambient = if self.tracking.contains(TrackVertexColour::AMBIENT) {
                vs.resolve_auto_parameter_int(AutoConstantKind::AmbientLightColour, 0)?
            } else {
                vs.resolve_auto_parameter_int(AutoConstantKind::DerivedAmbientLightColour, 0)?
            };
            let emissive = if self.tracking.contains(TrackVertexColour::EMISSIVE) {
                None
            } else {
                Some(vs.resolve_auto_parameter_int(AutoConstantKind::SurfaceEmissiveColour, 0)?)
            };
            GlobalIllumination::Tracked { ambient, emissive }
        } else {
            GlobalIllumination::SceneColour(
                vs.resolve_auto_parameter_int(AutoConstantKind::DerivedSceneColour, 0)?,
            )
        };

        let shininess = if self.specular {
            Some(vs.resolve_auto_parameter_int(AutoConstantKind::SurfaceShininess, 0)?)
        } else {
            None
        };

        let mut lights = Vec::new();
        for (slot, kind) in self.slots().enumerate() {
            let index = Some(slot as u32);
            let mut float4 =
                |name: &str| vs.resolve_parameter(ElementType::Float4, index, name);
            let position = match kind {
                LightType::Point | LightType::Spot => Some(float4(LIGHT_POSITION)?),
                LightType::Directional => None,
            };
            let direction = match kind {
                LightType::Directional | LightType::Spot => Some(float4(LIGHT_DIRECTION)?),
                LightType::Point => None,
            };
            let attenuation = match kind {
                LightType::Point | LightType::Spot => Some(float4(LIGHT_ATTENUATION)?),
                LightType::Directional => None,
            };
            let spot = match kind {
                LightType::Spot => Some(float4(SPOTLIGHT_PARAMS)?),
                _ => None,
            };
            let diffuse = float4(LIGHT_DIFFUSE)?;
            let specular = if self.specular {
                Some(float4(LIGHT_SPECULAR)?)
            } else {
                None
            };
            lights.push(LightParams {
                kind,
                position,
                direction,
                attenuation,
                spot,
                diffuse,
                specular,
            });
        }

        let main = vs.entry_point_mut()?;
        let position =
            main.resolve_input_parameter(Semantic::Position, Some(0), ElementType::Float4)?;
        let normal = main.resolve_input_parameter(Semantic::Normal, Some(0), ElementType::Float3)?;
        let vertex_colour = if self.tracking.is_empty() {
            None
        } else {
            Some(main.resolve_input_parameter(Semantic::Color, Some(0), ElementType::Float4)?)
        };
        let diffuse_out =
            main.resolve_output_parameter(Semantic::Color, Some(0), ElementType::Float4)?;
        let specular_out = if self.specular {
            Some(main.resolve_output_parameter(Semantic::Color, Some(1), ElementType::Float4)?)
        } else {
            None
        };
        let diffuse_tracked = if self.tracking.contains(TrackVertexColour::DIFFUSE)
            && !lights.is_empty()
        {
            Some(main.resolve_local_parameter(
                Semantic::Unknown,
                0,
                ElementType::Float4,
                DIFFUSE_TRACKED_LOCAL,
            )?)
        } else {
            None
        };
        let specular_tracked = if self.specular
            && self.tracking.contains(TrackVertexColour::SPECULAR)
            && !lights.is_empty()
        {
            Some(main.resolve_local_parameter(
                Semantic::Unknown,
                0,
                ElementType::Float4,
                SPECULAR_TRACKED_LOCAL,
            )?)
        } else {
            None
        };

        self.resolved = Some(Resolved {
            world_view,
            world_view_it,
            position,
            normal,
            vertex_colour,
            diffuse_out,
            specular_out,
            global,
            shininess,
            diffuse_tracked,
            specular_tracked,
            lights,
        });
        Ok(())
    }

    pub(super) fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        if self.resolved.is_some() {
            let vs = set.vertex_program_mut()?;
            vs.add_dependency(FFP_LIB_COMMON);
            vs.add_dependency(FFP_LIB_LIGHTING);
        }
        Ok(())
    }

    pub(super) fn add_function_invocations(
        &mut self,
        set: &mut ProgramSet,
    ) -> Result<(), BuildError> {
        let Some(r) = &self.resolved else {
            return Ok(());
        };
        let main = set.vertex_program_mut()?.entry_point_mut()?;
        let mut order = 0;
        let mut next = |name: &str| {
            order += 10;
            FunctionInvocation::new(name, group_order::VS_LIGHTING, order)
        };

        match r.global {
            GlobalIllumination::SceneColour(scene) => {
                main.add_atom_instance(
                    next(FFP_FUNC_ASSIGN)
                        .with(Operand::input(scene))
                        .with(Operand::output(r.diffuse_out)),
                );
            }
            GlobalIllumination::Tracked { ambient, emissive } => {
                let ambient_atom = match r.vertex_colour {
                    Some(colour) if self.tracking.contains(TrackVertexColour::AMBIENT) => {
                        next(FFP_FUNC_MODULATE)
                            .with(Operand::input(ambient))
                            .with(Operand::input(colour))
                    }
                    _ => next(FFP_FUNC_ASSIGN).with(Operand::input(ambient)),
                };
                main.add_atom_instance(ambient_atom.with(Operand::output(r.diffuse_out)));

                let emissive_source = emissive.or(r.vertex_colour);
                if let Some(emissive) = emissive_source {
                    main.add_atom_instance(
                        next(FFP_FUNC_ADD)
                            .with(Operand::input(emissive).masked(Mask::XYZ))
                            .with(Operand::input(r.diffuse_out).masked(Mask::XYZ))
                            .with(Operand::output(r.diffuse_out).masked(Mask::XYZ)),
                    );
                }
            }
        }

        if let Some(specular_out) = r.specular_out {
            main.add_atom_instance(
                next(FFP_FUNC_CONSTRUCT)
                    .with(Operand::literal(0.0))
                    .with(Operand::literal(0.0))
                    .with(Operand::literal(0.0))
                    .with(Operand::literal(0.0))
                    .with(Operand::output(specular_out)),
            );
        }

        for light in &r.lights {
            let diffuse = match (r.diffuse_tracked, r.vertex_colour) {
                (Some(tracked), Some(colour)) => {
                    main.add_atom_instance(
                        next(FFP_FUNC_MODULATE)
                            .with(Operand::input(light.diffuse))
                            .with(Operand::input(colour))
                            .with(Operand::output(tracked)),
                    );
                    tracked
                }
                _ => light.diffuse,
            };
            let callee = match light.kind {
                LightType::Directional => FFP_FUNC_LIGHT_DIRECTIONAL_DIFFUSE,
                LightType::Point => FFP_FUNC_LIGHT_POINT_DIFFUSE,
                LightType::Spot => FFP_FUNC_LIGHT_SPOT_DIFFUSE,
            };
            let mut atom = self.light_operands(next(callee), r, light, false);
            atom.push_operand(Operand::input(diffuse).masked(Mask::XYZ));
            atom.push_operand(Operand::in_out(r.diffuse_out).masked(Mask::XYZ));
            main.add_atom_instance(atom);

            let (Some(specular_out), Some(light_specular), Some(shininess)) =
                (r.specular_out, light.specular, r.shininess)
            else {
                continue;
            };
            let specular = match (r.specular_tracked, r.vertex_colour) {
                (Some(tracked), Some(colour)) => {
                    main.add_atom_instance(
                        next(FFP_FUNC_MODULATE)
                            .with(Operand::input(light_specular))
                            .with(Operand::input(colour))
                            .with(Operand::output(tracked)),
                    );
                    tracked
                }
                _ => light_specular,
            };
            let callee = match light.kind {
                LightType::Directional => FFP_FUNC_LIGHT_DIRECTIONAL_SPECULAR,
                LightType::Point => FFP_FUNC_LIGHT_POINT_SPECULAR,
                LightType::Spot => FFP_FUNC_LIGHT_SPOT_SPECULAR,
            };
            let mut atom = self.light_operands(next(callee), r, light, true);
            atom.push_operand(Operand::input(specular).masked(Mask::XYZ));
            atom.push_operand(Operand::input(shininess));
            atom.push_operand(Operand::in_out(specular_out).masked(Mask::XYZ));
            main.add_atom_instance(atom);
        }
        Ok(())
    }

    /// Geometry and light operands shared by the diffuse and specular callees.
    fn light_operands(
        &self,
        mut atom: FunctionInvocation,
        r: &Resolved,
        light: &LightParams,
        specular: bool,
    ) -> FunctionInvocation {
        let needs_position = specular || light.kind != LightType::Directional;
        if needs_position {
            atom.push_operand(Operand::input(r.world_view));
            atom.push_operand(Operand::input(r.position));
        }
        atom.push_operand(Operand::input(r.world_view_it));
        atom.push_operand(Operand::input(r.normal));
        for (id, mask) in [
            (light.position, Mask::XYZ),
            (light.direction, Mask::XYZ),
            (light.attenuation, Mask::all()),
            (light.spot, Mask::XYZ),
        ] {
            if let Some(id) = id {
                atom.push_operand(Operand::input(id).masked(mask));
            }
        }
        atom
    }

    pub(super) fn update_gpu_programs_params(
        &self,
        pass: &PassState,
        params: &mut GpuProgramParameters,
        ctx: &DrawContext<'_>,
    ) {
        if self.per_light_iteration {
            return;
        }

        let mut used = [0usize; 3];
        for (slot, kind) in self.slots().enumerate() {
            let nth = &mut used[kind as usize];
            let light = ctx
                .lights
                .iter()
                .filter(|l| l.kind == kind)
                .nth(*nth)
                .copied()
                .unwrap_or_else(|| Light::blank(kind));
            *nth += 1;

            if kind != LightType::Directional {
                let p = transform_point(&ctx.view_matrix, light.position);
                params.set_named_constant(
                    format!("{LIGHT_POSITION}{slot}"),
                    ConstantValue::Float4([p[0], p[1], p[2], 1.0]),
                );
                params.set_named_constant(
                    format!("{LIGHT_ATTENUATION}{slot}"),
                    ConstantValue::Float4(light.attenuation),
                );
            }
            if kind != LightType::Point {
                let d = normalize(transform_direction(&ctx.view_matrix, light.direction));
                params.set_named_constant(
                    format!("{LIGHT_DIRECTION}{slot}"),
                    ConstantValue::Float4([d[0], d[1], d[2], 0.0]),
                );
            }
            if kind == LightType::Spot {
                params.set_named_constant(
                    format!("{SPOTLIGHT_PARAMS}{slot}"),
                    ConstantValue::Float4([
                        (light.spot_inner * 0.5).cos(),
                        (light.spot_outer * 0.5).cos(),
                        light.spot_falloff,
                        0.0,
                    ]),
                );
            }

            let diffuse = if self.tracking.contains(TrackVertexColour::DIFFUSE) {
                light.diffuse
            } else {
                modulate(light.diffuse, pass.diffuse)
            };
            params.set_named_constant(
                format!("{LIGHT_DIFFUSE}{slot}"),
                ConstantValue::Float4(diffuse),
            );
            if self.specular {
                let specular = if self.tracking.contains(TrackVertexColour::SPECULAR) {
                    light.specular
                } else {
                    modulate(light.specular, pass.specular)
                };
                params.set_named_constant(
                    format!("{LIGHT_SPECULAR}{slot}"),
                    ConstantValue::Float4(specular),
                );
            }
        }
    }
}

fn modulate(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(point: u32, directional: u32, spot: u32) -> LightCounts {
        LightCounts {
            point,
            directional,
            spot,
        }
    }

    #[test]
    fn unlit_pass_has_no_lighting() {
        let pass = PassState {
            lighting_enabled: false,
            ..PassState::default()
        };
        assert!(FfpLighting::for_pass("m", &pass, counts(0, 1, 0)).is_none());
    }

    #[test]
    fn specular_requests_specular_wiring() {
        let lighting =
            FfpLighting::new("m", counts(0, 1, 0), TrackVertexColour::empty(), true);
        let flags = lighting.colour_requirements();
        assert!(flags.contains(ColourStageFlags::VS_OUTPUT_SPECULAR));
        assert!(flags.contains(ColourStageFlags::PS_OUTPUT_SPECULAR));
        assert!(!flags.contains(ColourStageFlags::VS_INPUT_DIFFUSE));
    }

    #[test]
    fn one_accumulation_per_light_slot() {
        let mut lighting =
            FfpLighting::new("m", counts(1, 1, 1), TrackVertexColour::empty(), false);
        let mut set = ProgramSet::new();
        lighting.resolve_parameters(&mut set).unwrap();
        lighting.add_function_invocations(&mut set).unwrap();

        let vs = set.vertex_program().unwrap();
        let callees: Vec<_> = vs
            .entry_point()
            .unwrap()
            .atom_instances()
            .iter()
            .filter_map(|a| a.as_invocation())
            .map(|i| i.function_name().to_string())
            .collect();
        assert_eq!(
            callees,
            [
                FFP_FUNC_ASSIGN,
                FFP_FUNC_LIGHT_POINT_DIFFUSE,
                FFP_FUNC_LIGHT_DIRECTIONAL_DIFFUSE,
                FFP_FUNC_LIGHT_SPOT_DIFFUSE,
            ]
        );
        assert!(vs.parameter_by_name("light_position_view_space0").is_some());
        assert!(vs.parameter_by_name("light_direction_view_space1").is_some());
        assert!(vs.parameter_by_name("spotlight_params2").is_some());
    }

    #[test]
    fn missing_lights_are_written_blank() {
        let lighting =
            FfpLighting::new("m", counts(0, 2, 0), TrackVertexColour::empty(), false);
        let lights = [Light::directional([0.0, -1.0, 0.0], [1.0, 0.5, 0.25, 1.0])];
        let ctx = DrawContext {
            lights: &lights,
            view_matrix: crate::math::IDENTITY,
        };
        let mut params = GpuProgramParameters::default();
        lighting.update_gpu_programs_params(&PassState::default(), &mut params, &ctx);

        assert_eq!(
            params.named_constant("light_diffuse0"),
            Some(&ConstantValue::Float4([1.0, 0.5, 0.25, 1.0]))
        );
        assert_eq!(
            params.named_constant("light_diffuse1"),
            Some(&ConstantValue::Float4([0.0; 4]))
        );
        assert_eq!(
            params.named_constant("light_direction_view_space0"),
            Some(&ConstantValue::Float4([0.0, -1.0, 0.0, 0.0]))
        );
    }
}
