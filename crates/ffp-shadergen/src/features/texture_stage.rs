use super::{group_order, ColourStageFlags, TEXTURE_STAGE_TYPE};
use crate::error::BuildError;
use crate::hash::FeatureHasher;
use crate::host::{
    ConstantValue, GpuProgramParameters, LayerBlendMode, LayerBlendOperation, LayerBlendSource,
    EnvMapType, Projector, TextureEffect, TextureType, TextureUnitState,
};
use crate::ir::{
    AutoConstantKind, ElementType, FunctionInvocation, IrError, Mask, Operand, ParameterId,
    Program, ProgramSet, Semantic,
};
use crate::library::*;
use crate::math::{is_identity, mul, CLIP_SPACE_TO_IMAGE_SPACE};

/// Texture units a generated fragment program can address.
pub const MAX_TEXTURE_UNITS: u32 = 8;

const SAMPLER_NAME: &str = "texture_sampler";
const TEX_VIEW_PROJ_NAME: &str = "tex_view_proj_image_matrix";
const TEXEL_LOCAL: &str = "texel";
const SOURCE1_LOCAL: &str = "source1";
const SOURCE2_LOCAL: &str = "source2";
const DIFFUSE_FALLBACK_LOCAL: &str = "vertex_diffuse";
const SPECULAR_FALLBACK_LOCAL: &str = "vertex_specular";

/// How a unit's texture coordinate is produced in the vertex program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexCoordCalcMethod {
    /// The vertex coordinate set, passed through.
    None,
    EnvironmentMapSphere,
    EnvironmentMapReflection,
    EnvironmentMapNormal,
    Projective,
}

impl TexCoordCalcMethod {
    fn from_effects(effects: &[TextureEffect]) -> (Self, Option<Projector>) {
        for effect in effects {
            match effect {
                TextureEffect::EnvironmentMap(EnvMapType::Planar | EnvMapType::Curved) => {
                    return (TexCoordCalcMethod::EnvironmentMapSphere, None)
                }
                TextureEffect::EnvironmentMap(EnvMapType::Reflection) => {
                    return (TexCoordCalcMethod::EnvironmentMapReflection, None)
                }
                TextureEffect::EnvironmentMap(EnvMapType::Normal) => {
                    return (TexCoordCalcMethod::EnvironmentMapNormal, None)
                }
                TextureEffect::ProjectiveTexture(projector) => {
                    return (TexCoordCalcMethod::Projective, Some(*projector))
                }
                _ => {}
            }
        }
        (TexCoordCalcMethod::None, None)
    }
}

/// One texture unit: coordinate generation in the vertex program, sampling and legacy layer
/// blending in the fragment program.
#[derive(Clone, Debug)]
pub struct FfpTextureStage {
    unit: u32,
    texture_type: TextureType,
    tex_coord_set: u32,
    calc_method: TexCoordCalcMethod,
    projector: Option<Projector>,
    needs_texture_matrix: bool,
    colour_blend: LayerBlendMode,
    alpha_blend: LayerBlendMode,
    resolved: Option<Resolved>,
}

#[derive(Clone, Copy, Debug)]
struct Resolved {
    vs_texcoord_in: Option<ParameterId>,
    vs_texcoord_out: ParameterId,
    texture_matrix: Option<ParameterId>,
    world: Option<ParameterId>,
    world_it: Option<ParameterId>,
    view: Option<ParameterId>,
    tex_view_proj: Option<ParameterId>,
    normal: Option<ParameterId>,
    position: Option<ParameterId>,
    ps_texcoord: ParameterId,
    coord_mask: Mask,
    sampler: ParameterId,
    texel: ParameterId,
    current: ParameterId,
    diffuse: Option<ColourSource>,
    specular: Option<ColourSource>,
    source1: ParameterId,
    source2: ParameterId,
}

/// A vertex colour read by the blend, or a local standing in for it when the fragment program
/// does not receive one.
#[derive(Clone, Copy, Debug)]
struct ColourSource {
    id: ParameterId,
    fallback: Option<f32>,
}

impl FfpTextureStage {
    pub fn new(unit: u32, state: &TextureUnitState) -> Self {
        let (calc_method, projector) = TexCoordCalcMethod::from_effects(&state.effects);
        let animated = state.effects.iter().any(|e| {
            matches!(
                e,
                TextureEffect::UScroll
                    | TextureEffect::VScroll
                    | TextureEffect::UvScroll
                    | TextureEffect::Rotate
                    | TextureEffect::Transform
            )
        });
        Self {
            unit,
            texture_type: state.texture_type,
            tex_coord_set: state.tex_coord_set,
            calc_method,
            projector,
            needs_texture_matrix: calc_method != TexCoordCalcMethod::Projective
                && (animated || !is_identity(&state.transform)),
            colour_blend: state.colour_blend,
            alpha_blend: state.alpha_blend,
            resolved: None,
        }
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn calc_method(&self) -> TexCoordCalcMethod {
        self.calc_method
    }

    pub fn needs_texture_matrix(&self) -> bool {
        self.needs_texture_matrix
    }

    pub fn hash_code(&self) -> u32 {
        let mut hasher = FeatureHasher::new(TEXTURE_STAGE_TYPE);
        hasher.write_u32(self.unit);
        hasher.write_u8(self.texture_type as u8);
        hasher.write_u32(self.tex_coord_set);
        hasher.write_u8(self.calc_method as u8);
        hasher.write_bool(self.needs_texture_matrix);
        for blend in [&self.colour_blend, &self.alpha_blend] {
            hasher.write_u8(blend.operation as u8);
            hasher.write_u8(blend.source1 as u8);
            hasher.write_u8(blend.source2 as u8);
            hasher.write_f32s(&blend.colour_arg1);
            hasher.write_f32s(&blend.colour_arg2);
            hasher.write_f32(blend.alpha_arg1);
            hasher.write_f32(blend.alpha_arg2);
            hasher.write_f32(blend.factor);
        }
        hasher.finish()
    }

    fn blends(&self) -> [&LayerBlendMode; 2] {
        [&self.colour_blend, &self.alpha_blend]
    }

    fn reads_diffuse(&self) -> bool {
        self.blends().iter().any(|b| {
            b.uses_source(LayerBlendSource::Diffuse)
                || matches!(
                    b.operation,
                    LayerBlendOperation::BlendDiffuseAlpha
                        | LayerBlendOperation::BlendDiffuseColour
                )
        })
    }

    fn reads_specular(&self) -> bool {
        self.blends()
            .iter()
            .any(|b| b.uses_source(LayerBlendSource::Specular))
    }

    pub(super) fn colour_requirements(&self) -> ColourStageFlags {
        let mut flags = ColourStageFlags::empty();
        if self.reads_diffuse() {
            flags |= ColourStageFlags::PS_INPUT_DIFFUSE;
        }
        if self.reads_specular() {
            flags |= ColourStageFlags::PS_INPUT_SPECULAR;
        }
        flags
    }

    fn texture_dimensions(&self) -> u32 {
        match self.texture_type {
            TextureType::Tex1D => 1,
            TextureType::Tex2D => 2,
            TextureType::Tex3D | TextureType::Cube => 3,
        }
    }

    fn sampler_type(&self) -> ElementType {
        match self.texture_type {
            TextureType::Tex1D => ElementType::Sampler1D,
            TextureType::Tex2D => ElementType::Sampler2D,
            TextureType::Tex3D => ElementType::Sampler3D,
            TextureType::Cube => ElementType::SamplerCube,
        }
    }

    /// Width of the generated coordinate.
    fn coord_width(&self) -> u32 {
        match self.calc_method {
            TexCoordCalcMethod::None => self.texture_dimensions(),
            TexCoordCalcMethod::EnvironmentMapSphere => 2,
            TexCoordCalcMethod::EnvironmentMapReflection
            | TexCoordCalcMethod::EnvironmentMapNormal
            | TexCoordCalcMethod::Projective => 3,
        }
    }

    /// Width the sampling callee expects.
    fn sample_width(&self) -> u32 {
        match self.calc_method {
            TexCoordCalcMethod::Projective => 3,
            _ => self.texture_dimensions(),
        }
    }

    pub(super) fn resolve_parameters(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        self.resolved = None;
        if self.unit >= MAX_TEXTURE_UNITS {
            return Err(BuildError::resolution(
                TEXTURE_STAGE_TYPE,
                format!(
                    "texture unit {} exceeds the limit of {MAX_TEXTURE_UNITS}",
                    self.unit
                ),
            ));
        }
        if self.calc_method == TexCoordCalcMethod::Projective
            && self.texture_type != TextureType::Tex2D
        {
            return Err(BuildError::resolution(
                TEXTURE_STAGE_TYPE,
                format!("projective texturing on unit {} needs a 2D texture", self.unit),
            ));
        }
        let (coord_width, sample_width) = (self.coord_width(), self.sample_width());
        if coord_width < sample_width {
            return Err(BuildError::resolution(
                TEXTURE_STAGE_TYPE,
                format!(
                    "{:?} on unit {} produces {coord_width} components, \
                     sampling needs {sample_width}",
                    self.calc_method, self.unit
                ),
            ));
        }
        let coord_ty = ElementType::float_vector(coord_width).ok_or_else(|| {
            BuildError::resolution(TEXTURE_STAGE_TYPE, "unsupported coordinate width")
        })?;
        let coord_mask = if coord_width == sample_width {
            Mask::all()
        } else {
            Mask::first(sample_width)
        };

        use TexCoordCalcMethod as M;
        let method = self.calc_method;
        let vs = set.vertex_program_mut()?;
        let world = resolve_auto_if(
            vs,
            matches!(method, M::EnvironmentMapReflection | M::Projective),
            AutoConstantKind::WorldMatrix,
        )?;
        let world_it = resolve_auto_if(
            vs,
            matches!(
                method,
                M::EnvironmentMapSphere | M::EnvironmentMapReflection | M::EnvironmentMapNormal
            ),
            AutoConstantKind::InverseTransposeWorldMatrix,
        )?;
        let view = resolve_auto_if(
            vs,
            matches!(
                method,
                M::EnvironmentMapSphere | M::EnvironmentMapReflection | M::EnvironmentMapNormal
            ),
            AutoConstantKind::ViewMatrix,
        )?;
        let tex_view_proj = if method == M::Projective {
            Some(vs.resolve_parameter(ElementType::Matrix4x4, Some(self.unit), TEX_VIEW_PROJ_NAME)?)
        } else {
            None
        };
        let texture_matrix = if self.needs_texture_matrix {
            Some(vs.resolve_auto_parameter_int(AutoConstantKind::TextureMatrix, self.unit as i32)?)
        } else {
            None
        };

        let main = vs.entry_point_mut()?;
        let vs_texcoord_in = if method == M::None {
            Some(main.resolve_input_parameter(
                Semantic::TexCoord,
                Some(self.tex_coord_set),
                coord_ty,
            )?)
        } else {
            None
        };
        let normal = if matches!(
            method,
            M::EnvironmentMapSphere | M::EnvironmentMapReflection | M::EnvironmentMapNormal
        ) {
            Some(main.resolve_input_parameter(Semantic::Normal, Some(0), ElementType::Float3)?)
        } else {
            None
        };
        let position = if matches!(method, M::EnvironmentMapReflection | M::Projective) {
            Some(main.resolve_input_parameter(Semantic::Position, Some(0), ElementType::Float4)?)
        } else {
            None
        };
        let vs_texcoord_out = main.resolve_output_parameter(Semantic::TexCoord, None, coord_ty)?;
        let varying_index = main
            .parameter(vs_texcoord_out)
            .map(|p| p.index())
            .ok_or_else(|| BuildError::resolution(TEXTURE_STAGE_TYPE, "lost texcoord output"))?;

        let (reads_diffuse, reads_specular) = (self.reads_diffuse(), self.reads_specular());
        let ps = set.fragment_program_mut()?;
        let sampler = ps.resolve_parameter(self.sampler_type(), Some(self.unit), SAMPLER_NAME)?;
        let main = ps.entry_point_mut()?;
        let ps_texcoord =
            main.resolve_input_parameter(Semantic::TexCoord, Some(varying_index), coord_ty)?;
        let texel =
            main.resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float4, TEXEL_LOCAL)?;
        let current = main.resolve_output_parameter(Semantic::Color, Some(0), ElementType::Float4)?;
        let source1 =
            main.resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float4, SOURCE1_LOCAL)?;
        let source2 =
            main.resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float4, SOURCE2_LOCAL)?;

        let mut colour_source = |index: u32, local: &str, fill: f32| {
            match main.input_parameter_by_semantic(Semantic::Color, index) {
                Some(id) => Ok::<_, BuildError>(ColourSource { id, fallback: None }),
                None => Ok(ColourSource {
                    id: main.resolve_local_parameter(
                        Semantic::Color,
                        index,
                        ElementType::Float4,
                        local,
                    )?,
                    fallback: Some(fill),
                }),
            }
        };
        let diffuse = if reads_diffuse {
            Some(colour_source(0, DIFFUSE_FALLBACK_LOCAL, 1.0)?)
        } else {
            None
        };
        let specular = if reads_specular {
            Some(colour_source(1, SPECULAR_FALLBACK_LOCAL, 0.0)?)
        } else {
            None
        };

        self.resolved = Some(Resolved {
            vs_texcoord_in,
            vs_texcoord_out,
            texture_matrix,
            world,
            world_it,
            view,
            tex_view_proj,
            normal,
            position,
            ps_texcoord,
            coord_mask,
            sampler,
            texel,
            current,
            diffuse,
            specular,
            source1,
            source2,
        });
        Ok(())
    }

    pub(super) fn resolve_dependencies(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        if self.needs_texture_matrix || self.calc_method != TexCoordCalcMethod::None {
            let vs = set.vertex_program_mut()?;
            vs.add_dependency(FFP_LIB_COMMON);
            vs.add_dependency(FFP_LIB_TEXTURING);
        }
        set.fragment_program_mut()?.add_dependency(FFP_LIB_SAMPLING);
        Ok(())
    }

    pub(super) fn add_function_invocations(
        &mut self,
        set: &mut ProgramSet,
    ) -> Result<(), BuildError> {
        let r = self
            .resolved
            .ok_or_else(|| BuildError::resolution(TEXTURE_STAGE_TYPE, "parameters not resolved"))?;
        self.add_vertex_invocations(set, &r)?;
        self.add_fragment_invocations(set, &r)
    }

    fn add_vertex_invocations(&self, set: &mut ProgramSet, r: &Resolved) -> Result<(), BuildError> {
        let base = self.unit as i32 * 10;
        let main = set.vertex_program_mut()?.entry_point_mut()?;
        let invocation =
            |name: &str| FunctionInvocation::new(name, group_order::VS_TEXTURING, base);

        let generate = match self.calc_method {
            TexCoordCalcMethod::None => None,
            TexCoordCalcMethod::EnvironmentMapSphere => Some(with_inputs(
                &[r.world_it, r.view, r.normal],
                invocation(FFP_FUNC_GENERATE_TEXCOORD_ENV_SPHERE),
            )),
            TexCoordCalcMethod::EnvironmentMapReflection => Some(with_inputs(
                &[r.world, r.world_it, r.view, r.normal, r.position],
                invocation(FFP_FUNC_GENERATE_TEXCOORD_ENV_REFLECT),
            )),
            TexCoordCalcMethod::EnvironmentMapNormal => Some(with_inputs(
                &[r.world_it, r.view, r.normal],
                invocation(FFP_FUNC_GENERATE_TEXCOORD_ENV_NORMAL),
            )),
            TexCoordCalcMethod::Projective => Some(with_inputs(
                &[r.world, r.tex_view_proj, r.position],
                invocation(FFP_FUNC_GENERATE_TEXCOORD_PROJECTION),
            )),
        };

        let transform_callee = match self.coord_width() {
            1 => FFP_FUNC_TRANSFORM_TEXCOORD_1,
            2 => FFP_FUNC_TRANSFORM_TEXCOORD_2,
            _ => FFP_FUNC_TRANSFORM_TEXCOORD_3,
        };
        match (generate, r.vs_texcoord_in, r.texture_matrix) {
            (Some(atom), _, matrix) => {
                main.add_atom_instance(atom.with(Operand::output(r.vs_texcoord_out)));
                if let Some(matrix) = matrix {
                    let transform = FunctionInvocation::new(
                        transform_callee,
                        group_order::VS_TEXTURING,
                        base + 1,
                    );
                    main.add_atom_instance(
                        transform
                            .with(Operand::input(matrix))
                            .with(Operand::in_out(r.vs_texcoord_out)),
                    );
                }
            }
            (None, Some(input), Some(matrix)) => main.add_atom_instance(
                invocation(transform_callee)
                    .with(Operand::input(matrix))
                    .with(Operand::input(input))
                    .with(Operand::output(r.vs_texcoord_out)),
            ),
            (None, Some(input), None) => main.add_atom_instance(
                invocation(FFP_FUNC_ASSIGN)
                    .with(Operand::input(input))
                    .with(Operand::output(r.vs_texcoord_out)),
            ),
            (None, None, _) => {
                return Err(BuildError::resolution(
                    TEXTURE_STAGE_TYPE,
                    "no texture coordinate source",
                ))
            }
        }
        Ok(())
    }

    fn add_fragment_invocations(
        &self,
        set: &mut ProgramSet,
        r: &Resolved,
    ) -> Result<(), BuildError> {
        let group = group_order::PS_TEXTURING + self.unit as i32;
        let main = set.fragment_program_mut()?.entry_point_mut()?;

        for (source, internal) in [(r.diffuse, 1), (r.specular, 2)] {
            if let Some(ColourSource {
                id,
                fallback: Some(fill),
            }) = source
            {
                main.add_atom_instance(
                    FunctionInvocation::new(FFP_FUNC_CONSTRUCT, group, internal)
                        .with(Operand::literal(fill))
                        .with(Operand::literal(fill))
                        .with(Operand::literal(fill))
                        .with(Operand::literal(fill))
                        .with(Operand::output(id)),
                );
            }
        }

        let sample_callee = match (self.calc_method, self.texture_type) {
            (TexCoordCalcMethod::Projective, _) => FFP_FUNC_SAMPLE_TEXTURE_PROJ_2D,
            (_, TextureType::Tex1D) => FFP_FUNC_SAMPLE_TEXTURE_1D,
            (_, TextureType::Tex2D) => FFP_FUNC_SAMPLE_TEXTURE_2D,
            (_, TextureType::Tex3D) => FFP_FUNC_SAMPLE_TEXTURE_3D,
            (_, TextureType::Cube) => FFP_FUNC_SAMPLE_TEXTURE_CUBE,
        };
        main.add_atom_instance(
            FunctionInvocation::new(sample_callee, group, 10)
                .with(Operand::input(r.sampler))
                .with(Operand::input(r.ps_texcoord).masked(r.coord_mask))
                .with(Operand::output(r.texel)),
        );

        if self.colour_blend == self.alpha_blend {
            for atom in self.blend_invocations(r, &self.colour_blend, Mask::all(), group, 20)? {
                main.add_atom_instance(atom);
            }
        } else {
            for atom in self.blend_invocations(r, &self.colour_blend, Mask::XYZ, group, 20)? {
                main.add_atom_instance(atom);
            }
            for atom in self.blend_invocations(r, &self.alpha_blend, Mask::W, group, 30)? {
                main.add_atom_instance(atom);
            }
        }
        Ok(())
    }

    /// Argument selection plus the blend itself for one channel group.
    fn blend_invocations(
        &self,
        r: &Resolved,
        blend: &LayerBlendMode,
        mask: Mask,
        group: i32,
        internal: i32,
    ) -> Result<Vec<FunctionInvocation>, BuildError> {
        let mut atoms = Vec::with_capacity(3);
        let arguments = [
            (blend.source1, blend.colour_arg1, blend.alpha_arg1, r.source1),
            (blend.source2, blend.colour_arg2, blend.alpha_arg2, r.source2),
        ];
        for (i, (source, colour, alpha, local)) in arguments.into_iter().enumerate() {
            let atom = FunctionInvocation::new(FFP_FUNC_CONSTRUCT, group, internal + i as i32);
            let atom = match source {
                LayerBlendSource::Manual => {
                    let literals: Vec<f32> = if mask == Mask::W {
                        vec![alpha]
                    } else if mask == Mask::XYZ {
                        colour[..3].to_vec()
                    } else {
                        vec![colour[0], colour[1], colour[2], alpha]
                    };
                    literals
                        .into_iter()
                        .fold(atom, |atom, v| atom.with(Operand::literal(v)))
                }
                _ => FunctionInvocation::new(FFP_FUNC_ASSIGN, group, internal + i as i32)
                    .with(Operand::input(self.source_parameter(r, source)?).masked(mask)),
            };
            atoms.push(atom.with(Operand::output(local).masked(mask)));
        }

        let s1 = Operand::input(r.source1).masked(mask);
        let s2 = Operand::input(r.source2).masked(mask);
        let binary = |name: &str| {
            FunctionInvocation::new(name, group, internal + 2)
                .with(s1)
                .with(s2)
        };
        let lerp = |factor: Operand| {
            FunctionInvocation::new(FFP_FUNC_LERP, group, internal + 2)
                .with(s2)
                .with(s1)
                .with(factor)
        };
        let diffuse = || {
            r.diffuse.map(|d| d.id).ok_or_else(|| {
                BuildError::resolution(TEXTURE_STAGE_TYPE, "blend reads an unresolved diffuse")
            })
        };

        use LayerBlendOperation as Op;
        let blend_atom = match blend.operation {
            Op::Source1 => FunctionInvocation::new(FFP_FUNC_ASSIGN, group, internal + 2).with(s1),
            Op::Source2 => FunctionInvocation::new(FFP_FUNC_ASSIGN, group, internal + 2).with(s2),
            Op::Modulate => binary(FFP_FUNC_MODULATE),
            Op::ModulateX2 => binary(FFP_FUNC_MODULATE_X2),
            Op::ModulateX4 => binary(FFP_FUNC_MODULATE_X4),
            Op::Add => binary(FFP_FUNC_ADD),
            Op::AddSigned => binary(FFP_FUNC_ADD_SIGNED),
            Op::AddSmooth => binary(FFP_FUNC_ADD_SMOOTH),
            Op::Subtract => binary(FFP_FUNC_SUBTRACT),
            Op::DotProduct => binary(FFP_FUNC_DOT_PRODUCT),
            Op::BlendDiffuseAlpha => lerp(Operand::input(diffuse()?).masked(Mask::W)),
            Op::BlendTextureAlpha => lerp(Operand::input(r.texel).masked(Mask::W)),
            Op::BlendCurrentAlpha => lerp(Operand::input(r.current).masked(Mask::W)),
            Op::BlendManual => lerp(Operand::literal(blend.factor)),
            Op::BlendDiffuseColour => lerp(Operand::input(diffuse()?).masked(mask)),
        };
        atoms.push(blend_atom.with(Operand::output(r.current).masked(mask)));
        Ok(atoms)
    }

    fn source_parameter(
        &self,
        r: &Resolved,
        source: LayerBlendSource,
    ) -> Result<ParameterId, BuildError> {
        let missing = |what: &str| {
            BuildError::resolution(TEXTURE_STAGE_TYPE, format!("blend reads an unresolved {what}"))
        };
        match source {
            LayerBlendSource::Current => Ok(r.current),
            LayerBlendSource::Texture => Ok(r.texel),
            LayerBlendSource::Diffuse => r.diffuse.map(|d| d.id).ok_or_else(|| missing("diffuse")),
            LayerBlendSource::Specular => {
                r.specular.map(|s| s.id).ok_or_else(|| missing("specular"))
            }
            LayerBlendSource::Manual => Err(missing("manual argument")),
        }
    }

    /// Projective units need the projector frustum every draw.
    pub(super) fn update_gpu_programs_params(&self, params: &mut GpuProgramParameters) {
        if let Some(projector) = &self.projector {
            let view_proj = mul(&projector.projection, &projector.view);
            params.set_named_constant(
                format!("{TEX_VIEW_PROJ_NAME}{}", self.unit),
                ConstantValue::Matrix4(mul(&CLIP_SPACE_TO_IMAGE_SPACE, &view_proj)),
            );
        }
    }
}

fn resolve_auto_if(
    program: &mut Program,
    used: bool,
    kind: AutoConstantKind,
) -> Result<Option<ParameterId>, IrError> {
    if used {
        program.resolve_auto_parameter_int(kind, 0).map(Some)
    } else {
        Ok(None)
    }
}

fn with_inputs(ids: &[Option<ParameterId>], mut atom: FunctionInvocation) -> FunctionInvocation {
    for id in ids.iter().flatten() {
        atom.push_operand(Operand::input(*id));
    }
    atom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::IDENTITY;

    fn stage(unit: u32, state: TextureUnitState) -> FfpTextureStage {
        FfpTextureStage::new(unit, &state)
    }

    fn fragment_callees(set: &ProgramSet) -> Vec<String> {
        set.fragment_program()
            .unwrap()
            .entry_point()
            .unwrap()
            .atom_instances()
            .iter()
            .filter_map(|a| a.as_invocation())
            .map(|i| i.function_name().to_string())
            .collect()
    }

    #[test]
    fn default_unit_samples_and_modulates() {
        let mut s = stage(0, TextureUnitState::default());
        let mut set = ProgramSet::new();
        s.resolve_parameters(&mut set).unwrap();
        s.add_function_invocations(&mut set).unwrap();
        assert_eq!(
            fragment_callees(&set),
            [
                FFP_FUNC_SAMPLE_TEXTURE_2D,
                FFP_FUNC_ASSIGN,
                FFP_FUNC_ASSIGN,
                FFP_FUNC_MODULATE
            ]
        );
        let ps = set.fragment_program().unwrap();
        assert_eq!(ps.samplers().count(), 1);
        assert_eq!(ps.samplers().next().unwrap().name(), "texture_sampler0");
    }

    #[test]
    fn unit_beyond_limit_fails_resolution() {
        let mut s = stage(MAX_TEXTURE_UNITS, TextureUnitState::default());
        let err = s.resolve_parameters(&mut ProgramSet::new()).unwrap_err();
        assert!(matches!(err, BuildError::Resolution { .. }));
    }

    #[test]
    fn scroll_effect_needs_texture_matrix() {
        let s = stage(
            1,
            TextureUnitState {
                effects: vec![TextureEffect::UScroll],
                ..TextureUnitState::default()
            },
        );
        assert!(s.needs_texture_matrix());

        let mut transformed = TextureUnitState::default();
        transformed.transform[3][0] = 0.5;
        assert!(stage(0, transformed).needs_texture_matrix());
        assert!(!stage(0, TextureUnitState::default()).needs_texture_matrix());
    }

    #[test]
    fn separate_alpha_blend_adds_alpha_pass() {
        let mut s = stage(
            0,
            TextureUnitState {
                alpha_blend: LayerBlendMode::new(
                    LayerBlendOperation::Source1,
                    LayerBlendSource::Texture,
                    LayerBlendSource::Current,
                ),
                ..TextureUnitState::default()
            },
        );
        let mut set = ProgramSet::new();
        s.resolve_parameters(&mut set).unwrap();
        s.add_function_invocations(&mut set).unwrap();
        // Sample, then colour (3 atoms) and alpha (3 atoms).
        assert_eq!(fragment_callees(&set).len(), 7);
    }

    #[test]
    fn diffuse_blends_request_diffuse_input() {
        let s = stage(
            0,
            TextureUnitState {
                colour_blend: LayerBlendMode::new(
                    LayerBlendOperation::BlendDiffuseAlpha,
                    LayerBlendSource::Texture,
                    LayerBlendSource::Current,
                ),
                ..TextureUnitState::default()
            },
        );
        assert!(s
            .colour_requirements()
            .contains(ColourStageFlags::PS_INPUT_DIFFUSE));
    }

    #[test]
    fn projector_matrix_is_pushed_per_draw() {
        let s = stage(
            2,
            TextureUnitState {
                effects: vec![TextureEffect::ProjectiveTexture(Projector {
                    view: IDENTITY,
                    projection: IDENTITY,
                })],
                ..TextureUnitState::default()
            },
        );
        assert_eq!(s.calc_method(), TexCoordCalcMethod::Projective);
        let mut params = GpuProgramParameters::default();
        s.update_gpu_programs_params(&mut params);
        assert_eq!(
            params.named_constant("tex_view_proj_image_matrix2"),
            Some(&ConstantValue::Matrix4(CLIP_SPACE_TO_IMAGE_SPACE))
        );
    }
}
