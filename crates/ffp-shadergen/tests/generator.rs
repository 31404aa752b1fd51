use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use ffp_shadergen::compiler::{CompileError, GpuProgramDesc, GpuProgramHandle, ProgramCompiler};
use ffp_shadergen::config::{LightCounts, ShaderGeneratorConfig};
use ffp_shadergen::features::{
    FfpFog, COLOUR_TYPE, FOG_TYPE, LIGHTING_TYPE, TEXTURE_STAGE_TYPE, TRANSFORM_TYPE,
};
use ffp_shadergen::host::{
    ConstantValue, DrawContext, FogMode, FogSettings, Light, Material, MaterialManager,
    PassState, TextureUnitState,
};
use ffp_shadergen::math::IDENTITY;
use ffp_shadergen::{FeatureContext, GeneratorError, ShaderGenerator, SubRenderStateFactory};

#[derive(Default)]
struct SwitchableCompiler {
    fail: AtomicBool,
}

impl ProgramCompiler for SwitchableCompiler {
    fn compile(&self, desc: &GpuProgramDesc<'_>) -> Result<GpuProgramHandle, CompileError> {
        if self.fail.load(Ordering::Relaxed) {
            Err(CompileError::new(desc, "backend unavailable"))
        } else {
            Ok(GpuProgramHandle(7))
        }
    }
}

fn generator() -> (ShaderGenerator, Arc<SwitchableCompiler>) {
    let compiler = Arc::new(SwitchableCompiler::default());
    let generator =
        ShaderGenerator::with_compiler(ShaderGeneratorConfig::default(), compiler.clone());
    (generator, compiler)
}

fn materials() -> MaterialManager {
    let mut materials = MaterialManager::new();
    materials.insert(Material::new("rock").with_technique(
        "",
        vec![
            PassState::default(),
            PassState {
                lighting_enabled: false,
                texture_units: vec![TextureUnitState::default()],
                ..PassState::default()
            },
        ],
    ));
    materials
}

#[test]
fn technique_creation_errors() {
    let (generator, _) = generator();
    let mut materials = materials();
    materials.insert(Material::new("scripted").with_technique(
        "",
        vec![PassState {
            programmable: true,
            ..PassState::default()
        }],
    ));
    materials.insert(
        Material::new("taken")
            .with_technique("", vec![PassState::default()])
            .with_technique("rtss", vec![PassState::default()]),
    );

    assert!(matches!(
        generator.create_shader_based_technique(&mut materials, "missing", "", "rtss"),
        Err(GeneratorError::MaterialNotFound(_))
    ));
    assert!(matches!(
        generator.create_shader_based_technique(&mut materials, "rock", "hq", "rtss"),
        Err(GeneratorError::SourceTechniqueNotFound { .. })
    ));
    assert!(matches!(
        generator.create_shader_based_technique(&mut materials, "scripted", "", "rtss"),
        Err(GeneratorError::ProgrammableSourceTechnique { .. })
    ));
    assert!(matches!(
        generator.create_shader_based_technique(&mut materials, "taken", "", "rtss"),
        Err(GeneratorError::DestinationTechniqueExists { .. })
    ));

    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    assert!(matches!(
        generator.create_shader_based_technique(&mut materials, "rock", "other", "rtss"),
        Err(GeneratorError::SchemeConflict { .. })
    ));
    assert!(generator.has_shader_based_technique("rock", "", "rtss"));
    assert!(!generator.has_shader_based_technique("rock", "other", "rtss"));
}

#[test]
fn validation_binds_programs_on_every_pass() {
    let (generator, _) = generator();
    let mut materials = materials();
    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    assert!(!generator.is_scheme_valid("rtss"));

    generator.validate_scheme(&mut materials, "rtss").unwrap();

    assert!(generator.is_scheme_valid("rtss"));
    let technique = materials.get("rock").unwrap().technique("rtss").unwrap();
    assert_eq!(technique.passes.len(), 2);
    assert!(technique.passes.iter().all(|p| p.has_programs()));
    assert!(materials
        .get("rock")
        .unwrap()
        .technique("")
        .unwrap()
        .passes
        .iter()
        .all(|p| !p.has_programs()));
    let stats = generator.program_manager_stats();
    assert_eq!(stats.misses, 2);
}

#[test]
fn failed_build_keeps_previous_programs_and_retries() {
    let (generator, compiler) = generator();
    let mut materials = materials();
    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    generator.validate_scheme(&mut materials, "rtss").unwrap();
    let before = materials.get("rock").unwrap().technique("rtss").unwrap().passes[0]
        .vertex_program
        .clone()
        .unwrap();

    compiler.fail.store(true, Ordering::Relaxed);
    generator.set_scene_fog(FogSettings {
        mode: FogMode::Exp2,
        ..FogSettings::default()
    });
    generator.invalidate_material("rtss", "rock");
    let err = generator
        .validate_material(&mut materials, "rtss", "rock")
        .unwrap_err();
    assert!(matches!(err, GeneratorError::Build(_)), "{err}");
    assert!(!generator.is_scheme_valid("rtss"));

    let pass = &materials.get("rock").unwrap().technique("rtss").unwrap().passes[0];
    assert!(Arc::ptr_eq(pass.vertex_program.as_ref().unwrap(), &before));
    assert_eq!(pass.state.fog.mode, FogMode::None);

    compiler.fail.store(false, Ordering::Relaxed);
    generator.validate_scheme(&mut materials, "rtss").unwrap();
    assert!(generator.is_scheme_valid("rtss"));
    let pass = &materials.get("rock").unwrap().technique("rtss").unwrap().passes[0];
    assert!(!Arc::ptr_eq(pass.vertex_program.as_ref().unwrap(), &before));
}

#[test]
fn removal_destroys_every_instance() {
    let (generator, _) = generator();
    let mut materials = materials();
    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    generator.validate_scheme(&mut materials, "rtss").unwrap();
    assert_eq!(generator.live_instance_count(TRANSFORM_TYPE), Some(2));
    assert_eq!(generator.live_instance_count(TEXTURE_STAGE_TYPE), Some(1));
    assert_eq!(generator.live_instance_count(LIGHTING_TYPE), Some(1));

    generator
        .remove_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();

    for type_name in [TRANSFORM_TYPE, COLOUR_TYPE, LIGHTING_TYPE, TEXTURE_STAGE_TYPE, FOG_TYPE] {
        assert_eq!(generator.live_instance_count(type_name), Some(0), "{type_name}");
    }
    assert!(materials.get("rock").unwrap().technique("rtss").is_none());
    assert!(matches!(
        generator.remove_shader_based_technique(&mut materials, "rock", "", "rtss"),
        Err(GeneratorError::TechniqueNotGenerated { .. })
    ));
}

#[test]
fn scheme_wide_features_apply_to_every_pass() {
    let (generator, _) = generator();
    let mut materials = materials();
    let fog = FfpFog::new(FogSettings {
        mode: FogMode::Linear,
        start: 2.0,
        end: 4.0,
        ..FogSettings::default()
    })
    .unwrap();
    generator
        .add_scheme_sub_render_state("rtss", fog.into())
        .unwrap();
    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    generator.validate_scheme(&mut materials, "rtss").unwrap();

    for index in 0..2 {
        let rs = generator.render_state("rtss", "rock", index).unwrap();
        let fog = rs
            .sub_render_states()
            .iter()
            .find_map(|s| s.as_fog())
            .expect("scheme fog");
        assert_eq!(fog.fog_params(), [0.001, 2.0, 4.0, 0.5]);
    }

    generator.remove_all_shader_based_techniques(&mut materials);
    assert_eq!(generator.live_instance_count(FOG_TYPE), Some(0));
    assert!(materials.get("rock").unwrap().technique("rtss").is_none());
}

#[test]
fn resolution_failure_keeps_previous_programs() {
    let (generator, _) = generator();
    let mut materials = materials();
    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    generator.validate_scheme(&mut materials, "rtss").unwrap();
    let pass = &materials.get("rock").unwrap().technique("rtss").unwrap().passes[1];
    let vertex = pass.vertex_program.clone().unwrap();
    let fragment = pass.fragment_program.clone().unwrap();

    let source = &mut materials
        .get_mut("rock")
        .unwrap()
        .technique_mut("")
        .unwrap()
        .passes[1];
    source.state.texture_units = vec![TextureUnitState::default(); 9];
    generator.invalidate_material("rtss", "rock");

    let err = generator
        .validate_material(&mut materials, "rtss", "rock")
        .unwrap_err();
    assert!(matches!(err, GeneratorError::Build(_)), "{err}");
    assert!(!generator.is_scheme_valid("rtss"));

    let pass = &materials.get("rock").unwrap().technique("rtss").unwrap().passes[1];
    assert!(Arc::ptr_eq(pass.vertex_program.as_ref().unwrap(), &vertex));
    assert!(Arc::ptr_eq(pass.fragment_program.as_ref().unwrap(), &fragment));
    assert_eq!(pass.state.texture_units.len(), 1);
}

#[test]
fn factories_may_call_back_into_the_generator() {
    let (generator, _) = generator();
    let generator = Arc::new(generator);
    let slot: Arc<OnceLock<Weak<ShaderGenerator>>> = Arc::default();

    let seen = slot.clone();
    let factory = SubRenderStateFactory::new("Custom_Lookup", move |_| {
        let generator = seen.get().and_then(Weak::upgrade).unwrap();
        assert!(generator.has_sub_render_state_factory(TRANSFORM_TYPE));
        Vec::new()
    });
    generator.add_sub_render_state_factory(factory).unwrap();
    slot.set(Arc::downgrade(&generator)).unwrap();

    let source = PassState::default();
    let mut destination = source.clone();
    let scene = generator.scene();
    let mut ctx = FeatureContext {
        material_name: "rock",
        source_pass: &source,
        destination_pass: &mut destination,
        scene: &scene,
        max_light_count: LightCounts::default(),
    };
    let created = generator
        .create_sub_render_states("Custom_Lookup", &mut ctx)
        .unwrap();
    assert!(created.is_empty());

    let (rs, _) = generator.build_render_state("rock", "rtss", &source);
    generator.destroy_render_state(rs);
}

#[test]
fn custom_factories_register_and_unregister() {
    let (generator, _) = generator();
    let factory = SubRenderStateFactory::new("Custom_Fog", |_| {
        FfpFog::new(FogSettings {
            mode: FogMode::Exp,
            ..FogSettings::default()
        })
        .into_iter()
        .map(Into::into)
        .collect()
    });
    generator.add_sub_render_state_factory(factory).unwrap();
    assert!(generator.has_sub_render_state_factory("Custom_Fog"));

    let removed = generator
        .remove_sub_render_state_factory("Custom_Fog")
        .unwrap();
    assert_eq!(removed.type_name(), "Custom_Fog");
    assert!(matches!(
        generator.remove_sub_render_state_factory("Custom_Fog"),
        Err(GeneratorError::UnknownFactory(_))
    ));
}

#[test]
fn removing_a_builtin_factory_drops_its_feature() {
    let (generator, _) = generator();
    generator.remove_sub_render_state_factory(LIGHTING_TYPE).unwrap();
    let (rs, _) = generator.build_render_state("rock", "rtss", &PassState::default());
    assert!(rs.sub_render_states().iter().all(|s| s.as_lighting().is_none()));
    generator.destroy_render_state(rs);
}

#[test]
fn per_draw_parameters_reach_the_pass() {
    let (generator, _) = generator();
    generator.set_max_light_count(LightCounts {
        point: 1,
        directional: 1,
        spot: 0,
    });
    let mut materials = materials();
    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    generator.validate_scheme(&mut materials, "rtss").unwrap();

    let lights = [Light::directional([0.0, -1.0, 0.0], [1.0, 0.5, 0.25, 1.0])];
    generator
        .update_pass_parameters(
            &mut materials,
            "rock",
            "rtss",
            &DrawContext {
                lights: &lights,
                view_matrix: IDENTITY,
            },
        )
        .unwrap();

    let params = &materials.get("rock").unwrap().technique("rtss").unwrap().passes[0].parameters;
    // Slot 0 is the point light, which has no match and is blanked.
    assert_eq!(
        params.named_constant("light_diffuse0"),
        Some(&ConstantValue::Float4([0.0; 4]))
    );
    assert_eq!(
        params.named_constant("light_diffuse1"),
        Some(&ConstantValue::Float4([1.0, 0.5, 0.25, 1.0]))
    );
    assert_eq!(
        params.named_constant("light_direction_view_space1"),
        Some(&ConstantValue::Float4([0.0, -1.0, 0.0, 0.0]))
    );

    assert!(matches!(
        generator.update_pass_parameters(
            &mut materials,
            "rock",
            "other",
            &DrawContext {
                lights: &lights,
                view_matrix: IDENTITY,
            },
        ),
        Err(GeneratorError::TechniqueNotGenerated { .. })
    ));
}

#[test]
fn shutdown_releases_everything() {
    let (generator, _) = generator();
    let mut materials = materials();
    generator
        .create_shader_based_technique(&mut materials, "rock", "", "rtss")
        .unwrap();
    generator.validate_scheme(&mut materials, "rtss").unwrap();

    generator.shutdown(&mut materials);

    assert!(!generator.has_shader_based_technique("rock", "", "rtss"));
    assert_eq!(generator.live_instance_count(COLOUR_TYPE), Some(0));
    assert!(materials.get("rock").unwrap().technique("rtss").is_none());
}

#[test]
fn json_configuration_drives_the_generator() -> anyhow::Result<()> {
    let config = ShaderGeneratorConfig::from_json(
        r#"{ "maxLightCount": { "point": 2, "directional": 0 } }"#,
    )?;
    let generator =
        ShaderGenerator::with_compiler(config, Arc::new(SwitchableCompiler::default()));
    let (rs, _) = generator.build_render_state("rock", "rtss", &PassState::default());
    let lighting = rs
        .sub_render_states()
        .iter()
        .find_map(|s| s.as_lighting())
        .ok_or_else(|| anyhow::anyhow!("no lighting feature"))?;
    assert_eq!(
        lighting.light_counts(),
        LightCounts {
            point: 2,
            directional: 0,
            spot: 0,
        }
    );
    generator.destroy_render_state(rs);
    Ok(())
}
