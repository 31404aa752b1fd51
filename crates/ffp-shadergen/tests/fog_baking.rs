use ffp_shadergen::config::ShaderGeneratorConfig;
use ffp_shadergen::host::{
    DrawContext, FogMode, FogSettings, Material, MaterialManager, PassState,
};
use ffp_shadergen::math::IDENTITY;
use ffp_shadergen::ShaderGenerator;
use pretty_assertions::assert_eq;

const MATERIAL: &str = "foggy";
const SCHEME: &str = "rtss";

fn exp_fog() -> FogSettings {
    FogSettings {
        mode: FogMode::Exp,
        colour: [0.25, 0.5, 0.75, 1.0],
        start: 0.0,
        end: 1.0,
        density: 0.5,
    }
}

fn setup() -> (ShaderGenerator, MaterialManager) {
    let generator = ShaderGenerator::new(ShaderGeneratorConfig::default());
    generator.set_scene_fog(exp_fog());

    let mut materials = MaterialManager::new();
    materials.insert(Material::new(MATERIAL).with_technique(
        "",
        vec![PassState {
            lighting_enabled: false,
            ..PassState::default()
        }],
    ));
    generator
        .create_shader_based_technique(&mut materials, MATERIAL, "", SCHEME)
        .unwrap();
    generator.validate_scheme(&mut materials, SCHEME).unwrap();
    (generator, materials)
}

fn vertex_source(materials: &MaterialManager) -> String {
    materials
        .get(MATERIAL)
        .unwrap()
        .technique(SCHEME)
        .unwrap()
        .passes[0]
        .vertex_program
        .as_ref()
        .expect("vertex program bound")
        .source
        .clone()
}

fn baked_fog_params(generator: &ShaderGenerator) -> [f32; 4] {
    let rs = generator.render_state(SCHEME, MATERIAL, 0).unwrap();
    rs.sub_render_states()
        .iter()
        .find_map(|s| s.as_fog())
        .expect("fog feature")
        .fog_params()
}

#[test]
fn scene_fog_is_baked_at_build_time() {
    let (generator, mut materials) = setup();

    assert_eq!(baked_fog_params(&generator), [0.5, 0.0, 1.0, 1.0]);
    let source = vertex_source(&materials);
    assert!(source.contains("0.5, 0.0, 1.0, 1.0"), "{source}");
    assert!(source.contains("ffp_vertex_fog_exp("), "{source}");

    generator.set_scene_fog(FogSettings {
        mode: FogMode::Linear,
        density: 0.125,
        start: 5.0,
        end: 50.0,
        ..exp_fog()
    });
    generator
        .update_pass_parameters(
            &mut materials,
            MATERIAL,
            SCHEME,
            &DrawContext {
                lights: &[],
                view_matrix: IDENTITY,
            },
        )
        .unwrap();
    generator.validate_scheme(&mut materials, SCHEME).unwrap();

    assert_eq!(baked_fog_params(&generator), [0.5, 0.0, 1.0, 1.0]);
    assert_eq!(vertex_source(&materials), source);
}

#[test]
fn revalidation_picks_up_new_scene_fog() {
    let (generator, mut materials) = setup();
    let before = vertex_source(&materials);

    generator.set_scene_fog(FogSettings {
        mode: FogMode::Linear,
        start: 5.0,
        end: 45.0,
        ..exp_fog()
    });
    generator.invalidate_scheme(SCHEME);
    generator.validate_scheme(&mut materials, SCHEME).unwrap();

    assert_eq!(baked_fog_params(&generator), [0.5, 5.0, 45.0, 0.025]);
    let after = vertex_source(&materials);
    assert_ne!(before, after);
    assert!(after.contains("ffp_vertex_fog_linear("), "{after}");
}

#[test]
fn generated_pass_has_fixed_function_fog_disabled() {
    let (_generator, materials) = setup();
    let pass = &materials
        .get(MATERIAL)
        .unwrap()
        .technique(SCHEME)
        .unwrap()
        .passes[0];
    assert!(pass.state.fog_override);
    assert_eq!(pass.state.fog.mode, FogMode::None);

    let source_pass = &materials.get(MATERIAL).unwrap().technique("").unwrap().passes[0];
    assert_eq!(source_pass.state.fog.mode, FogMode::None);
    assert!(!source_pass.state.fog_override);
}
