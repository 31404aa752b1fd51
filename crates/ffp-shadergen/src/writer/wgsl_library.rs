use crate::library::{
    FFP_LIB_COMMON, FFP_LIB_FOG, FFP_LIB_LIGHTING, FFP_LIB_SAMPLING, FFP_LIB_TEXTURING,
};

pub(super) fn source(library: &str) -> Option<&'static str> {
    match library {
        FFP_LIB_COMMON => Some(COMMON),
        FFP_LIB_LIGHTING => Some(LIGHTING),
        FFP_LIB_TEXTURING => Some(TEXTURING),
        FFP_LIB_SAMPLING => Some(SAMPLING),
        FFP_LIB_FOG => Some(FOG),
        _ => None,
    }
}

const COMMON: &str = r#"fn ffp_normal_to_view(m: mat4x4<f32>, normal: vec3<f32>) -> vec3<f32> {
    return normalize((m * vec4<f32>(normal, 0.0)).xyz);
}
"#;

// Light directions are the direction of the rays (view space); the Lambert term uses -light_dir.
// Attenuation is (range, constant, linear, quadratic); spot is (cos inner/2, cos outer/2, falloff).
const LIGHTING: &str = r#"fn ffp_light_attenuation(atten: vec4<f32>, dist: f32) -> f32 {
    let falloff = atten.y + atten.z * dist + atten.w * dist * dist;
    return select(0.0, 1.0 / max(falloff, 0.0001), dist <= atten.x);
}

fn ffp_spot_factor(light_vec: vec3<f32>, light_dir: vec3<f32>, spot: vec3<f32>) -> f32 {
    let rho = dot(light_vec, -light_dir);
    let t = clamp((rho - spot.y) / max(spot.x - spot.y, 0.0001), 0.0, 1.0);
    return pow(t, spot.z);
}

fn ffp_specular_term(n: vec3<f32>, view_pos: vec3<f32>, light_vec: vec3<f32>, shininess: f32) -> f32 {
    let half_vec = normalize(normalize(-view_pos) + light_vec);
    let n_dot_h = clamp(dot(n, half_vec), 0.0, 1.0);
    return select(0.0, pow(n_dot_h, shininess), dot(n, light_vec) > 0.0);
}

fn ffp_light_directional_diffuse(wv_it: mat4x4<f32>, normal: vec3<f32>, light_dir: vec3<f32>, diffuse: vec3<f32>, acc: vec3<f32>) -> vec3<f32> {
    let n = ffp_normal_to_view(wv_it, normal);
    return acc + diffuse * clamp(dot(n, -light_dir), 0.0, 1.0);
}

fn ffp_light_directional_specular(wv: mat4x4<f32>, pos: vec4<f32>, wv_it: mat4x4<f32>, normal: vec3<f32>, light_dir: vec3<f32>, specular: vec3<f32>, shininess: f32, acc: vec3<f32>) -> vec3<f32> {
    let n = ffp_normal_to_view(wv_it, normal);
    let view_pos = (wv * pos).xyz;
    return acc + specular * ffp_specular_term(n, view_pos, -light_dir, shininess);
}

fn ffp_light_point_diffuse(wv: mat4x4<f32>, pos: vec4<f32>, wv_it: mat4x4<f32>, normal: vec3<f32>, light_pos: vec3<f32>, atten: vec4<f32>, diffuse: vec3<f32>, acc: vec3<f32>) -> vec3<f32> {
    let to_light = light_pos - (wv * pos).xyz;
    let dist = length(to_light);
    let light_vec = to_light / max(dist, 0.0001);
    let n = ffp_normal_to_view(wv_it, normal);
    return acc + diffuse * clamp(dot(n, light_vec), 0.0, 1.0) * ffp_light_attenuation(atten, dist);
}

fn ffp_light_point_specular(wv: mat4x4<f32>, pos: vec4<f32>, wv_it: mat4x4<f32>, normal: vec3<f32>, light_pos: vec3<f32>, atten: vec4<f32>, specular: vec3<f32>, shininess: f32, acc: vec3<f32>) -> vec3<f32> {
    let view_pos = (wv * pos).xyz;
    let to_light = light_pos - view_pos;
    let dist = length(to_light);
    let light_vec = to_light / max(dist, 0.0001);
    let n = ffp_normal_to_view(wv_it, normal);
    return acc + specular * ffp_specular_term(n, view_pos, light_vec, shininess) * ffp_light_attenuation(atten, dist);
}

fn ffp_light_spot_diffuse(wv: mat4x4<f32>, pos: vec4<f32>, wv_it: mat4x4<f32>, normal: vec3<f32>, light_pos: vec3<f32>, light_dir: vec3<f32>, atten: vec4<f32>, spot: vec3<f32>, diffuse: vec3<f32>, acc: vec3<f32>) -> vec3<f32> {
    let to_light = light_pos - (wv * pos).xyz;
    let dist = length(to_light);
    let light_vec = to_light / max(dist, 0.0001);
    let n = ffp_normal_to_view(wv_it, normal);
    let factor = ffp_light_attenuation(atten, dist) * ffp_spot_factor(light_vec, light_dir, spot);
    return acc + diffuse * clamp(dot(n, light_vec), 0.0, 1.0) * factor;
}

fn ffp_light_spot_specular(wv: mat4x4<f32>, pos: vec4<f32>, wv_it: mat4x4<f32>, normal: vec3<f32>, light_pos: vec3<f32>, light_dir: vec3<f32>, atten: vec4<f32>, spot: vec3<f32>, specular: vec3<f32>, shininess: f32, acc: vec3<f32>) -> vec3<f32> {
    let view_pos = (wv * pos).xyz;
    let to_light = light_pos - view_pos;
    let dist = length(to_light);
    let light_vec = to_light / max(dist, 0.0001);
    let n = ffp_normal_to_view(wv_it, normal);
    let factor = ffp_light_attenuation(atten, dist) * ffp_spot_factor(light_vec, light_dir, spot);
    return acc + specular * ffp_specular_term(n, view_pos, light_vec, shininess) * factor;
}
"#;

const TEXTURING: &str = r#"fn ffp_transform_texcoord_1(m: mat4x4<f32>, tc: f32) -> f32 {
    return (m * vec4<f32>(tc, 0.0, 0.0, 1.0)).x;
}

fn ffp_transform_texcoord_2(m: mat4x4<f32>, tc: vec2<f32>) -> vec2<f32> {
    return (m * vec4<f32>(tc, 0.0, 1.0)).xy;
}

fn ffp_transform_texcoord_3(m: mat4x4<f32>, tc: vec3<f32>) -> vec3<f32> {
    return (m * vec4<f32>(tc, 1.0)).xyz;
}

fn ffp_generate_texcoord_env_sphere(world_it: mat4x4<f32>, view: mat4x4<f32>, normal: vec3<f32>) -> vec2<f32> {
    let n = normalize((view * (world_it * vec4<f32>(normal, 0.0))).xyz);
    return vec2<f32>(n.x * 0.5 + 0.5, -n.y * 0.5 + 0.5);
}

fn ffp_generate_texcoord_env_reflect(world: mat4x4<f32>, world_it: mat4x4<f32>, view: mat4x4<f32>, normal: vec3<f32>, pos: vec4<f32>) -> vec3<f32> {
    let view_pos = normalize((view * (world * pos)).xyz);
    let n = normalize((view * (world_it * vec4<f32>(normal, 0.0))).xyz);
    let r = reflect(view_pos, n);
    return vec3<f32>(r.x, r.y, -r.z);
}

fn ffp_generate_texcoord_env_normal(world_it: mat4x4<f32>, view: mat4x4<f32>, normal: vec3<f32>) -> vec3<f32> {
    return normalize((view * (world_it * vec4<f32>(normal, 0.0))).xyz);
}

fn ffp_generate_texcoord_projection(world: mat4x4<f32>, tex_view_proj: mat4x4<f32>, pos: vec4<f32>) -> vec3<f32> {
    let p = tex_view_proj * (world * pos);
    return vec3<f32>(p.x, p.y, p.w);
}
"#;

const SAMPLING: &str = r#"fn ffp_sample_texture_1d(tex: texture_1d<f32>, samp: sampler, uv: f32) -> vec4<f32> {
    return textureSample(tex, samp, uv);
}

fn ffp_sample_texture_2d(tex: texture_2d<f32>, samp: sampler, uv: vec2<f32>) -> vec4<f32> {
    return textureSample(tex, samp, uv);
}

fn ffp_sample_texture_3d(tex: texture_3d<f32>, samp: sampler, uvw: vec3<f32>) -> vec4<f32> {
    return textureSample(tex, samp, uvw);
}

fn ffp_sample_texture_cube(tex: texture_cube<f32>, samp: sampler, dir: vec3<f32>) -> vec4<f32> {
    return textureSample(tex, samp, dir);
}

fn ffp_sample_texture_proj_2d(tex: texture_2d<f32>, samp: sampler, uvw: vec3<f32>) -> vec4<f32> {
    return textureSample(tex, samp, uvw.xy / uvw.z);
}
"#;

// Fog params are (density, start, end, 1 / (end - start)).
const FOG: &str = r#"fn ffp_fog_depth(wvp: mat4x4<f32>, pos: vec4<f32>) -> f32 {
    return abs((wvp * pos).w);
}

fn ffp_vertex_fog_linear(wvp: mat4x4<f32>, pos: vec4<f32>, params: vec4<f32>) -> f32 {
    let depth = ffp_fog_depth(wvp, pos);
    return clamp((params.z - depth) * params.w, 0.0, 1.0);
}

fn ffp_vertex_fog_exp(wvp: mat4x4<f32>, pos: vec4<f32>, params: vec4<f32>) -> f32 {
    let depth = ffp_fog_depth(wvp, pos);
    return clamp(1.0 / exp(depth * params.x), 0.0, 1.0);
}

fn ffp_vertex_fog_exp2(wvp: mat4x4<f32>, pos: vec4<f32>, params: vec4<f32>) -> f32 {
    let d = ffp_fog_depth(wvp, pos) * params.x;
    return clamp(1.0 / exp(d * d), 0.0, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn libraries_parse_as_wgsl() {
        // Lighting and texturing helpers call into the common library.
        for library in [FFP_LIB_LIGHTING, FFP_LIB_TEXTURING, FFP_LIB_SAMPLING, FFP_LIB_FOG] {
            let wgsl = format!("{COMMON}\n{}", source(library).unwrap());
            let module = naga::front::wgsl::parse_str(&wgsl)
                .unwrap_or_else(|err| panic!("{library} WGSL parse failed: {err}"));
            naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::all(),
            )
            .validate(&module)
            .unwrap_or_else(|err| panic!("{library} WGSL validation failed: {err:?}"));
        }
    }
}
