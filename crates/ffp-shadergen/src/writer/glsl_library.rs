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

const COMMON: &str = r#"vec3 ffp_normal_to_view(mat4 m, vec3 normal) {
    return normalize((m * vec4(normal, 0.0)).xyz);
}
"#;

const LIGHTING: &str = r#"float ffp_light_attenuation(vec4 atten, float dist) {
    float falloff = atten.y + atten.z * dist + atten.w * dist * dist;
    return dist <= atten.x ? 1.0 / max(falloff, 0.0001) : 0.0;
}

float ffp_spot_factor(vec3 light_vec, vec3 light_dir, vec3 spot) {
    float rho = dot(light_vec, -light_dir);
    float t = clamp((rho - spot.y) / max(spot.x - spot.y, 0.0001), 0.0, 1.0);
    return pow(t, spot.z);
}

float ffp_specular_term(vec3 n, vec3 view_pos, vec3 light_vec, float shininess) {
    vec3 half_vec = normalize(normalize(-view_pos) + light_vec);
    float n_dot_h = clamp(dot(n, half_vec), 0.0, 1.0);
    return dot(n, light_vec) > 0.0 ? pow(n_dot_h, shininess) : 0.0;
}

vec3 ffp_light_directional_diffuse(mat4 wv_it, vec3 normal, vec3 light_dir, vec3 diffuse, vec3 acc) {
    vec3 n = ffp_normal_to_view(wv_it, normal);
    return acc + diffuse * clamp(dot(n, -light_dir), 0.0, 1.0);
}

vec3 ffp_light_directional_specular(mat4 wv, vec4 pos, mat4 wv_it, vec3 normal, vec3 light_dir, vec3 specular, float shininess, vec3 acc) {
    vec3 n = ffp_normal_to_view(wv_it, normal);
    vec3 view_pos = (wv * pos).xyz;
    return acc + specular * ffp_specular_term(n, view_pos, -light_dir, shininess);
}

vec3 ffp_light_point_diffuse(mat4 wv, vec4 pos, mat4 wv_it, vec3 normal, vec3 light_pos, vec4 atten, vec3 diffuse, vec3 acc) {
    vec3 to_light = light_pos - (wv * pos).xyz;
    float dist = length(to_light);
    vec3 light_vec = to_light / max(dist, 0.0001);
    vec3 n = ffp_normal_to_view(wv_it, normal);
    return acc + diffuse * clamp(dot(n, light_vec), 0.0, 1.0) * ffp_light_attenuation(atten, dist);
}

vec3 ffp_light_point_specular(mat4 wv, vec4 pos, mat4 wv_it, vec3 normal, vec3 light_pos, vec4 atten, vec3 specular, float shininess, vec3 acc) {
    vec3 view_pos = (wv * pos).xyz;
    vec3 to_light = light_pos - view_pos;
    float dist = length(to_light);
    vec3 light_vec = to_light / max(dist, 0.0001);
    vec3 n = ffp_normal_to_view(wv_it, normal);
    return acc + specular * ffp_specular_term(n, view_pos, light_vec, shininess) * ffp_light_attenuation(atten, dist);
}

vec3 ffp_light_spot_diffuse(mat4 wv, vec4 pos, mat4 wv_it, vec3 normal, vec3 light_pos, vec3 light_dir, vec4 atten, vec3 spot, vec3 diffuse, vec3 acc) {
    vec3 to_light = light_pos - (wv * pos).xyz;
    float dist = length(to_light);
    vec3 light_vec = to_light / max(dist, 0.0001);
    vec3 n = ffp_normal_to_view(wv_it, normal);
    float factor = ffp_light_attenuation(atten, dist) * ffp_spot_factor(light_vec, light_dir, spot);
    return acc + diffuse * clamp(dot(n, light_vec), 0.0, 1.0) * factor;
}

vec3 ffp_light_spot_specular(mat4 wv, vec4 pos, mat4 wv_it, vec3 normal, vec3 light_pos, vec3 light_dir, vec4 atten, vec3 spot, vec3 specular, float shininess, vec3 acc) {
    vec3 view_pos = (wv * pos).xyz;
    vec3 to_light = light_pos - view_pos;
    float dist = length(to_light);
    vec3 light_vec = to_light / max(dist, 0.0001);
    vec3 n = ffp_normal_to_view(wv_it, normal);
    float factor = ffp_light_attenuation(atten, dist) * ffp_spot_factor(light_vec, light_dir, spot);
    return acc + specular * ffp_specular_term(n, view_pos, light_vec, shininess) * factor;
}
"#;

const TEXTURING: &str = r#"float ffp_transform_texcoord_1(mat4 m, float tc) {
    return (m * vec4(tc, 0.0, 0.0, 1.0)).x;
}

vec2 ffp_transform_texcoord_2(mat4 m, vec2 tc) {
    return (m * vec4(tc, 0.0, 1.0)).xy;
}

vec3 ffp_transform_texcoord_3(mat4 m, vec3 tc) {
    return (m * vec4(tc, 1.0)).xyz;
}

vec2 ffp_generate_texcoord_env_sphere(mat4 world_it, mat4 view, vec3 normal) {
    vec3 n = normalize((view * (world_it * vec4(normal, 0.0))).xyz);
    return vec2(n.x * 0.5 + 0.5, -n.y * 0.5 + 0.5);
}

vec3 ffp_generate_texcoord_env_reflect(mat4 world, mat4 world_it, mat4 view, vec3 normal, vec4 pos) {
    vec3 view_pos = normalize((view * (world * pos)).xyz);
    vec3 n = normalize((view * (world_it * vec4(normal, 0.0))).xyz);
    vec3 r = reflect(view_pos, n);
    return vec3(r.x, r.y, -r.z);
}

vec3 ffp_generate_texcoord_env_normal(mat4 world_it, mat4 view, vec3 normal) {
    return normalize((view * (world_it * vec4(normal, 0.0))).xyz);
}

vec3 ffp_generate_texcoord_projection(mat4 world, mat4 tex_view_proj, vec4 pos) {
    vec4 p = tex_view_proj * (world * pos);
    return vec3(p.x, p.y, p.w);
}
"#;

const SAMPLING: &str = r#"vec4 ffp_sample_texture_1d(sampler1D tex, float uv) {
    return texture(tex, uv);
}

vec4 ffp_sample_texture_2d(sampler2D tex, vec2 uv) {
    return texture(tex, uv);
}

vec4 ffp_sample_texture_3d(sampler3D tex, vec3 uvw) {
    return texture(tex, uvw);
}

vec4 ffp_sample_texture_cube(samplerCube tex, vec3 dir) {
    return texture(tex, dir);
}

vec4 ffp_sample_texture_proj_2d(sampler2D tex, vec3 uvw) {
    return textureProj(tex, uvw);
}
"#;

const FOG: &str = r#"float ffp_fog_depth(mat4 wvp, vec4 pos) {
    return abs((wvp * pos).w);
}

float ffp_vertex_fog_linear(mat4 wvp, vec4 pos, vec4 params) {
    float depth = ffp_fog_depth(wvp, pos);
    return clamp((params.z - depth) * params.w, 0.0, 1.0);
}

float ffp_vertex_fog_exp(mat4 wvp, vec4 pos, vec4 params) {
    float depth = ffp_fog_depth(wvp, pos);
    return clamp(1.0 / exp(depth * params.x), 0.0, 1.0);
}

float ffp_vertex_fog_exp2(mat4 wvp, vec4 pos, vec4 params) {
    float d = ffp_fog_depth(wvp, pos) * params.x;
    return clamp(1.0 / exp(d * d), 0.0, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_library_has_a_glsl_source() {
        for library in [
            FFP_LIB_COMMON,
            FFP_LIB_LIGHTING,
            FFP_LIB_TEXTURING,
            FFP_LIB_SAMPLING,
            FFP_LIB_FOG,
        ] {
            let source = source(library).unwrap();
            assert!(source.contains("ffp_"), "{library} is empty");
        }
        assert!(source("FFPLib_Unknown").is_none());
    }
}
