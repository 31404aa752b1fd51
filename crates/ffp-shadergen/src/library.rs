//! Names shared by the feature components (which reference them) and the writers (which embed or
//! expand them).

pub const FFP_LIB_COMMON: &str = "FFPLib_Common";
pub const FFP_LIB_LIGHTING: &str = "FFPLib_Lighting";
/// Vertex-stage texture coordinate generation.
pub const FFP_LIB_TEXTURING: &str = "FFPLib_Texturing";
/// Fragment-stage sampling; kept apart so vertex programs never pull in implicit-lod samples.
pub const FFP_LIB_SAMPLING: &str = "FFPLib_Sampling";
pub const FFP_LIB_FOG: &str = "FFPLib_Fog";

// Generic operations rendered inline by the writers.
pub const FFP_FUNC_ASSIGN: &str = "ffp_assign";
pub const FFP_FUNC_CONSTRUCT: &str = "ffp_construct";
pub const FFP_FUNC_MODULATE: &str = "ffp_modulate";
pub const FFP_FUNC_MODULATE_X2: &str = "ffp_modulate_x2";
pub const FFP_FUNC_MODULATE_X4: &str = "ffp_modulate_x4";
pub const FFP_FUNC_ADD: &str = "ffp_add";
pub const FFP_FUNC_ADD_SIGNED: &str = "ffp_add_signed";
pub const FFP_FUNC_ADD_SMOOTH: &str = "ffp_add_smooth";
pub const FFP_FUNC_SUBTRACT: &str = "ffp_subtract";
pub const FFP_FUNC_LERP: &str = "ffp_lerp";
pub const FFP_FUNC_DOT_PRODUCT: &str = "ffp_dot_product";
pub const FFP_FUNC_TRANSFORM: &str = "ffp_transform";

// FFPLib_Lighting
pub const FFP_FUNC_LIGHT_DIRECTIONAL_DIFFUSE: &str = "ffp_light_directional_diffuse";
pub const FFP_FUNC_LIGHT_DIRECTIONAL_SPECULAR: &str = "ffp_light_directional_specular";
pub const FFP_FUNC_LIGHT_POINT_DIFFUSE: &str = "ffp_light_point_diffuse";
pub const FFP_FUNC_LIGHT_POINT_SPECULAR: &str = "ffp_light_point_specular";
pub const FFP_FUNC_LIGHT_SPOT_DIFFUSE: &str = "ffp_light_spot_diffuse";
pub const FFP_FUNC_LIGHT_SPOT_SPECULAR: &str = "ffp_light_spot_specular";

// FFPLib_Texturing
pub const FFP_FUNC_TRANSFORM_TEXCOORD_1: &str = "ffp_transform_texcoord_1";
pub const FFP_FUNC_TRANSFORM_TEXCOORD_2: &str = "ffp_transform_texcoord_2";
pub const FFP_FUNC_TRANSFORM_TEXCOORD_3: &str = "ffp_transform_texcoord_3";
pub const FFP_FUNC_GENERATE_TEXCOORD_ENV_SPHERE: &str = "ffp_generate_texcoord_env_sphere";
pub const FFP_FUNC_GENERATE_TEXCOORD_ENV_REFLECT: &str = "ffp_generate_texcoord_env_reflect";
pub const FFP_FUNC_GENERATE_TEXCOORD_ENV_NORMAL: &str = "ffp_generate_texcoord_env_normal";
pub const FFP_FUNC_GENERATE_TEXCOORD_PROJECTION: &str = "ffp_generate_texcoord_projection";

// FFPLib_Sampling
pub const FFP_FUNC_SAMPLE_TEXTURE_1D: &str = "ffp_sample_texture_1d";
pub const FFP_FUNC_SAMPLE_TEXTURE_2D: &str = "ffp_sample_texture_2d";
pub const FFP_FUNC_SAMPLE_TEXTURE_3D: &str = "ffp_sample_texture_3d";
pub const FFP_FUNC_SAMPLE_TEXTURE_CUBE: &str = "ffp_sample_texture_cube";
pub const FFP_FUNC_SAMPLE_TEXTURE_PROJ_2D: &str = "ffp_sample_texture_proj_2d";

// FFPLib_Fog
pub const FFP_FUNC_VERTEX_FOG_LINEAR: &str = "ffp_vertex_fog_linear";
pub const FFP_FUNC_VERTEX_FOG_EXP: &str = "ffp_vertex_fog_exp";
pub const FFP_FUNC_VERTEX_FOG_EXP2: &str = "ffp_vertex_fog_exp2";
