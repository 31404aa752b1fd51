use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    Wgsl,
    Glsl,
}

impl TargetLanguage {
    /// Profile used when the configuration leaves it empty.
    pub fn default_profile(self) -> &'static str {
        match self {
            TargetLanguage::Wgsl => "wgsl",
            TargetLanguage::Glsl => "330 core",
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetLanguage::Wgsl => "wgsl",
            TargetLanguage::Glsl => "glsl",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown target language `{0}`")]
pub struct UnknownTargetLanguage(pub String);

impl FromStr for TargetLanguage {
    type Err = UnknownTargetLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgsl" => Ok(TargetLanguage::Wgsl),
            "glsl" => Ok(TargetLanguage::Glsl),
            _ => Err(UnknownTargetLanguage(s.to_string())),
        }
    }
}

/// Upper bound on lights of each type a generated lighting stage handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCounts {
    pub point: u32,
    pub directional: u32,
    pub spot: u32,
}

impl Default for LightCounts {
    fn default() -> Self {
        Self {
            point: 0,
            directional: 1,
            spot: 0,
        }
    }
}

impl LightCounts {
    pub fn total(&self) -> u32 {
        self.point + self.directional + self.spot
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShaderGeneratorConfig {
    pub target_language: TargetLanguage,
    pub vertex_shader_profile: String,
    pub fragment_shader_profile: String,
    /// Directory for generated sources. `None` disables the on-disk cache.
    pub shader_cache_path: Option<PathBuf>,
    pub max_light_count: LightCounts,
}

impl Default for ShaderGeneratorConfig {
    fn default() -> Self {
        let target_language = TargetLanguage::default();
        Self {
            target_language,
            vertex_shader_profile: target_language.default_profile().to_string(),
            fragment_shader_profile: target_language.default_profile().to_string(),
            shader_cache_path: None,
            max_light_count: LightCounts::default(),
        }
    }
}

impl ShaderGeneratorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(json)?;
        config.fill_default_profiles();
        Ok(config)
    }

    pub(crate) fn profile(&self, stage: crate::ir::ShaderStage) -> &str {
        match stage {
            crate::ir::ShaderStage::Vertex => &self.vertex_shader_profile,
            crate::ir::ShaderStage::Fragment => &self.fragment_shader_profile,
        }
    }

    /// Replaces empty profiles, and profiles belonging to a different language, with the
    /// target language's default.
    pub(crate) fn fill_default_profiles(&mut self) {
        let fallback = self.target_language.default_profile();
        for profile in [
            &mut self.vertex_shader_profile,
            &mut self.fragment_shader_profile,
        ] {
            let foreign = [TargetLanguage::Wgsl, TargetLanguage::Glsl]
                .iter()
                .any(|lang| *lang != self.target_language && profile == lang.default_profile());
            if profile.is_empty() || foreign {
                *profile = fallback.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_camel_case_and_defaults_missing_fields() {
        let config = ShaderGeneratorConfig::from_json(
            r#"{ "targetLanguage": "glsl", "maxLightCount": { "point": 2 } }"#,
        )
        .unwrap();
        assert_eq!(config.target_language, TargetLanguage::Glsl);
        assert_eq!(config.vertex_shader_profile, "330 core");
        assert_eq!(config.max_light_count.point, 2);
        assert_eq!(config.max_light_count.directional, 1);
        assert!(config.shader_cache_path.is_none());
    }

    #[test]
    fn target_language_parses_case_insensitively() {
        assert_eq!("WGSL".parse::<TargetLanguage>().unwrap(), TargetLanguage::Wgsl);
        assert!("hlsl".parse::<TargetLanguage>().is_err());
    }
}
