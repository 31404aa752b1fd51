use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::config::LightCounts;
use crate::features::{
    ColourStageFlags, FfpColour, FfpFog, FfpLighting, FfpTextureStage, FfpTransform,
    SubRenderState, COLOUR_TYPE, FOG_TYPE, LIGHTING_TYPE, TEXTURE_STAGE_TYPE, TRANSFORM_TYPE,
};
use crate::host::{PassState, SceneSettings, TextureBinding};

/// What a factory sees when asked to contribute to a pass.
pub struct FeatureContext<'a> {
    pub material_name: &'a str,
    pub source_pass: &'a PassState,
    /// Copy of the source pass that ends up on the generated technique. Factories may adjust
    /// fixed-function state here (fog is disabled once it is generated).
    pub destination_pass: &'a mut PassState,
    pub scene: &'a SceneSettings,
    pub max_light_count: LightCounts,
}

type CreateFn = dyn Fn(&mut FeatureContext<'_>) -> Vec<SubRenderState> + Send + Sync;
type DestroyFn = dyn Fn(SubRenderState) + Send + Sync;

/// Type name plus constructor/destructor closures for one feature type.
pub struct SubRenderStateFactory {
    type_name: String,
    create: Box<CreateFn>,
    destroy: Option<Box<DestroyFn>>,
    live: AtomicUsize,
}

impl fmt::Debug for SubRenderStateFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubRenderStateFactory")
            .field("type_name", &self.type_name)
            .field("live", &self.live_instance_count())
            .finish_non_exhaustive()
    }
}

impl SubRenderStateFactory {
    pub fn new<F>(type_name: impl Into<String>, create: F) -> Self
    where
        F: Fn(&mut FeatureContext<'_>) -> Vec<SubRenderState> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            create: Box::new(create),
            destroy: None,
            live: AtomicUsize::new(0),
        }
    }

    /// Hook run on every instance this factory destroys.
    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(SubRenderState) + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(destroy));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Instances this factory contributes to a pass; empty when the feature does not apply.
    pub fn create_instances(&self, ctx: &mut FeatureContext<'_>) -> Vec<SubRenderState> {
        let instances = (self.create)(ctx);
        self.live.fetch_add(instances.len(), Ordering::Relaxed);
        instances
    }

    /// Counts an instance created outside [`SubRenderStateFactory::create_instances`], such as a
    /// scheme-wide copy.
    pub fn track_instance(&self) {
        self.live.fetch_add(1, Ordering::Relaxed);
    }

    pub fn destroy_instance(&self, state: SubRenderState) {
        if state.type_name() != self.type_name {
            warn!(
                factory = %self.type_name,
                instance = state.type_name(),
                "destroying an instance through a foreign factory"
            );
        }
        let counted = self
            .live
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        if counted.is_err() {
            warn!(
                factory = %self.type_name,
                "destroyed an instance this factory never counted as live"
            );
        }
        if let Some(destroy) = &self.destroy {
            destroy(state);
        }
    }

    pub fn live_instance_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

/// Factories for the fixed-function features, in the order they are consulted.
pub fn builtin_factories() -> Vec<SubRenderStateFactory> {
    vec![
        SubRenderStateFactory::new(TRANSFORM_TYPE, |_| vec![FfpTransform::new().into()]),
        SubRenderStateFactory::new(COLOUR_TYPE, |ctx| {
            let mut flags = ColourStageFlags::VS_OUTPUT_DIFFUSE
                | ColourStageFlags::PS_INPUT_DIFFUSE
                | ColourStageFlags::PS_OUTPUT_DIFFUSE;
            if !ctx.source_pass.lighting_enabled {
                flags |= ColourStageFlags::VS_INPUT_DIFFUSE;
            }
            vec![FfpColour::new(flags).into()]
        }),
        SubRenderStateFactory::new(LIGHTING_TYPE, |ctx| {
            FfpLighting::for_pass(ctx.material_name, ctx.source_pass, ctx.max_light_count)
                .map(SubRenderState::from)
                .into_iter()
                .collect()
        }),
        SubRenderStateFactory::new(TEXTURE_STAGE_TYPE, |ctx| {
            ctx.source_pass
                .texture_units
                .iter()
                .enumerate()
                .filter_map(|(unit, state)| {
                    if state.binding == TextureBinding::Vertex {
                        warn!(
                            material = ctx.material_name,
                            unit,
                            "vertex texture fetch is not supported; texture unit skipped"
                        );
                        return None;
                    }
                    Some(FfpTextureStage::new(unit as u32, state).into())
                })
                .collect()
        }),
        SubRenderStateFactory::new(FOG_TYPE, |ctx| {
            FfpFog::for_pass(ctx.source_pass, ctx.scene, ctx.destination_pass)
                .map(SubRenderState::from)
                .into_iter()
                .collect()
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TextureUnitState;

    fn create(factory: &SubRenderStateFactory, pass: &PassState) -> Vec<SubRenderState> {
        let mut destination = pass.clone();
        let scene = SceneSettings::default();
        let mut ctx = FeatureContext {
            material_name: "test",
            source_pass: pass,
            destination_pass: &mut destination,
            scene: &scene,
            max_light_count: LightCounts::default(),
        };
        factory.create_instances(&mut ctx)
    }

    fn factory(type_name: &str) -> SubRenderStateFactory {
        builtin_factories()
            .into_iter()
            .find(|f| f.type_name() == type_name)
            .unwrap()
    }

    #[test]
    fn texture_stage_factory_skips_vertex_units() {
        let pass = PassState {
            texture_units: vec![
                TextureUnitState::default(),
                TextureUnitState {
                    binding: TextureBinding::Vertex,
                    ..TextureUnitState::default()
                },
                TextureUnitState::default(),
            ],
            ..PassState::default()
        };
        let textures = factory(TEXTURE_STAGE_TYPE);
        let units: Vec<u32> = create(&textures, &pass)
            .iter()
            .filter_map(|s| s.as_texture_stage().map(|t| t.unit()))
            .collect();
        assert_eq!(units, [0, 2]);
        assert_eq!(textures.live_instance_count(), 2);
    }

    #[test]
    fn destroy_decrements_live_count() {
        let transform = factory(TRANSFORM_TYPE);
        let mut created = create(&transform, &PassState::default());
        assert_eq!(transform.live_instance_count(), 1);
        transform.destroy_instance(created.remove(0));
        assert_eq!(transform.live_instance_count(), 0);
    }

    #[test]
    fn destroying_an_uncounted_instance_keeps_the_count_at_zero() {
        let transform = factory(TRANSFORM_TYPE);
        transform.destroy_instance(FfpTransform::new().into());
        assert_eq!(transform.live_instance_count(), 0);

        let created = create(&transform, &PassState::default());
        assert_eq!(transform.live_instance_count(), 1);
        for state in created {
            transform.destroy_instance(state);
        }
        assert_eq!(transform.live_instance_count(), 0);
    }

    #[test]
    fn unlit_colour_reads_vertex_diffuse() {
        let pass = PassState {
            lighting_enabled: false,
            ..PassState::default()
        };
        let states = create(&factory(COLOUR_TYPE), &pass);
        let flags = states[0].as_colour().unwrap().resolve_stage_flags();
        assert!(flags.contains(ColourStageFlags::VS_INPUT_DIFFUSE));
    }
}
