//! The service object the host talks to: factory registry, scheme bookkeeping and the
//! program manager, all behind one mutex.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::compiler::{NagaProgramCompiler, ProgramCompiler};
use crate::config::{LightCounts, ShaderGeneratorConfig, TargetLanguage};
use crate::error::{BuildError, GeneratorError};
use crate::factory::{builtin_factories, FeatureContext, SubRenderStateFactory};
use crate::features::SubRenderState;
use crate::host::{
    DrawContext, FogSettings, MaterialManager, Pass, PassState, SceneSettings, Technique,
};
use crate::program_manager::{ProgramManager, ProgramManagerStats};
use crate::render_state::RenderState;

/// Generates shader-based techniques for fixed-function materials.
pub struct ShaderGenerator {
    state: Mutex<GeneratorState>,
}

struct GeneratorState {
    factories: Vec<Arc<SubRenderStateFactory>>,
    scene: SceneSettings,
    max_light_count: LightCounts,
    schemes: HashMap<String, SchemeEntry>,
    program_manager: ProgramManager,
}

#[derive(Default)]
struct SchemeEntry {
    /// Features appended to every pass built in the scheme.
    render_state: RenderState,
    techniques: Vec<TechniqueEntry>,
}

struct TechniqueEntry {
    material: String,
    source_scheme: String,
    /// One slot per destination pass; `None` until the pass first builds.
    passes: Vec<Option<RenderState>>,
    built: bool,
}

impl std::fmt::Debug for ShaderGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ShaderGenerator")
            .field("factories", &state.factories)
            .field("schemes", &state.schemes.len())
            .field("program_manager", &state.program_manager)
            .finish()
    }
}

impl ShaderGenerator {
    /// Generator compiling through naga. Only WGSL output is accepted by that backend.
    pub fn new(config: ShaderGeneratorConfig) -> Self {
        Self::with_compiler(config, Arc::new(NagaProgramCompiler::new()))
    }

    pub fn with_compiler(
        config: ShaderGeneratorConfig,
        compiler: Arc<dyn ProgramCompiler>,
    ) -> Self {
        let max_light_count = config.max_light_count;
        Self {
            state: Mutex::new(GeneratorState {
                factories: builtin_factories().into_iter().map(Arc::new).collect(),
                scene: SceneSettings::default(),
                max_light_count,
                schemes: HashMap::new(),
                program_manager: ProgramManager::new(config, compiler),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GeneratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn target_language(&self) -> TargetLanguage {
        self.lock().program_manager.config().target_language
    }

    /// Switches the output language. Every scheme is invalidated; passes keep their current
    /// programs until they are revalidated.
    pub fn set_target_language(
        &self,
        language: TargetLanguage,
        vertex_profile: &str,
        fragment_profile: &str,
    ) {
        let mut state = self.lock();
        state
            .program_manager
            .set_target_language(language, vertex_profile, fragment_profile);
        state.invalidate_all();
    }

    pub fn set_shader_cache_path(&self, path: Option<PathBuf>) {
        self.lock().program_manager.set_shader_cache_path(path);
    }

    /// Applies to passes built after the call.
    pub fn set_max_light_count(&self, counts: LightCounts) {
        self.lock().max_light_count = counts;
    }

    /// Scene fog used by passes without their own. Only read when a pass is built.
    pub fn set_scene_fog(&self, fog: FogSettings) {
        self.lock().scene.fog = fog;
    }

    pub fn scene(&self) -> SceneSettings {
        self.lock().scene
    }

    pub fn add_sub_render_state_factory(
        &self,
        factory: SubRenderStateFactory,
    ) -> Result<(), GeneratorError> {
        let mut state = self.lock();
        if state.factory(factory.type_name()).is_some() {
            return Err(GeneratorError::DuplicateFactory(
                factory.type_name().to_string(),
            ));
        }
        debug!(type_name = factory.type_name(), "registered sub-render-state factory");
        state.factories.push(Arc::new(factory));
        Ok(())
    }

    pub fn remove_sub_render_state_factory(
        &self,
        type_name: &str,
    ) -> Result<Arc<SubRenderStateFactory>, GeneratorError> {
        let mut state = self.lock();
        let index = state
            .factories
            .iter()
            .position(|f| f.type_name() == type_name)
            .ok_or_else(|| GeneratorError::UnknownFactory(type_name.to_string()))?;
        Ok(state.factories.remove(index))
    }

    pub fn has_sub_render_state_factory(&self, type_name: &str) -> bool {
        self.lock().factory(type_name).is_some()
    }

    /// Live instances created through the factory for `type_name`.
    pub fn live_instance_count(&self, type_name: &str) -> Option<usize> {
        self.lock()
            .factory(type_name)
            .map(|f| f.live_instance_count())
    }

    /// Asks one factory for its instances. The caller owns the result and hands it back through
    /// [`ShaderGenerator::destroy_sub_render_state`].
    ///
    /// The factory runs without the generator lock held, so it may call back into the generator.
    pub fn create_sub_render_states(
        &self,
        type_name: &str,
        ctx: &mut FeatureContext<'_>,
    ) -> Result<Vec<SubRenderState>, GeneratorError> {
        let factory = self
            .lock()
            .factory(type_name)
            .cloned()
            .ok_or_else(|| GeneratorError::UnknownFactory(type_name.to_string()))?;
        Ok(factory.create_instances(ctx))
    }

    pub fn destroy_sub_render_state(
        &self,
        sub_state: SubRenderState,
    ) -> Result<(), GeneratorError> {
        let factory = self
            .lock()
            .factory(sub_state.type_name())
            .cloned()
            .ok_or_else(|| GeneratorError::UnknownFactory(sub_state.type_name().to_string()))?;
        factory.destroy_instance(sub_state);
        Ok(())
    }

    /// Adds a feature to every pass built in `scheme`, replacing factory-created features of the
    /// same type. The scheme owns the feature, counted as live, and is invalidated.
    pub fn add_scheme_sub_render_state(
        &self,
        scheme: &str,
        sub_state: SubRenderState,
    ) -> Result<(), GeneratorError> {
        let mut state = self.lock();
        let Some(factory) = state.factory(sub_state.type_name()) else {
            return Err(GeneratorError::UnknownFactory(
                sub_state.type_name().to_string(),
            ));
        };
        factory.track_instance();
        let entry = state.schemes.entry_ref(scheme).or_default();
        entry.render_state.add_sub_render_state(sub_state);
        entry.invalidate();
        Ok(())
    }

    /// Builds the RenderState a pass would get in `scheme` without compiling it.
    ///
    /// Its features count as live until given to [`ShaderGenerator::destroy_render_state`].
    pub fn build_render_state(
        &self,
        material: &str,
        scheme: &str,
        pass: &PassState,
    ) -> (RenderState, PassState) {
        let (factories, scene, max_light_count, scheme_state) = {
            let state = self.lock();
            let scheme_state = state
                .schemes
                .get(scheme)
                .map(|s| s.render_state.clone())
                .unwrap_or_default();
            (state.factories.clone(), state.scene, state.max_light_count, scheme_state)
        };
        let mut destination = pass.clone();
        let mut ctx = FeatureContext {
            material_name: material,
            source_pass: pass,
            destination_pass: &mut destination,
            scene: &scene,
            max_light_count,
        };
        let render_state = create_render_state(&factories, &mut ctx, &scheme_state);
        (render_state, destination)
    }

    pub fn destroy_render_state(&self, render_state: RenderState) {
        let factories = self.lock().factories.clone();
        destroy_render_state(&factories, render_state);
    }

    /// Clones the `source_scheme` technique of `material` into `destination_scheme`. Programs are
    /// built on the next validation of the destination scheme.
    ///
    /// Repeating an identical request is a no-op.
    pub fn create_shader_based_technique(
        &self,
        materials: &mut MaterialManager,
        material: &str,
        source_scheme: &str,
        destination_scheme: &str,
    ) -> Result<(), GeneratorError> {
        let mut state = self.lock();

        if let Some(existing) = state
            .schemes
            .get(destination_scheme)
            .and_then(|s| s.technique(material))
        {
            if existing.source_scheme == source_scheme {
                return Ok(());
            }
            return Err(GeneratorError::SchemeConflict {
                material: material.to_string(),
                destination: destination_scheme.to_string(),
                existing_source: existing.source_scheme.clone(),
                requested_source: source_scheme.to_string(),
            });
        }

        let target = materials
            .get_mut(material)
            .ok_or_else(|| GeneratorError::MaterialNotFound(material.to_string()))?;
        let source = target.technique(source_scheme).ok_or_else(|| {
            GeneratorError::SourceTechniqueNotFound {
                material: material.to_string(),
                scheme: source_scheme.to_string(),
            }
        })?;
        if source.passes.iter().any(|p| p.state.programmable) {
            return Err(GeneratorError::ProgrammableSourceTechnique {
                material: material.to_string(),
                scheme: source_scheme.to_string(),
            });
        }
        if target.technique(destination_scheme).is_some() {
            return Err(GeneratorError::DestinationTechniqueExists {
                material: material.to_string(),
                scheme: destination_scheme.to_string(),
            });
        }

        let passes: Vec<Pass> = source
            .passes
            .iter()
            .map(|p| Pass::new(p.state.clone()))
            .collect();
        let pass_count = passes.len();
        target.techniques.push(Technique {
            scheme: destination_scheme.to_string(),
            passes,
        });

        let entry = state.schemes.entry_ref(destination_scheme).or_default();
        entry.techniques.push(TechniqueEntry {
            material: material.to_string(),
            source_scheme: source_scheme.to_string(),
            passes: (0..pass_count).map(|_| None).collect(),
            built: false,
        });
        debug!(
            material,
            source_scheme, destination_scheme, "created shader-based technique"
        );
        Ok(())
    }

    pub fn has_shader_based_technique(
        &self,
        material: &str,
        source_scheme: &str,
        destination_scheme: &str,
    ) -> bool {
        self.lock()
            .schemes
            .get(destination_scheme)
            .and_then(|s| s.technique(material))
            .is_some_and(|t| t.source_scheme == source_scheme)
    }

    /// Removes a generated technique from the material and destroys its features.
    pub fn remove_shader_based_technique(
        &self,
        materials: &mut MaterialManager,
        material: &str,
        source_scheme: &str,
        destination_scheme: &str,
    ) -> Result<(), GeneratorError> {
        let mut state = self.lock();
        let GeneratorState {
            factories, schemes, ..
        } = &mut *state;
        let not_generated = || GeneratorError::TechniqueNotGenerated {
            material: material.to_string(),
            scheme: destination_scheme.to_string(),
        };
        let entry = schemes.get_mut(destination_scheme).ok_or_else(not_generated)?;
        let index = entry
            .techniques
            .iter()
            .position(|t| t.material == material && t.source_scheme == source_scheme)
            .ok_or_else(not_generated)?;
        let technique = entry.techniques.remove(index);
        destroy_technique(factories, technique);

        if let Some(target) = materials.get_mut(material) {
            target.techniques.retain(|t| t.scheme != destination_scheme);
        }
        Ok(())
    }

    /// Removes every generated technique and scheme-wide feature.
    pub fn remove_all_shader_based_techniques(&self, materials: &mut MaterialManager) {
        let mut state = self.lock();
        let GeneratorState {
            factories, schemes, ..
        } = &mut *state;
        for (scheme, entry) in schemes.drain() {
            for technique in entry.techniques {
                if let Some(target) = materials.get_mut(&technique.material) {
                    target.techniques.retain(|t| t.scheme != scheme);
                }
                destroy_technique(factories, technique);
            }
            destroy_render_state(factories, entry.render_state);
        }
    }

    pub fn is_scheme_valid(&self, scheme: &str) -> bool {
        self.lock()
            .schemes
            .get(scheme)
            .map_or(true, SchemeEntry::is_valid)
    }

    /// Builds every technique of `scheme` that is not built yet.
    ///
    /// A failing pass keeps whatever programs it had and leaves the scheme invalid; the other
    /// passes are still built. The first failure is returned.
    pub fn validate_scheme(
        &self,
        materials: &mut MaterialManager,
        scheme: &str,
    ) -> Result<(), GeneratorError> {
        self.lock().validate(materials, scheme, None)
    }

    pub fn validate_material(
        &self,
        materials: &mut MaterialManager,
        scheme: &str,
        material: &str,
    ) -> Result<(), GeneratorError> {
        self.lock().validate(materials, scheme, Some(material))
    }

    pub fn invalidate_scheme(&self, scheme: &str) {
        if let Some(entry) = self.lock().schemes.get_mut(scheme) {
            entry.invalidate();
        }
    }

    pub fn invalidate_material(&self, scheme: &str, material: &str) {
        if let Some(technique) = self
            .lock()
            .schemes
            .get_mut(scheme)
            .and_then(|s| s.technique_mut(material))
        {
            technique.built = false;
        }
    }

    /// Pushes per-draw constants into every generated pass of `material` in `scheme`.
    pub fn update_pass_parameters(
        &self,
        materials: &mut MaterialManager,
        material: &str,
        scheme: &str,
        ctx: &DrawContext<'_>,
    ) -> Result<(), GeneratorError> {
        let state = self.lock();
        let not_generated = || GeneratorError::TechniqueNotGenerated {
            material: material.to_string(),
            scheme: scheme.to_string(),
        };
        let entry = state
            .schemes
            .get(scheme)
            .and_then(|s| s.technique(material))
            .ok_or_else(not_generated)?;
        let technique = materials
            .get_mut(material)
            .ok_or_else(|| GeneratorError::MaterialNotFound(material.to_string()))?
            .technique_mut(scheme)
            .ok_or_else(not_generated)?;

        for (pass, render_state) in technique.passes.iter_mut().zip(&entry.passes) {
            if let Some(render_state) = render_state {
                render_state.update_gpu_programs_params(&pass.state, &mut pass.parameters, ctx);
            }
        }
        Ok(())
    }

    /// Copy of the RenderState last built for a pass.
    pub fn render_state(
        &self,
        scheme: &str,
        material: &str,
        pass_index: usize,
    ) -> Option<RenderState> {
        self.lock()
            .schemes
            .get(scheme)?
            .technique(material)?
            .passes
            .get(pass_index)?
            .clone()
    }

    pub fn program_manager_stats(&self) -> ProgramManagerStats {
        self.lock().program_manager.stats()
    }

    /// Removes all generated techniques and drops every cached program.
    pub fn shutdown(&self, materials: &mut MaterialManager) {
        self.remove_all_shader_based_techniques(materials);
        self.lock().program_manager.clear();
    }
}

impl GeneratorState {
    fn factory(&self, type_name: &str) -> Option<&Arc<SubRenderStateFactory>> {
        factory(&self.factories, type_name)
    }

    fn invalidate_all(&mut self) {
        for entry in self.schemes.values_mut() {
            entry.invalidate();
        }
    }

    fn validate(
        &mut self,
        materials: &mut MaterialManager,
        scheme: &str,
        only_material: Option<&str>,
    ) -> Result<(), GeneratorError> {
        let GeneratorState {
            factories,
            scene,
            max_light_count,
            schemes,
            program_manager,
        } = self;
        let Some(entry) = schemes.get_mut(scheme) else {
            return Ok(());
        };
        let SchemeEntry {
            render_state: scheme_state,
            techniques,
        } = entry;

        let mut first_error = None;
        for technique in techniques.iter_mut() {
            if technique.built || only_material.is_some_and(|m| m != technique.material) {
                continue;
            }
            let mut builder = PassBuilder {
                factories: factories.as_slice(),
                scene: &*scene,
                max_light_count: *max_light_count,
                program_manager: &mut *program_manager,
                scheme_state: &*scheme_state,
            };
            if let Err(err) = builder.build_technique(materials, scheme, technique) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl SchemeEntry {
    fn technique(&self, material: &str) -> Option<&TechniqueEntry> {
        self.techniques.iter().find(|t| t.material == material)
    }

    fn technique_mut(&mut self, material: &str) -> Option<&mut TechniqueEntry> {
        self.techniques.iter_mut().find(|t| t.material == material)
    }

    fn is_valid(&self) -> bool {
        self.techniques.iter().all(|t| t.built)
    }

    fn invalidate(&mut self) {
        for technique in &mut self.techniques {
            technique.built = false;
        }
    }
}

struct PassBuilder<'a> {
    factories: &'a [Arc<SubRenderStateFactory>],
    scene: &'a SceneSettings,
    max_light_count: LightCounts,
    program_manager: &'a mut ProgramManager,
    scheme_state: &'a RenderState,
}

impl PassBuilder<'_> {
    fn build_technique(
        &mut self,
        materials: &mut MaterialManager,
        scheme: &str,
        technique: &mut TechniqueEntry,
    ) -> Result<(), BuildError> {
        let Some(material) = materials.get_mut(&technique.material) else {
            warn!(
                material = %technique.material,
                scheme,
                "material disappeared; technique skipped"
            );
            return Ok(());
        };
        let Some(sources) = material
            .technique(&technique.source_scheme)
            .map(|t| t.passes.iter().map(|p| p.state.clone()).collect::<Vec<_>>())
        else {
            warn!(
                material = %technique.material,
                scheme = %technique.source_scheme,
                "source technique disappeared; technique skipped"
            );
            return Ok(());
        };
        let Some(destination) = material.technique_mut(scheme) else {
            warn!(material = %technique.material, scheme, "generated technique disappeared");
            return Ok(());
        };

        technique.passes.resize_with(sources.len(), || None);
        let mut first_error = None;
        for (index, (source, pass)) in sources.iter().zip(&mut destination.passes).enumerate() {
            match self.build_pass(&technique.material, source, pass) {
                Ok(render_state) => {
                    if let Some(previous) = technique.passes[index].replace(render_state) {
                        destroy_render_state(self.factories, previous);
                    }
                }
                Err(err) => {
                    warn!(
                        material = %technique.material,
                        scheme,
                        pass = index,
                        %err,
                        "pass keeps its previous programs"
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                technique.built = true;
                debug!(material = %technique.material, scheme, "technique built");
                Ok(())
            }
        }
    }

    fn build_pass(
        &mut self,
        material: &str,
        source: &PassState,
        pass: &mut Pass,
    ) -> Result<RenderState, BuildError> {
        let mut destination = source.clone();
        let mut ctx = FeatureContext {
            material_name: material,
            source_pass: source,
            destination_pass: &mut destination,
            scene: self.scene,
            max_light_count: self.max_light_count,
        };
        let mut render_state = create_render_state(self.factories, &mut ctx, self.scheme_state);

        match self
            .program_manager
            .acquire_gpu_programs(pass, &mut render_state)
        {
            Ok(()) => {
                pass.state = destination;
                pass.parameters.clear();
                Ok(render_state)
            }
            Err(err) => {
                destroy_render_state(self.factories, render_state);
                Err(err)
            }
        }
    }
}

fn factory<'a>(
    factories: &'a [Arc<SubRenderStateFactory>],
    type_name: &str,
) -> Option<&'a Arc<SubRenderStateFactory>> {
    factories.iter().find(|f| f.type_name() == type_name)
}

/// Every factory's contribution for the pass, then the scheme-wide features on top.
fn create_render_state(
    factories: &[Arc<SubRenderStateFactory>],
    ctx: &mut FeatureContext<'_>,
    scheme_state: &RenderState,
) -> RenderState {
    let mut render_state = RenderState::new();
    for factory in factories {
        for sub_state in factory.create_instances(ctx) {
            render_state.add_sub_render_state(sub_state);
        }
    }

    for scheme_sub_state in scheme_state.sub_render_states() {
        for replaced in render_state.remove_sub_render_state(scheme_sub_state.type_name()) {
            destroy_sub_state(factories, replaced);
        }
    }
    for scheme_sub_state in scheme_state.sub_render_states() {
        if let Some(factory) = factory(factories, scheme_sub_state.type_name()) {
            factory.track_instance();
        }
    }
    render_state.append(scheme_state);
    render_state
}

fn destroy_sub_state(factories: &[Arc<SubRenderStateFactory>], sub_state: SubRenderState) {
    match factory(factories, sub_state.type_name()) {
        Some(factory) => factory.destroy_instance(sub_state),
        None => debug!(
            type_name = sub_state.type_name(),
            "factory removed before its instance; dropping"
        ),
    }
}

fn destroy_render_state(factories: &[Arc<SubRenderStateFactory>], render_state: RenderState) {
    for sub_state in render_state.into_sub_render_states() {
        destroy_sub_state(factories, sub_state);
    }
}

fn destroy_technique(factories: &[Arc<SubRenderStateFactory>], technique: TechniqueEntry) {
    for render_state in technique.passes.into_iter().flatten() {
        destroy_render_state(factories, render_state);
    }
}
