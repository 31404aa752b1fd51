//! Build cache: RenderState hash to compiled [`ProgramSet`], plus a name-keyed registry of
//! compiled programs shared between sets.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, error, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::compiler::{GpuProgram, GpuProgramDesc, ProgramCompiler};
use crate::config::{ShaderGeneratorConfig, TargetLanguage};
use crate::error::BuildError;
use crate::host::Pass;
use crate::ir::{Program, ProgramSet, ShaderStage};
use crate::render_state::RenderState;
use crate::writer::{create_writer, ProgramWriter};

/// Snapshot of cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgramManagerStats {
    pub hits: u64,
    pub misses: u64,
    pub programs_compiled: u64,
    pub programs_reused: u64,
    pub build_failures: u64,
}

pub struct ProgramManager {
    config: ShaderGeneratorConfig,
    writers: HashMap<TargetLanguage, Box<dyn ProgramWriter>>,
    compiler: Arc<dyn ProgramCompiler>,
    program_sets: HashMap<u32, Arc<ProgramSet>>,
    programs: HashMap<String, Arc<GpuProgram>>,
    stats: ProgramManagerStats,
}

impl std::fmt::Debug for ProgramManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramManager")
            .field("config", &self.config)
            .field("program_sets", &self.program_sets.len())
            .field("programs", &self.programs.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ProgramManager {
    pub fn new(mut config: ShaderGeneratorConfig, compiler: Arc<dyn ProgramCompiler>) -> Self {
        config.fill_default_profiles();
        let writers = [TargetLanguage::Wgsl, TargetLanguage::Glsl]
            .into_iter()
            .map(|language| (language, create_writer(language)))
            .collect();
        Self {
            config,
            writers,
            compiler,
            program_sets: HashMap::new(),
            programs: HashMap::new(),
            stats: ProgramManagerStats::default(),
        }
    }

    pub fn config(&self) -> &ShaderGeneratorConfig {
        &self.config
    }

    /// Replaces the writer for its language.
    pub fn register_writer(&mut self, writer: Box<dyn ProgramWriter>) {
        self.writers.insert(writer.target_language(), writer);
    }

    /// Switches language and profiles. Everything compiled for the previous target is dropped.
    pub fn set_target_language(
        &mut self,
        language: TargetLanguage,
        vertex_profile: impl Into<String>,
        fragment_profile: impl Into<String>,
    ) {
        self.config.target_language = language;
        self.config.vertex_shader_profile = vertex_profile.into();
        self.config.fragment_shader_profile = fragment_profile.into();
        self.config.fill_default_profiles();
        self.clear();
    }

    pub fn set_shader_cache_path(&mut self, path: Option<PathBuf>) {
        self.config.shader_cache_path = path;
    }

    pub fn stats(&self) -> ProgramManagerStats {
        self.stats
    }

    pub fn program_set_count(&self) -> usize {
        self.program_sets.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn program_by_name(&self, name: &str) -> Option<&Arc<GpuProgram>> {
        self.programs.get(name)
    }

    /// Drops every cached set and program. Passes keep the programs already bound to them.
    pub fn clear(&mut self) {
        self.program_sets.clear();
        self.programs.clear();
    }

    /// Returns the compiled set for `render_state`, building it on a cache miss.
    ///
    /// A failed build leaves the cache untouched so the next request retries from scratch.
    pub fn get_program_set(
        &mut self,
        render_state: &mut RenderState,
    ) -> Result<Arc<ProgramSet>, BuildError> {
        render_state.sort_sub_render_states();
        let hash = render_state.hash_code();
        if let Some(set) = self.program_sets.get(&hash) {
            self.stats.hits += 1;
            debug!(hash, "program set cache hit");
            return Ok(Arc::clone(set));
        }

        self.stats.misses += 1;
        debug!(hash, features = render_state.len(), "program set cache miss");
        let mut set = ProgramSet::new();
        let built = render_state
            .create_cpu_programs(&mut set)
            .and_then(|()| self.create_gpu_programs(&mut set));
        if let Err(err) = built {
            self.stats.build_failures += 1;
            return Err(err);
        }

        let set = Arc::new(set);
        self.program_sets.insert(hash, Arc::clone(&set));
        Ok(set)
    }

    /// Builds (or reuses) the programs for `render_state` and binds them onto `pass`.
    ///
    /// On failure `pass` is left exactly as it was.
    pub fn acquire_gpu_programs(
        &mut self,
        pass: &mut Pass,
        render_state: &mut RenderState,
    ) -> Result<(), BuildError> {
        let set = self.get_program_set(render_state)?;
        let (Some(vertex), Some(fragment)) = (set.vertex_gpu_program(), set.fragment_gpu_program())
        else {
            return Err(BuildError::resolution(
                "ProgramManager",
                "program set has no compiled programs",
            ));
        };
        pass.vertex_program = Some(Arc::clone(vertex));
        pass.fragment_program = Some(Arc::clone(fragment));
        Ok(())
    }

    fn create_gpu_programs(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        let vertex = match set.vertex_program() {
            Some(program) => self.create_gpu_program(program)?,
            None => return Err(crate::ir::IrError::ProgramReleased.into()),
        };
        let fragment = match set.fragment_program() {
            Some(program) => self.create_gpu_program(program)?,
            None => return Err(crate::ir::IrError::ProgramReleased.into()),
        };
        set.bind_gpu_programs(vertex, fragment);
        Ok(())
    }

    fn create_gpu_program(&mut self, program: &Program) -> Result<Arc<GpuProgram>, BuildError> {
        let language = self.config.target_language;
        let stage = program.stage();
        let writer = self
            .writers
            .get(&language)
            .ok_or(BuildError::UnsupportedLanguage(language))?;
        let profile = self.config.profile(stage);
        let source = writer.write_source(program, profile)?;
        let name = program_name(stage, &source);

        if let Some(existing) = self.programs.get(&name) {
            self.stats.programs_reused += 1;
            debug!(program = %name, "reusing compiled program");
            return Ok(Arc::clone(existing));
        }

        let source = match &self.config.shader_cache_path {
            Some(dir) => cached_source(dir, &name, writer.file_extension(), source),
            None => source,
        };
        let desc = GpuProgramDesc {
            name: &name,
            stage,
            language,
            profile,
            entry_point: writer.entry_point_name(stage),
            source: &source,
        };
        let handle = self.compiler.compile(&desc).map_err(|err| {
            error!(
                program = %err.program,
                stage = ?err.stage,
                message = %err.message,
                source = %err.source_text,
                "generated program failed to compile"
            );
            err
        })?;

        self.stats.programs_compiled += 1;
        debug!(program = %name, handle = handle.0, "compiled program");
        let gpu = Arc::new(GpuProgram::new(&desc, handle, program));
        self.programs.insert(name, Arc::clone(&gpu));
        Ok(gpu)
    }
}

/// `{vs|fs}_{xxh3 of source}`; stable across runs for identical output.
pub fn program_name(stage: ShaderStage, source: &str) -> String {
    format!("{}_{:016x}", stage.short_name(), xxh3_64(source.as_bytes()))
}

/// Prefers a source already on disk under the program's name; otherwise persists `source`.
fn cached_source(dir: &Path, name: &str, extension: &str, source: String) -> String {
    let path = dir.join(format!("{name}.{extension}"));
    match fs::read_to_string(&path) {
        Ok(existing) => {
            debug!(path = %path.display(), "program source read from disk cache");
            existing
        }
        Err(_) => {
            if let Err(err) = fs::create_dir_all(dir).and_then(|()| fs::write(&path, &source)) {
                warn!(path = %path.display(), %err, "failed to write program source cache");
            }
            source
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileError, GpuProgramHandle};
    use crate::features::{FfpColour, FfpTransform};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingCompiler {
        calls: AtomicU64,
    }

    impl ProgramCompiler for CountingCompiler {
        fn compile(&self, _desc: &GpuProgramDesc<'_>) -> Result<GpuProgramHandle, CompileError> {
            Ok(GpuProgramHandle(self.calls.fetch_add(1, Ordering::Relaxed) + 1))
        }
    }

    fn pass_through() -> RenderState {
        let mut rs = RenderState::new();
        rs.add_sub_render_state(FfpTransform::new());
        rs.add_sub_render_state(FfpColour::default());
        rs
    }

    #[test]
    fn identical_render_states_share_one_set() {
        let compiler = Arc::new(CountingCompiler::default());
        let mut manager = ProgramManager::new(ShaderGeneratorConfig::default(), compiler.clone());

        let first = manager.get_program_set(&mut pass_through()).unwrap();
        let second = manager.get_program_set(&mut pass_through()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiler.calls.load(Ordering::Relaxed), 2);
        let stats = manager.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!(first.vertex_program().is_none());
    }

    #[test]
    fn program_names_follow_stage_and_source() {
        let name = program_name(ShaderStage::Fragment, "fn main() {}");
        assert!(name.starts_with("fs_"));
        assert_eq!(name.len(), 3 + 16);
        assert_eq!(name, program_name(ShaderStage::Fragment, "fn main() {}"));
    }

    #[test]
    fn acquire_binds_both_stages() {
        let mut manager = ProgramManager::new(
            ShaderGeneratorConfig::default(),
            Arc::new(CountingCompiler::default()),
        );
        let mut pass = Pass::default();
        manager
            .acquire_gpu_programs(&mut pass, &mut pass_through())
            .unwrap();
        assert!(pass.has_programs());
        assert_eq!(manager.program_count(), 2);
    }
}
