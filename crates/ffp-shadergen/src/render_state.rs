use std::sync::OnceLock;

use crate::error::BuildError;
use crate::features::{ColourStageFlags, SubRenderState};
use crate::hash::hash_combine;
use crate::host::{DrawContext, GpuProgramParameters, PassState};
use crate::ir::ProgramSet;

/// Ordered composition of features describing one pass's generated programs.
///
/// The hash is computed on first read and dropped on every mutation.
#[derive(Clone, Debug, Default)]
pub struct RenderState {
    sub_states: Vec<SubRenderState>,
    sorted: bool,
    hash: OnceLock<u32>,
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            sub_states: Vec::new(),
            sorted: true,
            hash: OnceLock::new(),
        }
    }

    /// Appends a feature and renegotiates colour wiring.
    pub fn add_sub_render_state(&mut self, state: impl Into<SubRenderState>) {
        self.sub_states.push(state.into());
        self.negotiate();
        self.invalidate();
    }

    /// Removes every feature of `type_name`, returning them.
    pub fn remove_sub_render_state(&mut self, type_name: &str) -> Vec<SubRenderState> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.sub_states)
            .into_iter()
            .partition(|s| s.type_name() == type_name);
        self.sub_states = kept;
        self.negotiate();
        self.invalidate();
        removed
    }

    /// Appends copies of another state's features (scheme-wide features).
    pub fn append(&mut self, other: &RenderState) {
        for state in &other.sub_states {
            self.sub_states.push(state.clone());
        }
        self.negotiate();
        self.invalidate();
    }

    pub fn sub_render_states(&self) -> &[SubRenderState] {
        &self.sub_states
    }

    pub fn len(&self) -> usize {
        self.sub_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_states.is_empty()
    }

    pub fn into_sub_render_states(self) -> Vec<SubRenderState> {
        self.sub_states
    }

    /// Stable sort by execution order; equal orders keep insertion order.
    pub fn sort_sub_render_states(&mut self) {
        if !self.sorted {
            self.sub_states.sort_by_key(SubRenderState::execution_order);
            self.sorted = true;
            self.hash = OnceLock::new();
        }
    }

    pub fn hash_code(&self) -> u32 {
        *self.hash.get_or_init(|| {
            self.sub_states
                .iter()
                .fold(0, |seed, state| hash_combine(seed, state.hash_code()))
        })
    }

    /// Runs the three build phases over every feature in execution order. Each phase completes
    /// for all features before the next starts; the first error aborts the build.
    pub fn create_cpu_programs(&mut self, set: &mut ProgramSet) -> Result<(), BuildError> {
        self.sort_sub_render_states();
        for state in &mut self.sub_states {
            state.resolve_parameters(set)?;
        }
        for state in &mut self.sub_states {
            state.resolve_dependencies(set)?;
        }
        for state in &mut self.sub_states {
            state.add_function_invocations(set)?;
        }
        set.sort_atom_instances();
        Ok(())
    }

    pub fn update_gpu_programs_params(
        &self,
        pass: &PassState,
        params: &mut GpuProgramParameters,
        ctx: &DrawContext<'_>,
    ) {
        for state in &self.sub_states {
            state.update_gpu_programs_params(pass, params, ctx);
        }
    }

    /// Recomputes the colour feature's flags from the features currently present.
    fn negotiate(&mut self) {
        let required = self
            .sub_states
            .iter()
            .fold(ColourStageFlags::empty(), |acc, s| acc | s.colour_requirements());
        if let Some(colour) = self.sub_states.iter_mut().find_map(|s| s.as_colour_mut()) {
            colour.negotiate(required);
        }
    }

    fn invalidate(&mut self) {
        self.sorted = false;
        self.hash = OnceLock::new();
    }
}
