//! Pipeline assembly.
//!
//! A pipeline is an arena of [`StageContext`]s linked by index. Index 0 is
//! always the source; every other context points at the one after it and the
//! last has no `next`. The links are fixed by [`PipelineBuilder::build`] and
//! never change, so the workers and the close cascade can walk them without
//! further synchronisation.

use crate::config::FlowGraphConfig;
use crate::context::StageContext;
use crate::error::{FlowGraphError, Result};
use crate::message::Message;
use crate::stage::{BaseStage, Stage};
use std::collections::HashSet;

/// Arena index of the source context.
pub const SOURCE_INDEX: usize = 0;

/// Arena index of the first stage after the source.
pub const FIRST_DOWNSTREAM_INDEX: usize = 1;

/// An ordered chain of stages rooted at one source.
pub struct Pipeline<M: Message> {
    contexts: Vec<StageContext<M>>,
    config: FlowGraphConfig,
}

impl<M: Message> Pipeline<M> {
    /// Start building a pipeline
    pub fn builder() -> PipelineBuilder<M> {
        PipelineBuilder::new()
    }

    /// Settings the pipeline was built with; the scheduler reads its
    /// watchdog settings from here.
    pub fn config(&self) -> &FlowGraphConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Always false for a built pipeline; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn source(&self) -> &StageContext<M> {
        &self.contexts[SOURCE_INDEX]
    }

    pub fn get(&self, index: usize) -> Option<&StageContext<M>> {
        self.contexts.get(index)
    }

    /// Look a stage up by name
    pub fn find(&self, name: &str) -> Option<&StageContext<M>> {
        self.contexts.iter().find(|ctx| ctx.name() == name)
    }

    /// Contexts in chain order, starting from `index` and following `next`.
    pub fn walk_from(&self, index: usize) -> impl Iterator<Item = &StageContext<M>> + '_ {
        let mut cursor = Some(index);
        std::iter::from_fn(move || {
            let ctx = self.contexts.get(cursor?)?;
            cursor = ctx.next();
            Some(ctx)
        })
    }

    /// Every context from source to tail
    pub fn iter(&self) -> impl Iterator<Item = &StageContext<M>> + '_ {
        self.walk_from(SOURCE_INDEX)
    }

    /// Stage names from source to tail
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|ctx| ctx.name().to_string()).collect()
    }

    /// Run the close cascade starting at `index`.
    ///
    /// Only acts when `index` is the source context: every stage's `close`
    /// hook is called in chain order, source first.
    pub fn close_from(&self, index: usize) {
        let Some(ctx) = self.contexts.get(index) else {
            return;
        };
        if !ctx.is_source() {
            return;
        }

        for ctx in self.walk_from(index) {
            ctx.stage().close();
            tracing::debug!(node_name = %ctx.name(), "flow graph node closed");
        }
    }
}

impl<M: Message> std::ops::Index<usize> for Pipeline<M> {
    type Output = StageContext<M>;

    fn index(&self, index: usize) -> &StageContext<M> {
        &self.contexts[index]
    }
}

impl<M: Message> std::fmt::Debug for Pipeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.names()).finish()
    }
}

/// Builds a [`Pipeline`] from a source stage followed by downstream stages.
///
/// ```rust,ignore
/// let pipeline = Pipeline::builder()
///     .stage(DmInputNode::new(stream))
///     .stage(BaseStage::new("ddNode"))
///     .stage(InsertNode::new(buffer))
///     .build()?;
/// ```
pub struct PipelineBuilder<M: Message> {
    stages: Vec<Box<dyn Stage<M>>>,
    config: FlowGraphConfig,
}

impl<M: Message> Default for PipelineBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> PipelineBuilder<M> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            config: FlowGraphConfig::default(),
        }
    }

    /// Settings for the built pipeline and its scheduler.
    ///
    /// Stages added through [`pass_through`](Self::pass_through) take their
    /// queue length and parallelism from it; custom stages can do the same
    /// with [`BaseStage::from_config`] and [`config`](Self::config). The
    /// block warn threshold and watchdog settings apply to every stage.
    pub fn with_config(mut self, config: FlowGraphConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FlowGraphConfig {
        &self.config
    }

    /// Append a default pass-through stage sized from the builder's config
    pub fn pass_through(self, name: impl Into<String>) -> Self {
        let stage = BaseStage::from_config(name, &self.config);
        self.stage(stage)
    }

    /// Append a stage to the chain
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage<M> + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append an already boxed stage
    pub fn boxed_stage(mut self, stage: Box<dyn Stage<M>>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validate the chain and link the contexts.
    ///
    /// # Errors
    ///
    /// [`FlowGraphError::Validation`] when the first stage is not a source,
    /// a later stage claims to be one, there is no stage after the source,
    /// or two stages share a name.
    pub fn build(self) -> Result<Pipeline<M>> {
        self.validate()?;

        let count = self.stages.len();
        let threshold = self.config.block_warn_threshold;
        let config = self.config;
        let contexts = self
            .stages
            .into_iter()
            .enumerate()
            .map(|(i, stage)| {
                let next = (i + 1 < count).then_some(i + 1);
                StageContext::new(stage, next, threshold)
            })
            .collect();

        let pipeline = Pipeline { contexts, config };
        tracing::debug!(stages = ?pipeline.names(), "pipeline assembled");
        Ok(pipeline)
    }

    fn validate(&self) -> Result<()> {
        let Some(first) = self.stages.first() else {
            return Err(FlowGraphError::validation("pipeline has no stages"));
        };
        if !first.is_source() {
            return Err(FlowGraphError::validation(format!(
                "first stage '{}' is not a source stage",
                first.name()
            )));
        }
        if let Some(extra) = self.stages.iter().skip(1).find(|s| s.is_source()) {
            return Err(FlowGraphError::validation(format!(
                "pipeline has more than one source stage: '{}' and '{}'",
                first.name(),
                extra.name()
            )));
        }
        if self.stages.len() < 2 {
            return Err(FlowGraphError::validation(format!(
                "source stage '{}' has no downstream stage",
                first.name()
            )));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name()) {
                return Err(FlowGraphError::validation(format!(
                    "duplicate stage name '{}'",
                    stage.name()
                )));
            }
        }
        Ok(())
    }
}
