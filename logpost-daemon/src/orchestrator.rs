//! Pipeline assembly and lifecycle management.
//!
//! The [`Orchestrator`] turns a parsed [`Pipelines`] tree into a running
//! [`PipelineSet`]: it validates the wiring of every pipeline, builds the
//! source and sink plugins, compiles the processor stages, starts
//! everything, and drains the shared error channel into the log.
//!
//! All configuration problems surface here, before anything starts.

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use logpost_core::config::Pipelines;
use logpost_pipeline::{PipelineSet, RunningPipeline, build_stages};
use logpost_plugins::{build_sink, build_source};

/// Owns the pipeline set and the error-drain task.
#[derive(Debug)]
pub struct Orchestrator {
    set: PipelineSet,
    error_drain: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Build every pipeline from the configuration tree.
    ///
    /// # Errors
    ///
    /// Returns an error if any pipeline is half-wired, references an
    /// unknown plugin, or carries an invalid processor workflow.
    pub fn build(pipelines: &Pipelines) -> Result<Self> {
        let mut set = PipelineSet::new();

        for (name, spec) in pipelines {
            spec.validate(name)
                .with_context(|| format!("pipeline '{name}' is not runnable"))?;

            let mut sources = Vec::with_capacity(spec.sources.len());
            for source_spec in &spec.sources {
                sources.push(
                    build_source(source_spec)
                        .with_context(|| format!("loading input for pipeline '{name}'"))?,
                );
            }

            let mut sinks = Vec::with_capacity(spec.destinations.len());
            for sink_spec in &spec.destinations {
                sinks.push(
                    build_sink(sink_spec)
                        .with_context(|| format!("loading output for pipeline '{name}'"))?,
                );
            }

            let stages = build_stages(name, spec)
                .with_context(|| format!("loading processors for pipeline '{name}'"))?;

            tracing::info!(
                pipeline = %name,
                sources = sources.len(),
                sinks = sinks.len(),
                stages = stages.len(),
                "pipeline assembled"
            );
            set.add_pipeline(RunningPipeline::new(name.clone(), sources, sinks, stages));
        }

        Ok(Self {
            set,
            error_drain: None,
        })
    }

    /// Number of assembled pipelines.
    pub fn pipeline_count(&self) -> usize {
        self.set.len()
    }

    /// Start every pipeline and begin draining the shared error channel.
    pub async fn run(&mut self) -> Result<()> {
        self.set
            .run()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start pipelines: {e}"))?;

        let mut errors = self
            .set
            .take_errors()
            .ok_or_else(|| anyhow::anyhow!("shared error channel already taken"))?;
        self.error_drain = Some(tokio::spawn(async move {
            while let Some(err) = errors.recv().await {
                tracing::error!(error = %err, "pipeline error");
            }
        }));

        Ok(())
    }

    /// Stop every pipeline and the error drain.
    pub async fn shutdown(&mut self) {
        self.set.stop().await;
        if let Some(task) = self.error_drain.take() {
            task.abort();
            let _ = task.await;
        }
    }
}
