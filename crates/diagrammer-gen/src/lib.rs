pub mod analyzer;
pub mod engine;
pub mod error;
pub mod mock;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod review;
pub mod steps;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use diagrammer_core::{DiagramModel, DiagramType};

pub use analyzer::{RetryingAnalyzer, DEFAULT_MAX_ATTEMPTS};
pub use engine::{EngineOptions, LlmEngine, LlmProvider};
pub use error::{AnalysisFailed, LlmError, PipelineError};
pub use progress::{LogProgress, ProgressSink};

use pipeline::MultiStepPipeline;

/// Knobs for one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Attempts per LLM task, at least 1.
    pub max_attempts: u32,
    /// Evaluate → regenerate cycles after assembly. 0 disables them.
    pub correction_passes: u32,
    pub evaluate: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            correction_passes: 1,
            evaluate: true,
        }
    }
}

/// What a run needs besides the request itself.
pub struct RunContext<'a> {
    pub provider: &'a dyn LlmProvider,
    pub options: PipelineOptions,
    pub progress: &'a dyn ProgressSink,
    pub cancel: CancellationToken,
}

impl<'a> RunContext<'a> {
    pub fn new(provider: &'a dyn LlmProvider, options: PipelineOptions) -> Self {
        Self {
            provider,
            options,
            progress: &LogProgress,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramRequest {
    pub diagram_type: DiagramType,
    pub input_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDiagram {
    pub model: DiagramModel,
    pub markup: String,
}

/// Turn a use case description into a validated model and its markup.
///
/// Either every step succeeds and the whole diagram is returned, or the
/// first failing step's error is; partial diagrams are never produced.
pub async fn generate_diagram(
    ctx: &RunContext<'_>,
    request: &DiagramRequest,
) -> Result<GeneratedDiagram, PipelineError> {
    let plan = steps::plan(request.diagram_type)
        .ok_or(PipelineError::Unsupported(request.diagram_type))?;

    log::info!(
        diagram_type = request.diagram_type.as_str(),
        max_attempts = ctx.options.max_attempts;
        "Generating diagram"
    );

    let analyzer = RetryingAnalyzer::new(ctx.provider, ctx.options.max_attempts, ctx.cancel.clone());
    let pipeline = MultiStepPipeline::new(&analyzer, ctx.progress);
    let outputs = pipeline.run(&request.input_text, &plan.stages).await?;

    ctx.progress.report("Assembling diagram...");
    let mut model = (plan.assemble)(&outputs)?;

    if ctx.options.evaluate && ctx.options.correction_passes > 0 {
        model = review::review(
            &analyzer,
            ctx.progress,
            &request.input_text,
            model,
            ctx.options.correction_passes,
        )
        .await?;
    }

    let markup = diagrammer_core::render(&model);
    log::info!(diagram_type = request.diagram_type.as_str(); "Diagram generated");
    Ok(GeneratedDiagram { model, markup })
}
