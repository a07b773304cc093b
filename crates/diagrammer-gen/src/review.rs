//! Evaluate → regenerate pass over an assembled draft.
//!
//! The model is asked to critique the draft against the description. A
//! draft judged accurate, or an evaluation that cannot be read, is kept as
//! is. Otherwise the critique and the draft go back to the model with an
//! instruction to make minimal changes, and the patched model replaces the
//! draft once it validates.

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use diagrammer_core::validate::Cursor;
use diagrammer_core::{validate, DiagramModel};

use crate::analyzer::RetryingAnalyzer;
use crate::error::{AnalysisFailed, LlmError, PipelineError};
use crate::parse::extract_json;
use crate::progress::ProgressSink;
use crate::prompt::{self, PromptContext};

pub const EVALUATE: &str = "evaluate";
pub const REGENERATE: &str = "regenerate";

/// The model's verdict on a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Evaluation {
    pub is_accurate: bool,
    pub missing_elements: Vec<String>,
    pub incorrect_elements: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Evaluation {
    /// Read an evaluation out of a raw answer. `None` when there is no JSON
    /// object or it has no readable `IsAccurate`. List entries that are not
    /// strings are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let json = extract_json(raw).ok()?;
        let root = Cursor::root(&json);
        Some(Self {
            is_accurate: root.bool("IsAccurate").ok()?,
            missing_elements: texts(&root, "MissingElements"),
            incorrect_elements: texts(&root, "IncorrectElements"),
            suggestions: texts(&root, "Suggestions"),
        })
    }
}

fn texts(root: &Cursor<'_>, key: &str) -> Vec<String> {
    root.optional_array(key)
        .unwrap_or_default()
        .iter()
        .filter_map(|item| item.text().ok())
        .collect()
}

fn evaluate_prompt(input: &str, draft: &Value) -> String {
    PromptContext::new(prompt::task(
        EVALUATE,
        "Check the draft diagram model from the earlier step against the use case \
         description. Set IsAccurate to true when it captures the description faithfully. \
         Otherwise list what is missing, what is wrong, and how to fix it.",
        &prompt::schema_of::<Evaluation>(),
        input,
    ))
    .with_input("draft", draft.clone())
    .render()
}

fn regenerate_context(input: &str, draft: &Value, evaluation: &Evaluation) -> PromptContext {
    PromptContext::new(prompt::task(
        REGENERATE,
        "Correct the draft diagram model using the review feedback. Make only the changes \
         the feedback calls for and keep everything else, including names, exactly as it is.",
        "The same shape as the draft, returned in full.",
        input,
    ))
    .with_input("draft", draft.clone())
    .with_input(
        "feedback",
        serde_json::to_value(evaluation).unwrap_or_default(),
    )
}

/// Run up to `passes` evaluate → regenerate cycles on `draft`.
///
/// A regeneration that runs out of attempts keeps the current draft.
/// Cancellation and provider failures abort the run.
pub async fn review(
    analyzer: &RetryingAnalyzer<'_>,
    progress: &dyn ProgressSink,
    input: &str,
    draft: DiagramModel,
    passes: u32,
) -> Result<DiagramModel, PipelineError> {
    let mut model = draft;
    for pass in 1..=passes {
        let wire = model
            .to_wire()
            .map_err(|e| PipelineError::Assembly(e.to_string()))?;

        progress.report("Evaluating diagram...");
        let raw = match analyzer.complete(&evaluate_prompt(input, &wire)).await {
            Ok(raw) => raw,
            Err(AnalysisFailed::Provider(LlmError::EmptyResponse)) => String::new(),
            Err(source) => {
                return Err(PipelineError::Step {
                    step: EVALUATE,
                    source,
                })
            }
        };
        let Some(evaluation) = Evaluation::parse(&raw) else {
            log::info!(pass = pass; "Evaluation unreadable, keeping draft");
            break;
        };
        log::info!(
            pass = pass,
            accurate = evaluation.is_accurate,
            missing = evaluation.missing_elements.len(),
            incorrect = evaluation.incorrect_elements.len();
            "Evaluation verdict"
        );
        if evaluation.is_accurate {
            break;
        }

        progress.report("Applying corrections...");
        let diagram_type = model.diagram_type();
        let context = regenerate_context(input, &wire, &evaluation);
        match analyzer
            .analyze(context, |json| validate(json, diagram_type))
            .await
        {
            Ok(patched) => model = patched,
            Err(AnalysisFailed::Exhausted {
                attempts,
                last_error,
            }) => {
                log::warn!(
                    pass = pass,
                    attempts = attempts;
                    "Regeneration rejected, keeping draft: {last_error}"
                );
                break;
            }
            Err(source) => {
                return Err(PipelineError::Step {
                    step: REGENERATE,
                    source,
                })
            }
        }
    }
    Ok(model)
}
