//! Ordered multi-step extraction.
//!
//! A diagram type that needs several dependent LLM calls is described as a
//! list of [`Stage`]s. Each step's validated fragment is stored under the
//! step name and handed to every later step's prompt builder and validator.
//! Steps never retry each other: a step that exhausts its own retries fails
//! the whole run and no partial result is returned.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;

use diagrammer_core::ValidationError;

use crate::analyzer::RetryingAnalyzer;
use crate::error::PipelineError;
use crate::progress::ProgressSink;
use crate::prompt::PromptContext;

/// One LLM task in a pipeline.
#[derive(Clone, Copy)]
pub struct OrderedStep {
    pub name: &'static str,
    /// Sent to the progress sink when the step starts.
    pub progress: &'static str,
    /// Fails only when an earlier fragment cannot be read back.
    pub prompt: fn(&str, &StepOutputs) -> Result<PromptContext, PipelineError>,
    /// Returns the fragment in canonical wire form.
    pub validate: fn(&Value, &StepOutputs) -> Result<Value, ValidationError>,
    /// When this returns true the step is not run and stores no output.
    pub skip: Option<fn(&StepOutputs) -> bool>,
}

impl OrderedStep {
    fn skipped(&self, outputs: &StepOutputs) -> bool {
        let skip = self.skip.is_some_and(|skip| skip(outputs));
        if skip {
            log::info!(step = self.name; "Step skipped");
        }
        skip
    }
}

pub enum Stage {
    Single(OrderedStep),
    /// Independent steps run together and joined all-or-nothing. Outputs
    /// are stored in declaration order once every step has succeeded.
    Concurrent(Vec<OrderedStep>),
}

/// Validated fragments keyed by step name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutputs {
    values: BTreeMap<&'static str, Value>,
}

impl StepOutputs {
    pub fn insert(&mut self, step: &'static str, value: Value) {
        self.values.insert(step, value);
    }

    pub fn value(&self, step: &str) -> Option<&Value> {
        self.values.get(step)
    }

    /// Deserialize a fragment. A missing or mistyped fragment is a defect in
    /// the step wiring, reported as an assembly error.
    pub fn get<T: DeserializeOwned>(&self, step: &str) -> Result<T, PipelineError> {
        let value = self
            .value(step)
            .ok_or_else(|| PipelineError::Assembly(format!("missing output of step `{step}`")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| PipelineError::Assembly(format!("output of step `{step}`: {e}")))
    }

    /// `Name` of every object in the fragment's list. Empty when the step
    /// has not run.
    pub fn names(&self, step: &str) -> Vec<String> {
        self.value(step)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("Name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct MultiStepPipeline<'a> {
    analyzer: &'a RetryingAnalyzer<'a>,
    progress: &'a dyn ProgressSink,
}

impl<'a> MultiStepPipeline<'a> {
    pub fn new(analyzer: &'a RetryingAnalyzer<'a>, progress: &'a dyn ProgressSink) -> Self {
        Self { analyzer, progress }
    }

    pub async fn run(&self, input: &str, stages: &[Stage]) -> Result<StepOutputs, PipelineError> {
        let mut outputs = StepOutputs::default();
        for stage in stages {
            match stage {
                Stage::Single(step) if step.skipped(&outputs) => {}
                Stage::Single(step) => {
                    let value = self.run_step(step, input, &outputs).await?;
                    outputs.insert(step.name, value);
                }
                Stage::Concurrent(steps) => {
                    let steps: Vec<&OrderedStep> =
                        steps.iter().filter(|step| !step.skipped(&outputs)).collect();
                    let values = try_join_all(
                        steps.iter().map(|&step| self.run_step(step, input, &outputs)),
                    )
                    .await?;
                    for (step, value) in steps.into_iter().zip(values) {
                        outputs.insert(step.name, value);
                    }
                }
            }
        }
        Ok(outputs)
    }

    async fn run_step(
        &self,
        step: &OrderedStep,
        input: &str,
        outputs: &StepOutputs,
    ) -> Result<Value, PipelineError> {
        self.progress.report(step.progress);
        log::info!(step = step.name; "Step started");

        let context = (step.prompt)(input, outputs)?;
        let value = self
            .analyzer
            .analyze(context, |json| (step.validate)(json, outputs))
            .await
            .map_err(|source| PipelineError::Step {
                step: step.name,
                source,
            })?;

        log::info!(step = step.name; "Step finished");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisFailed;
    use crate::mock::ScriptedProvider;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn first_prompt(_: &str, _: &StepOutputs) -> Result<PromptContext, PipelineError> {
        Ok(PromptContext::new("STEP first"))
    }

    fn second_prompt(_: &str, outputs: &StepOutputs) -> Result<PromptContext, PipelineError> {
        let first = outputs.value("first").cloned().unwrap_or_default();
        Ok(PromptContext::new("STEP second").with_input("first", first))
    }

    fn needs_items(json: &Value, _: &StepOutputs) -> Result<Value, ValidationError> {
        json.get("Items")
            .filter(|v| v.is_array())
            .cloned()
            .ok_or_else(|| ValidationError::new("Items", "missing required field"))
    }

    fn uses_first(json: &Value, outputs: &StepOutputs) -> Result<Value, ValidationError> {
        let known = outputs.names("first");
        let name = json["Pick"].as_str().unwrap_or_default();
        if known.iter().any(|k| k == name) {
            Ok(json!(name))
        } else {
            Err(ValidationError::new("Pick", format!("unknown `{name}`")))
        }
    }

    fn steps() -> Vec<Stage> {
        vec![
            Stage::Single(OrderedStep {
                name: "first",
                progress: "Extracting first...",
                prompt: first_prompt,
                validate: needs_items,
                skip: None,
            }),
            Stage::Single(OrderedStep {
                name: "second",
                progress: "Extracting second...",
                prompt: second_prompt,
                validate: uses_first,
                skip: None,
            }),
        ]
    }

    #[tokio::test]
    async fn later_steps_see_earlier_outputs() {
        let provider = ScriptedProvider::default()
            .route("STEP first", [r#"{"Items": [{"Name": "alpha"}]}"#])
            .route("STEP second", [r#"{"Pick": "beta"}"#, r#"{"Pick": "alpha"}"#]);
        let analyzer = RetryingAnalyzer::new(&provider, 3, CancellationToken::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let pipeline = MultiStepPipeline::new(&analyzer, &tx);

        let outputs = pipeline.run("input", &steps()).await.unwrap();

        assert_eq!(outputs.value("second"), Some(&json!("alpha")));
        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].contains(r#"[{"Name":"alpha"}]"#));
        assert!(prompts[2].contains("Pick: unknown `beta`"));
        assert_eq!(rx.try_recv().unwrap(), "Extracting first...");
        assert_eq!(rx.try_recv().unwrap(), "Extracting second...");
    }

    #[tokio::test]
    async fn failing_step_stops_the_pipeline() {
        let provider = ScriptedProvider::default().route("STEP first", ["{}", "{}"]);
        let analyzer = RetryingAnalyzer::new(&provider, 2, CancellationToken::new());
        let pipeline = MultiStepPipeline::new(&analyzer, &());

        let err = pipeline.run("input", &steps()).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Step {
                step: "first",
                source: AnalysisFailed::Exhausted { attempts: 2, .. }
            }
        ));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_stage_is_all_or_nothing() {
        let provider = ScriptedProvider::default()
            .route("STEP first", [r#"{"Items": []}"#])
            .route("STEP other", ["not json"]);
        let analyzer = RetryingAnalyzer::new(&provider, 1, CancellationToken::new());
        let pipeline = MultiStepPipeline::new(&analyzer, &());
        let stage = Stage::Concurrent(vec![
            OrderedStep {
                name: "first",
                progress: "a",
                prompt: first_prompt,
                validate: needs_items,
                skip: None,
            },
            OrderedStep {
                name: "other",
                progress: "b",
                prompt: |_, _| Ok(PromptContext::new("STEP other")),
                validate: needs_items,
                skip: None,
            },
        ]);

        let err = pipeline.run("input", &[stage]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Step { step: "other", .. }));
    }

    #[tokio::test]
    async fn skipped_step_makes_no_call() {
        let provider = ScriptedProvider::default()
            .route("STEP first", [r#"{"Items": []}"#]);
        let analyzer = RetryingAnalyzer::new(&provider, 1, CancellationToken::new());
        let pipeline = MultiStepPipeline::new(&analyzer, &());
        let mut stages = steps();
        if let Stage::Single(step) = &mut stages[1] {
            step.skip = Some(|outputs| outputs.names("first").is_empty());
        }

        let outputs = pipeline.run("input", &stages).await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(outputs.value("second"), None);
    }

    #[test]
    fn get_reports_missing_fragment() {
        let outputs = StepOutputs::default();
        let err = outputs.get::<Vec<String>>("actors").unwrap_err();
        assert_eq!(err.to_string(), "assembly: missing output of step `actors`");
        assert!(outputs.names("actors").is_empty());
    }
}
