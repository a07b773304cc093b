use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde_json::Value;

/// Everything one attempt's prompt is built from. Retries build a new
/// context through [`PromptContext::retry_with`]; a context is never edited
/// after it has been sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub base_prompt: String,
    pub prior_error: Option<String>,
    pub step_inputs: BTreeMap<String, Value>,
}

impl PromptContext {
    pub fn new(base_prompt: impl Into<String>) -> Self {
        Self {
            base_prompt: base_prompt.into(),
            prior_error: None,
            step_inputs: BTreeMap::new(),
        }
    }

    /// Attach the validated output of an earlier step.
    pub fn with_input(mut self, name: impl Into<String>, value: Value) -> Self {
        self.step_inputs.insert(name.into(), value);
        self
    }

    /// The context for the next attempt, carrying why this one was rejected.
    pub fn retry_with(&self, error: impl Into<String>) -> Self {
        Self {
            base_prompt: self.base_prompt.clone(),
            prior_error: Some(error.into()),
            step_inputs: self.step_inputs.clone(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.base_prompt.len() + 512);
        out.push_str(self.base_prompt.trim_end());
        out.push('\n');

        if !self.step_inputs.is_empty() {
            out.push_str("\n## Results from earlier steps\n");
            for (name, value) in &self.step_inputs {
                out.push_str("\n### ");
                out.push_str(name);
                out.push_str("\n```json\n");
                out.push_str(&value.to_string());
                out.push_str("\n```\n");
            }
        }

        if let Some(error) = &self.prior_error {
            out.push_str("\n## Previous attempt rejected\n");
            out.push_str("Your previous answer was rejected with this error:\n");
            out.push_str(error);
            out.push_str("\nFix the problem and answer again with the complete JSON object.\n");
        }
        out
    }
}

/// Prompt text for one named task on the user's description.
pub fn task(name: &str, instructions: &str, schema: &str, input: &str) -> String {
    format!(
        "## Task: {name}\n{instructions}\n\n\
## Output format\n\
Answer with one JSON object of this shape:\n{schema}\n\n\
## Use case description\n\"\"\"\n{}\n\"\"\"",
        input.trim()
    )
}

/// JSON schema of `T`, pretty-printed for embedding in a prompt.
pub fn schema_of<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub fn system_prompt() -> String {
    "You are a software analyst who turns use case descriptions into diagram models.\n\n\
Rules:\n\
- Answer with exactly one JSON object and nothing else. No prose before or after it.\n\
- Use the field names exactly as given in the requested shape, in PascalCase.\n\
- Enumerated fields must use one of the listed values.\n\
- Take names from the description. Do not invent actors, entities or steps it does not imply.\n\
- When results from earlier steps are provided, reuse their names verbatim.\n\
- If told your previous answer was rejected, correct that problem and return the whole object again."
        .to_string()
}
