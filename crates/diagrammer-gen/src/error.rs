use diagrammer_core::{DiagramType, ValidationError};

/// Failure at the LLM call boundary.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Build(String),

    #[error("chat: {0}")]
    Chat(String),

    #[error("LLM returned empty text")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no JSON object found in the response")]
    EmptyExtraction,

    #[error("response is not valid JSON: {0}")]
    MalformedJson(String),
}

/// Why one attempt was rejected. The display text is what the next prompt
/// quotes back to the model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Provider(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisFailed {
    #[error("diagram generation failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: AttemptError,
    },

    #[error(transparent)]
    Provider(#[from] LlmError),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("step `{step}`: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: AnalysisFailed,
    },

    #[error("assembly: {0}")]
    Assembly(String),

    #[error("{0} diagrams are not supported")]
    Unsupported(DiagramType),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PipelineError::Step {
                source: AnalysisFailed::Cancelled,
                ..
            }
        )
    }

    /// The one line shown to a user. Exhaustion drops the step prefix so it
    /// reads "diagram generation failed after N attempts: <last error>".
    pub fn terminal_message(&self) -> String {
        match self {
            PipelineError::Step {
                source: source @ AnalysisFailed::Exhausted { .. },
                ..
            } => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Attempts used by the failing step, when it ran out of retries.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            PipelineError::Step {
                source: AnalysisFailed::Exhausted { attempts, .. },
                ..
            } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_names_attempts_and_error() {
        let err = AnalysisFailed::Exhausted {
            attempts: 3,
            last_error: ValidationError::new("Elements[0].Message", "missing required field").into(),
        };
        assert_eq!(
            err.to_string(),
            "diagram generation failed after 3 attempts: Elements[0].Message: missing required field"
        );
    }

    #[test]
    fn terminal_message_drops_step_for_exhaustion() {
        let err = PipelineError::Step {
            step: "elements",
            source: AnalysisFailed::Exhausted {
                attempts: 2,
                last_error: AttemptError::Extraction(ExtractionError::EmptyExtraction),
            },
        };
        assert_eq!(
            err.terminal_message(),
            "diagram generation failed after 2 attempts: no JSON object found in the response"
        );
        assert_eq!(err.attempts(), Some(2));
    }

    #[test]
    fn step_error_prefixes_step_name() {
        let err = PipelineError::Step {
            step: "actors",
            source: AnalysisFailed::Cancelled,
        };
        assert_eq!(err.to_string(), "step `actors`: cancelled");
        assert_eq!(err.terminal_message(), "step `actors`: cancelled");
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), None);
    }
}
