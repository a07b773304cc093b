//! The extract → validate → retry loop around a single LLM task.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use diagrammer_core::ValidationError;

use crate::engine::LlmProvider;
use crate::error::{AnalysisFailed, AttemptError, LlmError};
use crate::parse::extract_json;
use crate::prompt::PromptContext;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

enum State<T> {
    Prompting,
    Extracting(String),
    Validating(Value),
    Retry(AttemptError),
    Success(T),
    Exhausted(AttemptError),
}

/// Runs one prompt until its answer validates or the attempt budget is
/// spent. Attempts are strictly sequential: attempt N is only prompted once
/// attempt N-1 has been rejected.
pub struct RetryingAnalyzer<'a> {
    provider: &'a dyn LlmProvider,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl<'a> RetryingAnalyzer<'a> {
    pub fn new(provider: &'a dyn LlmProvider, max_attempts: u32, cancel: CancellationToken) -> Self {
        Self {
            provider,
            max_attempts: max_attempts.max(1),
            cancel,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn analyze<T, F>(&self, context: PromptContext, validate: F) -> Result<T, AnalysisFailed>
    where
        F: Fn(&Value) -> Result<T, ValidationError>,
    {
        let mut context = context;
        let mut attempt = 1;
        let mut state = State::Prompting;

        loop {
            state = match state {
                State::Prompting => match self.call(&context.render()).await {
                    Ok(text) => State::Extracting(text),
                    Err(AnalysisFailed::Provider(LlmError::EmptyResponse)) => {
                        State::Retry(AttemptError::Provider(LlmError::EmptyResponse.to_string()))
                    }
                    Err(e) => return Err(e),
                },
                State::Extracting(text) => match extract_json(&text) {
                    Ok(json) => State::Validating(json),
                    Err(e) => State::Retry(e.into()),
                },
                State::Validating(json) => match validate(&json) {
                    Ok(model) => State::Success(model),
                    Err(e) => State::Retry(e.into()),
                },
                State::Retry(error) if attempt >= self.max_attempts => State::Exhausted(error),
                State::Retry(error) => {
                    log::warn!(
                        attempt = attempt,
                        max_attempts = self.max_attempts;
                        "Attempt rejected, retrying: {error}"
                    );
                    context = context.retry_with(error.to_string());
                    attempt += 1;
                    State::Prompting
                }
                State::Success(model) => {
                    log::debug!(attempt = attempt; "Attempt accepted");
                    return Ok(model);
                }
                State::Exhausted(last_error) => {
                    log::warn!(attempts = attempt; "Giving up: {last_error}");
                    return Err(AnalysisFailed::Exhausted {
                        attempts: attempt,
                        last_error,
                    });
                }
            };
        }
    }

    /// One unvalidated call, for prompts whose answer is optional.
    pub async fn complete(&self, prompt: &str) -> Result<String, AnalysisFailed> {
        self.call(prompt).await
    }

    async fn call(&self, prompt: &str) -> Result<String, AnalysisFailed> {
        if self.cancel.is_cancelled() {
            return Err(AnalysisFailed::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AnalysisFailed::Cancelled),
            result = self.provider.generate(prompt) => Ok(result?.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Completion;
    use crate::mock::ScriptedProvider;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    /// Never answers; signals once a call is in flight.
    #[derive(Default)]
    struct Stalled {
        started: Notify,
    }

    #[async_trait]
    impl LlmProvider for Stalled {
        async fn generate(&self, _prompt: &str) -> Result<Completion, LlmError> {
            self.started.notify_one();
            std::future::pending().await
        }
    }

    fn always_fails(_: &Value) -> Result<(), ValidationError> {
        Err(ValidationError::new("Elements", "must contain at least one item"))
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_attempts() {
        let provider = ScriptedProvider::repeating(r#"{"Elements": []}"#);
        let analyzer = RetryingAnalyzer::new(&provider, 3, CancellationToken::new());

        let err = analyzer
            .analyze(PromptContext::new("go"), always_fails)
            .await
            .unwrap_err();

        assert_eq!(provider.calls(), 3);
        match err {
            AnalysisFailed::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert_eq!(
                    last_error.to_string(),
                    "Elements: must contain at least one item"
                );
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_attempt_sees_first_error() {
        let provider = ScriptedProvider::new(["no json here", r#"```json
{"ok": true}
```"#]);
        let analyzer = RetryingAnalyzer::new(&provider, 3, CancellationToken::new());

        let value = analyzer
            .analyze(PromptContext::new("go"), |v| Ok(v.clone()))
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("rejected"));
        assert!(prompts[1].contains("no JSON object found in the response"));
    }

    #[tokio::test]
    async fn validation_error_text_is_fed_back() {
        let provider = ScriptedProvider::new([r#"{"n": 1}"#, r#"{"n": 2}"#]);
        let analyzer = RetryingAnalyzer::new(&provider, 3, CancellationToken::new());

        let n = analyzer
            .analyze(PromptContext::new("go"), |v| match v["n"].as_i64() {
                Some(2) => Ok(2),
                _ => Err(ValidationError::new("n", "must be 2")),
            })
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(provider.calls(), 2);
        assert!(provider.prompts()[1].contains("n: must be 2"));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let provider = ScriptedProvider::repeating("{}");
        let analyzer = RetryingAnalyzer::new(&provider, 0, CancellationToken::new());
        assert_eq!(analyzer.max_attempts(), 1);
        let _ = analyzer.analyze(PromptContext::new("go"), always_fails).await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_terminal() {
        let provider = ScriptedProvider::new(Vec::<String>::new());
        let analyzer = RetryingAnalyzer::new(&provider, 3, CancellationToken::new());
        let err = analyzer
            .analyze(PromptContext::new("go"), |v| Ok(v.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisFailed::Provider(LlmError::Chat(_))));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_calling() {
        let provider = ScriptedProvider::repeating("{}");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let analyzer = RetryingAnalyzer::new(&provider, 3, cancel);
        let err = analyzer
            .analyze(PromptContext::new("go"), |v| Ok(v.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisFailed::Cancelled));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn cancelling_interrupts_a_pending_call() {
        let provider = Stalled::default();
        let cancel = CancellationToken::new();
        let analyzer = RetryingAnalyzer::new(&provider, 3, cancel.clone());

        let (result, ()) = tokio::join!(
            analyzer.analyze(PromptContext::new("go"), |v| Ok(v.clone())),
            async {
                provider.started.notified().await;
                cancel.cancel();
            }
        );

        assert!(matches!(result, Err(AnalysisFailed::Cancelled)));
    }
}
