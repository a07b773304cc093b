//! A scripted [`LlmProvider`] for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::engine::{Completion, LlmProvider};
use crate::error::LlmError;

#[derive(Default)]
struct Script {
    routes: Vec<(String, VecDeque<String>)>,
    queue: VecDeque<String>,
    repeat: Option<String>,
    prompts: Vec<String>,
}

/// Replays canned responses and records every prompt it is sent.
///
/// A response is chosen from the first route whose marker occurs in the
/// prompt and still has responses left, then from the shared queue, then
/// from the repeating response. With nothing left the call fails like a
/// transport error.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::default();
        provider.lock().queue = responses.into_iter().map(Into::into).collect();
        provider
    }

    /// Answers every prompt with `response`.
    pub fn repeating(response: impl Into<String>) -> Self {
        let provider = Self::default();
        provider.lock().repeat = Some(response.into());
        provider
    }

    /// Answer prompts containing `marker` from `responses`, in order.
    pub fn route<I, S>(self, marker: impl Into<String>, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().routes.push((
            marker.into(),
            responses.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn calls(&self) -> usize {
        self.lock().prompts.len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str) -> Result<Completion, LlmError> {
        let mut script = self.lock();
        script.prompts.push(prompt.to_string());

        let routed = script
            .routes
            .iter_mut()
            .find(|(marker, responses)| !responses.is_empty() && prompt.contains(marker.as_str()))
            .and_then(|(_, responses)| responses.pop_front());

        let content = routed
            .or_else(|| script.queue.pop_front())
            .or_else(|| script.repeat.clone())
            .ok_or_else(|| LlmError::Chat("script exhausted".to_string()))?;

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(Completion { content })
    }
}
