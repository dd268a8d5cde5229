//! Completion client: one system role plus one prompt in, text out.
//!
//! Remote failures never propagate. They come back as
//! [`Completion::Failed`], whose text carries the [`ERROR_PREFIX`] so the
//! session can keep going with something to show.

use crate::log::Transcript;
use crate::provider::DynProvider;
use crate::wire::{ChatRequest, Outcome};

pub const ERROR_PREFIX: &str = "Error generating response:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Generated(String),
    /// Already prefixed with [`ERROR_PREFIX`].
    Failed(String),
}

impl Completion {
    pub fn text(&self) -> &str {
        match self {
            Completion::Generated(t) | Completion::Failed(t) => t,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }
}

pub struct CompletionClient {
    provider: DynProvider,
    model: String,
    temperature: f32,
    max_tokens: u32,
    transcript: Option<Transcript>,
}

impl CompletionClient {
    pub fn new(provider: DynProvider, model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens,
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub async fn complete(&self, stage: &str, prompt: &str, system_role: &str) -> Completion {
        self.complete_with(stage, prompt, system_role, self.temperature).await
    }

    pub async fn complete_with(&self, stage: &str, prompt: &str, system_role: &str, temperature: f32) -> Completion {
        let req = ChatRequest {
            model: self.model.clone(),
            system: system_role.to_string(),
            user: prompt.to_string(),
            temperature,
            max_tokens: self.max_tokens,
        };

        let completion = match self.provider.chat(&req).await {
            Ok(text) => {
                tracing::info!(stage, chars = text.len(), "completion received");
                Completion::Generated(text)
            }
            Err(e) => {
                tracing::warn!(stage, error = %format!("{e:#}"), "completion failed");
                Completion::Failed(format!("{ERROR_PREFIX} {e:#}"))
            }
        };

        if let Some(t) = &self.transcript {
            let outcome = if completion.is_failure() { Outcome::Failed } else { Outcome::Generated };
            match t.save_stage(stage, &req, outcome, completion.text()) {
                Ok(saved) => tracing::debug!(
                    stage,
                    request = %saved.request.display(),
                    response = %saved.response.display(),
                    "transcript saved"
                ),
                Err(e) => tracing::warn!(stage, error = %e, "could not save transcript"),
            }
        }

        completion
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::provider::Provider;
    use crate::wire::ChatRequest;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued replies in order and records every request it saw.
    #[derive(Default)]
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub seen: std::sync::Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl ScriptedProvider {
        pub fn new<I>(replies: I) -> Self
        where
            I: IntoIterator<Item = Result<String, String>>,
        {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                seen: Default::default(),
            }
        }

        pub fn ok<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
            Self::new(replies.into_iter().map(|s| Ok(s.into())))
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn chat(&self, req: &ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(req.clone());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(anyhow!(e)),
                None => Err(anyhow!("no scripted reply left")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    #[tokio::test]
    async fn success_passes_text_through_with_both_roles() {
        let provider = ScriptedProvider::ok(["generated"]);
        let seen = provider.seen.clone();
        let client = CompletionClient::new(Box::new(provider), "m", 0.7, 2000);

        let out = client.complete("hld", "the prompt", "the role").await;

        assert_eq!(out, Completion::Generated("generated".into()));
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].system, "the role");
        assert_eq!(seen[0].user, "the prompt");
        assert_eq!(seen[0].max_tokens, 2000);
        assert!((seen[0].temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn failure_becomes_prefixed_text() {
        let provider = ScriptedProvider::new([Err("connection refused".to_string())]);
        let client = CompletionClient::new(Box::new(provider), "m", 0.7, 2000);

        let out = client.complete("hld", "p", "r").await;

        assert!(out.is_failure());
        assert!(out.text().starts_with(ERROR_PREFIX));
        assert!(out.text().contains("connection refused"));
    }

    #[tokio::test]
    async fn transcript_records_failures_too() {
        let out_dir = tempfile::tempdir().unwrap();
        let transcript = Transcript::new(out_dir.path(), uuid::Uuid::new_v4());
        let dir = transcript.dir().to_path_buf();
        let provider = ScriptedProvider::new([Err("boom".to_string())]);
        let client = CompletionClient::new(Box::new(provider), "m", 0.7, 10).with_transcript(transcript);

        client.complete("technical", "p", "r").await;

        let body = std::fs::read_to_string(dir.join("technical.response.json")).unwrap();
        assert!(body.contains("\"failed\""));
        assert!(body.contains(ERROR_PREFIX));
    }
}
