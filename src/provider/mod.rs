use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::wire::ChatRequest;

pub mod anthropic;
pub mod ollama;
pub mod openai;

/// A remote chat-completion endpoint. Returns the generated text.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<String>;
}

pub type DynProvider = Box<dyn Provider + Send + Sync>;

pub fn make_provider(cfg: &Config) -> Result<DynProvider> {
    let timeout = cfg.timeout_secs.map(Duration::from_secs);
    match cfg.provider {
        ProviderKind::OpenAI => Ok(Box::new(openai::OpenAIProvider::new(
            cfg.api_base.clone(),
            timeout,
        )?)),
        ProviderKind::Anthropic => Ok(Box::new(anthropic::Anthropic::new(
            cfg.api_base.clone(),
            cfg.anthropic_version.clone(),
            timeout,
        )?)),
        ProviderKind::Ollama => Ok(Box::new(ollama::Ollama::new(cfg.api_base.clone(), timeout)?)),
    }
}

fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
pub(crate) fn test_request() -> ChatRequest {
    ChatRequest {
        model: "test-model".into(),
        system: "You are a senior embedded systems architect.".into(),
        user: "Design a thermostat.".into(),
        temperature: 0.7,
        max_tokens: 2000,
    }
}
