use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::wire::ChatRequest;

const DEFAULT_BASE: &str = "https://api.openai.com";

/// OpenAI-compatible chat completions. The key is read from `OPENAI_API_KEY`
/// on every call unless one was given up front.
pub struct OpenAIProvider {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct Body<'a> {
    model: &'a str,
    messages: [Msg<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

impl OpenAIProvider {
    pub fn new(api_base: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            api_base: api_base.unwrap_or_else(|| DEFAULT_BASE.to_string()),
            api_key: None,
        })
    }

    #[cfg(test)]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn key(&self) -> Result<String> {
        match &self.api_key {
            Some(k) => Ok(k.clone()),
            None => std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("OPENAI_API_KEY env var is not set")),
        }
    }
}

#[async_trait]
impl super::Provider for OpenAIProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<String> {
        let api_key = self.key()?;
        let url = format!("{}/v1/chat/completions", self.api_base.trim_end_matches('/'));
        let body = Body {
            model: &req.model,
            messages: [
                Msg { role: "system", content: &req.system },
                Msg { role: "user", content: &req.user },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        tracing::debug!(%url, model = %req.model, "openai: POST");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("openai read body failed")?;
        tracing::trace!(%status, body = %text, "openai: raw response");

        if !status.is_success() {
            return Err(anyhow!("OpenAI API error ({}): {}", status, text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse OpenAI response: {e}\nRaw: {text}"))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| anyhow!("openai: response had no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{test_request, Provider};
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn sends_system_then_user_and_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "test-model",
                "max_tokens": 2000,
                "messages": [
                    { "role": "system", "content": "You are a senior embedded systems architect." },
                    { "role": "user", "content": "Design a thermostat." }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"HLD body"}}]}"#)
            .create_async()
            .await;

        let provider = OpenAIProvider::new(Some(server.url()), None).unwrap().with_api_key("sk-test");
        let out = provider.chat(&test_request()).await.unwrap();

        assert_eq!(out, "HLD body");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let provider = OpenAIProvider::new(Some(server.url()), None).unwrap().with_api_key("sk-test");
        let err = provider.chat(&test_request()).await.unwrap_err().to_string();

        assert!(err.contains("429"), "{err}");
        assert!(err.contains("rate limited"), "{err}");
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let provider = OpenAIProvider::new(Some(server.url()), None).unwrap().with_api_key("sk-test");
        assert!(provider.chat(&test_request()).await.is_err());
    }
}
