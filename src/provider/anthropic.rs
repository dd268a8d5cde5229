use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Provider;
use crate::wire::ChatRequest;

const DEFAULT_BASE: &str = "https://api.anthropic.com";

pub struct Anthropic {
    client: Client,
    api_base: String,
    api_version: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct MsgRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Msg<'a>>,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MsgResponse {
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    text: String,
    #[serde(default)]
    r#type: String,
}

impl Anthropic {
    pub fn new(api_base: Option<String>, api_version: String, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            api_base: api_base.unwrap_or_else(|| DEFAULT_BASE.to_string()),
            api_version,
            api_key: None,
        })
    }

    #[cfg(test)]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl Provider for Anthropic {
    async fn chat(&self, req: &ChatRequest) -> Result<String> {
        let api_key = match &self.api_key {
            Some(k) => k.clone(),
            None => std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| anyhow!("ANTHROPIC_API_KEY env var is not set"))?,
        };
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches('/'));
        let body = MsgRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            system: &req.system,
            messages: vec![Msg { role: "user", content: &req.user }],
        };

        tracing::debug!(%url, model = %req.model, "anthropic: POST");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .context("anthropic request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("anthropic read body failed")?;
        tracing::trace!(%status, body = %text, "anthropic: raw response");

        if !status.is_success() {
            return Err(anyhow!("Anthropic API error ({}): {}", status, text));
        }

        let parsed: MsgResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("anthropic response parse error: {}", e))?;

        parsed
            .content
            .into_iter()
            .find(|b| b.r#type == "text" || !b.text.is_empty())
            .map(|b| b.text)
            .ok_or_else(|| anyhow!("anthropic: empty content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_request;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn system_role_goes_top_level() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "ak-test")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJson(json!({
                "system": "You are a senior embedded systems architect.",
                "messages": [{ "role": "user", "content": "Design a thermostat." }]
            })))
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"Overview"}]}"#)
            .create_async()
            .await;

        let provider = Anthropic::new(Some(server.url()), "2023-06-01".into(), None)
            .unwrap()
            .with_api_key("ak-test");
        assert_eq!(provider.chat(&test_request()).await.unwrap(), "Overview");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content":[]}"#)
            .create_async()
            .await;

        let provider = Anthropic::new(Some(server.url()), "2023-06-01".into(), None)
            .unwrap()
            .with_api_key("ak-test");
        assert!(provider.chat(&test_request()).await.is_err());
    }
}
