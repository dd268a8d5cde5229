use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Provider;
use crate::wire::ChatRequest;

const DEFAULT_URL: &str = "http://localhost:11434";

pub struct Ollama {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: String,
}

impl Ollama {
    pub fn new(url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        })
    }
}

#[async_trait]
impl Provider for Ollama {
    async fn chat(&self, req: &ChatRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.url.trim_end_matches('/'));
        let body = ChatBody {
            model: &req.model,
            messages: vec![
                Msg { role: "system", content: &req.system },
                Msg { role: "user", content: &req.user },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: req.temperature,
                num_predict: req.max_tokens,
            },
        };

        tracing::debug!(%url, model = %req.model, "ollama: POST");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("ollama request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("ollama read body failed")?;
        tracing::trace!(%status, body = %text, "ollama: raw response");

        if !status.is_success() {
            return Err(anyhow!("Ollama error ({}): {}", status, text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("ollama response parse error: {}", e))?;
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_request;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn disables_streaming_and_caps_output() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::PartialJson(json!({
                "stream": false,
                "options": { "num_predict": 2000 }
            })))
            .with_status(200)
            .with_body(r#"{"message":{"role":"assistant","content":"local answer"}}"#)
            .create_async()
            .await;

        let provider = Ollama::new(Some(server.url()), None).unwrap();
        assert_eq!(provider.chat(&test_request()).await.unwrap(), "local answer");
        mock.assert_async().await;
    }
}
