use crate::api_types::{Message, MessagesResponse, StreamEvent};
use crate::credentials::{require_key, CredentialProvider};
use crate::llm::{CompletionParams, LlmClient};
use crate::providers::sse::SseBuffer;
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat Completions client; also works against compatible gateways via `base_url`.
pub struct OpenAiClient {
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        model: &str,
        base_url: Option<&str>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
            credentials,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
        })
    }

    fn body(&self, system: &str, messages: &[Message], params: &CompletionParams, stream: bool) -> Value {
        let mut openai_messages = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            openai_messages.push(json!({ "role": "system", "content": system }));
        }
        for msg in messages {
            openai_messages.push(json!({ "role": msg.role, "content": msg.content }));
        }
        json!({
            "model": self.model,
            "messages": openai_messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": stream,
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let api_key = require_key(self.credentials.as_ref())?;
        let url = format!("{}/chat/completions", self.base_url);
        let client = &self.client;
        with_retry(&RetryConfig::default(), "OpenAI", || async {
            client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(body)
                .send()
                .await
                .context("Failed to send request to OpenAI")
        })
        .await
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let body = self.body(system, &messages, &params, false);
        let resp_json: Value = self
            .post(&body)
            .await?
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        let choice = &resp_json["choices"][0];
        Ok(MessagesResponse {
            content: choice["message"]["content"].as_str().unwrap_or_default().to_string(),
            stop_reason: choice["finish_reason"].as_str().map(str::to_string),
        })
    }

    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>> {
        let body = self.body(system, &messages, &params, true);
        let response = self.post(&body).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            if let Err(e) = parse_openai_sse(byte_stream, &tx).await {
                let _ = tx.send(StreamEvent::Error(format!("{:#}", e))).await;
            }
        });
        Ok(rx)
    }
}

/// One `data:` line per chunk; `[DONE]` terminates.
pub(crate) async fn parse_openai_sse<S>(
    mut stream: S,
    tx: &tokio::sync::mpsc::Sender<StreamEvent>,
) -> Result<()>
where
    S: futures_util::Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Unpin + Send,
{
    let mut buffer = SseBuffer::new();
    let mut stop_reason: Option<String> = None;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading SSE chunk")?;
        buffer.push_bytes(&chunk);

        for line in buffer.extract_lines() {
            let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                continue;
            };
            if data == "[DONE]" {
                let _ = tx.send(StreamEvent::Done { stop_reason: stop_reason.take() }).await;
                return Ok(());
            }
            let Ok(v) = serde_json::from_str::<Value>(data) else {
                tracing::debug!("Skipping unparseable OpenAI chunk: {}", data);
                continue;
            };
            if let Some(msg) = v["error"]["message"].as_str() {
                let _ = tx.send(StreamEvent::Error(msg.to_string())).await;
                return Ok(());
            }
            let choice = &v["choices"][0];
            if let Some(text) = choice["delta"]["content"].as_str() {
                if !text.is_empty() && tx.send(StreamEvent::TextDelta(text.to_string())).await.is_err() {
                    return Ok(());
                }
            }
            if let Some(fr) = choice["finish_reason"].as_str() {
                stop_reason = Some(fr.to_string());
            }
        }
    }

    let _ = tx.send(StreamEvent::Done { stop_reason }).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_stream(
        data: &str,
    ) -> impl futures_util::Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Unpin + Send
    {
        futures_util::stream::iter(vec![Ok(bytes::Bytes::from(data.to_string()))])
    }

    #[tokio::test]
    async fn test_openai_stream_until_done() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Stay \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"focused\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        parse_openai_sse(fake_stream(sse), &tx).await.unwrap();
        drop(tx);

        let mut text = String::new();
        let mut stop = None;
        while let Some(ev) = rx.recv().await {
            match ev {
                StreamEvent::TextDelta(t) => text.push_str(&t),
                StreamEvent::Done { stop_reason } => stop = stop_reason,
                StreamEvent::Error(e) => panic!("unexpected error {}", e),
            }
        }
        assert_eq!(text, "Stay focused");
        assert_eq!(stop.as_deref(), Some("stop"));
    }

    #[test]
    fn test_system_prompt_leads_messages() {
        let creds = Arc::new(crate::credentials::StaticCredentials::default());
        let client = OpenAiClient::new("gpt-test", None, creds).unwrap();
        let body = client.body(
            "be terse",
            &[Message::user("hi"), Message::assistant("hello")],
            &CompletionParams::structured(256),
            false,
        );
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["max_tokens"], 256);
    }
}
