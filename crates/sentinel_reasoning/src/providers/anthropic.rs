use crate::api_types::{Message, MessagesResponse, StreamEvent};
use crate::credentials::{require_key, CredentialProvider};
use crate::llm::{CompletionParams, LlmClient};
use crate::providers::sse::{block_data, block_event, SseBuffer};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicClient {
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(
        model: &str,
        base_url: Option<&str>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            credentials,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
        })
    }

    fn body(&self, system: &str, messages: &[Message], params: &CompletionParams, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let api_key = require_key(self.credentials.as_ref())?;
        let url = format!("{}/v1/messages", self.base_url);
        let client = &self.client;
        with_retry(&RetryConfig::default(), "Anthropic", || async {
            client
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .json(body)
                .send()
                .await
                .context("Failed to send request to Anthropic")
        })
        .await
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    #[tracing::instrument(skip(self, system, messages, params), fields(model = %self.model))]
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let body = self.body(system, &messages, &params, false);
        let resp_text = self.post(&body).await?.text().await?;
        tracing::debug!(
            "Anthropic raw response (first 500 chars): {}",
            resp_text.chars().take(500).collect::<String>()
        );
        let v: Value = serde_json::from_str(&resp_text).context("Failed to parse Anthropic response")?;
        let content = v["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(MessagesResponse {
            content,
            stop_reason: v["stop_reason"].as_str().map(str::to_string),
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
            if let Err(e) = parse_anthropic_sse(byte_stream, &tx).await {
                let _ = tx.send(StreamEvent::Error(format!("{:#}", e))).await;
            }
        });
        Ok(rx)
    }
}

/// Turn Anthropic's event stream into `StreamEvent`s.
///
/// Only `text_delta` payloads carry text; `message_delta` supplies the stop
/// reason and `message_stop` ends the stream.
pub(crate) async fn parse_anthropic_sse<S>(
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

        for block in buffer.extract_event_blocks() {
            let Some(data) = block_data(&block) else {
                continue;
            };
            let Ok(v) = serde_json::from_str::<Value>(&data) else {
                continue;
            };
            let event = block_event(&block)
                .map(str::to_string)
                .or_else(|| v["type"].as_str().map(str::to_string))
                .unwrap_or_default();

            match event.as_str() {
                "content_block_delta" => {
                    if v["delta"]["type"] == "text_delta" {
                        if let Some(text) = v["delta"]["text"].as_str() {
                            if tx.send(StreamEvent::TextDelta(text.to_string())).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
                "message_delta" => {
                    if let Some(sr) = v["delta"]["stop_reason"].as_str() {
                        stop_reason = Some(sr.to_string());
                    }
                }
                "message_stop" => {
                    let _ = tx.send(StreamEvent::Done { stop_reason: stop_reason.take() }).await;
                    return Ok(());
                }
                "error" => {
                    let msg = v["error"]["message"].as_str().unwrap_or(&data).to_string();
                    let _ = tx.send(StreamEvent::Error(msg)).await;
                    return Ok(());
                }
                _ => {}
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
        chunks: Vec<&str>,
    ) -> impl futures_util::Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Unpin + Send
    {
        let items: Vec<_> = chunks
            .into_iter()
            .map(|c| Ok(bytes::Bytes::from(c.to_string())))
            .collect();
        futures_util::stream::iter(items)
    }

    async fn collect(rx: &mut tokio::sync::mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        while let Some(ev) = rx.recv().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_text_deltas_split_across_chunks() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let stream = fake_stream(vec![
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Hold \"}}\n\nevent: content_bl",
            "ock_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"the line.\"}}\n\n",
            "event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"end_turn\"}}\n\nevent: message_stop\ndata: {}\n\n",
        ]);
        parse_anthropic_sse(stream, &tx).await.unwrap();
        drop(tx);

        let events = collect(&mut rx).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Hold ".into()),
                StreamEvent::TextDelta("the line.".into()),
                StreamEvent::Done { stop_reason: Some("end_turn".into()) },
            ]
        );
    }

    #[tokio::test]
    async fn test_error_event() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let stream = fake_stream(vec![
            "event: error\ndata: {\"type\":\"error\",\"error\":{\"message\":\"Overloaded\"}}\n\n",
        ]);
        parse_anthropic_sse(stream, &tx).await.unwrap();
        drop(tx);
        assert_eq!(collect(&mut rx).await, vec![StreamEvent::Error("Overloaded".into())]);
    }

    #[test]
    fn test_body_starts_with_user_turn() {
        use crate::conversation::{context_window, ChatMessage, ChatRole};

        let mut history = Vec::new();
        for i in 0..3 {
            history.push(ChatMessage::new(ChatRole::User, format!("u{}", i), i));
            history.push(ChatMessage::new(ChatRole::Assistant, format!("a{}", i), i));
        }
        history.push(ChatMessage::new(ChatRole::User, "u3", 9));

        let creds = Arc::new(crate::credentials::StaticCredentials::default());
        let client = AnthropicClient::new("claude-test", None, creds).unwrap();
        let body = client.body(
            "sys",
            &context_window(&history, 6),
            &CompletionParams::default(),
            true,
        );
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "u1");
        assert_eq!(body["system"], "sys");
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let creds = Arc::new(crate::credentials::StaticCredentials::default());
        let client = AnthropicClient::new("claude-test", Some("http://127.0.0.1:9"), creds).unwrap();
        let err = client
            .complete("sys", vec![Message::user("hi")], CompletionParams::default())
            .await
            .unwrap_err();
        assert_eq!(
            sentinel_core::SentinelError::classify(&err),
            sentinel_core::SentinelError::MissingCredential
        );
    }
}
