use crate::api_types::{Message, MessagesResponse, Role, StreamEvent};
use crate::credentials::{require_key, CredentialProvider};
use crate::llm::{CompletionParams, LlmClient};
use crate::providers::sse::{block_data, SseBuffer};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        model: &str,
        base_url: Option<&str>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(90)).build()?,
            credentials,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
        })
    }

    fn body(&self, system: &str, messages: &[Message], params: &CompletionParams) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_tokens,
            },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    async fn post(&self, method: &str, body: &Value) -> Result<reqwest::Response> {
        let api_key = require_key(self.credentials.as_ref())?;
        let url = format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method);
        let client = &self.client;
        with_retry(&RetryConfig::default(), "Gemini", || async {
            client
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .json(body)
                .send()
                .await
                .context("Failed to send request to Gemini")
        })
        .await
    }
}

/// Concatenate `candidates[0].content.parts[].text`.
fn candidate_text(v: &Value) -> String {
    v["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    #[tracing::instrument(skip(self, system, messages, params), fields(model = %self.model))]
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let body = self.body(system, &messages, &params);
        let v: Value = self
            .post("generateContent", &body)
            .await?
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        Ok(MessagesResponse {
            content: candidate_text(&v),
            stop_reason: v["candidates"][0]["finishReason"].as_str().map(str::to_string),
        })
    }

    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>> {
        let body = self.body(system, &messages, &params);
        let response = self.post("streamGenerateContent?alt=sse", &body).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            if let Err(e) = parse_gemini_sse(byte_stream, &tx).await {
                let _ = tx.send(StreamEvent::Error(format!("{:#}", e))).await;
            }
        });
        Ok(rx)
    }
}

/// Each SSE event is a full `GenerateContentResponse` holding the next text slice.
pub(crate) async fn parse_gemini_sse<S>(
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
            if let Some(msg) = v["error"]["message"].as_str() {
                let _ = tx.send(StreamEvent::Error(msg.to_string())).await;
                return Ok(());
            }
            let text = candidate_text(&v);
            if !text.is_empty() && tx.send(StreamEvent::TextDelta(text)).await.is_err() {
                return Ok(());
            }
            if let Some(fr) = v["candidates"][0]["finishReason"].as_str() {
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

    #[test]
    fn test_body_maps_roles_and_system() {
        let creds = Arc::new(crate::credentials::StaticCredentials::default());
        let client = GeminiClient::new("gemini-test", None, creds).unwrap();
        let body = client.body(
            "You are Sentinel.",
            &[Message::user("plan my day"), Message::assistant("Understood.")],
            &CompletionParams::structured(512),
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "Understood.");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are Sentinel.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let v = json!({
            "candidates": [{ "content": { "parts": [{ "text": "a" }, { "text": "b" }] } }]
        });
        assert_eq!(candidate_text(&v), "ab");
        assert_eq!(candidate_text(&json!({})), "");
    }

    #[tokio::test]
    async fn test_gemini_sse_stream() {
        let sse = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Guard \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"your mornings.\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        let stream = futures_util::stream::iter(vec![Ok(bytes::Bytes::from(sse))]);
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        parse_gemini_sse(stream, &tx).await.unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Guard ".into()),
                StreamEvent::TextDelta("your mornings.".into()),
                StreamEvent::Done { stop_reason: Some("STOP".into()) },
            ]
        );
    }
}
