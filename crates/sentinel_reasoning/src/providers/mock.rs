//! Scripted provider for tests and offline runs.
//!
//! Replies are consumed in FIFO order across `complete` and `stream_complete`.
//! When the script runs dry the fallback reply is used.

use crate::api_types::{Message, MessagesResponse, StreamEvent};
use crate::credentials::{require_key, CredentialProvider};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    Text(String),
    /// Fails before any output.
    Fail(String),
    /// Streams `partial` then reports `error`.
    Broken { partial: String, error: String },
    /// Streams `partial` then stalls until the receiver goes away.
    Hang(String),
}

impl Scripted {
    pub fn text(s: impl Into<String>) -> Self {
        Scripted::Text(s.into())
    }

    pub fn fail(s: impl Into<String>) -> Self {
        Scripted::Fail(s.into())
    }
}

/// One captured call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub streamed: bool,
}

pub struct ScriptedClient {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    requests: Mutex<Vec<RecordedRequest>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ScriptedClient {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Scripted::text("Acknowledged. Continue."),
            requests: Mutex::new(Vec::new()),
            credentials: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Scripted) -> Self {
        self.fallback = fallback;
        self
    }

    /// Resolve a key from `credentials` on every call, like a network provider.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn push(&self, reply: Scripted) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn next(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: &CompletionParams,
        streamed: bool,
    ) -> Result<Scripted> {
        if let Some(creds) = &self.credentials {
            require_key(creds.as_ref())?;
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system: system.to_string(),
                messages,
                temperature: params.temperature,
                streamed,
            });
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.fallback.clone());
        Ok(next)
    }
}

/// Split on whitespace boundaries, keeping the separators, so the joined
/// deltas reproduce `text` exactly.
fn chunk_words(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch.is_whitespace() {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        match self.next(system, messages, &params, false)? {
            Scripted::Text(content) => Ok(MessagesResponse {
                content,
                stop_reason: Some("end_turn".to_string()),
            }),
            Scripted::Fail(e) | Scripted::Broken { error: e, .. } => Err(anyhow::anyhow!(e)),
            Scripted::Hang(_) => std::future::pending().await,
        }
    }

    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>> {
        let reply = self.next(system, messages, &params, true)?;
        if let Scripted::Fail(e) = reply {
            anyhow::bail!(e);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        tokio::spawn(async move {
            match reply {
                Scripted::Text(text) => {
                    for chunk in chunk_words(&text) {
                        if tx.send(StreamEvent::TextDelta(chunk)).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx
                        .send(StreamEvent::Done {
                            stop_reason: Some("end_turn".into()),
                        })
                        .await;
                }
                Scripted::Broken { partial, error } => {
                    let _ = tx.send(StreamEvent::TextDelta(partial)).await;
                    let _ = tx.send(StreamEvent::Error(error)).await;
                }
                Scripted::Hang(partial) => {
                    let _ = tx.send(StreamEvent::TextDelta(partial)).await;
                    tx.closed().await;
                }
                Scripted::Fail(_) => {}
            }
        });
        Ok(rx)
    }

    fn requires_credential(&self) -> bool {
        self.credentials.is_some()
    }
}
