use crate::api_types::{Message, MessagesResponse, StreamEvent};
use anyhow::Result;
use async_trait::async_trait;

/// Sampling parameters for a single completion.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    /// Maximum tokens to generate (will be clamped to provider limits)
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

impl CompletionParams {
    /// Low-temperature settings for JSON-shaped calls (generation, sync, reports).
    pub fn structured(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            temperature: 0.2,
        }
    }
}

/// The Model Gateway seam.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse>;

    /// Stream a completion as incremental text deltas.
    ///
    /// Errors before the first byte are returned directly; errors mid-stream
    /// arrive as `StreamEvent::Error`.
    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>>;

    /// Whether calls need an API credential to be present.
    fn requires_credential(&self) -> bool {
        true
    }
}
