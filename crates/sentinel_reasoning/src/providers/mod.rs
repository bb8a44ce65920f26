pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;
pub(crate) mod sse;

use crate::credentials::CredentialProvider;
use crate::llm::LlmClient;
use anyhow::Result;
use sentinel_core::config::LlmConfig;
use std::sync::Arc;

/// Construct the configured gateway. The key is never read here; each
/// request asks `credentials` for it.
pub fn build_client(
    config: &LlmConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> Result<Arc<dyn LlmClient>> {
    let base_url = config.base_url.as_deref();
    let client: Arc<dyn LlmClient> = match config.provider.to_lowercase().as_str() {
        "gemini" | "google" => Arc::new(gemini::GeminiClient::new(&config.model, base_url, credentials)?),
        "anthropic" | "claude" => Arc::new(anthropic::AnthropicClient::new(&config.model, base_url, credentials)?),
        "openai" | "deepseek" => Arc::new(openai::OpenAiClient::new(&config.model, base_url, credentials)?),
        "mock" => Arc::new(mock::ScriptedClient::default()),
        other => anyhow::bail!(
            "Unknown LLM provider '{}'. Expected gemini, anthropic, openai or mock",
            other
        ),
    };
    tracing::info!("Model gateway: {} ({})", config.provider, config.model);
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;

    #[test]
    fn test_build_known_providers() {
        let creds: Arc<dyn CredentialProvider> = Arc::new(StaticCredentials::default());
        for provider in ["gemini", "anthropic", "openai", "mock"] {
            let config = LlmConfig {
                provider: provider.to_string(),
                ..LlmConfig::default()
            };
            let client = build_client(&config, creds.clone()).unwrap();
            assert_eq!(client.requires_credential(), provider != "mock");
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let creds: Arc<dyn CredentialProvider> = Arc::new(StaticCredentials::default());
        let err = build_client(&config, creds).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
