use thiserror::Error;

/// User-facing failure taxonomy. Plumbing errors travel as `anyhow::Error`
/// and are mapped onto this with [`SentinelError::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentinelError {
    #[error("Identity Core Key Missing. Please re-authenticate.")]
    MissingCredential,
    #[error("rate limited by model gateway: {0}")]
    RateLimited(String),
    #[error("malformed structured output: {0}")]
    MalformedOutput(String),
    #[error("model gateway failure: {0}")]
    Gateway(String),
}

impl SentinelError {
    /// Map an arbitrary gateway error onto the taxonomy.
    ///
    /// A wrapped `SentinelError` anywhere in the chain wins; otherwise the
    /// rendered message is inspected for a rate-limit signature.
    pub fn classify(err: &anyhow::Error) -> SentinelError {
        if let Some(known) = err.chain().find_map(|e| e.downcast_ref::<SentinelError>()) {
            return known.clone();
        }
        let rendered = format!("{:#}", err);
        if is_rate_limit_signature(&rendered) {
            SentinelError::RateLimited(rendered)
        } else {
            SentinelError::Gateway(rendered)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SentinelError::RateLimited(_))
    }
}

pub fn is_rate_limit_signature(message: &str) -> bool {
    message.contains("429") || message.to_lowercase().contains("quota")
}
