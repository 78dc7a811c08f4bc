//! Error types for the model API boundary.

use thiserror::Error;

use crate::provider::Provider;

/// Errors that can occur while running a chat turn against a model API.
///
/// None of these are fatal to a session: the assistant turns every one of
/// them into the fallback reply.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Network failure, timeout, or an unreadable response body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: Provider,
        status: u16,
        body: String,
    },

    /// The provider envelope or the model's JSON reply had the wrong shape.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// No credential is configured for the selected provider.
    #[error("no API key configured for {0}")]
    MissingApiKey(Provider),

    /// A turn was started while the previous one has not completed.
    #[error("a chat turn is already in progress")]
    TurnInProgress,

    /// The background task running the request died before returning.
    #[error("chat task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Status {
            provider: Provider::Gemini,
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "Gemini (Google) API error 503: overloaded");

        let err = ChatError::MissingApiKey(Provider::OpenAI);
        assert_eq!(err.to_string(), "no API key configured for ChatGPT (OpenAI)");
    }
}
