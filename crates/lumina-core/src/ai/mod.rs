pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ChatError;
use crate::provider::Provider;

/// A configured client for one of the supported model APIs.
///
/// Constructed explicitly and handed to whoever issues model calls; there is
/// no shared global instance.
#[derive(Clone)]
pub enum ModelClient {
    Gemini(GeminiClient),
    Claude(ClaudeClient),
    OpenAI(OpenAIClient),
    Ollama(OllamaClient),
}

impl ModelClient {
    pub fn provider(&self) -> Provider {
        match self {
            ModelClient::Gemini(_) => Provider::Gemini,
            ModelClient::Claude(_) => Provider::Claude,
            ModelClient::OpenAI(_) => Provider::OpenAI,
            ModelClient::Ollama(_) => Provider::Ollama,
        }
    }

    /// Send one prompt and return the model's raw reply text, asking the
    /// provider for JSON output where it supports that.
    pub async fn query_json(&self, model: &str, prompt: &str) -> Result<String, ChatError> {
        debug!(provider = self.provider().as_str(), model, prompt_len = prompt.len(), "sending model request");
        match self {
            ModelClient::Gemini(client) => client.query_json(model, prompt).await,
            ModelClient::Claude(client) => client.query(model, prompt).await,
            ModelClient::OpenAI(client) => client.query_json(model, prompt).await,
            ModelClient::Ollama(client) => client.query_json(model, prompt).await,
        }
    }
}

impl From<GeminiClient> for ModelClient {
    fn from(client: GeminiClient) -> Self {
        ModelClient::Gemini(client)
    }
}

impl From<ClaudeClient> for ModelClient {
    fn from(client: ClaudeClient) -> Self {
        ModelClient::Claude(client)
    }
}

impl From<OpenAIClient> for ModelClient {
    fn from(client: OpenAIClient) -> Self {
        ModelClient::OpenAI(client)
    }
}

impl From<OllamaClient> for ModelClient {
    fn from(client: OllamaClient) -> Self {
        ModelClient::Ollama(client)
    }
}

/// Check the status and decode a provider's JSON envelope.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T, ChatError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ChatError::Status {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body)
        .map_err(|err| ChatError::Malformed(format!("{} response envelope: {}", provider.as_str(), err)))
}
