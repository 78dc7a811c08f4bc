//! The Lumina shopping concierge.
//!
//! A turn goes through three steps:
//!
//! 1. [`ShoppingAssistant::begin_turn`] records the user's message and builds
//!    the prompt from the catalog excerpt and the history before it.
//! 2. [`PendingTurn::send`] performs the model call. It owns everything it
//!    needs, so a UI can run it on a background task.
//! 3. [`ShoppingAssistant::complete_turn`] validates the reply, resolves the
//!    recommended ids against the catalog and records the assistant message,
//!    or the fallback message if anything went wrong.
//!
//! [`ShoppingAssistant::ask`] chains the three for callers that can simply
//! await.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::ModelClient;
use crate::catalog::Catalog;
use crate::error::ChatError;
use crate::provider::Provider;
use crate::state::{ChatMessage, ChatRole, Transcript};

/// Shown in place of a reply whenever the model call or its parsing fails.
pub const FALLBACK_MESSAGE: &str =
    "I apologize, but I'm currently unable to access the styling mainframe. Please try again in a moment.";

/// Shown by UIs while the transcript is still empty.
pub const WELCOME_MESSAGE: &str =
    "Welcome to Lumina. I am your personal luxury concierge. How may I assist you today?";

const PERSONA: &str = "You are 'Lumina', an expert luxury shopping assistant.
You are helpful, sophisticated, and concise.
Your goal is to recommend products from the provided catalog based on the user's query.";

const RESPONSE_CONTRACT: &str = "If the user asks for a recommendation, analyze the catalog and suggest the best matches.
Return your response in pure JSON format with this schema:
{
  \"message\": \"Your conversational response here...\",
  \"recommendedProductIds\": [\"id1\", \"id2\"]
}

Do not output markdown code blocks. Just the raw JSON string.";

/// The validated content of a model reply, before catalog matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantReply {
    pub message: String,
    pub product_ids: Vec<String>,
}

/// Build the single text block sent to the model.
pub fn build_prompt(catalog: &Catalog, history: &Transcript, query: &str) -> Result<String, ChatError> {
    let excerpt = catalog
        .prompt_excerpt()
        .map_err(|err| ChatError::Malformed(format!("catalog excerpt: {err}")))?;

    Ok(format!(
        "System: {PERSONA}\n\nCatalog: {excerpt}\n\n{RESPONSE_CONTRACT}\nHistory: {}\nUser: {query}",
        history.history()
    ))
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("code fence pattern is valid")
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validate a raw model reply.
///
/// The reply is untrusted: it may be fenced, empty, not JSON, or JSON of the
/// wrong shape. Missing fields default to empty; wrongly typed fields are
/// errors.
pub fn parse_reply(raw: &str) -> Result<AssistantReply, ChatError> {
    let trimmed = raw.trim();
    let body = code_fence()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str());

    if body.is_empty() {
        return Ok(AssistantReply::default());
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|err| ChatError::Malformed(format!("reply is not JSON: {err}")))?;

    let Value::Object(fields) = value else {
        return Err(ChatError::Malformed(format!(
            "reply is {}, expected an object",
            json_kind(&value)
        )));
    };

    let message = match fields.get("message") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => {
            return Err(ChatError::Malformed(format!(
                "`message` is {}, expected a string",
                json_kind(other)
            )))
        }
    };

    let product_ids = match fields.get("recommendedProductIds") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(id.clone()),
                Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(other) => {
            return Err(ChatError::Malformed(format!(
                "`recommendedProductIds` is {}, expected an array",
                json_kind(other)
            )))
        }
    };

    Ok(AssistantReply {
        message,
        product_ids,
    })
}

/// A model call waiting to be sent. Owns its client and prompt.
pub struct PendingTurn {
    client: Option<ModelClient>,
    provider: Provider,
    model: String,
    prompt: String,
}

impl PendingTurn {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub async fn send(self) -> Result<String, ChatError> {
        let client = self.client.ok_or(ChatError::MissingApiKey(self.provider))?;
        client.query_json(&self.model, &self.prompt).await
    }
}

/// Owns the transcript and the model client for one shopping session.
pub struct ShoppingAssistant {
    catalog: Arc<Catalog>,
    client: Option<ModelClient>,
    provider: Provider,
    model: String,
    transcript: Transcript,
    turn_open: bool,
}

impl ShoppingAssistant {
    pub fn new(catalog: Arc<Catalog>, client: ModelClient, model: impl Into<String>) -> Self {
        let provider = client.provider();
        Self {
            catalog,
            client: Some(client),
            provider,
            model: model.into(),
            transcript: Transcript::new(),
            turn_open: false,
        }
    }

    /// An assistant whose provider has no credentials yet. Turns fall back
    /// until [`ShoppingAssistant::set_client`] supplies a client.
    pub fn unconfigured(catalog: Arc<Catalog>, provider: Provider, model: impl Into<String>) -> Self {
        Self {
            catalog,
            client: None,
            provider,
            model: model.into(),
            transcript: Transcript::new(),
            turn_open: false,
        }
    }

    pub fn set_client(&mut self, client: ModelClient, model: impl Into<String>) {
        self.provider = client.provider();
        self.client = Some(client);
        self.model = model.into();
    }

    /// Switch to `provider` without credentials. Turns fall back until a
    /// client is set.
    pub fn clear_client(&mut self, provider: Provider, model: impl Into<String>) {
        self.provider = provider;
        self.client = None;
        self.model = model.into();
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether a turn has begun and not yet completed.
    pub fn is_busy(&self) -> bool {
        self.turn_open
    }

    /// Record the user's message and prepare the model call.
    ///
    /// Fails with [`ChatError::TurnInProgress`] while another turn is open, in
    /// which case nothing is recorded.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, ChatError> {
        let turn = self.prepare_turn(text)?;
        self.transcript.push(ChatRole::User, text, Vec::new());
        self.turn_open = true;
        Ok(turn)
    }

    fn prepare_turn(&self, text: &str) -> Result<PendingTurn, ChatError> {
        if self.turn_open {
            return Err(ChatError::TurnInProgress);
        }

        let prompt = build_prompt(&self.catalog, &self.transcript, text)?;
        Ok(PendingTurn {
            client: self.client.clone(),
            provider: self.provider,
            model: self.model.clone(),
            prompt,
        })
    }

    /// Record the assistant's side of the open turn from the raw call result.
    pub fn complete_turn(&mut self, result: Result<String, ChatError>) -> &ChatMessage {
        if !self.turn_open {
            warn!("completing a chat turn that was never begun");
        }
        self.turn_open = false;
        self.record_reply(result)
    }

    fn record_reply(&mut self, result: Result<String, ChatError>) -> &ChatMessage {
        match result.and_then(|raw| parse_reply(&raw)) {
            Ok(reply) => {
                let products: Vec<_> = self
                    .catalog
                    .lookup(&reply.product_ids)
                    .into_iter()
                    .cloned()
                    .collect();
                if products.len() < reply.product_ids.len() {
                    debug!(
                        requested = ?reply.product_ids,
                        matched = products.len(),
                        "dropped recommended ids outside the catalog"
                    );
                }
                self.transcript.push(ChatRole::Assistant, reply.message, products)
            }
            Err(err) => {
                warn!(provider = self.provider.as_str(), error = %err, "chat turn failed, replying with fallback");
                self.transcript
                    .push(ChatRole::Assistant, FALLBACK_MESSAGE, Vec::new())
            }
        }
    }

    /// Run one full turn: call the model, then record the message and its
    /// reply together.
    ///
    /// Dropping the future before the call returns leaves the transcript
    /// untouched.
    pub async fn ask(&mut self, text: &str) -> Result<&ChatMessage, ChatError> {
        let turn = self.prepare_turn(text)?;
        let result = turn.send().await;
        self.transcript.push(ChatRole::User, text, Vec::new());
        Ok(self.record_reply(result))
    }
}
