//! UI-agnostic session state types
//!
//! This module contains data structures that are shared between different UIs
//! and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

use crate::catalog::Product;

/// The storefront screens. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewState {
    #[default]
    Home,
    Shop,
    ProductDetails,
    Cart,
    Checkout,
}

impl ViewState {
    pub fn title(&self) -> &'static str {
        match self {
            ViewState::Home => "Home",
            ViewState::Shop => "Shop",
            ViewState::ProductDetails => "Product",
            ViewState::Cart => "Shopping Bag",
            ViewState::Checkout => "Secure Checkout",
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        }
    }
}

/// A message in the concierge conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    /// Catalog products recommended alongside the text. Always empty for
    /// user messages.
    pub products: Vec<Product>,
}

/// Append-only conversation history.
///
/// Entries are never edited or reordered once pushed; the only mutation is
/// [`Transcript::push`].
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: ChatRole, text: impl Into<String>, products: Vec<Product>) -> &ChatMessage {
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: format!("msg-{}", self.next_id),
            role,
            text: text.into(),
            products,
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Flatten the conversation into `Role: text` lines for a prompt.
    pub fn history(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
