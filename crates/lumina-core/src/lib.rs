pub mod ai;
pub mod assistant;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod provider;
pub mod state;

// Re-export main types for convenience
pub use ai::{ClaudeClient, GeminiClient, ModelClient, OllamaClient, OpenAIClient};
pub use assistant::{
    build_prompt, parse_reply, AssistantReply, PendingTurn, ShoppingAssistant, FALLBACK_MESSAGE,
    WELCOME_MESSAGE,
};
pub use cart::{format_price, Cart, CartItem};
pub use catalog::{Catalog, Product, Vendor, ALL_CATEGORY, CATEGORIES};
pub use config::Config;
pub use error::ChatError;
pub use provider::Provider;
pub use state::{ChatMessage, ChatRole, Transcript, ViewState};
