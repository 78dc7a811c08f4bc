use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use lumina_core::{
    format_price, Cart, Catalog, ChatError, ClaudeClient, Config, GeminiClient, OllamaClient,
    OpenAIClient, Product, Provider, ShoppingAssistant, ViewState, ALL_CATEGORY, CATEGORIES,
};
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Number of products in the home screen's featured row.
pub const FEATURED_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatFocus {
    #[default]
    Input,
    Recommendations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutField {
    Email,
    FirstName,
    LastName,
    Address,
    CardNumber,
    Expiry,
    Cvc,
}

impl CheckoutField {
    pub const ALL: [CheckoutField; 7] = [
        CheckoutField::Email,
        CheckoutField::FirstName,
        CheckoutField::LastName,
        CheckoutField::Address,
        CheckoutField::CardNumber,
        CheckoutField::Expiry,
        CheckoutField::Cvc,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CheckoutField::Email => "Email",
            CheckoutField::FirstName => "First name",
            CheckoutField::LastName => "Last name",
            CheckoutField::Address => "Address",
            CheckoutField::CardNumber => "Card number",
            CheckoutField::Expiry => "Expiry",
            CheckoutField::Cvc => "CVC",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            CheckoutField::Email => "you@example.com",
            CheckoutField::FirstName => "Jane",
            CheckoutField::LastName => "Doe",
            CheckoutField::Address => "123 Luxury Lane, Beverly Hills, CA",
            CheckoutField::CardNumber => "0000 0000 0000 0000",
            CheckoutField::Expiry => "MM/YY",
            CheckoutField::Cvc => "123",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, CheckoutField::Cvc)
    }

    /// Whether `c` may be typed after `current`.
    pub fn accepts(&self, current: &str, c: char) -> bool {
        let len = current.chars().count();
        match self {
            CheckoutField::CardNumber => (c.is_ascii_digit() || c == ' ') && len < 19,
            CheckoutField::Expiry => (c.is_ascii_digit() || c == '/') && len < 5,
            CheckoutField::Cvc => c.is_ascii_digit() && len < 4,
            _ => !c.is_control(),
        }
    }
}

/// Checkout details. Held in memory only and never sent anywhere.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    values: [String; 7],
    pub focused: usize,
}

impl CheckoutForm {
    pub fn value(&self, field: CheckoutField) -> &str {
        &self.values[field as usize]
    }

    pub fn focused_field(&self) -> CheckoutField {
        CheckoutField::ALL[self.focused]
    }

    pub fn next_field(&mut self) {
        self.focused = (self.focused + 1) % CheckoutField::ALL.len();
    }

    pub fn prev_field(&mut self) {
        self.focused = (self.focused + CheckoutField::ALL.len() - 1) % CheckoutField::ALL.len();
    }

    pub fn push_char(&mut self, c: char) -> bool {
        let field = self.focused_field();
        let value = &mut self.values[self.focused];
        if field.accepts(value, c) {
            value.push(c);
            true
        } else {
            false
        }
    }

    pub fn pop_char(&mut self) {
        self.values[self.focused].pop();
    }
}

fn select_next(state: &mut ListState, len: usize) {
    if len > 0 {
        let i = state.selected().unwrap_or(0);
        state.select(Some((i + 1).min(len - 1)));
    }
}

fn select_prev(state: &mut ListState) {
    let i = state.selected().unwrap_or(0);
    state.select(Some(i.saturating_sub(1)));
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub view: ViewState,
    pub previous_view: ViewState,
    pub input_mode: InputMode,
    pub notice: Option<String>,

    // Store data
    pub catalog: Arc<Catalog>,
    pub cart: Cart,
    pub selected_product: Option<Product>,

    // Home
    pub featured_state: ListState,

    // Shop
    pub category_idx: usize,
    pub search_input: String,
    pub shop_results: Vec<Product>,
    pub shop_state: ListState,

    // Bag and checkout
    pub cart_state: ListState,
    pub checkout: CheckoutForm,

    // Concierge chat
    pub chat_open: bool,
    pub chat_focus: ChatFocus,
    pub chat_input: String,
    pub chat_cursor: usize,
    pub chat_scroll: u16,
    pub chat_follow: bool, // pin the transcript to its last row on the next render
    pub chat_height: u16, // inner height of the transcript area, set during render
    pub chat_width: u16,
    pub chat_task: Option<JoinHandle<Result<String, ChatError>>>,
    pub queued_turns: VecDeque<String>,
    pub recommendation_state: ListState,
    pub assistant: ShoppingAssistant,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Provider state
    pub config: Config,
    config_path: Option<PathBuf>,
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub api_key_target_provider: Option<Provider>,
}

impl App {
    /// `config_path` is where provider and model changes are saved; `None`
    /// keeps them in memory.
    pub fn new(catalog: Arc<Catalog>, config: Config, config_path: Option<PathBuf>) -> Self {
        let provider = config.provider();
        let model = config.model_for(provider);

        let assistant = match config.client_for(provider) {
            Ok(client) => ShoppingAssistant::new(Arc::clone(&catalog), client, model),
            Err(err) => {
                warn!(provider = provider.as_str(), error = %err, "concierge starts without a model client");
                ShoppingAssistant::unconfigured(Arc::clone(&catalog), provider, model)
            }
        };
        info!(provider = provider.as_str(), model = assistant.model(), "concierge ready");

        let mut featured_state = ListState::default();
        featured_state.select(Some(0));

        let mut app = Self {
            should_quit: false,
            view: ViewState::Home,
            previous_view: ViewState::Home,
            input_mode: InputMode::Normal,
            notice: None,

            catalog,
            cart: Cart::new(),
            selected_product: None,

            featured_state,

            category_idx: 0,
            search_input: String::new(),
            shop_results: Vec::new(),
            shop_state: ListState::default(),

            cart_state: ListState::default(),
            checkout: CheckoutForm::default(),

            chat_open: false,
            chat_focus: ChatFocus::Input,
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_follow: true,
            chat_height: 0,
            chat_width: 0,
            chat_task: None,
            queued_turns: VecDeque::new(),
            recommendation_state: ListState::default(),
            assistant,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            config,
            config_path,
            show_provider_picker: false,
            provider_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            api_key_target_provider: None,
        };
        app.refresh_shop();
        app
    }

    // Navigation

    pub fn go_to(&mut self, view: ViewState) {
        if view == ViewState::Checkout && self.cart.is_empty() {
            self.view = ViewState::Shop;
            return;
        }
        if view == ViewState::Cart && self.cart_state.selected().is_none() && !self.cart.is_empty() {
            self.cart_state.select(Some(0));
        }
        self.input_mode = InputMode::Normal;
        self.view = view;
    }

    /// Show the details of product `id`. Returns false for ids outside the
    /// catalog.
    pub fn open_product(&mut self, id: &str) -> bool {
        let Some(product) = self.catalog.get(id) else {
            return false;
        };
        if self.view != ViewState::ProductDetails {
            self.previous_view = self.view;
        }
        self.selected_product = Some(product.clone());
        self.view = ViewState::ProductDetails;
        true
    }

    pub fn close_product(&mut self) {
        self.view = self.previous_view;
    }

    // Home

    pub fn featured(&self) -> &[Product] {
        self.catalog.featured(FEATURED_COUNT)
    }

    pub fn featured_nav_down(&mut self) {
        let len = self.featured().len();
        select_next(&mut self.featured_state, len);
    }

    pub fn featured_nav_up(&mut self) {
        select_prev(&mut self.featured_state);
    }

    pub fn open_selected_featured(&mut self) {
        let id = self
            .featured_state
            .selected()
            .and_then(|i| self.featured().get(i))
            .map(|p| p.id.clone());
        if let Some(id) = id {
            self.open_product(&id);
        }
    }

    // Shop

    pub fn current_category(&self) -> &'static str {
        CATEGORIES[self.category_idx]
    }

    pub fn refresh_shop(&mut self) {
        let category = self.current_category();
        let matches = if self.search_input.trim().is_empty() {
            self.catalog.by_category(category)
        } else {
            self.catalog
                .search(&self.search_input)
                .into_iter()
                .filter(|p| category == ALL_CATEGORY || p.category == category)
                .collect()
        };
        self.shop_results = matches.into_iter().cloned().collect();
        self.shop_state
            .select(if self.shop_results.is_empty() { None } else { Some(0) });
    }

    pub fn next_category(&mut self) {
        self.category_idx = (self.category_idx + 1) % CATEGORIES.len();
        self.refresh_shop();
    }

    pub fn prev_category(&mut self) {
        self.category_idx = (self.category_idx + CATEGORIES.len() - 1) % CATEGORIES.len();
        self.refresh_shop();
    }

    pub fn clear_search(&mut self) {
        self.search_input.clear();
        self.refresh_shop();
    }

    pub fn shop_nav_down(&mut self) {
        select_next(&mut self.shop_state, self.shop_results.len());
    }

    pub fn shop_nav_up(&mut self) {
        select_prev(&mut self.shop_state);
    }

    pub fn open_selected_shop_result(&mut self) {
        let id = self
            .shop_state
            .selected()
            .and_then(|i| self.shop_results.get(i))
            .map(|p| p.id.clone());
        if let Some(id) = id {
            self.open_product(&id);
        }
    }

    // Bag

    pub fn add_selected_to_cart(&mut self) {
        if let Some(product) = &self.selected_product {
            let quantity = self.cart.add(product);
            info!(product = %product.id, quantity, "added to bag");
            self.notice = Some(format!("Added {} to your bag ({} in bag)", product.name, quantity));
        }
    }

    pub fn cart_nav_down(&mut self) {
        select_next(&mut self.cart_state, self.cart.items().len());
    }

    pub fn cart_nav_up(&mut self) {
        select_prev(&mut self.cart_state);
    }

    pub fn remove_selected_cart_item(&mut self) {
        let id = self
            .cart_state
            .selected()
            .and_then(|i| self.cart.items().get(i))
            .map(|item| item.product.id.clone());
        if let Some(removed) = id.and_then(|id| self.cart.remove(&id)) {
            info!(product = %removed.product.id, "removed from bag");
            self.notice = Some(format!("Removed {} from your bag", removed.product.name));
        }
        let len = self.cart.items().len();
        let selected = self.cart_state.selected().map(|i| i.min(len.saturating_sub(1)));
        self.cart_state.select(if len == 0 { None } else { selected });
    }

    /// The pay button. Payments are not wired to anything.
    pub fn pay(&mut self) {
        let total = format_price(self.cart.total());
        info!(%total, "pay pressed on the demo checkout");
        self.notice = Some(format!(
            "Payments are disabled in this demo. No charge of {} was made.",
            total
        ));
    }

    // Concierge chat

    pub fn toggle_chat(&mut self) {
        self.chat_open = !self.chat_open;
        if self.chat_open {
            self.chat_focus = ChatFocus::Input;
            self.chat_cursor = self.chat_input.chars().count();
            self.scroll_chat_to_bottom();
        }
    }

    pub fn is_chat_loading(&self) -> bool {
        self.chat_task.is_some()
    }

    /// Send the typed message, or queue it behind the turn in flight.
    pub fn submit_chat(&mut self) {
        let text = self.chat_input.trim().to_string();
        self.chat_input.clear();
        self.chat_cursor = 0;
        if text.is_empty() {
            return;
        }

        if !self.assistant.has_client() {
            self.notice = Some(format!(
                "No API key for {}. Press P to choose a provider.",
                self.assistant.provider().display_name()
            ));
        }

        if self.is_chat_loading() || self.assistant.is_busy() {
            debug!(queued = self.queued_turns.len() + 1, "queued chat message behind the open turn");
            self.queued_turns.push_back(text);
        } else {
            self.start_turn(text);
        }
    }

    /// Start a turn for `text`. A message that cannot be sent is reported
    /// and the next queued one is tried instead.
    fn start_turn(&mut self, text: String) {
        let mut next = Some(text);
        while let Some(text) = next.take() {
            match self.assistant.begin_turn(&text) {
                Ok(turn) => {
                    self.chat_task = Some(tokio::spawn(turn.send()));
                    self.scroll_chat_to_bottom();
                }
                Err(ChatError::TurnInProgress) => self.queued_turns.push_front(text),
                Err(err) => next = self.reject_turn(&err),
            }
        }
    }

    /// Tell the user a message was not sent and hand back the next queued one.
    fn reject_turn(&mut self, err: &ChatError) -> Option<String> {
        warn!(error = %err, "could not start chat turn");
        self.notice = Some(format!("Message not sent: {}", err));
        self.queued_turns.pop_front()
    }

    /// Record the reply once the background call has finished, then start
    /// the next queued message.
    pub async fn poll_chat_task(&mut self) {
        let finished = self.chat_task.as_ref().is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }
        let Some(task) = self.chat_task.take() else {
            return;
        };

        let result = match task.await {
            Ok(result) => result,
            Err(err) => Err(ChatError::Task(err.to_string())),
        };
        let recommended = self.assistant.complete_turn(result).products.len();

        if recommended > 0 {
            let total = self.recommendations().len();
            self.recommendation_state.select(Some(total - recommended));
        }
        self.scroll_chat_to_bottom();

        if let Some(next) = self.queued_turns.pop_front() {
            self.start_turn(next);
        }
    }

    /// Every recommendation card in the transcript, oldest first.
    pub fn recommendations(&self) -> Vec<&Product> {
        self.assistant
            .transcript()
            .messages()
            .iter()
            .flat_map(|m| m.products.iter())
            .collect()
    }

    pub fn recommendation_nav_down(&mut self) {
        let len = self.recommendations().len();
        select_next(&mut self.recommendation_state, len);
    }

    pub fn recommendation_nav_up(&mut self) {
        select_prev(&mut self.recommendation_state);
    }

    /// Jump to the selected card's product and close the chat.
    pub fn open_selected_recommendation(&mut self) {
        let id = self
            .recommendation_state
            .selected()
            .and_then(|i| self.recommendations().get(i).map(|p| p.id.clone()));
        if let Some(id) = id {
            if self.open_product(&id) {
                self.chat_open = false;
                self.chat_focus = ChatFocus::Input;
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_chat_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Keep the latest message (or "Thinking...") in view. The offset is
    /// resolved when the transcript is next rendered.
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_follow = true;
    }

    /// Scroll down; the renderer clamps the offset and resumes following once
    /// the last row is reached.
    pub fn chat_scroll_down(&mut self, rows: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(rows);
    }

    pub fn chat_scroll_up(&mut self, rows: u16) {
        self.chat_follow = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(rows);
    }

    // Provider and model

    fn persist_config(&self) {
        if let Some(path) = &self.config_path {
            if let Err(err) = self.config.save_to(path) {
                warn!(error = %err, path = %path.display(), "failed to save config");
            }
        }
    }

    pub fn get_key_source(&self, provider: Provider) -> Option<&'static str> {
        self.config.key_source(provider)
    }

    pub fn open_provider_picker(&mut self) {
        let current_idx = Provider::all()
            .iter()
            .position(|p| *p == self.assistant.provider())
            .unwrap_or(0);
        self.provider_picker_state.select(Some(current_idx));
        self.show_provider_picker = true;
    }

    pub fn provider_picker_nav_down(&mut self) {
        select_next(&mut self.provider_picker_state, Provider::all().len());
    }

    pub fn provider_picker_nav_up(&mut self) {
        select_prev(&mut self.provider_picker_state);
    }

    /// Switch to the highlighted provider, asking for a key first if it has none.
    pub async fn confirm_provider(&mut self) {
        self.show_provider_picker = false;
        let Some(provider) = self
            .provider_picker_state
            .selected()
            .and_then(|i| Provider::all().get(i).copied())
        else {
            return;
        };

        if self.get_key_source(provider).is_none() {
            self.api_key_target_provider = Some(provider);
            self.api_key_input.clear();
            self.api_key_input_cursor = 0;
            self.show_api_key_input = true;
        } else {
            self.switch_provider(provider).await;
        }
    }

    pub async fn submit_api_key(&mut self) {
        self.show_api_key_input = false;
        let key = std::mem::take(&mut self.api_key_input);
        self.api_key_input_cursor = 0;

        if let Some(provider) = self.api_key_target_provider.take() {
            if key.trim().is_empty() {
                return;
            }
            self.config.set_api_key(provider, &key);
            self.switch_provider(provider).await;
        }
    }

    pub fn cancel_api_key(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
        self.api_key_target_provider = None;
    }

    pub async fn switch_provider(&mut self, provider: Provider) {
        let model = self
            .models_for_provider(provider)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| provider.default_model().to_string());

        self.config.provider = Some(provider.as_str().to_string());
        self.config.default_model = Some(model.clone());
        self.persist_config();

        match self.config.client_for(provider) {
            Ok(client) => self.assistant.set_client(client, model),
            Err(err) => {
                warn!(provider = provider.as_str(), error = %err, "provider selected without a client");
                self.assistant.clear_client(provider, model);
            }
        }
        info!(provider = provider.as_str(), model = self.assistant.model(), "switched provider");
        self.notice = Some(format!(
            "Concierge now uses {} ({})",
            provider.display_name(),
            self.assistant.model()
        ));
    }

    pub async fn models_for_provider(&self, provider: Provider) -> Vec<String> {
        match provider {
            Provider::Gemini => GeminiClient::list_models(),
            Provider::Claude => ClaudeClient::list_models(),
            Provider::OpenAI => OpenAIClient::list_models(),
            Provider::Ollama => OllamaClient::new(self.config.ollama_url())
                .list_models()
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, "could not list Ollama models");
                    Vec::new()
                }),
        }
    }

    pub async fn open_model_picker(&mut self) {
        let provider = self.assistant.provider();
        self.available_models = self.models_for_provider(provider).await;
        if self.available_models.is_empty() {
            self.notice = Some(format!("No models available for {}", provider.display_name()));
            return;
        }
        // Select current model if in list, otherwise first
        let current_idx = self
            .available_models
            .iter()
            .position(|m| m == self.assistant.model())
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        select_next(&mut self.model_picker_state, self.available_models.len());
    }

    pub fn model_picker_nav_up(&mut self) {
        select_prev(&mut self.model_picker_state);
    }

    pub fn select_model(&mut self) {
        self.show_model_picker = false;
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()
        else {
            return;
        };

        self.config.provider = Some(self.assistant.provider().as_str().to_string());
        self.config.default_model = Some(model.clone());
        self.persist_config();
        info!(%model, "selected model");
        self.assistant.set_model(model);
    }
}
