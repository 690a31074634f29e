//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: `/start`, menu buttons and registration answers
//! - `callback_handler`: inline keyboard callback queries
//! - `dialogue_manager`: glue between updates and the registration controller
//! - `search_handler`: the peer search flow
//! - `ui_builder`: keyboards and message formatting
//! - `notifier`: the Telegram side of the abandonment timer

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod notifier;
pub mod search_handler;
pub mod ui_builder;

use std::sync::Arc;

use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::config::AppConfig;
use crate::dialogue::BotState;
use crate::registration::RegistrationController;
use crate::store::UserStore;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
pub use notifier::TelegramNotifier;

/// Shared state injected into every handler
pub struct AppState {
    pub controller: RegistrationController,
    pub store: Arc<dyn UserStore>,
    pub config: AppConfig,
}

/// Dispatcher tree: messages and callback queries, both inside the dialogue
pub fn schema() -> UpdateHandler<anyhow::Error> {
    let messages = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<BotState>, BotState>()
        .endpoint(message_handler);

    let callbacks = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, InMemStorage<BotState>, BotState>()
        .endpoint(callback_handler);

    dptree::entry().branch(messages).branch(callbacks)
}
