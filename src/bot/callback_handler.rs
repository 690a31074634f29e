//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::dialogue::BotDialogue;
use crate::search::PageMove;

use super::dialogue_manager::{handle_confirm, handle_skip_description};
use super::search_handler::{
    handle_level_back, handle_level_choice, handle_page_move, handle_role_choice,
    handle_user_card, start_search,
};
use super::AppState;

/// Actions encoded in inline keyboard callback data.
///
/// Telegram caps callback data at 64 bytes, so roles are referenced by
/// their index in the list kept in the dialogue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    SkipDescription,
    Confirm,
    SearchPeers,
    RestartSearch,
    Role(usize),
    Level(i32),
    LevelBack,
    PageNext,
    PagePrevious,
    PageFirst,
    User(i64),
}

impl CallbackAction {
    pub fn to_data(&self) -> String {
        match self {
            CallbackAction::SkipDescription => "skip_description".to_string(),
            CallbackAction::Confirm => "confirm".to_string(),
            CallbackAction::SearchPeers => "search_peers".to_string(),
            CallbackAction::RestartSearch => "search_restart".to_string(),
            CallbackAction::Role(index) => format!("role_{index}"),
            CallbackAction::Level(id) => format!("level_{id}"),
            CallbackAction::LevelBack => "level_back".to_string(),
            CallbackAction::PageNext => "page_next".to_string(),
            CallbackAction::PagePrevious => "page_prev".to_string(),
            CallbackAction::PageFirst => "page_first".to_string(),
            CallbackAction::User(id) => format!("user_{id}"),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "skip_description" => CallbackAction::SkipDescription,
            "confirm" => CallbackAction::Confirm,
            "search_peers" => CallbackAction::SearchPeers,
            "search_restart" => CallbackAction::RestartSearch,
            "level_back" => CallbackAction::LevelBack,
            "page_next" => CallbackAction::PageNext,
            "page_prev" => CallbackAction::PagePrevious,
            "page_first" => CallbackAction::PageFirst,
            _ => {
                if let Some(index) = data.strip_prefix("role_") {
                    CallbackAction::Role(index.parse().ok()?)
                } else if let Some(id) = data.strip_prefix("level_") {
                    CallbackAction::Level(id.parse().ok()?)
                } else if let Some(id) = data.strip_prefix("user_") {
                    CallbackAction::User(id.parse().ok()?)
                } else {
                    return None;
                }
            }
        };
        Some(action)
    }
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: BotDialogue,
    state: Arc<AppState>,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Close the loading indicator on the button
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(msg) = &q.message else {
        return Ok(());
    };
    if !msg.chat().is_private() {
        return Ok(());
    }

    let chat_id = msg.chat().id;
    let telegram_id = q.from.id.0 as i64;
    let language_code = q.from.language_code.as_deref();

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        warn!(user_id = %telegram_id, data = ?q.data, "Unknown callback data");
        return Ok(());
    };

    match action {
        CallbackAction::SkipDescription => {
            handle_skip_description(&bot, chat_id, dialogue, &state, telegram_id, language_code)
                .await
        }
        CallbackAction::Confirm => {
            handle_confirm(&bot, chat_id, dialogue, &state, telegram_id, language_code).await
        }
        CallbackAction::SearchPeers | CallbackAction::RestartSearch => {
            start_search(&bot, chat_id, dialogue, &state, telegram_id, language_code).await
        }
        CallbackAction::Role(index) => {
            handle_role_choice(&bot, chat_id, dialogue, &state, index, language_code).await
        }
        CallbackAction::Level(level_id) => {
            handle_level_choice(&bot, chat_id, dialogue, &state, level_id, language_code).await
        }
        CallbackAction::LevelBack => handle_level_back(&bot, chat_id, dialogue, language_code).await,
        CallbackAction::PageNext => {
            handle_page_move(&bot, chat_id, dialogue, &state, PageMove::Next, language_code).await
        }
        CallbackAction::PagePrevious => {
            handle_page_move(&bot, chat_id, dialogue, &state, PageMove::Previous, language_code)
                .await
        }
        CallbackAction::PageFirst => {
            handle_page_move(&bot, chat_id, dialogue, &state, PageMove::First, language_code).await
        }
        CallbackAction::User(user_id) => {
            handle_user_card(&bot, chat_id, &state, user_id, language_code).await
        }
    }
}
