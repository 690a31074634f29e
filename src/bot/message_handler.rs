//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::dialogue::{BotDialogue, BotState};
use crate::localization::t_lang;

use super::dialogue_manager::{begin_registration, handle_registration_input, identity_of};
use super::search_handler::start_search;
use super::ui_builder::{create_start_keyboard, StartMenu};
use super::AppState;

/// Reply keyboard buttons of the `/start` menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    StartAuth,
    Resume,
    Restart,
    Continue,
}

impl MenuButton {
    const ALL: [(MenuButton, &'static str); 4] = [
        (MenuButton::StartAuth, "button-start-auth"),
        (MenuButton::Resume, "button-resume"),
        (MenuButton::Restart, "button-restart"),
        (MenuButton::Continue, "button-continue"),
    ];

    /// Match a message against the button labels in the user's language
    pub fn from_text(text: &str, language_code: Option<&str>) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(_, key)| t_lang(key, language_code) == text)
            .map(|(button, _)| *button)
    }
}

/// Handle incoming messages in private chats
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: BotDialogue,
    state: Arc<AppState>,
) -> Result<()> {
    if !msg.chat.is_private() {
        debug!(chat_id = %msg.chat.id, "Ignoring message outside a private chat");
        return Ok(());
    }
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let telegram_id = user.id.0 as i64;
    let language_code = user.language_code.as_deref();

    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, t_lang("unknown-command", language_code))
            .await?;
        return Ok(());
    };

    if text.starts_with("/start") {
        return handle_start_command(&bot, &msg, dialogue, &state, telegram_id, language_code).await;
    }

    let current = dialogue.get().await?.unwrap_or_default();
    debug!(user_id = %telegram_id, dialogue_state = ?current, "Routing text message");

    if current == BotState::Registering {
        return handle_registration_input(
            &bot,
            &msg,
            dialogue,
            &state,
            telegram_id,
            text,
            language_code,
        )
        .await;
    }

    match MenuButton::from_text(text, language_code) {
        Some(MenuButton::StartAuth) | Some(MenuButton::Restart) => {
            begin_registration(&bot, msg.chat.id, dialogue, &state, identity_of(user), false).await
        }
        Some(MenuButton::Resume) => {
            begin_registration(&bot, msg.chat.id, dialogue, &state, identity_of(user), true).await
        }
        Some(MenuButton::Continue) => {
            start_search(&bot, msg.chat.id, dialogue, &state, telegram_id, language_code).await
        }
        None if current.search_roles().is_some() => {
            bot.send_message(msg.chat.id, t_lang("error-use-buttons", language_code))
                .await?;
            Ok(())
        }
        None => {
            bot.send_message(msg.chat.id, t_lang("unknown-command", language_code))
                .await?;
            Ok(())
        }
    }
}

/// Handle `/start`: greet and offer the menu matching the stored record
async fn handle_start_command(
    bot: &Bot,
    msg: &Message,
    dialogue: BotDialogue,
    state: &AppState,
    telegram_id: i64,
    language_code: Option<&str>,
) -> Result<()> {
    let record = state.store.find_user(telegram_id).await?;
    let menu = StartMenu::for_user(
        record.is_some(),
        record.as_ref().is_some_and(|r| r.is_registered),
    );
    info!(user_id = %telegram_id, menu = ?menu, "Start command received");

    // A registration in flight keeps running; the menu lets the user resume it
    dialogue.exit().await?;

    let (intro, keyboard_hint) = match menu {
        StartMenu::Continue => ("welcome-back", None),
        StartMenu::Resume => ("continue-registration", Some("auth-hint")),
        StartMenu::Authenticate => ("welcome", Some("auth-hint")),
    };
    bot.send_message(msg.chat.id, t_lang(intro, language_code))
        .reply_markup(create_start_keyboard(menu, language_code))
        .await?;
    if let Some(hint) = keyboard_hint {
        bot.send_message(msg.chat.id, t_lang(hint, language_code))
            .await?;
    }
    Ok(())
}
