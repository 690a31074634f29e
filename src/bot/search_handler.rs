//! Search Handler module for the peer search flow: role, level, listing
//! and user card

use anyhow::Result;
use teloxide::prelude::*;
use tracing::debug;

use crate::dialogue::{BotDialogue, BotState};
use crate::localization::t_lang;
use crate::search::{build_query, Page, PageMove};

use super::ui_builder::{
    create_levels_keyboard, create_peer_list_keyboard, create_restart_search_keyboard,
    create_roles_keyboard, format_results_header, format_user_card,
};
use super::AppState;

async fn session_lost(bot: &Bot, chat_id: ChatId, dialogue: BotDialogue, language_code: Option<&str>) -> Result<()> {
    bot.send_message(chat_id, t_lang("search-session-lost", language_code))
        .reply_markup(create_restart_search_keyboard(language_code))
        .await?;
    dialogue.exit().await?;
    Ok(())
}

/// Entry point of the search: only registered users may browse
pub async fn start_search(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    telegram_id: i64,
    language_code: Option<&str>,
) -> Result<()> {
    let registered = state
        .store
        .find_user(telegram_id)
        .await?
        .is_some_and(|user| user.is_registered);
    if !registered {
        bot.send_message(chat_id, t_lang("not-registered", language_code))
            .await?;
        return Ok(());
    }

    let roles = state.store.registered_roles().await?;
    if roles.is_empty() {
        bot.send_message(chat_id, t_lang("search-no-roles", language_code))
            .await?;
        dialogue.exit().await?;
        return Ok(());
    }

    debug!(user_id = %telegram_id, roles = roles.len(), "Peer search started");
    show_roles(bot, chat_id, dialogue, roles, language_code).await
}

async fn show_roles(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    roles: Vec<String>,
    language_code: Option<&str>,
) -> Result<()> {
    bot.send_message(chat_id, t_lang("search-choose-role", language_code))
        .reply_markup(create_roles_keyboard(&roles))
        .await?;
    dialogue.update(BotState::ChoosingRole { roles }).await?;
    Ok(())
}

/// A role button was pressed
pub async fn handle_role_choice(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    index: usize,
    language_code: Option<&str>,
) -> Result<()> {
    let current = dialogue.get().await?.unwrap_or_default();
    let Some(roles) = current.search_roles().map(<[String]>::to_vec) else {
        return session_lost(bot, chat_id, dialogue, language_code).await;
    };
    let Some(role) = roles.get(index).cloned() else {
        return session_lost(bot, chat_id, dialogue, language_code).await;
    };

    let levels = state.store.levels().await?;
    bot.send_message(chat_id, t_lang("search-choose-level", language_code))
        .reply_markup(create_levels_keyboard(&levels, language_code))
        .await?;
    dialogue.update(BotState::ChoosingLevel { roles, role }).await?;
    Ok(())
}

/// "Back" from the level keyboard
pub async fn handle_level_back(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    language_code: Option<&str>,
) -> Result<()> {
    let current = dialogue.get().await?.unwrap_or_default();
    match current.search_roles() {
        Some(roles) => show_roles(bot, chat_id, dialogue, roles.to_vec(), language_code).await,
        None => session_lost(bot, chat_id, dialogue, language_code).await,
    }
}

/// A level button was pressed: show the first page
pub async fn handle_level_choice(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    level_id: i32,
    language_code: Option<&str>,
) -> Result<()> {
    match dialogue.get().await?.unwrap_or_default() {
        BotState::ChoosingLevel { roles, role } | BotState::BrowsingPeers { roles, role, .. } => {
            show_page(bot, chat_id, dialogue, state, roles, role, level_id, 0, language_code).await
        }
        _ => session_lost(bot, chat_id, dialogue, language_code).await,
    }
}

/// Pagination button of the listing
pub async fn handle_page_move(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    movement: PageMove,
    language_code: Option<&str>,
) -> Result<()> {
    let BotState::BrowsingPeers {
        roles,
        role,
        level_id,
        offset,
        total,
    } = dialogue.get().await?.unwrap_or_default()
    else {
        return session_lost(bot, chat_id, dialogue, language_code).await;
    };

    let offset = Page::new(offset, state.config.search_page_size, total).moved(movement);
    show_page(bot, chat_id, dialogue, state, roles, role, level_id, offset, language_code).await
}

#[allow(clippy::too_many_arguments)]
async fn show_page(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    roles: Vec<String>,
    role: String,
    level_id: i32,
    offset: usize,
    language_code: Option<&str>,
) -> Result<()> {
    let limit = state.config.search_page_size;
    let results = state
        .store
        .search_users(&build_query(&role, level_id, offset, limit))
        .await?;

    if results.total == 0 {
        bot.send_message(chat_id, t_lang("search-empty", language_code))
            .reply_markup(create_restart_search_keyboard(language_code))
            .await?;
    } else {
        let page = Page::new(offset, limit, results.total);
        bot.send_message(chat_id, format_results_header(&page, language_code))
            .reply_markup(create_peer_list_keyboard(&results, &page, language_code))
            .await?;
    }

    debug!(
        user_id = %chat_id,
        role = %role,
        level_id,
        offset,
        total = results.total,
        "Peer search page shown"
    );
    dialogue
        .update(BotState::BrowsingPeers {
            roles,
            role,
            level_id,
            offset,
            total: results.total,
        })
        .await?;
    Ok(())
}

/// A user entry of the listing was pressed
pub async fn handle_user_card(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: i64,
    language_code: Option<&str>,
) -> Result<()> {
    match state.store.user_card(user_id).await? {
        Some(card) => {
            bot.send_message(chat_id, format_user_card(&card, language_code))
                .reply_markup(create_restart_search_keyboard(language_code))
                .await?;
        }
        None => {
            bot.send_message(chat_id, t_lang("search-empty", language_code))
                .await?;
        }
    }
    Ok(())
}
