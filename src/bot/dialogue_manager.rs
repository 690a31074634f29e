//! Dialogue Manager module bridging Telegram updates and the registration
//! controller

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{KeyboardRemove, User};
use tracing::{debug, error, info, warn};

use crate::dialogue::{BotDialogue, BotState};
use crate::localization::{t_args_lang, t_lang};
use crate::registration::{ConfirmOutcome, Prompt, StepOutcome, UserIdentity};

use super::ui_builder::{
    create_confirm_keyboard, create_search_peers_keyboard, create_skip_keyboard,
    format_confirmation,
};
use super::AppState;

/// Registration identity of a Telegram user
pub fn identity_of(user: &User) -> UserIdentity {
    UserIdentity::new(user.id.0 as i64, user.username.clone())
        .with_language(user.language_code.clone())
}

/// Ask the question for `prompt`, with the keyboard that step needs
pub async fn send_prompt(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    telegram_id: i64,
    prompt: Prompt,
    language_code: Option<&str>,
) -> Result<()> {
    match prompt {
        Prompt::AskDescription => {
            bot.send_message(chat_id, t_lang(prompt.key(), language_code))
                .reply_markup(create_skip_keyboard(language_code))
                .await?;
        }
        Prompt::AskConfirmation => {
            let summary = match state.controller.session(telegram_id).await {
                Some(session) => format_confirmation(&session.fields, language_code),
                None => t_lang(prompt.key(), language_code),
            };
            bot.send_message(chat_id, summary)
                .reply_markup(create_confirm_keyboard(language_code))
                .await?;
        }
        _ => {
            bot.send_message(chat_id, t_lang(prompt.key(), language_code))
                .reply_markup(KeyboardRemove::new())
                .await?;
        }
    }
    Ok(())
}

/// Start or resume a registration and ask the first question
pub async fn begin_registration(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    identity: UserIdentity,
    resume: bool,
) -> Result<()> {
    let telegram_id = identity.telegram_id;
    let language_code = identity.language_code.clone();

    let prompt = if resume {
        state.controller.resume(identity).await?
    } else {
        state.controller.start(identity).await?
    };
    dialogue.update(BotState::Registering).await?;

    debug!(user_id = %telegram_id, prompt = ?prompt, resume, "Registration dialogue entered");
    send_prompt(bot, chat_id, state, telegram_id, prompt, language_code.as_deref()).await
}

/// Handle a text answer while the user is registering
pub async fn handle_registration_input(
    bot: &Bot,
    msg: &Message,
    dialogue: BotDialogue,
    state: &AppState,
    telegram_id: i64,
    text: &str,
    language_code: Option<&str>,
) -> Result<()> {
    let outcome = state.controller.submit_text(telegram_id, text).await?;
    handle_step_outcome(bot, msg.chat.id, dialogue, state, telegram_id, outcome, language_code).await
}

/// Handle the "skip" button of the description step
pub async fn handle_skip_description(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    telegram_id: i64,
    language_code: Option<&str>,
) -> Result<()> {
    let outcome = state.controller.skip_description(telegram_id).await?;
    handle_step_outcome(bot, chat_id, dialogue, state, telegram_id, outcome, language_code).await
}

async fn handle_step_outcome(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    telegram_id: i64,
    outcome: StepOutcome,
    language_code: Option<&str>,
) -> Result<()> {
    match outcome {
        StepOutcome::Advanced(prompt) | StepOutcome::Repeat(prompt) => {
            send_prompt(bot, chat_id, state, telegram_id, prompt, language_code).await?;
        }
        StepOutcome::Rejected(rule) => {
            bot.send_message(chat_id, t_lang(rule.key(), language_code))
                .await?;
            // Same step, user can try again
        }
        StepOutcome::NoSession => {
            bot.send_message(chat_id, t_lang("error-no-session", language_code))
                .await?;
            dialogue.exit().await?;
        }
    }
    Ok(())
}

/// Handle the confirmation button
pub async fn handle_confirm(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: BotDialogue,
    state: &AppState,
    telegram_id: i64,
    language_code: Option<&str>,
) -> Result<()> {
    match state.controller.confirm(telegram_id).await? {
        ConfirmOutcome::Registered(record) => {
            info!(user_id = %telegram_id, record_id = record.id, "User registered");
            dialogue.exit().await?;
            send_completion(bot, chat_id, state, language_code).await?;
        }
        ConfirmOutcome::Duplicate(field) => {
            warn!(user_id = %telegram_id, field = %field, "Confirmation refused");
            bot.send_message(
                chat_id,
                t_args_lang("error-duplicate", &[("field", field.as_str())], language_code),
            )
            .await?;
        }
        ConfirmOutcome::NotReady(prompt) => {
            send_prompt(bot, chat_id, state, telegram_id, prompt, language_code).await?;
        }
        ConfirmOutcome::NoSession => {
            bot.send_message(chat_id, t_lang("error-no-session", language_code))
                .await?;
            dialogue.exit().await?;
        }
    }
    Ok(())
}

/// Completion message, with a single-use invite link when a community
/// channel is configured
async fn send_completion(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    language_code: Option<&str>,
) -> Result<()> {
    let Some(channel_id) = state.config.channel_id else {
        bot.send_message(chat_id, t_lang("registration-complete", language_code))
            .reply_markup(create_search_peers_keyboard(language_code))
            .await?;
        return Ok(());
    };

    match bot
        .create_chat_invite_link(ChatId(channel_id))
        .member_limit(1)
        .await
    {
        Ok(link) => {
            let text = format!(
                "{}\n{}",
                t_lang("registration-complete-link", language_code),
                link.invite_link
            );
            bot.send_message(chat_id, text)
                .reply_markup(create_search_peers_keyboard(language_code))
                .await?;
        }
        Err(e) => {
            error!(user_id = %chat_id, channel_id, error = %e, "Failed to create invite link");
            bot.send_message(chat_id, t_lang("error-invite-link", language_code))
                .reply_markup(create_search_peers_keyboard(language_code))
                .await?;
        }
    }
    Ok(())
}
