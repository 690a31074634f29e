//! Telegram side of the abandonment timer

use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::prelude::*;
use tracing::{error, info};

use crate::dialogue::BotState;
use crate::localization::t_lang;
use crate::registration::{RegistrationNotifier, UserIdentity};

/// Sends the interruption notice and resets the user's dialogue
pub struct TelegramNotifier {
    bot: Bot,
    storage: Arc<InMemStorage<BotState>>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, storage: Arc<InMemStorage<BotState>>) -> Self {
        Self { bot, storage }
    }
}

#[async_trait]
impl RegistrationNotifier for TelegramNotifier {
    async fn registration_interrupted(&self, identity: &UserIdentity) {
        let chat_id = ChatId(identity.telegram_id);

        let dialogue = Dialogue::new(Arc::clone(&self.storage), chat_id);
        if let Err(e) = dialogue.exit().await {
            error!(user_id = %chat_id, error = %e, "Failed to reset dialogue after interruption");
        }

        let text = t_lang("registration-interrupted", identity.language_code.as_deref());
        match self.bot.send_message(chat_id, text).await {
            Ok(_) => info!(user_id = %chat_id, "Registration interruption notice sent"),
            Err(e) => error!(user_id = %chat_id, error = %e, "Failed to send interruption notice"),
        }
    }
}
