//! Conversation state kept by the teloxide dialogue storage.
//!
//! Registration answers live in the session registry; this state only
//! tells the handlers where to route the next update.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Where a user currently is in the bot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotState {
    #[default]
    Start,
    /// Text answers go to the registration controller
    Registering,
    /// Role keyboard shown; callbacks carry an index into `roles`
    ChoosingRole { roles: Vec<String> },
    ChoosingLevel { roles: Vec<String>, role: String },
    BrowsingPeers {
        roles: Vec<String>,
        role: String,
        level_id: i32,
        offset: usize,
        total: usize,
    },
}

impl BotState {
    /// Role list of a search in progress
    pub fn search_roles(&self) -> Option<&[String]> {
        match self {
            BotState::ChoosingRole { roles }
            | BotState::ChoosingLevel { roles, .. }
            | BotState::BrowsingPeers { roles, .. } => Some(roles),
            BotState::Start | BotState::Registering => None,
        }
    }
}

/// Type alias for the bot dialogue
pub type BotDialogue = Dialogue<BotState, InMemStorage<BotState>>;
