//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::localization::{t_args_lang, t_lang};
use crate::registration::{CollectedFields, SKIPPED_DESCRIPTION};
use crate::search::Page;
use crate::store::{Level, SearchPage, UserCard, DEFAULT_LEVEL_ID, EMPTY_SENTINEL};

use super::callback_handler::CallbackAction;

/// Which reply keyboard `/start` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMenu {
    /// Unknown user
    Authenticate,
    /// Incomplete record: resume or start over
    Resume,
    /// Registered user
    Continue,
}

impl StartMenu {
    pub fn for_user(exists: bool, is_registered: bool) -> Self {
        match (exists, is_registered) {
            (_, true) => StartMenu::Continue,
            (true, false) => StartMenu::Resume,
            (false, false) => StartMenu::Authenticate,
        }
    }

    /// Localization keys of the buttons, one per row
    pub fn button_keys(&self) -> &'static [&'static str] {
        match self {
            StartMenu::Authenticate => &["button-start-auth"],
            StartMenu::Resume => &["button-resume", "button-restart"],
            StartMenu::Continue => &["button-continue"],
        }
    }
}

/// Reply keyboard for the `/start` menu
pub fn create_start_keyboard(menu: StartMenu, language_code: Option<&str>) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = menu
        .button_keys()
        .iter()
        .map(|key| vec![KeyboardButton::new(t_lang(key, language_code))])
        .collect();
    KeyboardMarkup::new(rows).resize_keyboard()
}

fn single_button(text: String, action: CallbackAction) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        text,
        action.to_data(),
    )]])
}

pub fn create_skip_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    single_button(
        t_lang("button-skip", language_code),
        CallbackAction::SkipDescription,
    )
}

pub fn create_confirm_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    single_button(
        t_lang("button-confirm", language_code),
        CallbackAction::Confirm,
    )
}

pub fn create_search_peers_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    single_button(
        t_lang("button-search-peers", language_code),
        CallbackAction::SearchPeers,
    )
}

pub fn create_restart_search_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    single_button(
        t_lang("button-to-beginning", language_code),
        CallbackAction::RestartSearch,
    )
}

/// One button per role; callback data carries the index into `roles`
pub fn create_roles_keyboard(roles: &[String]) -> InlineKeyboardMarkup {
    let buttons = roles
        .iter()
        .enumerate()
        .map(|(index, role)| {
            vec![InlineKeyboardButton::callback(
                role.clone(),
                CallbackAction::Role(index).to_data(),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(buttons)
}

/// Level choice plus a way back to the roles
pub fn create_levels_keyboard(levels: &[Level], language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = levels
        .iter()
        .map(|level| {
            let label = if level.id == DEFAULT_LEVEL_ID {
                t_lang("button-any-level", language_code)
            } else {
                level.name.clone()
            };
            vec![InlineKeyboardButton::callback(
                label,
                CallbackAction::Level(level.id).to_data(),
            )]
        })
        .collect();

    buttons.push(vec![InlineKeyboardButton::callback(
        t_lang("button-back", language_code),
        CallbackAction::LevelBack.to_data(),
    )]);
    InlineKeyboardMarkup::new(buttons)
}

/// Listing keyboard: one button per user, then navigation
pub fn create_peer_list_keyboard(
    results: &SearchPage,
    page: &Page,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = results
        .users
        .iter()
        .map(|user| {
            let label = t_args_lang(
                "search-user-entry",
                &[("sber_id", user.sber_id.as_str()), ("team_name", user.team_name.as_str())],
                language_code,
            );
            vec![InlineKeyboardButton::callback(
                label,
                CallbackAction::User(user.id).to_data(),
            )]
        })
        .collect();

    let mut navigation = Vec::new();
    if page.has_prev() {
        navigation.push(InlineKeyboardButton::callback(
            format!("⬅️ {}", t_lang("button-previous", language_code)),
            CallbackAction::PagePrevious.to_data(),
        ));
    }
    if page.has_next() {
        navigation.push(InlineKeyboardButton::callback(
            format!("{} ➡️", t_lang("button-next", language_code)),
            CallbackAction::PageNext.to_data(),
        ));
    }
    if !navigation.is_empty() {
        buttons.push(navigation);
    }
    if page.has_prev() {
        buttons.push(vec![InlineKeyboardButton::callback(
            t_lang("button-to-beginning", language_code),
            CallbackAction::PageFirst.to_data(),
        )]);
    }
    buttons.push(vec![InlineKeyboardButton::callback(
        t_lang("button-back", language_code),
        CallbackAction::RestartSearch.to_data(),
    )]);

    InlineKeyboardMarkup::new(buttons)
}

fn or_not_specified(value: &str, language_code: Option<&str>) -> String {
    if value.is_empty() || value == EMPTY_SENTINEL || value == SKIPPED_DESCRIPTION {
        t_lang("not-specified", language_code)
    } else {
        value.to_string()
    }
}

/// Summary shown before the confirmation button
pub fn format_confirmation(fields: &CollectedFields, language_code: Option<&str>) -> String {
    let value = |field: &Option<String>| {
        or_not_specified(field.as_deref().unwrap_or_default(), language_code)
    };
    let nickname = value(&fields.school21_nickname);
    let sber_id = value(&fields.sber_id);
    let team_name = value(&fields.team_name);
    let role_level = value(&fields.role_level);
    let description = value(&fields.activity_description);
    format!(
        "{}\n\n{}",
        t_args_lang(
            "confirm-summary",
            &[
                ("nickname", nickname.as_str()),
                ("sber_id", sber_id.as_str()),
                ("team_name", team_name.as_str()),
                ("role_level", role_level.as_str()),
                ("description", description.as_str()),
            ],
            language_code,
        ),
        t_lang("ask-confirmation", language_code)
    )
}

/// Public profile of a search result
pub fn format_user_card(card: &UserCard, language_code: Option<&str>) -> String {
    let username = card
        .username
        .as_deref()
        .map(|name| format!("@{name}"))
        .unwrap_or_else(|| t_lang("not-specified", language_code));
    let level = or_not_specified(&card.level_name, language_code);
    let description = or_not_specified(&card.description, language_code);
    t_args_lang(
        "user-card",
        &[
            ("sber_id", card.sber_id.as_str()),
            ("username", username.as_str()),
            ("nickname", card.school21_nickname.as_str()),
            ("role", card.role.as_str()),
            ("level", level.as_str()),
            ("description", description.as_str()),
        ],
        language_code,
    )
}

/// Header of a listing page
pub fn format_results_header(page: &Page, language_code: Option<&str>) -> String {
    let total = page.total.to_string();
    let number = page.number().to_string();
    let pages = page.count().to_string();
    t_args_lang(
        "search-results",
        &[
            ("total", total.as_str()),
            ("page", number.as_str()),
            ("pages", pages.as_str()),
        ],
        language_code,
    )
}
