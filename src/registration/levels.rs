//! Role and level parsing.
//!
//! The user answers the role step with free text such as
//! `"Senior golang разработчик"`. The level is an anchored, case-sensitive
//! prefix taken from the loaded taxonomy; whatever follows is the role.

use crate::store::{Level, DEFAULT_LEVEL_ID};

/// Result of splitting a role+level answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoleLevel {
    pub level_id: i32,
    pub role: String,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `input` into level and role.
///
/// Level names are tried in load order and the first one that prefixes the
/// input and ends on a word boundary wins, so `Lead` never matches
/// `Leadership`. Without a match the default level is used and the whole
/// input is the role.
pub fn parse_level_and_role(input: &str, levels: &[Level]) -> ParsedRoleLevel {
    for level in levels.iter().filter(|level| !level.name.is_empty()) {
        let Some(rest) = input.strip_prefix(level.name.as_str()) else {
            continue;
        };
        if rest.chars().next().is_some_and(is_word_char) {
            continue;
        }
        return ParsedRoleLevel {
            level_id: level.id,
            role: rest.trim().to_string(),
        };
    }

    ParsedRoleLevel {
        level_id: DEFAULT_LEVEL_ID,
        role: input.trim().to_string(),
    }
}

/// Inverse of [`parse_level_and_role`] for stored records
pub fn compose_role_level(level_id: i32, role: &str, levels: &[Level]) -> String {
    if level_id == DEFAULT_LEVEL_ID {
        return role.to_string();
    }
    match levels.iter().find(|level| level.id == level_id) {
        Some(level) => format!("{} {}", level.name, role).trim().to_string(),
        None => role.to_string(),
    }
}
