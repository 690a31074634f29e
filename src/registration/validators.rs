//! Field validators.
//!
//! Length and pattern rules are pure; the nickname rule additionally asks
//! the store whether a registered user already owns the nickname.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{StoreError, ValidationError};
use crate::registration::levels::parse_level_and_role;
use crate::store::{Level, UserStore};

pub const NICKNAME_MIN_LEN: usize = 4;
pub const NICKNAME_MAX_LEN: usize = 16;
pub const SBER_ID_MAX_LEN: usize = 256;
pub const TEAM_NAME_MAX_LEN: usize = 256;
pub const ROLE_MAX_LEN: usize = 256;
pub const DESCRIPTION_MAX_LEN: usize = 1024;

lazy_static! {
    static ref LATIN_ONLY: Regex = Regex::new(r"^[a-zA-Z]+$").expect("valid latin regex");
    static ref SBER_ID: Regex = Regex::new(
        r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~.-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~.-]+)*$"
    )
    .expect("valid sber id regex");
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Length and alphabet rules of the School 21 nickname
pub fn check_nickname_format(nickname: &str) -> Result<(), ValidationError> {
    let len = char_len(nickname);
    if !(NICKNAME_MIN_LEN..=NICKNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::NicknameLength);
    }
    if !LATIN_ONLY.is_match(nickname) {
        return Err(ValidationError::NicknameNotLatin);
    }
    Ok(())
}

/// Full nickname validation, including the registered-owner lookup
pub async fn validate_nickname(
    nickname: &str,
    store: &dyn UserStore,
) -> Result<Result<(), ValidationError>, StoreError> {
    if let Err(e) = check_nickname_format(nickname) {
        return Ok(Err(e));
    }
    if store.is_nickname_registered(nickname).await? {
        return Ok(Err(ValidationError::NicknameTaken));
    }
    Ok(Ok(()))
}

pub fn validate_sber_id(sber_id: &str) -> Result<(), ValidationError> {
    if char_len(sber_id) > SBER_ID_MAX_LEN {
        return Err(ValidationError::SberIdLength);
    }
    if !SBER_ID.is_match(sber_id) {
        return Err(ValidationError::SberIdPattern);
    }
    Ok(())
}

pub fn validate_team_name(team_name: &str) -> Result<(), ValidationError> {
    if char_len(team_name) > TEAM_NAME_MAX_LEN {
        return Err(ValidationError::TeamNameLength);
    }
    Ok(())
}

/// The role left after the level prefix must fit the stored column
pub fn validate_role_level(role_level: &str, levels: &[Level]) -> Result<(), ValidationError> {
    let parsed = parse_level_and_role(role_level, levels);
    if char_len(&parsed.role) > ROLE_MAX_LEN {
        return Err(ValidationError::RoleLength);
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    if char_len(description) > DESCRIPTION_MAX_LEN {
        return Err(ValidationError::DescriptionLength);
    }
    Ok(())
}
