//! # Error Types Module
//!
//! Error types shared by the registration core, the stores and the bot layer.

use thiserror::Error;

/// A user input that failed a field rule.
///
/// Every variant maps to a localization key so the bot can answer in the
/// user's language while the dialog stays on the same step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("nickname must contain between 4 and 16 characters")]
    NicknameLength,
    #[error("nickname may only contain latin letters")]
    NicknameNotLatin,
    #[error("nickname already belongs to a registered user")]
    NicknameTaken,
    #[error("sber id must not exceed 256 characters")]
    SberIdLength,
    #[error("sber id contains forbidden characters")]
    SberIdPattern,
    #[error("team name must not exceed 256 characters")]
    TeamNameLength,
    #[error("role must not exceed 256 characters")]
    RoleLength,
    #[error("description must not exceed 1024 characters")]
    DescriptionLength,
}

impl ValidationError {
    /// Localization key of the message shown to the user
    pub fn key(&self) -> &'static str {
        match self {
            ValidationError::NicknameLength => "error-nickname-length",
            ValidationError::NicknameNotLatin => "error-nickname-latin",
            ValidationError::NicknameTaken => "error-nickname-taken",
            ValidationError::SberIdLength => "error-sber-id-length",
            ValidationError::SberIdPattern => "error-sber-id-pattern",
            ValidationError::TeamNameLength => "error-team-name-length",
            ValidationError::RoleLength => "error-role-length",
            ValidationError::DescriptionLength => "error-description-length",
        }
    }
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated; `field` names the column.
    #[error("duplicate value for {field}")]
    Duplicate { field: String },
    /// The backend could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Errors surfaced by the registration controller.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_keys_are_distinct() {
        let all = [
            ValidationError::NicknameLength,
            ValidationError::NicknameNotLatin,
            ValidationError::NicknameTaken,
            ValidationError::SberIdLength,
            ValidationError::SberIdPattern,
            ValidationError::TeamNameLength,
            ValidationError::RoleLength,
            ValidationError::DescriptionLength,
        ];
        let mut keys: Vec<&str> = all.iter().map(|e| e.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), all.len());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Duplicate {
            field: "school21_nickname".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate value for school21_nickname");
    }
}
