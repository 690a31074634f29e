//! # Registration Module
//!
//! The registration dialog, independent of Telegram:
//! - Step order and collected fields
//! - Field validators and the level parser
//! - Session registry with the abandonment timer
//! - The controller tying them to a [`crate::store::UserStore`]

pub mod controller;
pub mod fields;
pub mod levels;
pub mod session;
pub mod validators;

pub use controller::{ConfirmOutcome, Prompt, RegistrationController, StepOutcome};
pub use fields::{CollectedFields, RegistrationStep, SKIPPED_DESCRIPTION};
pub use levels::{compose_role_level, parse_level_and_role, ParsedRoleLevel};
pub use session::{RegistrationNotifier, RegistrationSession, SessionRegistry, UserIdentity};
