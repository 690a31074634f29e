//! Registration steps and the fields collected along the way.

use serde::{Deserialize, Serialize};

use crate::registration::levels::compose_role_level;
use crate::store::{Level, UserRecord, EMPTY_SENTINEL};

/// Stored when the user skips the activity description
pub const SKIPPED_DESCRIPTION: &str = "Шаг пропущен";

/// Position of a registration dialog, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistrationStep {
    AwaitingNickname,
    AwaitingSberId,
    AwaitingTeamName,
    AwaitingRoleLevel,
    AwaitingActivityDescription,
    AwaitingConfirmation,
    Done,
}

impl RegistrationStep {
    /// The five field steps followed by confirmation
    pub const SEQUENCE: [RegistrationStep; 6] = [
        RegistrationStep::AwaitingNickname,
        RegistrationStep::AwaitingSberId,
        RegistrationStep::AwaitingTeamName,
        RegistrationStep::AwaitingRoleLevel,
        RegistrationStep::AwaitingActivityDescription,
        RegistrationStep::AwaitingConfirmation,
    ];

    /// Name persisted in `field_not_filled` when the dialog stops here
    pub fn field_name(self) -> Option<&'static str> {
        match self {
            RegistrationStep::AwaitingNickname => Some("school21_nickname"),
            RegistrationStep::AwaitingSberId => Some("sber_id"),
            RegistrationStep::AwaitingTeamName => Some("team_name"),
            RegistrationStep::AwaitingRoleLevel => Some("role_level"),
            RegistrationStep::AwaitingActivityDescription => Some("activity_description"),
            RegistrationStep::AwaitingConfirmation => Some("final_step"),
            RegistrationStep::Done => None,
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::SEQUENCE
            .iter()
            .copied()
            .find(|step| step.field_name() == Some(name))
    }
}

/// Fields collected during one registration, in canonical order.
///
/// `role_level` keeps the raw text; it is split into level and role only
/// when the session is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedFields {
    pub school21_nickname: Option<String>,
    pub sber_id: Option<String>,
    pub team_name: Option<String>,
    pub role_level: Option<String>,
    pub activity_description: Option<String>,
}

impl CollectedFields {
    fn slots(&self) -> [&Option<String>; 5] {
        [
            &self.school21_nickname,
            &self.sber_id,
            &self.team_name,
            &self.role_level,
            &self.activity_description,
        ]
    }

    /// Value stored for a field step
    pub fn get(&self, step: RegistrationStep) -> Option<&str> {
        match step {
            RegistrationStep::AwaitingNickname => self.school21_nickname.as_deref(),
            RegistrationStep::AwaitingSberId => self.sber_id.as_deref(),
            RegistrationStep::AwaitingTeamName => self.team_name.as_deref(),
            RegistrationStep::AwaitingRoleLevel => self.role_level.as_deref(),
            RegistrationStep::AwaitingActivityDescription => self.activity_description.as_deref(),
            RegistrationStep::AwaitingConfirmation | RegistrationStep::Done => None,
        }
    }

    /// Store the value for a field step; confirmation steps are ignored
    pub fn set(&mut self, step: RegistrationStep, value: String) {
        let slot = match step {
            RegistrationStep::AwaitingNickname => &mut self.school21_nickname,
            RegistrationStep::AwaitingSberId => &mut self.sber_id,
            RegistrationStep::AwaitingTeamName => &mut self.team_name,
            RegistrationStep::AwaitingRoleLevel => &mut self.role_level,
            RegistrationStep::AwaitingActivityDescription => &mut self.activity_description,
            RegistrationStep::AwaitingConfirmation | RegistrationStep::Done => return,
        };
        *slot = Some(value);
    }

    /// First step, in canonical order, whose field is missing.
    /// `AwaitingConfirmation` when all five are present.
    pub fn first_missing(&self) -> RegistrationStep {
        self.slots()
            .iter()
            .position(|slot| slot.is_none())
            .map(|index| RegistrationStep::SEQUENCE[index])
            .unwrap_or(RegistrationStep::AwaitingConfirmation)
    }

    pub fn is_complete(&self) -> bool {
        self.slots().iter().all(|slot| slot.is_some())
    }

    /// Rebuild the fields of an incomplete record.
    ///
    /// Counts populated fields from the start of the canonical order and
    /// stops at the first sentinel, or at `field_not_filled` if that comes
    /// earlier. The role+level text is rebuilt from the stored level and role.
    pub fn from_record(record: &UserRecord, levels: &[Level]) -> Self {
        let role_level = if record.role == EMPTY_SENTINEL {
            EMPTY_SENTINEL.to_string()
        } else {
            compose_role_level(record.level_id, &record.role, levels)
        };
        let stored = [
            record.school21_nickname.clone(),
            record.sber_id.clone(),
            record.team_name.clone(),
            role_level,
            record.description.clone(),
        ];

        let limit = record
            .field_not_filled
            .as_deref()
            .and_then(RegistrationStep::from_field_name)
            .and_then(|step| RegistrationStep::SEQUENCE.iter().position(|s| *s == step))
            .unwrap_or(stored.len());

        let mut fields = CollectedFields::default();
        for (step, value) in RegistrationStep::SEQUENCE
            .iter()
            .zip(stored)
            .take(limit)
        {
            if value == EMPTY_SENTINEL {
                break;
            }
            fields.set(*step, value);
        }
        fields
    }
}
