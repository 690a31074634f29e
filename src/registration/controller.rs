//! # Registration Controller
//!
//! Drives the registration dialog: start, resume, one handler per field,
//! skip, confirm, cancel and expiry. Every call locks the user's session
//! slot for its whole duration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::{RegistrationError, StoreError, ValidationError};
use crate::registration::fields::{CollectedFields, RegistrationStep, SKIPPED_DESCRIPTION};
use crate::registration::session::{
    RegistrationNotifier, RegistrationSession, SessionRegistry, UserIdentity,
};
use crate::registration::validators::{
    validate_description, validate_nickname, validate_role_level, validate_sber_id,
    validate_team_name,
};
use crate::store::{UserRecord, UserStore};

/// What the bot should ask next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    AskNickname,
    AskSberId,
    AskTeamName,
    AskRoleLevel,
    AskDescription,
    AskConfirmation,
}

impl Prompt {
    pub fn for_step(step: RegistrationStep) -> Self {
        match step {
            RegistrationStep::AwaitingNickname => Prompt::AskNickname,
            RegistrationStep::AwaitingSberId => Prompt::AskSberId,
            RegistrationStep::AwaitingTeamName => Prompt::AskTeamName,
            RegistrationStep::AwaitingRoleLevel => Prompt::AskRoleLevel,
            RegistrationStep::AwaitingActivityDescription => Prompt::AskDescription,
            RegistrationStep::AwaitingConfirmation | RegistrationStep::Done => {
                Prompt::AskConfirmation
            }
        }
    }

    /// Localization key of the question
    pub fn key(&self) -> &'static str {
        match self {
            Prompt::AskNickname => "ask-nickname",
            Prompt::AskSberId => "ask-sber-id",
            Prompt::AskTeamName => "ask-team-name",
            Prompt::AskRoleLevel => "ask-role-level",
            Prompt::AskDescription => "ask-description",
            Prompt::AskConfirmation => "ask-confirmation",
        }
    }
}

/// Result of feeding one answer into the dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Value stored, timer re-armed, ask this next
    Advanced(Prompt),
    /// Value refused, dialog stays on the same step
    Rejected(ValidationError),
    /// The current step does not take this kind of input
    Repeat(Prompt),
    NoSession,
}

/// Result of a confirmation request
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Registered(UserRecord),
    /// A registered user already owns this value; the session stays open
    Duplicate(String),
    /// Fields are still missing; ask this
    NotReady(Prompt),
    NoSession,
}

pub struct RegistrationController {
    store: Arc<dyn UserStore>,
    sessions: SessionRegistry,
}

impl RegistrationController {
    pub fn new(
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn RegistrationNotifier>,
        timeout: Duration,
    ) -> Self {
        let sessions = SessionRegistry::new(Arc::clone(&store), notifier, timeout);
        Self { store, sessions }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Begin a fresh registration, dropping any session already in flight
    pub async fn start(&self, identity: UserIdentity) -> Result<Prompt, RegistrationError> {
        let mut guard = self.sessions.lock(identity.telegram_id).await;
        let levels = self.store.levels().await?;

        info!(user_id = %identity.telegram_id, "Registration started");
        guard.begin(RegistrationSession::new(
            identity,
            CollectedFields::default(),
            levels,
        ));
        Ok(Prompt::AskNickname)
    }

    /// Continue a previous attempt.
    ///
    /// A session still in flight is kept and its timer restarted. Otherwise
    /// the stored incomplete record is rebuilt into a session; missing or
    /// already registered records start from scratch.
    pub async fn resume(&self, identity: UserIdentity) -> Result<Prompt, RegistrationError> {
        let mut guard = self.sessions.lock(identity.telegram_id).await;
        if let Some(step) = guard.session().map(RegistrationSession::step) {
            guard.rearm();
            debug!(user_id = %identity.telegram_id, step = ?step, "Session in flight resumed");
            return Ok(Prompt::for_step(step));
        }

        let record = self.store.find_user(identity.telegram_id).await?;
        let levels = self.store.levels().await?;
        let fields = match record {
            Some(record) if !record.is_registered => CollectedFields::from_record(&record, &levels),
            _ => CollectedFields::default(),
        };
        let step = fields.first_missing();

        info!(
            user_id = %identity.telegram_id,
            step = ?step,
            "Registration resumed"
        );
        guard.begin(RegistrationSession::new(identity, fields, levels));
        Ok(Prompt::for_step(step))
    }

    /// Feed a text answer to the current step
    pub async fn submit_text(
        &self,
        telegram_id: i64,
        text: &str,
    ) -> Result<StepOutcome, RegistrationError> {
        let mut guard = self.sessions.lock(telegram_id).await;
        let Some(step) = guard.session().map(RegistrationSession::step) else {
            return Ok(StepOutcome::NoSession);
        };
        let value = text.trim();

        let verdict = match step {
            RegistrationStep::AwaitingNickname => {
                validate_nickname(value, self.store.as_ref()).await?
            }
            RegistrationStep::AwaitingSberId => validate_sber_id(value),
            RegistrationStep::AwaitingTeamName => validate_team_name(value),
            RegistrationStep::AwaitingRoleLevel => {
                let levels = guard.session().map(|s| s.levels.as_slice()).unwrap_or_default();
                validate_role_level(value, levels)
            }
            RegistrationStep::AwaitingActivityDescription => validate_description(value),
            RegistrationStep::AwaitingConfirmation | RegistrationStep::Done => {
                return Ok(StepOutcome::Repeat(Prompt::AskConfirmation));
            }
        };

        if let Err(rule) = verdict {
            debug!(user_id = %telegram_id, step = ?step, rule = %rule, "Answer rejected");
            return Ok(StepOutcome::Rejected(rule));
        }

        let next = match guard.session_mut() {
            Some(session) => {
                session.fields.set(step, value.to_string());
                session.step()
            }
            None => return Ok(StepOutcome::NoSession),
        };
        guard.rearm();

        debug!(user_id = %telegram_id, step = ?next, "Registration advanced");
        Ok(StepOutcome::Advanced(Prompt::for_step(next)))
    }

    /// Skip the activity description
    pub async fn skip_description(&self, telegram_id: i64) -> Result<StepOutcome, RegistrationError> {
        let mut guard = self.sessions.lock(telegram_id).await;
        let next = match guard.session_mut() {
            None => return Ok(StepOutcome::NoSession),
            Some(session) if session.step() != RegistrationStep::AwaitingActivityDescription => {
                return Ok(StepOutcome::Repeat(Prompt::for_step(session.step())));
            }
            Some(session) => {
                session.fields.set(
                    RegistrationStep::AwaitingActivityDescription,
                    SKIPPED_DESCRIPTION.to_string(),
                );
                session.step()
            }
        };
        guard.rearm();

        debug!(user_id = %telegram_id, "Description skipped");
        Ok(StepOutcome::Advanced(Prompt::for_step(next)))
    }

    /// Commit the session as a registered user.
    ///
    /// The write happens under the session lock. On a uniqueness conflict
    /// the session and its timer stay as they were.
    pub async fn confirm(&self, telegram_id: i64) -> Result<ConfirmOutcome, RegistrationError> {
        let mut guard = self.sessions.lock(telegram_id).await;
        let Some(session) = guard.session() else {
            return Ok(ConfirmOutcome::NoSession);
        };
        let Some(upsert) = session.completion_upsert() else {
            return Ok(ConfirmOutcome::NotReady(Prompt::for_step(session.step())));
        };

        match self.store.upsert_user(&upsert).await {
            Ok(record) => {
                guard.finish();
                info!(user_id = %telegram_id, "Registration completed");
                Ok(ConfirmOutcome::Registered(record))
            }
            Err(StoreError::Duplicate { field }) => {
                warn!(user_id = %telegram_id, field = %field, "Registration hit a duplicate value");
                Ok(ConfirmOutcome::Duplicate(field))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the session and its timer without writing anything
    pub async fn cancel(&self, telegram_id: i64) -> bool {
        let mut guard = self.sessions.lock(telegram_id).await;
        let cancelled = guard.finish().is_some();
        if cancelled {
            info!(user_id = %telegram_id, "Registration cancelled");
        }
        cancelled
    }

    /// Abandon the session now, as if its timer had fired
    pub async fn expire(&self, telegram_id: i64) -> bool {
        self.sessions.expire(telegram_id).await
    }

    /// Step of the session in progress, if any
    pub async fn current_step(&self, telegram_id: i64) -> Option<RegistrationStep> {
        self.sessions
            .lock(telegram_id)
            .await
            .session()
            .map(RegistrationSession::step)
    }

    /// Snapshot of the session in progress, if any
    pub async fn session(&self, telegram_id: i64) -> Option<RegistrationSession> {
        self.sessions.lock(telegram_id).await.session().cloned()
    }
}
