//! # Session Registry
//!
//! In-flight registrations live here, one slot per Telegram user. Each slot
//! is guarded by its own async mutex and carries the abandonment timer.
//!
//! The timer task locks the same slot before it touches anything and only
//! acts when the slot generation still matches the one it was armed with.
//! Re-arming bumps the generation and aborts the previous task, so a timer
//! that lost the race to a user action never writes or notifies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::registration::fields::{CollectedFields, RegistrationStep};
use crate::registration::levels::{parse_level_and_role, ParsedRoleLevel};
use crate::store::{Level, UserStore, UserUpsert, DEFAULT_LEVEL_ID, EMPTY_SENTINEL};

/// Who is registering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub telegram_id: i64,
    pub username: Option<String>,
    /// Telegram client language, used to localize the interruption notice
    pub language_code: Option<String>,
}

impl UserIdentity {
    pub fn new(telegram_id: i64, username: Option<String>) -> Self {
        Self {
            telegram_id,
            username,
            language_code: None,
        }
    }

    pub fn with_language(mut self, language_code: Option<String>) -> Self {
        self.language_code = language_code;
        self
    }
}

/// One registration in progress
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationSession {
    pub identity: UserIdentity,
    pub fields: CollectedFields,
    /// Level taxonomy loaded when the session was created
    pub levels: Vec<Level>,
}

impl RegistrationSession {
    pub fn new(identity: UserIdentity, fields: CollectedFields, levels: Vec<Level>) -> Self {
        Self {
            identity,
            fields,
            levels,
        }
    }

    /// Steps are filled strictly in order, so the current step is the first
    /// missing field.
    pub fn step(&self) -> RegistrationStep {
        self.fields.first_missing()
    }

    fn parsed_role_level(&self) -> Option<ParsedRoleLevel> {
        self.fields
            .role_level
            .as_deref()
            .map(|text| parse_level_and_role(text, &self.levels))
    }

    /// Payload written when the user stalls: sentinels for every missing
    /// field and the first missing step in `field_not_filled`.
    pub fn abandonment_upsert(&self) -> UserUpsert {
        let or_empty = |value: &Option<String>| {
            Some(value.clone().unwrap_or_else(|| EMPTY_SENTINEL.to_string()))
        };
        let parsed = self.parsed_role_level();

        UserUpsert {
            telegram_id: self.identity.telegram_id,
            username: self.identity.username.clone(),
            school21_nickname: or_empty(&self.fields.school21_nickname),
            sber_id: or_empty(&self.fields.sber_id),
            team_name: or_empty(&self.fields.team_name),
            role: Some(
                parsed
                    .as_ref()
                    .map(|p| p.role.clone())
                    .unwrap_or_else(|| EMPTY_SENTINEL.to_string()),
            ),
            level_id: Some(parsed.map(|p| p.level_id).unwrap_or(DEFAULT_LEVEL_ID)),
            description: or_empty(&self.fields.activity_description),
            is_registered: false,
            field_not_filled: self.step().field_name().map(str::to_string),
        }
    }

    /// Payload written on confirmation. `None` until all five fields exist.
    pub fn completion_upsert(&self) -> Option<UserUpsert> {
        if !self.fields.is_complete() {
            return None;
        }
        let parsed = self.parsed_role_level()?;

        Some(UserUpsert {
            telegram_id: self.identity.telegram_id,
            username: self.identity.username.clone(),
            school21_nickname: self.fields.school21_nickname.clone(),
            sber_id: self.fields.sber_id.clone(),
            team_name: self.fields.team_name.clone(),
            role: Some(parsed.role),
            level_id: Some(parsed.level_id),
            description: self.fields.activity_description.clone(),
            is_registered: true,
            field_not_filled: None,
        })
    }
}

/// Outbound side of the abandonment timer
#[async_trait]
pub trait RegistrationNotifier: Send + Sync + 'static {
    /// Tell the user their registration was interrupted and saved as is
    async fn registration_interrupted(&self, identity: &UserIdentity);
}

#[derive(Debug, Default)]
struct SessionSlot {
    session: Option<RegistrationSession>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    /// Set once the slot has been removed from the registry
    retired: bool,
}

struct Shared {
    slots: DashMap<i64, Arc<Mutex<SessionSlot>>>,
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn RegistrationNotifier>,
    timeout: Duration,
}

/// Per-user session slots with their abandonment timers
#[derive(Clone)]
pub struct SessionRegistry {
    shared: Arc<Shared>,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn RegistrationNotifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: DashMap::new(),
                store,
                notifier,
                timeout,
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Number of users with a session in progress
    pub fn active_sessions(&self) -> usize {
        self.shared.slots.len()
    }

    /// Lock the slot of `telegram_id`, creating it if needed
    pub async fn lock(&self, telegram_id: i64) -> SessionGuard {
        loop {
            let slot = self.shared.slots.entry(telegram_id).or_default().clone();
            let inner = Arc::clone(&slot).lock_owned().await;
            // The slot may have been retired while we waited for it
            if !inner.retired {
                return SessionGuard {
                    shared: Arc::clone(&self.shared),
                    telegram_id,
                    slot,
                    inner,
                };
            }
        }
    }

    /// Abandon the session right away, exactly as if its timer had fired.
    /// Returns `false` when there was nothing to abandon.
    pub async fn expire(&self, telegram_id: i64) -> bool {
        let guard = self.lock(telegram_id).await;
        abandon(guard).await
    }
}

/// Exclusive access to one user's slot
pub struct SessionGuard {
    shared: Arc<Shared>,
    telegram_id: i64,
    slot: Arc<Mutex<SessionSlot>>,
    inner: OwnedMutexGuard<SessionSlot>,
}

impl SessionGuard {
    pub fn session(&self) -> Option<&RegistrationSession> {
        self.inner.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut RegistrationSession> {
        self.inner.session.as_mut()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.timer.is_some()
    }

    /// Install a new session, replacing any previous one, and arm its timer
    pub fn begin(&mut self, session: RegistrationSession) {
        self.inner.session = Some(session);
        self.arm();
    }

    /// Restart the timer of the current session
    pub fn rearm(&mut self) {
        if self.inner.session.is_some() {
            self.arm();
        }
    }

    /// End the session without persisting anything
    pub fn finish(&mut self) -> Option<RegistrationSession> {
        self.disarm();
        self.inner.session.take()
    }

    fn arm(&mut self) {
        self.disarm();
        self.inner.generation += 1;

        let generation = self.inner.generation;
        let telegram_id = self.telegram_id;
        let shared = Arc::clone(&self.shared);
        let slot = Arc::clone(&self.slot);
        self.inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(shared.timeout).await;
            fire(shared, slot, telegram_id, generation).await;
        }));
        debug!(user_id = %telegram_id, generation, "Abandonment timer armed");
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.inner.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.inner.session.is_none() && !self.inner.retired {
            self.inner.retired = true;
            let slot = &self.slot;
            self.shared
                .slots
                .remove_if(&self.telegram_id, |_, current| Arc::ptr_eq(current, slot));
        }
    }
}

async fn fire(
    shared: Arc<Shared>,
    slot: Arc<Mutex<SessionSlot>>,
    telegram_id: i64,
    generation: u64,
) {
    let inner = Arc::clone(&slot).lock_owned().await;
    if inner.retired || inner.generation != generation || inner.session.is_none() {
        debug!(user_id = %telegram_id, generation, "Stale abandonment timer ignored");
        return;
    }

    let mut guard = SessionGuard {
        shared,
        telegram_id,
        slot,
        inner,
    };
    // This task is the armed timer; dropping the handle detaches it.
    guard.inner.timer = None;
    abandon(guard).await;
}

/// Persist the partial session, end it, then notify the user.
///
/// The write and the notification both happen while the slot is still
/// locked, so a registration started right after expiry never sees the
/// notifier's dialogue reset. A failed write is logged and not retried;
/// the user is notified either way.
async fn abandon(mut guard: SessionGuard) -> bool {
    let Some(session) = guard.finish() else {
        return false;
    };
    let telegram_id = guard.telegram_id;
    let upsert = session.abandonment_upsert();

    match guard.shared.store.upsert_user(&upsert).await {
        Ok(_) => info!(
            user_id = %telegram_id,
            field_not_filled = ?upsert.field_not_filled,
            "Abandoned registration saved"
        ),
        Err(e) => error!(
            user_id = %telegram_id,
            error = %e,
            "Failed to save abandoned registration"
        ),
    }

    let notifier = Arc::clone(&guard.shared.notifier);
    notifier.registration_interrupted(&session.identity).await;
    drop(guard);
    true
}
