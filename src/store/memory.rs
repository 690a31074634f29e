use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    Level, SearchPage, SearchQuery, UserCard, UserRecord, UserStore, UserSummary, UserUpsert,
    DEFAULT_LEVEL_ID, EMPTY_SENTINEL,
};
use crate::errors::StoreError;

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<UserRecord>,
    levels: Vec<Level>,
    next_id: i64,
}

/// In-process [`UserStore`] with the same uniqueness rules as the Postgres
/// schema. Counts successful writes.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    state: Mutex<MemoryState>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryUserStore {
    /// Store seeded with the default level taxonomy
    pub fn new() -> Self {
        Self::with_levels(Level::defaults())
    }

    pub fn with_levels(levels: Vec<Level>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                users: Vec::new(),
                levels,
                next_id: 1,
            }),
            writes: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of successful `upsert_user` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Replace the level taxonomy
    pub async fn set_levels(&self, levels: Vec<Level>) {
        self.state.lock().await.levels = levels;
    }

    /// Insert a complete row as-is (fixtures for tests and tooling)
    pub async fn insert_record(&self, mut record: UserRecord) -> UserRecord {
        let mut state = self.state.lock().await;
        record.id = state.next_id;
        state.next_id += 1;
        state.users.retain(|u| u.telegram_id != record.telegram_id);
        state.users.push(record.clone());
        record
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn duplicate(field: &str) -> StoreError {
    StoreError::Duplicate {
        field: field.to_string(),
    }
}

fn check_unique(users: &[UserRecord], candidate: &UserRecord) -> Result<(), StoreError> {
    for other in users.iter().filter(|u| u.telegram_id != candidate.telegram_id) {
        if candidate.username.is_some() && other.username == candidate.username {
            return Err(duplicate("username"));
        }
        if candidate.is_registered && other.is_registered {
            if other.school21_nickname == candidate.school21_nickname {
                return Err(duplicate("school21_nickname"));
            }
            if other.sber_id == candidate.sber_id {
                return Err(duplicate("sber_id"));
            }
        }
    }
    Ok(())
}

fn matches_query(user: &UserRecord, query: &SearchQuery) -> bool {
    user.is_registered
        && user.role == query.role
        && query.level_id.map_or(true, |level_id| user.level_id == level_id)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user(&self, telegram_id: i64) -> Result<Option<UserRecord>, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_id)
            .cloned())
    }

    async fn upsert_user(&self, upsert: &UserUpsert) -> Result<UserRecord, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let existing = state
            .users
            .iter()
            .position(|u| u.telegram_id == upsert.telegram_id);

        let candidate = match existing {
            Some(index) => {
                let current = &state.users[index];
                UserRecord {
                    username: upsert.username.clone().or_else(|| current.username.clone()),
                    sber_id: upsert.sber_id.clone().unwrap_or_else(|| current.sber_id.clone()),
                    school21_nickname: upsert
                        .school21_nickname
                        .clone()
                        .unwrap_or_else(|| current.school21_nickname.clone()),
                    team_name: upsert.team_name.clone().unwrap_or_else(|| current.team_name.clone()),
                    role: upsert.role.clone().unwrap_or_else(|| current.role.clone()),
                    level_id: upsert.level_id.unwrap_or(current.level_id),
                    description: upsert
                        .description
                        .clone()
                        .unwrap_or_else(|| current.description.clone()),
                    is_registered: upsert.is_registered,
                    field_not_filled: upsert.field_not_filled.clone(),
                    ..current.clone()
                }
            }
            None => {
                let or_empty = |value: &Option<String>| {
                    value.clone().unwrap_or_else(|| EMPTY_SENTINEL.to_string())
                };
                UserRecord {
                    id: state.next_id,
                    telegram_id: upsert.telegram_id,
                    username: upsert.username.clone(),
                    sber_id: or_empty(&upsert.sber_id),
                    school21_nickname: or_empty(&upsert.school21_nickname),
                    team_name: or_empty(&upsert.team_name),
                    role: or_empty(&upsert.role),
                    level_id: upsert.level_id.unwrap_or(DEFAULT_LEVEL_ID),
                    description: or_empty(&upsert.description),
                    is_admin: false,
                    is_registered: upsert.is_registered,
                    field_not_filled: upsert.field_not_filled.clone(),
                    registration_date: Utc::now(),
                }
            }
        };

        check_unique(&state.users, &candidate)?;

        match existing {
            Some(index) => state.users[index] = candidate.clone(),
            None => {
                state.next_id += 1;
                state.users.push(candidate.clone());
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(candidate)
    }

    async fn is_nickname_registered(&self, nickname: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .any(|u| u.is_registered && u.school21_nickname == nickname))
    }

    async fn levels(&self) -> Result<Vec<Level>, StoreError> {
        self.check_available()?;
        let mut levels = self.state.lock().await.levels.clone();
        levels.sort_by_key(|level| level.id);
        Ok(levels)
    }

    async fn registered_roles(&self) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let mut roles: Vec<String> = state
            .users
            .iter()
            .filter(|u| u.is_registered && u.role != EMPTY_SENTINEL)
            .map(|u| u.role.clone())
            .collect();
        roles.sort();
        roles.dedup();
        Ok(roles)
    }

    async fn search_users(&self, query: &SearchQuery) -> Result<SearchPage, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let matching: Vec<&UserRecord> = state
            .users
            .iter()
            .filter(|u| matches_query(u, query))
            .collect();

        let users = matching
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|u| UserSummary {
                id: u.id,
                sber_id: u.sber_id.clone(),
                team_name: u.team_name.clone(),
            })
            .collect();

        Ok(SearchPage {
            users,
            total: matching.len(),
        })
    }

    async fn user_card(&self, id: i64) -> Result<Option<UserCard>, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let Some(user) = state.users.iter().find(|u| u.id == id && u.is_registered) else {
            return Ok(None);
        };
        let level_name = state
            .levels
            .iter()
            .find(|level| level.id == user.level_id)
            .map(|level| level.name.clone())
            .unwrap_or_default();

        Ok(Some(UserCard {
            sber_id: user.sber_id.clone(),
            username: user.username.clone(),
            school21_nickname: user.school21_nickname.clone(),
            role: user.role.clone(),
            level_name,
            description: user.description.clone(),
        }))
    }
}
