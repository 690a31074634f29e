//! # Store Module
//!
//! Persistence seam of the bot. The registration core and the search flow
//! only talk to [`UserStore`]; `db::PgUserStore` backs it with Postgres and
//! [`MemoryUserStore`] keeps everything in process.

mod memory;

pub use memory::MemoryUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Placeholder written for every profile field the user never supplied
pub const EMPTY_SENTINEL: &str = "Пусто";

/// Id of the "not important" level, used when no level could be parsed
pub const DEFAULT_LEVEL_ID: i32 = 1;

/// Levels seeded into an empty taxonomy, in load order
pub const DEFAULT_LEVELS: [(i32, &str); 6] = [
    (1, "Не важно"),
    (2, "Junior"),
    (3, "Middle"),
    (4, "Senior"),
    (5, "Lead"),
    (6, "Стажер"),
];

/// A named tier of the level taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: i32,
    pub name: String,
}

impl Level {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The seeded taxonomy
    pub fn defaults() -> Vec<Level> {
        DEFAULT_LEVELS
            .iter()
            .map(|(id, name)| Level::new(*id, *name))
            .collect()
    }
}

/// Persistent user row
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub sber_id: String,
    pub school21_nickname: String,
    pub team_name: String,
    pub role: String,
    pub level_id: i32,
    pub description: String,
    pub is_admin: bool,
    pub is_registered: bool,
    /// First step the user did not complete; `None` once registered
    pub field_not_filled: Option<String>,
    pub registration_date: DateTime<Utc>,
}

/// Upsert payload keyed by `telegram_id`.
///
/// `None` profile fields keep the stored value on update and fall back to
/// [`EMPTY_SENTINEL`] (or [`DEFAULT_LEVEL_ID`]) on insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserUpsert {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub sber_id: Option<String>,
    pub school21_nickname: Option<String>,
    pub team_name: Option<String>,
    pub role: Option<String>,
    pub level_id: Option<i32>,
    pub description: Option<String>,
    pub is_registered: bool,
    pub field_not_filled: Option<String>,
}

/// Filter and window for the peer search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub role: String,
    /// `None` matches every level
    pub level_id: Option<i32>,
    pub offset: usize,
    pub limit: usize,
}

/// Short listing entry of the peer search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub sber_id: String,
    pub team_name: String,
}

/// One window of search results plus the total match count
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    pub users: Vec<UserSummary>,
    pub total: usize,
}

/// Public profile shown when a search entry is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCard {
    pub sber_id: String,
    pub username: Option<String>,
    pub school21_nickname: String,
    pub role: String,
    pub level_name: String,
    pub description: String,
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn find_user(&self, telegram_id: i64) -> Result<Option<UserRecord>, StoreError>;

    /// Create the row for `upsert.telegram_id` or update it in place
    async fn upsert_user(&self, upsert: &UserUpsert) -> Result<UserRecord, StoreError>;

    /// Whether a registered user already owns this nickname (exact match)
    async fn is_nickname_registered(&self, nickname: &str) -> Result<bool, StoreError>;

    /// Level taxonomy ordered by id
    async fn levels(&self) -> Result<Vec<Level>, StoreError>;

    /// Distinct roles of registered users, sentinel excluded
    async fn registered_roles(&self) -> Result<Vec<String>, StoreError>;

    async fn search_users(&self, query: &SearchQuery) -> Result<SearchPage, StoreError>;

    /// Card of a registered user; `None` for unknown or unregistered ids
    async fn user_card(&self, id: i64) -> Result<Option<UserCard>, StoreError>;
}
