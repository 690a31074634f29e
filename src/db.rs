//! # Database Module
//!
//! Postgres backend of [`UserStore`]: schema bootstrap, level seeding and
//! the user queries used by registration and peer search.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::store::{
    Level, SearchPage, SearchQuery, UserCard, UserRecord, UserStore, UserSummary, UserUpsert,
    DEFAULT_LEVELS, DEFAULT_LEVEL_ID, EMPTY_SENTINEL,
};

/// Postgres code for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str = "id, telegram_id, username, sber_id, school21_nickname, team_name, \
     role, level_id, description, is_admin, is_registered, field_not_filled, registration_date";

/// Create tables and indexes if missing, then seed an empty level taxonomy
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS levels (
            id INTEGER PRIMARY KEY,
            name VARCHAR(64) NOT NULL UNIQUE
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create levels table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            telegram_id BIGINT NOT NULL UNIQUE,
            username VARCHAR(256) UNIQUE,
            sber_id VARCHAR(256) NOT NULL,
            school21_nickname VARCHAR(256) NOT NULL,
            team_name VARCHAR(256) NOT NULL,
            role VARCHAR(256) NOT NULL,
            level_id INTEGER NOT NULL REFERENCES levels(id),
            description VARCHAR(1024) NOT NULL,
            is_admin BOOLEAN NOT NULL DEFAULT FALSE,
            is_registered BOOLEAN NOT NULL DEFAULT FALSE,
            field_not_filled VARCHAR(64),
            registration_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    // Abandoned rows share the sentinel, so uniqueness only binds registered users
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS users_registered_nickname_idx
         ON users (school21_nickname) WHERE is_registered",
    )
    .execute(pool)
    .await
    .context("Failed to create nickname index")?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS users_registered_sber_id_idx
         ON users (sber_id) WHERE is_registered",
    )
    .execute(pool)
    .await
    .context("Failed to create sber id index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS users_role_idx ON users (role, level_id)")
        .execute(pool)
        .await
        .context("Failed to create role index")?;

    seed_levels(pool).await?;

    info!("Database schema initialized successfully");
    Ok(())
}

async fn seed_levels(pool: &PgPool) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM levels")
        .fetch_one(pool)
        .await
        .context("Failed to count levels")?;
    if count > 0 {
        return Ok(());
    }

    for (id, name) in DEFAULT_LEVELS {
        sqlx::query("INSERT INTO levels (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to seed level {name}"))?;
    }
    info!(levels = DEFAULT_LEVELS.len(), "Seeded level taxonomy");
    Ok(())
}

/// Translate unique violations into [`StoreError::Duplicate`]
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let field = match db.constraint() {
                Some("users_username_key") => "username".to_string(),
                Some("users_registered_nickname_idx") => "school21_nickname".to_string(),
                Some("users_registered_sber_id_idx") => "sber_id".to_string(),
                Some("users_telegram_id_key") => "telegram_id".to_string(),
                Some(other) => other.to_string(),
                None => "unknown".to_string(),
            };
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Unavailable(e)
}

fn record_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        telegram_id: row.get("telegram_id"),
        username: row.get("username"),
        sber_id: row.get("sber_id"),
        school21_nickname: row.get("school21_nickname"),
        team_name: row.get("team_name"),
        role: row.get("role"),
        level_id: row.get("level_id"),
        description: row.get("description"),
        is_admin: row.get("is_admin"),
        is_registered: row.get("is_registered"),
        field_not_filled: row.get("field_not_filled"),
        registration_date: row.get("registration_date"),
    }
}

/// [`UserStore`] on a Postgres pool
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_user(&self, telegram_id: i64) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE telegram_id = $1"
        ))
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn upsert_user(&self, upsert: &UserUpsert) -> Result<UserRecord, StoreError> {
        debug!(
            user_id = %upsert.telegram_id,
            is_registered = upsert.is_registered,
            "Upserting user"
        );

        let row = sqlx::query(&format!(
            "INSERT INTO users (telegram_id, username, sber_id, school21_nickname, team_name,
                                role, level_id, description, is_registered, field_not_filled)
             VALUES ($1, $2, COALESCE($3, $11), COALESCE($4, $11), COALESCE($5, $11),
                     COALESCE($6, $11), COALESCE($7, $12), COALESCE($8, $11), $9, $10)
             ON CONFLICT (telegram_id) DO UPDATE SET
                username = COALESCE($2, users.username),
                sber_id = COALESCE($3, users.sber_id),
                school21_nickname = COALESCE($4, users.school21_nickname),
                team_name = COALESCE($5, users.team_name),
                role = COALESCE($6, users.role),
                level_id = COALESCE($7, users.level_id),
                description = COALESCE($8, users.description),
                is_registered = $9,
                field_not_filled = $10
             RETURNING {USER_COLUMNS}"
        ))
        .bind(upsert.telegram_id)
        .bind(&upsert.username)
        .bind(&upsert.sber_id)
        .bind(&upsert.school21_nickname)
        .bind(&upsert.team_name)
        .bind(&upsert.role)
        .bind(upsert.level_id)
        .bind(&upsert.description)
        .bind(upsert.is_registered)
        .bind(&upsert.field_not_filled)
        .bind(EMPTY_SENTINEL)
        .bind(DEFAULT_LEVEL_ID)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(record_from_row(&row))
    }

    async fn is_nickname_registered(&self, nickname: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE is_registered AND school21_nickname = $1)",
        )
        .bind(nickname)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn levels(&self) -> Result<Vec<Level>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM levels ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| Level::new(row.get("id"), row.get::<String, _>("name")))
            .collect())
    }

    async fn registered_roles(&self) -> Result<Vec<String>, StoreError> {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT role FROM users WHERE is_registered AND role <> $1 ORDER BY role",
        )
        .bind(EMPTY_SENTINEL)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn search_users(&self, query: &SearchQuery) -> Result<SearchPage, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
             WHERE is_registered AND role = $1 AND ($2::INTEGER IS NULL OR level_id = $2)",
        )
        .bind(&query.role)
        .bind(query.level_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            "SELECT id, sber_id, team_name FROM users
             WHERE is_registered AND role = $1 AND ($2::INTEGER IS NULL OR level_id = $2)
             ORDER BY id
             LIMIT $3 OFFSET $4",
        )
        .bind(&query.role)
        .bind(query.level_id)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .iter()
            .map(|row| UserSummary {
                id: row.get("id"),
                sber_id: row.get("sber_id"),
                team_name: row.get("team_name"),
            })
            .collect();

        Ok(SearchPage {
            users,
            total: usize::try_from(total).unwrap_or_default(),
        })
    }

    async fn user_card(&self, id: i64) -> Result<Option<UserCard>, StoreError> {
        let row = sqlx::query(
            "SELECT u.sber_id, u.username, u.school21_nickname, u.role, u.description,
                    COALESCE(l.name, '') AS level_name
             FROM users u LEFT JOIN levels l ON l.id = u.level_id
             WHERE u.id = $1 AND u.is_registered",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserCard {
            sber_id: row.get("sber_id"),
            username: row.get("username"),
            school21_nickname: row.get("school21_nickname"),
            role: row.get("role"),
            level_name: row.get("level_name"),
            description: row.get("description"),
        }))
    }
}
