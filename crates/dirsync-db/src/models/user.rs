//! Synced user model.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use dirsync_connector::user::UserRecord;

use crate::error::DbError;

/// Rows per INSERT statement; ten binds each keeps well below the protocol
/// limit of 65535 parameters.
const UPSERT_CHUNK: usize = 1000;

/// Row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub username: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub source_id: Option<i64>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub async fn find_by_username(
        pool: &sqlx::PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM users
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_by_source(pool: &sqlx::PgPool, source_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE source_id = $1")
            .bind(source_id)
            .fetch_one(pool)
            .await
    }

    /// Insert or update by username. The primary id is kept on conflict.
    ///
    /// Duplicate usernames within `users` collapse to the last occurrence,
    /// since one statement cannot update the same row twice.
    pub async fn upsert_batch(pool: &sqlx::PgPool, users: &[UserRecord]) -> Result<u64, DbError> {
        let users = last_per_username(users);
        if users.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut rows = Vec::with_capacity(users.len());
        for user in users {
            rows.push((user, super::db_id(user.source_id)?));
        }

        let mut written = 0;
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO users (external_id, username, full_name, phone_number, email, \
                 active, source_id, data, created_at, updated_at) ",
            );
            qb.push_values(chunk, |mut b, (user, source_id)| {
                b.push_bind(&user.external_id)
                    .push_bind(&user.username)
                    .push_bind(&user.full_name)
                    .push_bind(&user.phone_number)
                    .push_bind(&user.email)
                    .push_bind(user.active)
                    .push_bind(*source_id)
                    .push_bind(&user.data)
                    .push_bind(user.created_at.unwrap_or(now))
                    .push_bind(user.updated_at.unwrap_or(now));
            });
            qb.push(
                r"
                ON CONFLICT (username) DO UPDATE SET
                    external_id = EXCLUDED.external_id,
                    full_name = EXCLUDED.full_name,
                    phone_number = EXCLUDED.phone_number,
                    email = EXCLUDED.email,
                    active = EXCLUDED.active,
                    source_id = EXCLUDED.source_id,
                    data = EXCLUDED.data,
                    created_at = EXCLUDED.created_at,
                    updated_at = EXCLUDED.updated_at
                ",
            );

            let result = qb
                .build()
                .execute(pool)
                .await
                .map_err(DbError::QueryFailed)?;
            written += result.rows_affected();
        }

        Ok(written)
    }
}

fn last_per_username(users: &[UserRecord]) -> Vec<&UserRecord> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(users.len());
    let mut kept: Vec<&UserRecord> = Vec::with_capacity(users.len());
    for user in users {
        match position.get(user.username.as_str()) {
            Some(&i) => kept[i] = user,
            None => {
                position.insert(&user.username, kept.len());
                kept.push(user);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsync_core::ConnectorId;
    use serde_json::json;

    fn user(username: &str, email: &str) -> UserRecord {
        UserRecord {
            external_id: None,
            username: username.to_string(),
            full_name: None,
            phone_number: None,
            email: Some(email.to_string()),
            active: true,
            source_id: ConnectorId::new(1),
            data: json!({}),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_last_per_username_keeps_order_and_last_value() {
        let users = vec![
            user("alice", "a1@example.com"),
            user("bob", "b@example.com"),
            user("alice", "a2@example.com"),
        ];
        let kept = last_per_username(&users);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].username, "alice");
        assert_eq!(kept[0].email.as_deref(), Some("a2@example.com"));
        assert_eq!(kept[1].username, "bob");
    }
}
