// Credential store: persisted user records and their active refresh tokens

use std::collections::HashMap;

use axum::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    error::AuthError,
    models::{NewUser, User},
};

/// Fingerprint a refresh token using SHA-256
///
/// Only fingerprints are stored, so a leaked users table does not hand out
/// usable refresh tokens.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage operations the session manager depends on
///
/// Emails are passed in already normalized. `set_refresh_tokens` replaces the
/// whole set in one write; there is no compare-and-swap, so concurrent
/// writers for the same user resolve as last-writer-wins.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user, failing with `EmailAlreadyExists` on a duplicate email
    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Overwrite the active refresh-token set of a user
    async fn set_refresh_tokens(&self, id: Uuid, tokens: Vec<String>) -> Result<(), AuthError>;

    /// Update display name and/or email; `None` fields are left unchanged
    async fn update_profile(
        &self,
        id: Uuid,
        full_name: Option<String>,
        email: Option<String>,
    ) -> Result<Option<User>, AuthError>;

    /// Replace the stored password hash; returns false if the user is gone
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AuthError>;

    /// Administrative removal; not reachable over HTTP
    async fn delete_user(&self, id: Uuid) -> Result<bool, AuthError>;
}

fn map_unique_violation(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AuthError::EmailAlreadyExists;
        }
    }
    AuthError::DatabaseError(e.to_string())
}

/// PostgreSQL-backed user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new PgUserStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, profile_picture)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, full_name, profile_picture, refresh_tokens, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.full_name)
        .bind(&new_user.profile_picture)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, profile_picture, refresh_tokens, created_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, profile_picture, refresh_tokens, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_refresh_tokens(&self, id: Uuid, tokens: Vec<String>) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET refresh_tokens = $1 WHERE id = $2")
            .bind(tokens)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        full_name: Option<String>,
        email: Option<String>,
    ) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = COALESCE($1, full_name),
                email = COALESCE($2, email)
            WHERE id = $3
            RETURNING id, email, password_hash, full_name, profile_picture, refresh_tokens, created_at
            "#,
        )
        .bind(full_name)
        .bind(email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-process user store for tests and local experiments
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(AuthError::EmailAlreadyExists);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            full_name: new_user.full_name,
            profile_picture: new_user.profile_picture,
            refresh_tokens: Vec::new(),
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn set_refresh_tokens(&self, id: Uuid, tokens: Vec<String>) -> Result<(), AuthError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.refresh_tokens = tokens;
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        full_name: Option<String>,
        email: Option<String>,
    ) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;

        if let Some(ref new_email) = email {
            if users
                .values()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(new_email))
            {
                return Err(AuthError::EmailAlreadyExists);
            }
        }

        Ok(users.get_mut(&id).map(|user| {
            if let Some(full_name) = full_name {
                user.full_name = full_name;
            }
            if let Some(email) = email {
                user.email = email;
            }
            user.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AuthError> {
        Ok(match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AuthError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
