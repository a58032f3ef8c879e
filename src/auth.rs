//! Account registration and login over the `users` table.
//!
//! Passwords are stored as unsalted SHA-256 hex digests. That is a fast hash
//! and only suitable for a local, single-user threat model. Login does not
//! distinguish an unknown email from a wrong password.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Role, SessionUser};

pub const REGISTERED_MESSAGE: &str = "Registration successful! Please login.";
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid email or password.";

pub const GUEST_ID: &str = "guest_user";
pub const GUEST_EMAIL: &str = "guest@example.com";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered.")]
    AlreadyRegistered,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Email and password are required.")]
    MissingCredentials,
    #[error("{0}")]
    Storage(#[from] sqlx::Error),
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Sign-up form check performed before [`AuthStore::register`].
pub fn validate_signup(email: &str, password: &str, confirm: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

/// Fixed pseudo-account; nothing is stored.
pub fn guest() -> SessionUser {
    SessionUser {
        id: GUEST_ID.to_string(),
        email: GUEST_EMAIL.to_string(),
        role: Role::Guest,
        is_authenticated: true,
    }
}

#[derive(Clone)]
pub struct AuthStore {
    pool: SqlitePool,
}

impl AuthStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an account. Emails are compared exactly, case included.
    pub async fn register(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let existing: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AuthError::AlreadyRegistered);
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, role, created_at, last_login) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(hash_password(password))
        .bind(Role::Registered.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(email, "registered user");
                Ok(REGISTERED_MESSAGE.to_string())
            }
            // A concurrent registration can slip past the lookup above.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AuthError::AlreadyRegistered)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check credentials and stamp `last_login`. `None` on any mismatch.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<SessionUser>, AuthError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT id, role, email FROM users WHERE email = ? AND password_hash = ?",
        )
        .bind(email)
        .bind(hash_password(password))
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, role, email)) = row else {
            tracing::debug!("login rejected");
            return Ok(None);
        };

        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(&self.pool)
            .await?;

        Ok(Some(SessionUser {
            id,
            email,
            role: Role::parse(&role).unwrap_or(Role::Registered),
            is_authenticated: true,
        }))
    }
}
