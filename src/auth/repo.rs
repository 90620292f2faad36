use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::{Role, User, UserRow};
use crate::db::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// `None` when the email is already registered.
    async fn insert_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>>;
}

#[async_trait]
impl UserStore for PgStore {
    /// Find a user by email.
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, email, password_hash, role, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    /// Create a new user with hashed password.
    async fn insert_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("insert user")?;
        row.map(User::try_from).transpose()
    }
}
