use anyhow::Context;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    repo::UserStore,
    repo_types::{Role, User},
};
use crate::{config::AdminSeed, error::AppError};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("argon2 parse hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

// argon2 is CPU-bound; run it on the blocking pool.
async fn hash_blocking(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("join password hasher")?
}

async fn verify_blocking(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("join password verifier")?
}

/// Creates a user. The email must not be registered yet.
pub async fn register(
    users: &dyn UserStore,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email format".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if users.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User with this email already exists".into()));
    }

    let hash = hash_blocking(password.to_string()).await?;
    let user = users
        .insert_user(Uuid::new_v4(), &email, &hash, role)
        .await?
        // lost a race with a concurrent registration
        .ok_or_else(|| AppError::Conflict("User with this email already exists".into()))?;
    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok(user)
}

/// Checks credentials. Unknown email and wrong password are indistinguishable to the caller.
pub async fn authenticate(users: &dyn UserStore, email: &str, password: &str) -> Result<User, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email format".into()));
    }
    if password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }

    let Some(user) = users.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };
    if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }
    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

/// Creates the configured admin account unless the email is already taken.
pub async fn ensure_admin(users: &dyn UserStore, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = normalize_email(&seed.email);
    if let Some(existing) = users.find_user_by_email(&email).await? {
        if existing.role != Role::Admin {
            warn!(email = %email, "seed admin email belongs to a non-admin user; left unchanged");
        }
        return Ok(());
    }
    match register(users, &email, &seed.password, Role::Admin).await {
        Ok(user) => {
            info!(user_id = %user.id, "admin account seeded");
            Ok(())
        }
        Err(AppError::Conflict(_)) => Ok(()),
        Err(AppError::Internal(e)) => Err(e.context("seed admin")),
        Err(other) => Err(anyhow::anyhow!("seed admin: {other}")),
    }
}
