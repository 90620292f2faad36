use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Where the catalog, ledger and users live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Credentials of the admin account created at startup when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub admin: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match var("STORE_BACKEND").as_deref() {
            None | Some("") | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        };

        let database_url = var("DATABASE_URL").filter(|v| !v.is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres backend");
        }

        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "sweetshop".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "sweetshop-users".into()),
            ttl_minutes: parsed(&var, "JWT_TTL_MINUTES")?.unwrap_or(60 * 24 * 7),
            refresh_ttl_minutes: parsed(&var, "JWT_REFRESH_TTL_MINUTES")?
                .unwrap_or(60 * 24 * 30),
        };

        let cors_origins = var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminSeed { email, password })
            }
            _ => None,
        };

        Ok(Self {
            backend,
            database_url,
            db_max_connections: parsed(&var, "DB_MAX_CONNECTIONS")?.unwrap_or(10),
            jwt,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&var, "APP_PORT")?.unwrap_or(3001),
            cors_origins,
            admin,
        })
    }
}

fn parsed<F, T>(var: &F, key: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>().with_context(|| format!("invalid {key}")))
        .transpose()
}
