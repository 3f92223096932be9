use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

/// Upper bound for `JWT_TTL_MINUTES` (one year).
pub const MAX_JWT_TTL_MINUTES: i64 = 60 * 24 * 365;
/// Upper bound for `AUTH_COOKIE_TTL_HOURS` (one year).
pub const MAX_COOKIE_TTL_HOURS: i64 = 24 * 365;

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub ttl_hours: i64,
    pub secure: bool,
}

/// Either a full connection URL or the individual `DB_*` parts.
#[derive(Clone)]
pub enum DbConfig {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
        ssl_mode: String,
        time_zone: Option<String>,
    },
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // URLs may embed credentials.
            DbConfig::Url(_) => f.debug_tuple("Url").field(&"<redacted>").finish(),
            DbConfig::Parts {
                host,
                port,
                user,
                name,
                ssl_mode,
                time_zone,
                ..
            } => f
                .debug_struct("Parts")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &"<redacted>")
                .field("name", name)
                .field("ssl_mode", ssl_mode)
                .field("time_zone", time_zone)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DbConfig,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| get(key).with_context(|| format!("{key} must be set"));

        let database = match get("DATABASE_URL") {
            Some(url) => DbConfig::Url(url),
            None => DbConfig::Parts {
                host: required("DB_HOST")?,
                port: parse_or(&get, "DB_PORT", 5432)?,
                user: required("DB_USER")?,
                password: get("DB_PASSWORD").unwrap_or_default(),
                name: required("DB_NAME")?,
                ssl_mode: get("DB_SSL_MODE").unwrap_or_else(|| "prefer".into()),
                time_zone: get("DB_TIME_ZONE").filter(|tz| !tz.is_empty()),
            },
        };

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            ttl_minutes: parse_or(&get, "JWT_TTL_MINUTES", 60 * 24)?,
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(
            (1..=MAX_JWT_TTL_MINUTES).contains(&jwt.ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_JWT_TTL_MINUTES}, got {}",
            jwt.ttl_minutes
        );

        let cookie = CookieConfig {
            ttl_hours: parse_or(&get, "AUTH_COOKIE_TTL_HOURS", 60)?,
            secure: parse_or(&get, "AUTH_COOKIE_SECURE", false)?,
        };
        anyhow::ensure!(
            (1..=MAX_COOKIE_TTL_HOURS).contains(&cookie.ttl_hours),
            "AUTH_COOKIE_TTL_HOURS must be between 1 and {MAX_COOKIE_TTL_HOURS}, got {}",
            cookie.ttl_hours
        );

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080)?,
            database,
            jwt,
            cookie,
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

impl DbConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        match self {
            DbConfig::Url(url) => url
                .parse::<PgConnectOptions>()
                .context("parse DATABASE_URL"),
            DbConfig::Parts {
                host,
                port,
                user,
                password,
                name,
                ssl_mode,
                time_zone,
            } => {
                let ssl_mode = PgSslMode::from_str(ssl_mode)
                    .with_context(|| format!("invalid DB_SSL_MODE {ssl_mode:?}"))?;
                let mut opts = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .password(password)
                    .database(name)
                    .ssl_mode(ssl_mode);
                if let Some(tz) = time_zone {
                    opts = opts.options([("TimeZone", tz.as_str())]);
                }
                Ok(opts)
            }
        }
    }
}
