use std::str::FromStr;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::chain::SessionWindow;
use crate::constants::{
    DEFAULT_MAX_STRIKE_STEPS, DEFAULT_SESSION_CLOSE, DEFAULT_SESSION_OPEN, DEFAULT_UNDERLYING,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub window: SessionWindow,
    pub display_tz: Tz,
    pub underlying: String,
    pub max_strike_steps: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = match var("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            Some(url) => url,
            None => {
                let user = var("MYSQL_USER").unwrap_or_else(|| "msdb".to_string());
                let password = var("MYSQL_PASSWORD")
                    .ok_or_else(|| Error::Config("DATABASE_URL or MYSQL_PASSWORD must be set".into()))?;
                let host = var("MYSQL_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
                let port = var("MYSQL_PORT").unwrap_or_else(|| "3307".to_string());
                let db = var("MYSQL_DB").unwrap_or_else(|| "spydata".to_string());
                format!("mysql://{}:{}@{}:{}/{}", user, password, host, port, db)
            }
        };

        let max_connections = parse_or(&var, "DB_MAX_CONNECTIONS", 10u32)?;

        let host = var("HOST")
            .or_else(|| var("FLASK_HOST"))
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT").or_else(|| var("FLASK_PORT")) {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid PORT: {}", p)))?,
            None => 8080,
        };
        let max_upload_mb = parse_or(&var, "MAX_UPLOAD_MB", 512usize)?;

        let open = parse_time(&var, "SESSION_OPEN", DEFAULT_SESSION_OPEN)?;
        let close = parse_time(&var, "SESSION_CLOSE", DEFAULT_SESSION_CLOSE)?;
        let window = SessionWindow::new(open, close)?;

        let tz_name = var("DISPLAY_TZ").unwrap_or_else(|| "UTC".to_string());
        let display_tz = Tz::from_str(tz_name.trim())
            .map_err(|_| Error::Config(format!("unknown DISPLAY_TZ: {}", tz_name)))?;

        let underlying = var("UNDERLYING_SYMBOL")
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_UNDERLYING.to_string());
        let max_strike_steps = parse_or(&var, "MAX_STRIKE_STEPS", DEFAULT_MAX_STRIKE_STEPS)?;

        Ok(Config {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            server: ServerConfig {
                host,
                port,
                max_upload_bytes: max_upload_mb * 1024 * 1024,
            },
            session: SessionConfig {
                window,
                display_tz,
                underlying,
                max_strike_steps,
            },
        })
    }
}

impl DatabaseConfig {
    /// The connection URL with credentials replaced, safe for logs.
    pub fn masked_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}***{}", &self.url[..scheme_end + 3], &self.url[at..])
            }
            _ => self.url.clone(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window: SessionWindow::default(),
            display_tz: Tz::UTC,
            underlying: DEFAULT_UNDERLYING.to_string(),
            max_strike_steps: DEFAULT_MAX_STRIKE_STEPS,
        }
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("invalid {}: {}", key, raw))),
        None => Ok(default),
    }
}

fn parse_time<F>(var: &F, key: &str, default: &str) -> Result<NaiveTime>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key).unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| Error::Config(format!("invalid {} (expected HH:MM): {}", key, raw)))
}
