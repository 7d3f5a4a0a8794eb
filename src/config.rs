use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Violation limits for a session. A counter strictly above its limit blocks the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProctoringPolicy {
    pub max_tab_switches: u32,
    pub max_fullscreen_exits: u32,
    pub max_copy_paste: u32,
    pub max_devtools: u32,
    pub auto_submit: bool,
}

impl Default for ProctoringPolicy {
    fn default() -> Self {
        Self {
            max_tab_switches: 3,
            max_fullscreen_exits: 3,
            max_copy_paste: 5,
            max_devtools: 1,
            auto_submit: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub api_rps: u32,
    pub proctoring: ProctoringPolicy,
    pub require_approved_questions: bool,
    pub code_execution_url: Option<String>,
    pub sweep_interval_secs: u64,
    pub json_logs: bool,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let storage_backend: StorageBackend =
            get_env_parse_or("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(Error::Config(
                "Missing environment variable: DATABASE_URL".to_string(),
            ));
        }

        let defaults = ProctoringPolicy::default();
        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            storage_backend,
            database_url,
            jwt_secret: get_env("JWT_SECRET")?,
            api_rps: get_env_parse_or("API_RPS", 50)?,
            proctoring: ProctoringPolicy {
                max_tab_switches: get_env_parse_or(
                    "PROCTORING_MAX_TAB_SWITCHES",
                    defaults.max_tab_switches,
                )?,
                max_fullscreen_exits: get_env_parse_or(
                    "PROCTORING_MAX_FULLSCREEN_EXITS",
                    defaults.max_fullscreen_exits,
                )?,
                max_copy_paste: get_env_parse_or(
                    "PROCTORING_MAX_COPY_PASTE",
                    defaults.max_copy_paste,
                )?,
                max_devtools: get_env_parse_or("PROCTORING_MAX_DEVTOOLS", defaults.max_devtools)?,
                auto_submit: get_env_parse_or("PROCTORING_AUTO_SUBMIT", defaults.auto_submit)?,
            },
            require_approved_questions: get_env_parse_or("REQUIRE_APPROVED_QUESTIONS", false)?,
            code_execution_url: env::var("CODE_EXECUTION_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            sweep_interval_secs: get_env_parse_or("SWEEP_INTERVAL_SECS", 60)?,
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// In-memory configuration used by tests and local demos.
    pub fn for_memory(jwt_secret: &str) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            storage_backend: StorageBackend::Memory,
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            api_rps: 1000,
            proctoring: ProctoringPolicy::default(),
            require_approved_questions: false,
            code_execution_url: None,
            sweep_interval_secs: 60,
            json_logs: false,
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
