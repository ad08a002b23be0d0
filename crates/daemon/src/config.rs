//! Daemon settings
//!
//! Layers, later wins: built-in defaults, `config/medtrack.toml`, the file
//! named by `MEDTRACK_CONFIG`, then `MEDTRACK__<SECTION>__<KEY>` variables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use medtrack_api_http::{ApiSettings, HttpServerConfig};
use medtrack_core::port::MaintenanceConfig;
use medtrack_infra_push::{FcmConfig, DEFAULT_FCM_URL};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_ENV: &str = "MEDTRACK_CONFIG";
const ENV_PREFIX: &str = "MEDTRACK";
const LOCAL_CONFIG: &str = "config/medtrack";
/// HS256 keys shorter than the digest are trivially brute-forced
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub push: PushSettings,
    pub refill_alerts: RefillAlertSettings,
    pub worker: WorkerSettings,
    pub maintenance: MaintenanceSettings,
    pub media: MediaSettings,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushSettings {
    pub fcm_url: String,
    pub server_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefillAlertSettings {
    pub enabled: bool,
    pub interval_hours: u64,
    pub threshold_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerSettings {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub max_attempts: i32,
    pub retry_delay_ms: i64,
    pub recovery_window_ms: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceSettings {
    pub interval_hours: u64,
    pub retention_days: i64,
    pub max_db_size_mb: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaSettings {
    pub root: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub auth_burst: u32,
    pub auth_per_second: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    /// `pretty` or `json`; `MEDTRACK_LOG_FORMAT` overrides
    pub format: String,
    /// Daily-rolling log files go here when set
    pub directory: Option<String>,
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8000)?
        .set_default("database.url", "sqlite://~/.medtrack/medtrack.db")?
        .set_default("auth.jwt_secret", "")?
        .set_default("auth.token_expiry_hours", 24)?
        .set_default("push.fcm_url", DEFAULT_FCM_URL)?
        .set_default("push.server_key", "")?
        .set_default("push.timeout_secs", 10)?
        .set_default("refill_alerts.enabled", true)?
        .set_default("refill_alerts.interval_hours", 24)?
        .set_default("refill_alerts.threshold_days", 3)?
        .set_default("worker.poll_interval_ms", 1000)?
        .set_default("worker.batch_size", 50)?
        .set_default("worker.max_attempts", 4)?
        .set_default("worker.retry_delay_ms", 30_000)?
        .set_default("worker.recovery_window_ms", 5 * 60 * 1000)?
        .set_default("maintenance.interval_hours", 24)?
        .set_default("maintenance.retention_days", 7)?
        .set_default("maintenance.max_db_size_mb", 1000.0)?
        .set_default("media.root", "~/.medtrack/media")?
        .set_default("media.max_upload_bytes", 5 * 1024 * 1024)?
        .set_default("rate_limit.auth_burst", 10)?
        .set_default("rate_limit.auth_per_second", 1)?
        .set_default("logging.format", "pretty")
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(std::env::var(CONFIG_ENV).ok().as_deref())
    }

    /// `extra_file` must exist when given
    pub fn load(extra_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = with_defaults()?.add_source(File::with_name(LOCAL_CONFIG).required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::with_name(path));
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject settings the daemon must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() {
            return Err(ConfigError::Message(
                "auth.jwt_secret is not set (MEDTRACK__AUTH__JWT_SECRET)".to_string(),
            ));
        }
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }
        Ok(())
    }

    /// Database URL with `~` expanded
    pub fn database_url(&self) -> String {
        let url = self.database.url.as_str();
        match url.strip_prefix("sqlite://") {
            Some(path) => format!("sqlite://{}", shellexpand::tilde(path)),
            None => shellexpand::tilde(url).into_owned(),
        }
    }

    /// Directory holding the database file, if it is file-backed
    pub fn database_dir(&self) -> Option<PathBuf> {
        let url = self.database_url();
        if url.contains(":memory:") {
            return None;
        }
        let path = url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        PathBuf::from(path).parent().map(PathBuf::from)
    }

    pub fn http(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
        }
    }

    pub fn api(&self) -> ApiSettings {
        ApiSettings {
            jwt_secret: self.auth.jwt_secret.clone(),
            token_ttl_hours: self.auth.token_expiry_hours,
            media_root: PathBuf::from(shellexpand::tilde(&self.media.root).into_owned()),
            max_upload_bytes: self.media.max_upload_bytes,
            refill_threshold_days: self.refill_alerts.threshold_days,
            auth_burst: self.rate_limit.auth_burst,
            auth_per_second: self.rate_limit.auth_per_second,
        }
    }

    pub fn fcm(&self) -> FcmConfig {
        FcmConfig {
            url: self.push.fcm_url.clone(),
            server_key: self.push.server_key.clone(),
            timeout: Duration::from_secs(self.push.timeout_secs),
        }
    }

    pub fn maintenance_config(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            finished_delivery_retention_days: self.maintenance.retention_days,
            max_db_size_mb: self.maintenance.max_db_size_mb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(None).unwrap();

        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.worker.max_attempts, 4);
        assert_eq!(settings.worker.retry_delay_ms, 30_000);
        assert_eq!(settings.refill_alerts.threshold_days, 3);
        assert_eq!(settings.maintenance.retention_days, 7);
        assert!(settings.logging.directory.is_none());
        assert!(!settings.database_url().contains('~'));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[push]\nserver_key = \"abc\"\n\n[worker]\nbatch_size = 5"
        )
        .unwrap();

        let settings = Settings::load(file.path().to_str()).unwrap();

        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.fcm().server_key, "abc");
        assert_eq!(settings.worker.batch_size, 5);
    }

    #[test]
    fn test_missing_extra_file_is_an_error() {
        tokio_test::assert_err!(Settings::load(Some("/nonexistent/medtrack-settings.toml")));
    }

    #[test]
    fn test_jwt_secret_is_required() {
        let mut settings = Settings::load(None).unwrap();
        tokio_test::assert_err!(settings.validate());

        settings.auth.jwt_secret = "short".to_string();
        tokio_test::assert_err!(settings.validate());

        settings.auth.jwt_secret = "k".repeat(MIN_JWT_SECRET_LEN);
        tokio_test::assert_ok!(settings.validate());
    }

    #[test]
    fn test_database_dir() {
        let mut settings = Settings::load(None).unwrap();

        settings.database.url = "sqlite:///var/lib/medtrack/db.sqlite?mode=rwc".to_string();
        assert_eq!(settings.database_dir(), Some(PathBuf::from("/var/lib/medtrack")));

        settings.database.url = "sqlite::memory:".to_string();
        assert_eq!(settings.database_dir(), None);
    }
}
