use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to load environment file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Which env files were applied. Loading runs before the tracing subscriber
/// exists, so the caller reports this once logging is up.
#[derive(Debug, Default)]
pub struct EnvFiles {
    pub loaded: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub fn load_environment() -> Result<EnvFiles, ConfigError> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let profile_file = if is_production {
        "config/prod.env"
    } else {
        "config/dev.env"
    };

    load_env_files(&["config/common.env", profile_file, ".secrets.env"])
}

/// Applies each existing file in order, later files overriding earlier ones.
pub fn load_env_files<P: AsRef<Path>>(paths: &[P]) -> Result<EnvFiles, ConfigError> {
    let mut report = EnvFiles::default();

    for path in paths {
        let path = path.as_ref();
        if path.exists() {
            dotenvy::from_filename_override(path)?;
            report.loaded.push(path.to_path_buf());
        } else {
            report.skipped.push(path.to_path_buf());
        }
    }

    Ok(report)
}

#[derive(Clone)]
pub struct MailSettings {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: String,
    pub password: String,
    pub default_sender: String,
    pub contact_recipient: String,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("default_sender", &self.default_sender)
            .field("contact_recipient", &self.contact_recipient)
            .finish()
    }
}

/// Everything the service reads from its environment. Secrets have no
/// fallback: a missing `SECRET_KEY` or mail credential stops startup.
#[derive(Clone)]
pub struct Settings {
    pub database_url: String,
    pub secret_key: String,
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
    pub session_ttl_hours: i64,
    pub max_upload_mb: u64,
    pub mail: MailSettings,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("database_url", &self.database_url)
            .field("secret_key", &"<redacted>")
            .field("template_dir", &self.template_dir)
            .field("static_dir", &self.static_dir)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("max_upload_mb", &self.max_upload_mb)
            .field("mail", &self.mail)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mail_username = required("MAIL_USERNAME")?;
        let contact_recipient = optional("CONTACT_RECIPIENT").unwrap_or_else(|| mail_username.clone());

        let mail = MailSettings {
            server: optional("MAIL_SERVER").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port: parsed("MAIL_PORT", 587)?,
            use_tls: parsed("MAIL_USE_TLS", true)?,
            username: mail_username,
            password: required("MAIL_PASSWORD")?,
            default_sender: required("MAIL_DEFAULT_SENDER")?,
            contact_recipient,
        };

        let session_ttl_hours: i64 = parsed("SESSION_TTL_HOURS", 1)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_HOURS",
                reason: "must be a positive number of hours".to_string(),
            });
        }

        Ok(Self {
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://instance/database.db".to_string()),
            secret_key: required("SECRET_KEY")?,
            template_dir: optional("TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("templates")),
            static_dir: optional("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            session_ttl_hours,
            max_upload_mb: parsed("MAX_UPLOAD_MB", 8)?,
            mail,
        })
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.static_dir.join("uploads")
    }
}

fn optional(var: &'static str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::Missing(var))
}

fn parsed<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
