#[macro_use]
extern crate rocket;

mod auth;
mod db;
mod env;
mod error;
mod mail;
mod models;
mod routes;
mod storage;
mod survey;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use auth::{SessionPolicy, login, logout, process_login, process_register, register};
use env::{ConfigError, Settings, load_environment};
use error::AppError;
use mail::{Mailer, SmtpMailer};
use rocket::data::{Limits, ToByteUnit};
use rocket::figment::Figment;
use rocket::fs::{FileServer, Options};
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use routes::{
    ContactSettings, about, add_progress, contact, internal_error, not_found, positions, profile,
    submit_contact, submit_survey, survey_page,
};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use storage::ImageStore;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Rocket(#[from] Box<rocket::Error>),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Could not prepare {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Everything the web layer needs handed to it at startup.
pub struct Services {
    pub pool: SqlitePool,
    pub mailer: Box<dyn Mailer>,
    pub images: ImageStore,
    pub contact: ContactSettings,
    pub policy: SessionPolicy,
    pub static_dir: PathBuf,
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    // Must precede init_tracing: env files carry RUST_LOG and the OTLP endpoint
    let env_files = load_environment()?;
    let _otel_guard = init_tracing();

    for path in &env_files.loaded {
        info!(path = %path.display(), "Loaded environment file");
    }
    for path in &env_files.skipped {
        warn!(path = %path.display(), "Environment file not found, skipping");
    }

    let settings = Settings::from_env()?;
    info!(?settings, "Loaded configuration");

    let pool = connect_database(&settings.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    let upload_dir = settings.upload_dir();
    ensure_dir(&upload_dir).await?;

    let mailer = SmtpMailer::new(&settings.mail)?;

    let services = Services {
        pool,
        mailer: Box::new(mailer),
        images: ImageStore::new(upload_dir, "/static/uploads"),
        contact: ContactSettings {
            recipient: settings.mail.contact_recipient.clone(),
        },
        policy: SessionPolicy {
            ttl_hours: settings.session_ttl_hours,
        },
        static_dir: settings.static_dir.clone(),
    };

    let _ = init_rocket(figment(&settings), services)
        .launch()
        .await
        .map_err(Box::new)?;

    Ok(())
}

async fn connect_database(database_url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent).await?;
        }
    }

    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

async fn ensure_dir(path: &Path) -> Result<(), Error> {
    rocket::tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| Error::Filesystem {
            path: path.to_path_buf(),
            source,
        })
}

fn figment(settings: &Settings) -> Figment {
    let upload_limit = settings.max_upload_mb.mebibytes();

    rocket::Config::figment()
        .merge(("secret_key", settings.secret_key.clone()))
        .merge(("template_dir", settings.template_dir.clone()))
        .merge((
            "limits",
            Limits::default()
                .limit("file", upload_limit)
                .limit("data-form", upload_limit + 1u64.mebibytes()),
        ))
}

pub fn init_rocket(figment: Figment, services: Services) -> Rocket<Build> {
    info!("Starting flexibility journal");

    rocket::custom(figment)
        .manage(services.pool)
        .manage(services.mailer)
        .manage(services.images)
        .manage(services.contact)
        .manage(services.policy)
        .mount(
            "/",
            routes![
                about,
                positions,
                survey_page,
                submit_survey,
                contact,
                submit_contact,
                profile,
                add_progress,
                login,
                process_login,
                logout,
                register,
                process_register,
            ],
        )
        .mount("/static", FileServer::new(services.static_dir, Options::Missing))
        .register("/", catchers![not_found, internal_error])
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
