use crate::{
    auth::{DbUser, DbUserSession, User, UserSession},
    error::AppError,
    models::{DbProgressEntry, DbTrainingTemplate, ProgressEntry, TrainingTemplate},
    survey::{Level, Position},
    validation::REQUIRED_FIELDS_NOTICE,
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>("SELECT id, username, email FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

/// Creates an account. The uniqueness checks and the insert share one
/// transaction; any failure rolls it back so no partial user survives.
#[instrument(skip_all, fields(username, email))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    email: &str,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(REQUIRED_FIELDS_NOTICE.to_string()));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long.".to_string(),
        ));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let mut tx = pool.begin().await?;

    let existing_email: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

    if existing_email.is_some() {
        return Err(AppError::Conflict("Email already registered.".to_string()));
    }

    let existing_username: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *tx)
            .await?;

    if existing_username.is_some() {
        return Err(AppError::Conflict("Username already taken.".to_string()));
    }

    let res = sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
        .bind(username)
        .bind(email)
        .bind(&hashed_password)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            // Lost a race with a concurrent registration
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Email already registered.".to_string())
            }
            _ => AppError::Database(e),
        })?;

    tx.commit().await?;

    Ok(res.last_insert_rowid())
}

/// Returns the user when the email exists and the password matches its hash.
/// Unknown email and wrong password are indistinguishable to the caller.
#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct Credentials {
        id: i64,
        username: String,
        email: String,
        password: String,
    }

    let row = sqlx::query_as::<_, Credentials>(
        "SELECT id, username, email, password FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => match bcrypt::verify(password, &row.password) {
            Ok(true) => Ok(Some(User {
                id: row.id,
                username: row.username,
                email: row.email,
            })),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(pool: &Pool<Sqlite>, token: &str) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip(pool, description))]
pub async fn create_progress_entry(
    pool: &Pool<Sqlite>,
    user_id: i64,
    photo: &str,
    description: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating progress entry");

    let res = sqlx::query(
        "INSERT INTO progress_entries (user_id, photo, description) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(photo)
    .bind(description)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_progress_entries(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<ProgressEntry>, AppError> {
    info!("Getting progress entries");

    let rows = sqlx::query_as::<_, DbProgressEntry>(
        "SELECT id, user_id, photo, description, created_at
         FROM progress_entries
         WHERE user_id = ?
         ORDER BY id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProgressEntry::from).collect())
}

#[instrument(skip(pool))]
pub async fn find_training_template(
    pool: &Pool<Sqlite>,
    position: Position,
    level: Level,
) -> Result<Option<TrainingTemplate>, AppError> {
    info!("Looking up training template");

    // Storage does not enforce one row per pair; the oldest row wins
    let row = sqlx::query_as::<_, DbTrainingTemplate>(
        "SELECT id, position_name, template_level, image_path, description
         FROM training_templates
         WHERE position_name = ? AND template_level = ?
         ORDER BY id
         LIMIT 1",
    )
    .bind(position.as_str())
    .bind(level.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(TrainingTemplate::from))
}

#[instrument(skip(pool))]
pub async fn get_training_templates(pool: &Pool<Sqlite>) -> Result<Vec<TrainingTemplate>, AppError> {
    let rows = sqlx::query_as::<_, DbTrainingTemplate>(
        "SELECT id, position_name, template_level, image_path, description
         FROM training_templates
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TrainingTemplate::from).collect())
}
