use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::{Flash, Redirect};
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::db::{get_session_by_token, get_user};
use crate::error::AppError;

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

/// Why the login gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Unauthenticated,
    Expired,
    Unavailable,
}

impl AuthError {
    pub fn notice(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "Please log in to access this page.",
            AuthError::Expired => "Your session has expired. Please log in again.",
            AuthError::Unavailable => "We could not verify your session. Please log in again.",
        }
    }
}

/// How long a login lasts, in hours.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub ttl_hours: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self { ttl_hours: 1 }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, AuthError> {
    let cookies = request.cookies();

    let Some(token) = cookies
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string())
    else {
        return Outcome::Error((Status::Unauthorized, AuthError::Unauthenticated));
    };

    let db = match request.rocket().state::<SqlitePool>() {
        Some(pool) => pool,
        _ => {
            tracing::error!("Database pool not found in managed state");
            return Outcome::Error((Status::InternalServerError, AuthError::Unavailable));
        }
    };

    let session = match get_session_by_token(db, &token).await {
        Ok(session) => session,
        Err(AppError::Authentication(_)) => {
            tracing::warn!("Unknown session token presented");
            cookies.remove_private(SESSION_COOKIE);
            return Outcome::Error((Status::Unauthorized, AuthError::Unauthenticated));
        }
        Err(err) => {
            err.log_and_record("Session lookup");
            return Outcome::Error((Status::InternalServerError, AuthError::Unavailable));
        }
    };

    if !session.is_valid() {
        tracing::warn!(user_id = %session.user_id, "Session token expired");
        cookies.remove_private(SESSION_COOKIE);
        return Outcome::Error((Status::Unauthorized, AuthError::Expired));
    }

    match get_user(db, session.user_id).await {
        Ok(user) => {
            tracing::info!(username = %user.username, "User authenticated via session token");
            Outcome::Success(user)
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!(user_id = %session.user_id, "Session belongs to a missing user");
            cookies.remove_private(SESSION_COOKIE);
            Outcome::Error((Status::Unauthorized, AuthError::Unauthenticated))
        }
        Err(err) => {
            err.log_and_record("Fetching user for valid session");
            Outcome::Error((Status::InternalServerError, AuthError::Unavailable))
        }
    }
}

/// The login gate. Handlers take the user guard as `Result<User, AuthError>`
/// and pass it through here; a refusal becomes a redirect to the login page
/// carrying a notice.
pub fn require_login(user: Result<User, AuthError>) -> Result<User, Flash<Redirect>> {
    user.map_err(|err| {
        tracing::warn!(reason = ?err, "Login required");
        Flash::error(Redirect::to("/login"), err.notice())
    })
}
