use chrono::Utc;
use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket_dyn_templates::{Template, context};
use sqlx::SqlitePool;
use tracing::{info, warn};
use validator::Validate;

use crate::db::{
    authenticate_user, clean_expired_sessions, create_user, create_user_session, invalidate_session,
};
use crate::routes::Notice;
use crate::validation::{FormValidateExt, empty_to_none};

use super::{SESSION_COOKIE, SessionPolicy, User, UserSession};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const LOGIN_FAILED: &str = "An error occurred while logging in. Please try again.";
const REGISTRATION_FAILED: &str = "An error occurred during registration. Please try again.";

#[derive(FromForm)]
pub struct LoginForm {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, FromForm, Validate)]
pub struct RegisterForm {
    #[validate(required(message = "All fields are required."))]
    username: Option<String>,
    #[validate(required(message = "All fields are required."))]
    email: Option<String>,
    #[validate(
        required(message = "All fields are required."),
        length(min = 8, message = "Password must be at least 8 characters long.")
    )]
    password: Option<String>,
}

impl RegisterForm {
    fn cleaned(self) -> Self {
        Self {
            username: empty_to_none(self.username),
            email: empty_to_none(self.email),
            password: empty_to_none(self.password),
        }
    }
}

#[get("/login")]
pub fn login(flash: Option<FlashMessage<'_>>, user: Option<User>) -> Template {
    Template::render(
        "login",
        context! {
            title: "Log In",
            current_route: "login",
            current_user: user,
            notice: Notice::from_flash(flash),
        },
    )
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<SqlitePool>,
    policy: &State<SessionPolicy>,
) -> Flash<Redirect> {
    let email = form.email.as_deref().unwrap_or_default();
    let password = form.password.as_deref().unwrap_or_default();

    info!(email = %email, "Login attempt");

    let user = match authenticate_user(db, email, password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(email = %email, "Invalid credentials");
            return Flash::error(Redirect::to("/login"), INVALID_CREDENTIALS);
        }
        Err(e) => {
            e.log_and_record("Login");
            return Flash::error(Redirect::to("/login"), LOGIN_FAILED);
        }
    };

    // Replace rather than stack sessions for the same browser
    if let Some(previous) = cookies.get_private(SESSION_COOKIE) {
        if let Err(e) = invalidate_session(db, previous.value()).await {
            e.log_and_record("Dropping previous session");
        }
    }

    match clean_expired_sessions(db).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired sessions", count),
        Ok(_) => {}
        Err(e) => e.log_and_record("Cleaning expired sessions"),
    }

    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(policy.ttl_hours);

    if let Err(e) = create_user_session(db, user.id, &token, expires_at.naive_utc()).await {
        e.log_and_record("Creating session");
        return Flash::error(Redirect::to("/login"), LOGIN_FAILED);
    }

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(policy.ttl_hours)),
    );

    info!(username = %user.username, "Authentication successful");
    Flash::success(Redirect::to("/profile"), "Login successful!")
}

#[get("/logout")]
pub async fn logout(cookies: &CookieJar<'_>, db: &State<SqlitePool>) -> Flash<Redirect> {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        if let Err(e) = invalidate_session(db, cookie.value()).await {
            e.log_and_record("Logout");
        }
    }

    cookies.remove_private(SESSION_COOKIE);
    Flash::success(Redirect::to("/login"), "Logged out successfully.")
}

#[get("/register")]
pub fn register(flash: Option<FlashMessage<'_>>, user: Option<User>) -> Template {
    Template::render(
        "register",
        context! {
            title: "Register",
            current_route: "register",
            current_user: user,
            notice: Notice::from_flash(flash),
        },
    )
}

#[post("/register", data = "<form>")]
pub async fn process_register(form: Form<RegisterForm>, db: &State<SqlitePool>) -> Flash<Redirect> {
    let registration = match form.into_inner().cleaned().validate_form() {
        Ok(registration) => registration,
        Err(e) => {
            e.log_and_record("Registration form");
            return Flash::error(Redirect::to("/register"), e.user_notice(REGISTRATION_FAILED));
        }
    };

    let username = registration.username.unwrap_or_default();
    let email = registration.email.unwrap_or_default();
    let password = registration.password.unwrap_or_default();

    match create_user(db, &username, &email, &password).await {
        Ok(user_id) => {
            info!(user_id, username = %username, "Registered new user");
            Flash::success(
                Redirect::to("/login"),
                "Registration successful! Please log in.",
            )
        }
        Err(e) => {
            e.log_and_record("Registration");
            Flash::error(Redirect::to("/register"), e.user_notice(REGISTRATION_FAILED))
        }
    }
}
