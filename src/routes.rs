use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::{Request, State};
use rocket_dyn_templates::{Template, context};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use validator::Validate;

use crate::auth::{AuthError, User, require_login};
use crate::db::{
    create_progress_entry, find_training_template, get_progress_entries, get_training_templates,
};
use crate::mail::{Mailer, OutgoingMessage};
use crate::models::TrainingTemplate;
use crate::storage::{ImageStore, allowed_extension};
use crate::survey::{Position, SurveyForm, classify};
use crate::validation::{FormValidateExt, blank_to_none, empty_to_none};

const CONTACT_FAILED: &str = "An error occurred while sending your message. Please try again.";
const INVALID_PHOTO: &str = "Invalid file type. Please upload a valid image.";
const PHOTO_FAILED: &str = "An error occurred while saving your photo. Please try again.";
const NO_TEMPLATE: &str = "We could not find a training template for those answers.";

/// A flash message carried across a redirect, shaped for the templates.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub kind: String,
    pub message: String,
}

impl Notice {
    pub fn from_flash(flash: Option<FlashMessage<'_>>) -> Option<Self> {
        flash.map(|f| Self {
            kind: f.kind().to_string(),
            message: f.message().to_string(),
        })
    }
}

/// Where the site owner's copy of a contact message goes.
#[derive(Debug, Clone)]
pub struct ContactSettings {
    pub recipient: String,
}

#[get("/")]
pub fn about(flash: Option<FlashMessage<'_>>, user: Option<User>) -> Template {
    Template::render(
        "about",
        context! {
            title: "About",
            current_route: "about",
            current_user: user,
            notice: Notice::from_flash(flash),
        },
    )
}

#[derive(Serialize)]
struct PositionCard {
    name: &'static str,
    templates: Vec<TrainingTemplate>,
}

#[get("/positions")]
pub async fn positions(
    flash: Option<FlashMessage<'_>>,
    user: Option<User>,
    db: &State<SqlitePool>,
) -> Template {
    // The page still renders its fixed copy if the template table is unreadable
    let templates = get_training_templates(db).await.unwrap_or_else(|e| {
        e.log_and_record("Listing training templates");
        Vec::new()
    });

    let cards: Vec<PositionCard> = Position::ALL
        .iter()
        .map(|position| PositionCard {
            name: position.as_str(),
            templates: templates
                .iter()
                .filter(|t| t.position_name == position.as_str())
                .cloned()
                .collect(),
        })
        .collect();

    Template::render(
        "positions",
        context! {
            title: "Positions",
            current_route: "positions",
            current_user: user,
            notice: Notice::from_flash(flash),
            positions: cards,
        },
    )
}

fn position_names() -> Vec<&'static str> {
    Position::ALL.iter().map(|p| p.as_str()).collect()
}

#[get("/survey")]
pub fn survey_page(flash: Option<FlashMessage<'_>>, user: Option<User>) -> Template {
    Template::render(
        "survey",
        context! {
            title: "Survey",
            current_route: "survey",
            current_user: user,
            notice: Notice::from_flash(flash),
            positions: position_names(),
        },
    )
}

#[post("/submit-survey", data = "<form>")]
pub async fn submit_survey(
    form: Form<SurveyForm>,
    user: Option<User>,
    db: &State<SqlitePool>,
) -> (Status, Template) {
    let render = |status: Status,
                  template: Option<TrainingTemplate>,
                  level: Option<&'static str>,
                  notice: Option<Notice>| {
        (
            status,
            Template::render(
                "survey",
                context! {
                    title: "Survey",
                    current_route: "survey",
                    current_user: &user,
                    notice: notice,
                    positions: position_names(),
                    level: level,
                    template: template,
                },
            ),
        )
    };

    let Some((position, level)) = classify(&form) else {
        warn!(position = ?form.position, "Survey submitted without a recognised position");
        return render(
            Status::NotFound,
            None,
            None,
            Some(Notice {
                kind: "error".to_string(),
                message: NO_TEMPLATE.to_string(),
            }),
        );
    };

    info!(position = %position, level = %level, "Survey classified");

    match find_training_template(db, position, level).await {
        Ok(Some(template)) => render(Status::Ok, Some(template), Some(level.as_str()), None),
        Ok(None) => render(
            Status::NotFound,
            None,
            Some(level.as_str()),
            Some(Notice {
                kind: "error".to_string(),
                message: NO_TEMPLATE.to_string(),
            }),
        ),
        Err(e) => {
            let status = e.to_status_with_log("Training template lookup");
            render(
                status,
                None,
                Some(level.as_str()),
                Some(Notice {
                    kind: "error".to_string(),
                    message: "Something went wrong. Please try again.".to_string(),
                }),
            )
        }
    }
}

#[get("/contact?<success>")]
pub fn contact(
    success: Option<u8>,
    flash: Option<FlashMessage<'_>>,
    user: Option<User>,
) -> Template {
    Template::render(
        "contact",
        context! {
            title: "Contact",
            current_route: "contact",
            current_user: user,
            notice: Notice::from_flash(flash),
            success: success == Some(1),
        },
    )
}

#[derive(Debug, FromForm, Validate)]
pub struct ContactForm {
    #[validate(required(message = "All fields are required."))]
    email: Option<String>,
    #[validate(required(message = "All fields are required."))]
    message: Option<String>,
}

#[post("/submit-contact", data = "<form>")]
pub async fn submit_contact(
    form: Form<ContactForm>,
    mailer: &State<Box<dyn Mailer>>,
    settings: &State<ContactSettings>,
) -> Result<Redirect, Flash<Redirect>> {
    let form = form.into_inner();
    let submission = ContactForm {
        email: empty_to_none(form.email),
        message: empty_to_none(form.message),
    }
    .validate_form()
    .map_err(|e| {
        e.log_and_record("Contact form");
        Flash::error(Redirect::to("/contact"), e.user_notice(CONTACT_FAILED))
    })?;

    let email = submission.email.unwrap_or_default();
    let message = submission.message.unwrap_or_default();

    let outgoing = OutgoingMessage::contact_submission(&settings.recipient, &email, &message);

    match mailer.send(outgoing).await {
        Ok(()) => {
            info!(from = %email, "Relayed contact message");
            Ok(Redirect::to("/contact?success=1"))
        }
        Err(e) => {
            e.log_and_record("Sending contact message");
            Err(Flash::error(Redirect::to("/contact"), CONTACT_FAILED))
        }
    }
}

#[get("/profile")]
pub async fn profile(
    user: Result<User, AuthError>,
    flash: Option<FlashMessage<'_>>,
    db: &State<SqlitePool>,
) -> Result<Template, Flash<Redirect>> {
    let user = require_login(user)?;

    let (entries, notice) = match get_progress_entries(db, user.id).await {
        Ok(entries) => (entries, Notice::from_flash(flash)),
        Err(e) => {
            e.log_and_record("Listing progress entries");
            (
                Vec::new(),
                Some(Notice {
                    kind: "error".to_string(),
                    message: "Your progress entries could not be loaded.".to_string(),
                }),
            )
        }
    };

    Ok(Template::render(
        "profile",
        context! {
            title: "Profile",
            current_route: "profile",
            username: &user.username,
            current_user: &user,
            notice: notice,
            progress_entries: entries,
        },
    ))
}

#[derive(FromForm)]
pub struct ProgressForm<'r> {
    photo: Option<TempFile<'r>>,
    description: Option<String>,
}

#[post("/profile", data = "<form>")]
pub async fn add_progress(
    user: Result<User, AuthError>,
    form: Form<ProgressForm<'_>>,
    db: &State<SqlitePool>,
    images: &State<ImageStore>,
) -> Flash<Redirect> {
    let user = match require_login(user) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let mut form = form.into_inner();

    let extension = form
        .photo
        .as_ref()
        .and_then(|photo| photo.raw_name())
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str())
        .and_then(allowed_extension);

    let (Some(photo), Some(extension)) = (form.photo.as_mut(), extension) else {
        warn!(user_id = user.id, "Rejected progress upload with invalid file");
        return Flash::error(Redirect::to("/profile"), INVALID_PHOTO);
    };

    let path = match images.save(photo, &extension).await {
        Ok(path) => path,
        Err(e) => {
            e.log_and_record("Saving progress photo");
            return Flash::error(Redirect::to("/profile"), PHOTO_FAILED);
        }
    };

    let description = blank_to_none(form.description.take());

    match create_progress_entry(db, user.id, &path, description.as_deref()).await {
        Ok(entry_id) => {
            info!(user_id = user.id, entry_id, "Added progress entry");
            Flash::success(Redirect::to("/profile"), "Progress photo added successfully!")
        }
        Err(e) => {
            e.log_and_record("Recording progress entry");
            images.discard(&path).await;
            Flash::error(Redirect::to("/profile"), PHOTO_FAILED)
        }
    }
}

#[catch(404)]
pub fn not_found(req: &Request) -> Template {
    info!(uri = %req.uri(), "No route matched");
    Template::render(
        "404",
        context! {
            title: "Page Not Found",
            current_route: "",
            current_user: Option::<User>::None,
            notice: Option::<Notice>::None,
        },
    )
}

#[catch(500)]
pub fn internal_error(req: &Request) -> Template {
    error!(uri = %req.uri(), "Request failed");
    Template::render(
        "error",
        context! {
            title: "Something Went Wrong",
            current_route: "",
            current_user: Option::<User>::None,
            notice: Option::<Notice>::None,
        },
    )
}
