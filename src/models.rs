use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
pub struct ProgressEntry {
    pub id: i64,
    pub user_id: i64,
    pub photo: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProgressEntry {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub photo: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbProgressEntry> for ProgressEntry {
    fn from(db: DbProgressEntry) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            photo: db.photo.unwrap_or_default(),
            description: db.description.filter(|d| !d.trim().is_empty()),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TrainingTemplate {
    pub id: i64,
    pub position_name: String,
    pub template_level: String,
    pub image_path: String,
    pub description: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTrainingTemplate {
    pub id: Option<i64>,
    pub position_name: Option<String>,
    pub template_level: Option<String>,
    pub image_path: Option<String>,
    pub description: Option<String>,
}

impl From<DbTrainingTemplate> for TrainingTemplate {
    fn from(db: DbTrainingTemplate) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            position_name: db.position_name.unwrap_or_default(),
            template_level: db.template_level.unwrap_or_default(),
            image_path: db.image_path.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
        }
    }
}
