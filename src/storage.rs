use std::path::PathBuf;

use rocket::fs::TempFile;
use rocket::tokio::fs;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Returns the lower-cased extension of `filename` when it is an accepted
/// image type.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Uploaded photos live on disk under `root`; the database keeps only the
/// public path under which the static file server exposes them.
pub struct ImageStore {
    root: PathBuf,
    public_prefix: String,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Copies the upload to a server-chosen name and returns its public path.
    /// The client's filename only contributes the extension.
    #[instrument(skip(self, file))]
    pub async fn save(&self, file: &mut TempFile<'_>, extension: &str) -> Result<String, AppError> {
        fs::create_dir_all(&self.root).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let destination = self.root.join(&file_name);

        file.copy_to(&destination).await?;
        info!(path = %destination.display(), "Stored uploaded image");

        Ok(format!("{}/{}", self.public_prefix, file_name))
    }

    /// Best-effort removal of a previously saved image, used to undo a save
    /// whose database row could not be written.
    pub async fn discard(&self, public_path: &str) {
        let Some(file_name) = public_path
            .strip_prefix(&self.public_prefix)
            .map(|rest| rest.trim_start_matches('/'))
        else {
            return;
        };

        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            return;
        }

        if let Err(e) = fs::remove_file(self.root.join(file_name)).await {
            warn!(error = %e, path = %public_path, "Failed to remove orphaned upload");
        }
    }
}
