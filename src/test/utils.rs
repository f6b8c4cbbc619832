#[cfg(test)]
pub mod test_db {
    use crate::db::{create_progress_entry, create_user};
    use crate::error::AppError;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        entries: Vec<TestEntry>,
    }

    pub struct TestUser {
        pub username: String,
        pub email: String,
        pub password: String,
    }

    pub struct TestEntry {
        pub username: String,
        pub photo: String,
        pub description: Option<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str, email: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                email: email.to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn user_with_password(mut self, username: &str, email: &str, password: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            });
            self
        }

        pub fn entry(mut self, username: &str, photo: &str, description: Option<&str>) -> Self {
            self.entries.push(TestEntry {
                username: username.to_string(),
                photo: photo.to_string(),
                description: description.map(String::from),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter("debug")
                    .with_test_writer()
                    .try_init();
            });

            // An in-memory database lives and dies with its connection
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id = create_user(&pool, &user.username, &user.email, &user.password).await?;
                user_id_map.insert(user.username.clone(), user_id);
            }

            for entry in &self.entries {
                let user_id = user_id_map.get(&entry.username).copied().ok_or_else(|| {
                    AppError::NotFound(format!("No test user named {}", entry.username))
                })?;

                create_progress_entry(&pool, user_id, &entry.photo, entry.description.as_deref())
                    .await?;
            }

            Ok(TestDb { pool, user_id_map })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub async fn count(&self, table: &str) -> i64 {
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .expect("Failed to count rows")
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    pub use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder};

    use crate::auth::SessionPolicy;
    use crate::error::AppError;
    use crate::mail::{Mailer, OutgoingMessage};
    use crate::routes::ContactSettings;
    use crate::storage::ImageStore;
    use crate::{Services, init_rocket};
    use rocket::http::{ContentType, RawStr, Status};
    use rocket::local::asynchronous::Client;
    use sqlx::{Pool, Sqlite};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    pub const TEST_SECRET_KEY: &str = "hPRYyVRiMyxpw5sBB1XeCMN1kFsDCqKvBi2QJxBVHQk=";
    pub const CONTACT_RECIPIENT: &str = "owner@example.com";
    pub const BOUNDARY: &str = "X-FLEXIBILITY-BOUNDARY";

    /// Keeps every message it is handed so tests can inspect the outbox.
    #[derive(Clone, Default)]
    pub struct RecordingMailer {
        pub sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    }

    impl RecordingMailer {
        pub fn messages(&self) -> Vec<OutgoingMessage> {
            self.sent.lock().expect("outbox lock poisoned").clone()
        }
    }

    #[rocket::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: OutgoingMessage) -> Result<(), AppError> {
            self.sent.lock().expect("outbox lock poisoned").push(message);
            Ok(())
        }
    }

    /// Stands in for an unreachable SMTP relay.
    pub struct FailingMailer;

    #[rocket::async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: OutgoingMessage) -> Result<(), AppError> {
            Err(AppError::ExternalService(
                "SMTP error: connection refused".to_string(),
            ))
        }
    }

    pub struct TestContext {
        pub pool: Pool<Sqlite>,
        pub outbox: RecordingMailer,
        pub static_dir: TempDir,
    }

    impl TestContext {
        pub fn upload_dir(&self) -> PathBuf {
            self.static_dir.path().join("uploads")
        }

        pub fn uploaded_files(&self) -> Vec<PathBuf> {
            std::fs::read_dir(self.upload_dir())
                .map(|dir| dir.filter_map(|e| e.ok()).map(|e| e.path()).collect())
                .unwrap_or_default()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("ana", "ana@example.com")
            .user("ben", "ben@example.com")
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestContext) {
        let outbox = RecordingMailer::default();
        let (client, static_dir) = build_client(test_db.pool.clone(), Box::new(outbox.clone())).await;

        (
            client,
            TestContext {
                pool: test_db.pool,
                outbox,
                static_dir,
            },
        )
    }

    pub async fn setup_test_client_with_mailer(
        test_db: TestDb,
        mailer: Box<dyn Mailer>,
    ) -> (Client, TestContext) {
        let (client, static_dir) = build_client(test_db.pool.clone(), mailer).await;

        (
            client,
            TestContext {
                pool: test_db.pool,
                outbox: RecordingMailer::default(),
                static_dir,
            },
        )
    }

    async fn build_client(pool: Pool<Sqlite>, mailer: Box<dyn Mailer>) -> (Client, TempDir) {
        let static_dir = tempfile::tempdir().expect("Failed to create static dir");

        let figment = rocket::Config::figment()
            .merge(("secret_key", TEST_SECRET_KEY))
            .merge(("template_dir", "templates"))
            .merge(("log_level", "off"));

        let services = Services {
            pool,
            mailer,
            images: ImageStore::new(static_dir.path().join("uploads"), "/static/uploads"),
            contact: ContactSettings {
                recipient: CONTACT_RECIPIENT.to_string(),
            },
            policy: SessionPolicy::default(),
            static_dir: static_dir.path().to_path_buf(),
        };

        let client = Client::tracked(init_rocket(figment, services))
            .await
            .expect("Failed to create Rocket client");

        (client, static_dir)
    }

    pub fn form_body(fields: &[(&str, &str)]) -> String {
        fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, RawStr::new(value).percent_encode()))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn multipart_content_type() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    /// A multipart body with the given text fields and an optional
    /// `photo` part of `(filename, bytes)`.
    pub fn multipart_body(fields: &[(&str, &str)], photo: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }

        if let Some((filename, bytes)) = photo {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub async fn login_test_user(client: &Client, email: &str, password: &str) -> Status {
        client
            .post("/login")
            .header(ContentType::Form)
            .body(form_body(&[("email", email), ("password", password)]))
            .dispatch()
            .await
            .status()
    }

    /// Follows a redirect by hand and returns the page it lands on.
    pub async fn follow(client: &Client, location: &str) -> String {
        client
            .get(location.to_string())
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap_or_default()
    }
}
