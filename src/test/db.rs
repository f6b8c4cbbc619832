#[cfg(test)]
mod tests {
    use crate::db::{
        authenticate_user, create_progress_entry, create_user, find_training_template, get_user,
        get_progress_entries, get_training_templates,
    };
    use crate::error::AppError;
    use crate::survey::{Level, Position};
    use crate::test::test_db::TestDbBuilder;

    #[rocket::async_test]
    async fn test_create_and_get_user() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let id = create_user(&test_db.pool, "ana", "ana@example.com", "password123")
            .await
            .expect("Failed to create user");

        let user = get_user(&test_db.pool, id).await.expect("Failed to get user");
        assert_eq!(user.username, "ana");
        assert_eq!(user.email, "ana@example.com");
    }

    #[rocket::async_test]
    async fn test_get_missing_user() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        assert!(matches!(
            get_user(&test_db.pool, 999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn test_duplicate_email_keeps_one_user() {
        let test_db = TestDbBuilder::new()
            .user("ana", "ana@example.com")
            .build()
            .await
            .unwrap();

        let result = create_user(&test_db.pool, "ana2", "ana@example.com", "password123").await;

        match result {
            Err(AppError::Conflict(msg)) => assert_eq!(msg, "Email already registered."),
            other => panic!("Expected conflict, got {:?}", other),
        }
        assert_eq!(test_db.count("users").await, 1);
    }

    #[rocket::async_test]
    async fn test_short_password_creates_nothing() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let result = create_user(&test_db.pool, "ana", "ana@example.com", "1234567").await;

        match result {
            Err(AppError::Validation(msg)) => {
                assert_eq!(msg, "Password must be at least 8 characters long.")
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert_eq!(test_db.count("users").await, 0);
    }

    #[rocket::async_test]
    async fn test_password_length_counts_characters() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        // Eight characters, more than eight bytes
        let result = create_user(&test_db.pool, "zoe", "zoe@example.com", "ééééééé1").await;
        assert!(result.is_ok());
    }

    #[rocket::async_test]
    async fn test_authenticate_user() {
        let test_db = TestDbBuilder::new()
            .user_with_password("ana", "ana@example.com", "correct horse")
            .build()
            .await
            .unwrap();

        let user = authenticate_user(&test_db.pool, "ana@example.com", "correct horse")
            .await
            .unwrap()
            .expect("Valid credentials should authenticate");
        assert_eq!(user.username, "ana");

        assert!(
            authenticate_user(&test_db.pool, "ana@example.com", "wrong")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            authenticate_user(&test_db.pool, "ghost@example.com", "correct horse")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[rocket::async_test]
    async fn test_progress_entry_requires_existing_user() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let result = create_progress_entry(&test_db.pool, 42, "/static/uploads/x.png", None).await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(test_db.count("progress_entries").await, 0);
    }

    #[rocket::async_test]
    async fn test_progress_entries_are_scoped_to_user() {
        let test_db = TestDbBuilder::new()
            .user("ana", "ana@example.com")
            .user("ben", "ben@example.com")
            .entry("ana", "/static/uploads/a1.png", Some("one"))
            .entry("ben", "/static/uploads/b1.png", None)
            .entry("ana", "/static/uploads/a2.png", Some("two"))
            .build()
            .await
            .unwrap();

        let ana = test_db.user_id("ana").unwrap();
        let entries = get_progress_entries(&test_db.pool, ana).await.unwrap();

        let photos: Vec<_> = entries.iter().map(|e| e.photo.as_str()).collect();
        assert_eq!(photos, vec!["/static/uploads/a1.png", "/static/uploads/a2.png"]);
        assert!(entries.iter().all(|e| e.user_id == ana));
    }

    #[rocket::async_test]
    async fn test_seeded_templates_cover_every_pair() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        assert_eq!(get_training_templates(&test_db.pool).await.unwrap().len(), 10);

        for position in Position::ALL {
            for level in [Level::Beginner, Level::Advanced] {
                let template = find_training_template(&test_db.pool, position, level)
                    .await
                    .unwrap()
                    .unwrap_or_else(|| panic!("No template for {} {}", position, level));

                assert_eq!(template.position_name, position.as_str());
                assert_eq!(template.template_level, level.as_str());
            }
        }
    }

    #[rocket::async_test]
    async fn test_first_matching_template_wins() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        sqlx::query(
            "INSERT INTO training_templates (position_name, template_level, image_path, description)
             VALUES ('Bridge', 'Advanced', '/static/templates/duplicate.png', 'Duplicate')",
        )
        .execute(&test_db.pool)
        .await
        .unwrap();

        let template = find_training_template(&test_db.pool, Position::Bridge, Level::Advanced)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(template.image_path, "/static/templates/bridge_advanced.png");
    }

    #[rocket::async_test]
    async fn test_seeded_template_images_ship_with_static() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        for template in get_training_templates(&test_db.pool).await.unwrap() {
            let relative = template
                .image_path
                .strip_prefix("/static/")
                .unwrap_or_else(|| panic!("{} is not under /static", template.image_path));
            let file = std::path::Path::new("static").join(relative);

            assert!(file.is_file(), "missing image {}", file.display());
        }
    }
}
