//! Create a new post from the command line

use anyhow::Result;
use serde_json::Value as JsonValue;

use crate::content::{PostId, Properties};
use crate::Micropub;

/// Create a post with an optional title and extra categories
pub fn create_post(
    app: &Micropub,
    title: Option<&str>,
    content: &str,
    categories: &[String],
) -> Result<PostId> {
    let mut properties = Properties::new();
    if let Some(title) = title {
        properties.insert("title".to_string(), JsonValue::from(title));
    }
    properties.insert("content".to_string(), JsonValue::from(content));
    if !categories.is_empty() {
        properties.insert("category".to_string(), JsonValue::from(categories.to_vec()));
    }

    let id = app.store().create(&properties)?;
    println!("Created: {}", id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommitAuthor, ServiceConfig};
    use crate::StoreError;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn test_app(dir: &tempfile::TempDir) -> Micropub {
        let config = ServiceConfig {
            author: Some(CommitAuthor {
                name: "Test".to_string(),
                email: "test@example.com".to_string(),
            }),
            ..Default::default()
        };
        Micropub::with_config(dir.path().to_path_buf(), config)
    }

    #[test]
    fn test_create_post_in_git_repository() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);
        app.init().unwrap();

        let categories = vec!["notes".to_string()];
        let id = create_post(&app, Some("Hello CLI"), "Body", &categories).unwrap();

        assert!(id.as_str().ends_with("-hello-cli.md"));
        let doc = app.store().read(id.as_str()).unwrap();
        assert_eq!(doc.title(), "Hello CLI");
        assert_eq!(doc.body, "Body");
        assert!(doc.frontmatter.contains_key("category"));
    }

    #[test]
    fn test_empty_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        let err = create_post(&app, None, "", &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation(_))
        ));
    }
}
