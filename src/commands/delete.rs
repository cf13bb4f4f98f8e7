//! Delete a post from the command line

use anyhow::Result;

use crate::Micropub;

/// Delete the post named by `url` (identifier, path or full URL)
pub fn run(app: &Micropub, url: &str) -> Result<()> {
    app.store().delete(url)?;
    println!("Deleted: {}", url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::StoreError;

    #[test]
    fn test_delete_missing_post() {
        let dir = tempfile::tempdir().unwrap();
        let app = Micropub::with_config(dir.path().to_path_buf(), ServiceConfig::default());

        let err = run(&app, "/2024-01-02-missing.md").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound(_))
        ));
    }
}
