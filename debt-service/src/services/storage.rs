use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Image extensions accepted for debtor and debt uploads.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "heic"];

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    /// Keys are relative paths; anything climbing out of the base is refused.
    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid storage key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// Lower-cased extension of `file_name` if it is an accepted image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_IMAGE_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

/// `<folder>/<uuid>.<ext>`
pub fn image_key(folder: &str, extension: &str) -> String {
    format!("{}/{}.{}", folder, Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_image_extensions() {
        assert_eq!(image_extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(image_extension("scan.heic").as_deref(), Some("heic"));
        assert_eq!(image_extension("a.b.png").as_deref(), Some("png"));
        assert_eq!(image_extension("report.pdf"), None);
        assert_eq!(image_extension("noext"), None);
    }

    #[test]
    fn keys_are_namespaced_by_folder() {
        let key = image_key("debtors", "png");
        assert!(key.starts_with("debtors/"));
        assert!(key.ends_with(".png"));
    }

    #[tokio::test]
    async fn upload_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage.upload("debts/a.png", vec![1, 2, 3]).await.unwrap();
        let path = dir.path().join("debts/a.png");
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);

        storage.delete("debts/a.png").await.unwrap();
        assert!(!path.exists());

        // deleting a missing file is not an error
        storage.delete("debts/a.png").await.unwrap();
    }

    #[tokio::test]
    async fn refuses_keys_outside_base() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(storage.upload("../escape.png", vec![0]).await.is_err());
        assert!(storage.delete("/etc/passwd").await.is_err());
    }
}
