use std::io;
use std::path::PathBuf;

use super::error::{SettingsError, SettingsResult};
use super::general_settings_repository::{BoxFuture, GeneralSettingsRepository};
use crate::settings::models::GeneralSettingsModel;

pub struct GeneralSettingsJsonRepository {
    file_path: PathBuf,
}

impl GeneralSettingsJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> SettingsResult<Self> {
        let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        let file_path = config_dir.join("natter").join("settings.json");
        Ok(Self { file_path })
    }

    /// Create repository reading and writing an explicit path.
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

impl GeneralSettingsRepository for GeneralSettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, SettingsResult<GeneralSettingsModel>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    return Ok(GeneralSettingsModel::default());
                }
                Err(error) => return Err(error.into()),
            };

            let settings: GeneralSettingsModel = serde_json::from_str(&contents)?;
            Ok(settings)
        })
    }

    fn save(&self, settings: GeneralSettingsModel) -> BoxFuture<'static, SettingsResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)?;

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, &json).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GeneralSettingsJsonRepository::with_path(dir.path().join("settings.json"));

        let settings = repo.load().await.unwrap();
        assert_eq!(settings, GeneralSettingsModel::default());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GeneralSettingsJsonRepository::with_path(dir.path().join("settings.json"));
        let settings = GeneralSettingsModel {
            base_url: "https://api.example/v1".to_string(),
            request_timeout_secs: 30,
            streaming_enabled: false,
        };

        repo.save(settings.clone()).await.unwrap();
        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_partial_file_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"request_timeout_secs": 5}"#).unwrap();

        let repo = GeneralSettingsJsonRepository::with_path(path);
        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.request_timeout_secs, 5);
        assert_eq!(loaded.base_url, GeneralSettingsModel::default().base_url);
        assert!(loaded.streaming_enabled);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let repo = GeneralSettingsJsonRepository::with_path(path.clone());

        repo.save(GeneralSettingsModel::default()).await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
