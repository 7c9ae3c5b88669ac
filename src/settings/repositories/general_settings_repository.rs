use std::future::Future;
use std::pin::Pin;

use super::error::SettingsResult;
use crate::settings::models::GeneralSettingsModel;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait GeneralSettingsRepository: Send + Sync + 'static {
    /// Load general settings from storage
    fn load(&self) -> BoxFuture<'static, SettingsResult<GeneralSettingsModel>>;

    /// Save general settings to storage
    fn save(&self, settings: GeneralSettingsModel) -> BoxFuture<'static, SettingsResult<()>>;
}
