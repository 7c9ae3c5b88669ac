pub mod models;
pub mod repositories;

pub use models::GeneralSettingsModel;
pub use repositories::{GeneralSettingsJsonRepository, GeneralSettingsRepository};
