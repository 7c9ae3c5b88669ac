use serde::{Deserialize, Serialize};

/// General application settings, persisted as JSON.
///
/// Every field carries a serde default so settings files written by older
/// builds keep loading after new fields are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettingsModel {
    /// Base URL of the backend API, e.g. `http://127.0.0.1:3000/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout for collaborator calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Whether assistant replies stream incrementally.
    #[serde(default = "default_streaming_enabled")]
    pub streaming_enabled: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_streaming_enabled() -> bool {
    true
}

impl Default for GeneralSettingsModel {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            streaming_enabled: default_streaming_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_loads_all_defaults() {
        let settings: GeneralSettingsModel = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, GeneralSettingsModel::default());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let settings: GeneralSettingsModel =
            serde_json::from_str(r#"{"streaming_enabled": false, "font_size": 14}"#).unwrap();
        assert!(!settings.streaming_enabled);
    }
}
