/// Settings persisted in chrome.storage.local

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const API_KEY: &str = "openai_api_key";
pub const SELECTED_MODEL: &str = "selected_model";
pub const AUTO_ORGANIZE_ENABLED: &str = "auto_organize_enabled";
pub const AUTO_ORGANIZE_THRESHOLD: &str = "auto_organize_threshold";

pub const ALL_KEYS: [&str; 4] = [API_KEY, SELECTED_MODEL, AUTO_ORGANIZE_ENABLED, AUTO_ORGANIZE_THRESHOLD];

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_THRESHOLD: u32 = 15;
pub const MIN_THRESHOLD: u32 = 5;
pub const MAX_THRESHOLD: u32 = 100;

static API_KEY_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9_\-]+$").expect("valid API key pattern"));

/// Raw view of the storage keys; absent keys fall back to defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(rename = "openai_api_key", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "selected_model", default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
    #[serde(rename = "auto_organize_enabled", default, skip_serializing_if = "Option::is_none")]
    pub auto_organize_enabled: Option<bool>,
    #[serde(rename = "auto_organize_threshold", default, skip_serializing_if = "Option::is_none")]
    pub auto_organize_threshold: Option<u32>,
}

impl StoredSettings {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn selected_model(&self) -> String {
        self.selected_model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn auto_organize_enabled(&self) -> bool {
        self.auto_organize_enabled.unwrap_or(false)
    }

    pub fn auto_organize_threshold(&self) -> u32 {
        self.auto_organize_threshold
            .map(clamp_threshold)
            .unwrap_or(DEFAULT_THRESHOLD)
    }
}

pub fn clamp_threshold(value: u32) -> u32 {
    value.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyCheck {
    Valid(String),
    Empty,
    BadFormat,
}

/// Check a user-entered OpenAI key before it is saved
pub fn check_api_key(input: &str) -> KeyCheck {
    let key = input.trim();
    if key.is_empty() {
        KeyCheck::Empty
    } else if API_KEY_FORMAT.is_match(key) {
        KeyCheck::Valid(key.to_string())
    } else {
        KeyCheck::BadFormat
    }
}
