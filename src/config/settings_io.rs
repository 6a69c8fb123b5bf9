use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::settings::Settings;

pub const ENV_BASE_URL: &str = "IMAGE_STORY_BASE_URL";
pub const ENV_VISION_MODEL: &str = "IMAGE_STORY_VISION_MODEL";
pub const ENV_TEXT_MODEL: &str = "IMAGE_STORY_TEXT_MODEL";

pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("image_story");
    path.push("settings.json");
    path
}

/// Reads settings from `path`. A missing file gives defaults; an unreadable
/// or malformed one is logged and also gives defaults.
pub fn load_settings_from(path: &Path) -> Settings {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Settings::default();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not read settings, using defaults");
            return Settings::default();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "malformed settings, using defaults");
        Settings::default()
    })
}

pub fn load_settings() -> Settings {
    let mut settings = load_settings_from(&settings_path());
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Overlays non-empty environment values on top of file settings.
pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = var(ENV_BASE_URL) {
        settings.base_url = Some(url);
    }
    if let Some(model) = var(ENV_VISION_MODEL) {
        settings.vision_model = model;
    }
    if let Some(model) = var(ENV_TEXT_MODEL) {
        settings.text_model = model;
    }
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn save_settings(settings: &Settings) -> anyhow::Result<PathBuf> {
    let path = settings_path();
    save_settings_to(&path, settings)?;
    Ok(path)
}
