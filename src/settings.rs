use crate::errors::{JotError, JotResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S (%s)";
pub const DEFAULT_COMPLETION_TAG: &str = "completion";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JotSettings {
    pub log_file: PathBuf,
    pub date_format: String,
    pub completion_model: String,
    pub completion_tag: String,
    pub system_prompt: Option<String>,
}

impl Default for JotSettings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(".catjot"),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            completion_model: "gpt-4o-mini".to_string(),
            completion_tag: DEFAULT_COMPLETION_TAG.to_string(),
            system_prompt: None,
        }
    }
}

impl JotSettings {
    pub fn shadow_file(&self) -> PathBuf {
        shadow_path(&self.log_file)
    }

    pub fn backup_file(&self) -> PathBuf {
        backup_path(&self.log_file)
    }
}

pub fn shadow_path(log: &Path) -> PathBuf {
    sibling_with_suffix(log, ".new")
}

pub fn backup_path(log: &Path) -> PathBuf {
    sibling_with_suffix(log, ".old")
}

fn sibling_with_suffix(log: &Path, suffix: &str) -> PathBuf {
    let mut raw = log.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

pub fn load(path: &Path) -> JotResult<JotSettings> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "settings file absent; using defaults");
            return Ok(JotSettings::default());
        }
        Err(error) => return Err(JotError::Io(error.to_string())),
    };
    serde_json::from_slice(&bytes).map_err(JotError::from)
}

pub fn save(path: &Path, settings: &JotSettings) -> JotResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| JotError::Io(error.to_string()))?;
    }
    let bytes = serde_json::to_vec_pretty(settings)?;
    fs::write(path, bytes).map_err(|error| JotError::Io(error.to_string()))
}
