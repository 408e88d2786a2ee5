use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::alert::ToneKind;

/// How a ringing alarm sounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertSettings {
    pub tone: ToneKind,
    pub volume: f32,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            tone: ToneKind::Beep,
            volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Seconds between alarm checks. The matcher's one-minute window assumes
    /// the default of 60.
    pub poll_interval_secs: u64,
    pub alert: AlertSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            alert: AlertSettings::default(),
        }
    }
}

/// JSON-file-backed settings, loaded once and persisted on update.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            *guard = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.engine();
        assert_eq!(settings.poll_interval_secs, 60);
        assert_eq!(settings.alert.tone, ToneKind::Beep);
    }

    #[test]
    fn update_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        let mut settings = store.engine();
        settings.poll_interval_secs = 30;
        settings.alert.tone = ToneKind::Chime;
        store.update(settings).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        let settings = reopened.engine();
        assert_eq!(settings.poll_interval_secs, 30);
        assert_eq!(settings.alert.tone, ToneKind::Chime);
    }
}
