use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::media::CaptureOptions;

/// Per-user call preferences, persisted across sessions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_true")]
    pub mic_enabled_on_join: bool,
    #[serde(default = "default_true")]
    pub camera_enabled_on_join: bool,
    #[serde(default)]
    pub preferred_camera: Option<String>,
    #[serde(default)]
    pub preferred_microphone: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_name: None,
            mic_enabled_on_join: true,
            camera_enabled_on_join: true,
            preferred_camera: None,
            preferred_microphone: None,
        }
    }
}

impl Settings {
    /// Device hints for the capture layer.
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            preferred_camera: self.preferred_camera.clone(),
            preferred_microphone: self.preferred_microphone.clone(),
        }
    }
}

/// JSON-file-backed settings store. Corrupt or partial files fall back to
/// defaults.
pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    pub fn get(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.settings.lock().unwrap().display_name = name;
        self.save();
    }

    pub fn set_mic_enabled_on_join(&self, enabled: bool) {
        self.settings.lock().unwrap().mic_enabled_on_join = enabled;
        self.save();
    }

    pub fn set_camera_enabled_on_join(&self, enabled: bool) {
        self.settings.lock().unwrap().camera_enabled_on_join = enabled;
        self.save();
    }

    pub fn set_preferred_camera(&self, device_id: Option<String>) {
        self.settings.lock().unwrap().preferred_camera = device_id;
        self.save();
    }

    pub fn set_preferred_microphone(&self, device_id: Option<String>) {
        self.settings.lock().unwrap().preferred_microphone = device_id;
        self.save();
    }

    fn save(&self) {
        let settings = self.settings.lock().unwrap().clone();
        if let Some(parent) = self.file_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&settings) {
            let _ = std::fs::write(&self.file_path, json);
        }
    }

    fn load(path: &PathBuf) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Settings::default(),
        }
    }
}
