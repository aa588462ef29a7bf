use crate::audio::controls::{
    CUTOFF_RANGE, ControlSnapshot, DRIVE_RANGE, FilterMode, RESONANCE_RANGE, VOLUME_RANGE,
};
use crate::audio::tone::ToneConfig;
use crate::render::history::MAX_BLOCK_SIZE;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{error, warn};

const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_DIR_NAME: &str = "ladderscope";

/// Upper bound on retained frames; every slot costs `MAX_BLOCK_SIZE` vertices.
pub const MAX_HISTORY_CAPACITY: usize = 2_048;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSettings {
    pub history_capacity: usize,
    pub history_depth: usize,
    pub drive: f32,
    pub resonance: f32,
    pub cutoff: f32,
    pub volume: f32,
    pub mode: FilterMode,
    pub sample_rate: f32,
    pub block_size: usize,
    pub tone_frequency: f32,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        let controls = ControlSnapshot::default();
        let tone = ToneConfig::default();
        Self {
            history_capacity: 256,
            history_depth: 50,
            drive: controls.drive,
            resonance: controls.resonance,
            cutoff: controls.cutoff,
            volume: controls.volume,
            mode: controls.mode,
            sample_rate: tone.sample_rate,
            block_size: tone.block_size,
            tone_frequency: tone.frequency,
        }
    }
}

impl ScopeSettings {
    /// Pulls every field back into its valid range.
    pub fn sanitized(mut self) -> Self {
        self.history_capacity = self.history_capacity.clamp(1, MAX_HISTORY_CAPACITY);
        self.history_depth = self.history_depth.clamp(1, self.history_capacity);
        self.drive = clamp_finite(self.drive, DRIVE_RANGE);
        self.resonance = clamp_finite(self.resonance, RESONANCE_RANGE);
        self.cutoff = clamp_finite(self.cutoff, CUTOFF_RANGE);
        self.volume = clamp_finite(self.volume, VOLUME_RANGE);
        self.sample_rate = clamp_finite(self.sample_rate, (8_000.0, 192_000.0));
        self.block_size = self.block_size.clamp(16, MAX_BLOCK_SIZE);
        self.tone_frequency = clamp_finite(self.tone_frequency, (20.0, self.sample_rate * 0.25));
        self
    }

    pub fn controls(&self) -> ControlSnapshot {
        ControlSnapshot {
            drive: self.drive,
            resonance: self.resonance,
            cutoff: self.cutoff,
            volume: self.volume,
            mode: self.mode,
        }
    }

    pub fn tone_config(&self) -> ToneConfig {
        ToneConfig {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            frequency: self.tone_frequency,
        }
    }
}

fn clamp_finite(value: f32, (min, max): (f32, f32)) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(dir).join(APP_DIR_NAME)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".config").join(APP_DIR_NAME)
    } else {
        PathBuf::from(".ladderscope")
    }
}

#[derive(Debug)]
pub struct SettingsManager {
    path: PathBuf,
    data: ScopeSettings,
}

impl SettingsManager {
    pub fn load_or_default() -> Self {
        Self::load_from(config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = Self::load_from_disk(&path).unwrap_or_default().sanitized();
        Self { path, data }
    }

    fn load_from_disk(path: &Path) -> Option<ScopeSettings> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!("[settings] failed to parse {path:?}: {err}");
                None
            }
        }
    }

    pub fn settings(&self) -> &ScopeSettings {
        &self.data
    }

    pub fn set_history_depth(&mut self, depth: usize) {
        self.data.history_depth = depth.clamp(1, self.data.history_capacity);
    }

    /// Stores the filter parameters currently applied to the tone.
    pub fn set_controls(&mut self, controls: ControlSnapshot) {
        self.data.drive = controls.drive;
        self.data.resonance = controls.resonance;
        self.data.cutoff = controls.cutoff;
        self.data.volume = controls.volume;
        self.data.mode = controls.mode;
    }

    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)?;
        fs::rename(&tmp_path, &self.path)
    }
}

/// Shared, UI-thread handle that persists after every mutation.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    inner: Rc<RefCell<SettingsManager>>,
}

impl SettingsHandle {
    pub fn load_or_default() -> Self {
        Self::from_manager(SettingsManager::load_or_default())
    }

    pub fn from_manager(manager: SettingsManager) -> Self {
        Self {
            inner: Rc::new(RefCell::new(manager)),
        }
    }

    pub fn borrow(&self) -> Ref<'_, SettingsManager> {
        self.inner.borrow()
    }

    pub fn update<F, R>(&self, mutator: F) -> R
    where
        F: FnOnce(&mut SettingsManager) -> R,
    {
        let mut manager = self.inner.borrow_mut();
        let result = mutator(&mut manager);
        if let Err(err) = manager.save() {
            error!("[settings] failed to persist settings: {err}");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    fn scratch_file() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ladderscope-settings-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        dir.join(SETTINGS_FILE_NAME)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let manager = SettingsManager::load_from(scratch_file());
        assert_eq!(manager.settings(), &ScopeSettings::default());
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let path = scratch_file();
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, "{ not json").expect("write");

        let manager = SettingsManager::load_from(path);
        assert_eq!(manager.settings(), &ScopeSettings::default());
    }

    #[test]
    fn partial_files_fill_in_defaults_and_are_clamped() {
        let path = scratch_file();
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(
            &path,
            r#"{ "history_capacity": 8, "history_depth": 50, "drive": 400.0, "mode": "Hpf12" }"#,
        )
        .expect("write");

        let settings = SettingsManager::load_from(path).settings().clone();
        assert_eq!(settings.history_capacity, 8);
        assert_eq!(settings.history_depth, 8);
        assert_eq!(settings.drive, 100.0);
        assert_eq!(settings.mode, FilterMode::Hpf12);
        assert_eq!(settings.volume, ScopeSettings::default().volume);
    }

    #[test]
    fn updates_are_persisted_atomically() {
        let path = scratch_file();
        let handle = SettingsHandle::from_manager(SettingsManager::load_from(path.clone()));
        handle.update(|manager| {
            manager.set_history_depth(12);
            manager.set_controls(ControlSnapshot {
                drive: 30.0,
                mode: FilterMode::Bpf24,
                ..ControlSnapshot::default()
            });
        });

        assert!(!path.with_extension("json.tmp").exists());
        let reloaded = SettingsManager::load_from(path);
        assert_eq!(reloaded.settings().history_depth, 12);
        assert_eq!(reloaded.settings().mode, FilterMode::Bpf24);
        assert_eq!(reloaded.settings().drive, 30.0);
    }

    #[test]
    fn default_settings_are_already_sane() {
        let defaults = ScopeSettings::default();
        assert_eq!(defaults.clone().sanitized(), defaults);
    }
}
