use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::render::resident::clamp_bound;
use crate::viewer::ViewerOptions;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagesurf";

/// Every renderer tunable, persisted as YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Resident set bound, 3 to 6
    #[serde(default = "default_lru_limit")]
    pub lru_limit: usize,

    #[serde(default)]
    pub eager_mode: bool,

    #[serde(default)]
    pub retain_high_res: bool,

    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    #[serde(default = "default_thumbnail_scale")]
    pub thumbnail_scale: f32,

    #[serde(default = "default_thumbnail_window")]
    pub thumbnail_window: usize,

    #[serde(default = "default_thumbnail_stagger_ms")]
    pub thumbnail_stagger_ms: u64,

    #[serde(default = "default_placeholder_min_height")]
    pub placeholder_min_height: f32,

    #[serde(default = "default_page_gap")]
    pub page_gap: f32,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_zoom_step")]
    pub zoom_step: u32,

    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,

    #[serde(default = "default_zoom")]
    pub default_zoom: u32,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_lru_limit() -> usize {
    crate::render::resident::DEFAULT_BOUND
}

fn default_load_timeout_ms() -> u64 {
    30_000
}

fn default_thumbnail_scale() -> f32 {
    crate::render::THUMBNAIL_SCALE
}

fn default_thumbnail_window() -> usize {
    crate::render::THUMBNAIL_WINDOW
}

fn default_thumbnail_stagger_ms() -> u64 {
    8
}

fn default_placeholder_min_height() -> f32 {
    crate::render::PLACEHOLDER_MIN_HEIGHT
}

fn default_page_gap() -> f32 {
    crate::render::PAGE_GAP
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

fn default_workers() -> usize {
    crate::render::DEFAULT_WORKERS
}

fn default_zoom_step() -> u32 {
    crate::render::Zoom::STEP
}

fn default_fade_ms() -> u64 {
    crate::render::FADE_MS
}

fn default_zoom() -> u32 {
    crate::render::Zoom::DEFAULT_PERCENT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            lru_limit: default_lru_limit(),
            eager_mode: false,
            retain_high_res: false,
            load_timeout_ms: default_load_timeout_ms(),
            thumbnail_scale: default_thumbnail_scale(),
            thumbnail_window: default_thumbnail_window(),
            thumbnail_stagger_ms: default_thumbnail_stagger_ms(),
            placeholder_min_height: default_placeholder_min_height(),
            page_gap: default_page_gap(),
            device_pixel_ratio: default_device_pixel_ratio(),
            workers: default_workers(),
            zoom_step: default_zoom_step(),
            fade_ms: default_fade_ms(),
            default_zoom: default_zoom(),
        }
    }
}

/// `<config_dir>/pagesurf/config.yaml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl Settings {
    /// Load from the default config location, creating it with defaults
    /// when missing
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            warn!("Could not determine config directory, using default settings");
            return Self::default();
        };
        Self::load_from_path(&path)
    }

    /// Read settings from `path`. A missing file is created with defaults; an
    /// unreadable or malformed one is logged and replaced by defaults in memory.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file not found, creating with defaults at {path:?}");
            let settings = Self::default();
            if let Err(e) = settings.save_to_path(path) {
                error!("Failed to save settings to {path:?}: {e}");
            }
            return settings;
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
                Ok(mut settings) => {
                    debug!("Loaded settings from {path:?}");

                    if settings.version < CURRENT_VERSION {
                        migrate_settings(&mut settings);
                        if let Err(e) = settings.save_to_path(path) {
                            error!("Failed to save migrated settings to {path:?}: {e}");
                        }
                    }
                    settings.sanitize();
                    settings
                }
                Err(e) => {
                    error!("Failed to parse settings file {path:?}: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read settings file {path:?}: {e}");
                Self::default()
            }
        }
    }

    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut content = String::from(SETTINGS_HEADER);
        content.push_str(&serde_yaml::to_string(self)?);
        fs::write(path, content)?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    /// Pull out-of-range values back into range
    fn sanitize(&mut self) {
        let bound = clamp_bound(self.lru_limit);
        if bound != self.lru_limit {
            warn!("lru_limit {} out of range, using {bound}", self.lru_limit);
            self.lru_limit = bound;
        }
        if !(self.thumbnail_scale.is_finite() && self.thumbnail_scale > 0.0) {
            self.thumbnail_scale = default_thumbnail_scale();
        }
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            self.device_pixel_ratio = default_device_pixel_ratio();
        }
        self.workers = self.workers.max(1);
        self.zoom_step = self.zoom_step.max(1);
    }

    /// Runtime options for a document load
    #[must_use]
    pub fn viewer_options(&self) -> ViewerOptions {
        ViewerOptions {
            resident_set_bound: clamp_bound(self.lru_limit),
            eager_mode: self.eager_mode,
            retain_high_res: self.retain_high_res,
            zoom: Some(self.default_zoom),
            zoom_step: self.zoom_step,
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            thumbnail_scale: self.thumbnail_scale,
            thumbnail_window: self.thumbnail_window,
            thumbnail_stagger: Duration::from_millis(self.thumbnail_stagger_ms),
            placeholder_min_height: self.placeholder_min_height,
            page_gap: self.page_gap,
            device_pixel_ratio: self.device_pixel_ratio,
            workers: self.workers,
            fade: Duration::from_millis(self.fade_ms),
            ..ViewerOptions::default()
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pagesurf settings
# ============================================================================
# lru_limit            high-res pages kept materialized at once (3-6)
# eager_mode           render every page up front and never evict
# retain_high_res      keep high-res pages when they leave the render window
# load_timeout_ms      wall-clock ceiling for opening a document
# thumbnail_*          placeholder scale, initial window and dispatch stagger
# device_pixel_ratio   backing store pixels per CSS pixel

"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let settings = Settings::load_from_path(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# ===="));
        assert!(content.contains("lru_limit: 4"));
    }

    #[test]
    fn round_trip_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let settings = Settings {
            lru_limit: 6,
            eager_mode: true,
            default_zoom: 150,
            ..Settings::default()
        };
        settings.save_to_path(&path).unwrap();
        assert_eq!(Settings::load_from_path(&path), settings);
    }

    #[test]
    fn partial_file_fills_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nlru_limit: 12\n").unwrap();

        let settings = Settings::load_from_path(&path);
        assert_eq!(settings.lru_limit, 6);
        assert_eq!(settings.load_timeout_ms, 30_000);
        assert_eq!(settings.thumbnail_stagger_ms, 8);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "lru_limit: [oops").unwrap();
        assert_eq!(Settings::load_from_path(&path), Settings::default());
    }

    #[test]
    fn old_version_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\n").unwrap();
        assert_eq!(Settings::load_from_path(&path).version, CURRENT_VERSION);
    }

    #[test]
    fn viewer_options_follow_settings() {
        let settings = Settings {
            lru_limit: 5,
            eager_mode: true,
            thumbnail_stagger_ms: 20,
            ..Settings::default()
        };
        let options = settings.viewer_options();
        assert_eq!(options.resident_set_bound, 5);
        assert!(options.eager_mode);
        assert_eq!(options.thumbnail_stagger, Duration::from_millis(20));
        assert_eq!(options.zoom, Some(100));
        assert!(options.initial_page.is_none());
    }
}
