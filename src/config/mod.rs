use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CanvasError, CanvasResult};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::hit_test::DEFAULT_MIN_RESIZE_SIZE;
use crate::overlay::{OverlayStyle, DEFAULT_FONT_NAME};

const APP_DIR: &str = "overmark";
const APP_CONFIG_FILE: &str = "config.json";

/// Canvas settings from `config.json`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Style template for newly created overlays.
    pub default_style: OverlayStyle,
    /// Resize-handle hit radius in screen pixels.
    pub handle_hit_radius: f64,
    /// Drawn handle square size in screen pixels.
    pub handle_size: f64,
    /// Overlay hit-test tolerance in screen pixels, never below 3 image units.
    pub hit_tolerance: f64,
    /// Smallest width or height a new non-segment shape needs to be kept.
    pub min_shape_size: f64,
    pub min_resize_size: f64,
    pub history_limit: usize,
    pub font_dirs: Vec<PathBuf>,
    pub default_font: String,
    pub zoom_min: f64,
    pub zoom_max: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            default_style: OverlayStyle::default(),
            handle_hit_radius: 8.0,
            handle_size: 8.0,
            hit_tolerance: 3.0,
            min_shape_size: 3.0,
            min_resize_size: DEFAULT_MIN_RESIZE_SIZE,
            history_limit: DEFAULT_HISTORY_LIMIT,
            font_dirs: Vec::new(),
            default_font: DEFAULT_FONT_NAME.to_string(),
            zoom_min: 0.05,
            zoom_max: 16.0,
        }
    }
}

impl CanvasConfig {
    pub fn from_json(contents: &str) -> CanvasResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn read_from(path: &Path) -> CanvasResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| CanvasError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }
}

pub fn load_canvas_config() -> CanvasConfig {
    let xdg_config_home = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    load_canvas_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_canvas_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> CanvasConfig {
    let Some(path) = config_file_path(xdg_config_home, home).filter(|path| path.exists()) else {
        return CanvasConfig::default();
    };
    CanvasConfig::read_from(&path).unwrap_or_else(|err| {
        tracing::warn!(?err, ?path, "failed to load config.json; using defaults");
        CanvasConfig::default()
    })
}

/// `$XDG_CONFIG_HOME/overmark/config.json`, else under `$HOME/.config`. An
/// empty `XDG_CONFIG_HOME` counts as unset.
pub fn config_file_path(xdg_config_home: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    let root = match xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        Some(xdg) => xdg.to_path_buf(),
        None => home?.join(".config"),
    };
    Some(root.join(APP_DIR).join(APP_CONFIG_FILE))
}
