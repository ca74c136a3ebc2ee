use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::actions::Action;
use crate::gestures::ClassificationResult;
use crate::tracker::MoveSample;

/// Result of a user callback. Errors are never swallowed by the tracker.
pub type HandlerResult = anyhow::Result<()>;
pub type ZoomHandler<T> = Box<dyn FnMut(&ClassificationResult<T>) -> HandlerResult>;
pub type MoveHandler = Box<dyn FnMut(&MoveSample) -> HandlerResult>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to install default profile at {}: {source}", .path.display())]
    Install {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no home directory to look for a profile in")]
    NoHome,
    #[error("invalid profile: {0}")]
    Invalid(String),
}

/// Gesture thresholds and platform behaviour, fixed at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Horizontal movement (in gesture units) one finger must reach for a zoom.
    pub move_x: f64,
    /// Vertical counterpart of `move_x`.
    pub move_y: f64,
    /// Suppress the platform's own handling of the touch stream.
    pub prevent_default: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            move_x: 40.0,
            move_y: 40.0,
            prevent_default: true,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in [("move_x", self.move_x), ("move_y", self.move_y)] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "gesture.{name} must be a finite, non-negative number (got {v})"
                )));
            }
        }
        Ok(())
    }
}

/// Settings plus the optional callback slots. An empty slot is a no-op.
pub struct Config<T> {
    pub settings: Settings,
    pub zoom_in: Option<ZoomHandler<T>>,
    pub zoom_out: Option<ZoomHandler<T>>,
    pub multi_touch_move: Option<MoveHandler>,
}

impl<T> Default for Config<T> {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl<T> Config<T> {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            zoom_in: None,
            zoom_out: None,
            multi_touch_move: None,
        }
    }

    pub fn on_zoom_in<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ClassificationResult<T>) -> HandlerResult + 'static,
    {
        self.zoom_in = Some(Box::new(f));
        self
    }

    pub fn on_zoom_out<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ClassificationResult<T>) -> HandlerResult + 'static,
    {
        self.zoom_out = Some(Box::new(f));
        self
    }

    pub fn on_multi_touch_move<F>(mut self, f: F) -> Self
    where
        F: FnMut(&MoveSample) -> HandlerResult + 'static,
    {
        self.multi_touch_move = Some(Box::new(f));
        self
    }
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("zoom_in", &self.zoom_in.is_some())
            .field("zoom_out", &self.zoom_out.is_some())
            .field("multi_touch_move", &self.multi_touch_move.is_some())
            .finish()
    }
}

// ---------------- daemon profile (TOML) ----------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Normalised pad coordinates (0..1) are multiplied by this.
    pub scale: f64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self { scale: 1000.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Bindings {
    pub zoom_in: Action,
    pub zoom_out: Action,
    pub tap: Action,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            zoom_in: Action::key_chord("CTRL+EQUAL"),
            zoom_out: Action::key_chord("CTRL+MINUS"),
            tap: Action::Mouse(crate::actions::MouseButton::Left),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub gesture: Settings,
    pub input: InputSettings,
    pub bindings: Bindings,
}

fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = UserDirs::new().ok_or(ConfigError::NoHome)?;
    Ok(home.home_dir().join(".config").join("pinchzoom"))
}

pub fn default_profile_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("profile.toml"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl Profile {
    pub fn from_toml_str(txt: &str, origin: &Path) -> Result<Self, ConfigError> {
        let profile: Profile = toml::from_str(txt).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&txt, path)
    }

    /// Load the user's profile, writing the built-in one first if missing.
    pub fn load_or_install_default() -> Result<Self, ConfigError> {
        let path = default_profile_path()?;
        install_default_at(&path)?;
        Self::load(&path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gesture.validate()?;
        if !self.input.scale.is_finite() || self.input.scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "input.scale must be a finite, positive number (got {})",
                self.input.scale
            )));
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("unnamed")
    }
}

fn install_default_at(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Ok(());
    }
    let install_err = |source| ConfigError::Install {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(install_err)?;
    }
    fs::write(path, default_profile_text()).map_err(install_err)?;
    info!("installed default profile at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::MouseButton;

    #[test]
    fn builtin_profile_parses() {
        let p = Profile::from_toml_str(default_profile_text(), Path::new("default.toml")).unwrap();
        assert_eq!(p.gesture, Settings::default());
        assert_eq!(p.input.scale, 1000.0);
        assert_eq!(p.bindings.tap, Action::Mouse(MouseButton::Left));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let p = Profile::from_toml_str("[gesture]\nmove_x = 25\n", Path::new("p.toml")).unwrap();
        assert_eq!(p.gesture.move_x, 25.0);
        assert_eq!(p.gesture.move_y, 40.0);
        assert!(p.gesture.prevent_default);
        assert_eq!(p.bindings.zoom_out, Action::key_chord("CTRL+MINUS"));
    }

    #[test]
    fn rejects_negative_threshold() {
        let err = Profile::from_toml_str("[gesture]\nmove_y = -1.0\n", Path::new("p.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn rejects_zero_scale() {
        let err =
            Profile::from_toml_str("[input]\nscale = 0.0\n", Path::new("p.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn rejects_unknown_binding() {
        let err = Profile::from_toml_str("[bindings]\ntap = \"teleport\"\n", Path::new("p.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn installs_and_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profile.toml");
        install_default_at(&path).unwrap();
        assert!(path.exists());

        // an existing profile is left alone
        fs::write(&path, "[meta]\nname = \"mine\"\n").unwrap();
        install_default_at(&path).unwrap();
        let p = Profile::load(&path).unwrap();
        assert_eq!(p.display_name(), "mine");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Profile::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn config_slots_start_empty() {
        let cfg: Config<u8> = Config::default();
        assert!(cfg.zoom_in.is_none() && cfg.zoom_out.is_none());
        assert!(cfg.multi_touch_move.is_none());
        let cfg = cfg.on_zoom_in(|_| Ok(()));
        assert!(format!("{cfg:?}").contains("zoom_in: true"));
    }
}
