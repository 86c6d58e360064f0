#![forbid(unsafe_code)]

//! Installation configuration loaded from TOML or JSON.
//!
//! Captures the screen layout, gesture tuning, inactivity timeouts, and
//! network endpoints of a node as a single [`InstallationConfig`].
//!
//! # Loading
//!
//! ```toml
//! # mural.toml
//! [layout]
//! screens = 3
//! windows_per_screen = 2
//!
//! [timeouts]
//! reset_after_ms = 180000
//!
//! [network.peers]
//! "4" = "10.0.0.14:47100"
//! ```
//!
//! ```rust,ignore
//! let config = InstallationConfig::load("mural.toml")?;
//! let config = InstallationConfig::from_json_str(json)?;
//! ```
//!
//! Every field has a default, so a partial file only overrides what it names.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use mural_core::gesture::FrictionParams;
use mural_core::transport::Resolution;
use mural_core::{GestureConfig, MAX_WINDOWS, ScreenLayout, WindowId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level InstallationConfig
// ---------------------------------------------------------------------------

/// Everything a node needs to know about the installation it is part of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallationConfig {
    /// Screens, window slots, and resolutions.
    pub layout: LayoutConfig,
    /// Recognizer thresholds and momentum friction.
    pub gesture: GestureSection,
    /// Inactivity chain durations.
    pub timeouts: TimeoutConfig,
    /// Sockets and peer addresses.
    pub network: NetworkConfig,
}

impl InstallationConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Load a `.toml` or `.json` file and reject it unless it validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let config = match extension.as_str() {
            "toml" => Self::from_toml_file(path)?,
            "json" => Self::from_json_file(path)?,
            _ => return Err(ConfigError::Extension(extension)),
        };
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Pretty TOML rendering, used by `mural default-config`.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)
    }

    /// Pretty JSON rendering.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Json)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let layout = &self.layout;
        if layout.screens == 0 {
            errors.push("layout.screens must be > 0".into());
        }
        if layout.windows_per_screen == 0 {
            errors.push("layout.windows_per_screen must be > 0".into());
        }
        if layout.screens > 0
            && layout.windows_per_screen > 0
            && ScreenLayout::try_new(layout.screens, layout.windows_per_screen).is_none()
        {
            errors.push(format!(
                "layout of {} screens x {} windows exceeds {MAX_WINDOWS} windows",
                layout.screens, layout.windows_per_screen
            ));
        }
        for (name, value) in [
            ("layout.screen_width", layout.screen_width),
            ("layout.screen_height", layout.screen_height),
            ("layout.sensor_width", layout.sensor_width),
            ("layout.sensor_height", layout.sensor_height),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{name} must be > 0, got {value}"));
            }
        }

        let gesture = &self.gesture;
        if !(gesture.refresh_rate_hz.is_finite() && gesture.refresh_rate_hz > 0.0) {
            errors.push(format!(
                "gesture.refresh_rate_hz must be > 0, got {}",
                gesture.refresh_rate_hz
            ));
        } else {
            errors.extend(
                self.gesture_config()
                    .validate()
                    .into_iter()
                    .map(|e| format!("gesture: {e}")),
            );
        }

        for (name, value) in [
            ("timeouts.unpair_after_ms", self.timeouts.unpair_after_ms),
            ("timeouts.ungroup_after_ms", self.timeouts.ungroup_after_ms),
            ("timeouts.reset_after_ms", self.timeouts.reset_after_ms),
            ("timeouts.touch_silence_ms", self.timeouts.touch_silence_ms),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }

        let network = &self.network;
        if network.bind.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "network.bind must be an IP address, got {:?}",
                network.bind
            ));
        }
        if network.broadcast.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "network.broadcast must be an IP address, got {:?}",
                network.broadcast
            ));
        }
        if network.port == 0 {
            errors.push("network.port must be > 0".into());
        }
        if network.sensor_port == 0 {
            errors.push("network.sensor_port must be > 0".into());
        }
        if network.port == network.sensor_port {
            errors.push(format!(
                "network.port and network.sensor_port must differ, both are {}",
                network.port
            ));
        }
        let window_count = layout.screens.saturating_mul(layout.windows_per_screen);
        for (window, address) in &network.peers {
            match window.parse::<u32>() {
                Ok(id) if id < window_count => {}
                Ok(id) => errors.push(format!(
                    "network.peers: window {id} is outside the layout of {window_count} windows"
                )),
                Err(_) => errors.push(format!(
                    "network.peers: key {window:?} is not a window id"
                )),
            }
            if address.parse::<SocketAddr>().is_err() {
                errors.push(format!(
                    "network.peers.{window} must be a socket address, got {address:?}"
                ));
            }
        }

        errors
    }

    /// Screen layout derived from the `layout` section.
    #[must_use]
    pub fn screen_layout(&self) -> ScreenLayout {
        ScreenLayout::new(self.layout.screens, self.layout.windows_per_screen)
    }

    /// Sensor-to-display rescaling for one screen.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(
            (self.layout.sensor_width, self.layout.sensor_height),
            (self.layout.screen_width, self.layout.screen_height),
        )
    }

    /// Convert to the recognizer configuration.
    #[must_use]
    pub fn gesture_config(&self) -> GestureConfig {
        let g = &self.gesture;
        GestureConfig {
            refresh_interval: Duration::try_from_secs_f64(1.0 / g.refresh_rate_hz)
                .unwrap_or_default(),
            pause_window: Duration::from_millis(g.pause_window_ms),
            tap_radius: g.tap_radius,
            pan_threshold: g.pan_threshold,
            pinch_min_spread: g.pinch_min_spread,
            pinch_behavior_threshold: g.pinch_behavior_threshold,
            pinch_min_duration: Duration::from_millis(g.pinch_min_duration_ms),
            pinch_max_momentum_scale: g.pinch_max_momentum_scale,
            pan_momentum: g.pan_momentum,
            pinch_pan_momentum: g.pinch_pan_momentum,
            pinch_pan_momentum_min: g.pinch_pan_momentum_min,
            pinch_scale_momentum: g.pinch_scale_momentum,
        }
    }

    /// Unicast addresses by window. Malformed entries are skipped; see
    /// [`validate`](Self::validate).
    #[must_use]
    pub fn peer_addresses(&self) -> BTreeMap<WindowId, SocketAddr> {
        self.network
            .peers
            .iter()
            .filter_map(|(window, address)| {
                Some((WindowId(window.parse().ok()?), address.parse().ok()?))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Physical layout of the installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Number of physical screens (default: 1).
    pub screens: u32,
    /// Window slots on every screen, left to right (default: 2).
    pub windows_per_screen: u32,
    /// Display width of one screen in points (default: 3840).
    pub screen_width: f64,
    /// Display height of one screen in points (default: 2160).
    pub screen_height: f64,
    /// Virtual sensor resolution of incoming samples (default: 4095).
    pub sensor_width: f64,
    /// Virtual sensor resolution of incoming samples (default: 4095).
    pub sensor_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            screens: 1,
            windows_per_screen: 2,
            screen_width: 3840.0,
            screen_height: 2160.0,
            sensor_width: 4095.0,
            sensor_height: 4095.0,
        }
    }
}

/// Which continuous recognizer a window's surface runs next to its tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceGesture {
    /// One- and two-finger pinch with a pan component.
    #[default]
    Pinch,
    /// Pan only.
    Pan,
}

/// Gesture tuning as written in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSection {
    /// Recognizer attached to each window surface (default: pinch).
    pub surface: SurfaceGesture,
    /// Emission and momentum tick rate (default: 60).
    pub refresh_rate_hz: f64,
    /// Release within this long after the last emission keeps momentum (default: 100).
    pub pause_window_ms: u64,
    /// Maximum travel of a tap (default: 20).
    pub tap_radius: f64,
    /// Travel before a pan or pinch is recognized (default: 20).
    pub pan_threshold: f64,
    /// Spread at or below which the pinch scale stays put (default: 60).
    pub pinch_min_spread: f64,
    /// Spread change that flips pinch direction (default: 20).
    pub pinch_behavior_threshold: f64,
    /// Shortest two-finger contact that carries scale momentum (default: 100).
    pub pinch_min_duration_ms: u64,
    /// Clamp of pinch momentum scale around 1 (default: 0.2).
    pub pinch_max_momentum_scale: f64,
    pub pan_momentum: FrictionParams,
    pub pinch_pan_momentum: FrictionParams,
    /// Pinch pan component needs at least this magnitude for momentum (default: 5).
    pub pinch_pan_momentum_min: f64,
    pub pinch_scale_momentum: FrictionParams,
}

impl Default for GestureSection {
    fn default() -> Self {
        let defaults = GestureConfig::default();
        Self {
            surface: SurfaceGesture::default(),
            refresh_rate_hz: 60.0,
            pause_window_ms: 100,
            tap_radius: defaults.tap_radius,
            pan_threshold: defaults.pan_threshold,
            pinch_min_spread: defaults.pinch_min_spread,
            pinch_behavior_threshold: defaults.pinch_behavior_threshold,
            pinch_min_duration_ms: 100,
            pinch_max_momentum_scale: defaults.pinch_max_momentum_scale,
            pan_momentum: defaults.pan_momentum,
            pinch_pan_momentum: defaults.pinch_pan_momentum,
            pinch_pan_momentum_min: defaults.pinch_pan_momentum_min,
            pinch_scale_momentum: defaults.pinch_scale_momentum,
        }
    }
}

/// Durations of the inactivity chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle time after a local gesture before its window releases its pairs (default: 10 s).
    pub unpair_after_ms: u64,
    /// Idle time after the unpair before the window dissolves its group (default: 30 s).
    pub ungroup_after_ms: u64,
    /// Installation-wide idle time before every window resets (default: 180 s).
    pub reset_after_ms: u64,
    /// A touch with no sample for this long is released as if lifted (default: 3 s).
    pub touch_silence_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            unpair_after_ms: 10_000,
            ungroup_after_ms: 30_000,
            reset_after_ms: 180_000,
            touch_silence_ms: 3_000,
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn unpair_after(&self) -> Duration {
        Duration::from_millis(self.unpair_after_ms)
    }

    #[must_use]
    pub fn ungroup_after(&self) -> Duration {
        Duration::from_millis(self.ungroup_after_ms)
    }

    #[must_use]
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after_ms)
    }

    #[must_use]
    pub fn touch_silence(&self) -> Duration {
        Duration::from_millis(self.touch_silence_ms)
    }
}

/// Sockets and addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address for both sockets (default: 0.0.0.0).
    pub bind: String,
    /// Port of the coordination socket, shared by every node (default: 47100).
    pub port: u16,
    /// Broadcast address for coordination messages (default: 255.255.255.255).
    pub broadcast: String,
    /// Port on which the screen's sensor stream arrives (default: 47000).
    pub sensor_port: u16,
    /// Unicast address per window id for forwarded touches. Windows missing
    /// here are reached by broadcast.
    pub peers: BTreeMap<String, String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 47100,
            broadcast: "255.255.255.255".into(),
            sensor_port: 47000,
            peers: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading an installation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[source] toml::de::Error),
    #[error("TOML render error: {0}")]
    TomlSerialize(#[source] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[source] serde_json::Error),
    #[error("unsupported config extension {0:?}, expected toml or json")]
    Extension(String),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
