//! Configuration file management
//!
//! Loads TOML configuration files and provides the session settings.
//! Default config path: ~/.config/vtcore/config.toml
//!
//! Every value here is fixed for the lifetime of a session: `Term::new`
//! takes the `Config` by value and no component mutates it afterwards.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::utils::parse_hex_color;

/// Configuration parse failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Appearance settings (consumed by the renderer, not the grid)
    pub appearance: AppearanceConfig,
    /// Color scheme settings (ANSI 16 colors, normal and light variants)
    pub colors: ColorsConfig,
    /// Selection settings
    pub selection: SelectionConfig,
    /// Terminal settings
    pub terminal: TerminalConfig,
    /// Redraw timing settings
    pub timing: TimingConfig,
}

/// Appearance settings
///
/// These only affect external rendering; none of them change grid
/// semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Font specification passed through to the renderer
    pub font: String,
    /// Window border width in pixels
    pub border_px: u32,
    /// Initial cursor shape ("block", "underline", "bar")
    pub cursor_shape: String,
    /// Thickness of underline and bar cursors (pixels)
    pub cursor_thickness: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            font: "JetBrains Mono:pixelsize=14:antialias=true:autohint=true".to_string(),
            border_px: 2,
            cursor_shape: "block".to_string(),
            cursor_thickness: 2,
        }
    }
}

/// Palette settings: one set of 16 ANSI colors as RRGGBB hex strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    /// Color 0: Black
    pub black: String,
    /// Color 1: Red
    pub red: String,
    /// Color 2: Green
    pub green: String,
    /// Color 3: Yellow
    pub yellow: String,
    /// Color 4: Blue
    pub blue: String,
    /// Color 5: Magenta
    pub magenta: String,
    /// Color 6: Cyan
    pub cyan: String,
    /// Color 7: White
    pub white: String,
    /// Color 8: Bright Black (Gray)
    pub bright_black: String,
    /// Color 9: Bright Red
    pub bright_red: String,
    /// Color 10: Bright Green
    pub bright_green: String,
    /// Color 11: Bright Yellow
    pub bright_yellow: String,
    /// Color 12: Bright Blue
    pub bright_blue: String,
    /// Color 13: Bright Magenta
    pub bright_magenta: String,
    /// Color 14: Bright Cyan
    pub bright_cyan: String,
    /// Color 15: Bright White
    pub bright_white: String,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            black: "000000".to_string(),
            red: "ff0000".to_string(),
            green: "33ff00".to_string(),
            yellow: "ff0099".to_string(),
            blue: "0066ff".to_string(),
            magenta: "cc00ff".to_string(),
            cyan: "00ffff".to_string(),
            white: "d0d0d0".to_string(),
            bright_black: "808080".to_string(),
            bright_red: "ff0000".to_string(),
            bright_green: "33ff00".to_string(),
            bright_yellow: "ff0099".to_string(),
            bright_blue: "0066ff".to_string(),
            bright_magenta: "cc00ff".to_string(),
            bright_cyan: "00ffff".to_string(),
            bright_white: "ffffff".to_string(),
        }
    }
}

impl PaletteConfig {
    /// Get the 16 ANSI colors as RGB triples
    ///
    /// Unparseable entries fall back to white so one bad line in a config
    /// file never takes the session down.
    pub fn to_rgb(&self) -> [(u8, u8, u8); 16] {
        let parse = |hex: &str| parse_hex_color(hex).unwrap_or((255, 255, 255));
        [
            parse(&self.black),
            parse(&self.red),
            parse(&self.green),
            parse(&self.yellow),
            parse(&self.blue),
            parse(&self.magenta),
            parse(&self.cyan),
            parse(&self.white),
            parse(&self.bright_black),
            parse(&self.bright_red),
            parse(&self.bright_green),
            parse(&self.bright_yellow),
            parse(&self.bright_blue),
            parse(&self.bright_magenta),
            parse(&self.bright_cyan),
            parse(&self.bright_white),
        ]
    }
}

/// Color scheme settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Normal palette
    pub normal: PaletteConfig,
    /// Alternate (light) palette variant
    pub light: PaletteConfig,
    /// Default foreground (palette index)
    pub default_foreground: u16,
    /// Default background (palette index)
    pub default_background: u16,
    /// Cursor color (palette index; >=256 selects a dedicated slot)
    pub default_cursor: u16,
    /// Reverse cursor color (palette index)
    pub default_reverse_cursor: u16,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            normal: PaletteConfig::default(),
            light: PaletteConfig::default(),
            default_foreground: 7,
            default_background: 0,
            default_cursor: 256,
            default_reverse_cursor: 257,
        }
    }
}

/// Selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Word delimiter characters for double-click word snapping
    pub word_delimiters: String,
    /// Double-click timeout in milliseconds
    pub double_click_timeout_ms: u64,
    /// Triple-click timeout in milliseconds
    pub triple_click_timeout_ms: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            word_delimiters: " ".to_string(),
            double_click_timeout_ms: 300,
            triple_click_timeout_ms: 600,
        }
    }
}

impl SelectionConfig {
    /// Double-click timeout as a Duration
    pub fn double_click_timeout(&self) -> Duration {
        Duration::from_millis(self.double_click_timeout_ms)
    }

    /// Triple-click timeout as a Duration
    pub fn triple_click_timeout(&self) -> Duration {
        Duration::from_millis(self.triple_click_timeout_ms)
    }

    /// Check whether a character belongs to the delimiter set
    #[inline]
    pub fn is_delimiter(&self, ch: char) -> bool {
        self.word_delimiters.contains(ch)
    }
}

/// Terminal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// TERM value reported to the child process
    pub term_name: String,
    /// Identification sequence returned for DA and DECID queries
    pub identity: String,
    /// Spaces per tab stop
    pub tab_spaces: usize,
    /// Allow applications to switch to the alternate screen
    pub allow_alt_screen: bool,
    /// Allow non-interactive window operations such as setting the
    /// clipboard text (OSC 52)
    pub allow_window_ops: bool,
    /// Bell volume (-100..=100, 0 disables)
    pub bell_volume: i8,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            term_name: "vtcore-256color".to_string(),
            identity: "\x1b[?6c".to_string(),
            tab_spaces: 8,
            allow_alt_screen: true,
            allow_window_ops: false,
            bell_volume: 0,
        }
    }
}

/// Redraw timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Maximum content frames per second
    pub max_fps: u32,
    /// Maximum frames per second for action redraws (cursor blink,
    /// selection highlight)
    pub action_fps: u32,
    /// Blink period in milliseconds (0 disables blinking)
    pub blink_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            max_fps: 120,
            action_fps: 30,
            blink_timeout_ms: 800,
        }
    }
}

impl TimingConfig {
    /// Minimum interval between content redraws
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.max_fps.max(1)
    }

    /// Minimum interval between action redraws
    pub fn action_interval(&self) -> Duration {
        Duration::from_secs(1) / self.action_fps.max(1)
    }

    /// Blink period, None when blinking is disabled
    pub fn blink_timeout(&self) -> Option<Duration> {
        if self.blink_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.blink_timeout_ms))
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            appearance: AppearanceConfig::default(),
            colors: ColorsConfig::default(),
            selection: SelectionConfig::default(),
            terminal: TerminalConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/vtcore/config.toml";

    /// Get the path that would be used for loading config
    ///
    /// Returns None if using built-in defaults.
    pub fn config_path() -> Option<std::path::PathBuf> {
        // 1. VTCORE_CONFIG environment variable
        if let Ok(path) = std::env::var("VTCORE_CONFIG") {
            let p = std::path::Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/vtcore/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("vtcore").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config: /etc/vtcore/config.toml
        let system_config = std::path::Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. VTCORE_CONFIG environment variable
    /// 2. ~/.config/vtcore/config.toml (user config)
    /// 3. /etc/vtcore/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(path.to_string_lossy().as_ref()) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Parse settings from a TOML string
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builtin_values() {
        let config = Config::default();
        assert_eq!(config.terminal.identity, "\x1b[?6c");
        assert_eq!(config.terminal.tab_spaces, 8);
        assert_eq!(config.selection.double_click_timeout_ms, 300);
        assert_eq!(config.selection.triple_click_timeout_ms, 600);
        assert_eq!(config.timing.max_fps, 120);
        assert_eq!(config.timing.action_fps, 30);
        assert_eq!(config.timing.blink_timeout_ms, 800);
        assert_eq!(config.colors.default_foreground, 7);
        assert_eq!(config.colors.default_background, 0);
        assert!(config.terminal.allow_alt_screen);
        assert!(!config.terminal.allow_window_ops);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_sections() {
        let config = Config::from_toml_str(
            r#"
            [selection]
            double_click_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.selection.double_click_timeout_ms, 250);
        // Untouched sections keep their defaults
        assert_eq!(config.selection.triple_click_timeout_ms, 600);
        assert_eq!(config.timing.max_fps, 120);
    }

    #[test]
    fn blink_timeout_zero_disables_blinking() {
        let mut config = Config::default();
        config.timing.blink_timeout_ms = 0;
        assert!(config.timing.blink_timeout().is_none());
    }

    #[test]
    fn palette_parses_to_rgb() {
        let colors = PaletteConfig::default().to_rgb();
        assert_eq!(colors[0], (0x00, 0x00, 0x00));
        assert_eq!(colors[1], (0xff, 0x00, 0x00));
        assert_eq!(colors[15], (0xff, 0xff, 0xff));
    }
}
