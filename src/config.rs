// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section has defaults, so a missing file or a partial file still yields
// a usable configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use winit::keyboard::KeyCode;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
    pub controls: ControlsConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "whynot".to_string(),
            width: 800,
            height: 600,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
    /// Requested sampler anisotropy, clamped to the GPU limit
    pub max_anisotropy: f32,
    /// Quad rotation around Z, in degrees per second
    pub rotation_speed: f32,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_frames_in_flight: 2,
            max_anisotropy: 16.0,
            rotation_speed: 90.0,
        }
    }
}

/// Precompiled SPIR-V shader locations
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
    pub hot_reload: bool,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/quad.vert.spv"),
            fragment: PathBuf::from("shaders/quad.frag.spv"),
            hot_reload: true,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "whynot.log".to_string(),
            show_fps: true,
        }
    }
}

/// Control key bindings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub fullscreen_key: String,
    pub reload_shaders_key: String,
    pub quit_key: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            fullscreen_key: "F11".to_string(),
            reload_shaders_key: "F5".to_string(),
            quit_key: "Escape".to_string(),
        }
    }
}

/// Messages produced while loading. The logger is configured from the loaded
/// file, so they are replayed once it is installed.
pub type LoadNotes = Vec<(log::Level, String)>;

impl Config {
    /// Load `config.toml`, falling back to defaults if it is missing or invalid
    pub fn load() -> (Self, LoadNotes) {
        Self::load_or_default("config.toml")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, LoadNotes) {
        let path = path.as_ref();
        let mut notes = LoadNotes::new();
        let config = Self::load_from_path(path, &mut notes).unwrap_or_else(|e| {
            notes.push((
                log::Level::Warn,
                format!("Failed to load {}: {:#}. Using defaults.", path.display(), e),
            ));
            Config::default()
        });
        (config, notes)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P, notes: &mut LoadNotes) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            notes.push((
                log::Level::Info,
                format!("Config file not found at {:?}, using defaults", path),
            ));
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml_str(&content, notes)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        notes.push((log::Level::Info, format!("Loaded configuration from {:?}", path)));
        notes.push((log::Level::Debug, format!("Config: {:?}", config)));

        Ok(config)
    }

    pub fn from_toml_str(content: &str, notes: &mut LoadNotes) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.sanitize(notes);
        Ok(config)
    }

    fn sanitize(&mut self, notes: &mut LoadNotes) {
        if self.graphics.max_frames_in_flight == 0 {
            notes.push((
                log::Level::Warn,
                "max_frames_in_flight must be at least 1, using 1".to_string(),
            ));
            self.graphics.max_frames_in_flight = 1;
        }
        if self.graphics.max_anisotropy < 1.0 {
            notes.push((
                log::Level::Warn,
                format!(
                    "max_anisotropy {} is below 1, using 1",
                    self.graphics.max_anisotropy
                ),
            ));
            self.graphics.max_anisotropy = 1.0;
        }
    }

    /// Get present mode as Vulkan enum
    pub fn present_mode(&self) -> ash::vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => ash::vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => ash::vk::PresentModeKHR::MAILBOX,
            "fifo" => ash::vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => ash::vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                ash::vk::PresentModeKHR::FIFO
            }
        }
    }
}

/// Map a key name from the config file to a winit key code
pub fn parse_key(name: &str) -> Option<KeyCode> {
    let key = match name.to_ascii_uppercase().as_str() {
        "ESCAPE" | "ESC" => KeyCode::Escape,
        "SPACE" => KeyCode::Space,
        "ENTER" | "RETURN" => KeyCode::Enter,
        "TAB" => KeyCode::Tab,
        "F1" => KeyCode::F1,
        "F2" => KeyCode::F2,
        "F3" => KeyCode::F3,
        "F4" => KeyCode::F4,
        "F5" => KeyCode::F5,
        "F6" => KeyCode::F6,
        "F7" => KeyCode::F7,
        "F8" => KeyCode::F8,
        "F9" => KeyCode::F9,
        "F10" => KeyCode::F10,
        "F11" => KeyCode::F11,
        "F12" => KeyCode::F12,
        "Q" => KeyCode::KeyQ,
        "R" => KeyCode::KeyR,
        "F" => KeyCode::KeyF,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Config> {
        Config::from_toml_str(content, &mut LoadNotes::new())
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.max_frames_in_flight, 2);
        assert_eq!(config.present_mode(), ash::vk::PresentModeKHR::FIFO);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/quad.vert.spv"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse(
            r#"
            [window]
            width = 1920

            [graphics]
            present_mode = "Mailbox"
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "whynot");
        assert_eq!(config.graphics.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(config.present_mode(), ash::vk::PresentModeKHR::MAILBOX);
        assert!(config.debug.validation_layers);
    }

    #[test]
    fn zero_frames_in_flight_is_clamped() {
        let config = parse(
            r#"
            [graphics]
            max_frames_in_flight = 0
            max_anisotropy = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.graphics.max_frames_in_flight, 1);
        assert_eq!(config.graphics.max_anisotropy, 1.0);
    }

    #[test]
    fn clamping_is_reported() {
        let mut notes = LoadNotes::new();
        Config::from_toml_str("[graphics]\nmax_frames_in_flight = 0", &mut notes).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, log::Level::Warn);
        assert!(notes[0].1.contains("max_frames_in_flight"));
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config = parse("[graphics]\npresent_mode = \"vsync-please\"").unwrap();
        assert_eq!(config.present_mode(), ash::vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(parse("[window\nwidth = ").is_err());
        assert!(parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (config, notes) = Config::load_or_default("definitely/not/here.toml");
        assert_eq!(config.controls.quit_key, "Escape");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, log::Level::Info);
    }

    #[test]
    fn invalid_file_falls_back_with_warning() {
        let path = std::env::temp_dir().join(format!("whynot-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[window]\nwidth = \"wide\"\n").unwrap();

        let (config, notes) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.width, 800);
        assert!(notes
            .iter()
            .any(|(level, msg)| *level == log::Level::Warn && msg.contains("Using defaults")));
    }

    #[test]
    fn key_names_are_case_insensitive() {
        assert_eq!(parse_key("escape"), Some(KeyCode::Escape));
        assert_eq!(parse_key("f11"), Some(KeyCode::F11));
        assert_eq!(parse_key("F5"), Some(KeyCode::F5));
        assert_eq!(parse_key("Hyper"), None);
    }
}
