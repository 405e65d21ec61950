//! Configuration loading
//!
//! Settings come from three layers, later ones winning:
//! 1. `~/.config/shot-answer/config.toml` (generated with defaults on first run)
//! 2. environment variables (`OPENAI_API_KEY`, `DEFAULT_PROVIDER`, ...)
//! 3. command-line flags (`--provider`, `--model`)
//!
//! [`Settings::resolve`] folds them into an immutable [`AppConfig`] that the
//! rest of the application borrows.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use x11rb::protocol::render::Color;

use crate::color::{HexColor, Opacity};
use crate::constants::{self, backend, overlay, screenshots};
use crate::provider::{BackendConfig, BillingRules, Provider};

/// Fatal configuration problems. The message is what the user sees before exit.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "API key for {provider} not found.\n\
         Please set the appropriate environment variable (or `api_key` under [{provider}] in {}):\n  {}=your_key_here",
        .settings_path.display(),
        .provider.api_key_var()
    )]
    MissingApiKey {
        provider: Provider,
        settings_path: PathBuf,
    },

    #[error("Unknown provider: {0} (expected one of: openai, gemini, anthropic)")]
    UnknownProvider(String),

    #[error(
        "Screenshot directory does not exist: {}\n\
         Set SCREENSHOT_DIR or `screenshot_dir` in {}.",
        .dir.display(),
        .settings_path.display()
    )]
    MissingScreenshotDir { dir: PathBuf, settings_path: PathBuf },

    #[error("Failed to parse config file {}: {source}\nThe file has been preserved, please fix it.", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings file contents (every field optional in TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend used when `--provider` is not given
    pub default_provider: String,

    /// Directory the screen-capture tool writes to
    /// (default: `<Pictures>/Screenshots`)
    pub screenshot_dir: Option<PathBuf>,

    /// Display only, nothing listens for it
    pub hotkey: String,

    /// Answer the newest existing screenshot once before watching
    pub process_latest_on_start: bool,

    /// Wait after a creation event before reading the file
    pub settle_delay_ms: u64,

    pub openai: BackendSettings,
    pub gemini: BackendSettings,
    pub anthropic: BackendSettings,
    pub overlay: OverlaySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: Provider::OpenAi.id().to_string(),
            screenshot_dir: None,
            hotkey: constants::config::DEFAULT_HOTKEY.to_string(),
            process_latest_on_start: false,
            settle_delay_ms: screenshots::DEFAULT_SETTLE_DELAY_MS,
            openai: BackendSettings::default(),
            gemini: BackendSettings::default(),
            anthropic: BackendSettings::default(),
            overlay: OverlaySettings::default(),
        }
    }
}

/// Per-backend section (`[openai]`, `[gemini]`, `[anthropic]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub api_key: String,
    /// Falls back to the backend's default model
    pub model: Option<String>,
    /// Falls back to the vendor's public endpoint
    pub base_url: Option<String>,
    pub max_tokens: u32,
    /// Added to the built-in billing keyword list
    pub extra_billing_keywords: Vec<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: None,
            base_url: None,
            max_tokens: backend::DEFAULT_MAX_TOKENS,
            extra_billing_keywords: Vec::new(),
        }
    }
}

/// `[overlay]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub normal_duration_secs: u64,
    pub warning_duration_secs: u64,
    pub wrap_width: u16,
    pub offset_x: i16,
    pub offset_y: i16,
    pub opacity_percent: u8,
    pub text_size: f32,
    /// Fontconfig name, e.g. "DejaVu Sans" or "Roboto Mono Bold" (empty = system default)
    pub font: String,
    pub text_color: String,
    pub warning_color: String,
    pub background_color: String,
    pub border_color: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            normal_duration_secs: overlay::NORMAL_DURATION_SECS,
            warning_duration_secs: overlay::WARNING_DURATION_SECS,
            wrap_width: overlay::WRAP_WIDTH,
            offset_x: overlay::SCREEN_OFFSET_X,
            offset_y: overlay::SCREEN_OFFSET_Y,
            opacity_percent: overlay::OPACITY_PERCENT,
            text_size: overlay::TEXT_SIZE,
            font: String::new(),
            text_color: overlay::TEXT_COLOR.to_string(),
            warning_color: overlay::WARNING_COLOR.to_string(),
            background_color: overlay::BACKGROUND_COLOR.to_string(),
            border_color: overlay::BORDER_COLOR.to_string(),
        }
    }
}

/// Immutable application configuration, built once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub screenshot_dir: PathBuf,
    pub hotkey: String,
    pub process_latest_on_start: bool,
    pub settle_delay: Duration,
    pub overlay: OverlayConfig,
}

/// Resolved overlay appearance and timing
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub normal_duration: Duration,
    pub warning_duration: Duration,
    pub wrap_width: u16,
    pub padding_x: u16,
    pub padding_y: u16,
    pub border_size: u16,
    pub offset_x: i16,
    pub offset_y: i16,
    pub opacity: Opacity,
    pub text_size: f32,
    pub font: String,
    /// Raw ARGB for the fontdue rasterizer
    pub text_color: u32,
    pub warning_color: u32,
    pub background_color: Color,
    pub border_color: Color,
}

impl OverlayConfig {
    /// Outer window width: wrap width plus padding and border on both sides
    pub fn window_width(&self) -> u16 {
        self.wrap_width + 2 * (self.padding_x + self.border_size)
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::FILENAME);
        path
    }

    /// Load the settings file (writing a template if absent) and apply
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            let settings = Self::default();
            match settings.save_to(&path) {
                Ok(()) => info!(path = %path.display(), "Generated config file for user to edit (env vars still override)"),
                Err(e) => warn!(path = %path.display(), error = ?e, "Failed to write config template"),
            }
            settings
        };

        settings.apply_env_overrides(|var| std::env::var(var).ok());
        settings.validate_and_clamp();
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, contents)
            .context(format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    fn backend_mut(&mut self, provider: Provider) -> &mut BackendSettings {
        match provider {
            Provider::OpenAi => &mut self.openai,
            Provider::Gemini => &mut self.gemini,
            Provider::Anthropic => &mut self.anthropic,
        }
    }

    pub fn backend(&self, provider: Provider) -> &BackendSettings {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Gemini => &self.gemini,
            Provider::Anthropic => &self.anthropic,
        }
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        for provider in Provider::ALL {
            if let Some(key) = non_empty(provider.api_key_var()) {
                self.backend_mut(provider).api_key = key;
            }
            if let Some(model) = non_empty(provider.model_var()) {
                self.backend_mut(provider).model = Some(model);
            }
        }
        if let Some(provider) = non_empty("DEFAULT_PROVIDER") {
            self.default_provider = provider.to_lowercase();
        }
        if let Some(hotkey) = non_empty("HOTKEY") {
            self.hotkey = hotkey;
        }
        if let Some(dir) = non_empty("SCREENSHOT_DIR") {
            self.screenshot_dir = Some(PathBuf::from(dir));
        }
    }

    /// Clamp values to ranges the overlay can actually render
    fn validate_and_clamp(&mut self) {
        let o = &mut self.overlay;

        if o.normal_duration_secs == 0 {
            warn!(using = overlay::NORMAL_DURATION_SECS, "normal_duration_secs is 0, using default");
            o.normal_duration_secs = overlay::NORMAL_DURATION_SECS;
        }
        if o.warning_duration_secs == 0 {
            warn!(using = overlay::WARNING_DURATION_SECS, "warning_duration_secs is 0, using default");
            o.warning_duration_secs = overlay::WARNING_DURATION_SECS;
        }
        if o.opacity_percent > 100 {
            warn!(opacity_percent = o.opacity_percent, "opacity_percent exceeds 100, clamping to 100");
            o.opacity_percent = 100;
        }
        if !(6.0..=96.0).contains(&o.text_size) {
            warn!(text_size = o.text_size, "text_size out of range (6-96), clamping");
            o.text_size = o.text_size.clamp(6.0, 96.0);
        }
        if !(100..=2000).contains(&o.wrap_width) {
            warn!(wrap_width = o.wrap_width, "wrap_width out of range (100-2000), clamping");
            o.wrap_width = o.wrap_width.clamp(100, 2000);
        }

        for provider in Provider::ALL {
            let settings = self.backend_mut(provider);
            if settings.max_tokens == 0 {
                warn!(provider = %provider, using = backend::DEFAULT_MAX_TOKENS, "max_tokens is 0, using default");
                settings.max_tokens = backend::DEFAULT_MAX_TOKENS;
            }
        }
    }

    fn default_screenshot_dir() -> PathBuf {
        dirs::picture_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(screenshots::DEFAULT_SUBDIR)
    }

    /// Fold settings and command-line overrides into the final configuration
    pub fn resolve(
        &self,
        cli_provider: Option<Provider>,
        cli_model: Option<&str>,
    ) -> Result<AppConfig, ConfigError> {
        let provider = match cli_provider {
            Some(provider) => provider,
            None => self
                .default_provider
                .parse::<Provider>()
                .map_err(ConfigError::UnknownProvider)?,
        };

        let settings = self.backend(provider);
        let api_key = settings.api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey {
                provider,
                settings_path: Self::config_path(),
            });
        }

        let model = cli_model
            .map(str::to_string)
            .or_else(|| settings.model.clone())
            .unwrap_or_else(|| provider.default_model().to_string());

        let screenshot_dir = self
            .screenshot_dir
            .clone()
            .unwrap_or_else(Self::default_screenshot_dir);
        if !screenshot_dir.is_dir() {
            return Err(ConfigError::MissingScreenshotDir {
                dir: screenshot_dir,
                settings_path: Self::config_path(),
            });
        }

        Ok(AppConfig {
            backend: BackendConfig {
                provider,
                api_key: api_key.to_string(),
                model,
                base_url: settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| provider.default_base_url().to_string()),
                max_tokens: settings.max_tokens,
                billing: BillingRules::for_provider(provider, &settings.extra_billing_keywords),
            },
            screenshot_dir,
            hotkey: self.hotkey.clone(),
            process_latest_on_start: self.process_latest_on_start,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            overlay: self.build_overlay_config(),
        })
    }

    /// Parse colors (falling back to the built-in palette) and durations
    pub fn build_overlay_config(&self) -> OverlayConfig {
        let o = &self.overlay;
        let color = |name: &str, hex: &str, fallback: &str| {
            HexColor::parse(hex).unwrap_or_else(|| {
                error!(setting = name, value = %hex, "Invalid hex color, using default");
                HexColor::parse(fallback).unwrap_or(HexColor::from_argb32(0xFFFF_FFFF))
            })
        };

        OverlayConfig {
            normal_duration: Duration::from_secs(o.normal_duration_secs),
            warning_duration: Duration::from_secs(o.warning_duration_secs),
            wrap_width: o.wrap_width,
            padding_x: overlay::PADDING_X,
            padding_y: overlay::PADDING_Y,
            border_size: overlay::BORDER_SIZE,
            offset_x: o.offset_x,
            offset_y: o.offset_y,
            opacity: Opacity::from_percent(o.opacity_percent),
            text_size: o.text_size,
            font: o.font.clone(),
            text_color: color("text_color", &o.text_color, overlay::TEXT_COLOR).argb32(),
            warning_color: color("warning_color", &o.warning_color, overlay::WARNING_COLOR).argb32(),
            background_color: color("background_color", &o.background_color, overlay::BACKGROUND_COLOR)
                .to_x11_color(),
            border_color: color("border_color", &o.border_color, overlay::BORDER_COLOR).to_x11_color(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn settings_with_dir(dir: &TempDir) -> Settings {
        Settings {
            screenshot_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.default_provider, "openai");
        assert_eq!(settings.hotkey, "ctrl+shift+q");
        assert_eq!(settings.settle_delay_ms, 500);
        assert_eq!(settings.overlay.normal_duration_secs, 5);
        assert_eq!(settings.overlay.warning_duration_secs, 10);
        assert_eq!(settings.gemini.max_tokens, 300);
    }

    #[test]
    fn test_partial_file() {
        let settings = Settings::from_toml_str(
            r##"
            default_provider = "anthropic"
            screenshot_dir = "/tmp/shots"

            [anthropic]
            api_key = "sk-ant-test"
            model = "claude-3-5-haiku-20241022"
            extra_billing_keywords = ["overloaded"]

            [overlay]
            warning_color = "#ff0000"
            "##,
        )
        .unwrap();
        assert_eq!(settings.default_provider, "anthropic");
        assert_eq!(settings.screenshot_dir, Some(PathBuf::from("/tmp/shots")));
        assert_eq!(settings.anthropic.api_key, "sk-ant-test");
        assert_eq!(settings.anthropic.max_tokens, 300);
        assert_eq!(settings.overlay.warning_color, "#ff0000");
        assert_eq!(settings.overlay.text_color, "#e0e0e0");
    }

    #[test]
    fn test_malformed_file_is_error() {
        assert!(Settings::from_toml_str("default_provider = ").is_err());
    }

    #[test]
    fn test_template_round_trips() {
        let text = toml::to_string_pretty(&Settings::default()).unwrap();
        let parsed = Settings::from_toml_str(&text).unwrap();
        assert_eq!(parsed.default_provider, "openai");
        assert_eq!(parsed.overlay.wrap_width, 400);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env_overrides(env(&[
            ("GEMINI_API_KEY", " g-key "),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
            ("DEFAULT_PROVIDER", "Gemini"),
            ("SCREENSHOT_DIR", "/data/shots"),
            ("OPENAI_API_KEY", ""),
        ]));
        assert_eq!(settings.gemini.api_key, "g-key");
        assert_eq!(settings.gemini.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(settings.default_provider, "gemini");
        assert_eq!(settings.screenshot_dir, Some(PathBuf::from("/data/shots")));
        // Empty env vars don't clobber the file
        assert_eq!(settings.openai.api_key, "");
    }

    #[test]
    fn test_resolve_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_with_dir(&dir);
        settings.openai.api_key = "sk-test".to_string();

        let config = settings.resolve(None, None).unwrap();
        assert_eq!(config.backend.provider, Provider::OpenAi);
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.backend.base_url, "https://api.openai.com");
        assert_eq!(config.backend.billing.status_codes, vec![402, 429]);
        assert_eq!(config.screenshot_dir, dir.path());
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.overlay.normal_duration, Duration::from_secs(5));
        assert_eq!(config.overlay.warning_duration, Duration::from_secs(10));
    }

    #[test]
    fn test_cli_overrides_win() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_with_dir(&dir);
        settings.anthropic.api_key = "sk-ant".to_string();
        settings.anthropic.model = Some("claude-3-opus-20240229".to_string());

        let config = settings
            .resolve(Some(Provider::Anthropic), Some("claude-3-5-haiku-20241022"))
            .unwrap();
        assert_eq!(config.backend.provider, Provider::Anthropic);
        assert_eq!(config.backend.model, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let dir = TempDir::new().unwrap();
        let settings = settings_with_dir(&dir);
        let err = settings.resolve(Some(Provider::Gemini), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey { provider: Provider::Gemini, .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY=your_key_here"));
    }

    #[test]
    fn test_unknown_provider_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_with_dir(&dir);
        settings.default_provider = "mistral".to_string();
        assert!(matches!(
            settings.resolve(None, None),
            Err(ConfigError::UnknownProvider(name)) if name == "mistral"
        ));
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings {
            screenshot_dir: Some(dir.path().join("missing")),
            ..Settings::default()
        };
        settings.openai.api_key = "sk-test".to_string();
        assert!(matches!(
            settings.resolve(None, None),
            Err(ConfigError::MissingScreenshotDir { .. })
        ));
    }

    #[test]
    fn test_validate_and_clamp() {
        let mut settings = Settings::default();
        settings.overlay.normal_duration_secs = 0;
        settings.overlay.opacity_percent = 250;
        settings.overlay.text_size = 500.0;
        settings.overlay.wrap_width = 10;
        settings.gemini.max_tokens = 0;
        settings.validate_and_clamp();

        assert_eq!(settings.overlay.normal_duration_secs, 5);
        assert_eq!(settings.overlay.opacity_percent, 100);
        assert_eq!(settings.overlay.text_size, 96.0);
        assert_eq!(settings.overlay.wrap_width, 100);
        assert_eq!(settings.gemini.max_tokens, 300);
    }

    #[test]
    fn test_invalid_colors_fall_back() {
        let mut settings = Settings::default();
        settings.overlay.text_color = "not-a-color".to_string();
        settings.overlay.border_color = "#00ff00".to_string();

        let config = settings.build_overlay_config();
        assert_eq!(config.text_color, 0xFFE0E0E0);
        assert_eq!(config.warning_color, 0xFFFF9800);
        assert_eq!(config.border_color.green, 65535);
        assert_eq!(config.border_color.red, 0);
        assert_eq!(config.window_width(), 400 + 2 * (20 + 2));
    }
}
