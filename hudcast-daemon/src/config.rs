//! Configuration for the mirroring daemon.

use std::path::Path;

use serde::{Deserialize, Serialize};

use hudcast_core::{CaptureConfiguration, PixelFormat};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Virtual display settings.
    pub capture: CaptureSettings,
    /// HUD peripheral link.
    pub peripheral: PeripheralConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Virtual display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout requested from the provider.
    pub format: PixelFormat,
    /// Frames per second produced by the display.
    pub frame_rate: u32,
    pub density_dpi: u32,
    /// Name shown for the virtual display.
    pub display_name: String,
}

/// Peripheral link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    /// `host:port` of the HUD bridge.
    pub address: String,
    /// Delay before reconnecting after a failed or lost link.
    pub reconnect_ms: u64,
    /// Images allowed to wait for the link before new ones are dropped.
    pub queue_depth: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 400,
            format: PixelFormat::Rgbx8888,
            frame_rate: 5,
            density_dpi: 160,
            display_name: "HUD Mirror".into(),
        }
    }
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7340".into(),
            reconnect_ms: 2000,
            queue_depth: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl DaemonConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Convert capture settings into a `CaptureConfiguration`.
    pub fn to_capture_config(&self) -> CaptureConfiguration {
        let c = &self.capture;
        CaptureConfiguration::new(c.width.max(1), c.height.max(1))
            .with_format(c.format)
            .with_frame_rate(c.frame_rate.max(1))
            .with_density(c.density_dpi.max(1))
            .with_display_name(c.display_name.clone())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&DaemonConfig::default()).unwrap();
        assert!(text.contains("frame_rate"));
        assert!(text.contains("format = \"rgbx8888\""));
        assert!(text.contains("reconnect_ms"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&DaemonConfig::default()).unwrap();
        let parsed: DaemonConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.capture.width, 640);
        assert_eq!(parsed.capture.height, 400);
        assert_eq!(parsed.peripheral.queue_depth, 2);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: DaemonConfig = toml::from_str("[capture]\nframe_rate = 10\n").unwrap();
        assert_eq!(parsed.capture.frame_rate, 10);
        assert_eq!(parsed.capture.width, 640);
        assert_eq!(parsed.peripheral.address, "127.0.0.1:7340");
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn to_capture_config_clamps() {
        let mut cfg = DaemonConfig::default();
        cfg.capture.frame_rate = 0;
        cfg.capture.width = 0;
        let capture = cfg.to_capture_config();
        assert_eq!(capture.frame_rate, 1);
        assert_eq!(capture.width, 1);
        assert_eq!(capture.max_images(), 1);
        assert!(capture.validate().is_ok());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("hudcast-missing-config.toml");
        let _ = std::fs::remove_file(&path);
        let cfg = DaemonConfig::load(&path);
        assert_eq!(cfg.capture.display_name, "HUD Mirror");
    }

    #[test]
    fn written_default_loads_back() {
        let path = std::env::temp_dir().join(format!("hudcast-{}.toml", std::process::id()));
        DaemonConfig::write_default(&path).unwrap();
        let cfg = DaemonConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(cfg.peripheral.reconnect_ms, 2000);
    }
}
