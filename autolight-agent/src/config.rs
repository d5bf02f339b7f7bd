//! Configuration for the autolight agent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use autolight_core::AutolightError;
use autolight_core::capture::{CaptureRegion, SourceKind};
use autolight_core::color::PipelineSettings;
use autolight_core::engine::{DEFAULT_MAX_CONSECUTIVE_FAILURES, EngineConfig, SMOOTHING_PERIOD};
use autolight_core::osc::OscTarget;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// What to capture and how often.
    pub capture: CaptureConfig,
    /// Color processing.
    pub color: ColorConfig,
    /// OSC destination and rate.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Backend: "duplication", "blit" or "shared_texture".
    pub source: SourceKind,
    /// Capture ticks per second.
    pub fps: u32,
    /// Consecutive invalid frames before capture stops.
    pub max_failures: u32,
    /// Screen rectangle to sample. Ignored for shared textures.
    pub region: CaptureRegion,
    /// Optional frame-relative sub-rectangle to average.
    pub crop: Option<CaptureRegion>,
}

/// Color processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub force_max_brightness: bool,
    /// Percent, 0..=100.
    pub white_mix: f32,
    /// Percent, -100..=100.
    pub saturation: f32,
    pub enable_smoothing: bool,
    /// Smoothing time constant in seconds.
    pub smoothing_rate: f32,
}

/// OSC output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub host: String,
    pub port: u16,
    pub namespace: String,
    pub red_param: String,
    pub green_param: String,
    pub blue_param: String,
    /// Sends per second, 1..=240.
    pub rate: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Duplication,
            fps: 5,
            max_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            region: CaptureRegion::from_xywh(0, 0, 1920, 1080),
            crop: None,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            force_max_brightness: true,
            white_mix: 0.0,
            saturation: 0.0,
            enable_smoothing: true,
            smoothing_rate: 0.5,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let osc = OscTarget::default();
        let [red_param, green_param, blue_param] = osc.params;
        Self {
            host: osc.host,
            port: osc.port,
            namespace: osc.namespace,
            red_param,
            green_param,
            blue_param,
            rate: 3,
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

impl AgentConfig {
    /// Load configuration from a TOML file. A missing file gives the
    /// defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, AutolightError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| AutolightError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Convert into an engine snapshot, clamping out-of-range values.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            source: self.capture.source,
            capture_fps: self.capture.fps.clamp(1, 240) as f32,
            output_rate_hz: self.output.rate.clamp(1, 240) as f32,
            pipeline: PipelineSettings {
                force_max_brightness: self.color.force_max_brightness,
                white_mix_percent: self.color.white_mix.clamp(0.0, 100.0),
                saturation_percent: self.color.saturation.clamp(-100.0, 100.0),
            },
            enable_smoothing: self.color.enable_smoothing,
            smoothing_rate: self.color.smoothing_rate.max(0.0),
            smoothing_period: SMOOTHING_PERIOD,
            osc: OscTarget {
                host: self.output.host.clone(),
                port: self.output.port,
                namespace: self.output.namespace.clone(),
                params: [
                    self.output.red_param.clone(),
                    self.output.green_param.clone(),
                    self.output.blue_param.clone(),
                ],
            },
            crop: self.capture.crop,
            max_consecutive_failures: self.capture.max_failures,
            ..EngineConfig::default()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&AgentConfig::default()).unwrap();
        assert!(text.contains("[capture]"));
        assert!(text.contains("source = \"duplication\""));
        assert!(text.contains("AL_Red"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&AgentConfig::default()).unwrap();
        let parsed: AgentConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.capture.fps, 5);
        assert_eq!(parsed.output.port, 9000);
        assert_eq!(parsed.output.rate, 3);
        assert!(parsed.color.force_max_brightness);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: AgentConfig = toml::from_str(
            r#"
            [capture]
            source = "shared_texture"

            [capture.crop]
            left = 10
            top = 10
            right = 50
            bottom = 40

            [output]
            port = 9001
            "#,
        )
        .unwrap();
        assert_eq!(parsed.capture.source, SourceKind::SharedTexture);
        assert_eq!(parsed.capture.crop, Some(CaptureRegion::new(10, 10, 50, 40)));
        assert_eq!(parsed.output.port, 9001);
        assert_eq!(parsed.output.host, "127.0.0.1");
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn to_engine_config_clamps() {
        let mut cfg = AgentConfig::default();
        cfg.capture.fps = 1000;
        cfg.output.rate = 0;
        cfg.color.white_mix = 150.0;
        cfg.color.saturation = -300.0;
        let engine = cfg.to_engine_config();
        assert_eq!(engine.capture_fps, 240.0);
        assert_eq!(engine.output_rate_hz, 1.0);
        assert_eq!(engine.pipeline.white_mix_percent, 100.0);
        assert_eq!(engine.pipeline.saturation_percent, -100.0);
    }

    #[test]
    fn to_engine_config_carries_osc_names() {
        let mut cfg = AgentConfig::default();
        cfg.output.namespace = "/lights".into();
        cfg.output.green_param = "G".into();
        let engine = cfg.to_engine_config();
        assert_eq!(engine.osc.addresses()[1], "/lights/G");
        assert_eq!(engine.max_consecutive_failures, 10);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = AgentConfig::load(Path::new("/nonexistent/autolight-agent.toml")).unwrap();
        assert_eq!(cfg.capture.fps, 5);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let path = std::env::temp_dir().join(format!(
            "autolight-agent-bad-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[capture]\nfps = \"fast\"\n").unwrap();
        let result = AgentConfig::load(&path);
        std::fs::remove_file(&path).ok();

        let err = result.unwrap_err();
        assert!(matches!(err, AutolightError::Config(_)));
        assert!(err.to_string().contains("autolight-agent-bad-"));
    }
}
