//! Settings management for Immersive Viewer
//!
//! Viewer settings are stored as XML in the user's config directory and
//! fall back to defaults when the file is missing or unreadable.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::telemetry::LogConfig;
use crate::video::{DecoderConfig, LateFramePolicy, ScalerQuality, DEFAULT_MAX_DECODE_RETRIES};

/// How frames that miss their presentation time are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LateFrameMode {
    /// Show every frame, late ones as soon as possible
    #[default]
    Present,
    /// Skip frames later than `dropThresholdMs`
    Drop,
}

impl LateFrameMode {
    /// Get display name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            LateFrameMode::Present => "Present late frames",
            LateFrameMode::Drop => "Drop late frames",
        }
    }
}

/// Viewer settings stored in `viewer.xml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "ImmersiveViewer")]
pub struct ViewerSettings {
    /// What to do with frames that are already late
    #[serde(rename = "lateFramePolicy", default)]
    pub late_frame_policy: LateFrameMode,

    /// Lateness beyond which frames are dropped (drop policy only)
    #[serde(rename = "dropThresholdMs", default = "default_drop_threshold_ms")]
    pub drop_threshold_ms: u64,

    /// Consecutive decode failures tolerated before playback aborts
    #[serde(rename = "maxDecodeRetries", default = "default_max_decode_retries")]
    pub max_decode_retries: u32,

    /// Scaling filter for the YUV conversion
    #[serde(rename = "scalerQuality", default)]
    pub scaler_quality: ScalerQuality,

    /// Whether VSYNC is enabled
    /// - true:  Use Fifo present mode, display controls timing
    /// - false: Use Immediate/Mailbox, the frame pacer controls timing
    #[serde(rename = "vsyncEnabled", default)]
    pub vsync_enabled: bool,

    /// Initial window size as a multiple of the video size (0.1-4.0)
    #[serde(rename = "windowScale", default = "default_window_scale")]
    pub window_scale: f32,

    /// Default log filter when no environment override is set
    #[serde(rename = "logLevel", default = "default_log_level")]
    pub log_level: String,

    /// Optional log file path
    #[serde(rename = "logFile", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    /// Emit JSON log lines
    #[serde(rename = "logJson", default)]
    pub log_json: bool,
}

fn default_drop_threshold_ms() -> u64 {
    100
}

fn default_max_decode_retries() -> u32 {
    DEFAULT_MAX_DECODE_RETRIES
}

fn default_window_scale() -> f32 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            late_frame_policy: LateFrameMode::default(),
            drop_threshold_ms: default_drop_threshold_ms(),
            max_decode_retries: default_max_decode_retries(),
            scaler_quality: ScalerQuality::default(),
            vsync_enabled: false,
            window_scale: default_window_scale(),
            log_level: default_log_level(),
            log_file: None,
            log_json: false,
        }
    }
}

impl ViewerSettings {
    /// Keep values within their valid ranges
    pub fn clamp(&mut self) {
        self.drop_threshold_ms = self.drop_threshold_ms.clamp(1, 10_000);
        self.max_decode_retries = self.max_decode_retries.clamp(1, 10_000);
        self.window_scale = if self.window_scale.is_finite() {
            self.window_scale.clamp(0.1, 4.0)
        } else {
            default_window_scale()
        };
        if self.log_level.trim().is_empty() {
            self.log_level = default_log_level();
        }
    }

    /// Late-frame policy for the playback pipeline
    pub fn late_frame_policy(&self) -> LateFramePolicy {
        match self.late_frame_policy {
            LateFrameMode::Present => LateFramePolicy::Present,
            LateFrameMode::Drop => LateFramePolicy::Drop {
                threshold_ms: self.drop_threshold_ms,
            },
        }
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            max_decode_retries: self.max_decode_retries,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            console_enabled: true,
            file_enabled: self.log_file.is_some(),
            file_path: self.log_file.as_ref().map(PathBuf::from),
            json_format: self.log_json,
            default_level: self.log_level.clone(),
        }
    }

    /// Window size for a video of the given size
    pub fn window_size(&self, video_width: u32, video_height: u32) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.window_scale).round() as u32).max(1);
        (scale(video_width), scale(video_height))
    }

    /// Path of `viewer.xml` in the config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("ImmersiveViewer");
            p.push("viewer.xml");
            p
        })
    }

    /// Load settings from the config directory, or defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                // Logging may not be up yet, so report on stderr too
                eprintln!("Ignoring {}: {}", path.display(), e);
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self = from_str(&contents)?;
        settings.clamp();
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let xml = to_string(self)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        fs::write(path, formatted)?;
        Ok(())
    }
}

/// Settings-related errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
}
