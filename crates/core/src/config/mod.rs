use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CollageError, Result};

/// Top-level configuration structure for the application.
///
/// Every field is live: hosts may swap in a new value between ticks through
/// [`crate::Session::update_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub canvas: CanvasConfig,
    pub trigger_source: TriggerSourceKind,
    pub edit_mode: EditMode,
    pub scaling_mode: ScalingMode,
    pub text: TextConfig,
    /// Audio peak sensitivity in `[0, 100]`.
    pub sensitivity: f32,
    /// Layer lifetime in `overlap` and `random` modes.
    pub erase_time_ms: f64,
    /// Seed for random image placement. `None` draws from entropy.
    pub random_seed: Option<u64>,
    pub audio: AudioConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            trigger_source: TriggerSourceKind::Midi,
            edit_mode: EditMode::Normal,
            scaling_mode: ScalingMode::Fill,
            text: TextConfig::default(),
            sensitivity: 50.0,
            erase_time_ms: 2000.0,
            random_seed: None,
            audio: AudioConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| CollageError::asset_load(path.display().to_string(), err))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(CollageError::InvalidInput("canvas dimensions must be non-zero"));
        }
        if !(self.text.font_size > 0.0 && self.text.font_size.is_finite()) {
            return Err(CollageError::InvalidInput("font size must be positive"));
        }
        if !(self.text.padding >= 0.0 && self.text.padding.is_finite()) {
            return Err(CollageError::InvalidInput("text padding must be finite and non-negative"));
        }
        if !(0.0..=100.0).contains(&self.sensitivity) {
            return Err(CollageError::InvalidInput("sensitivity must lie in [0, 100]"));
        }
        // NaN would never compare as expired.
        if !(self.erase_time_ms >= 0.0 && self.erase_time_ms.is_finite()) {
            return Err(CollageError::InvalidInput("erase time must be finite and non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl CanvasConfig {
    pub fn width_f32(&self) -> f32 {
        self.width as f32
    }

    pub fn height_f32(&self) -> f32 {
        self.height as f32
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1980,
        }
    }
}

/// Where trigger events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSourceKind {
    /// Note-on events of a MIDI file.
    Midi,
    /// Live amplitude peaks of the playing audio.
    Audio,
    /// Beats tapped along with the audio beforehand.
    Manual,
}

/// Stacking policy for layers produced by triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditMode {
    Normal,
    Overlap,
    Random,
}

impl EditMode {
    /// Whether layers in this mode expire after the erase time.
    pub fn expires_layers(self) -> bool {
        matches!(self, Self::Overlap | Self::Random)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingMode {
    /// Cover the canvas, cropping the overflow.
    Fill,
    /// Fit inside the canvas, letterboxing the remainder.
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextStyle {
    Word,
    Paragraph,
    Still,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
    JustifyCenter,
}

impl TextAlign {
    pub fn is_justify(self) -> bool {
        matches!(self, Self::Justify | Self::JustifyCenter)
    }

    /// Alignment used for lines that cannot be stretched.
    pub fn fallback(self) -> Self {
        match self {
            Self::Justify => Self::Left,
            Self::JustifyCenter => Self::Center,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub style: TextStyle,
    pub align: TextAlign,
    pub font_size: f32,
    pub font_family: String,
    pub color: String,
    pub outline: bool,
    pub padding: f32,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            style: TextStyle::Word,
            align: TextAlign::Justify,
            font_size: 80.0,
            font_family: "Inter".to_string(),
            color: "#ffffff".to_string(),
            outline: true,
            padding: 50.0,
        }
    }
}

/// Configuration specific to the audio analysis subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.canvas.width, 1080);
        assert_eq!(config.text.align, TextAlign::Justify);
    }

    #[test]
    fn parses_kebab_case_options() {
        let json = r#"{
            "trigger_source": "manual",
            "edit_mode": "random",
            "scaling_mode": "fit",
            "text": { "style": "paragraph", "align": "justify-center", "font_size": 40 }
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();
        assert_eq!(config.trigger_source, TriggerSourceKind::Manual);
        assert_eq!(config.edit_mode, EditMode::Random);
        assert_eq!(config.scaling_mode, ScalingMode::Fit);
        assert_eq!(config.text.style, TextStyle::Paragraph);
        assert_eq!(config.text.align, TextAlign::JustifyCenter);
        assert_eq!(config.text.font_size, 40.0);
        assert_eq!(config.text.font_family, "Inter");
    }

    #[test]
    fn rejects_out_of_range_sensitivity() {
        let err = AppConfig::from_json_str(r#"{ "sensitivity": 140 }"#).unwrap_err();
        assert!(matches!(err, CollageError::InvalidInput(_)));
    }

    #[test]
    fn rejects_nan_erase_time() {
        let mut config = AppConfig::default();
        config.erase_time_ms = f64::NAN;
        assert!(matches!(config.validate(), Err(CollageError::InvalidInput(_))));
        config.erase_time_ms = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_sensitivity_and_padding() {
        let mut config = AppConfig::default();
        config.sensitivity = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.text.padding = f32::NAN;
        assert!(config.validate().is_err());
        config.text.padding = f32::INFINITY;
        assert!(config.validate().is_err());
        config.text.padding = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_enum_values() {
        let err = AppConfig::from_json_str(r#"{ "edit_mode": "shuffle" }"#).unwrap_err();
        assert!(matches!(err, CollageError::Config(_)));
    }

    #[test]
    fn justify_fallbacks() {
        assert_eq!(TextAlign::Justify.fallback(), TextAlign::Left);
        assert_eq!(TextAlign::JustifyCenter.fallback(), TextAlign::Center);
        assert_eq!(TextAlign::Right.fallback(), TextAlign::Right);
        assert!(!TextAlign::Center.is_justify());
    }
}
