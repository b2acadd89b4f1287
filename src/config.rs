//! Runtime configuration.
//!
//! Every section falls back to its defaults, so a TOML file only needs to
//! name the values it changes:
//!
//! ```toml
//! [detect]
//! min_width = 80
//!
//! [pipeline.fallback]
//! mode = "center-crop"
//! fraction = 0.6
//! ```

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LprError;

pub const DEFAULT_SNAPSHOT_PORT: u16 = 8080;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LprConfig {
    pub preprocess: PreprocessConfig,
    pub detect: DetectConfig,
    pub pipeline: PipelineConfig,
    pub matcher: MatcherConfig,
    pub ocr: OcrConfig,
    pub source: SourceConfig,
    pub log: LogConfig,
}

impl LprConfig {

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LprError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LprError> {
        let detect = &self.detect;
        if !(detect.min_aspect > 0.0 && detect.min_aspect <= detect.max_aspect) {
            return Err(LprError::invalid_config(format!(
                "aspect range [{}, {}] is empty", detect.min_aspect, detect.max_aspect)));
        }
        if detect.canny_low > detect.canny_high {
            return Err(LprError::invalid_config("canny_low must not exceed canny_high"));
        }
        if !(detect.epsilon_ratio > 0.0) {
            return Err(LprError::invalid_config("epsilon_ratio must be positive"));
        }
        if self.preprocess.tile_grid == 0 {
            return Err(LprError::invalid_config("tile_grid must be at least 1"));
        }
        if let Fallback::CenterCrop { fraction } = self.pipeline.fallback {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(LprError::invalid_config(format!(
                    "center crop fraction {} is outside (0, 1]", fraction)));
            }
        }
        if self.matcher.grammars.is_empty() {
            return Err(LprError::invalid_config("at least one plate grammar is required"));
        }
        if self.ocr.languages.is_empty() {
            return Err(LprError::invalid_config("at least one ocr language is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub denoise: bool,
    /// Distance from the centre pixel to the farthest neighbour of the bilateral window.
    pub bilateral_radius: u32,
    pub sigma_color: f32,
    pub sigma_spatial: f32,
    pub enhance_contrast: bool,
    pub clip_limit: f32,
    /// Tiles per axis for adaptive equalization.
    pub tile_grid: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            denoise: true,
            bilateral_radius: 5,
            sigma_color: 17.0,
            sigma_spatial: 17.0,
            enhance_contrast: true,
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub enabled: bool,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub epsilon_ratio: f64,
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub min_width: u32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            canny_low: 30.0,
            canny_high: 200.0,
            epsilon_ratio: 0.02,
            min_aspect: 2.0,
            max_aspect: 5.0,
            min_width: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Fallback {
    FullFrame,
    CenterCrop { fraction: f32 },
}

impl Default for Fallback {
    fn default() -> Self {
        Self::FullFrame
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extra pixels kept around each candidate before OCR.
    pub margin: u32,
    pub fallback: Fallback,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { margin: 5, fallback: Fallback::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub grammars: Vec<String>,
    pub text_confidence_cap: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            grammars: vec![
                // 12가3456, 123가4567
                r"[0-9]{2,3}[가-힣][0-9]{4}".to_string(),
                // 서울12가3456
                r"[가-힣]{2}[0-9]{2}[가-힣][0-9]{4}".to_string(),
            ],
            text_confidence_cap: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    Tesseract,
    Tensorflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub backend: OcrBackend,
    pub languages: Vec<String>,
    pub device: Device,
    pub tesseract: TesseractConfig,
    pub tensorflow: TensorflowConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Tesseract,
            languages: vec!["kor".to_string(), "eng".to_string()],
            device: Device::Cpu,
            tesseract: TesseractConfig::default(),
            tensorflow: TensorflowConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Directory holding the `*.traineddata` files, tesseract's own default when unset.
    pub datapath: Option<PathBuf>,
    pub page_seg_mode: u8,
    pub confirmed_confidence: f32,
    pub unconfirmed_confidence: f32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            datapath: None,
            page_seg_mode: 6,
            confirmed_confidence: 0.9,
            unconfirmed_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorflowConfig {
    pub model: PathBuf,
    /// One symbol per line; the CTC blank is the class after the last symbol.
    pub charset: PathBuf,
    pub input_name: String,
    pub output_name: String,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for TensorflowConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("./models/ocr_plate_kor.pb"),
            charset: PathBuf::from("./models/charset_kor.txt"),
            input_name: "input_1".to_string(),
            output_name: "dense_2/truediv".to_string(),
            input_width: 164,
            input_height: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub interval_ms: u64,
    pub retry_delay_ms: u64,
}

impl SourceConfig {
    pub fn snapshot_url(ip: &str) -> String {
        format!("http://{}:{}/shot.jpg", ip, DEFAULT_SNAPSHOT_PORT)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: Self::snapshot_url("192.168.0.100"),
            timeout_secs: 5,
            interval_ms: 500,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("plates.log") }
    }
}
