//! Adapters over external OCR engines.
//!
//! Every engine is wrapped so that it produces [`Observation`]s. Engines are
//! initialized once by [`init`] and the handle is owned by whoever drives the
//! pipeline; there is no process wide engine state.

use image::DynamicImage;
use tracing::info;

use crate::config::{ OcrBackend, OcrConfig };
use crate::error::LprError;
use crate::matcher::PlateMatcher;

pub mod ctc;
pub mod tesseract;
#[cfg(feature = "tensorflow-ocr")]
pub mod tensorflow;

pub use self::tesseract::TesseractRecognizer;
#[cfg(feature = "tensorflow-ocr")]
pub use self::tensorflow::CtcRecognizer;

/// One piece of text read from a sub-image, as the engine returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub text: String,
    /// In `[0, 1]`.
    pub confidence: f32,
}

impl Observation {

    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self { text: text.into(), confidence: confidence.max(0.0).min(1.0) }
    }

    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }
}

/// Text recognition capability over a raster image.
///
/// Calls are made from a single thread, one at a time.
pub trait TextRecognizer {

    fn name(&self) -> &str;

    fn recognize(&self, img: &DynamicImage) -> Result<Vec<Observation>, LprError>;
}

/// Drop every whitespace character, line breaks included.
pub fn normalize_text(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Bring up the configured engine. Failure here is fatal for the session.
#[cfg_attr(not(feature = "tesseract-ocr"), allow(unused_variables))]
pub fn init(config: &OcrConfig, matcher: &PlateMatcher) -> Result<Box<dyn TextRecognizer>, LprError> {
    info!(backend = ?config.backend, languages = ?config.languages, device = ?config.device,
        "initializing ocr engine");
    let recognizer: Box<dyn TextRecognizer> = match config.backend {
        #[cfg(feature = "tesseract-ocr")]
        OcrBackend::Tesseract => Box::new(TesseractRecognizer::init(config, matcher.clone())?),
        #[cfg(not(feature = "tesseract-ocr"))]
        OcrBackend::Tesseract => {
            return Err(LprError::ocr_init("built without the `tesseract-ocr` feature"));
        }
        #[cfg(feature = "tensorflow-ocr")]
        OcrBackend::Tensorflow => Box::new(CtcRecognizer::init(config)?),
        #[cfg(not(feature = "tensorflow-ocr"))]
        OcrBackend::Tensorflow => {
            return Err(LprError::ocr_init("built without the `tensorflow-ocr` feature"));
        }
    };
    info!(engine = recognizer.name(), "ocr engine ready");
    Ok(recognizer)
}
