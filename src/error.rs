use image::ImageError;
use thiserror::Error;

use std::io::Error as IOError;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct LprError(LprErrorKind);

#[derive(Debug, Error)]
pub enum LprErrorKind {
    #[error("io error: {0}")]
    IOError(#[from] IOError),
    #[error("image error: {0}")]
    ImageError(#[from] ImageError),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("invalid grammar: {0}")]
    GrammarError(#[from] regex::Error),
    #[error("config parse error: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("empty image ({0}x{1})")]
    EmptyImage(u32, u32),
    #[error("ocr engine init failed: {0}")]
    OcrInit(String),
    #[error("ocr engine failed: {0}")]
    Ocr(String),
    #[cfg(feature = "tensorflow-ocr")]
    #[error("tensorflow error: {0}")]
    TensorflowError(#[from] tensorflow::Status),
}

impl LprError {
    pub fn kind(&self) -> &LprErrorKind {
        &self.0
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::InvalidConfig(msg.into()))
    }

    pub fn ocr_init(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::OcrInit(msg.into()))
    }

    pub fn ocr(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::Ocr(msg.into()))
    }

    /// Errors that make the pipeline useless for the rest of the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), LprErrorKind::OcrInit(_) | LprErrorKind::InvalidConfig(_))
    }
}

impl<T> From<T> for LprError
where T: Into<LprErrorKind>
{
    fn from(e: T) -> Self {
        Self(e.into())
    }
}
