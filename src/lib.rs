use image::{ DynamicImage, GenericImageView };
use serde::Serialize;
use tracing::{ debug, warn };

use config::{ Fallback, LprConfig };
use detect::{ CandidateDetector, Region };
use error::LprError;
use image_process::Preprocessor;
use matcher::{ PlateMatcher, PlateResult };
use ocr::TextRecognizer;

pub mod config;
pub mod dedup;
pub mod detect;
pub mod error;
pub mod image_process;
pub mod matcher;
pub mod ocr;
pub mod report;
pub mod session;
pub mod source;
pub mod utils;


/// What one frame produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutcome {
    pub candidates: Vec<Region>,
    pub results: Vec<PlateResult>,
    /// Whether the whole-frame (or centre crop) pass ran.
    pub used_fallback: bool,
}

pub struct Lpr {
    preprocessor: Preprocessor,
    detector: CandidateDetector,
    recognizer: Box<dyn TextRecognizer>,
    matcher: PlateMatcher,
    detect_enabled: bool,
    margin: u32,
    fallback: Fallback,
}

impl Lpr {

    /// Starts the configured OCR engine, which is the slow and fallible part.
    pub fn from_config(config: &LprConfig) -> Result<Self, LprError> {
        config.validate()?;
        let matcher = PlateMatcher::new(&config.matcher)?;
        let recognizer = ocr::init(&config.ocr, &matcher)?;
        Ok(Self::assemble(config, matcher, recognizer))
    }

    /// Pipeline around an engine that is already up.
    pub fn with_recognizer(config: &LprConfig, recognizer: Box<dyn TextRecognizer>) -> Result<Self, LprError> {
        let matcher = PlateMatcher::new(&config.matcher)?;
        Ok(Self::assemble(config, matcher, recognizer))
    }

    fn assemble(config: &LprConfig, matcher: PlateMatcher, recognizer: Box<dyn TextRecognizer>) -> Self {
        Lpr {
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            detector: CandidateDetector::new(config.detect.clone()),
            recognizer,
            matcher,
            detect_enabled: config.detect.enabled,
            margin: config.pipeline.margin,
            fallback: config.pipeline.fallback,
        }
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Plate shaped regions of `frame`, empty when detection is disabled.
    pub fn detect(&self, frame: &DynamicImage) -> Result<Vec<Region>, LprError> {
        if !self.detect_enabled {
            return Ok(Vec::new());
        }
        let processed = self.preprocessor.preprocess(frame)?;
        Ok(self.detector.detect(&processed))
    }

    /// Recognize one frame. Candidates are read first; only if none of them
    /// yields a result is the fallback region read.
    pub fn process(&self, frame: &DynamicImage) -> Result<FrameOutcome, LprError> {
        let (width, height) = frame.dimensions();
        let candidates = self.detect(frame)?;

        let mut results = Vec::new();
        for candidate in &candidates {
            let padded = candidate.expand_clamped(self.margin, width, height);
            let roi = utils::crop(frame, &padded);
            match self.recognizer.recognize(&roi) {
                Ok(observations) => {
                    for observation in &observations {
                        results.extend(self.matcher.match_observation(observation, Some(*candidate)));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, region = ?candidate, "recognition failed on candidate, skipping");
                }
            }
        }

        let used_fallback = results.is_empty();
        if used_fallback {
            let (roi, region) = match self.fallback {
                Fallback::FullFrame => (None, None),
                Fallback::CenterCrop { fraction } => {
                    let region = Region::centered(width, height, fraction);
                    (Some(utils::crop(frame, &region)), Some(region))
                }
            };
            let observations = self.recognizer.recognize(roi.as_ref().unwrap_or(frame))?;
            for observation in &observations {
                results.extend(self.matcher.match_observation(observation, region));
            }
        }

        debug!(candidates = candidates.len(), results = results.len(), used_fallback, "processed frame");
        Ok(FrameOutcome { candidates, results, used_fallback })
    }
}
