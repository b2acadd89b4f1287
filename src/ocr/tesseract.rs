//! Tesseract through leptess.
//!
//! Tesseract's page text carries no usable per-word confidence, so the
//! adapter assigns one: higher when the text already looks like a plate.

use image::{ DynamicImage, ImageFormat };
use tracing::trace;

use std::cell::RefCell;
use std::io::Cursor;

use crate::config::TesseractConfig;
use crate::error::LprError;
use crate::matcher::PlateMatcher;

use super::{ normalize_text, Observation, TextRecognizer };

/// Reads the text of a whole encoded page.
pub trait PageReader {
    fn read_page(&mut self, png: &[u8]) -> Result<String, LprError>;
}

#[cfg(feature = "tesseract-ocr")]
impl PageReader for leptess::LepTess {
    fn read_page(&mut self, png: &[u8]) -> Result<String, LprError> {
        self.set_image_from_mem(png)
            .map_err(|e| LprError::ocr(format!("tesseract rejected the image: {:?}", e)))?;
        self.get_utf8_text()
            .map_err(|e| LprError::ocr(format!("tesseract returned invalid utf-8: {}", e)))
    }
}

pub struct TesseractRecognizer {
    reader: RefCell<Box<dyn PageReader>>,
    confirmed_confidence: f32,
    unconfirmed_confidence: f32,
    matcher: PlateMatcher,
}

impl TesseractRecognizer {

    /// Loads the trained data of every language in `config`. Missing data is
    /// an init error.
    #[cfg(feature = "tesseract-ocr")]
    pub fn init(config: &crate::config::OcrConfig, matcher: PlateMatcher) -> Result<Self, LprError> {
        use crate::config::Device;
        use leptess::{ LepTess, Variable };

        let tess = &config.tesseract;
        if config.device == Device::Gpu {
            tracing::debug!("tesseract runs on the cpu only, ignoring gpu preference");
        }
        let datapath = match &tess.datapath {
            Some(path) => Some(path.to_str().ok_or_else(|| LprError::ocr_init(
                format!("tessdata path {} is not valid utf-8", path.display())))?),
            None => None,
        };
        let languages = config.languages.join("+");
        let mut api = LepTess::new(datapath, &languages)
            .map_err(|e| LprError::ocr_init(format!("tesseract could not load `{}`: {:?}", languages, e)))?;
        api.set_variable(Variable::TesseditPagesegMode, &tess.page_seg_mode.to_string())
            .map_err(|e| LprError::ocr_init(format!("page segmentation mode {}: {:?}", tess.page_seg_mode, e)))?;

        Ok(Self::with_reader(Box::new(api), tess, matcher))
    }

    pub fn with_reader(reader: Box<dyn PageReader>, config: &TesseractConfig, matcher: PlateMatcher) -> Self {
        Self {
            reader: RefCell::new(reader),
            confirmed_confidence: config.confirmed_confidence,
            unconfirmed_confidence: config.unconfirmed_confidence,
            matcher,
        }
    }

    fn confidence_for(&self, text: &str) -> f32 {
        if self.matcher.is_plate(&normalize_text(text)) {
            self.confirmed_confidence
        } else {
            self.unconfirmed_confidence
        }
    }
}

impl TextRecognizer for TesseractRecognizer {

    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, img: &DynamicImage) -> Result<Vec<Observation>, LprError> {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let text = self.reader.borrow_mut().read_page(&png)?;
        trace!(text = %text.trim(), "tesseract output");
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let confidence = self.confidence_for(&text);
        Ok(vec![Observation::new(text, confidence)])
    }
}


#[cfg(test)]
mod test {

    use image::{ GenericImageView, Rgb, RgbImage };

    use std::rc::Rc;

    use crate::config::MatcherConfig;
    use crate::error::LprErrorKind;

    use super::*;

    /// Answers every page with `answer` and keeps the size of each page.
    struct CannedReader {
        answer: Result<String, String>,
        pages: Rc<RefCell<Vec<(u32, u32)>>>,
    }

    impl PageReader for CannedReader {
        fn read_page(&mut self, png: &[u8]) -> Result<String, LprError> {
            let page = image::load_from_memory_with_format(png, ImageFormat::Png)?;
            self.pages.borrow_mut().push(page.dimensions());
            self.answer.clone().map_err(LprError::ocr)
        }
    }

    fn recognizer(answer: Result<&str, &str>) -> (TesseractRecognizer, Rc<RefCell<Vec<(u32, u32)>>>) {
        let pages = Rc::new(RefCell::new(Vec::new()));
        let reader = CannedReader {
            answer: answer.map(str::to_string).map_err(str::to_string),
            pages: Rc::clone(&pages),
        };
        let matcher = PlateMatcher::new(&MatcherConfig::default()).unwrap();
        let recognizer = TesseractRecognizer::with_reader(Box::new(reader), &TesseractConfig::default(), matcher);
        (recognizer, pages)
    }

    fn crop() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 40, Rgb([200, 200, 200])))
    }

    #[test]
    fn plate_text_gets_confirmed_confidence() {
        let (recognizer, pages) = recognizer(Ok("12가 3456\n"));
        let observations = recognizer.recognize(&crop()).unwrap();
        assert_eq!(observations, vec![Observation::new("12가 3456\n", 0.9)]);
        // the engine got the whole crop
        assert_eq!(pages.borrow().as_slice(), &[(120, 40)]);
    }

    #[test]
    fn other_text_gets_unconfirmed_confidence() {
        let (recognizer, _) = recognizer(Ok("EXIT\n"));
        let observations = recognizer.recognize(&crop()).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].confidence, 0.7);
        assert_eq!(observations[0].text, "EXIT\n");
    }

    #[test]
    fn blank_page_gives_no_observation() {
        let (recognizer, pages) = recognizer(Ok(" \n\n"));
        assert!(recognizer.recognize(&crop()).unwrap().is_empty());
        assert_eq!(pages.borrow().len(), 1);
    }

    #[test]
    fn engine_failure_is_a_recognition_error() {
        let (recognizer, _) = recognizer(Err("bad page"));
        let err = recognizer.recognize(&crop()).unwrap_err();
        assert!(matches!(err.kind(), LprErrorKind::Ocr(_)));
        assert!(!err.is_fatal());
    }

    #[cfg(feature = "tesseract-ocr")]
    #[test]
    fn missing_language_data_is_an_init_error() {
        let config = crate::config::OcrConfig {
            languages: vec!["no-such-language".to_string()],
            ..Default::default()
        };
        let matcher = PlateMatcher::new(&MatcherConfig::default()).unwrap();
        let err = TesseractRecognizer::init(&config, matcher).err().unwrap();
        assert!(err.is_fatal());
    }
}
