//! CTC plate reader running a frozen tensorflow graph.
//!
//! The graph takes a `1×H×W×3` float tensor and yields per-timestep class
//! probabilities which are decoded greedily over the configured charset.

use image::{ DynamicImage, imageops::FilterType };
use tensorflow::{ Graph, ImportGraphDefOptions, Operation, Session, SessionOptions, SessionRunArgs, Tensor };
use tracing::{ debug, trace };

use std::fmt::Display;
use std::fs;

use crate::config::{ Device, OcrConfig };
use crate::error::LprError;

use super::ctc;
use super::{ Observation, TextRecognizer };

// serialized ConfigProto { device_count { key: "GPU" value: 0 } }
const CPU_ONLY_CONFIG: [u8; 9] = [0x0a, 0x07, 0x0a, 0x03, b'G', b'P', b'U', 0x10, 0x00];

pub struct CtcRecognizer {
    session: Session,
    // resolved once; operations keep the graph alive
    input: Operation,
    output: Operation,
    input_width: u32,
    input_height: u32,
    charset: Vec<String>,
}

impl CtcRecognizer {

    pub fn init(config: &OcrConfig) -> Result<Self, LprError> {
        let tf = &config.tensorflow;
        let charset = fs::read_to_string(&tf.charset)
            .map(|text| ctc::parse_charset(&text))
            .map_err(|e| init_err(tf.charset.display(), e))?;
        if charset.is_empty() {
            return Err(LprError::ocr_init(format!("charset {} is empty", tf.charset.display())));
        }
        // languages are baked into the charset
        debug!(languages = ?config.languages, symbols = charset.len(), "loaded charset");

        let model = fs::read(&tf.model).map_err(|e| init_err(tf.model.display(), e))?;
        let mut graph = Graph::new();
        graph.import_graph_def(&model, &ImportGraphDefOptions::new())
            .map_err(|e| init_err(tf.model.display(), e))?;
        let input = graph.operation_by_name_required(&tf.input_name)
            .map_err(|e| init_err(&tf.input_name, e))?;
        let output = graph.operation_by_name_required(&tf.output_name)
            .map_err(|e| init_err(&tf.output_name, e))?;

        let mut options = SessionOptions::new();
        if config.device == Device::Cpu {
            options.set_config(&CPU_ONLY_CONFIG)?;
        }
        let session = Session::new(&options, &graph)
            .map_err(|e| init_err("session", e))?;

        Ok(Self {
            session,
            input,
            output,
            input_width: tf.input_width,
            input_height: tf.input_height,
            charset,
        })
    }
}

impl TextRecognizer for CtcRecognizer {

    fn name(&self) -> &str {
        "tensorflow-ctc"
    }

    fn recognize(&self, img: &DynamicImage) -> Result<Vec<Observation>, LprError> {
        let img = img.resize_exact(self.input_width, self.input_height, FilterType::Triangle);
        let pixels: Vec<f32> = img.to_rgb8().into_raw().into_iter().map(|v| v as f32/255.0).collect();
        let input = Tensor::new(&[1, self.input_height as u64, self.input_width as u64, 3])
            .with_values(&pixels)?;

        let mut step = SessionRunArgs::new();
        step.add_feed(&self.input, 0, &input);
        let token = step.request_fetch(&self.output, 0);
        self.session.run(&mut step)?;
        let scores: Tensor<f32> = step.fetch(token)?;

        let classes = scores.dims().last().copied().unwrap_or(0) as usize;
        if classes != self.charset.len() + 1 {
            return Err(LprError::ocr(format!("model emits {} classes, charset has {} symbols",
                classes, self.charset.len())));
        }
        match ctc::greedy_decode(&scores, &self.charset) {
            Some((text, confidence)) => {
                trace!(%text, confidence, "ctc decode");
                Ok(vec![Observation::new(text, confidence)])
            }
            None => Ok(Vec::new()),
        }
    }
}

fn init_err(what: impl Display, e: impl Display) -> LprError {
    LprError::ocr_init(format!("{}: {}", what, e))
}
