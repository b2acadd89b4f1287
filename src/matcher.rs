//! Plate grammars over recognized text.

use regex::Regex;
use serde::Serialize;

use std::fmt;

use crate::config::MatcherConfig;
use crate::detect::Region;
use crate::error::LprError;
use crate::ocr::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Plate,
    Text,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Plate => f.write_str("PLATE"),
            ResultKind::Text => f.write_str("TEXT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateResult {
    /// The matched plate, or the whole cleaned text for [`ResultKind::Text`].
    pub plate: String,
    pub confidence: f32,
    /// Engine text before whitespace normalization.
    pub raw_text: String,
    pub source_region: Option<Region>,
    #[serde(rename = "type")]
    pub kind: ResultKind,
}

#[derive(Debug, Clone)]
pub struct PlateMatcher {
    grammars: Vec<Regex>,
    text_confidence_cap: f32,
}

impl PlateMatcher {

    pub fn new(config: &MatcherConfig) -> Result<Self, LprError> {
        let grammars = config.grammars.iter()
            .map(|g| Regex::new(g))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { grammars, text_confidence_cap: config.text_confidence_cap })
    }

    /// Every grammar is tried; each one contributes its first match. Text
    /// that no grammar accepts comes back whole as a single `Text` result.
    pub fn match_observation(&self, observation: &Observation, source_region: Option<Region>) -> Vec<PlateResult> {
        let text = observation.normalized_text();
        if text.is_empty() {
            return Vec::new();
        }
        let plates: Vec<PlateResult> = self.grammars.iter()
            .filter_map(|grammar| grammar.find(&text))
            .map(|m| PlateResult {
                plate: m.as_str().to_string(),
                confidence: observation.confidence,
                raw_text: observation.text.clone(),
                source_region,
                kind: ResultKind::Plate,
            })
            .collect();
        if !plates.is_empty() {
            return plates;
        }
        vec![PlateResult {
            plate: text,
            confidence: observation.confidence.min(self.text_confidence_cap),
            raw_text: observation.text.clone(),
            source_region,
            kind: ResultKind::Text,
        }]
    }

    pub fn is_plate(&self, normalized: &str) -> bool {
        self.grammars.iter().any(|g| g.is_match(normalized))
    }
}
