/// Scripted collaborators for tests and demonstrations
use super::{CharacterClassifier, PlateDetector};
use anyhow::{anyhow, bail, Result};
use common::{Alphabet, RawDetection};
use image::{GrayImage, RgbImage};
use ndarray::Array1;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Returns the same detections for every image, or always fails
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    detections: Vec<RawDetection>,
    failure: Option<String>,
}

impl StaticDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            failure: None,
        }
    }

    /// Detector whose every call fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            detections: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

impl PlateDetector for StaticDetector {
    fn id(&self) -> &'static str {
        "static_detector"
    }

    fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>> {
        if let Some(message) = &self.failure {
            bail!("{}", message);
        }
        Ok(self.detections.clone())
    }
}

/// Hands out queued score vectors, one per classified glyph
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    queue: Mutex<VecDeque<Array1<f32>>>,
}

impl ScriptedClassifier {
    pub fn new(scores: impl IntoIterator<Item = Array1<f32>>) -> Self {
        Self {
            queue: Mutex::new(scores.into_iter().collect()),
        }
    }

    /// Classifier that reads `text` one character per glyph with full
    /// confidence. Characters outside the alphabet are rejected.
    pub fn reading(alphabet: &Alphabet, text: &str) -> Result<Self> {
        let scores = text
            .chars()
            .map(|ch| one_hot(alphabet, ch, 1.0))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(scores))
    }

    /// Queue further score vectors
    pub fn push(&self, scores: Array1<f32>) -> Result<()> {
        self.queue
            .lock()
            .map_err(|e| anyhow!("Failed to lock score queue: {}", e))?
            .push_back(scores);
        Ok(())
    }

    pub fn remaining(&self) -> Result<usize> {
        Ok(self
            .queue
            .lock()
            .map_err(|e| anyhow!("Failed to lock score queue: {}", e))?
            .len())
    }
}

impl CharacterClassifier for ScriptedClassifier {
    fn id(&self) -> &'static str {
        "scripted_classifier"
    }

    fn classify(&self, _glyph: &GrayImage) -> Result<Array1<f32>> {
        self.queue
            .lock()
            .map_err(|e| anyhow!("Failed to lock score queue: {}", e))?
            .pop_front()
            .ok_or_else(|| anyhow!("scripted classifier ran out of score vectors"))
    }
}

/// Score vector with `score` on `symbol` and zero elsewhere
pub fn one_hot(alphabet: &Alphabet, symbol: char, score: f32) -> Result<Array1<f32>> {
    let idx = alphabet
        .index_of(symbol)
        .ok_or_else(|| anyhow!("'{}' is not in the alphabet", symbol))?;
    let mut scores = Array1::zeros(alphabet.len());
    scores[idx] = score;
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_detector() {
        let raw = RawDetection {
            class_id: 1,
            confidence: 0.9,
            xyxy: [1.0, 2.0, 3.0, 4.0],
        };
        let detector = StaticDetector::new(vec![raw.clone()]);
        assert_eq!(detector.detect(&RgbImage::new(4, 4)).unwrap(), vec![raw]);

        let failing = StaticDetector::failing("camera offline");
        let err = failing.detect(&RgbImage::new(4, 4)).unwrap_err();
        assert!(err.to_string().contains("camera offline"));
    }

    #[test]
    fn test_scripted_classifier_reads_in_order() {
        let alphabet = Alphabet::plates();
        let classifier = ScriptedClassifier::reading(alphabet, "K7").unwrap();
        let glyph = GrayImage::new(8, 8);

        let first = classifier.classify(&glyph).unwrap();
        assert_eq!(first[alphabet.index_of('K').unwrap()], 1.0);
        assert_eq!(classifier.remaining().unwrap(), 1);

        classifier.classify(&glyph).unwrap();
        assert!(classifier.classify(&glyph).is_err());
    }

    #[test]
    fn test_reading_rejects_unknown_symbol() {
        assert!(ScriptedClassifier::reading(Alphabet::plates(), "Q1").is_err());
    }
}
