//! Section-aware correction of recognized plate characters.
//!
//! The vehicle-code section (after the section gap) never contains the
//! letters in [`ForbiddenSet::vehicle_code`]; a forbidden character there is
//! replaced with the glyph's best permitted alternative.

use anyhow::{anyhow, Result};
use common::{ForbiddenSet, ScoreVector};
use serde::Serialize;
use std::fmt;

/// Classifier output for one glyph
#[derive(Debug, Clone)]
pub struct GlyphPrediction<'a> {
    pub character: char,
    pub scores: Option<ScoreVector<'a>>,
}

impl<'a> GlyphPrediction<'a> {
    pub fn new(character: char, scores: Option<ScoreVector<'a>>) -> Self {
        Self { character, scores }
    }

    /// Prediction whose character is the top-scoring symbol
    pub fn from_scores(scores: ScoreVector<'a>) -> Result<Self> {
        let (character, _) = scores
            .best()
            .ok_or_else(|| anyhow!("score vector has no finite scores"))?;
        Ok(Self {
            character,
            scores: Some(scores),
        })
    }
}

/// A forbidden character replaced in the second section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Substitution {
    /// Glyph index in the full sequence
    pub position: usize,
    pub original: char,
    pub replacement: char,
}

/// Corrected plate text, split into sections
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CorrectedText {
    pub first_section: String,
    pub second_section: Option<String>,
    pub substitutions: Vec<Substitution>,
}

impl CorrectedText {
    /// `"FIRST SECOND"`, or just the first section when there is no gap
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CorrectedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.second_section {
            Some(second) => write!(f, "{} {}", self.first_section, second),
            None => f.write_str(&self.first_section),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecognitionCorrector {
    forbidden: ForbiddenSet,
}

impl RecognitionCorrector {
    pub fn new(forbidden: ForbiddenSet) -> Self {
        Self { forbidden }
    }

    pub fn forbidden(&self) -> &ForbiddenSet {
        &self.forbidden
    }

    /// Assemble the plate text from per-glyph predictions.
    ///
    /// `section_gap` is the index of the first second-section glyph. A gap of
    /// 0 or at/after the last glyph would leave a section empty and is
    /// treated as no gap.
    pub fn correct(
        &self,
        predictions: &[GlyphPrediction<'_>],
        section_gap: Option<usize>,
    ) -> CorrectedText {
        let split = section_gap.filter(|&gap| gap > 0 && gap < predictions.len());
        if split.is_none() && section_gap.is_some() {
            tracing::debug!(
                gap = ?section_gap,
                glyphs = predictions.len(),
                "section gap out of range, reading plate as one section"
            );
        }

        let Some(split) = split else {
            return CorrectedText {
                first_section: predictions.iter().map(|p| p.character).collect(),
                second_section: None,
                substitutions: Vec::new(),
            };
        };

        let (first, second) = predictions.split_at(split);
        let mut substitutions = Vec::new();
        let second_section: String = second
            .iter()
            .enumerate()
            .map(|(offset, prediction)| {
                let position = split + offset;
                match self.permitted_alternative(prediction) {
                    Some(replacement) => {
                        substitutions.push(Substitution {
                            position,
                            original: prediction.character,
                            replacement,
                        });
                        replacement
                    }
                    None => prediction.character,
                }
            })
            .collect();

        for substitution in &substitutions {
            telemetry::metrics::CORRECTOR_SUBSTITUTIONS
                .with_label_values(&[substitution.original.to_string().as_str()])
                .inc();
            tracing::debug!(
                position = substitution.position,
                original = %substitution.original,
                replacement = %substitution.replacement,
                "replaced forbidden vehicle-code character"
            );
        }

        CorrectedText {
            first_section: first.iter().map(|p| p.character).collect(),
            second_section: Some(second_section),
            substitutions,
        }
    }

    fn permitted_alternative(&self, prediction: &GlyphPrediction<'_>) -> Option<char> {
        if !self.forbidden.contains(prediction.character) {
            return None;
        }
        let scores = prediction.scores.as_ref()?;
        let alternative = scores.best_excluding(&self.forbidden).map(|(ch, _)| ch);
        if alternative.is_none() {
            tracing::warn!(
                character = %prediction.character,
                "no permitted alternative for forbidden character"
            );
        }
        alternative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Alphabet;
    use ndarray::Array1;

    fn scores<'a>(alphabet: &'a Alphabet, entries: &[(char, f32)]) -> ScoreVector<'a> {
        let mut raw = Array1::zeros(alphabet.len());
        for &(ch, score) in entries {
            raw[alphabet.index_of(ch).unwrap()] = score;
        }
        ScoreVector::new(alphabet, raw).unwrap()
    }

    fn predict<'a>(alphabet: &'a Alphabet, text: &str) -> Vec<GlyphPrediction<'a>> {
        text.chars()
            .map(|ch| GlyphPrediction::new(ch, Some(scores(alphabet, &[(ch, 0.9)]))))
            .collect()
    }

    #[test]
    fn test_sections_are_joined_with_space() {
        let alphabet = Alphabet::plates();
        let corrected = RecognitionCorrector::default().correct(&predict(alphabet, "WA12345"), Some(2));

        assert_eq!(corrected.text(), "WA 12345");
        assert_eq!(corrected.first_section, "WA");
        assert_eq!(corrected.second_section.as_deref(), Some("12345"));
        assert!(corrected.substitutions.is_empty());
    }

    #[test]
    fn test_forbidden_second_section_character_is_replaced() {
        let alphabet = Alphabet::plates();
        let mut predictions = predict(alphabet, "WAB2345");
        predictions[2] = GlyphPrediction::from_scores(scores(
            alphabet,
            &[('B', 0.7), ('8', 0.2), ('3', 0.05)],
        ))
        .unwrap();

        let corrected = RecognitionCorrector::default().correct(&predictions, Some(2));

        assert_eq!(corrected.text(), "WA 82345");
        assert_eq!(
            corrected.substitutions,
            vec![Substitution {
                position: 2,
                original: 'B',
                replacement: '8'
            }]
        );
    }

    #[test]
    fn test_first_section_is_never_changed() {
        let alphabet = Alphabet::plates();
        let predictions = vec![
            GlyphPrediction::new('D', Some(scores(alphabet, &[('D', 0.6), ('0', 0.3)]))),
            GlyphPrediction::new('B', Some(scores(alphabet, &[('B', 0.6), ('8', 0.3)]))),
            GlyphPrediction::new('1', Some(scores(alphabet, &[('1', 0.9)]))),
        ];
        let corrected = RecognitionCorrector::default().correct(&predictions, Some(2));

        assert_eq!(corrected.text(), "DB 1");
        assert!(corrected.substitutions.is_empty());
    }

    #[test]
    fn test_no_gap_means_no_substitution() {
        let alphabet = Alphabet::plates();
        let predictions = vec![
            GlyphPrediction::new('O', Some(scores(alphabet, &[('O', 0.6), ('0', 0.3)]))),
            GlyphPrediction::new('1', None),
        ];
        let corrected = RecognitionCorrector::default().correct(&predictions, None);

        assert_eq!(corrected.text(), "O1");
        assert_eq!(corrected.second_section, None);
    }

    #[test]
    fn test_missing_scores_leave_character_unchanged() {
        let alphabet = Alphabet::plates();
        let mut predictions = predict(alphabet, "KR");
        predictions.push(GlyphPrediction::new('Z', None));

        let corrected = RecognitionCorrector::default().correct(&predictions, Some(2));
        assert_eq!(corrected.text(), "KR Z");
    }

    #[test]
    fn test_out_of_range_gap_is_ignored() {
        let alphabet = Alphabet::plates();
        let predictions = predict(alphabet, "AB1");
        let corrector = RecognitionCorrector::default();

        assert_eq!(corrector.correct(&predictions, Some(0)).text(), "AB1");
        assert_eq!(corrector.correct(&predictions, Some(3)).text(), "AB1");
        assert_eq!(corrector.correct(&[], Some(1)).text(), "");
    }

    #[test]
    fn test_substitution_never_yields_forbidden_character() {
        let alphabet = Alphabet::plates();
        let forbidden = ForbiddenSet::vehicle_code();
        let predictions: Vec<_> = ['I', 'O', 'Z', 'D']
            .into_iter()
            .map(|ch| {
                GlyphPrediction::new(
                    ch,
                    Some(scores(alphabet, &[(ch, 0.9), ('B', 0.5), ('1', 0.3), ('0', 0.2)])),
                )
            })
            .collect();
        let mut all = predict(alphabet, "P");
        all.extend(predictions);

        let corrected = RecognitionCorrector::new(forbidden.clone()).correct(&all, Some(1));
        let second = corrected.second_section.unwrap();

        assert_eq!(second, "1111");
        assert!(second.chars().all(|ch| !forbidden.contains(ch)));
    }
}
