//! Character alphabet of the glyph classifier and per-glyph score vectors.

use anyhow::{anyhow, bail, Result};
use ndarray::Array1;
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};

/// Symbols the character classifier is trained on, in output order.
///
/// `Q` never appears on plates issued under the two-section scheme.
pub const PLATE_SYMBOLS: &str = "0123456789ABCDEFGHIJKLMNOPRSTUVWXYZ";

/// Characters that are never issued in the vehicle-code section
pub const VEHICLE_CODE_FORBIDDEN: [char; 5] = ['B', 'D', 'I', 'O', 'Z'];

static PLATE_ALPHABET: Lazy<Alphabet> = Lazy::new(|| Alphabet::from_unique(PLATE_SYMBOLS));

/// Ordered bijection between classifier output indices and characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
    index: HashMap<char, usize>,
}

impl Alphabet {
    /// Build an alphabet from a string of distinct symbols
    pub fn new(symbols: &str) -> Result<Self> {
        if symbols.is_empty() {
            bail!("alphabet cannot be empty");
        }

        let mut seen = BTreeSet::new();
        for ch in symbols.chars() {
            if !seen.insert(ch) {
                bail!("alphabet contains duplicate symbol '{}'", ch);
            }
        }

        Ok(Self::from_unique(symbols))
    }

    /// The process-wide plate alphabet
    pub fn plates() -> &'static Alphabet {
        &PLATE_ALPHABET
    }

    fn from_unique(symbols: &str) -> Self {
        let symbols: Vec<char> = symbols.chars().collect();
        let index = symbols
            .iter()
            .enumerate()
            .map(|(idx, &ch)| (ch, idx))
            .collect();
        Self { symbols, index }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.index.get(&symbol).copied()
    }

    pub fn contains(&self, symbol: char) -> bool {
        self.index.contains_key(&symbol)
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }
}

/// Characters excluded from a section of the plate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbiddenSet(BTreeSet<char>);

impl ForbiddenSet {
    pub fn new(chars: impl IntoIterator<Item = char>) -> Self {
        Self(chars.into_iter().collect())
    }

    /// `{B, D, I, O, Z}`: letters confusable with digits, never issued in the
    /// vehicle-code section
    pub fn vehicle_code() -> Self {
        Self::new(VEHICLE_CODE_FORBIDDEN)
    }

    pub fn contains(&self, ch: char) -> bool {
        self.0.contains(&ch)
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.0.iter().copied()
    }
}

impl Default for ForbiddenSet {
    fn default() -> Self {
        Self::vehicle_code()
    }
}

/// Classifier scores for one glyph, one per alphabet symbol
#[derive(Debug, Clone)]
pub struct ScoreVector<'a> {
    alphabet: &'a Alphabet,
    scores: Array1<f32>,
}

impl<'a> ScoreVector<'a> {
    /// Pair raw classifier output with the alphabet it was produced over
    pub fn new(alphabet: &'a Alphabet, scores: Array1<f32>) -> Result<Self> {
        if scores.len() != alphabet.len() {
            return Err(anyhow!(
                "score vector has {} entries but the alphabet has {} symbols",
                scores.len(),
                alphabet.len()
            ));
        }
        Ok(Self { alphabet, scores })
    }

    pub fn alphabet(&self) -> &'a Alphabet {
        self.alphabet
    }

    pub fn scores(&self) -> &Array1<f32> {
        &self.scores
    }

    /// Score of `symbol`, if it belongs to the alphabet
    pub fn score_of(&self, symbol: char) -> Option<f32> {
        self.alphabet
            .index_of(symbol)
            .and_then(|idx| self.scores.get(idx).copied())
    }

    /// `(character, score)` pairs in alphabet order
    pub fn iter(&self) -> impl Iterator<Item = (char, f32)> + '_ {
        self.alphabet
            .symbols()
            .iter()
            .copied()
            .zip(self.scores.iter().copied())
    }

    /// Highest-scoring symbol; the earliest symbol wins ties
    pub fn best(&self) -> Option<(char, f32)> {
        Self::argmax(self.iter())
    }

    /// Highest-scoring symbol outside `forbidden`
    pub fn best_excluding(&self, forbidden: &ForbiddenSet) -> Option<(char, f32)> {
        Self::argmax(self.iter().filter(|(ch, _)| !forbidden.contains(*ch)))
    }

    fn argmax(candidates: impl Iterator<Item = (char, f32)>) -> Option<(char, f32)> {
        let mut best: Option<(char, f32)> = None;
        for (ch, score) in candidates {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((ch, score)),
            }
        }
        best
    }
}
