//! Corpus tokenization, vocabulary indexing, and training-pair construction.

use std::collections::HashMap;

use ndarray::Array1;

use crate::error::{Result, SkipGramError};

/// Splits raw text into lowercase word tokens. Whitespace and punctuation
/// both delimit: any run of non-alphanumeric characters is a boundary.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// Token-to-index mapping with its inverse, indices dense in `[0, len)` and
/// assigned in first-seen order. Fixed once built.
///
/// The one-hot encoding below is dense, so vectors and anything derived from
/// them scale linearly with vocabulary size. That is fine for the small
/// corpora this trainer targets and does not scale beyond them.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Builds a vocabulary from a token sequence in first-seen order.
    pub fn from_tokens(tokens: &[String]) -> Vocabulary {
        let mut vocab = Vocabulary::default();
        for token in tokens {
            vocab.intern(token);
        }
        vocab
    }

    fn intern(&mut self, token: &str) -> usize {
        match self.index.get(token) {
            Some(&i) => i,
            None => {
                let i = self.words.len();
                self.words.push(token.to_string());
                self.index.insert(token.to_string(), i);
                i
            }
        }
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Index of `word`, if present.
    pub fn lookup_word(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// The word at vocabulary index `index`.
    ///
    /// *Panics* if the index is out of range.
    pub fn word(&self, index: usize) -> &str {
        &self.words[index]
    }

    /// All words in index order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Dense one-hot encoding of `word`: length `len()`, a single 1 at the
    /// word's index.
    pub fn one_hot(&self, word: &str) -> Result<Array1<f32>> {
        let i = self
            .lookup_word(word)
            .ok_or_else(|| SkipGramError::WordNotFound(word.to_string()))?;
        let mut x = Array1::zeros(self.len());
        x[i] = 1.0;
        Ok(x)
    }
}

/// One training example: the center word's one-hot vector and the summed
/// one-hot vectors of every word in its context window. The context vector's
/// total equals the number of context tokens present; windows clipped at the
/// ends of the text have fewer than `2 * radius`.
#[derive(Debug, Clone)]
pub struct TrainingPair {
    pub center: Array1<f32>,
    pub context: Array1<f32>,
}

/// Builds the vocabulary and the ordered training set for `text` with the
/// given window radius: one pair per token occurrence, in text order, with
/// the window clipped to the sequence bounds. Degenerate input (empty text,
/// a lone token) yields an empty or trivially small training set.
pub fn training_data(text: &str, radius: usize) -> (Vocabulary, Vec<TrainingPair>) {
    let tokens = tokenize(text);
    let mut vocab = Vocabulary::default();
    let ids: Vec<usize> = tokens.iter().map(|t| vocab.intern(t)).collect();

    let mut pairs = Vec::with_capacity(ids.len());
    for (i, &center) in ids.iter().enumerate() {
        let mut x = Array1::zeros(vocab.len());
        x[center] = 1.0;

        let lo = i.saturating_sub(radius);
        let hi = (i + radius + 1).min(ids.len());
        let mut context = Array1::zeros(vocab.len());
        for j in lo..hi {
            if j != i {
                context[ids[j]] += 1.0;
            }
        }
        pairs.push(TrainingPair { center: x, context });
    }
    (vocab, pairs)
}
