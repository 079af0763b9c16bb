//! High-level surface binding a corpus to the network: build the training
//! set, train, query context predictions, and expose the embeddings.

use std::fs;
use std::path::Path;

use log::debug;
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkipGramError};
use crate::model::{rank_descending, SkipGramModel};
use crate::tokenizer::{training_data, TrainingPair, Vocabulary};

/// Model hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Embedding dimensionality. `None` picks half the vocabulary size,
    /// and at least 1.
    pub hidden_size: Option<usize>,
    /// Gradient-descent step size. Default 0.01.
    pub learning_rate: f32,
    /// Seed for weight initialization. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> ModelConfig {
        ModelConfig {
            hidden_size: None,
            learning_rate: 0.01,
            seed: None,
        }
    }
}

/// A skip-gram trainer bound to one corpus: vocabulary, windowed training
/// pairs, and the network itself.
#[derive(Debug)]
pub struct SkipGram {
    context_size: usize,
    vocab: Vocabulary,
    pairs: Vec<TrainingPair>,
    model: SkipGramModel,
}

impl SkipGram {
    /// Builds the training set from a text file and initializes a model for
    /// it. `context_size` is the window radius and also how many predictions
    /// a query returns.
    pub fn from_file(path: &Path, context_size: usize, config: &ModelConfig) -> Result<SkipGram> {
        let text = fs::read_to_string(path)?;
        Ok(SkipGram::from_text(&text, context_size, config))
    }

    /// Builds the training set from an in-memory string.
    pub fn from_text(text: &str, context_size: usize, config: &ModelConfig) -> SkipGram {
        let (vocab, pairs) = training_data(text, context_size);
        let hidden = config
            .hidden_size
            .unwrap_or_else(|| (vocab.len() / 2).max(1));
        debug!(
            "corpus: {} distinct words, {} training pairs, hidden size {hidden}",
            vocab.len(),
            pairs.len()
        );
        let model = SkipGramModel::new(vocab.len(), hidden, config.learning_rate, config.seed);
        SkipGram {
            context_size,
            vocab,
            pairs,
            model,
        }
    }

    /// Trains for `epochs` passes over the corpus, resuming from the current
    /// weights. Returns the per-epoch loss history.
    pub fn train(&mut self, epochs: usize) -> Vec<f32> {
        self.model.fit(&self.pairs, epochs)
    }

    /// Re-draws the network's weights, discarding any training so far.
    pub fn reset(&mut self) {
        self.model.reset();
    }

    /// The top `min(context_size, V)` most likely context words for `word`,
    /// highest probability first.
    pub fn predict(&self, word: &str) -> Result<Vec<(&str, f32)>> {
        let x = self.vocab.one_hot(word)?;
        let y = self.model.predict(x.view());
        let k = self.context_size.min(self.vocab.len());
        Ok(rank_descending(y.view(), k)
            .into_iter()
            .map(|(i, p)| (self.vocab.word(i), p))
            .collect())
    }

    /// The embedding row for `word`.
    pub fn embedding(&self, word: &str) -> Result<ArrayView1<f32>> {
        let i = self
            .vocab
            .lookup_word(word)
            .ok_or_else(|| SkipGramError::WordNotFound(word.to_string()))?;
        Ok(self.model.w1().index_axis_move(Axis(0), i))
    }

    /// All embeddings as `(word, row)` in vocabulary order. This is the
    /// input for external projection and plotting of the learned space.
    pub fn embeddings(&self) -> impl Iterator<Item = (&str, ArrayView1<f32>)> {
        (0..self.vocab.len()).map(move |i| {
            (
                self.vocab.word(i),
                self.model.w1().index_axis_move(Axis(0), i),
            )
        })
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn model(&self) -> &SkipGramModel {
        &self.model
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// Number of training pairs built from the corpus.
    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn save_weights(&self, w1_path: &Path, w2_path: &Path) -> Result<()> {
        self.model.save_weights(w1_path, w2_path)
    }

    pub fn load_weights(&mut self, w1_path: &Path, w2_path: &Path) -> Result<()> {
        self.model.load_weights(w1_path, w2_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ModelConfig {
        ModelConfig {
            seed: Some(42),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_predict_returns_min_of_context_size_and_vocab() {
        let sg = SkipGram::from_text("a b c", 5, &seeded());
        let preds = sg.predict("a").unwrap();
        assert_eq!(preds.len(), 3);

        let sg = SkipGram::from_text("a b c", 2, &seeded());
        let preds = sg.predict("a").unwrap();
        assert_eq!(preds.len(), 2);
    }

    #[test]
    fn test_predict_is_sorted_by_probability() {
        let mut sg = SkipGram::from_text("the cat sat on the mat", 3, &seeded());
        sg.train(5);
        let preds = sg.predict("cat").unwrap();
        for pair in preds.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_unknown_word_fails_without_corrupting_state() {
        let sg = SkipGram::from_text("a b c", 2, &seeded());
        let err = sg.predict("zebra").unwrap_err();
        assert!(matches!(err, SkipGramError::WordNotFound(w) if w == "zebra"));
        assert!(sg.predict("b").is_ok());
    }

    #[test]
    fn test_hidden_size_defaults_to_half_the_vocabulary() {
        let sg = SkipGram::from_text("a b c d e f", 1, &ModelConfig::default());
        assert_eq!(sg.model().hidden_size(), 3);

        // Never zero, even for a one-word corpus.
        let sg = SkipGram::from_text("solo", 1, &ModelConfig::default());
        assert_eq!(sg.model().hidden_size(), 1);

        let config = ModelConfig {
            hidden_size: Some(4),
            ..ModelConfig::default()
        };
        let sg = SkipGram::from_text("a b c", 1, &config);
        assert_eq!(sg.model().hidden_size(), 4);
    }

    #[test]
    fn test_embeddings_are_keyed_by_vocabulary_order() {
        let sg = SkipGram::from_text("b a c", 1, &seeded());
        let rows: Vec<_> = sg.embeddings().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].0, "b");
        assert_eq!(rows[1].0, "a");
        let h = sg.model().hidden_size();
        for (_, row) in &rows {
            assert_eq!(row.len(), h);
        }
        assert_eq!(sg.embedding("a").unwrap(), rows[1].1);
    }

    #[test]
    fn test_train_reports_one_loss_per_epoch() {
        let mut sg = SkipGram::from_text("a b a b a b", 1, &seeded());
        let history = sg.train(4);
        assert_eq!(history.len(), 4);
    }
}
