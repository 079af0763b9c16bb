//! The two-layer skip-gram network and its training algorithm.
//!
//! `W1` has shape `(V, H)` and projects a one-hot center word onto the
//! hidden layer; its rows are the learned word embeddings. `W2` has shape
//! `(H, V)` and scores every vocabulary word as a context candidate. Both
//! are trained by plain per-pair gradient descent against the summed
//! context target, with no batching, shuffling, or rate scheduling.

use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::info;
use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::tokenizer::TrainingPair;

/// Softmax over a raw score vector.
///
/// Exponentials are clamped to a finite range so extreme scores saturate
/// instead of overflowing to infinity. At the magnitudes this trainer
/// produces the clamp is inactive and the result is the plain exp/sum
/// definition.
fn softmax(u: ArrayView1<f32>) -> Array1<f32> {
    let ex = u.mapv(exp_clamped);
    let sum = ex.sum();
    ex / sum
}

fn exp_clamped(v: f32) -> f32 {
    v.exp().clamp(1e-30, 1e30)
}

fn outer(a: ArrayView1<f32>, b: ArrayView1<f32>) -> Array2<f32> {
    let a = a.insert_axis(Axis(1));
    let b = b.insert_axis(Axis(0));
    a.dot(&b)
}

/// Ranks a probability vector descending on `(probability, index)` tuples,
/// so exact ties order by descending vocabulary index, and keeps the top
/// `k` entries as `(index, probability)`.
pub(crate) fn rank_descending(y: ArrayView1<f32>, k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = y.iter().copied().enumerate().collect();
    ranked.sort_by_key(|&(i, p)| Reverse((OrderedFloat(p), i)));
    ranked.truncate(k);
    ranked
}

/// The skip-gram network: two dense weight matrices and a learning rate.
///
/// All randomness flows through the model's own ChaCha stream, so a model
/// built with a fixed seed trains identically on identical input.
#[derive(Debug)]
pub struct SkipGramModel {
    w1: Array2<f32>,
    w2: Array2<f32>,
    learning_rate: f32,
    rng: ChaCha8Rng,
}

impl SkipGramModel {
    /// Creates a model for `vocab_size` words and `hidden_size` embedding
    /// dimensions, with both matrices drawn from uniform `[-1, 1]` noise.
    /// `None` for `seed` draws the stream from entropy.
    pub fn new(
        vocab_size: usize,
        hidden_size: usize,
        learning_rate: f32,
        seed: Option<u64>,
    ) -> SkipGramModel {
        let mut rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        let w1 = Array::random_using((vocab_size, hidden_size), Uniform::new(-1.0, 1.0), &mut rng);
        let w2 = Array::random_using((hidden_size, vocab_size), Uniform::new(-1.0, 1.0), &mut rng);
        SkipGramModel {
            w1,
            w2,
            learning_rate,
            rng,
        }
    }

    /// Re-draws both weight matrices from the model's random stream,
    /// discarding all training. [`SkipGramModel::fit`] never does this
    /// implicitly: call `reset` to restart from scratch, or call `fit`
    /// again to keep training from the current weights.
    pub fn reset(&mut self) {
        let (v, h) = self.w1.dim();
        self.w1 = Array::random_using((v, h), Uniform::new(-1.0, 1.0), &mut self.rng);
        self.w2 = Array::random_using((h, v), Uniform::new(-1.0, 1.0), &mut self.rng);
    }

    /// Vocabulary size V.
    pub fn vocab_size(&self) -> usize {
        self.w1.nrows()
    }

    /// Embedding dimensionality H.
    pub fn hidden_size(&self) -> usize {
        self.w1.ncols()
    }

    /// The projection matrix; row `i` is the embedding of vocabulary word `i`.
    pub fn w1(&self) -> ArrayView2<f32> {
        self.w1.view()
    }

    /// The output matrix; column `i` scores word `i` as context.
    pub fn w2(&self) -> ArrayView2<f32> {
        self.w2.view()
    }

    /// Forward pass for a one-hot center word `x` of length V.
    ///
    /// Returns `(y, h, u)`: the softmax prediction over the vocabulary, the
    /// hidden activation `x·W1` (the center word's embedding row), and the
    /// raw scores `u = h·W2`.
    pub fn forward(&self, x: ArrayView1<f32>) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
        let h = x.dot(&self.w1);
        let u = h.dot(&self.w2);
        let y = softmax(u.view());
        (y, h, u)
    }

    /// Probability distribution over context words for a one-hot center
    /// word, without touching any weights.
    pub fn predict(&self, x: ArrayView1<f32>) -> Array1<f32> {
        self.forward(x).0
    }

    /// Trains on `pairs` for `epochs` full passes in their given order,
    /// doing one forward/backward/update cycle per pair, starting from the
    /// current weights. Returns the accumulated loss of each epoch; each is
    /// also logged as its epoch completes. An empty training set is a no-op
    /// loop reporting loss 0.
    pub fn fit(&mut self, pairs: &[TrainingPair], epochs: usize) -> Vec<f32> {
        let mut history = Vec::with_capacity(epochs);
        for epoch in 0..epochs {
            let mut loss = 0.0;
            for pair in pairs {
                loss += self.train_pair(pair);
            }
            info!("epoch {epoch}: loss {loss}");
            history.push(loss);
        }
        history
    }

    /// One gradient-descent step on a single pair. Returns the pair's loss:
    /// the negative log-likelihood of all context occurrences under the
    /// shared softmax, summed (not averaged) over the window.
    fn train_pair(&mut self, pair: &TrainingPair) -> f32 {
        let (y, h, u) = self.forward(pair.center.view());

        // The window's C context predictions all share this y, so their C
        // cross-entropy gradients collapse into one vector.
        let count = pair.context.sum();
        let ei = y * count - &pair.context;
        self.backprop(ei.view(), h.view(), pair.center.view());

        let sum_exp: f32 = u.mapv(exp_clamped).sum();
        -(&pair.context * &u).sum() + count * sum_exp.ln()
    }

    /// Applies the gradient-descent update for error signal `ei`, hidden
    /// activation `h`, and one-hot center word `x`. The `W1` gradient is
    /// nonzero only in the center word's row.
    fn backprop(&mut self, ei: ArrayView1<f32>, h: ArrayView1<f32>, x: ArrayView1<f32>) {
        let grad_w2 = outer(h, ei);
        let grad_w1 = outer(x, self.w2.dot(&ei).view());
        self.w1 -= &(self.learning_rate * grad_w1);
        self.w2 -= &(self.learning_rate * grad_w2);
    }

    /// Writes each weight matrix to its own file as an opaque serialized
    /// array. The round trip through [`SkipGramModel::load_weights`] is
    /// lossless.
    pub fn save_weights(&self, w1_path: &Path, w2_path: &Path) -> Result<()> {
        let file = BufWriter::new(File::create(w1_path)?);
        bincode::serialize_into(file, &self.w1)?;
        let file = BufWriter::new(File::create(w2_path)?);
        bincode::serialize_into(file, &self.w2)?;
        Ok(())
    }

    /// Replaces both weight matrices with previously saved ones. Shapes
    /// come from the files and are trusted to match the model they were
    /// saved from; a mismatch surfaces later as a dimension error in the
    /// matrix arithmetic, not here.
    pub fn load_weights(&mut self, w1_path: &Path, w2_path: &Path) -> Result<()> {
        let file = BufReader::new(File::open(w1_path)?);
        self.w1 = bincode::deserialize_from(file)?;
        let file = BufReader::new(File::open(w2_path)?);
        self.w2 = bincode::deserialize_from(file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::training_data;

    fn sample_pairs() -> Vec<TrainingPair> {
        let (_, pairs) = training_data("the cat sat on the mat", 2);
        pairs
    }

    #[test]
    fn test_softmax_is_a_distribution() {
        let model = SkipGramModel::new(5, 3, 0.01, Some(1));
        let mut x = Array1::zeros(5);
        x[2] = 1.0;
        let (y, _, _) = model.forward(x.view());
        assert_eq!(y.len(), 5);
        for &p in &y {
            assert!(p > 0.0 && p < 1.0, "probability out of range: {p}");
        }
        assert!((y.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_forward_shapes_and_embedding_lookup() {
        let model = SkipGramModel::new(6, 4, 0.01, Some(2));
        let mut x = Array1::zeros(6);
        x[3] = 1.0;
        let (y, h, u) = model.forward(x.view());
        assert_eq!(y.len(), 6);
        assert_eq!(h.len(), 4);
        assert_eq!(u.len(), 6);
        // A one-hot input selects the matching row of w1 exactly.
        assert_eq!(h, model.w1().row(3).to_owned());
    }

    #[test]
    fn test_rank_descending_orders_and_breaks_ties() {
        let y = ndarray::array![0.2f32, 0.5, 0.2, 0.1];
        let ranked = rank_descending(y.view(), 4);
        // The exact tie between indices 0 and 2 goes to the higher index.
        assert_eq!(ranked, vec![(1, 0.5), (2, 0.2), (0, 0.2), (3, 0.1)]);

        let top2 = rank_descending(y.view(), 2);
        assert_eq!(top2, vec![(1, 0.5), (2, 0.2)]);

        let all = rank_descending(y.view(), 10);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_fit_with_zero_pairs_is_a_noop() {
        let mut model = SkipGramModel::new(4, 2, 0.01, Some(3));
        let before = model.w1().to_owned();
        let history = model.fit(&[], 3);
        assert_eq!(history, vec![0.0, 0.0, 0.0]);
        assert_eq!(model.w1(), before.view());
    }

    #[test]
    fn test_training_is_deterministic_for_a_fixed_seed() {
        let pairs = sample_pairs();
        let mut a = SkipGramModel::new(5, 3, 0.01, Some(7));
        let mut b = SkipGramModel::new(5, 3, 0.01, Some(7));
        let la = a.fit(&pairs, 5);
        let lb = b.fit(&pairs, 5);
        assert_eq!(la, lb);
        assert_eq!(a.w1(), b.w1());
        assert_eq!(a.w2(), b.w2());
    }

    #[test]
    fn test_fit_resumes_instead_of_restarting() {
        // Two one-epoch calls must land exactly where one two-epoch call
        // does; a hidden re-initialization inside fit would break this.
        let pairs = sample_pairs();
        let mut once = SkipGramModel::new(5, 3, 0.01, Some(8));
        let mut twice = SkipGramModel::new(5, 3, 0.01, Some(8));
        once.fit(&pairs, 2);
        twice.fit(&pairs, 1);
        twice.fit(&pairs, 1);
        assert_eq!(once.w1(), twice.w1());
        assert_eq!(once.w2(), twice.w2());
    }

    #[test]
    fn test_reset_redraws_weights_deterministically() {
        let pairs = sample_pairs();
        let mut a = SkipGramModel::new(5, 3, 0.01, Some(9));
        let mut b = SkipGramModel::new(5, 3, 0.01, Some(9));
        a.fit(&pairs, 1);
        b.fit(&pairs, 1);
        let trained = a.w1().to_owned();
        a.reset();
        b.reset();
        assert_eq!(a.w1(), b.w1());
        assert_eq!(a.w2(), b.w2());
        assert_ne!(a.w1(), trained.view());
    }

    /// The pair loss as a pure function of the weights, in f64 so central
    /// differences are not drowned in single-precision rounding noise.
    fn pair_loss(
        w1: &Array2<f64>,
        w2: &Array2<f64>,
        center: &Array1<f64>,
        context: &Array1<f64>,
    ) -> f64 {
        let h = center.dot(w1);
        let u = h.dot(w2);
        -(context * &u).sum() + context.sum() * u.mapv(f64::exp).sum().ln()
    }

    fn err(claimed: f64, measured: f64) -> f64 {
        let d = measured.abs().max(0.01);
        (claimed - measured).abs() / d
    }

    #[test]
    fn test_training_step_matches_numerical_gradients() {
        let (_, pairs) = training_data("a b c a", 1);
        let pair = &pairs[1];
        let rate = 0.01;
        let mut model = SkipGramModel::new(3, 2, rate, Some(11));

        // Recover the gradients a real training step applied from the
        // weight deltas it left behind.
        let w1_before = model.w1.clone();
        let w2_before = model.w2.clone();
        model.train_pair(pair);
        let claimed_w1 = (&w1_before - &model.w1) / rate;
        let claimed_w2 = (&w2_before - &model.w2) / rate;

        let center = pair.center.mapv(f64::from);
        let context = pair.context.mapv(f64::from);
        let mut w1 = w1_before.mapv(f64::from);
        let mut w2 = w2_before.mapv(f64::from);

        let step = 1e-5;
        let error_limit = 0.01;

        for i in 0..w1.nrows() {
            for j in 0..w1.ncols() {
                let saved = w1[[i, j]];
                w1[[i, j]] = saved - step;
                let loss_minus = pair_loss(&w1, &w2, &center, &context);
                w1[[i, j]] = saved + step;
                let loss_plus = pair_loss(&w1, &w2, &center, &context);
                w1[[i, j]] = saved;

                let claimed = f64::from(claimed_w1[[i, j]]);
                let measured = (loss_plus - loss_minus) / (2.0 * step);
                let error = err(claimed, measured);
                assert!(
                    error <= error_limit,
                    "w1[{i},{j}] applied derivative = {claimed}, measured = {measured}, error = {error}"
                );
            }
        }

        for i in 0..w2.nrows() {
            for j in 0..w2.ncols() {
                let saved = w2[[i, j]];
                w2[[i, j]] = saved - step;
                let loss_minus = pair_loss(&w1, &w2, &center, &context);
                w2[[i, j]] = saved + step;
                let loss_plus = pair_loss(&w1, &w2, &center, &context);
                w2[[i, j]] = saved;

                let claimed = f64::from(claimed_w2[[i, j]]);
                let measured = (loss_plus - loss_minus) / (2.0 * step);
                let error = err(claimed, measured);
                assert!(
                    error <= error_limit,
                    "w2[{i},{j}] applied derivative = {claimed}, measured = {measured}, error = {error}"
                );
            }
        }
    }

    #[test]
    fn test_loss_is_zero_when_context_is_empty() {
        let (_, pairs) = training_data("solo", 2);
        let mut model = SkipGramModel::new(1, 1, 0.01, Some(4));
        let history = model.fit(&pairs, 2);
        assert_eq!(history, vec![0.0, 0.0]);
    }
}
