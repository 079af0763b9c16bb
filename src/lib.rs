mod error;
pub use error::{Result, SkipGramError};

mod tokenizer;
pub use tokenizer::{tokenize, training_data, TrainingPair, Vocabulary};

mod model;
pub use model::SkipGramModel;

mod skipgram;
pub use skipgram::{ModelConfig, SkipGram};
