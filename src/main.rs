//! Command-line interface for training, querying, and exporting skip-gram
//! word vectors.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use log::{debug, error, info};

use skipgram::{ModelConfig, SkipGram, SkipGramError};

#[derive(Parser)]
#[command(name = "skipgram")]
#[command(version)]
#[command(about = "Skip-gram word vector trainer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on a text corpus and save its weight matrices
    Train {
        /// Input corpus file, arbitrary raw text
        #[arg(short, long)]
        input: PathBuf,

        /// Window radius: how many context words on each side of a center word
        #[arg(short, long, default_value = "4")]
        window: usize,

        /// Embedding dimensionality
        #[arg(long, default_value = "10")]
        hidden: usize,

        /// Number of training epochs
        #[arg(short = 'n', long, default_value = "700")]
        epochs: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.01")]
        rate: f32,

        /// Random seed for reproducible weight initialization
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output file for the projection matrix
        #[arg(long, default_value = "w1.bin")]
        w1: PathBuf,

        /// Output file for the output matrix
        #[arg(long, default_value = "w2.bin")]
        w2: PathBuf,
    },

    /// Load saved weights and query likely context words interactively
    Query {
        /// The corpus the model was trained on, used to rebuild the vocabulary
        #[arg(short, long)]
        input: PathBuf,

        /// Window radius used in training; also the number of predictions shown
        #[arg(short, long, default_value = "4")]
        window: usize,

        /// Saved projection matrix
        #[arg(long, default_value = "w1.bin")]
        w1: PathBuf,

        /// Saved output matrix
        #[arg(long, default_value = "w2.bin")]
        w2: PathBuf,
    },

    /// Dump embedding rows as text for external projection and plotting
    Export {
        /// The corpus the model was trained on, used to rebuild the vocabulary
        #[arg(short, long)]
        input: PathBuf,

        /// Saved projection matrix
        #[arg(long, default_value = "w1.bin")]
        w1: PathBuf,

        /// Saved output matrix
        #[arg(long, default_value = "w2.bin")]
        w2: PathBuf,

        /// Output embeddings file
        #[arg(short, long, default_value = "vectors.txt")]
        output: PathBuf,

        /// Write vector values as raw little-endian f32 instead of text
        #[arg(short, long)]
        binary: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let result = match cli.command {
        Commands::Train {
            input,
            window,
            hidden,
            epochs,
            rate,
            seed,
            w1,
            w2,
        } => {
            let config = ModelConfig {
                hidden_size: Some(hidden),
                learning_rate: rate,
                seed,
            };
            train(input, window, epochs, config, w1, w2)
        }

        Commands::Query {
            input,
            window,
            w1,
            w2,
        } => query(input, window, w1, w2),

        Commands::Export {
            input,
            w1,
            w2,
            output,
            binary,
        } => export(input, w1, w2, output, binary),
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn load_corpus(input: &Path, window: usize, config: &ModelConfig) -> Result<SkipGram> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.set_message("Building training pairs...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let sg = SkipGram::from_file(input, window, config)
        .with_context(|| format!("error reading corpus {}", input.display()))?;

    spinner.finish_and_clear();
    Ok(sg)
}

fn train(
    input: PathBuf,
    window: usize,
    epochs: usize,
    config: ModelConfig,
    w1: PathBuf,
    w2: PathBuf,
) -> Result<()> {
    let mut sg = load_corpus(&input, window, &config)?;
    info!(
        "vocabulary: {} words, {} training pairs",
        sg.vocab().len(),
        sg.num_pairs()
    );
    debug!(
        "words in index order: {:?}",
        sg.vocab().words().collect::<Vec<_>>()
    );

    let start = Instant::now();
    let history = sg.train(epochs);
    if let Some(final_loss) = history.last() {
        info!(
            "training complete in {}, final loss {final_loss}",
            HumanDuration(start.elapsed())
        );
    }

    sg.save_weights(&w1, &w2).context("error saving weights")?;
    info!("weights saved to {} and {}", w1.display(), w2.display());
    Ok(())
}

fn query(input: PathBuf, window: usize, w1: PathBuf, w2: PathBuf) -> Result<()> {
    let mut sg = load_corpus(&input, window, &ModelConfig::default())?;
    sg.load_weights(&w1, &w2).context("error loading weights")?;
    info!("{} words in vocabulary", sg.vocab().len());

    let mut line = String::new();
    loop {
        print!("Enter word (EXIT to break): ");
        let _ = io::stdout().flush();

        line.clear();
        match io::stdin().read_line(&mut line) {
            Err(err) => {
                eprintln!("error reading stdin: {err}");
                break;
            }
            Ok(0) => break,
            Ok(_) => {}
        }
        let word = line.trim();
        if word == "EXIT" {
            break;
        }

        match sg.predict(word) {
            Ok(predictions) => {
                for (context_word, probability) in predictions {
                    println!("{probability:>12.6}  {context_word}");
                }
            }
            Err(SkipGramError::WordNotFound(_)) => println!("Out of dictionary word!"),
            // Anything else: keep the prompt alive.
            Err(_) => {}
        }
    }
    Ok(())
}

fn export(input: PathBuf, w1: PathBuf, w2: PathBuf, output: PathBuf, binary: bool) -> Result<()> {
    // The window radius only shapes training pairs, which export never uses.
    let mut sg = load_corpus(&input, 1, &ModelConfig::default())?;
    sg.load_weights(&w1, &w2).context("error loading weights")?;

    let file = File::create(&output)
        .with_context(|| format!("error creating output file {}", output.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{} {}", sg.vocab().len(), sg.model().hidden_size())?;
    for (word, row) in sg.embeddings() {
        write!(out, "{word}")?;
        if binary {
            out.write_all(b" ")?;
            let values: Vec<f32> = row.iter().copied().collect();
            out.write_all(bytemuck::cast_slice(&values))?;
        } else {
            for v in row {
                write!(out, " {v}")?;
            }
        }
        writeln!(out)?;
    }

    info!(
        "wrote {} embedding rows to {}",
        sg.vocab().len(),
        output.display()
    );
    Ok(())
}
