//! TurtleShell command-line interface.
//!
//! Runs single cycles from word-pair files, whole trajectories from a gold
//! corpus, and inference with a committed model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use turtleshell_core::crf::CrfTrainer;
use turtleshell_core::selection::{ResidualPolicy, SelectionStrategy, TieBreak};
use turtleshell_trainer::bootstrap::{partition, BootstrapPlan, Splits};
use turtleshell_trainer::config::CycleConfig;
use turtleshell_trainer::cycle::{
    run_cycle, run_trajectory, segment, Annotator, GoldAnnotator, PredictionAnnotator,
};
use turtleshell_trainer::data::{load_optional_tgt_file, load_src_file, load_tgt_file};
use turtleshell_trainer::store::{CycleKey, CycleStore, FsStore, SqliteStore};

/// Default store directory
fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turtleshell")
}

#[derive(Parser)]
#[command(name = "turtleshell")]
#[command(about = "Active-learning morphological segmentation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory of the filesystem cycle store
    #[arg(short = 'D', long, env = "TURTLESHELL_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Keep cycles in this SQLite database instead of the store directory
    #[arg(long, env = "TURTLESHELL_SQLITE")]
    sqlite: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle and commit it
    Cycle {
        /// Training set (.tgt)
        #[arg(long)]
        train: PathBuf,
        /// Test set (.tgt)
        #[arg(long)]
        test: PathBuf,
        /// Unlabeled pool (.tgt); a missing file means an empty pool
        #[arg(long)]
        pool: Option<PathBuf>,
        /// Accept model predictions for the increment instead of pool segmentations
        #[arg(long)]
        accept_predictions: bool,
        #[command(flatten)]
        overrides: ConfigArgs,
    },
    /// Bootstrap a gold corpus and run trajectories for several seeds
    Run {
        /// Gold corpus (.tgt)
        #[arg(long)]
        corpus: PathBuf,
        /// Trajectory seeds
        #[arg(long, value_delimiter = ',', default_value = "0")]
        seeds: Vec<u64>,
        /// Share of the corpus held out for testing
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
        /// Words in the initial training set
        #[arg(long, default_value_t = 100)]
        initial_size: usize,
        /// Stop each trajectory after this many cycles
        #[arg(long)]
        max_cycles: Option<usize>,
        #[command(flatten)]
        overrides: ConfigArgs,
    },
    /// Segment words with the model of a committed cycle
    Segment {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 0)]
        select_size: usize,
        /// Words file (.src); read instead of the positional words
        #[arg(short, long)]
        input: Option<PathBuf>,
        words: Vec<String>,
    },
    /// List committed cycles with their test metrics
    Status,
}

/// Settings that override the configuration file.
#[derive(Args)]
struct ConfigArgs {
    /// Cycle configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    select_size: Option<usize>,
    #[arg(long)]
    increment_size: Option<usize>,
    /// Feature context window radius
    #[arg(long)]
    delta: Option<usize>,
    #[arg(long)]
    max_iterations: Option<usize>,
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,
    /// Shuffle the pool before ranking so ties fall in random order
    #[arg(long)]
    shuffle_ties: bool,
    /// Allow the increment to take the whole pool
    #[arg(long)]
    exhaust_pool: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    LeastConfidence,
    Random,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<CycleConfig> {
        let mut config = match &self.config {
            Some(path) => CycleConfig::from_json_file(path)?,
            None => CycleConfig::new(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(select_size) = self.select_size {
            config.select_size = select_size;
        }
        if let Some(increment_size) = self.increment_size {
            config.increment_size = increment_size;
        }
        if let Some(delta) = self.delta {
            config.delta = delta;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = match strategy {
                Strategy::LeastConfidence => SelectionStrategy::LeastConfidence,
                Strategy::Random => SelectionStrategy::Random,
            };
        }
        if self.shuffle_ties {
            config.tie_break = TieBreak::Shuffled;
        }
        if self.exhaust_pool {
            config.residual_policy = ResidualPolicy::Exhaust;
        }
        config.validate()?;
        Ok(config)
    }
}

fn open_store(cli: &Cli) -> Result<Arc<dyn CycleStore>> {
    if let Some(path) = &cli.sqlite {
        info!(path = %path.display(), "using sqlite store");
        return Ok(Arc::new(SqliteStore::open(path)?));
    }
    let dir = cli.store_dir.clone().unwrap_or_else(default_store_dir);
    info!(dir = %dir.display(), "using filesystem store");
    Ok(Arc::new(FsStore::open(dir)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli)?;

    match cli.command {
        Commands::Cycle {
            train,
            test,
            pool,
            accept_predictions,
            overrides,
        } => {
            let config = overrides.resolve()?;
            let splits = Splits::new(
                load_tgt_file(&train)?,
                load_tgt_file(&test)?,
                match pool {
                    Some(path) => load_optional_tgt_file(path)?,
                    None => Default::default(),
                },
            );
            let annotator: &dyn Annotator = if accept_predictions {
                &PredictionAnnotator
            } else {
                &GoldAnnotator
            };
            let artifacts = run_cycle(&config.trainer(), store.as_ref(), &splits, &config, annotator)?;
            print!("{}", artifacts.evaluation.summary());
            println!(
                "Increment: {}  Residual: {}",
                artifacts.increment.len(),
                artifacts.residual.len()
            );
        }
        Commands::Run {
            corpus,
            seeds,
            test_fraction,
            initial_size,
            max_cycles,
            overrides,
        } => {
            let config = overrides.resolve()?;
            let plan = BootstrapPlan {
                test_fraction,
                initial_size,
            };
            run_seeds(store, &corpus, plan, config, seeds, max_cycles).await?;
        }
        Commands::Segment {
            seed,
            select_size,
            input,
            words,
        } => {
            let words = match input {
                Some(path) => load_src_file(&path)?
                    .words()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                None => words,
            };
            let key = CycleKey::new(seed, select_size);
            for segmentation in segment(&CrfTrainer::new(), store.as_ref(), key, &words)? {
                println!("{}", segmentation.segmented());
            }
        }
        Commands::Status => {
            let keys = store.keys()?;
            if keys.is_empty() {
                println!("No committed cycles");
            }
            for key in keys {
                if let Some(artifacts) = store.load(key)? {
                    let eval = &artifacts.evaluation;
                    println!(
                        "{key}\ttrain={}\tresidual={}\tP={:.4}\tR={:.4}\tF1={:.4}",
                        artifacts.train.len(),
                        artifacts.residual.len(),
                        eval.precision,
                        eval.recall,
                        eval.f1
                    );
                }
            }
        }
    }

    Ok(())
}

/// Runs one trajectory per seed, each on a blocking worker.
async fn run_seeds(
    store: Arc<dyn CycleStore>,
    corpus: &Path,
    plan: BootstrapPlan,
    config: CycleConfig,
    seeds: Vec<u64>,
    max_cycles: Option<usize>,
) -> Result<()> {
    let corpus = Arc::new(load_tgt_file(corpus)?);
    info!(words = corpus.len(), seeds = seeds.len(), "starting trajectories");

    let handles: Vec<_> = seeds
        .into_iter()
        .map(|seed| {
            let store = Arc::clone(&store);
            let corpus = Arc::clone(&corpus);
            let config = config.clone().with_seed(seed);
            tokio::task::spawn_blocking(move || -> Result<(u64, usize)> {
                let splits = partition(&corpus, plan, seed)?;
                let cycles =
                    run_trajectory(store.as_ref(), &splits, &config, &GoldAnnotator, max_cycles)?;
                Ok((seed, cycles.len()))
            })
        })
        .collect();

    let mut failed = 0;
    for handle in handles {
        match handle.await.context("trajectory worker panicked")? {
            Ok((seed, cycles)) => info!(seed, cycles, "trajectory finished"),
            Err(e) => {
                error!(error = %e, "trajectory failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} trajectories failed");
    }
    Ok(())
}
