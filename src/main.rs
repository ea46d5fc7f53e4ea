use anyhow::{Context, Result};
use bug_triage::{
    config::Config,
    ml::{ModelArtifact, ModelType, TextClassifier, Trainer, TrainingDataset},
    models::BugTable,
    pipeline::TriagePipeline,
    storage::{CsvTableStore, TableStore},
    telemetry,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bug-triage")]
#[command(about = "Assign bug reports to teams with keyword rules and a trained fallback model", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $BUG_TRIAGE_CONFIG or config/bug-triage.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, ignored when RUST_LOG is set
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign a team to every row of a CSV file
    Triage {
        /// Input CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV (written atomically)
        #[arg(short, long)]
        output: PathBuf,

        /// Model artifact used for rule-unmatched rows
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Leave rule-unmatched rows unassigned instead of asking the model
        #[arg(long)]
        no_ml: bool,

        /// Description column name
        #[arg(long)]
        description_field: Option<String>,

        /// Assignment column name
        #[arg(long)]
        output_field: Option<String>,
    },

    /// Classify descriptions given on the command line
    Classify {
        /// One or more bug descriptions
        #[arg(required = true)]
        descriptions: Vec<String>,

        /// Model artifact used when no rule matches
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Rules only
        #[arg(long)]
        no_ml: bool,
    },

    /// Train the fallback model from a labelled CSV
    Train {
        /// Labelled CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the model artifact
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        model_type: Option<ModelKind>,

        /// Fraction of rows held out for validation
        #[arg(long)]
        test_size: Option<f64>,

        /// Text column name
        #[arg(long)]
        text_field: Option<String>,

        /// Label column name
        #[arg(long)]
        label_field: Option<String>,
    },

    /// Score a model artifact against a labelled CSV
    Evaluate {
        /// Labelled CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Model artifact
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Text column name
        #[arg(long)]
        text_field: Option<String>,

        /// Label column name
        #[arg(long)]
        label_field: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelKind {
    LogisticRegression,
    DecisionTree,
}

impl From<ModelKind> for ModelType {
    fn from(kind: ModelKind) -> Self {
        match kind {
            ModelKind::LogisticRegression => ModelType::LogisticRegression,
            ModelKind::DecisionTree => ModelType::DecisionTree,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if cli.json_logs {
        config.observability.json_logs = true;
    }

    telemetry::init_tracing(&config.observability);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting bug-triage");

    match cli.command {
        Commands::Triage {
            input,
            output,
            model,
            no_ml,
            description_field,
            output_field,
        } => {
            if let Some(field) = description_field {
                config.triage.description_field = field;
            }
            if let Some(field) = output_field {
                config.triage.output_field = field;
            }
            if no_ml {
                config.triage.enable_ml_fallback = false;
            }
            if let Some(path) = model {
                config.model.artifact_path = path;
            }
            config.check()?;

            let pipeline = build_pipeline(&config);
            let store = CsvTableStore::new().with_delimiter(config.triage.delimiter_byte());
            let report = pipeline
                .triage_file(&store, &input, &output)
                .with_context(|| format!("Failed to triage {}", input.display()))?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Classify {
            descriptions,
            model,
            no_ml,
        } => {
            if no_ml {
                config.triage.enable_ml_fallback = false;
            }
            if let Some(path) = model {
                config.model.artifact_path = path;
            }

            let pipeline = build_pipeline(&config);
            let results = pipeline
                .classify_batch(&descriptions)
                .context("Failed to classify descriptions")?;
            for result in results {
                println!("{}\t{}\t{}", result.label, result.source, result.description);
            }
        }

        Commands::Train {
            input,
            output,
            model_type,
            test_size,
            text_field,
            label_field,
        } => {
            if let Some(kind) = model_type {
                config.model.model_type = kind.into();
            }
            if let Some(size) = test_size {
                config.model.test_size = size;
            }
            if let Some(field) = text_field {
                config.model.train_text_field = field;
            }
            if let Some(field) = label_field {
                config.model.train_label_field = field;
            }
            if let Some(path) = output {
                config.model.artifact_path = path;
            }
            config.check()?;

            let dataset = read_dataset(&config, &input)?;
            let artifact = Trainer::new(config.training_options())
                .fit(&dataset)
                .context("Training failed")?;
            artifact
                .save(&config.model.artifact_path)
                .with_context(|| {
                    format!(
                        "Failed to save model to {}",
                        config.model.artifact_path.display()
                    )
                })?;

            println!("{}", serde_json::to_string_pretty(&artifact.metadata)?);
        }

        Commands::Evaluate {
            input,
            model,
            text_field,
            label_field,
        } => {
            if let Some(path) = model {
                config.model.artifact_path = path;
            }
            if let Some(field) = text_field {
                config.model.train_text_field = field;
            }
            if let Some(field) = label_field {
                config.model.train_label_field = field;
            }

            let artifact = ModelArtifact::load(&config.model.artifact_path)?;
            let dataset = read_dataset(&config, &input)?;
            let metrics = artifact.evaluate(&dataset)?;

            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }

    Ok(())
}

/// Pipeline from configuration. A model that fails to load only matters
/// if some row reaches the fallback, so the failure is logged here and
/// surfaces from the pipeline when it does.
fn build_pipeline(config: &Config) -> TriagePipeline {
    let pipeline = TriagePipeline::new(config.triage_settings());
    if !config.triage.enable_ml_fallback {
        return pipeline;
    }
    match load_fallback(&config.model.artifact_path) {
        Some(classifier) => pipeline.with_fallback(classifier),
        None => pipeline,
    }
}

fn load_fallback(path: &Path) -> Option<Arc<dyn TextClassifier>> {
    match ModelArtifact::load(path) {
        Ok(artifact) => Some(Arc::new(artifact)),
        Err(e) => {
            tracing::warn!(error = %e, "Model fallback unavailable");
            None
        }
    }
}

fn read_dataset(config: &Config, input: &Path) -> Result<TrainingDataset> {
    let store = CsvTableStore::new().with_delimiter(config.triage.delimiter_byte());
    let table: BugTable = store
        .read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let dataset = TrainingDataset::from_table(
        &table,
        &config.model.train_text_field,
        &config.model.train_label_field,
    )?;
    Ok(dataset)
}
