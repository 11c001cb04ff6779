use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use cadence_classify::ClassifierKind;
use cadence_domain::{JsonExporter, ReportExporter, ReportFormat, TextExporter};
use cadence_pipeline::{GenrePipeline, LoadFailurePolicy, PipelineConfig};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify audio tracks into genres", long_about = None)]
struct Cli {
    /// Pipeline configuration with the dataset manifest (YAML or JSON)
    #[arg(default_value = "config/genres.yaml")]
    config: PathBuf,
    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Run only these classifiers (kmeans, tree, knn); repeatable
    #[arg(short, long = "classifier")]
    classifiers: Vec<ClassifierKind>,
    /// Stop before extraction if any track fails to load
    #[arg(long)]
    abort_on_load_failure: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_path(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    if !cli.classifiers.is_empty() {
        config.classifiers.enabled = cli.classifiers;
    }
    if cli.abort_on_load_failure {
        config.on_load_failure = LoadFailurePolicy::Abort;
    }

    let pipeline = GenrePipeline::new(config)?;
    let report = pipeline.run()?;

    let bytes = match cli.format {
        OutputFormat::Text => TextExporter.export(&report, ReportFormat::Text)?,
        OutputFormat::Json => JsonExporter.export(&report, ReportFormat::Json)?,
    };
    match &cli.output {
        Some(path) => {
            fs::write(path, &bytes)
                .with_context(|| format!("writing report {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => std::io::stdout().write_all(&bytes)?,
    }
    Ok(())
}
