/*!
chartbook Command Line Interface

Provides commands for inspecting datasets and resolving dataset references in
chart specifications.
*/

use anyhow::{bail, Context};
use chartbook::detect;
use chartbook::fetch::HttpFetcher;
use chartbook::{
    naming, reference, validate, Dataset, EngineConfig, Fetcher, VisualizationSpec, VERSION,
};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chartbook")]
#[command(about = "Chart snippets with shared, named datasets")]
#[command(version = VERSION)]
pub struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the format and column types of a data file or URL
    Detect {
        /// Path to a data file, or an http(s) URL
        source: String,
    },

    /// List the dataset names a spec references
    Refs {
        /// Path to a spec (.json)
        spec: PathBuf,
    },

    /// Replace dataset references with data loaded from files
    Resolve {
        /// Path to a spec (.json)
        spec: PathBuf,

        /// Dataset as name=path-or-url (repeatable)
        #[arg(long = "dataset", value_name = "NAME=SOURCE")]
        datasets: Vec<String>,
    },

    /// Rewrite every reference to a dataset name
    Rename {
        /// Path to a spec (.json)
        spec: PathBuf,

        /// Current dataset name
        #[arg(long)]
        from: String,

        /// New dataset name
        #[arg(long)]
        to: String,
    },

    /// Check that references resolve and inline data is extractable
    Validate {
        /// Path to a spec (.json)
        spec: PathBuf,

        /// Dataset as name=path-or-url (repeatable)
        #[arg(long = "dataset", value_name = "NAME=SOURCE")]
        datasets: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CHARTBOOK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let fetcher = HttpFetcher::new(config.fetch_timeout())?;

    match cli.command {
        Commands::Detect { source } => {
            let dataset = load_dataset("detected", &source, &fetcher).await?;
            let report = serde_json::json!({
                "format": dataset.format(),
                "source": dataset.source(),
                "metadata": dataset.metadata(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Refs { spec } => {
            let spec = read_spec(&spec)?;
            for name in reference::extract_references(&spec) {
                println!("{}", name);
            }
        }

        Commands::Resolve { spec, datasets } => {
            let spec = read_spec(&spec)?;
            let loaded = load_datasets(&datasets, &fetcher).await?;
            let resolved = reference::resolve_for_render(&spec, |name| loaded.get(name).cloned())?;
            println!("{}", resolved.to_json_pretty()?);
        }

        Commands::Rename { spec, from, to } => {
            naming::validate_dataset_name(&to)?;
            let spec = read_spec(&spec)?;
            let rewritten = reference::rewrite_name_everywhere(&spec, &from, &to);
            println!("{}", rewritten.to_json_pretty()?);
        }

        Commands::Validate { spec, datasets } => {
            let spec = read_spec(&spec)?;
            let loaded = load_datasets(&datasets, &fetcher).await?;
            let known: Vec<&str> = loaded.keys().map(String::as_str).collect();
            let validated = validate::validate(&spec, &known);

            for error in validated.errors() {
                eprintln!("error: {}", error.message);
            }
            for warning in validated.warnings() {
                eprintln!("warning: {}", warning.message);
            }
            if !validated.valid() {
                std::process::exit(1);
            }
            println!("ok");
        }
    }

    Ok(())
}

fn read_spec(path: &Path) -> anyhow::Result<VisualizationSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Reading {}", path.display()))?;
    VisualizationSpec::from_json(&text).with_context(|| format!("Parsing {}", path.display()))
}

/// Load a dataset from a file, or from a URL with remote detection
async fn load_dataset(name: &str, source: &str, fetcher: &HttpFetcher) -> anyhow::Result<Dataset> {
    if detect::is_likely_url(source) {
        let url = source.trim();
        let body = fetcher.fetch(url).await?;
        let mut dataset = Dataset::from_detection(name, detect::classify_remote(url, &body))?;

        // The body is already here, so statistics need no second fetch
        if let Some(metadata) = detect::compute_content_stats(&body, dataset.format()) {
            dataset.set_metadata(metadata);
        }
        return Ok(dataset);
    }

    let text = std::fs::read_to_string(source).with_context(|| format!("Reading {}", source))?;
    Dataset::from_detection(name, detect::detect_format(&text))
        .with_context(|| format!("Loading {}", source))
}

async fn load_datasets(
    specs: &[String],
    fetcher: &HttpFetcher,
) -> anyhow::Result<HashMap<String, Dataset>> {
    let mut loaded = HashMap::new();
    for spec in specs {
        let Some((name, source)) = spec.split_once('=') else {
            bail!("Expected NAME=SOURCE, got '{}'", spec);
        };
        let dataset = load_dataset(name, source, fetcher).await?;
        loaded.insert(name.to_string(), dataset);
    }
    Ok(loaded)
}
