//! Speakleash: a read-side client for the SpeakLeash text datasets.
//!
//! A [`Speakleash`] instance fetches the dataset catalog of one language,
//! replicates dataset archives into a local directory on demand, and streams
//! their documents lazily, one JSON line at a time.
//!
//! ```no_run
//! use speakleash::Speakleash;
//!
//! let sl = Speakleash::new("datasets", "pl")?;
//! let plwiki = sl.get("plwiki")?;
//! println!("{} documents", plwiki.documents());
//! for text in plwiki.data()? {
//!     println!("{}", text.len());
//! }
//! # Ok::<(), speakleash::SpeakleashError>(())
//! ```
//!
//! # Modules
//!
//! - [`manifest`]: Catalog fetch and dataset descriptors
//! - [`replicate`]: Local archive cache with atomic downloads
//! - [`reader`]: Lazy record decoding
//! - [`dataset`]: Per-dataset handles
//! - [`client`]: The [`Speakleash`] facade
//! - [`categories`]: Category lists and metadata matching
//! - [`sample`]: Random document sampling
//! - [`config`], [`transport`], [`error`]: Ambient plumbing

pub mod categories;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod manifest;
pub mod reader;
pub mod replicate;
pub mod sample;
pub mod transport;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub use client::{Speakleash, SpeakleashOptions};
pub use config::Config;
pub use dataset::DatasetHandle;
pub use error::SpeakleashError;
pub use manifest::{DatasetDescriptor, Manifest};
pub use reader::{
    DecodeMode, DecodeWarning, DocumentRecord, Documents, ExtDocuments, Metadata, StreamSummary,
};

use categories::CategoryCatalog;

/// The speakleash CLI application.
#[derive(Parser)]
#[command(name = "speakleash")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory datasets are replicated into.
    #[arg(long, global = true, env = "SPEAKLEASH_DIR", default_value = "datasets")]
    dir: PathBuf,

    /// Catalog language code.
    #[arg(long, global = true, env = "SPEAKLEASH_LANG", default_value = config::DEFAULT_LANG)]
    lang: String,

    /// JSON config file overriding the built-in sources.
    #[arg(long, global = true, env = "SPEAKLEASH_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL for the selected language (e.g. a file:// mirror).
    #[arg(long, global = true, env = "SPEAKLEASH_BASE_URL")]
    base_url: Option<String>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List the datasets of the catalog.
    List(ListArgs),
    /// Show catalog details of one dataset.
    Info(InfoArgs),
    /// Download datasets into the local directory.
    Replicate(ReplicateArgs),
    /// Stream documents as JSON lines to stdout.
    Stream(StreamArgs),
    /// Draw random documents from a dataset.
    Sample(SampleArgs),
    /// Print the sample documents published for a dataset.
    Samples(NameArgs),
    /// Delete a dataset's local archive.
    Remove(NameArgs),
}

#[derive(clap::Args)]
struct ListArgs {
    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

#[derive(clap::Args)]
struct InfoArgs {
    /// Dataset name.
    name: String,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

#[derive(clap::Args)]
struct NameArgs {
    /// Dataset name.
    name: String,
}

#[derive(clap::Args)]
struct ReplicateArgs {
    /// Dataset names; all datasets when omitted.
    names: Vec<String>,
}

#[derive(clap::Args)]
struct StreamArgs {
    /// Dataset name.
    name: String,

    /// Include document metadata.
    #[arg(long)]
    meta: bool,

    /// Stop after this many documents.
    #[arg(long)]
    limit: Option<usize>,

    /// Fail on the first malformed record instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// Keep only documents in these categories (repeatable).
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Minimum classifier confidence for --category.
    #[arg(long, default_value_t = 0.95)]
    min_confidence: f64,

    /// Language of the --category names ('pl' or 'en').
    #[arg(long, default_value = "pl")]
    category_lang: String,
}

#[derive(clap::Args)]
struct SampleArgs {
    /// Dataset name.
    name: String,

    /// Number of documents to draw.
    #[arg(short = 'n', default_value_t = 5)]
    n: usize,

    /// Seed for reproducible draws.
    #[arg(long)]
    seed: Option<u64>,
}

/// Run the speakleash CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), SpeakleashError> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let Some(command) = cli.command.as_ref() else {
        println!("speakleash {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Client for the SpeakLeash text datasets.");
        println!();
        println!("Run 'speakleash --help' for usage information.");
        return Ok(());
    };

    let sl = open(&cli)?;
    match command {
        Commands::List(args) => run_list(&sl, args),
        Commands::Info(args) => run_info(&sl, args),
        Commands::Replicate(args) => run_replicate(&sl, args),
        Commands::Stream(args) => run_stream(&sl, args),
        Commands::Sample(args) => run_sample(&sl, args),
        Commands::Samples(args) => run_samples(&sl, args),
        Commands::Remove(args) => run_remove(&sl, args),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn open(cli: &Cli) -> Result<Speakleash, SpeakleashError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(&cli.lang, base_url.clone());
    }

    Speakleash::with_options(
        &cli.dir,
        SpeakleashOptions::default()
            .with_lang(cli.lang.clone())
            .with_config(config),
    )
}

fn run_list(sl: &Speakleash, args: &ListArgs) -> Result<(), SpeakleashError> {
    if args.output == "json" {
        let rows: Vec<_> = sl
            .datasets()
            .iter()
            .map(|d| {
                json!({
                    "name": d.name(),
                    "documents": d.documents(),
                    "characters": d.characters(),
                    "file_size": d.descriptor().file_size,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(rows));
        return Ok(());
    }

    let width = sl
        .datasets()
        .iter()
        .map(|d| d.name().len())
        .max()
        .unwrap_or(4)
        .max(4);
    println!(
        "{:<width$}  {:>12}  {:>15}  {:>14}",
        "NAME", "DOCUMENTS", "CHARACTERS", "SIZE (BYTES)"
    );
    for d in sl.datasets() {
        println!(
            "{:<width$}  {:>12}  {:>15}  {:>14}",
            d.name(),
            d.documents(),
            d.characters(),
            d.descriptor().file_size
        );
    }
    println!();
    println!("{} dataset(s) for language '{}'", sl.datasets().len(), sl.lang());
    Ok(())
}

fn run_info(sl: &Speakleash, args: &InfoArgs) -> Result<(), SpeakleashError> {
    let dataset = sl.get(&args.name)?;
    let d = dataset.descriptor();

    if args.output == "json" {
        let text = serde_json::to_string_pretty(dataset.manifest()).map_err(io::Error::other)?;
        println!("{text}");
        return Ok(());
    }

    println!("{dataset}");
    println!("  documents:    {}", d.documents);
    println!("  characters:   {}", d.characters);
    println!("  sentences:    {}", d.sentences());
    println!("  words:        {}", d.words());
    println!("  nouns:        {}", d.nouns());
    println!("  verbs:        {}", d.verbs());
    println!("  stopwords:    {}", d.stopwords());
    println!("  symbols:      {}", d.symbols());
    println!("  punctuations: {}", d.punctuations());
    println!("  file size:    {}", d.file_size);
    println!("  archive:      {}", d.url);
    println!("  replicated:   {}", dataset.is_replicated()?);
    if let Some(level) = d.quality_metrics() {
        println!("  quality:      {level}");
    }
    if !d.category().is_empty() {
        println!("  category:     {}", d.category());
    }
    if d.categorization() {
        let names: Vec<String> = d.categories().into_keys().collect();
        println!("  categories:   {}", names.join(", "));
    }
    if !d.license().is_empty() {
        println!("  license:      {}", d.license());
    }
    if !d.description().is_empty() {
        println!("  description:  {}", d.description());
    }
    Ok(())
}

fn run_replicate(sl: &Speakleash, args: &ReplicateArgs) -> Result<(), SpeakleashError> {
    let targets: Vec<&DatasetHandle> = if args.names.is_empty() {
        sl.datasets().iter().collect()
    } else {
        args.names
            .iter()
            .map(|name| sl.get(name))
            .collect::<Result<_, _>>()?
    };

    for dataset in targets {
        let path = dataset.local_path()?;
        println!("{}: {}", dataset.name(), path.display());
    }
    Ok(())
}

fn run_stream(sl: &Speakleash, args: &StreamArgs) -> Result<(), SpeakleashError> {
    let dataset = sl.get(&args.name)?;
    let mode = if args.strict {
        DecodeMode::Strict
    } else {
        DecodeMode::Lenient
    };

    let catalog = if !args.categories.is_empty() && !args.category_lang.eq_ignore_ascii_case("pl") {
        CategoryCatalog::fetch(sl.transport().as_ref(), sl.config())?
    } else {
        CategoryCatalog::default()
    };

    let mut records = dataset.records_with_mode(mode)?;
    let mut out = BufWriter::new(io::stdout().lock());
    let mut written = 0usize;

    while args.limit.is_none_or(|limit| written < limit) {
        let Some(record) = records.next() else {
            break;
        };
        if !args.categories.is_empty()
            && !catalog.matches(
                &record.meta,
                &args.categories,
                args.min_confidence,
                &args.category_lang,
            )
        {
            continue;
        }

        let line = if args.meta {
            json!({"text": record.text, "meta": record.meta})
        } else {
            json!({"text": record.text})
        };
        writeln!(out, "{line}")?;
        written += 1;
    }
    out.flush()?;

    let summary = records.finish()?;
    eprintln!("{summary}");
    Ok(())
}

fn run_sample(sl: &Speakleash, args: &SampleArgs) -> Result<(), SpeakleashError> {
    let dataset = sl.get(&args.name)?;
    let mut documents = dataset.data()?;
    let picked = sample::sample_documents(documents.by_ref(), args.n, args.seed)?;
    documents.finish()?;

    for text in picked {
        println!("{}", json!({ "text": text }));
    }
    Ok(())
}

fn run_samples(sl: &Speakleash, args: &NameArgs) -> Result<(), SpeakleashError> {
    let dataset = sl.get(&args.name)?;
    for text in dataset.samples()? {
        println!("{}", json!({ "text": text }));
    }
    Ok(())
}

fn run_remove(sl: &Speakleash, args: &NameArgs) -> Result<(), SpeakleashError> {
    let dataset = sl.get(&args.name)?;
    if dataset.evict()? {
        println!("Removed local archive of '{}'", dataset.name());
    } else {
        println!("No local archive of '{}'", dataset.name());
    }
    Ok(())
}
