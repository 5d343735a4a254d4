//! Release Query CLI
//!
//! Loads release files from a URL or local files and prints the releases
//! matching the given filters.

use std::path::PathBuf;

use clap::Parser;
use glrd::fields::resolve_fields;
use glrd::render::render;
use glrd::{
    Clock, FileFormat, GlrdConfig, GlrdError, InputType, OutputFormat, Query, ReleaseStore,
    ReleaseType, RenderOptions, Source, SystemClock, Version,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glrd")]
#[command(about = "Query the Garden Linux release database")]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(long)]
    config: Option<String>,

    /// Input format: json or yaml
    #[arg(long)]
    input_format: Option<FileFormat>,

    /// Prefix of the input files
    #[arg(long)]
    input_file_prefix: Option<String>,

    /// Read input from local files or a URL
    #[arg(long)]
    input_type: Option<InputType>,

    /// Base URL of the release files
    #[arg(long)]
    input_url: Option<String>,

    /// Read a single {prefix}.{format} file instead of one file per release family
    #[arg(long)]
    no_input_split: bool,

    /// Output format: json, yaml, markdown, mermaid_gantt, shell
    #[arg(long)]
    output_format: Option<OutputFormat>,

    /// Title for outputs that carry one (mermaid_gantt)
    #[arg(long)]
    output_description: Option<String>,

    /// Show only active releases
    #[arg(long, conflicts_with = "archived")]
    active: bool,

    /// Show only archived releases
    #[arg(long)]
    archived: bool,

    /// Show only the latest active release
    #[arg(long)]
    latest: bool,

    /// Release types, comma separated (stable,patch,nightly,dev,next)
    #[arg(long = "type")]
    release_type: Option<String>,

    /// Version prefix, e.g. 1312 or 1312.0
    #[arg(long)]
    version: Option<String>,

    /// Comma separated output fields for shell and markdown output
    #[arg(long)]
    fields: Option<String>,

    /// Omit the table header
    #[arg(long)]
    no_header: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), GlrdError> {
    let config = GlrdConfig::load_from(cli.config.as_deref())?;
    let query_config = &config.query;

    let types = ReleaseType::parse_list(cli.release_type.as_deref().unwrap_or(&query_config.types))?;
    let fields = resolve_fields(cli.fields.as_deref().unwrap_or(&query_config.fields))?;
    let output_format = match cli.output_format {
        Some(format) => format,
        None => query_config.output_format.parse()?,
    };
    let version = cli.version.as_deref().map(Version::parse).transpose()?;

    let source = match cli.input_type.unwrap_or(query_config.input_type) {
        InputType::Url => Source::Url(cli.input_url.unwrap_or_else(|| query_config.input_url.clone())),
        InputType::File => Source::Dir(PathBuf::from(".")),
    };
    let prefix = cli
        .input_file_prefix
        .unwrap_or_else(|| query_config.input_file_prefix.clone());
    let format = cli.input_format.unwrap_or(query_config.input_format);

    let mut store = ReleaseStore::new(source, prefix, format);
    if cli.no_input_split {
        store = store.single_file();
    }

    let loaded = store.load(&types)?;
    if loaded.releases.is_empty() {
        return Err(GlrdError::NoReleases);
    }
    debug!("{} release(s) loaded", loaded.releases.len());

    let mut query = Query::new(types);
    if let Some(version) = version {
        query = query.version(version);
    }
    if cli.active {
        query = query.active();
    } else if cli.archived {
        query = query.archived();
    }
    if cli.latest {
        query = query.latest();
    }

    let results = query.run(&loaded.releases, SystemClock.now());
    debug!("{} release(s) matched", results.len());

    let options = RenderOptions {
        fields,
        no_header: cli.no_header,
        description: cli
            .output_description
            .unwrap_or_else(|| query_config.output_description.clone()),
        artifacts: config.artifacts.clone(),
    };
    let output = render(&results, output_format, &options)?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(())
}
