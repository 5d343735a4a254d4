//! Release Management CLI
//!
//! Creates, merges and deletes release records, re-derives lifecycle dates
//! and writes the release files.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use glrd::checksum::Checksum;
use glrd::diff::diff_releases;
use glrd::git::RepositoryCommits;
use glrd::lifecycle::parse_isodatetime;
use glrd::release::GitInfo;
use glrd::store::{decode, read_input_file, Loaded};
use glrd::validate::RecordValidator;
use glrd::{
    Clock, FileFormat, GlrdConfig, GlrdError, InputType, LifecycleDeriver, ReleaseRepository,
    ReleaseRequest, ReleaseStore, ReleaseType, Source, SystemClock,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "glrd-manage")]
#[command(about = "Manage the Garden Linux release database")]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(long)]
    config: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "INFO")]
    log_level: LogLevel,

    /// Create a release of this type
    #[arg(long)]
    create: Option<ReleaseType>,

    /// Bootstrap one release per day since the first stable release (nightly only)
    #[arg(long)]
    create_initial_releases: Option<ReleaseType>,

    /// Version of the created release (major for stable, major.minor or major.minor.micro otherwise)
    #[arg(long)]
    version: Option<String>,

    /// Full commit hash of the created release
    #[arg(long)]
    commit: Option<String>,

    /// Release time (YYYY-MM-DDTHH:MM:SS), defaults to now
    #[arg(long)]
    lifecycle_released_isodatetime: Option<String>,

    /// Start of extended maintenance (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    lifecycle_extended_isodatetime: Option<String>,

    /// End of life (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    lifecycle_eol_isodatetime: Option<String>,

    /// Comma separated flavors of the created release
    #[arg(long, value_delimiter = ',')]
    flavors: Vec<String>,

    /// Delete the release with this name, e.g. patch-1312.2
    #[arg(long)]
    delete: Option<String>,

    /// Merge releases from the manual input file
    #[arg(long)]
    input: bool,

    /// Manual input file (YAML or JSON)
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Merge releases read as JSON from stdin
    #[arg(long)]
    input_stdin: bool,

    /// Do not load the existing releases
    #[arg(long)]
    no_query: bool,

    /// Where the existing releases are read from
    #[arg(long)]
    input_type: Option<InputType>,

    /// Base URL of the existing release files
    #[arg(long)]
    input_url: Option<String>,

    /// Prefix of the existing release files
    #[arg(long)]
    input_file_prefix: Option<String>,

    /// Format of the existing release files
    #[arg(long)]
    input_format: Option<FileFormat>,

    /// Output format: json or yaml
    #[arg(long)]
    output_format: Option<FileFormat>,

    /// Prefix of the written release files
    #[arg(long)]
    output_file_prefix: Option<String>,

    /// Write a single {prefix}.{format} file instead of one file per release family
    #[arg(long)]
    no_output_split: bool,

    /// Checkout used to look up commits
    #[arg(long)]
    repo_path: Option<PathBuf>,

    /// Overwrite release files even if they changed since they were loaded
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.directive())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn load_existing(cli: &Cli, config: &GlrdConfig) -> Result<Loaded, GlrdError> {
    if cli.no_query {
        return Ok(Loaded::default());
    }
    let query = &config.query;
    let source = match cli.input_type.unwrap_or(query.input_type) {
        InputType::Url => Source::Url(cli.input_url.clone().unwrap_or_else(|| query.input_url.clone())),
        InputType::File => Source::Dir(PathBuf::from(".")),
    };
    let prefix = cli
        .input_file_prefix
        .clone()
        .unwrap_or_else(|| query.input_file_prefix.clone());
    let format = cli.input_format.unwrap_or(query.input_format);

    ReleaseStore::new(source, prefix, format).allow_missing().load_all()
}

fn release_request(cli: &Cli, release_type: ReleaseType) -> Result<ReleaseRequest, GlrdError> {
    let parse = |value: &Option<String>| value.as_deref().map(parse_isodatetime).transpose();

    let mut request = ReleaseRequest::new(release_type);
    request.version = cli.version.clone();
    request.released = parse(&cli.lifecycle_released_isodatetime)?;
    request.extended = parse(&cli.lifecycle_extended_isodatetime)?;
    request.eol = parse(&cli.lifecycle_eol_isodatetime)?;
    request.git = cli.commit.as_deref().map(GitInfo::from_commit).transpose()?;
    request.flavors = cli.flavors.clone();
    Ok(request)
}

fn run(cli: Cli) -> Result<(), GlrdError> {
    let config = GlrdConfig::load_from(cli.config.as_deref())?;

    if cli.delete.is_some() && cli.no_query {
        return Err(GlrdError::InvalidArgument(
            "'--delete' cannot run with '--no-query'".to_string(),
        ));
    }

    if let Some(release_type) = cli.create_initial_releases {
        if release_type != ReleaseType::Nightly {
            return Err(GlrdError::InvalidArgument(format!(
                "initial {} releases cannot be created, only nightly is supported",
                release_type
            )));
        }
    }

    let existing = load_existing(&cli, &config)?;
    info!("{} existing release(s) loaded", existing.releases.len());
    let mut repo = ReleaseRepository::from_releases(existing.releases.clone());
    let deriver = LifecycleDeriver::new(&config.lifecycle, &config.repository);

    if let Some(name) = &cli.delete {
        repo.delete_by_name(name)?;
    }

    let mut manual = Vec::new();
    if cli.input {
        let path = cli.input_file.clone().unwrap_or_else(|| config.manage.input_file.clone());
        manual.extend(read_input_file(&path)?);
    }
    if cli.input_stdin {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        manual.extend(decode(&content, FileFormat::Json)?);
    }
    if !manual.is_empty() {
        for release in &mut manual {
            deriver.apply_stable_defaults(release)?;
        }
        info!("Merging {} release(s) from manual input", manual.len());
        repo.merge(manual)?;
    }

    let repo_path = cli.repo_path.clone().unwrap_or_else(|| config.repository.path.clone());
    let commits = RepositoryCommits::new(repo_path, config.repository.branch.clone());

    if cli.create_initial_releases.is_some() {
        let nightlies = deriver.initial_nightlies(&repo, &commits, SystemClock.now())?;
        info!("{} initial nightly release(s) created", nightlies.len());
        repo.merge(nightlies)?;
    }

    if let Some(release_type) = cli.create {
        let request = release_request(&cli, release_type)?;
        let release = deriver.create(&request, &repo, &commits, SystemClock.now())?;
        let name = release.name.clone();
        let warnings = repo.upsert(release)?;
        if !warnings.is_empty() {
            warn!("{} created with {} lifecycle warning(s)", name, warnings.len());
        }
    }

    let releases = repo.into_releases();
    RecordValidator::new()?.validate_all(&releases)?;

    let report = diff_releases(&existing.releases, &releases)?;
    report.log();

    let mut store = ReleaseStore::new(
        Source::Dir(PathBuf::from(".")),
        cli.output_file_prefix
            .clone()
            .unwrap_or_else(|| config.manage.output_file_prefix.clone()),
        cli.output_format.unwrap_or(config.manage.output_format),
    );
    if cli.no_output_split {
        store = store.single_file();
    }

    let written = if cli.force {
        store.save(&releases)?
    } else {
        store.save_checked(&releases, &existing.snapshot)?
    };
    info!(
        "{} release(s) written to {} file(s), checksum {}",
        releases.len(),
        written.len(),
        Checksum::of_releases(&releases)?
    );

    Ok(())
}
