//! Loading and persisting release files
//!
//! Release files hold a single top-level `releases` sequence and are read
//! as either JSON or YAML. By default records are split into one file per
//! family, all sharing a prefix:
//!
//! ```text
//! releases-stable+patch.json
//! releases-nightly.json
//! releases-dev.json
//! releases-next.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checksum::ContentSnapshot;
use crate::error::{GlrdError, Result};
use crate::release::{Release, ReleaseType};

/// Encoding of a release file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Json,
    Yaml,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
        }
    }

    /// Guess the format from a path's extension, JSON when unknown
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Json,
        }
    }
}

impl FromStr for FileFormat {
    type Err = GlrdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(FileFormat::Json),
            "yaml" => Ok(FileFormat::Yaml),
            other => Err(GlrdError::InvalidArgument(format!(
                "unknown file format '{}' (json, yaml)",
                other
            ))),
        }
    }
}

/// Where release files are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Url,
    File,
}

impl FromStr for InputType {
    type Err = GlrdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "url" => Ok(InputType::Url),
            "file" => Ok(InputType::File),
            other => Err(GlrdError::InvalidArgument(format!(
                "unknown input type '{}' (file, url)",
                other
            ))),
        }
    }
}

/// Top-level shape of every release file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFile {
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Parse a release file in either encoding
pub fn decode(content: &str, format: FileFormat) -> Result<Vec<Release>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: ReleaseFile = match format {
        FileFormat::Json => serde_json::from_str(content)?,
        FileFormat::Yaml => serde_yaml::from_str(content)?,
    };
    Ok(file.releases)
}

/// Serialize records: compact JSON or block style YAML
pub fn encode(releases: &[Release], format: FileFormat) -> Result<String> {
    let file = ReleaseFile {
        releases: releases.to_vec(),
    };
    Ok(match format {
        FileFormat::Json => serde_json::to_string(&file)?,
        FileFormat::Yaml => serde_yaml::to_string(&file)?,
    })
}

/// Group of release types stored in one split file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileFamily {
    StablePatch,
    Nightly,
    Dev,
    Next,
}

impl FileFamily {
    pub const ALL: [FileFamily; 4] = [
        FileFamily::StablePatch,
        FileFamily::Nightly,
        FileFamily::Dev,
        FileFamily::Next,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            FileFamily::StablePatch => "stable+patch",
            FileFamily::Nightly => "nightly",
            FileFamily::Dev => "dev",
            FileFamily::Next => "next",
        }
    }

    pub fn of(release_type: ReleaseType) -> Self {
        match release_type {
            ReleaseType::Stable | ReleaseType::Patch => FileFamily::StablePatch,
            ReleaseType::Nightly => FileFamily::Nightly,
            ReleaseType::Dev => FileFamily::Dev,
            ReleaseType::Next => FileFamily::Next,
        }
    }

    /// Families holding any of `types`, in file order
    pub fn needed_for(types: &[ReleaseType]) -> Vec<FileFamily> {
        let mut families: Vec<FileFamily> = types.iter().map(|t| FileFamily::of(*t)).collect();
        families.sort();
        families.dedup();
        families
    }
}

/// A directory or a base URL holding release files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Dir(PathBuf),
    Url(String),
}

impl Source {
    pub fn location(&self, file_name: &str) -> String {
        match self {
            Source::Dir(dir) => dir.join(file_name).display().to_string(),
            Source::Url(base) => format!("{}/{}", base.trim_end_matches('/'), file_name),
        }
    }

    /// Content of `file_name`, `None` when it does not exist
    pub fn read(&self, file_name: &str) -> Result<Option<String>> {
        let location = self.location(file_name);
        match self {
            Source::Dir(_) => {
                let path = Path::new(&location);
                if !path.exists() {
                    return Ok(None);
                }
                debug!("Reading {}", location);
                Ok(Some(fs::read_to_string(path)?))
            }
            Source::Url(_) => {
                debug!("Fetching {}", location);
                let response = reqwest::blocking::get(&location)?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                Ok(Some(response.error_for_status()?.text()?))
            }
        }
    }
}

/// Records read from a store, plus what the files looked like
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub releases: Vec<Release>,
    pub snapshot: ContentSnapshot,
}

/// Reads and writes the release files of one prefix
#[derive(Debug, Clone)]
pub struct ReleaseStore {
    source: Source,
    prefix: String,
    format: FileFormat,
    split: bool,
    allow_missing: bool,
}

impl ReleaseStore {
    pub fn new(source: Source, prefix: impl Into<String>, format: FileFormat) -> Self {
        Self {
            source,
            prefix: prefix.into(),
            format,
            split: true,
            allow_missing: false,
        }
    }

    /// Use a single `{prefix}.{ext}` file instead of one file per family
    pub fn single_file(mut self) -> Self {
        self.split = false;
        self
    }

    /// Treat missing files as empty instead of failing
    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn file_name(&self, family: Option<FileFamily>) -> String {
        match family {
            Some(family) => format!("{}-{}.{}", self.prefix, family.suffix(), self.format.extension()),
            None => format!("{}.{}", self.prefix, self.format.extension()),
        }
    }

    fn file_names_for(&self, types: &[ReleaseType]) -> Vec<String> {
        if self.split {
            FileFamily::needed_for(types)
                .into_iter()
                .map(|f| self.file_name(Some(f)))
                .collect()
        } else {
            vec![self.file_name(None)]
        }
    }

    /// Load the records of `types`, reading only the files that hold them
    pub fn load(&self, types: &[ReleaseType]) -> Result<Loaded> {
        let mut loaded = Loaded::default();
        for file_name in self.file_names_for(types) {
            let location = self.source.location(&file_name);
            let content = self.source.read(&file_name)?;
            loaded.snapshot.record(&self.source, &file_name, content.as_deref());

            match content {
                Some(content) => {
                    let releases = decode(&content, self.format)?;
                    debug!("Loaded {} release(s) from {}", releases.len(), location);
                    loaded
                        .releases
                        .extend(releases.into_iter().filter(|r| types.contains(&r.release_type)));
                }
                None if self.allow_missing => warn!("{} does not exist, starting empty", location),
                None => return Err(GlrdError::SourceNotFound(location)),
            }
        }
        Ok(loaded)
    }

    /// Load every release type
    pub fn load_all(&self) -> Result<Loaded> {
        self.load(&ReleaseType::ALL)
    }

    fn output_dir(&self) -> Result<&Path> {
        match &self.source {
            Source::Dir(dir) => Ok(dir),
            Source::Url(url) => Err(GlrdError::InvalidArgument(format!(
                "cannot write release files to {}",
                url
            ))),
        }
    }

    /// Write records, one file per family unless configured as single file.
    ///
    /// Every family file is written, so deleting the last record of a family
    /// leaves an empty file behind.
    pub fn save(&self, releases: &[Release]) -> Result<Vec<PathBuf>> {
        self.write(releases, None)
    }

    /// Like [`ReleaseStore::save`], but refuse to write when any location
    /// recorded in `snapshot` changed since it was loaded.
    ///
    /// The loaded locations are re-read from their own source, which may
    /// differ from this store's output directory.
    pub fn save_checked(&self, releases: &[Release], snapshot: &ContentSnapshot) -> Result<Vec<PathBuf>> {
        self.write(releases, Some(snapshot))
    }

    fn write(&self, releases: &[Release], snapshot: Option<&ContentSnapshot>) -> Result<Vec<PathBuf>> {
        let dir = self.output_dir()?;
        let outputs: Vec<(String, Vec<Release>)> = if self.split {
            FileFamily::ALL
                .iter()
                .map(|family| {
                    let members = releases
                        .iter()
                        .filter(|r| FileFamily::of(r.release_type) == *family)
                        .cloned()
                        .collect();
                    (self.file_name(Some(*family)), members)
                })
                .collect()
        } else {
            vec![(self.file_name(None), releases.to_vec())]
        };

        if let Some(snapshot) = snapshot {
            snapshot.verify_sources()?;
        }

        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
        let mut written = Vec::with_capacity(outputs.len());
        for (file_name, members) in outputs {
            let path = dir.join(&file_name);
            fs::write(&path, encode(&members, self.format)?)?;
            info!("Wrote {} release(s) to {}", members.len(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Read records from a manual input file, format taken from its extension
pub fn read_input_file(path: &Path) -> Result<Vec<Release>> {
    if !path.exists() {
        return Err(GlrdError::SourceNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    decode(&content, FileFormat::from_path(path))
}
