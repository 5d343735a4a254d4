//! Configuration management for the release database tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (glrd.toml)
//! - Environment variables (GLRD__*)
//!
//! ## Example config file (glrd.toml):
//! ```toml
//! [query]
//! input_type = "file"
//! input_file_prefix = "releases"
//! types = "stable,patch"
//!
//! [manage]
//! output_format = "yaml"
//!
//! [lifecycle]
//! extended_months = 6
//! eol_months = 9
//!
//! [artifacts]
//! container_registry = "ghcr.io/gardenlinux/gardenlinux"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::store::{FileFormat, InputType};

/// Main configuration for the release database tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlrdConfig {
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub manage: ManageConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,
}

/// Defaults for the query tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Comma separated release types queried when none are given
    #[serde(default = "default_query_types")]
    pub types: String,

    /// Comma separated fields for tabular output
    #[serde(default = "default_query_fields")]
    pub fields: String,

    #[serde(default)]
    pub input_type: InputType,

    #[serde(default = "default_input_url")]
    pub input_url: String,

    #[serde(default = "default_file_prefix")]
    pub input_file_prefix: String,

    #[serde(default)]
    pub input_format: FileFormat,

    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Title used by outputs that carry one (Mermaid)
    #[serde(default = "default_output_description")]
    pub output_description: String,
}

/// Defaults for the management tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManageConfig {
    #[serde(default = "default_manage_input_file")]
    pub input_file: PathBuf,

    #[serde(default)]
    pub output_format: FileFormat,

    #[serde(default = "default_file_prefix")]
    pub output_file_prefix: String,
}

/// Lifecycle derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Months from release to extended maintenance for stable releases
    #[serde(default = "default_extended_months")]
    pub extended_months: u32,

    /// Months from release to end of life for stable releases
    #[serde(default = "default_eol_months")]
    pub eol_months: u32,

    /// Day zero of date-derived major versions
    #[serde(default = "default_base_date")]
    pub base_date: NaiveDate,
}

/// Where release artifacts live, used to expand flavors into links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_base_url")]
    pub base_url: String,

    #[serde(default = "default_artifacts_prefix")]
    pub prefix: String,

    #[serde(default = "default_container_registry")]
    pub container_registry: String,

    /// Image file extension per platform
    #[serde(default = "default_platform_extensions")]
    pub platform_extensions: BTreeMap<String, String>,
}

/// Source repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Upstream repository URL, used for GitHub release links
    #[serde(default = "default_repo_url")]
    pub url: String,

    /// Local checkout used to resolve commits
    #[serde(default = "default_repo_path")]
    pub path: PathBuf,

    #[serde(default = "default_branch")]
    pub branch: String,
}

// Default value functions
fn default_query_types() -> String {
    "stable,patch".to_string()
}

fn default_query_fields() -> String {
    "Name,Version,Type,GitCommitShort,ReleaseDate,ExtendedMaintenance,EndOfMaintenance".to_string()
}

fn default_input_url() -> String {
    "https://gardenlinux-glrd.s3.eu-central-1.amazonaws.com".to_string()
}

fn default_file_prefix() -> String {
    "releases".to_string()
}

fn default_output_format() -> String {
    "shell".to_string()
}

fn default_output_description() -> String {
    "Garden Linux Releases".to_string()
}

fn default_manage_input_file() -> PathBuf {
    PathBuf::from("releases-input.yaml")
}

fn default_extended_months() -> u32 {
    6
}

fn default_eol_months() -> u32 {
    9
}

fn default_base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 31).unwrap_or_default()
}

fn default_artifacts_base_url() -> String {
    "https://gardenlinux-github-releases.s3.amazonaws.com".to_string()
}

fn default_artifacts_prefix() -> String {
    "objects/".to_string()
}

fn default_container_registry() -> String {
    "ghcr.io/gardenlinux/gardenlinux".to_string()
}

fn default_platform_extensions() -> BTreeMap<String, String> {
    [
        ("ali", "qcow2"),
        ("aws", "raw"),
        ("azure", "vhd"),
        ("gcp", "gcpimage.tar.gz"),
        ("gdch", "gcpimage.tar.gz"),
        ("kvm", "raw"),
        ("metal", "raw"),
        ("openstack", "qcow2"),
        ("openstackbaremetal", "qcow2"),
        ("vmware", "ova"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_repo_url() -> String {
    "https://github.com/gardenlinux/gardenlinux".to_string()
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            types: default_query_types(),
            fields: default_query_fields(),
            input_type: InputType::default(),
            input_url: default_input_url(),
            input_file_prefix: default_file_prefix(),
            input_format: FileFormat::default(),
            output_format: default_output_format(),
            output_description: default_output_description(),
        }
    }
}

impl Default for ManageConfig {
    fn default() -> Self {
        Self {
            input_file: default_manage_input_file(),
            output_format: FileFormat::default(),
            output_file_prefix: default_file_prefix(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            extended_months: default_extended_months(),
            eol_months: default_eol_months(),
            base_date: default_base_date(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            base_url: default_artifacts_base_url(),
            prefix: default_artifacts_prefix(),
            container_registry: default_container_registry(),
            platform_extensions: default_platform_extensions(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: default_repo_url(),
            path: default_repo_path(),
            branch: default_branch(),
        }
    }
}

impl ArtifactsConfig {
    /// Image extension for a platform, `raw` when unknown
    pub fn image_extension(&self, platform: &str) -> &str {
        self.platform_extensions
            .get(platform)
            .map(String::as_str)
            .unwrap_or("raw")
    }
}

impl GlrdConfig {
    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["glrd.toml", ".glrd.toml", "config/glrd.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("io", "gardenlinux", "glrd") {
            let xdg_config = dirs.config_dir().join("glrd.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // GLRD__QUERY__INPUT_TYPE=file
        builder = builder.add_source(
            Environment::with_prefix("GLRD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
