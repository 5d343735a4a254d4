//! Release record types
//!
//! A release record is the unit persisted in the release files:
//!
//! ```json
//! {
//!   "name": "patch-1592.6",
//!   "type": "patch",
//!   "version": { "major": 1592, "minor": 6 },
//!   "lifecycle": {
//!     "released": { "isodate": "2025-02-19", "timestamp": 1739951325 },
//!     "eol": { "isodate": "2025-08-12", "timestamp": 1754956800 }
//!   },
//!   "git": { "commit": "cb05e1…", "commit_short": "cb05e11f" },
//!   "github": { "release": "https://github.com/gardenlinux/gardenlinux/releases/tag/1592.6" },
//!   "flavors": ["container-amd64"],
//!   "attributes": { "source_repo": true }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GlrdError, Result};
use crate::version::{Version, VersionStyle};

/// Kind of release
///
/// Variant order is the display order used when sorting query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Stable,
    Patch,
    Nightly,
    Dev,
    Next,
}

impl ReleaseType {
    pub const ALL: [ReleaseType; 5] = [
        ReleaseType::Stable,
        ReleaseType::Patch,
        ReleaseType::Nightly,
        ReleaseType::Dev,
        ReleaseType::Next,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Stable => "stable",
            ReleaseType::Patch => "patch",
            ReleaseType::Nightly => "nightly",
            ReleaseType::Dev => "dev",
            ReleaseType::Next => "next",
        }
    }

    /// Position in the fixed display order
    pub fn rank(&self) -> u8 {
        match self {
            ReleaseType::Stable => 0,
            ReleaseType::Patch => 1,
            ReleaseType::Nightly => 2,
            ReleaseType::Dev => 3,
            ReleaseType::Next => 4,
        }
    }

    /// Types built from a concrete commit of the source repository
    pub fn carries_git(&self) -> bool {
        matches!(self, ReleaseType::Patch | ReleaseType::Nightly | ReleaseType::Dev)
    }

    /// Types that have an end of life at all
    pub fn has_eol(&self) -> bool {
        matches!(self, ReleaseType::Stable | ReleaseType::Patch | ReleaseType::Next)
    }

    /// Parse a comma separated list such as `stable,patch`
    pub fn parse_list(input: &str) -> Result<Vec<ReleaseType>> {
        let mut types = Vec::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let t: ReleaseType = part.parse()?;
            if !types.contains(&t) {
                types.push(t);
            }
        }
        Ok(types)
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = GlrdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stable" => Ok(ReleaseType::Stable),
            "patch" => Ok(ReleaseType::Patch),
            "nightly" => Ok(ReleaseType::Nightly),
            "dev" => Ok(ReleaseType::Dev),
            "next" => Ok(ReleaseType::Next),
            other => Err(GlrdError::InvalidReleaseType(other.to_string())),
        }
    }
}

/// A point in a release's lifecycle: calendar date plus UNIX timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LifecycleDate {
    pub isodate: NaiveDate,
    pub timestamp: i64,
}

impl LifecycleDate {
    /// Keep the exact time of day of `at`
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            isodate: at.date_naive(),
            timestamp: at.timestamp(),
        }
    }

    /// Midnight UTC of `date`
    pub fn from_isodate(date: NaiveDate) -> Self {
        let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::default()));
        Self::from_datetime(midnight)
    }

    pub fn from_timestamp(timestamp: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(timestamp, 0).map(Self::from_datetime)
    }

    /// Parse `YYYY-MM-DD`
    pub fn parse_isodate(input: &str) -> Result<Self> {
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map(Self::from_isodate)
            .map_err(|_| GlrdError::InvalidDate {
                value: input.to_string(),
                expected: "YYYY-MM-DD",
            })
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .unwrap_or_else(|| Utc.from_utc_datetime(&self.isodate.and_time(NaiveTime::default())))
    }

    /// Whether the timestamp falls on the stated calendar day (UTC)
    pub fn is_consistent(&self) -> bool {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .map(|dt| dt.date_naive() == self.isodate)
            .unwrap_or(false)
    }
}

/// On-disk form of a lifecycle date. Either half may be missing or null.
#[derive(Deserialize)]
struct RawLifecycleDate {
    #[serde(default)]
    isodate: Option<NaiveDate>,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl RawLifecycleDate {
    fn normalize(self) -> Option<LifecycleDate> {
        match (self.isodate, self.timestamp) {
            (Some(isodate), Some(timestamp)) => Some(LifecycleDate { isodate, timestamp }),
            (Some(isodate), None) => Some(LifecycleDate::from_isodate(isodate)),
            (None, Some(timestamp)) => LifecycleDate::from_timestamp(timestamp),
            (None, None) => None,
        }
    }
}

impl<'de> Deserialize<'de> for LifecycleDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        RawLifecycleDate::deserialize(deserializer)?
            .normalize()
            .ok_or_else(|| serde::de::Error::custom("lifecycle date needs an isodate or a timestamp"))
    }
}

fn de_optional_date<'de, D>(deserializer: D) -> std::result::Result<Option<LifecycleDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawLifecycleDate> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(RawLifecycleDate::normalize))
}

/// Lifecycle milestones of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub released: LifecycleDate,
    #[serde(default, deserialize_with = "de_optional_date", skip_serializing_if = "Option::is_none")]
    pub extended: Option<LifecycleDate>,
    #[serde(default, deserialize_with = "de_optional_date", skip_serializing_if = "Option::is_none")]
    pub eol: Option<LifecycleDate>,
}

impl Lifecycle {
    pub fn released(released: LifecycleDate) -> Self {
        Self {
            released,
            extended: None,
            eol: None,
        }
    }
}

/// Source commit a release was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub commit: String,
    pub commit_short: String,
}

impl GitInfo {
    /// Validate a full 40 character hex commit hash and derive its short form
    pub fn from_commit(commit: &str) -> Result<Self> {
        let commit = commit.trim().to_ascii_lowercase();
        if commit.len() != 40 || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GlrdError::InvalidCommit(commit));
        }
        Ok(Self {
            commit_short: commit[..8].to_string(),
            commit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubInfo {
    pub release: String,
}

/// Free-form release attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Whether the release was built from the source repository
    #[serde(default = "default_true")]
    pub source_repo: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            source_repo: true,
            extra: BTreeMap::new(),
        }
    }
}

/// Identity of a record inside a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseKey {
    pub release_type: ReleaseType,
    pub version: Version,
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&release_name(self.release_type, &self.version))
    }
}

/// A single release record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    #[serde(rename = "type")]
    pub release_type: ReleaseType,
    pub version: Version,
    pub lifecycle: Lifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl Release {
    /// Create a bare record with a derived name
    pub fn new(release_type: ReleaseType, version: Version, released: LifecycleDate) -> Self {
        Self {
            name: release_name(release_type, &version),
            release_type,
            version,
            lifecycle: Lifecycle::released(released),
            git: None,
            github: None,
            flavors: None,
            attributes: None,
        }
    }

    pub fn key(&self) -> ReleaseKey {
        ReleaseKey {
            release_type: self.release_type,
            version: self.version,
        }
    }

    pub fn with_eol(mut self, eol: LifecycleDate) -> Self {
        self.lifecycle.eol = Some(eol);
        self
    }

    pub fn with_extended(mut self, extended: LifecycleDate) -> Self {
        self.lifecycle.extended = Some(extended);
        self
    }

    pub fn with_git(mut self, git: GitInfo) -> Self {
        self.git = Some(git);
        self
    }

    pub fn released_timestamp(&self) -> i64 {
        self.lifecycle.released.timestamp
    }

    pub fn eol_timestamp(&self) -> Option<i64> {
        self.lifecycle.eol.map(|d| d.timestamp)
    }

    /// The name this record should carry given its type and version
    pub fn expected_name(&self) -> String {
        release_name(self.release_type, &self.version)
    }

    /// Version as shown to users: major only for stable and next releases
    pub fn display_version(&self) -> String {
        match self.release_type {
            ReleaseType::Stable | ReleaseType::Next => self.version.format(VersionStyle::Major),
            _ => self.version.format(VersionStyle::Release),
        }
    }
}

/// `"{type}-{version}"`, or the literal `next`
pub fn release_name(release_type: ReleaseType, version: &Version) -> String {
    if release_type == ReleaseType::Next {
        return "next".to_string();
    }
    format!("{}-{}", release_type, version.format(VersionStyle::Full))
}

/// Split a release name such as `patch-1312.2` into its type and version
pub fn parse_release_name(name: &str) -> Result<(ReleaseType, Version)> {
    let name = name.trim();
    if name == "next" {
        return Ok((ReleaseType::Next, Version::next()));
    }

    let (type_part, version_part) = name
        .split_once('-')
        .ok_or_else(|| GlrdError::InvalidReleaseName(name.to_string()))?;

    let release_type: ReleaseType = type_part.parse()?;
    let version = Version::parse(version_part)
        .map_err(|_| GlrdError::InvalidReleaseName(name.to_string()))?;

    Ok((release_type, version))
}
