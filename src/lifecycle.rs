//! Lifecycle derivation
//!
//! Computes the lifecycle dates of new records and keeps the end-of-life
//! dates of patch releases chained:
//!
//! ```text
//! stable-1312            released 2023-11-16 ─────────────────────── eol 2024-08-03
//! patch-1312.1           released 2023-11-23 ── eol 2024-01-15
//! patch-1312.2                          released 2024-01-15 ──────── eol 2024-08-03
//! ```
//!
//! Every patch ends when its successor is released; the newest patch ends
//! together with its stable release.

use std::fmt;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::debug;

use crate::config::{LifecycleConfig, RepositoryConfig};
use crate::error::{GlrdError, Result};
use crate::git::CommitSource;
use crate::release::{
    Attributes, GithubInfo, GitInfo, Lifecycle, LifecycleDate, Release, ReleaseType,
};
use crate::repository::ReleaseRepository;
use crate::version::{Major, SchemaEra, Version, VersionStyle, V2_MAJOR_THRESHOLD};

/// Format accepted for explicit lifecycle timestamps
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Non-fatal consistency findings produced while deriving lifecycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleWarning {
    /// The newest patch of a major has no stable release to inherit its EOL from
    MissingStableParent { major: u32, patch: String },
}

impl fmt::Display for LifecycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleWarning::MissingStableParent { major, patch } => write!(
                f,
                "No stable release found for major version {}, EOL of {} left unset",
                major, patch
            ),
        }
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SS` as UTC
pub fn parse_isodatetime(input: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(input.trim(), ISO_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| GlrdError::InvalidDate {
            value: input.to_string(),
            expected: "YYYY-MM-DDTHH:MM:SS",
        })
}

/// Re-chain the EOL dates of one major's patch releases.
///
/// `patches` must all share the same major. Order on input does not matter.
/// The result only depends on the set of `(version, released)` pairs and the
/// stable parent, so running it twice changes nothing.
pub fn chain_patch_eols(
    patches: &mut [&mut Release],
    stable: Option<&Lifecycle>,
) -> Option<LifecycleWarning> {
    if patches.is_empty() {
        return None;
    }
    patches.sort_by(|a, b| a.version.cmp(&b.version));

    for i in 0..patches.len() - 1 {
        let successor_released = patches[i + 1].lifecycle.released;
        let patch = &mut patches[i];
        patch.lifecycle.extended = None;
        patch.lifecycle.eol = Some(successor_released);
        debug!("{} eol chained to {}", patch.name, successor_released.isodate);
    }

    let last = patches.len() - 1;
    let newest = &mut patches[last];
    newest.lifecycle.extended = None;
    match stable {
        Some(parent) => {
            newest.lifecycle.eol = parent.eol;
            debug!("{} inherits eol of its stable release", newest.name);
            None
        }
        None => {
            newest.lifecycle.eol = None;
            Some(LifecycleWarning::MissingStableParent {
                major: newest.version.major.number().unwrap_or_default(),
                patch: newest.name.clone(),
            })
        }
    }
}

/// Re-chain every patch family in a flat list of records
pub fn chain_all(releases: &mut [Release]) -> Vec<LifecycleWarning> {
    let mut majors: Vec<Major> = releases
        .iter()
        .filter(|r| r.release_type == ReleaseType::Patch)
        .map(|r| r.version.major)
        .collect();
    majors.sort();
    majors.dedup();

    let mut warnings = Vec::new();
    for major in majors {
        let stable = releases
            .iter()
            .find(|r| r.release_type == ReleaseType::Stable && r.version.major == major)
            .map(|r| r.lifecycle.clone());
        let mut patches: Vec<&mut Release> = releases
            .iter_mut()
            .filter(|r| r.release_type == ReleaseType::Patch && r.version.major == major)
            .collect();
        warnings.extend(chain_patch_eols(&mut patches, stable.as_ref()));
    }
    warnings
}

/// The next unused version of `release_type` under `major`.
///
/// Versions in the v2 era always get `micro = 0`.
pub fn next_free_version<'a>(
    records: impl IntoIterator<Item = &'a Release>,
    release_type: ReleaseType,
    major: u32,
) -> Version {
    let minor = records
        .into_iter()
        .filter(|r| r.release_type == release_type && r.version.major == Major::Number(major))
        .filter_map(|r| r.version.minor)
        .max()
        .map(|m| m + 1)
        .unwrap_or(0);
    let micro = (major >= V2_MAJOR_THRESHOLD).then_some(0);
    Version::new(major, Some(minor), micro)
}

/// Validate a version supplied on the command line for a new release
pub fn parse_requested_version(input: &str, release_type: ReleaseType) -> Result<Version> {
    match release_type {
        ReleaseType::Next => Ok(Version::next()),
        ReleaseType::Stable => {
            let version = Version::parse(input)?;
            if version.minor.is_some() || version.is_next() {
                return Err(GlrdError::InvalidVersionFormat(format!(
                    "{}: stable releases use a bare major version",
                    input
                )));
            }
            Ok(version)
        }
        _ => {
            let version = Version::parse(input)?;
            if version.is_next() || version.minor.is_none() {
                return Err(GlrdError::InvalidVersionFormat(format!(
                    "{}: expected major.minor or major.minor.micro",
                    input
                )));
            }
            if version.era() == SchemaEra::V1 && version.micro.is_some() {
                return Err(GlrdError::InvalidVersionFormat(format!(
                    "{}: versions before {} follow the v1 schema (major.minor), unexpected micro version",
                    input, V2_MAJOR_THRESHOLD
                )));
            }
            if version.era() == SchemaEra::V2 && version.micro.is_none() {
                return Err(GlrdError::InvalidVersionFormat(format!(
                    "{}: versions from {} on follow the v2 schema (major.minor.micro), missing micro version",
                    input, V2_MAJOR_THRESHOLD
                )));
            }
            Ok(version)
        }
    }
}

/// Everything needed to synthesize a new release record
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub release_type: ReleaseType,
    /// Explicit version; derived when absent
    pub version: Option<String>,
    /// Release instant; "now" when absent
    pub released: Option<DateTime<Utc>>,
    pub extended: Option<DateTime<Utc>>,
    pub eol: Option<DateTime<Utc>>,
    /// Explicit commit; resolved from the commit source when absent
    pub git: Option<GitInfo>,
    pub flavors: Vec<String>,
}

impl ReleaseRequest {
    pub fn new(release_type: ReleaseType) -> Self {
        Self {
            release_type,
            version: None,
            released: None,
            extended: None,
            eol: None,
            git: None,
            flavors: Vec::new(),
        }
    }
}

/// Derives lifecycle dates and builds new records
#[derive(Debug, Clone)]
pub struct LifecycleDeriver {
    config: LifecycleConfig,
    repo_url: String,
}

impl LifecycleDeriver {
    pub fn new(config: &LifecycleConfig, repository: &RepositoryConfig) -> Self {
        Self {
            config: config.clone(),
            repo_url: repository.url.trim_end_matches('/').to_string(),
        }
    }

    /// Default `(extended, eol)` of a stable release
    pub fn default_stable_dates(&self, released: DateTime<Utc>) -> Result<(LifecycleDate, LifecycleDate)> {
        let extended = add_months(released, self.config.extended_months)?;
        let eol = add_months(released, self.config.eol_months)?;
        Ok((LifecycleDate::from_datetime(extended), LifecycleDate::from_datetime(eol)))
    }

    /// Fill in missing extended/eol dates of a stable record
    pub fn apply_stable_defaults(&self, release: &mut Release) -> Result<()> {
        if release.release_type != ReleaseType::Stable {
            return Ok(());
        }
        let (extended, eol) = self.default_stable_dates(release.lifecycle.released.datetime())?;
        release.lifecycle.extended.get_or_insert(extended);
        release.lifecycle.eol.get_or_insert(eol);
        Ok(())
    }

    /// Major version derived from a date: days since the base date
    pub fn garden_major(&self, at: DateTime<Utc>) -> u32 {
        let days = (at.date_naive() - self.config.base_date).num_days();
        u32::try_from(days).unwrap_or(0)
    }

    /// Pick the version of a new record
    pub fn resolve_version(
        &self,
        request: &ReleaseRequest,
        released: DateTime<Utc>,
        existing: &ReleaseRepository,
    ) -> Result<Version> {
        if let Some(explicit) = &request.version {
            return parse_requested_version(explicit, request.release_type);
        }

        match request.release_type {
            ReleaseType::Next => Ok(Version::next()),
            ReleaseType::Stable => Ok(Version::major_only(self.garden_major(released))),
            ReleaseType::Patch => {
                let major = existing
                    .latest_stable_major()
                    .unwrap_or_else(|| self.garden_major(released));
                Ok(next_free_version(existing.all(), ReleaseType::Patch, major))
            }
            release_type => {
                let major = self.garden_major(released);
                Ok(next_free_version(existing.all(), release_type, major))
            }
        }
    }

    /// Build a complete record for `request`.
    ///
    /// Patch EOLs are left to the repository, which re-chains the family on
    /// insert.
    pub fn create(
        &self,
        request: &ReleaseRequest,
        existing: &ReleaseRepository,
        commits: &dyn CommitSource,
        now: DateTime<Utc>,
    ) -> Result<Release> {
        let release_type = request.release_type;
        let released_at = request.released.unwrap_or(now);

        if !release_type.has_eol() && (request.extended.is_some() || request.eol.is_some()) {
            return Err(GlrdError::InvalidArgument(format!(
                "{} releases do not have extended or eol dates",
                release_type
            )));
        }

        let version = self.resolve_version(request, released_at, existing)?;
        let mut release = Release::new(release_type, version, LifecycleDate::from_datetime(released_at));

        match release_type {
            ReleaseType::Stable => {
                release.lifecycle.extended = request.extended.map(LifecycleDate::from_datetime);
                release.lifecycle.eol = request.eol.map(LifecycleDate::from_datetime);
                self.apply_stable_defaults(&mut release)?;
            }
            ReleaseType::Next => {
                release.lifecycle.extended = request.extended.map(LifecycleDate::from_datetime);
                release.lifecycle.eol = request.eol.map(LifecycleDate::from_datetime);
            }
            ReleaseType::Patch | ReleaseType::Nightly | ReleaseType::Dev => {
                let git = match &request.git {
                    Some(git) => git.clone(),
                    None => commits.commit_at(released_at)?,
                };
                if release_type == ReleaseType::Patch {
                    release.lifecycle.eol = request.eol.map(LifecycleDate::from_datetime);
                    release.github = Some(GithubInfo {
                        release: format!(
                            "{}/releases/tag/{}",
                            self.repo_url,
                            version.format(VersionStyle::Full)
                        ),
                    });
                }
                let mut flavors = request.flavors.clone();
                flavors.sort();
                flavors.dedup();
                release.git = Some(git);
                release.flavors = Some(flavors);
                release.attributes = Some(Attributes::default());
            }
        }

        debug!("Release '{}' created", release.name);
        Ok(release)
    }

    /// One nightly per day, from the first stable release until `now`.
    ///
    /// Days start at 07:00 UTC on the day of the earliest stable release, or
    /// at 2020-06-09 06:00 UTC when there is none. The last day included
    /// is the one whose 07:00 build is not after 06:00 UTC of today.
    pub fn initial_nightlies(
        &self,
        existing: &ReleaseRepository,
        commits: &dyn CommitSource,
        now: DateTime<Utc>,
    ) -> Result<Vec<Release>> {
        let start = existing
            .all()
            .filter(|r| r.release_type == ReleaseType::Stable)
            .map(|r| r.lifecycle.released.isodate)
            .min()
            .map(|day| at_hour(day, 7))
            .unwrap_or_else(initial_nightly_start);
        let end = at_hour(now.date_naive(), 6);

        let mut nightlies = Vec::new();
        let mut at = start;
        while at <= end {
            let major = self.garden_major(at);
            let micro = (major >= V2_MAJOR_THRESHOLD).then_some(0);
            let version = Version::new(major, Some(0), micro);
            let mut release = Release::new(ReleaseType::Nightly, version, LifecycleDate::from_datetime(at))
                .with_git(commits.commit_at(at)?);
            release.attributes = Some(Attributes::default());
            debug!("Initial nightly release '{}' created", release.name);
            nightlies.push(release);
            at += Duration::days(1);
        }
        Ok(nightlies)
    }
}

/// First nightly build when no stable release exists yet
fn initial_nightly_start() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2020, 6, 9)
        .map(|day| at_hour(day, 6))
        .unwrap_or_default()
}

fn at_hour(day: NaiveDate, hour: u32) -> DateTime<Utc> {
    day.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default())
        .and_utc()
}

fn add_months(at: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    at.checked_add_months(Months::new(months))
        .ok_or_else(|| GlrdError::InvalidArgument(format!("{} + {} months is out of range", at, months)))
}
