//! Release repository
//!
//! In-memory set of release records keyed by `(type, version)`. All
//! mutations go through [`ReleaseRepository::upsert`] and
//! [`ReleaseRepository::delete`], which keep the patch EOL chain of the
//! touched major consistent.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{GlrdError, Result};
use crate::lifecycle::{chain_patch_eols, LifecycleWarning};
use crate::release::{Release, ReleaseKey, ReleaseType};
use crate::version::{Major, Version};

/// The loaded release records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseRepository {
    releases: BTreeMap<ReleaseKey, Release>,
}

impl ReleaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from records as they were stored.
    ///
    /// Records are taken verbatim; a later record with the same key replaces
    /// an earlier one.
    pub fn from_releases(releases: impl IntoIterator<Item = Release>) -> Self {
        let mut repo = Self::new();
        for release in releases {
            if let Some(previous) = repo.releases.insert(release.key(), release) {
                warn!("Duplicate release '{}' in input, keeping the last one", previous.name);
            }
        }
        repo
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// All records in key order
    pub fn all(&self) -> impl Iterator<Item = &Release> {
        self.releases.values()
    }

    pub fn find(&self, release_type: ReleaseType, version: &Version) -> Option<&Release> {
        self.releases.get(&ReleaseKey {
            release_type,
            version: *version,
        })
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Release> {
        self.releases.values().find(|r| r.name == name)
    }

    /// The singleton next release, if present
    pub fn next_release(&self) -> Option<&Release> {
        self.releases
            .values()
            .find(|r| r.release_type == ReleaseType::Next)
    }

    /// Highest major that has a stable release
    pub fn latest_stable_major(&self) -> Option<u32> {
        self.releases
            .values()
            .filter(|r| r.release_type == ReleaseType::Stable)
            .filter_map(|r| r.version.major.number())
            .max()
    }

    /// Insert or replace a record.
    ///
    /// Inserting a patch or stable release re-chains the patch EOLs of its
    /// major.
    ///
    /// There is at most one next release, and its identity is its release
    /// date. A next release with the same `lifecycle.released` as the stored
    /// one is an edit and replaces it. One with a different release date is
    /// rejected with [`GlrdError::DuplicateNextRelease`] and the repository
    /// is left untouched. Use [`ReleaseRepository::merge`] to replace the
    /// next release unconditionally.
    pub fn upsert(&mut self, release: Release) -> Result<Vec<LifecycleWarning>> {
        if release.name != release.expected_name() {
            return Err(GlrdError::InvalidReleaseName(release.name));
        }

        if release.release_type == ReleaseType::Next {
            if let Some(existing) = self.next_release() {
                if existing.lifecycle.released != release.lifecycle.released {
                    return Err(GlrdError::DuplicateNextRelease {
                        existing: existing.name.clone(),
                    });
                }
            }
        }

        let key = release.key();
        let name = release.name.clone();
        match self.releases.insert(key, release) {
            Some(_) => info!("Release '{}' updated", name),
            None => info!("Release '{}' created", name),
        }

        Ok(self.rechain_if_needed(key))
    }

    /// Upsert a batch of records.
    ///
    /// A record replaces any existing record of the same name, including
    /// the next release regardless of its release date.
    pub fn merge(&mut self, releases: impl IntoIterator<Item = Release>) -> Result<Vec<LifecycleWarning>> {
        let mut warnings = Vec::new();
        for release in releases {
            if release.name != release.expected_name() {
                return Err(GlrdError::InvalidReleaseName(release.name));
            }
            if let Some(key) = self.find_by_name(&release.name).map(Release::key) {
                self.releases.remove(&key);
            }
            warnings.extend(self.upsert(release)?);
        }
        Ok(warnings)
    }

    /// Remove a record by type and version
    pub fn delete(&mut self, release_type: ReleaseType, version: &Version) -> Result<(Release, Vec<LifecycleWarning>)> {
        let key = ReleaseKey {
            release_type,
            version: *version,
        };
        let removed = self
            .releases
            .remove(&key)
            .ok_or_else(|| GlrdError::ReleaseNotFound(key.to_string()))?;
        info!("Release '{}' deleted", removed.name);
        let warnings = self.rechain_if_needed(key);
        Ok((removed, warnings))
    }

    /// Remove a record by name
    pub fn delete_by_name(&mut self, name: &str) -> Result<(Release, Vec<LifecycleWarning>)> {
        let key = self
            .find_by_name(name)
            .map(Release::key)
            .ok_or_else(|| GlrdError::ReleaseNotFound(name.to_string()))?;
        self.delete(key.release_type, &key.version)
    }

    /// Re-chain the patch EOLs of one major
    pub fn rechain_major(&mut self, major: u32) -> Vec<LifecycleWarning> {
        let major = Major::Number(major);
        let stable = self
            .releases
            .values()
            .find(|r| r.release_type == ReleaseType::Stable && r.version.major == major)
            .map(|r| r.lifecycle.clone());

        let mut patches: Vec<&mut Release> = self
            .releases
            .values_mut()
            .filter(|r| r.release_type == ReleaseType::Patch && r.version.major == major)
            .collect();
        debug!("Re-chaining {} patch release(s) of major {}", patches.len(), major);

        let warnings: Vec<LifecycleWarning> = chain_patch_eols(&mut patches, stable.as_ref())
            .into_iter()
            .collect();
        for warning in &warnings {
            warn!("{}", warning);
        }
        warnings
    }

    fn rechain_if_needed(&mut self, key: ReleaseKey) -> Vec<LifecycleWarning> {
        match (key.release_type, key.version.major) {
            (ReleaseType::Patch | ReleaseType::Stable, Major::Number(major)) => self.rechain_major(major),
            _ => Vec::new(),
        }
    }

    /// Consume the repository, yielding records in key order
    pub fn into_releases(self) -> Vec<Release> {
        self.releases.into_values().collect()
    }
}
