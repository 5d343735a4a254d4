//! Content checksums used to detect concurrent writers

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{GlrdError, Result};
use crate::release::Release;
use crate::store::Source;

/// SHA256 checksum of release data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    pub fn of_content(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Checksum of a record set, independent of the file encoding it came from
    pub fn of_releases(releases: &[Release]) -> Result<Self> {
        let canonical = serde_json::to_vec(releases)?;
        Ok(Self::from_bytes(&canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn describe(checksum: Option<&Checksum>) -> String {
    checksum
        .map(Checksum::to_string)
        .unwrap_or_else(|| "<missing>".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotEntry {
    source: Source,
    file_name: String,
    checksum: Option<Checksum>,
}

/// What each loaded location contained at load time.
///
/// A location that did not exist is recorded as `None`, so a file created
/// by someone else in the meantime is detected as well. Each entry keeps
/// the source it was read from, so remote inputs can be re-checked before
/// writing local outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSnapshot {
    entries: BTreeMap<String, SnapshotEntry>,
}

impl ContentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: &Source, file_name: &str, content: Option<&str>) {
        self.entries.insert(
            source.location(file_name),
            SnapshotEntry {
                source: source.clone(),
                file_name: file_name.to_string(),
                checksum: content.map(Checksum::of_content),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail if `location` was loaded and its content changed since.
    ///
    /// Locations that were never loaded are not checked.
    pub fn check(&self, location: &str, current: Option<&str>) -> Result<()> {
        let Some(entry) = self.entries.get(location) else {
            return Ok(());
        };
        let actual = current.map(Checksum::of_content);
        if entry.checksum != actual {
            return Err(GlrdError::ConcurrentModification {
                location: location.to_string(),
                expected: describe(entry.checksum.as_ref()),
                actual: describe(actual.as_ref()),
            });
        }
        Ok(())
    }

    /// Re-read every recorded location from the source it was loaded from
    pub fn verify_sources(&self) -> Result<()> {
        for (location, entry) in &self.entries {
            debug!("Verifying {} is unchanged", location);
            let current = entry.source.read(&entry.file_name)?;
            self.check(location, current.as_deref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{LifecycleDate, ReleaseType};
    use crate::version::Version;

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"releases": []}"#;
        assert_eq!(Checksum::of_content(content), Checksum::of_content(content));
        assert_ne!(Checksum::of_content(content), Checksum::of_content("{}"));
        assert_eq!(Checksum::of_content("").as_str().len(), 64);
    }

    #[test]
    fn test_release_checksum_tracks_content() {
        let a = vec![Release::new(
            ReleaseType::Stable,
            Version::major_only(1312),
            LifecycleDate::parse_isodate("2023-11-16").unwrap(),
        )];
        let b = vec![a[0].clone().with_eol(LifecycleDate::parse_isodate("2024-08-03").unwrap())];
        assert_eq!(Checksum::of_releases(&a).unwrap(), Checksum::of_releases(&a).unwrap());
        assert_ne!(Checksum::of_releases(&a).unwrap(), Checksum::of_releases(&b).unwrap());
    }

    #[test]
    fn test_snapshot_detects_changes() {
        let source = Source::Url("https://example.org/glrd".to_string());
        let mut snapshot = ContentSnapshot::new();
        snapshot.record(&source, "releases-stable+patch.json", Some("v1"));
        snapshot.record(&source, "releases-next.json", None);
        let location = |name: &str| source.location(name);

        assert!(snapshot.check(&location("releases-stable+patch.json"), Some("v1")).is_ok());
        assert!(matches!(
            snapshot.check(&location("releases-stable+patch.json"), Some("v2")),
            Err(GlrdError::ConcurrentModification { .. })
        ));
        assert!(snapshot.check(&location("releases-next.json"), Some("created elsewhere")).is_err());
        assert!(snapshot.check(&location("releases-dev.json"), Some("anything")).is_ok());
    }

    #[test]
    fn test_verify_sources_rereads_loaded_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::Dir(dir.path().to_path_buf());
        std::fs::write(dir.path().join("releases-dev.json"), "v1").unwrap();

        let mut snapshot = ContentSnapshot::new();
        snapshot.record(&source, "releases-dev.json", Some("v1"));
        snapshot.record(&source, "releases-next.json", None);
        assert!(snapshot.verify_sources().is_ok());

        std::fs::write(dir.path().join("releases-next.json"), "v1").unwrap();
        assert!(matches!(
            snapshot.verify_sources(),
            Err(GlrdError::ConcurrentModification { .. })
        ));
    }
}
