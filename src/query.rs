//! Query engine
//!
//! Pure filters over borrowed release records. Nothing here mutates a
//! record; every function returns the subset it keeps.

use chrono::{DateTime, Utc};

use crate::release::{Release, ReleaseType};
use crate::version::Version;

/// Keep records whose type is in `types`
pub fn filter_by_type<'a>(
    records: impl IntoIterator<Item = &'a Release>,
    types: &[ReleaseType],
) -> Vec<&'a Release> {
    records
        .into_iter()
        .filter(|r| types.contains(&r.release_type))
        .collect()
}

/// Keep records whose version matches `prefix`
pub fn filter_by_version<'a>(
    records: impl IntoIterator<Item = &'a Release>,
    prefix: &Version,
) -> Vec<&'a Release> {
    records
        .into_iter()
        .filter(|r| r.version.matches_prefix(prefix))
        .collect()
}

/// Whether a record is still maintained at `now`
pub fn is_active(record: &Release, now: DateTime<Utc>) -> bool {
    if record.release_type == ReleaseType::Next {
        return true;
    }
    match record.eol_timestamp() {
        Some(eol) => now.timestamp() < eol,
        None => true,
    }
}

/// Whether a record has reached its end of life at `now`
pub fn is_archived(record: &Release, now: DateTime<Utc>) -> bool {
    record.eol_timestamp().is_some() && !is_active(record, now)
}

pub fn filter_active<'a>(
    records: impl IntoIterator<Item = &'a Release>,
    now: DateTime<Utc>,
) -> Vec<&'a Release> {
    records.into_iter().filter(|r| is_active(r, now)).collect()
}

pub fn filter_archived<'a>(
    records: impl IntoIterator<Item = &'a Release>,
    now: DateTime<Utc>,
) -> Vec<&'a Release> {
    records.into_iter().filter(|r| is_archived(r, now)).collect()
}

/// Sort by display order of the type, then by version
pub fn sort(records: &mut [&Release]) {
    records.sort_by(|a, b| {
        a.release_type
            .rank()
            .cmp(&b.release_type.rank())
            .then_with(|| a.version.cmp(&b.version))
    });
}

/// The record with the greatest version, regardless of lifecycle state.
///
/// Ties on version go to the most recently released record.
pub fn newest<'a>(records: impl IntoIterator<Item = &'a Release>) -> Option<&'a Release> {
    records.into_iter().max_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then_with(|| a.released_timestamp().cmp(&b.released_timestamp()))
    })
}

/// The active record with the greatest version
pub fn find_latest<'a>(
    records: impl IntoIterator<Item = &'a Release>,
    now: DateTime<Utc>,
) -> Option<&'a Release> {
    newest(records.into_iter().filter(|r| is_active(r, now)))
}

/// Which lifecycle state a query keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    #[default]
    Any,
    Active,
    Archived,
}

/// A composed query as issued by the command line
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub types: Vec<ReleaseType>,
    pub version: Option<Version>,
    pub state: StateFilter,
    pub latest: bool,
}

impl Query {
    pub fn new(types: Vec<ReleaseType>) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    pub fn version(mut self, prefix: Version) -> Self {
        self.version = Some(prefix);
        self
    }

    pub fn active(mut self) -> Self {
        self.state = StateFilter::Active;
        self
    }

    pub fn archived(mut self) -> Self {
        self.state = StateFilter::Archived;
        self
    }

    pub fn latest(mut self) -> Self {
        self.latest = true;
        self
    }

    /// Apply version, type and state filters, then latest selection and sort.
    ///
    /// `latest` picks the newest active record, or the newest archived one
    /// when the query is restricted to archived records.
    pub fn run<'a>(
        &self,
        records: impl IntoIterator<Item = &'a Release>,
        now: DateTime<Utc>,
    ) -> Vec<&'a Release> {
        let mut selected: Vec<&Release> = records.into_iter().collect();

        if let Some(prefix) = &self.version {
            selected = filter_by_version(selected, prefix);
        }
        if !self.types.is_empty() {
            selected = filter_by_type(selected, &self.types);
        }
        selected = match self.state {
            StateFilter::Any => selected,
            StateFilter::Active => filter_active(selected, now),
            StateFilter::Archived => filter_archived(selected, now),
        };
        if self.latest {
            let latest = match self.state {
                StateFilter::Archived => newest(selected),
                StateFilter::Any | StateFilter::Active => find_latest(selected, now),
            };
            selected = latest.into_iter().collect();
        }

        sort(&mut selected);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::LifecycleDate;

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(ts, 0).unwrap()
    }

    fn release(release_type: ReleaseType, version: &str, released: i64) -> Release {
        Release::new(
            release_type,
            Version::parse(version).unwrap(),
            LifecycleDate::from_timestamp(released).unwrap(),
        )
    }

    #[test]
    fn test_active_boundary() {
        let now = 1_722_643_200;
        let expired = release(ReleaseType::Stable, "1312", 1_700_000_000)
            .with_eol(LifecycleDate::from_timestamp(now).unwrap());
        let alive = release(ReleaseType::Stable, "1443", 1_700_000_000)
            .with_eol(LifecycleDate::from_timestamp(now + 1).unwrap());

        assert!(!is_active(&expired, at(now)));
        assert!(is_archived(&expired, at(now)));
        assert!(is_active(&alive, at(now)));
        assert!(!is_archived(&alive, at(now)));
    }

    #[test]
    fn test_records_without_eol_are_active_not_archived() {
        let nightly = release(ReleaseType::Nightly, "1443.0", 1_700_000_000);
        assert!(is_active(&nightly, at(i64::from(u32::MAX))));
        assert!(!is_archived(&nightly, at(i64::from(u32::MAX))));
    }

    #[test]
    fn test_next_is_always_active() {
        let next = release(ReleaseType::Next, "next", 1_700_000_000)
            .with_eol(LifecycleDate::from_timestamp(1_700_000_001).unwrap());
        assert!(is_active(&next, at(1_800_000_000)));
    }

    #[test]
    fn test_find_latest() {
        let records = vec![
            release(ReleaseType::Patch, "1592.1", 1_700_000_000),
            release(ReleaseType::Patch, "1592.6", 1_710_000_000),
            release(ReleaseType::Stable, "1592", 1_690_000_000),
        ];
        let latest = find_latest(&records, at(1_720_000_000)).unwrap();
        assert_eq!(latest.name, "patch-1592.6");
        assert!(find_latest(Vec::<&Release>::new(), at(0)).is_none());
    }

    #[test]
    fn test_find_latest_breaks_ties_by_release_time() {
        let records = vec![
            release(ReleaseType::Patch, "1592.6", 1_700_000_000),
            release(ReleaseType::Nightly, "1592.6", 1_710_000_000),
        ];
        let latest = find_latest(&records, at(1_720_000_000)).unwrap();
        assert_eq!(latest.release_type, ReleaseType::Nightly);
    }

    #[test]
    fn test_latest_archived_record() {
        let eol = LifecycleDate::from_timestamp(1_600_000_000).unwrap();
        let records = vec![
            release(ReleaseType::Stable, "576", 1_500_000_000).with_eol(eol),
            release(ReleaseType::Stable, "934", 1_550_000_000).with_eol(eol),
            release(ReleaseType::Stable, "1312", 1_650_000_000),
        ];
        let archived = Query::new(vec![ReleaseType::Stable]).archived();
        assert_eq!(archived.run(&records, at(1_700_000_000)).len(), 2);

        let latest = archived.latest().run(&records, at(1_700_000_000));
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].name, "stable-934");
    }

    #[test]
    fn test_sort_groups_by_type_then_version() {
        let records = vec![
            release(ReleaseType::Patch, "1443.2", 0),
            release(ReleaseType::Stable, "1443", 0),
            release(ReleaseType::Patch, "1312.9", 0),
            release(ReleaseType::Stable, "1312", 0),
        ];
        let mut refs: Vec<&Release> = records.iter().collect();
        sort(&mut refs);
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["stable-1312", "stable-1443", "patch-1312.9", "patch-1443.2"]);
    }

    #[test]
    fn test_composed_query() {
        let records = vec![
            release(ReleaseType::Stable, "1312", 0),
            release(ReleaseType::Patch, "1312.1", 10),
            release(ReleaseType::Patch, "1312.2", 20),
            release(ReleaseType::Patch, "1443.0", 30),
            release(ReleaseType::Nightly, "1312.0", 40),
        ];
        let query = Query::new(vec![ReleaseType::Patch])
            .version(Version::parse("1312").unwrap())
            .latest();
        let result = query.run(&records, at(100));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "patch-1312.2");
    }
}
