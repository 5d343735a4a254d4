//! Release Database Tests
//!
//! Runs the query and management flows over the release files in
//! `tests/fixtures`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glrd::config::{ArtifactsConfig, LifecycleConfig, RepositoryConfig};
use glrd::fields::resolve_fields;
use glrd::git::FixedCommit;
use glrd::lifecycle::chain_all;
use glrd::release::GitInfo;
use glrd::render::render;
use glrd::validate::RecordValidator;
use glrd::{
    Clock, FileFormat, FixedClock, GlrdError, LifecycleDeriver, OutputFormat, Query, Release,
    ReleaseRepository, ReleaseRequest, ReleaseStore, ReleaseType, RenderOptions, Source, Version,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_store() -> ReleaseStore {
    ReleaseStore::new(Source::Dir(fixtures_path()), "releases", FileFormat::Json)
}

fn all_releases() -> Vec<Release> {
    fixture_store().load_all().unwrap().releases
}

/// 2025-03-01T00:00:00Z
fn now() -> DateTime<Utc> {
    FixedClock::at_timestamp(1740787200).now()
}

fn names(records: &[&Release]) -> Vec<String> {
    records.iter().map(|r| r.name.clone()).collect()
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_all_families() {
    let loaded = fixture_store().load_all().unwrap();
    assert_eq!(loaded.releases.len(), 13);
    assert_eq!(loaded.snapshot.len(), 4);
}

#[test]
fn test_load_reads_only_needed_files() {
    let loaded = fixture_store().load(&[ReleaseType::Next]).unwrap();
    assert_eq!(loaded.releases.len(), 1);
    assert_eq!(loaded.snapshot.len(), 1);
    assert!(loaded.releases[0].version.is_next());
}

#[test]
fn test_missing_prefix_is_reported() {
    let store = ReleaseStore::new(Source::Dir(fixtures_path()), "missing", FileFormat::Json);
    let err = store.load(&[ReleaseType::Stable]).unwrap_err();
    assert!(matches!(err, GlrdError::SourceNotFound(_)));
    assert_eq!(err.exit_code(), 9);
}

#[test]
fn test_fixtures_are_valid() {
    let validator = RecordValidator::new().unwrap();
    validator.validate_all(&all_releases()).unwrap();
}

#[test]
fn test_fixture_chain_is_stable() {
    let mut releases = all_releases();
    let before = releases.clone();
    let warnings = chain_all(&mut releases);
    assert!(warnings.is_empty());
    assert_eq!(releases, before);
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_active_stable_and_patch() {
    let releases = all_releases();
    let query = Query::new(vec![ReleaseType::Stable, ReleaseType::Patch]).active();
    let results = query.run(&releases, now());
    assert_eq!(names(&results), vec!["stable-1592", "patch-1592.6"]);
}

#[test]
fn test_archived_patches_of_one_major() {
    let releases = all_releases();
    let query = Query::new(vec![ReleaseType::Patch])
        .version(Version::parse("1312").unwrap())
        .archived();
    let results = query.run(&releases, now());
    assert_eq!(names(&results), vec!["patch-1312.1", "patch-1312.2"]);
}

#[test]
fn test_latest_per_type() {
    let releases = all_releases();
    let latest = |t| {
        Query::new(vec![t])
            .latest()
            .run(&releases, now())
            .first()
            .map(|r| r.name.clone())
    };
    assert_eq!(latest(ReleaseType::Patch).as_deref(), Some("patch-1592.6"));
    assert_eq!(latest(ReleaseType::Nightly).as_deref(), Some("nightly-1533.0"));
    assert_eq!(latest(ReleaseType::Next).as_deref(), Some("next"));
}

#[test]
fn test_everything_is_archived_far_in_the_future() {
    let releases = all_releases();
    let future = FixedClock::at_timestamp(1893456000).now();
    let active = Query::new(vec![ReleaseType::Stable, ReleaseType::Patch])
        .active()
        .run(&releases, future);
    assert!(active.is_empty());
}

// =============================================================================
// Rendering
// =============================================================================

fn options(fields: &str) -> RenderOptions {
    RenderOptions {
        fields: resolve_fields(fields).unwrap(),
        no_header: false,
        description: "Garden Linux Releases".to_string(),
        artifacts: ArtifactsConfig::default(),
    }
}

#[test]
fn test_markdown_of_latest_patch() {
    let releases = all_releases();
    let results = Query::new(vec![ReleaseType::Patch]).latest().run(&releases, now());
    let out = render(&results, OutputFormat::Markdown, &options("Name,Version,EndOfMaintenance")).unwrap();
    assert_eq!(
        out,
        "| Name         | Version | EndOfMaintenance |\n\
         |:-------------|:--------|:-----------------|\n\
         | patch-1592.6 | 1592.6  | 2025-08-12       |"
    );
}

#[test]
fn test_mermaid_gantt_of_active_stable() {
    let releases = all_releases();
    let results = Query::new(vec![ReleaseType::Stable]).active().run(&releases, now());
    let out = render(&results, OutputFormat::MermaidGantt, &options("Name")).unwrap();
    assert!(out.starts_with("gantt\n    title Garden Linux Releases"));
    assert!(out.contains("section 1592"));
    assert!(out.contains("task, 2024-08-12, 9M"));
    assert!(out.contains("task, 2025-05-12, 3M"));
    assert!(!out.contains("section 1443"));
}

#[test]
fn test_json_output_shape() {
    let releases = all_releases();
    let results = Query::new(vec![ReleaseType::Next]).run(&releases, now());
    let out = render(&results, OutputFormat::Json, &options("Name")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["releases"][0]["name"], "next");
    assert_eq!(value["releases"][0]["version"]["major"], "next");
}

// =============================================================================
// Management
// =============================================================================

fn copy_fixtures(dir: &Path) {
    for entry in std::fs::read_dir(fixtures_path()).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), dir.join(entry.file_name())).unwrap();
    }
}

fn deriver() -> LifecycleDeriver {
    LifecycleDeriver::new(&LifecycleConfig::default(), &RepositoryConfig::default())
}

#[test]
fn test_create_patch_and_persist() {
    let dir = tempfile::tempdir().unwrap();
    copy_fixtures(dir.path());
    let store = ReleaseStore::new(Source::Dir(dir.path().to_path_buf()), "releases", FileFormat::Json)
        .allow_missing();

    let loaded = store.load_all().unwrap();
    let mut repo = ReleaseRepository::from_releases(loaded.releases.clone());
    let commits = FixedCommit::new(GitInfo::from_commit("cb05e11f0481b72d0a30da3662295315b220a436").unwrap());

    let mut request = ReleaseRequest::new(ReleaseType::Patch);
    request.flavors = vec!["kvm-amd64".to_string(), "aws-amd64".to_string()];
    let release = deriver().create(&request, &repo, &commits, now()).unwrap();
    assert_eq!(release.name, "patch-1592.7");
    assert_eq!(
        release.github.as_ref().unwrap().release,
        "https://github.com/gardenlinux/gardenlinux/releases/tag/1592.7"
    );
    assert!(repo.upsert(release).unwrap().is_empty());

    let releases = repo.into_releases();
    RecordValidator::new().unwrap().validate_all(&releases).unwrap();
    store.save_checked(&releases, &loaded.snapshot).unwrap();

    let reloaded = store.load(&[ReleaseType::Patch]).unwrap().releases;
    let eol = |name: &str| {
        reloaded
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.lifecycle.eol)
            .map(|d| d.isodate.to_string())
    };
    assert_eq!(eol("patch-1592.6").as_deref(), Some("2025-03-01"));
    assert_eq!(eol("patch-1592.7").as_deref(), Some("2025-08-12"));
    assert_eq!(eol("patch-1312.2").as_deref(), Some("2024-08-03"));
}

#[test]
fn test_create_stable_gets_default_windows() {
    let repo = ReleaseRepository::from_releases(all_releases());
    let commits = FixedCommit::new(GitInfo::from_commit("cb05e11f0481b72d0a30da3662295315b220a436").unwrap());

    let release = deriver()
        .create(&ReleaseRequest::new(ReleaseType::Stable), &repo, &commits, now())
        .unwrap();
    assert_eq!(release.name, "stable-1796");
    assert_eq!(release.lifecycle.extended.unwrap().isodate.to_string(), "2025-09-01");
    assert_eq!(release.lifecycle.eol.unwrap().isodate.to_string(), "2025-12-01");
    assert!(release.git.is_none());
}

#[test]
fn test_delete_patch_and_detect_concurrent_edit() {
    let dir = tempfile::tempdir().unwrap();
    copy_fixtures(dir.path());
    let store = ReleaseStore::new(Source::Dir(dir.path().to_path_buf()), "releases", FileFormat::Json);

    let loaded = store.load_all().unwrap();
    let mut repo = ReleaseRepository::from_releases(loaded.releases.clone());
    let (removed, warnings) = repo.delete_by_name("patch-1592.6").unwrap();
    assert_eq!(removed.name, "patch-1592.6");
    assert!(warnings.is_empty());
    assert_eq!(
        repo.find_by_name("patch-1592.1")
            .and_then(|r| r.lifecycle.eol)
            .map(|d| d.isodate.to_string())
            .as_deref(),
        Some("2025-08-12")
    );

    std::fs::write(dir.path().join("releases-next.json"), r#"{"releases":[]}"#).unwrap();
    let err = store
        .save_checked(&repo.into_releases(), &loaded.snapshot)
        .unwrap_err();
    assert!(matches!(err, GlrdError::ConcurrentModification { .. }));
}
