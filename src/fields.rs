//! Field projection
//!
//! Maps the field tokens accepted by `--fields` to accessor functions over a
//! release record, and builds the structured form used by JSON/YAML output.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::config::ArtifactsConfig;
use crate::error::{GlrdError, Result};
use crate::release::{Attributes, GithubInfo, GitInfo, Lifecycle, Release, ReleaseType};
use crate::version::Version;

/// Placeholder for missing values in tabular output
pub const NOT_AVAILABLE: &str = "N/A";

type Accessor = fn(&Release, &ArtifactsConfig) -> Option<String>;

/// A recognized field token
#[derive(Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    accessor: Accessor,
}

impl Field {
    pub fn value(&self, release: &Release, artifacts: &ArtifactsConfig) -> Option<String> {
        (self.accessor)(release, artifacts)
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

static FIELDS: &[Field] = &[
    Field { name: "Name", accessor: |r, _| Some(r.name.clone()) },
    Field { name: "Version", accessor: |r, _| Some(r.display_version()) },
    Field { name: "Type", accessor: |r, _| Some(r.release_type.to_string()) },
    Field { name: "GitCommit", accessor: |r, _| r.git.as_ref().map(|g| g.commit.clone()) },
    Field { name: "GitCommitShort", accessor: |r, _| r.git.as_ref().map(|g| g.commit_short.clone()) },
    Field { name: "ReleaseDate", accessor: |r, _| Some(r.lifecycle.released.isodate.to_string()) },
    Field {
        name: "ReleaseTime",
        accessor: |r, _| Some(r.lifecycle.released.datetime().format("%H:%M:%S").to_string()),
    },
    Field {
        name: "ExtendedMaintenance",
        accessor: |r, _| r.lifecycle.extended.map(|d| d.isodate.to_string()),
    },
    Field {
        name: "EndOfMaintenance",
        accessor: |r, _| r.lifecycle.eol.map(|d| d.isodate.to_string()),
    },
    Field {
        name: "Flavors",
        accessor: |r, _| r.flavors.as_ref().filter(|f| !f.is_empty()).map(|f| f.join(",")),
    },
    Field { name: "OCI", accessor: |r, a| Some(oci_url(r, a)) },
    Field {
        name: "AttributesSourceRepo",
        accessor: |r, _| r.attributes.as_ref().map(|a| a.source_repo.to_string()),
    },
];

/// All field tokens in table order
pub fn available_fields() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|f| f.name)
}

pub fn lookup(name: &str) -> Option<Field> {
    FIELDS.iter().find(|f| f.name == name).copied()
}

/// Resolve a comma separated field list, rejecting unknown tokens
pub fn resolve_fields(list: &str) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    let mut unknown = Vec::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match lookup(token) {
            Some(field) => fields.push(field),
            None => unknown.push(token),
        }
    }

    if !unknown.is_empty() {
        return Err(GlrdError::UnknownField {
            fields: unknown.join(", "),
            available: available_fields().collect::<Vec<_>>().join(", "),
            suggestion: suggest(unknown[0]),
        });
    }
    Ok(fields)
}

/// Closest known field name for a mistyped token
fn suggest(token: &str) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    available_fields()
        .filter_map(|name| {
            let score = matcher
                .fuzzy_match(name, token)
                .or_else(|| matcher.fuzzy_match(token, name))?;
            Some((score, name))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, name)| name.to_string())
}

/// Ordered `(field, value)` pairs of one record
pub fn project(
    release: &Release,
    fields: &[Field],
    artifacts: &ArtifactsConfig,
) -> Vec<(&'static str, Option<String>)> {
    fields
        .iter()
        .map(|f| (f.name, f.value(release, artifacts)))
        .collect()
}

/// Scalar row for tabular output, missing values shown as `N/A`
pub fn project_row(release: &Release, fields: &[Field], artifacts: &ArtifactsConfig) -> Vec<String> {
    project(release, fields, artifacts)
        .into_iter()
        .map(|(_, value)| value.unwrap_or_else(|| NOT_AVAILABLE.to_string()))
        .collect()
}

/// Version string used in artifact names and image tags
fn artifact_version(version: &Version) -> String {
    format!("{}.{}", version.major, version.minor.unwrap_or(0))
}

/// Container image of a release
pub fn oci_url(release: &Release, artifacts: &ArtifactsConfig) -> String {
    let tag = match release.release_type {
        ReleaseType::Stable | ReleaseType::Next => release.version.major.to_string(),
        _ => artifact_version(&release.version),
    };
    format!("{}:{}", artifacts.container_registry, tag)
}

/// Download locations of one flavor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlavorUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oci: Option<String>,
}

/// Platform part of a flavor such as `aws-gardener_prod-amd64`
pub fn flavor_platform(flavor: &str) -> &str {
    flavor.split('-').next().unwrap_or(flavor)
}

/// Expand flavors into artifact links.
///
/// Container and bare flavors point to images in the registry and are listed
/// after the regular flavors.
pub fn flavor_urls(release: &Release, artifacts: &ArtifactsConfig) -> Vec<(String, FlavorUrls)> {
    let Some(flavors) = release.flavors.as_ref().filter(|f| !f.is_empty()) else {
        return Vec::new();
    };
    let version = artifact_version(&release.version);
    let commit_short = release
        .git
        .as_ref()
        .map(|g| g.commit_short.as_str())
        .unwrap_or_default();

    let mut sorted: Vec<&String> = flavors.iter().collect();
    sorted.sort();

    let mut regular = Vec::new();
    let mut registry = Vec::new();
    for flavor in sorted {
        match flavor_platform(flavor) {
            "container" => registry.push((
                flavor.clone(),
                FlavorUrls {
                    metadata: None,
                    image: None,
                    oci: Some(format!("{}:{}", artifacts.container_registry, version)),
                },
            )),
            "bare" => {
                let base = flavor.rsplit_once('-').map(|(base, _)| base).unwrap_or(flavor);
                registry.push((
                    flavor.clone(),
                    FlavorUrls {
                        metadata: None,
                        image: None,
                        oci: Some(format!("{}/{}:{}", artifacts.container_registry, base, version)),
                    },
                ))
            }
            platform => {
                let artifact = format!("{}-{}-{}", flavor, version, commit_short);
                let base_url = format!(
                    "{}/{}{}",
                    artifacts.base_url.trim_end_matches('/'),
                    artifacts.prefix,
                    artifact
                );
                regular.push((
                    flavor.clone(),
                    FlavorUrls {
                        metadata: Some(format!("{}/{}.manifest", base_url, artifact)),
                        image: Some(format!(
                            "{}/{}.{}",
                            base_url,
                            artifact,
                            artifacts.image_extension(platform)
                        )),
                        oci: None,
                    },
                ));
            }
        }
    }
    regular.extend(registry);
    regular
}

struct FlavorMap(Vec<(String, FlavorUrls)>);

impl Serialize for FlavorMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (flavor, urls) in &self.0 {
            map.serialize_entry(flavor, urls)?;
        }
        map.end()
    }
}

/// Record shape of JSON/YAML query output. Absent values are omitted.
#[derive(Serialize)]
pub struct StructuredRelease<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    release_type: ReleaseType,
    version: &'a Version,
    lifecycle: &'a Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    git: Option<&'a GitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    github: Option<&'a GithubInfo>,
    flavors: FlavorMap,
    oci: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<&'a Attributes>,
}

impl<'a> StructuredRelease<'a> {
    pub fn new(release: &'a Release, artifacts: &ArtifactsConfig) -> Self {
        Self {
            name: &release.name,
            release_type: release.release_type,
            version: &release.version,
            lifecycle: &release.lifecycle,
            git: release.git.as_ref(),
            github: release.github.as_ref(),
            flavors: FlavorMap(flavor_urls(release, artifacts)),
            oci: oci_url(release, artifacts),
            attributes: release.attributes.as_ref(),
        }
    }
}
