//! Record validation
//!
//! Every record is checked against a JSON Schema for its type and version
//! era before it is persisted, followed by the consistency rules a schema
//! cannot express (derived names, date pairs, fields a type must not carry).

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::error::{GlrdError, Result};
use crate::release::{Release, ReleaseType};
use crate::version::SchemaEra;

fn date_schema(required: bool) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "isodate": {"type": "string", "format": "date"},
            "timestamp": {"type": "integer"}
        }
    });
    if required {
        schema["required"] = json!(["isodate", "timestamp"]);
    }
    schema
}

fn git_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "commit": {"type": "string", "pattern": "^[0-9a-f]{40}$"},
            "commit_short": {"type": "string", "pattern": "^[0-9a-f]{7,8}$"}
        },
        "required": ["commit", "commit_short"]
    })
}

fn version_schema(release_type: ReleaseType, v2: bool) -> Value {
    match release_type {
        ReleaseType::Next => json!({
            "type": "object",
            "properties": {"major": {"enum": ["next"]}},
            "required": ["major"],
            "additionalProperties": false
        }),
        ReleaseType::Stable => json!({
            "type": "object",
            "properties": {"major": {"type": "integer", "minimum": 0}},
            "required": ["major"],
            "additionalProperties": false
        }),
        _ if v2 => json!({
            "type": "object",
            "properties": {
                "major": {"type": "integer", "minimum": 0},
                "minor": {"type": "integer", "minimum": 0},
                "micro": {"type": "integer", "minimum": 0}
            },
            "required": ["major", "minor", "micro"],
            "additionalProperties": false
        }),
        _ => json!({
            "type": "object",
            "properties": {
                "major": {"type": "integer", "minimum": 0},
                "minor": {"type": "integer", "minimum": 0}
            },
            "required": ["major", "minor"],
            "additionalProperties": false
        }),
    }
}

/// JSON Schema of one record type in one version era
pub fn record_schema(release_type: ReleaseType, v2: bool) -> Value {
    let mut lifecycle = json!({
        "type": "object",
        "properties": {"released": date_schema(true)},
        "required": ["released"]
    });
    match release_type {
        ReleaseType::Stable => {
            lifecycle["properties"]["extended"] = date_schema(false);
            lifecycle["properties"]["eol"] = date_schema(false);
            lifecycle["required"] = json!(["released", "extended", "eol"]);
        }
        ReleaseType::Next => {
            lifecycle["properties"]["extended"] = date_schema(false);
            lifecycle["properties"]["eol"] = date_schema(false);
        }
        ReleaseType::Patch => {
            lifecycle["properties"]["eol"] = date_schema(false);
        }
        ReleaseType::Nightly | ReleaseType::Dev => {}
    }

    let mut schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "type": {"enum": [release_type.as_str()]},
            "version": version_schema(release_type, v2),
            "lifecycle": lifecycle
        },
        "required": ["name", "type", "version", "lifecycle"]
    });

    if release_type.carries_git() {
        schema["properties"]["git"] = git_schema();
        schema["properties"]["flavors"] = json!({"type": "array", "items": {"type": "string"}});
        schema["properties"]["attributes"] = json!({
            "type": "object",
            "properties": {"source_repo": {"type": "boolean", "default": true}},
            "required": ["source_repo"]
        });
        schema["required"] = json!(["name", "type", "version", "lifecycle", "git"]);
    }
    if release_type == ReleaseType::Patch {
        schema["properties"]["github"] = json!({
            "type": "object",
            "properties": {"release": {"type": "string", "format": "uri"}},
            "required": ["release"]
        });
        schema["required"] = json!(["name", "type", "version", "lifecycle", "git", "github"]);
    }
    schema
}

struct CompiledSchema {
    release_type: ReleaseType,
    v2: bool,
    schema: JSONSchema,
}

/// Validates records against their schema and consistency rules
pub struct RecordValidator {
    schemas: Vec<CompiledSchema>,
}

impl RecordValidator {
    /// Compile the schemas of every type and era
    pub fn new() -> Result<Self> {
        let mut schemas = Vec::new();
        for release_type in ReleaseType::ALL {
            for v2 in [false, true] {
                let raw = record_schema(release_type, v2);
                let schema = JSONSchema::options()
                    .with_draft(Draft::Draft7)
                    .compile(&raw)
                    .map_err(|e| GlrdError::Validation {
                        errors: vec![format!("invalid {} schema: {}", release_type, e)],
                    })?;
                schemas.push(CompiledSchema {
                    release_type,
                    v2,
                    schema,
                });
            }
        }
        Ok(Self { schemas })
    }

    fn schema_for(&self, release: &Release) -> Option<&JSONSchema> {
        let v2 = release.version.era() == SchemaEra::V2;
        self.schemas
            .iter()
            .find(|s| s.release_type == release.release_type && s.v2 == v2)
            .map(|s| &s.schema)
    }

    /// All problems found in one record
    pub fn check(&self, release: &Release) -> Result<Vec<String>> {
        let mut problems = Vec::new();
        let instance = serde_json::to_value(release)?;

        if let Some(schema) = self.schema_for(release) {
            if let Err(errors) = schema.validate(&instance) {
                for e in errors {
                    problems.push(format!(
                        "Validation error for release '{}' at '{}': {}",
                        release.name, e.instance_path, e
                    ));
                }
            }
        }

        problems.extend(
            consistency_problems(release)
                .into_iter()
                .map(|p| format!("Validation error for release '{}': {}", release.name, p)),
        );
        Ok(problems)
    }

    /// Validate every record, failing with all problems at once
    pub fn validate_all(&self, releases: &[Release]) -> Result<()> {
        let mut errors = Vec::new();
        for release in releases {
            for problem in self.check(release)? {
                error!("{}", problem);
                errors.push(problem);
            }
        }
        if errors.is_empty() {
            debug!("{} release(s) validated", releases.len());
            Ok(())
        } else {
            Err(GlrdError::Validation { errors })
        }
    }
}

fn consistency_problems(release: &Release) -> Vec<String> {
    let mut problems = Vec::new();
    let lifecycle = &release.lifecycle;

    let expected = release.expected_name();
    if release.name != expected {
        problems.push(format!("name should be '{}'", expected));
    }

    let dates = [
        ("released", Some(&lifecycle.released)),
        ("extended", lifecycle.extended.as_ref()),
        ("eol", lifecycle.eol.as_ref()),
    ];
    for (label, date) in dates {
        if let Some(date) = date {
            if !date.is_consistent() {
                problems.push(format!(
                    "lifecycle.{} timestamp {} is not on {}",
                    label, date.timestamp, date.isodate
                ));
            }
        }
    }

    match release.release_type {
        ReleaseType::Stable | ReleaseType::Next => {
            if release.git.is_some() || release.flavors.is_some() {
                problems.push(format!("{} releases carry no git or flavors", release.release_type));
            }
        }
        ReleaseType::Patch => {
            if lifecycle.extended.is_some() {
                problems.push("patch releases have no extended maintenance".to_string());
            }
        }
        ReleaseType::Nightly | ReleaseType::Dev => {
            if lifecycle.extended.is_some() || lifecycle.eol.is_some() {
                problems.push(format!(
                    "{} releases have no extended maintenance or end of life",
                    release.release_type
                ));
            }
        }
    }

    // Patch EOLs follow the minor order of their family, not release dates.
    let eol_before_release = lifecycle
        .eol
        .is_some_and(|eol| eol.timestamp < lifecycle.released.timestamp);
    if eol_before_release && release.release_type != ReleaseType::Patch {
        problems.push("end of life lies before the release date".to_string());
    }
    problems
}
