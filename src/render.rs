//! Output renderers for query results

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ArtifactsConfig;
use crate::error::{GlrdError, Result};
use crate::fields::{project_row, Field, StructuredRelease};
use crate::release::{LifecycleDate, Release};

const AVG_DAYS_PER_MONTH: f64 = 30.44;

/// Query output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Shell,
    Markdown,
    Json,
    Yaml,
    MermaidGantt,
}

impl FromStr for OutputFormat {
    type Err = GlrdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shell" => Ok(OutputFormat::Shell),
            "markdown" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "mermaid_gantt" => Ok(OutputFormat::MermaidGantt),
            other => Err(GlrdError::InvalidArgument(format!(
                "unknown output format '{}' (shell, markdown, json, yaml, mermaid_gantt)",
                other
            ))),
        }
    }
}

/// Everything a renderer needs besides the records
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub fields: Vec<Field>,
    pub no_header: bool,
    /// Chart title
    pub description: String,
    pub artifacts: ArtifactsConfig,
}

/// Render records in the requested format
pub fn render(records: &[&Release], format: OutputFormat, options: &RenderOptions) -> Result<String> {
    match format {
        OutputFormat::Shell | OutputFormat::Markdown => {
            let headers: Vec<String> = options.fields.iter().map(|f| f.name.to_string()).collect();
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|r| project_row(r, &options.fields, &options.artifacts))
                .collect();
            let headers = (!options.no_header).then_some(headers.as_slice());
            Ok(if format == OutputFormat::Shell {
                plain_table(headers, &rows)
            } else {
                pipe_table(headers, &rows)
            })
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&structured(records, &options.artifacts))?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&structured(records, &options.artifacts))?),
        OutputFormat::MermaidGantt => Ok(mermaid_gantt(records, &options.description)),
    }
}

#[derive(Serialize)]
struct StructuredOutput<'a> {
    releases: Vec<StructuredRelease<'a>>,
}

fn structured<'a>(records: &[&'a Release], artifacts: &ArtifactsConfig) -> StructuredOutput<'a> {
    StructuredOutput {
        releases: records
            .iter()
            .map(|r| StructuredRelease::new(r, artifacts))
            .collect(),
    }
}

fn column_widths(headers: Option<&[String]>, rows: &[Vec<String>]) -> Vec<usize> {
    let columns = headers
        .map(<[String]>::len)
        .or_else(|| rows.first().map(Vec::len))
        .unwrap_or(0);
    (0..columns)
        .map(|i| {
            let header = headers.map(|h| h[i].chars().count()).unwrap_or(0);
            rows.iter()
                .map(|row| row[i].chars().count())
                .fold(header, usize::max)
        })
        .collect()
}

fn pad(cell: &str, width: usize) -> String {
    format!("{:<width$}", cell, width = width)
}

/// Left aligned columns separated by two spaces
pub fn plain_table(headers: Option<&[String]>, rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    if let Some(headers) = headers {
        lines.push(line(headers));
    }
    lines.extend(rows.iter().map(|row| line(row)));
    lines.join("\n")
}

/// Markdown pipe table
pub fn pipe_table(headers: Option<&[String]>, rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let line = |cells: &[String]| -> String {
        let inner: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect();
        format!("| {} |", inner.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    if let Some(headers) = headers {
        lines.push(line(headers));
        let rule: Vec<String> = widths.iter().map(|w| format!(":{}", "-".repeat(w + 1))).collect();
        lines.push(format!("|{}|", rule.join("|")));
    }
    lines.extend(rows.iter().map(|row| line(row)));
    lines.join("\n")
}

fn months_between(start: &LifecycleDate, end: &LifecycleDate) -> i64 {
    let days = (end.isodate - start.isodate).num_days() as f64;
    (days / AVG_DAYS_PER_MONTH).round() as i64
}

/// Mermaid Gantt chart with one section per release
pub fn mermaid_gantt(records: &[&Release], title: &str) -> String {
    let mut out = String::new();
    out.push_str("gantt\n");
    out.push_str(&format!("    title {}\n", title));
    out.push_str("    axisFormat %m.%y");

    for release in records {
        let lifecycle = &release.lifecycle;
        let released = &lifecycle.released;
        out.push_str(&format!("\n    section {}", release.display_version()));
        out.push_str(&format!(
            "\n        Release:                milestone, {}, 0m",
            released.isodate
        ));

        if let Some(extended) = &lifecycle.extended {
            out.push_str(&format!(
                "\n        Standard maintenance:       task, {}, {}M",
                released.isodate,
                months_between(released, extended)
            ));
        }

        match (&lifecycle.extended, &lifecycle.eol) {
            (Some(extended), Some(eol)) => {
                out.push_str(&format!(
                    "\n        Extended maintenance:       milestone, {}, 0m",
                    extended.isodate
                ));
                out.push_str(&format!(
                    "\n        Extended maintenance:       task, {}, {}M",
                    extended.isodate,
                    months_between(extended, eol)
                ));
                out.push_str(&format!(
                    "\n        End of maintenance:         milestone, {}, 0m",
                    eol.isodate
                ));
            }
            (None, Some(eol)) => {
                out.push_str(&format!(
                    "\n        End of maintenance:         milestone, {}, 0m",
                    eol.isodate
                ));
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::resolve_fields;
    use crate::release::ReleaseType;
    use crate::version::Version;

    fn date(s: &str) -> LifecycleDate {
        LifecycleDate::parse_isodate(s).unwrap()
    }

    fn records() -> Vec<Release> {
        vec![
            Release::new(ReleaseType::Stable, Version::major_only(1312), date("2023-11-16"))
                .with_extended(date("2024-05-03"))
                .with_eol(date("2024-08-03")),
            Release::new(ReleaseType::Patch, Version::new(1312, Some(1), None), date("2023-11-23"))
                .with_eol(date("2024-01-15")),
        ]
    }

    fn options(fields: &str) -> RenderOptions {
        RenderOptions {
            fields: resolve_fields(fields).unwrap(),
            no_header: false,
            description: "Garden Linux Releases".to_string(),
            artifacts: ArtifactsConfig::default(),
        }
    }

    #[test]
    fn test_shell_table() {
        let records = records();
        let refs: Vec<&Release> = records.iter().collect();
        let out = render(&refs, OutputFormat::Shell, &options("Name,Version,EndOfMaintenance")).unwrap();
        let expected = "\
Name          Version  EndOfMaintenance
stable-1312   1312     2024-08-03
patch-1312.1  1312.1   2024-01-15";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_shell_table_without_header() {
        let records = records();
        let refs: Vec<&Release> = records.iter().collect();
        let mut opts = options("Name,GitCommitShort");
        opts.no_header = true;
        let out = render(&refs, OutputFormat::Shell, &opts).unwrap();
        assert_eq!(out, "stable-1312   N/A\npatch-1312.1  N/A");
    }

    #[test]
    fn test_markdown_table() {
        let records = records();
        let refs: Vec<&Release> = records.iter().take(1).collect();
        let out = render(&refs, OutputFormat::Markdown, &options("Name,Type")).unwrap();
        let expected = "\
| Name        | Type   |
|:------------|:-------|
| stable-1312 | stable |";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_json_output_wraps_releases() {
        let records = records();
        let refs: Vec<&Release> = records.iter().collect();
        let out = render(&refs, OutputFormat::Json, &options("Name")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["releases"].as_array().unwrap().len(), 2);
        assert_eq!(value["releases"][0]["oci"], "ghcr.io/gardenlinux/gardenlinux:1312");
    }

    #[test]
    fn test_yaml_output() {
        let records = records();
        let refs: Vec<&Release> = records.iter().collect();
        let out = render(&refs, OutputFormat::Yaml, &options("Name")).unwrap();
        assert!(out.starts_with("releases:"));
        assert!(out.contains("name: patch-1312.1"));
    }

    #[test]
    fn test_mermaid_gantt() {
        let records = records();
        let refs: Vec<&Release> = records.iter().collect();
        let out = mermaid_gantt(&refs, "Garden Linux Releases");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "gantt");
        assert_eq!(lines[1], "    title Garden Linux Releases");
        assert_eq!(lines[2], "    axisFormat %m.%y");
        assert_eq!(lines[3], "    section 1312");
        assert!(out.contains("Standard maintenance:       task, 2023-11-16, 6M"));
        assert!(out.contains("Extended maintenance:       task, 2024-05-03, 3M"));
        assert!(out.contains("    section 1312.1"));
        assert!(out.ends_with("End of maintenance:         milestone, 2024-01-15, 0m"));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("mermaid_gantt".parse::<OutputFormat>().unwrap(), OutputFormat::MermaidGantt);
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
