//! Change report between two record sets

use std::collections::BTreeMap;
use std::fmt;

use similar::{ChangeTag, TextDiff};
use tracing::info;

use crate::error::Result;
use crate::release::Release;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Deleted,
    Updated,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Created => "created",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Updated => "updated",
        })
    }
}

/// One record that differs between the two sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseChange {
    pub name: String,
    pub kind: ChangeKind,
    /// Changed lines of the pretty printed record, prefixed with `-` or `+`
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub changes: Vec<ReleaseChange>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// Log every change at info level
    pub fn log(&self) {
        if self.is_empty() {
            info!("No release changes");
            return;
        }
        for change in &self.changes {
            info!("{} - release will be {}.", change.name, change.kind);
            for line in &change.lines {
                info!("{} - {}", change.name, line);
            }
        }
    }
}

/// Compare records by name
pub fn diff_releases(before: &[Release], after: &[Release]) -> Result<ChangeReport> {
    let old: BTreeMap<&str, &Release> = before.iter().map(|r| (r.name.as_str(), r)).collect();
    let new: BTreeMap<&str, &Release> = after.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut changes = Vec::new();
    for (name, release) in &new {
        match old.get(name) {
            None => changes.push(ReleaseChange {
                name: name.to_string(),
                kind: ChangeKind::Created,
                lines: Vec::new(),
            }),
            Some(previous) if *previous != *release => changes.push(ReleaseChange {
                name: name.to_string(),
                kind: ChangeKind::Updated,
                lines: changed_lines(previous, release)?,
            }),
            Some(_) => {}
        }
    }
    for name in old.keys().filter(|name| !new.contains_key(*name)) {
        changes.push(ReleaseChange {
            name: name.to_string(),
            kind: ChangeKind::Deleted,
            lines: Vec::new(),
        });
    }
    Ok(ChangeReport { changes })
}

fn changed_lines(old: &Release, new: &Release) -> Result<Vec<String>> {
    let old_text = serde_json::to_string_pretty(old)?;
    let new_text = serde_json::to_string_pretty(new)?;
    let diff = TextDiff::from_lines(&old_text, &new_text);

    let mut lines = Vec::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => continue,
        };
        lines.push(format!("{} {}", sign, change.value().trim()));
    }
    Ok(lines)
}
