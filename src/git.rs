//! Commit lookup for new releases

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use git2::{Oid, Repository, Sort};
use tracing::debug;

use crate::error::{GlrdError, Result};
use crate::release::GitInfo;

/// Supplies the source commit a release was built from
pub trait CommitSource {
    /// Newest commit at or before `at`
    fn commit_at(&self, at: DateTime<Utc>) -> Result<GitInfo>;
}

/// Always answers with the same commit
#[derive(Debug, Clone)]
pub struct FixedCommit(GitInfo);

impl FixedCommit {
    pub fn new(git: GitInfo) -> Self {
        Self(git)
    }
}

impl CommitSource for FixedCommit {
    fn commit_at(&self, _at: DateTime<Utc>) -> Result<GitInfo> {
        Ok(self.0.clone())
    }
}

/// Walks the history of a branch in a local checkout.
///
/// The repository is only opened when a commit is requested, so records
/// that carry no commit never touch the checkout.
#[derive(Debug, Clone)]
pub struct RepositoryCommits {
    path: PathBuf,
    branch: String,
}

impl RepositoryCommits {
    pub fn new(path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            branch: branch.into(),
        }
    }

    fn branch_tip(&self, repo: &Repository) -> Result<Oid> {
        let candidates = [
            format!("refs/heads/{}", self.branch),
            format!("refs/remotes/origin/{}", self.branch),
        ];
        for name in &candidates {
            if let Ok(reference) = repo.find_reference(name) {
                if let Some(oid) = reference.target() {
                    return Ok(oid);
                }
            }
        }
        debug!("Branch {} not found, using HEAD", self.branch);
        Ok(repo.head()?.peel_to_commit()?.id())
    }
}

impl CommitSource for RepositoryCommits {
    fn commit_at(&self, at: DateTime<Utc>) -> Result<GitInfo> {
        let repo = Repository::discover(&self.path)?;
        let mut walk = repo.revwalk()?;
        walk.push(self.branch_tip(&repo)?)?;
        walk.set_sorting(Sort::TIME)?;

        for oid in walk {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            if commit.time().seconds() <= at.timestamp() {
                debug!("Commit {} is the newest before {}", oid, at);
                return GitInfo::from_commit(&oid.to_string());
            }
        }
        Err(GlrdError::Git(git2::Error::from_str(&format!(
            "no commit on {} at or before {}",
            self.branch, at
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Signature, Time};

    fn commit_at(repo: &Repository, seconds: i64, message: &str) -> Oid {
        let sig = Signature::new("glrd", "glrd@example.org", &Time::new(seconds, 0)).unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap()
    }

    #[test]
    fn test_commit_at_picks_newest_before() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = commit_at(&repo, 1_700_000_000, "first");
        let second = commit_at(&repo, 1_700_100_000, "second");

        let commits = RepositoryCommits::new(dir.path(), "does-not-exist");
        let at = |ts| DateTime::<Utc>::from_timestamp(ts, 0).unwrap();

        assert_eq!(commits.commit_at(at(1_700_050_000)).unwrap().commit, first.to_string());
        assert_eq!(commits.commit_at(at(1_800_000_000)).unwrap().commit, second.to_string());
        assert!(commits.commit_at(at(1_600_000_000)).is_err());
    }

    #[test]
    fn test_fixed_commit() {
        let git = GitInfo::from_commit("cb05e11f0481b72d0a30da3662295315b220a436").unwrap();
        let source = FixedCommit::new(git.clone());
        assert_eq!(source.commit_at(Utc::now()).unwrap(), git);
    }
}
