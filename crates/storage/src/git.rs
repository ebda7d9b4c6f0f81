//! Commit-and-push of the data directory so a hosted instance keeps its logs.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use common::{Error, Result};

pub struct GitSync {
    repo_dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl GitSync {
    pub fn new(repo_dir: impl Into<PathBuf>, paths: Vec<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            paths,
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Stage the tracked paths, commit and push. Returns `false` without
    /// committing when none of them changed.
    pub async fn commit_and_push(&self, message: &str) -> Result<bool> {
        let mut status_args = vec!["status".to_string(), "--porcelain".to_string(), "--".to_string()];
        status_args.extend(self.path_args());
        let status = self.git(&status_args).await?;
        if !porcelain_has_changes(&status) {
            debug!("No data changes to commit");
            return Ok(false);
        }

        let mut add_args = vec!["add".to_string(), "--".to_string()];
        add_args.extend(self.path_args());
        self.git(&add_args).await?;
        self.git(&["commit".into(), "-m".into(), message.into()]).await?;
        self.git(&["push".into()]).await?;

        info!(message, "Committed and pushed data files");
        Ok(true)
    }

    fn path_args(&self) -> impl Iterator<Item = String> + '_ {
        self.paths.iter().map(|p| p.display().to_string())
    }

    async fn git(&self, args: &[String]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git {} exited with {}: {}",
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// True when `git status --porcelain` output lists at least one entry.
pub fn porcelain_has_changes(output: &str) -> bool {
    output.lines().any(|line| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_output() {
        assert!(!porcelain_has_changes(""));
        assert!(!porcelain_has_changes("\n  \n"));
        assert!(porcelain_has_changes(" M data/spy_1min.csv\n"));
        assert!(porcelain_has_changes("?? data/ma_signals.csv\n"));
    }

    #[tokio::test]
    async fn outside_a_repository_is_a_git_error() {
        let dir = tempfile::tempdir().unwrap();
        let sync = GitSync::new(dir.path(), vec![PathBuf::from("data")]);
        // Either git is missing or the directory is not a work tree.
        let err = sync.commit_and_push("update").await.unwrap_err();
        assert!(matches!(err, Error::Git(_)));
    }
}
