//! Git context detection from a process working directory.

use std::fs;
use std::path::Path;

use serde::Serialize;

/// Repository a process was started from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitContext {
    pub repo_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Detect git repo and branch from a process working directory.
///
/// Returns `None` if cwd is a system directory (e.g. `/`), no `.git` is found,
/// or the path is not readable.
pub fn detect_git_context(cwd: &Path) -> Option<GitContext> {
    // Daemons typically chdir("/").
    if cwd == Path::new("/") || cwd.starts_with("/usr") || cwd.starts_with("/var/run") {
        return None;
    }

    let repo = cwd.ancestors().find(|dir| dir.join(".git").exists())?;

    let branch = fs::read_to_string(repo.join(".git").join("HEAD"))
        .ok()
        .map(|content| {
            let content = content.trim();
            match content.strip_prefix("ref: refs/heads/") {
                Some(branch) => branch.to_string(),
                // Detached HEAD: short hash.
                None => content.chars().take(8).collect(),
            }
        });

    let repo_name = repo
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| repo.to_string_lossy().into_owned());

    Some(GitContext { repo_name, branch })
}
