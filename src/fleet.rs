use crate::{
    command::CommandPort,
    errors::{MultiMergeError, Result},
};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// One git working copy of the fleet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub id: String,
    pub root: PathBuf,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string());
        Self { id, root }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Branch each repository was on before the run, keyed by working copy root
#[derive(Debug, Clone, Default)]
pub struct OriginalBranchMap {
    branches: HashMap<PathBuf, String>,
}

impl OriginalBranchMap {
    /// Snapshot the current branch of every repository
    ///
    /// Fails before anything is mutated if one of them is not on a branch
    pub fn snapshot(port: &dyn CommandPort, fleet: &[Repository]) -> Result<Self> {
        let mut branches = HashMap::new();
        for repository in fleet {
            let branch = port.current_branch(repository)?;
            log::debug!("{} is on {}", repository, branch);
            branches.insert(repository.root.clone(), branch);
        }
        Ok(Self { branches })
    }

    pub fn get(&self, repository: &Repository) -> Option<&str> {
        self.branches.get(&repository.root).map(String::as_str)
    }
}

fn is_working_copy(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Fall back to the full path for repositories whose directory names collide
fn with_unique_ids(mut fleet: Vec<Repository>) -> Vec<Repository> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for repository in &fleet {
        *counts.entry(repository.id.clone()).or_default() += 1;
    }
    for repository in &mut fleet {
        if counts[&repository.id] > 1 {
            repository.id = repository.root.display().to_string();
        }
    }
    fleet
}

/// Find the repositories of the fleet
///
/// The root itself when it is a working copy, then every direct child that is one,
/// sorted so the enumeration order is stable between runs.
pub fn discover(root: &Path) -> Result<Vec<Repository>> {
    let mut fleet = Vec::new();
    if is_working_copy(root) {
        fleet.push(Repository::new(root));
    }

    let mut children = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() && is_working_copy(&path) {
            children.push(path);
        }
    }
    children.sort();
    fleet.extend(children.into_iter().map(Repository::new));

    if fleet.is_empty() {
        return Err(MultiMergeError::NoRepositories(root.display().to_string()));
    }
    log::info!("Found {} repositories under {}", fleet.len(), root.display());
    Ok(with_unique_ids(fleet))
}

/// Use the given paths as the fleet, in command-line order
pub fn from_paths(paths: &[PathBuf]) -> Result<Vec<Repository>> {
    let mut fleet = Vec::new();
    for path in paths {
        if !is_working_copy(path) {
            return Err(MultiMergeError::NoRepositories(path.display().to_string()));
        }
        fleet.push(Repository::new(path));
    }
    Ok(with_unique_ids(fleet))
}

/// Every local and remote branch name known anywhere in the fleet
pub fn branch_catalog(port: &dyn CommandPort, fleet: &[Repository]) -> Result<Vec<String>> {
    let mut names = BTreeSet::new();
    for repository in fleet {
        names.extend(port.local_branches(repository)?);
        names.extend(port.remote_branches(repository)?);
    }
    Ok(names.into_iter().collect())
}
