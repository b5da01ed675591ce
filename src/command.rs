use crate::{
    errors::{MultiMergeError, Result},
    fleet::Repository,
};
use git2::BranchType;
use regex::Regex;
use std::process::Command;

/// A mutating git operation against one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitAction {
    CheckoutNewBranch(String),
    Merge(Vec<String>),
    ResetMerge,
    Checkout { branch: String, force: bool },
    DeleteBranch { name: String, force: bool },
}

impl GitAction {
    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match self {
            GitAction::CheckoutNewBranch(name) => {
                args.extend(["checkout".into(), "-b".into(), name.clone()]);
            }
            GitAction::Merge(branches) => {
                args.extend(["merge".into(), "--no-edit".into()]);
                args.extend(branches.iter().cloned());
            }
            GitAction::ResetMerge => {
                args.extend(["reset".into(), "--merge".into()]);
            }
            GitAction::Checkout { branch, force } => {
                args.push("checkout".into());
                if *force {
                    args.push("--force".into());
                }
                args.push(branch.clone());
            }
            GitAction::DeleteBranch { name, force } => {
                let flag = if *force { "-D" } else { "-d" };
                args.extend(["branch".into(), flag.into(), name.clone()]);
            }
        }
        args
    }
}

/// Outcome of one action against one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: i32,
    pub error: String,
    /// The referenced branch does not exist there; not a failure
    pub skip: bool,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: 0,
            error: String::new(),
            skip: false,
        }
    }

    pub fn failed(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            error: error.into(),
            skip: false,
        }
    }

    pub fn skipped() -> Self {
        Self {
            success: true,
            exit_code: 1,
            error: String::new(),
            skip: true,
        }
    }
}

/// Everything the orchestration needs from version control
pub trait CommandPort {
    fn run(&self, repository: &Repository, action: &GitAction) -> CommandResult;
    fn local_branches(&self, repository: &Repository) -> Result<Vec<String>>;
    fn remote_branches(&self, repository: &Repository) -> Result<Vec<String>>;
    fn find_branch(&self, repository: &Repository, name: &str) -> Result<bool>;
    fn current_branch(&self, repository: &Repository) -> Result<String>;
}

/// Runs mutations through the `git` executable and answers queries with libgit2
pub struct GitCli {
    invalid_reference: Regex,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            invalid_reference: Regex::new(
                r"(?i)(not something we can merge|invalid reference|unknown revision)",
            )
            .expect("static regex"),
        }
    }

    fn git(&self, repository: &Repository, args: &[String]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&repository.root)
            .output()
            .map_err(|e| MultiMergeError::GitCli(format!("Failed to execute git command: {}", e)))
    }

    fn open(&self, repository: &Repository) -> Result<git2::Repository> {
        Ok(git2::Repository::open(&repository.root)?)
    }

    fn branch_names(&self, repository: &Repository, kind: BranchType) -> Result<Vec<String>> {
        let repo = self.open(repository)?;
        let mut names = Vec::new();
        for branch in repo.branches(Some(kind))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                // `origin/HEAD` is a symbolic pointer, not a branch anyone merges
                if !name.ends_with("/HEAD") {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    pub fn is_invalid_reference(&self, stderr: &str) -> bool {
        self.invalid_reference.is_match(stderr)
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandPort for GitCli {
    fn run(&self, repository: &Repository, action: &GitAction) -> CommandResult {
        let args = action.args();
        log::debug!("[{}] git {}", repository, args.join(" "));

        let output = match self.git(repository, &args) {
            Ok(output) => output,
            Err(e) => return CommandResult::failed(-1, e.to_string()),
        };
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            return CommandResult::ok();
        }
        if matches!(action, GitAction::Merge(_)) && self.is_invalid_reference(&stderr) {
            log::info!("[{}] merge reported an unknown reference, skipping", repository);
            return CommandResult::skipped();
        }

        let exit_code = output.status.code().unwrap_or(-1);
        // git reports merge conflicts on stdout
        let error = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        log::debug!("[{}] git exited with {}: {}", repository, exit_code, error);
        CommandResult::failed(exit_code, error)
    }

    fn local_branches(&self, repository: &Repository) -> Result<Vec<String>> {
        self.branch_names(repository, BranchType::Local)
    }

    fn remote_branches(&self, repository: &Repository) -> Result<Vec<String>> {
        self.branch_names(repository, BranchType::Remote)
    }

    fn find_branch(&self, repository: &Repository, name: &str) -> Result<bool> {
        let repo = self.open(repository)?;
        let found = repo.find_branch(name, BranchType::Local).is_ok()
            || repo.find_branch(name, BranchType::Remote).is_ok();
        Ok(found)
    }

    fn current_branch(&self, repository: &Repository) -> Result<String> {
        let repo = self.open(repository)?;
        let head = repo.head()?;
        if !head.is_branch() {
            return Err(MultiMergeError::DetachedHead(repository.id.clone()));
        }
        head.shorthand()
            .map(|name| name.to_string())
            .ok_or_else(|| MultiMergeError::Git(format!("{}: HEAD is not valid UTF-8", repository)))
    }
}
