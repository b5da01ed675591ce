use thiserror::Error;

#[derive(Error, Debug)]
pub enum MultiMergeError {
    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Cannot run git: {0}")]
    GitCli(String),

    #[error("No branches to merge")]
    EmptyPlan,

    #[error("No git repositories found under {0}")]
    NoRepositories(String),

    #[error("Repository '{0}' is not on a branch (detached HEAD)")]
    DetachedHead(String),

    #[error("Multi-merge did not complete: {0}")]
    Incomplete(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<git2::Error> for MultiMergeError {
    fn from(e: git2::Error) -> Self {
        MultiMergeError::Git(e.message().to_string())
    }
}

impl From<dialoguer::Error> for MultiMergeError {
    fn from(e: dialoguer::Error) -> Self {
        MultiMergeError::Prompt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MultiMergeError>;
