use crate::errors::{MultiMergeError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Flags {
    /// Build after the merge
    pub make: bool,
    /// Quit after a successful build
    pub quit: bool,
    /// Check every repository back out to its original branch after a successful build
    pub rollback_after_make: bool,
    /// Delete the temporary branch while checking back out
    pub delete_temp_branch: bool,
}

/// Branches to merge and what to do afterwards, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    branches: Vec<String>,
    flags: Flags,
}

impl OperationPlan {
    pub fn new<I, S>(branches: I, flags: Flags) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for branch in branches {
            let branch = branch.as_ref().trim();
            if branch.is_empty() || branch.starts_with('#') {
                continue;
            }
            if !unique.iter().any(|b| b == branch) {
                unique.push(branch.to_string());
            }
        }
        if unique.is_empty() {
            return Err(MultiMergeError::EmptyPlan);
        }
        Ok(Self {
            branches: unique,
            flags,
        })
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn make(&self) -> bool {
        self.flags.make
    }

    /// Only meaningful after a build
    pub fn quit(&self) -> bool {
        self.flags.make && self.flags.quit
    }

    /// Only meaningful after a build
    pub fn rollback_after_make(&self) -> bool {
        self.flags.make && self.flags.rollback_after_make
    }

    pub fn delete_temp_branch(&self) -> bool {
        self.flags.delete_temp_branch
    }
}

/// Split the newline separated branch list format
pub fn parse_branch_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
