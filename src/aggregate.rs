use crate::{command::CommandResult, fleet::Repository};

/// Combined outcome of one compound action applied to several repositories
///
/// Records every attempt; a failure never stops later repositories from being recorded.
#[derive(Debug, Default)]
pub struct CompoundResult {
    results: Vec<(Repository, CommandResult)>,
}

impl CompoundResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, repository: &Repository, result: CommandResult) {
        self.results.push((repository.clone(), result));
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, result)| result.success)
    }

    /// One line per failed action: `<repository>: <error>`
    pub fn error_report(&self) -> String {
        self.results
            .iter()
            .filter(|(_, result)| !result.success)
            .map(|(repository, result)| format!("{}: {}", repository, result.error))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
