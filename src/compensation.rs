use crate::{
    command::CommandResult,
    fleet::Repository,
    ports::DecisionPort,
};

/// Progress of one phase: what an undo would have to cover
#[derive(Debug, Default)]
pub struct RunState {
    /// Repositories that completed the phase, skipped ones included
    pub succeeded: Vec<Repository>,
    /// Repositories where none of the requested branches exist
    pub skipped: Vec<Repository>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&mut self, repository: &Repository) {
        self.succeeded.push(repository.clone());
    }

    pub fn skip(&mut self, repository: &Repository) {
        self.skipped.push(repository.clone());
        self.succeeded.push(repository.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    /// Nothing had succeeded, so there was nothing to undo or ask about
    NothingToUndo,
    /// The operator chose to leave the repositories as they are
    Declined,
    RolledBack,
    RollbackFailed,
}

/// Decides whether to undo a partially applied phase, and runs the undo
pub struct CompensationController<'a> {
    decisions: &'a dyn DecisionPort,
}

impl<'a> CompensationController<'a> {
    pub fn new(decisions: &'a dyn DecisionPort) -> Self {
        Self { decisions }
    }

    /// `undo` gets the repositories that need undoing and returns whether it fully succeeded
    pub fn on_failure<F>(
        &self,
        title: &str,
        failure: &CommandResult,
        state: &RunState,
        undo: F,
    ) -> Compensation
    where
        F: FnOnce(&[Repository]) -> bool,
    {
        if state.succeeded.is_empty() {
            return Compensation::NothingToUndo;
        }

        let message = format!("{}\n\nDo you want to undo?", failure.error);
        if !self.decisions.confirm(title, &message) {
            log::warn!(
                "Rollback declined, {} repositories left as they are",
                state.succeeded.len()
            );
            return Compensation::Declined;
        }

        if undo(&state.succeeded) {
            Compensation::RolledBack
        } else {
            log::warn!("Rollback did not complete, manual intervention needed");
            Compensation::RollbackFailed
        }
    }
}
