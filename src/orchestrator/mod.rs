use crate::{
    aggregate::CompoundResult,
    cancel::CancellationToken,
    command::{CommandPort, CommandResult, GitAction},
    compensation::{Compensation, CompensationController, RunState},
    errors::Result,
    fleet::{OriginalBranchMap, Repository},
    plan::OperationPlan,
    ports::{BuildPort, BuildStatus, DecisionPort, Notifier, QuitPort},
    preserve::{ChangePreserver, PreservedScope},
};
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;


pub const BUILD_POLL_INTERVAL: Duration = Duration::from_millis(100);

const PRESERVE_LABEL: &str = "multimerge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Checkout,
    Merge,
    AwaitBuild,
    RollbackCheckout,
    Done,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    CheckoutFailed {
        repository: String,
        compensation: Compensation,
    },
    MergeFailed {
        repository: String,
        compensation: Compensation,
    },
    BuildFailed(BuildStatus),
    Cancelled(State),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compensation_text = |compensation: &Compensation| match compensation {
            Compensation::NothingToUndo => "nothing to undo",
            Compensation::Declined => "left as is",
            Compensation::RolledBack => "rolled back",
            Compensation::RollbackFailed => "rollback failed",
        };
        match self {
            AbortReason::CheckoutFailed {
                repository,
                compensation,
            } => write!(
                f,
                "checkout failed in {} ({})",
                repository,
                compensation_text(compensation)
            ),
            AbortReason::MergeFailed {
                repository,
                compensation,
            } => write!(
                f,
                "merge failed in {} ({})",
                repository,
                compensation_text(compensation)
            ),
            AbortReason::BuildFailed(status) if status.aborted => write!(f, "build aborted"),
            AbortReason::BuildFailed(status) => {
                write!(f, "build failed with {} error(s)", status.errors)
            }
            AbortReason::Cancelled(state) => write!(f, "cancelled during {:?}", state),
        }
    }
}

#[derive(Debug)]
pub struct Outcome {
    /// `Done` or `Aborted`
    pub state: State,
    pub abort: Option<AbortReason>,
    /// Repositories that had none of the requested branches
    pub skipped: Vec<Repository>,
    /// Checking out the original branches after the build did not fully work
    pub restore_failed: bool,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        self.state == State::Done && !self.restore_failed
    }
}

/// External collaborators of a run
pub struct Ports<'a> {
    pub vcs: &'a dyn CommandPort,
    pub decisions: &'a dyn DecisionPort,
    pub notifier: &'a dyn Notifier,
    pub build: &'a dyn BuildPort,
    pub quit: &'a dyn QuitPort,
    pub preserver: &'a dyn ChangePreserver,
}

type Transition = std::result::Result<State, AbortReason>;

/// Creates the temporary branch everywhere, merges into it, and optionally builds,
/// checks the original branches back out and quits
pub struct Orchestrator<'a> {
    ports: Ports<'a>,
    fleet: &'a [Repository],
    temp_branch: String,
    originals: OriginalBranchMap,
    plan: OperationPlan,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        ports: Ports<'a>,
        fleet: &'a [Repository],
        temp_branch: String,
        originals: OriginalBranchMap,
        plan: OperationPlan,
    ) -> Self {
        Self {
            ports,
            fleet,
            temp_branch,
            originals,
            plan,
        }
    }

    pub fn temp_branch(&self) -> &str {
        &self.temp_branch
    }

    /// Run every phase with local changes stashed away for the duration
    pub fn run(&self, cancel: &CancellationToken) -> Result<Outcome> {
        let preserved = PreservedScope::acquire(self.ports.preserver, self.fleet, PRESERVE_LABEL)?;
        let outcome = self.run_phases(cancel);

        let changes_restored = match preserved.release() {
            Ok(()) => true,
            Err(e) => {
                self.ports
                    .notifier
                    .error("Cannot restore local changes", &e.to_string());
                false
            }
        };
        let outcome = outcome?;

        if outcome.succeeded() && self.plan.quit() && changes_restored {
            self.ports.quit.terminate();
        }
        Ok(outcome)
    }

    fn run_phases(&self, cancel: &CancellationToken) -> Result<Outcome> {
        let mut state = State::Checkout;
        let mut abort = None;
        let mut skipped = Vec::new();
        let mut restore_failed = false;

        loop {
            log::info!("▶️  {:?}", state);
            let next: Transition = match state {
                State::Checkout => self.checkout_temp_branch(cancel).map(|_| State::Merge),
                State::Merge => match self.merge(cancel)? {
                    Ok(run) => {
                        skipped = run.skipped;
                        Ok(if self.plan.make() {
                            State::AwaitBuild
                        } else {
                            State::Done
                        })
                    }
                    Err(reason) => Err(reason),
                },
                State::AwaitBuild => self.await_build(cancel).map(|_| {
                    if self.plan.rollback_after_make() {
                        State::RollbackCheckout
                    } else {
                        State::Done
                    }
                }),
                State::RollbackCheckout => {
                    let mut result = CompoundResult::new();
                    if self.checkout_originals(
                        self.fleet,
                        self.plan.delete_temp_branch(),
                        Some(cancel),
                        &mut result,
                    ) {
                        restore_failed =
                            !self.report_rollback("Checked out original branches", &result);
                        Ok(State::Done)
                    } else {
                        Err(self.cancelled(State::RollbackCheckout))
                    }
                }
                State::Done | State::Aborted => break,
            };

            state = match next {
                Ok(next) => next,
                Err(reason) => {
                    log::warn!("Aborted: {}", reason);
                    abort = Some(reason);
                    State::Aborted
                }
            };
        }

        Ok(Outcome {
            state,
            abort,
            skipped,
            restore_failed,
        })
    }

    fn cancelled(&self, state: State) -> AbortReason {
        self.ports.notifier.error(
            "Multi-merge cancelled",
            &format!(
                "Stopped during {:?}, repositories are left as they are on {}",
                state, self.temp_branch
            ),
        );
        AbortReason::Cancelled(state)
    }

    fn checkout_temp_branch(&self, cancel: &CancellationToken) -> std::result::Result<(), AbortReason> {
        let mut run = RunState::new();
        for repository in self.fleet {
            if cancel.is_cancelled() {
                return Err(self.cancelled(State::Checkout));
            }

            let result = self.ports.vcs.run(
                repository,
                &GitAction::CheckoutNewBranch(self.temp_branch.clone()),
            );
            if !result.success {
                return Err(AbortReason::CheckoutFailed {
                    repository: repository.id.clone(),
                    compensation: self.compensate("Checkout Failed", repository, &result, &run, |succeeded| {
                        let mut rollback = CompoundResult::new();
                        self.checkout_originals(succeeded, true, None, &mut rollback);
                        self.report_rollback("Rolled back the checkout", &rollback)
                    }),
                });
            }
            log::debug!("[{}] on {}", repository, self.temp_branch);
            run.succeed(repository);
        }
        Ok(())
    }

    fn merge(&self, cancel: &CancellationToken) -> Result<std::result::Result<RunState, AbortReason>> {
        let mut run = RunState::new();
        for repository in self.fleet {
            if cancel.is_cancelled() {
                return Ok(Err(self.cancelled(State::Merge)));
            }

            let mut existing = Vec::new();
            for branch in self.plan.branches() {
                if self.ports.vcs.find_branch(repository, branch)? {
                    existing.push(branch.clone());
                }
            }
            if existing.is_empty() {
                log::info!("⏭️  [{}] has none of the branches, skipping", repository);
                run.skip(repository);
                continue;
            }

            log::info!("🔀 [{}] merging {}", repository, existing.join(", "));
            let result = self.ports.vcs.run(repository, &GitAction::Merge(existing));
            if result.skip {
                // git itself rejected a reference the lookup found
                run.skip(repository);
                continue;
            }
            if !result.success {
                return Ok(Err(AbortReason::MergeFailed {
                    repository: repository.id.clone(),
                    compensation: self.compensate("Merge Failed", repository, &result, &run, |succeeded| {
                        // the earlier repositories go back even when the abort fails
                        let mut rollback = CompoundResult::new();
                        let reset = self.ports.vcs.run(repository, &GitAction::ResetMerge);
                        rollback.append(repository, reset);
                        self.checkout_originals(succeeded, true, None, &mut rollback);
                        self.report_rollback("Rolled back the merge", &rollback)
                    }),
                }));
            }
            run.succeed(repository);
        }

        if run.skipped.is_empty() {
            self.ports.notifier.success("Merged successfully", None);
        } else {
            let names: Vec<String> = run.skipped.iter().map(|r| r.id.clone()).collect();
            self.ports
                .notifier
                .success("Merged successfully", Some(&format!("Skipped {}", names.join("\n"))));
        }
        Ok(Ok(run))
    }

    /// Report the failure, then let the operator decide about undoing `run.succeeded`
    fn compensate<F>(
        &self,
        title: &str,
        repository: &Repository,
        failure: &CommandResult,
        run: &RunState,
        undo: F,
    ) -> Compensation
    where
        F: FnOnce(&[Repository]) -> bool,
    {
        log::debug!("[{}] exited with {}", repository, failure.exit_code);
        self.ports
            .notifier
            .error(title, &format!("{}: {}", repository, failure.error));
        CompensationController::new(self.ports.decisions).on_failure(title, failure, run, undo)
    }

    fn await_build(&self, cancel: &CancellationToken) -> std::result::Result<(), AbortReason> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.ports.build.build(Box::new(move |status| {
            let _ = tx.send(status);
        }));

        loop {
            match rx.recv_timeout(BUILD_POLL_INTERVAL) {
                Ok(status) if status.succeeded() => {
                    self.ports.notifier.success("Build succeeded", None);
                    return Ok(());
                }
                Ok(status) => {
                    let body = if status.aborted {
                        "The build was aborted".to_string()
                    } else {
                        format!("The build reported {} error(s)", status.errors)
                    };
                    self.ports.notifier.error("Build Failed", &body);
                    return Err(AbortReason::BuildFailed(status));
                }
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        return Err(self.cancelled(State::AwaitBuild));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let status = BuildStatus {
                        aborted: true,
                        errors: 0,
                    };
                    self.ports
                        .notifier
                        .error("Build Failed", "The build finished without reporting a result");
                    return Err(AbortReason::BuildFailed(status));
                }
            }
        }
    }

    /// Check out the original branch of each repository, deleting the temporary branch if asked
    ///
    /// Every repository is attempted even after a failure, each attempt lands in `result`.
    /// Returns false only when `cancel` stopped it before the last repository.
    fn checkout_originals(
        &self,
        repositories: &[Repository],
        delete_temp_branch: bool,
        cancel: Option<&CancellationToken>,
        result: &mut CompoundResult,
    ) -> bool {
        for repository in repositories {
            if cancel.map_or(false, CancellationToken::is_cancelled) {
                return false;
            }

            let Some(original) = self.originals.get(repository) else {
                result.append(
                    repository,
                    CommandResult::failed(-1, "original branch is unknown"),
                );
                continue;
            };
            let checkout = self.ports.vcs.run(
                repository,
                &GitAction::Checkout {
                    branch: original.to_string(),
                    force: true,
                },
            );
            let checked_out = checkout.success;
            result.append(repository, checkout);

            if delete_temp_branch && checked_out {
                let delete = self.ports.vcs.run(
                    repository,
                    &GitAction::DeleteBranch {
                        name: self.temp_branch.clone(),
                        force: true,
                    },
                );
                result.append(repository, delete);
            }
        }
        true
    }

    /// One verdict for a whole rollback: `title` when everything worked, else the failures
    fn report_rollback(&self, title: &str, result: &CompoundResult) -> bool {
        if result.all_succeeded() {
            self.ports.notifier.success(title, None);
            true
        } else {
            self.ports
                .notifier
                .error("Rollback Failed", &result.error_report());
            false
        }
    }
}
