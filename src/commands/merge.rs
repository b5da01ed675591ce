use crate::{
    cancel::CancellationToken,
    command::GitCli,
    config::{Config, Preferences},
    errors::{MultiMergeError, Result},
    fleet::OriginalBranchMap,
    naming,
    orchestrator::{Orchestrator, Ports},
    plan::{parse_branch_list, Flags, OperationPlan},
    ports::{ConsoleNotifier, DecisionPort, FixedDecision, ProcessQuit, PromptDecision, ShellBuild},
    preserve::StashPreserver,
};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use super::FleetArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RollbackPolicy {
    /// Ask on the terminal
    Ask,
    /// Undo without asking
    Always,
    /// Never undo, leave repositories as they are
    Never,
}

#[derive(Debug, Args)]
pub struct Merge {
    #[command(flatten)]
    pub fleet: FleetArgs,

    /// Branch to merge; repeat for several. Defaults to the branches of the previous run
    #[arg(long = "branch", short = 'b')]
    pub branches: Vec<String>,

    /// File with one branch name per line
    #[arg(long)]
    pub branches_file: Option<PathBuf>,

    /// Build after merging (runs `multimerge.buildCommand`)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub make: Option<bool>,

    /// Quit after a successful build
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub quit: Option<bool>,

    /// Check the original branches back out after a successful build
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub rollback_after_make: Option<bool>,

    /// Delete the temporary branch when checking the original branches back out
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub delete_temp_branch: Option<bool>,

    /// What to do when a step fails after some repositories were already changed
    #[arg(long, value_enum, default_value_t = RollbackPolicy::Ask)]
    pub rollback: RollbackPolicy,

    /// Cancel the run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Do not remember branches and flags for the next run
    #[arg(long)]
    pub no_save: bool,
}

impl Merge {
    fn requested_branches(&self, preferences: &Preferences) -> Result<Vec<String>> {
        let mut branches = self.branches.clone();
        if let Some(path) = &self.branches_file {
            branches.extend(parse_branch_list(&std::fs::read_to_string(path)?));
        }
        if branches.is_empty() {
            branches = preferences.branches.clone();
        }
        Ok(branches)
    }

    fn flags(&self, saved: Flags) -> Flags {
        Flags {
            make: self.make.unwrap_or(saved.make),
            quit: self.quit.unwrap_or(saved.quit),
            rollback_after_make: self.rollback_after_make.unwrap_or(saved.rollback_after_make),
            delete_temp_branch: self.delete_temp_branch.unwrap_or(saved.delete_temp_branch),
        }
    }

    pub fn execute(&self) -> Result<()> {
        let git = GitCli::new();
        let fleet = self.fleet.resolve()?;
        let config = Config::load(fleet.first().map(|r| r.root.as_path()))?;

        let preferences_path = Preferences::default_path();
        let preferences = preferences_path
            .as_deref()
            .map(Preferences::load)
            .unwrap_or_default();

        let plan = OperationPlan::new(
            self.requested_branches(&preferences)?,
            self.flags(preferences.flags),
        )?;
        let build_command = match (&config.build_command, plan.make()) {
            (Some(command), _) => command.clone(),
            (None, false) => String::new(),
            (None, true) => {
                return Err(MultiMergeError::Config(
                    "--make needs a build command, set it with `git config multimerge.buildCommand <command>`"
                        .to_string(),
                ));
            }
        };

        let originals = OriginalBranchMap::snapshot(&git, &fleet)?;
        let temp_branch = naming::reserve(&git, &fleet, &config.temp_branch)?;

        if !self.no_save {
            if let Some(path) = &preferences_path {
                Preferences {
                    branches: plan.branches().to_vec(),
                    flags: plan.flags(),
                }
                .save(path)?;
            }
        }

        let decisions: Box<dyn DecisionPort> = match self.rollback {
            RollbackPolicy::Ask => Box::new(PromptDecision),
            RollbackPolicy::Always => Box::new(FixedDecision(true)),
            RollbackPolicy::Never => Box::new(FixedDecision(false)),
        };
        let build = ShellBuild {
            command: build_command,
            dir: self.fleet.build_dir(&fleet),
        };
        let ports = Ports {
            vcs: &git,
            decisions: decisions.as_ref(),
            notifier: &ConsoleNotifier,
            build: &build,
            quit: &ProcessQuit,
            preserver: &StashPreserver,
        };

        let cancel = CancellationToken::new();
        if let Some(seconds) = self.timeout {
            cancel.cancel_after(Duration::from_secs(seconds));
        }

        log::info!(
            "Merging {} into {} across {} repositories",
            plan.branches().join(", "),
            temp_branch,
            fleet.len()
        );
        let orchestrator = Orchestrator::new(ports, &fleet, temp_branch, originals, plan);
        let outcome = orchestrator.run(&cancel)?;

        if !outcome.skipped.is_empty() {
            log::info!("{} repositories had nothing to merge", outcome.skipped.len());
        }
        match &outcome.abort {
            Some(reason) => Err(MultiMergeError::Incomplete(format!(
                "{}, temporary branch '{}'",
                reason,
                orchestrator.temp_branch()
            ))),
            None if outcome.restore_failed => Err(MultiMergeError::Incomplete(
                "not every repository is back on its original branch".to_string(),
            )),
            None => Ok(()),
        }
    }
}
