//! In-memory stand-ins for the ports, used by the unit tests

use crate::{
    cancel::CancellationToken,
    command::{CommandPort, CommandResult, GitAction},
    errors::{MultiMergeError, Result},
    fleet::Repository,
    ports::{BuildCallback, BuildPort, BuildStatus, DecisionPort, Notifier, QuitPort},
    preserve::{ChangePreserver, PreserveScope},
};
use std::collections::HashMap;
use std::sync::Mutex;

struct FakeRepo {
    repository: Repository,
    current: String,
    branches: Vec<String>,
    remote_branches: Vec<String>,
}

/// A fleet of pretend repositories that records every action it is asked to run
pub struct FakeVcs {
    repos: Mutex<Vec<FakeRepo>>,
    scripted: HashMap<(String, &'static str), CommandResult>,
    actions: Mutex<Vec<(String, GitAction)>>,
    cancel_on: Option<(String, &'static str, CancellationToken)>,
}

fn kind(action: &GitAction) -> &'static str {
    match action {
        GitAction::CheckoutNewBranch(_) => "checkout-new",
        GitAction::Merge(_) => "merge",
        GitAction::ResetMerge => "reset-merge",
        GitAction::Checkout { .. } => "checkout",
        GitAction::DeleteBranch { .. } => "delete",
    }
}

impl FakeVcs {
    pub fn new() -> Self {
        Self {
            repos: Mutex::new(Vec::new()),
            scripted: HashMap::new(),
            actions: Mutex::new(Vec::new()),
            cancel_on: None,
        }
    }

    pub fn with_repo(self, id: &str, current: &str, branches: &[&str]) -> Self {
        self.repos.lock().unwrap().push(FakeRepo {
            repository: Repository::new(format!("/fleet/{}", id)),
            current: current.to_string(),
            branches: branches.iter().map(|b| b.to_string()).collect(),
            remote_branches: Vec::new(),
        });
        self
    }

    pub fn with_remote_branches(self, id: &str, branches: &[&str]) -> Self {
        {
            let mut repos = self.repos.lock().unwrap();
            let repo = repos
                .iter_mut()
                .find(|r| r.repository.id == id)
                .expect("unknown fake repository");
            repo.remote_branches = branches.iter().map(|b| b.to_string()).collect();
        }
        self
    }

    /// Answer `kind` ("checkout-new", "merge", "reset-merge", "checkout", "delete") with `result` in `id`
    pub fn scripted(mut self, id: &str, kind: &'static str, result: CommandResult) -> Self {
        self.scripted.insert((id.to_string(), kind), result);
        self
    }

    /// Cancel `token` right after `kind` has run in `id`, as if the operator hit cancel mid-phase
    pub fn cancelling(mut self, id: &str, kind: &'static str, token: &CancellationToken) -> Self {
        self.cancel_on = Some((id.to_string(), kind, token.clone()));
        self
    }

    pub fn fleet(&self) -> Vec<Repository> {
        self.repos
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.repository.clone())
            .collect()
    }

    pub fn actions(&self) -> Vec<(String, GitAction)> {
        self.actions.lock().unwrap().clone()
    }

    pub fn actions_for(&self, id: &str) -> Vec<GitAction> {
        self.actions()
            .into_iter()
            .filter(|(repo, _)| repo == id)
            .map(|(_, action)| action)
            .collect()
    }

    pub fn current(&self, id: &str) -> String {
        self.with(id, |repo| repo.current.clone())
    }

    pub fn has_branch(&self, id: &str, name: &str) -> bool {
        self.with(id, |repo| repo.branches.iter().any(|b| b == name))
    }

    fn apply(&self, repository: &Repository, action: &GitAction) -> CommandResult {
        self.actions
            .lock()
            .unwrap()
            .push((repository.id.clone(), action.clone()));

        if let Some(result) = self.scripted.get(&(repository.id.clone(), kind(action))) {
            return result.clone();
        }

        self.with(&repository.id, |repo| match action {
            GitAction::CheckoutNewBranch(name) => {
                if repo.branches.contains(name) {
                    return CommandResult::failed(
                        128,
                        format!("fatal: a branch named '{}' already exists", name),
                    );
                }
                repo.branches.push(name.clone());
                repo.current = name.clone();
                CommandResult::ok()
            }
            GitAction::Merge(_) | GitAction::ResetMerge => CommandResult::ok(),
            GitAction::Checkout { branch, .. } => {
                if !repo.branches.contains(branch) {
                    return CommandResult::failed(
                        1,
                        format!("error: pathspec '{}' did not match", branch),
                    );
                }
                repo.current = branch.clone();
                CommandResult::ok()
            }
            GitAction::DeleteBranch { name, .. } => {
                if &repo.current == name {
                    return CommandResult::failed(
                        1,
                        format!("error: Cannot delete branch '{}' checked out", name),
                    );
                }
                repo.branches.retain(|b| b != name);
                CommandResult::ok()
            }
        })
    }

    fn with<T>(&self, id: &str, f: impl FnOnce(&mut FakeRepo) -> T) -> T {
        let mut repos = self.repos.lock().unwrap();
        let repo = repos
            .iter_mut()
            .find(|r| r.repository.id == id)
            .expect("unknown fake repository");
        f(repo)
    }
}

impl CommandPort for FakeVcs {
    fn run(&self, repository: &Repository, action: &GitAction) -> CommandResult {
        let result = self.apply(repository, action);
        if let Some((id, kind_to_cancel, token)) = &self.cancel_on {
            if *id == repository.id && *kind_to_cancel == kind(action) {
                token.cancel();
            }
        }
        result
    }

    fn local_branches(&self, repository: &Repository) -> Result<Vec<String>> {
        Ok(self.with(&repository.id, |repo| repo.branches.clone()))
    }

    fn remote_branches(&self, repository: &Repository) -> Result<Vec<String>> {
        Ok(self.with(&repository.id, |repo| repo.remote_branches.clone()))
    }

    fn find_branch(&self, repository: &Repository, name: &str) -> Result<bool> {
        Ok(self.with(&repository.id, |repo| {
            repo.branches.iter().any(|b| b == name) || repo.remote_branches.iter().any(|b| b == name)
        }))
    }

    fn current_branch(&self, repository: &Repository) -> Result<String> {
        let current = self.with(&repository.id, |repo| repo.current.clone());
        if current == "HEAD" {
            return Err(MultiMergeError::DetachedHead(repository.id.clone()));
        }
        Ok(current)
    }
}

pub struct ScriptedDecision {
    answer: bool,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedDecision {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

impl DecisionPort for ScriptedDecision {
    fn confirm(&self, title: &str, message: &str) -> bool {
        self.prompts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        self.answer
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub success: bool,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications().into_iter().map(|n| n.title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, title: &str, body: Option<&str>) {
        self.notifications.lock().unwrap().push(Notification {
            success: true,
            title: title.to_string(),
            body: body.map(str::to_string),
        });
    }

    fn error(&self, title: &str, body: &str) {
        self.notifications.lock().unwrap().push(Notification {
            success: false,
            title: title.to_string(),
            body: Some(body.to_string()),
        });
    }
}

/// Completes immediately with a fixed status, or never when built with `hanging`
pub struct FakeBuild {
    status: Option<BuildStatus>,
    calls: Mutex<u32>,
    pending: Mutex<Vec<BuildCallback>>,
}

impl FakeBuild {
    pub fn completing(aborted: bool, errors: u32) -> Self {
        Self {
            status: Some(BuildStatus { aborted, errors }),
            calls: Mutex::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn hanging() -> Self {
        Self {
            status: None,
            calls: Mutex::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl BuildPort for FakeBuild {
    fn build(&self, on_complete: BuildCallback) {
        *self.calls.lock().unwrap() += 1;
        match self.status {
            Some(status) => on_complete(status),
            None => self.pending.lock().unwrap().push(on_complete),
        }
    }
}

#[derive(Default)]
pub struct RecordingQuit {
    calls: Mutex<u32>,
}

impl RecordingQuit {
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl QuitPort for RecordingQuit {
    fn terminate(&self) {
        *self.calls.lock().unwrap() += 1;
    }
}

#[derive(Default)]
pub struct RecordingPreserver {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingPreserver {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChangePreserver for RecordingPreserver {
    fn preserve(&self, _fleet: &[Repository], _label: &str) -> Result<PreserveScope> {
        self.calls.lock().unwrap().push("preserve");
        Ok(PreserveScope::default())
    }

    fn restore(&self, _scope: PreserveScope) -> Result<()> {
        self.calls.lock().unwrap().push("restore");
        Ok(())
    }
}
