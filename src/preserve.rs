use crate::{
    errors::{MultiMergeError, Result},
    fleet::Repository,
};
use git2::{ErrorCode, Oid, StashFlags};

/// What `preserve` saved, handed back to `restore`
#[derive(Debug, Default)]
pub struct PreserveScope {
    /// Stash created per repository; `None` when there was nothing to save
    pub saved: Vec<(Repository, Option<Oid>)>,
}

/// Keeps uncommitted changes out of the way for the duration of a run
pub trait ChangePreserver {
    fn preserve(&self, fleet: &[Repository], label: &str) -> Result<PreserveScope>;
    fn restore(&self, scope: PreserveScope) -> Result<()>;
}

/// Stashes local changes (untracked files included) and pops them afterwards
pub struct StashPreserver;

impl StashPreserver {
    fn stash(repository: &Repository, label: &str) -> Result<Option<Oid>> {
        let mut repo = git2::Repository::open(&repository.root)?;
        let signature = repo.signature()?;
        match repo.stash_save(&signature, label, Some(StashFlags::INCLUDE_UNTRACKED)) {
            Ok(oid) => {
                log::info!("[{}] stashed local changes as {}", repository, oid);
                Ok(Some(oid))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn unstash(repository: &Repository, oid: Oid) -> Result<()> {
        let mut repo = git2::Repository::open(&repository.root)?;
        let mut position = None;
        repo.stash_foreach(|index, _, stash_oid| {
            if *stash_oid == oid {
                position = Some(index);
                false
            } else {
                true
            }
        })?;

        let index = position.ok_or_else(|| {
            MultiMergeError::Git(format!("{}: stash {} is gone", repository, oid))
        })?;
        repo.stash_pop(index, None)?;
        log::info!("[{}] restored local changes", repository);
        Ok(())
    }
}

impl ChangePreserver for StashPreserver {
    fn preserve(&self, fleet: &[Repository], label: &str) -> Result<PreserveScope> {
        let mut scope = PreserveScope::default();
        for repository in fleet {
            match Self::stash(repository, label) {
                Ok(oid) => scope.saved.push((repository.clone(), oid)),
                Err(e) => {
                    // put back what was already stashed before giving up
                    if let Err(restore_error) = self.restore(scope) {
                        log::error!("{}", restore_error);
                    }
                    return Err(e);
                }
            }
        }
        Ok(scope)
    }

    fn restore(&self, scope: PreserveScope) -> Result<()> {
        let mut failures = Vec::new();
        for (repository, oid) in &scope.saved {
            if let Some(oid) = oid {
                if let Err(e) = Self::unstash(repository, *oid) {
                    failures.push(format!("{}: {}", repository, e));
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(MultiMergeError::Git(format!(
                "Cannot restore local changes\n{}",
                failures.join("\n")
            )))
        }
    }
}

/// Restores preserved changes when released, or when dropped without being released
pub struct PreservedScope<'a> {
    preserver: &'a dyn ChangePreserver,
    scope: Option<PreserveScope>,
}

impl<'a> PreservedScope<'a> {
    pub fn acquire(
        preserver: &'a dyn ChangePreserver,
        fleet: &[Repository],
        label: &str,
    ) -> Result<Self> {
        let scope = preserver.preserve(fleet, label)?;
        Ok(Self {
            preserver,
            scope: Some(scope),
        })
    }

    pub fn release(mut self) -> Result<()> {
        match self.scope.take() {
            Some(scope) => self.preserver.restore(scope),
            None => Ok(()),
        }
    }
}

impl Drop for PreservedScope<'_> {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            if let Err(e) = self.preserver.restore(scope) {
                log::error!("{}", e);
            }
        }
    }
}
