pub mod branches;
pub mod merge;

use crate::{errors::Result, fleet};
use clap::Args;
use std::path::PathBuf;

/// Which repositories take part
#[derive(Debug, Args)]
pub struct FleetArgs {
    /// Directory holding the repositories (itself and its direct children)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Use exactly these repositories, in this order, instead of scanning the root
    #[arg(long = "repo")]
    pub repos: Vec<PathBuf>,
}

impl FleetArgs {
    pub fn resolve(&self) -> Result<Vec<fleet::Repository>> {
        if !self.repos.is_empty() {
            let paths = self
                .repos
                .iter()
                .map(|path| path.canonicalize())
                .collect::<std::io::Result<Vec<_>>>()?;
            return fleet::from_paths(&paths);
        }
        fleet::discover(&self.root.canonicalize()?)
    }

    /// Where the build runs: the scanned root, or the deepest directory holding every `--repo`
    pub fn build_dir(&self, fleet: &[fleet::Repository]) -> PathBuf {
        if self.repos.is_empty() {
            return self.root.clone();
        }
        let mut roots = fleet.iter().map(|repository| repository.root.as_path());
        let Some(first) = roots.next() else {
            return self.root.clone();
        };

        let mut common = first.to_path_buf();
        for root in roots {
            while !root.starts_with(&common) && common.pop() {}
        }
        common
    }
}
