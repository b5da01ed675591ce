use crate::{command::CommandPort, errors::Result, fleet::Repository};

pub const DEFAULT_TEMP_BRANCH: &str = "multimerge";

/// Pick a branch name that exists in none of the repositories
///
/// Tries `base`, then `base1`, `base2`, ... and checks every repository for each candidate.
pub fn reserve(port: &dyn CommandPort, fleet: &[Repository], base: &str) -> Result<String> {
    let mut suffix = 0u32;
    loop {
        let candidate = if suffix == 0 {
            base.to_string()
        } else {
            format!("{}{}", base, suffix)
        };

        let mut taken = false;
        for repository in fleet {
            if port.find_branch(repository, &candidate)? {
                log::debug!("{} already has a branch named {}", repository, candidate);
                taken = true;
                break;
            }
        }

        if !taken {
            log::info!("Using temporary branch {}", candidate);
            return Ok(candidate);
        }
        suffix += 1;
    }
}
