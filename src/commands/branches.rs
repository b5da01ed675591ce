use crate::{command::GitCli, errors::Result, fleet::branch_catalog};
use clap::Args;

use super::FleetArgs;

#[derive(Debug, Args)]
pub struct Branches {
    #[command(flatten)]
    pub fleet: FleetArgs,
}

impl Branches {
    /// Print every branch name that can be merged somewhere in the fleet
    pub fn execute(&self) -> Result<()> {
        let fleet = self.fleet.resolve()?;
        for name in branch_catalog(&GitCli::new(), &fleet)? {
            println!("{}", name);
        }
        Ok(())
    }
}
