use clap::Parser;
use clap::Subcommand;
use commands::branches::Branches;
use commands::merge::Merge;

mod aggregate;
mod cancel;
mod command;
mod commands;
mod compensation;
mod config;
mod errors;
#[cfg(test)]
mod fakes;
mod fleet;
mod naming;
mod orchestrator;
mod plan;
mod ports;
mod preserve;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "multimerge")]
#[command(about = "Merge branches into a temporary branch across many git repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the temporary branch everywhere and merge the given branches into it
    Merge(Merge),
    /// List the branches known in the fleet
    Branches(Branches),
}

fn main() {
    env_logger::init();

    let args = Cli::parse();

    let result = match args.command {
        Commands::Merge(merge) => merge.execute(),
        Commands::Branches(branches) => branches.execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
