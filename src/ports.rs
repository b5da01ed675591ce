use dialoguer::Confirm;
use std::path::PathBuf;
use std::process::Command;

/// Asks the operator whether a partial operation should be undone
pub trait DecisionPort {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Interactive yes/no prompt on the terminal
pub struct PromptDecision;

impl DecisionPort for PromptDecision {
    fn confirm(&self, title: &str, message: &str) -> bool {
        eprintln!("❌ {}\n{}", title, message);
        match Confirm::new()
            .with_prompt("Undo?")
            .default(false)
            .interact_opt()
        {
            Ok(Some(choice)) => choice,
            Ok(None) => false,
            Err(e) => {
                log::warn!("Cannot ask for rollback, leaving repositories as they are: {}", e);
                false
            }
        }
    }
}

/// Answers every prompt the same way, for non-interactive runs
pub struct FixedDecision(pub bool);

impl DecisionPort for FixedDecision {
    fn confirm(&self, title: &str, message: &str) -> bool {
        log::info!("{}: {} -> {}", title, message, if self.0 { "undo" } else { "keep" });
        self.0
    }
}

pub trait Notifier {
    fn success(&self, title: &str, body: Option<&str>);
    fn error(&self, title: &str, body: &str);
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&self, title: &str, body: Option<&str>) {
        log::info!("{}", title);
        match body {
            Some(body) => println!("✅ {}\n{}", title, body),
            None => println!("✅ {}", title),
        }
    }

    fn error(&self, title: &str, body: &str) {
        log::error!("{}: {}", title, body);
        eprintln!("❌ {}\n{}", title, body);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStatus {
    pub aborted: bool,
    pub errors: u32,
}

impl BuildStatus {
    pub fn succeeded(&self) -> bool {
        !self.aborted && self.errors == 0
    }
}

pub type BuildCallback = Box<dyn FnOnce(BuildStatus) + Send + 'static>;

/// Starts a build and reports its completion exactly once through the callback
pub trait BuildPort {
    fn build(&self, on_complete: BuildCallback);
}

/// Runs the configured build command with `sh -c` on a worker thread
pub struct ShellBuild {
    pub command: String,
    pub dir: PathBuf,
}

impl BuildPort for ShellBuild {
    fn build(&self, on_complete: BuildCallback) {
        let command = self.command.clone();
        let dir = self.dir.clone();
        log::info!("Building: {}", command);

        std::thread::spawn(move || {
            let status = Command::new("sh")
                .arg("-c")
                .arg(&command)
                .current_dir(&dir)
                .status();
            let status = match status {
                Ok(status) if status.success() => BuildStatus {
                    aborted: false,
                    errors: 0,
                },
                // killed by a signal
                Ok(status) if status.code().is_none() => BuildStatus {
                    aborted: true,
                    errors: 0,
                },
                Ok(_) => BuildStatus {
                    aborted: false,
                    errors: 1,
                },
                Err(e) => {
                    log::error!("Cannot start build `{}`: {}", command, e);
                    BuildStatus {
                        aborted: true,
                        errors: 0,
                    }
                }
            };
            on_complete(status);
        });
    }
}

pub trait QuitPort {
    fn terminate(&self);
}

pub struct ProcessQuit;

impl QuitPort for ProcessQuit {
    fn terminate(&self) {
        log::info!("Quitting after successful build");
        std::process::exit(0);
    }
}
