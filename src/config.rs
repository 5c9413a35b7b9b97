use crate::search_path::PathLimits;
use std::env as stdenv;
use std::path::PathBuf;

/// Environment variable holding the fault injector countdown.
pub const SYSCALL_COUNTDOWN_VAR: &str = "SHELL_SYSCALL_COUNTDOWN";

/// Environment variable naming the directory for fault injector marker files.
pub const FAULT_DIR_VAR: &str = "SHELL_FAULT_DIR";

/// Marker directory used when [`FAULT_DIR_VAR`] is unset, relative to the startup cwd.
pub const DEFAULT_FAULT_DIR: &str = ".fault_markers";

/// Prompt printed before every interactive read.
pub const DEFAULT_PROMPT: &str = "🐒$ ";

/// Settings for [`crate::fault::FaultInjector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultConfig {
    /// Number of seam calls that pass through before one fails.
    pub countdown: u64,
    /// Where liveness and "fault fired" markers are written.
    pub marker_dir: PathBuf,
}

/// Startup configuration of the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    pub default_search_path: Vec<String>,
    pub path_limits: PathLimits,
    /// `None` runs against the real system calls only.
    pub fault: Option<FaultConfig>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            default_search_path: vec!["/bin".to_string()],
            path_limits: PathLimits::default(),
            fault: None,
        }
    }
}

impl ShellConfig {
    /// Defaults plus whatever the process environment asks for.
    pub fn from_env() -> Self {
        Self::from_vars(|key| stdenv::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// A countdown that is missing, negative or not a number leaves fault injection off.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fault = lookup(SYSCALL_COUNTDOWN_VAR)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(|countdown| {
                let marker_dir = lookup(FAULT_DIR_VAR)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        stdenv::current_dir()
                            .unwrap_or_else(|_| PathBuf::from("."))
                            .join(DEFAULT_FAULT_DIR)
                    });
                FaultConfig {
                    countdown,
                    marker_dir,
                }
            });

        Self {
            fault,
            ..Self::default()
        }
    }
}
