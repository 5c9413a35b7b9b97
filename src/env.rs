use crate::config::ShellConfig;
use crate::search_path::{PathError, SearchPath};

/// Mutable shell state shared by the interpreter and builtins.
///
/// The environment contains:
/// - `search_path`: directories searched for external programs.
/// - `debug`: when set, parsed commands are echoed before they run.
/// - `should_exit`: a flag that the read loop checks to know when to terminate.
///
/// Only builtins running in the shell's own process can change these; a background
/// command works on the copy inherited by its forked child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Directories searched, in order, after the current directory.
    pub search_path: SearchPath,
    /// Echo parsed commands before execution.
    pub debug: bool,
    /// When set to true, indicates that the read loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Build the startup state described by `config`.
    pub fn from_config(config: &ShellConfig) -> Result<Self, PathError> {
        Ok(Self {
            search_path: SearchPath::new(&config.default_search_path, config.path_limits)?,
            debug: false,
            should_exit: false,
        })
    }
}
