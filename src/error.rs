use std::io;
use std::path::PathBuf;

/// Errors surfaced by the interpreter while running a line.
///
/// Only [`ShellError::is_fatal`] variants stop the shell; everything else is reported
/// on stderr and the read loop carries on with the next line.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("dup: could not save original stdout: {0}")]
    SaveStdout(#[source] io::Error),

    #[error("could not open {}: {source}", path.display())]
    OpenRedirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dup2: could not redirect stdout to {}: {source}", path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dup2: could not restore stdout: {0}")]
    Restore(#[source] io::Error),

    #[error("fork: {0}")]
    Fork(#[source] io::Error),

    #[error("wait: {0}")]
    Wait(#[source] io::Error),
}

impl ShellError {
    /// Whether the shell can keep reading lines after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::SaveStdout(_) | ShellError::Restore(_))
    }
}
