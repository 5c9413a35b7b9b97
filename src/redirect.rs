use crate::error::ShellError;
use crate::sys::Syscalls;
use std::io::{self, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::path::Path;

/// Process-wide stdout redirection.
///
/// Holds a duplicate of the standard output the shell started with, so that after a
/// redirected command fd 1 can always be pointed back at the terminal (or whatever the
/// shell's own stdout was), no matter how many redirections happened before.
#[derive(Debug)]
pub struct StdoutRedirect {
    original: OwnedFd,
}

impl StdoutRedirect {
    /// Save the current stdout. Called once at startup.
    pub fn capture(sys: &mut dyn Syscalls) -> Result<Self, ShellError> {
        let original = sys.dup_stdout().map_err(ShellError::SaveStdout)?;
        Ok(Self { original })
    }

    /// Point fd 1 at `path`, created or truncated with owner-only permissions.
    ///
    /// On error stdout is left untouched.
    pub fn redirect(&self, sys: &mut dyn Syscalls, path: &Path) -> Result<(), ShellError> {
        let file = sys
            .open_output(path)
            .map_err(|source| ShellError::OpenRedirect {
                path: path.to_path_buf(),
                source,
            })?;

        flush_stdout();
        sys.redirect_stdout(file.as_fd())
            .map_err(|source| ShellError::Redirect {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "stdout redirected");
        Ok(())
    }

    /// Point fd 1 back at the saved original.
    pub fn restore(&self, sys: &mut dyn Syscalls) -> Result<(), ShellError> {
        flush_stdout();
        sys.redirect_stdout(self.original.as_fd())
            .map_err(ShellError::Restore)?;
        tracing::debug!("stdout restored");
        Ok(())
    }
}

fn flush_stdout() {
    if let Err(e) = io::stdout().flush() {
        tracing::warn!(error = %e, "could not flush stdout");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::WaitStatus;
    use nix::unistd::{ForkResult, Pid};
    use std::convert::Infallible;
    use std::ffi::{CStr, CString};
    use std::fs::{File, OpenOptions};
    use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
    use std::path::PathBuf;

    /// Hands out real descriptors but only records what fd 1 would be pointed at.
    #[derive(Default)]
    struct FdRecorder {
        targets: Vec<RawFd>,
        fail_redirect: bool,
    }

    impl Syscalls for FdRecorder {
        fn open_output(&mut self, path: &Path) -> io::Result<OwnedFd> {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            Ok(file.into())
        }
        fn dup_stdout(&mut self) -> io::Result<OwnedFd> {
            Ok(File::open("/dev/null")?.into())
        }
        fn redirect_stdout(&mut self, fd: BorrowedFd<'_>) -> io::Result<()> {
            if self.fail_redirect {
                return Err(io::Error::from_raw_os_error(libc::EBADF));
            }
            self.targets.push(fd.as_raw_fd());
            Ok(())
        }
        fn fork(&mut self) -> io::Result<ForkResult> {
            unreachable!()
        }
        fn execv(&mut self, _path: &CStr, _argv: &[CString]) -> io::Result<Infallible> {
            unreachable!()
        }
        fn waitpid(&mut self, _pid: Pid) -> io::Result<WaitStatus> {
            unreachable!()
        }
        fn wait_any(&mut self) -> io::Result<WaitStatus> {
            unreachable!()
        }
        fn chdir(&mut self, _path: &Path) -> io::Result<()> {
            unreachable!()
        }
        fn getcwd(&mut self) -> io::Result<PathBuf> {
            unreachable!()
        }
    }

    #[test]
    fn test_redirect_then_restore_points_back_at_original() {
        let dir = tempfile::tempdir().unwrap();
        let mut sys = FdRecorder::default();
        let stdout = StdoutRedirect::capture(&mut sys).unwrap();

        stdout.redirect(&mut sys, &dir.path().join("out.txt")).unwrap();
        stdout.restore(&mut sys).unwrap();

        assert_eq!(sys.targets.len(), 2);
        assert_ne!(sys.targets[0], stdout.original.as_raw_fd());
        assert_eq!(sys.targets[1], stdout.original.as_raw_fd());
        assert!(dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_open_failure_leaves_stdout_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut sys = FdRecorder::default();
        let stdout = StdoutRedirect::capture(&mut sys).unwrap();

        let target = dir.path().join("missing").join("out.txt");
        let err = stdout.redirect(&mut sys, &target).unwrap_err();
        assert!(matches!(err, ShellError::OpenRedirect { ref path, .. } if *path == target));
        assert!(!err.is_fatal());
        assert!(sys.targets.is_empty());
    }

    #[test]
    fn test_dup2_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut sys = FdRecorder::default();
        let stdout = StdoutRedirect::capture(&mut sys).unwrap();
        sys.fail_redirect = true;

        let err = stdout.redirect(&mut sys, &dir.path().join("out.txt")).unwrap_err();
        assert!(matches!(err, ShellError::Redirect { .. }));
        assert!(!err.is_fatal());

        let err = stdout.restore(&mut sys).unwrap_err();
        assert!(err.is_fatal());
    }
}
