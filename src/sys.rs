//! The boundary between the shell and the operating system.
//!
//! Every system call the interpreter can fail on goes through [`Syscalls`], so that a test
//! double or [`crate::fault::FaultInjector`] can stand in for the real thing without the
//! interpreter knowing.

use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Permission bits for files created by output redirection.
pub const REDIRECT_MODE: u32 = 0o600;

/// Fallible system calls used by the interpreter.
pub trait Syscalls {
    /// Open `path` for writing, creating it with [`REDIRECT_MODE`] or truncating it.
    fn open_output(&mut self, path: &Path) -> io::Result<OwnedFd>;

    /// Duplicate the current standard output descriptor.
    fn dup_stdout(&mut self) -> io::Result<OwnedFd>;

    /// Make standard output refer to the same file as `fd` (`dup2(fd, 1)`).
    fn redirect_stdout(&mut self, fd: BorrowedFd<'_>) -> io::Result<()>;

    /// Create a child process.
    fn fork(&mut self) -> io::Result<ForkResult>;

    /// Replace the current process image; only returns on failure.
    fn execv(&mut self, path: &CStr, argv: &[CString]) -> io::Result<Infallible>;

    /// Block until `pid` terminates.
    fn waitpid(&mut self, pid: Pid) -> io::Result<WaitStatus>;

    /// Block until any child terminates.
    fn wait_any(&mut self) -> io::Result<WaitStatus>;

    fn chdir(&mut self, path: &Path) -> io::Result<()>;

    fn getcwd(&mut self) -> io::Result<PathBuf>;

    /// End the current process, typically a forked child, with `code`.
    fn exit(&mut self, code: i32) -> ! {
        std::process::exit(code)
    }
}

/// The real thing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Posix;

impl Syscalls for Posix {
    fn open_output(&mut self, path: &Path) -> io::Result<OwnedFd> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(REDIRECT_MODE)
            .open(path)?;
        Ok(file.into())
    }

    fn dup_stdout(&mut self) -> io::Result<OwnedFd> {
        io::stdout().as_fd().try_clone_to_owned()
    }

    fn redirect_stdout(&mut self, fd: BorrowedFd<'_>) -> io::Result<()> {
        // SAFETY: both descriptors are valid for the duration of the call and fd 1 is owned
        // by the process, not by any Rust object that could observe the swap.
        let rc = unsafe { libc::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn fork(&mut self) -> io::Result<ForkResult> {
        // SAFETY: the shell is single threaded, so the child cannot inherit a lock held
        // by another thread.
        Ok(unsafe { unistd::fork() }?)
    }

    fn execv(&mut self, path: &CStr, argv: &[CString]) -> io::Result<Infallible> {
        Ok(unistd::execv(path, argv)?)
    }

    fn waitpid(&mut self, pid: Pid) -> io::Result<WaitStatus> {
        Ok(wait::waitpid(pid, None)?)
    }

    fn wait_any(&mut self) -> io::Result<WaitStatus> {
        Ok(wait::wait()?)
    }

    fn chdir(&mut self, path: &Path) -> io::Result<()> {
        std::env::set_current_dir(path)
    }

    fn getcwd(&mut self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }
}

/// Shell-style exit code for a finished child.
///
/// Normal exits keep their status, signals map to `128 + signo`.
pub fn exit_code(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => -1,
    }
}
