//! Deterministic system-call failure injection.
//!
//! [`FaultInjector`] wraps another [`Syscalls`] implementation. The first `countdown` calls
//! pass straight through, the next one fails with a plausible errno for that kind of call,
//! and everything afterwards passes through again. Marker files let an outside runner check
//! that the fault really fired and that the shell process went away cleanly.

use crate::config::FaultConfig;
use crate::sys::Syscalls;
use nix::sys::wait::WaitStatus;
use nix::unistd::{ForkResult, Pid};
use std::convert::Infallible;
use std::ffi::{CStr, CString, OsStr};
use std::fs;
use std::io;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};

/// Name of the marker created when the fault fires.
pub const FIRED_MARKER: &str = ".syscall_fired";

/// The kinds of call the injector can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Open,
    Dup,
    Dup2,
    Fork,
    Execv,
    Wait,
    Chdir,
    Getcwd,
}

impl Call {
    /// Errno reported when this call is the one that fails.
    pub fn errno(self) -> i32 {
        match self {
            Call::Open => libc::EACCES,
            Call::Dup => libc::EMFILE,
            Call::Dup2 => libc::EBADF,
            Call::Fork => libc::EAGAIN,
            Call::Execv => libc::ENOENT,
            Call::Wait => libc::EINVAL,
            Call::Chdir => libc::EACCES,
            Call::Getcwd => libc::ENAMETOOLONG,
        }
    }
}

pub struct FaultInjector<S> {
    inner: S,
    remaining: u64,
    fired: bool,
    marker_dir: PathBuf,
    pid_file: Option<PathBuf>,
}

impl<S: Syscalls> FaultInjector<S> {
    /// Wrap `inner` and drop this process's liveness file into the marker directory.
    pub fn new(inner: S, config: &FaultConfig) -> Self {
        let pid_file = create_pid_file(&config.marker_dir);
        Self {
            inner,
            remaining: config.countdown,
            fired: false,
            marker_dir: config.marker_dir.clone(),
            pid_file,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Count one call; returns the injected error if this is the one that fails.
    fn tick(&mut self, call: Call) -> io::Result<()> {
        if self.fired {
            return Ok(());
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(());
        }

        self.fired = true;
        tracing::warn!(?call, errno = call.errno(), "injecting system call failure");
        let marker = self.marker_dir.join(FIRED_MARKER);
        if let Err(e) = fs::create_dir_all(&self.marker_dir).and_then(|_| fs::write(&marker, b""))
        {
            tracing::warn!(path = %marker.display(), error = %e, "could not write fault marker");
        }
        Err(io::Error::from_raw_os_error(call.errno()))
    }
}

fn create_pid_file(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(std::process::id().to_string());
    match fs::create_dir_all(dir).and_then(|_| fs::write(&path, b"")) {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not write liveness file");
            None
        }
    }
}

impl<S> FaultInjector<S> {
    /// Remove the liveness file, if this process is the one that created it.
    fn remove_pid_file(&mut self) {
        let ours = std::process::id().to_string();
        if let Some(path) = self.pid_file.take() {
            if path.file_name() == Some(OsStr::new(&ours)) {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove liveness file");
                }
            }
        }
    }
}

impl<S> Drop for FaultInjector<S> {
    fn drop(&mut self) {
        self.remove_pid_file();
    }
}

impl<S: Syscalls> Syscalls for FaultInjector<S> {
    fn open_output(&mut self, path: &Path) -> io::Result<OwnedFd> {
        self.tick(Call::Open)?;
        self.inner.open_output(path)
    }

    fn dup_stdout(&mut self) -> io::Result<OwnedFd> {
        self.tick(Call::Dup)?;
        self.inner.dup_stdout()
    }

    fn redirect_stdout(&mut self, fd: BorrowedFd<'_>) -> io::Result<()> {
        self.tick(Call::Dup2)?;
        self.inner.redirect_stdout(fd)
    }

    fn fork(&mut self) -> io::Result<ForkResult> {
        self.tick(Call::Fork)?;
        let result = self.inner.fork()?;
        if result.is_child() {
            self.pid_file = create_pid_file(&self.marker_dir);
        }
        Ok(result)
    }

    fn execv(&mut self, path: &CStr, argv: &[CString]) -> io::Result<Infallible> {
        // The new image never runs our destructors.
        self.remove_pid_file();
        self.tick(Call::Execv)?;
        self.inner.execv(path, argv)
    }

    fn waitpid(&mut self, pid: Pid) -> io::Result<WaitStatus> {
        self.tick(Call::Wait)?;
        self.inner.waitpid(pid)
    }

    fn wait_any(&mut self) -> io::Result<WaitStatus> {
        self.tick(Call::Wait)?;
        self.inner.wait_any()
    }

    fn chdir(&mut self, path: &Path) -> io::Result<()> {
        self.tick(Call::Chdir)?;
        self.inner.chdir(path)
    }

    fn getcwd(&mut self) -> io::Result<PathBuf> {
        self.tick(Call::Getcwd)?;
        self.inner.getcwd()
    }

    fn exit(&mut self, code: i32) -> ! {
        self.remove_pid_file();
        self.inner.exit(code)
    }
}
