use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::Factory;
use crate::search_path::SearchPath;
use crate::sys::{Syscalls, exit_code};
use anyhow::{Result, anyhow};
use nix::unistd::{self, AccessFlags, ForkResult, Pid};
use std::borrow::Cow;
use std::ffi::CString;
use std::fs;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Status a forked child exits with when `execv` fails.
pub const EXEC_FAILED: ExitCode = 127;

/// Command that is not a builtin.
pub struct ExternalCommand {
    name: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(name: String, args: Vec<String>) -> Self {
        Self { name, args }
    }

    fn argv(&self) -> Result<Vec<CString>> {
        std::iter::once(&self.name)
            .chain(&self.args)
            .map(|arg| CString::new(arg.as_str()).map_err(Into::into))
            .collect()
    }
}

/// Matches every name, so it must come last in the interpreter's factory list.
impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        Some(Box::new(ExternalCommand::new(
            name.to_owned(),
            args.iter().map(|x| x.to_string()).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, env: &mut Environment, sys: &mut dyn Syscalls) -> Result<ExitCode> {
        let cwd = match sys.getcwd() {
            Ok(dir) => Some(dir),
            Err(e) => {
                eprintln!("getcwd: {}", e);
                None
            }
        };

        let program = find_command_path(&env.search_path, cwd.as_deref(), Path::new(&self.name))
            .ok_or_else(|| anyhow!("could not find executable: {}", self.name))?;
        let program = CString::new(program.as_os_str().as_bytes())?;
        let argv = self.argv()?;

        // Anything still buffered would otherwise be written twice, once per process.
        io::stdout().flush()?;

        match sys.fork().map_err(ShellError::Fork)? {
            ForkResult::Child => {
                let err = match sys.execv(&program, &argv) {
                    Err(e) => e,
                    Ok(never) => match never {},
                };
                eprintln!("{}: {}", self.name, err);
                sys.exit(EXEC_FAILED);
            }
            ForkResult::Parent { child } => {
                tracing::debug!(%child, program = ?program, "started external command");
                let code = wait_for(sys, child)?;
                tracing::debug!(%child, code, "external command finished");
                Ok(code)
            }
        }
    }
}

fn wait_for(sys: &mut dyn Syscalls, child: Pid) -> Result<ExitCode> {
    loop {
        match sys.waitpid(child) {
            Ok(status) => return Ok(exit_code(status)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ShellError::Wait(e).into()),
        }
    }
}

/// Resolve a program name the way this shell does.
///
/// Behavior:
/// - Absolute path: returned unchanged, without touching the filesystem; `execv` decides.
/// - Anything else: the current directory (when known) and then each search path entry
///   are scanned for a directory entry named exactly `name` that the current user may
///   execute. The first directory with such an entry wins.
/// - Empty name: `None`.
///
/// Because directories are matched by entry name, a relative name containing `/` never
/// resolves.
pub fn find_command_path<'a>(
    search_path: &SearchPath,
    cwd: Option<&Path>,
    name: &'a Path,
) -> Option<Cow<'a, Path>> {
    if name.is_absolute() {
        return Some(Cow::Borrowed(name));
    }
    if name.as_os_str().is_empty() {
        return None;
    }

    cwd.into_iter()
        .chain(search_path.iter())
        .find_map(|dir| exe_in_dir(dir, name))
        .map(Cow::Owned)
}

fn exe_in_dir(dir: &Path, name: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "could not open directory");
            return None;
        }
    };

    for entry in entries.flatten() {
        if entry.file_name() != name.as_os_str() {
            continue;
        }
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }

        let path = dir.join(name);
        match unistd::access(&path, AccessFlags::X_OK) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "found executable");
                return Some(path);
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "found file but it is not executable");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_path::PathLimits;
    use std::fs::File;
    use std::os::unix::fs::PermissionsExt;

    fn touch(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).expect("touch");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
        path
    }

    fn search_path(dirs: &[&Path]) -> SearchPath {
        SearchPath::new(
            dirs.iter().map(|d| d.to_string_lossy().into_owned()),
            PathLimits::default(),
        )
        .unwrap()
    }

    #[test]
    fn absolute_path_is_returned_unchecked() {
        let path = Path::new("/does/not/exist");
        let res = find_command_path(&SearchPath::default(), None, path);
        assert_eq!(res.as_deref(), Some(path));
    }

    #[test]
    fn first_directory_in_search_path_wins() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let in_a = touch(a.path(), "prog", 0o755);
        touch(b.path(), "prog", 0o755);

        let path = search_path(&[a.path(), b.path()]);
        let found = find_command_path(&path, None, Path::new("prog")).expect("prog in A");
        assert_eq!(found.as_ref(), in_a);

        let path = search_path(&[b.path(), a.path()]);
        let found = find_command_path(&path, None, Path::new("prog")).expect("prog in B");
        assert!(found.as_ref().starts_with(b.path()));
    }

    #[test]
    fn current_directory_is_searched_first() {
        let cwd = tempfile::tempdir().unwrap();
        let a = tempfile::tempdir().unwrap();
        let in_cwd = touch(cwd.path(), "prog", 0o755);
        touch(a.path(), "prog", 0o755);

        let path = search_path(&[a.path()]);
        let found = find_command_path(&path, Some(cwd.path()), Path::new("prog")).unwrap();
        assert_eq!(found.as_ref(), in_cwd);
    }

    #[test]
    fn non_executable_match_is_skipped() {
        // X_OK passes for root as soon as any x bit is set
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        touch(a.path(), "prog", 0o644);
        let in_b = touch(b.path(), "prog", 0o700);

        let path = search_path(&[a.path(), b.path()]);
        let found = find_command_path(&path, None, Path::new("prog")).unwrap();
        assert_eq!(found.as_ref(), in_b);
    }

    #[test]
    fn directory_with_matching_name_is_skipped() {
        let a = tempfile::tempdir().unwrap();
        fs::create_dir(a.path().join("prog")).unwrap();

        let path = search_path(&[a.path()]);
        assert!(find_command_path(&path, None, Path::new("prog")).is_none());
    }

    #[test]
    fn not_found_anywhere() {
        let a = tempfile::tempdir().unwrap();
        touch(a.path(), "other", 0o755);

        let path = search_path(&[a.path(), Path::new("/does/not/exist")]);
        assert!(find_command_path(&path, Some(a.path()), Path::new("prog")).is_none());
    }

    #[test]
    fn empty_search_path_only_checks_cwd() {
        let cwd = tempfile::tempdir().unwrap();
        let mut path = SearchPath::default();
        path.replace(Vec::<String>::new()).unwrap();

        assert!(find_command_path(&path, Some(cwd.path()), Path::new("sh")).is_none());

        let local = touch(cwd.path(), "sh", 0o755);
        let found = find_command_path(&path, Some(cwd.path()), Path::new("sh")).unwrap();
        assert_eq!(found.as_ref(), local);
    }

    #[test]
    fn relative_name_with_separator_never_resolves() {
        let cwd = tempfile::tempdir().unwrap();
        fs::create_dir(cwd.path().join("bin")).unwrap();
        touch(&cwd.path().join("bin"), "prog", 0o755);

        let path = search_path(&[cwd.path()]);
        assert!(find_command_path(&path, Some(cwd.path()), Path::new("bin/prog")).is_none());
    }

    #[test]
    fn empty_name_is_none() {
        let res = find_command_path(&SearchPath::default(), None, Path::new(""));
        assert!(res.is_none(), "Empty name should not resolve to anything");
    }

    #[test]
    fn argv_starts_with_program_name() {
        let cmd = ExternalCommand::new("ls".into(), vec!["-l".into(), "/tmp".into()]);
        let argv = cmd.argv().unwrap();
        let argv: Vec<_> = argv.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(argv, ["ls", "-l", "/tmp"]);
    }
}
