use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::sys::Syscalls;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "path".
    fn name() -> &'static str;

    /// Executes the command against the shell state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, env: &mut Environment, sys: &mut dyn Syscalls) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        env: &mut Environment,
        sys: &mut dyn Syscalls,
    ) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, env, sys) {
            Ok(x) => Ok(x),
            Err(e) => {
                eprintln!("{:#}", e);
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _env: &mut Environment,
        _sys: &mut dyn Syscalls,
    ) -> Result<ExitCode> {
        if self.is_error {
            eprintln!("{}", self.output.trim_end());
            Ok(1)
        } else {
            println!("{}", self.output.trim_end());
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            // Everything after the name is positional, even when it starts with `-`.
            let args: Vec<&str> = std::iter::once("--").chain(args.iter().copied()).collect();
            Some(match T::from_args(&[name], &args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

fn expect_args(name: &str, args: &[String], expected: usize) -> Result<()> {
    if args.len() != expected {
        bail!(
            "{}: expected {} argument{}, got {}",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            args.len()
        );
    }
    Ok(())
}

#[derive(FromArgs)]
/// Exit the shell with a success status.
pub struct Exit {
    #[argh(positional, greedy)]
    /// must be empty; exit takes no arguments.
    pub args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, env: &mut Environment, _sys: &mut dyn Syscalls) -> Result<ExitCode> {
        expect_args(Self::name(), &self.args, 0)?;
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory.
    pub args: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _env: &mut Environment, sys: &mut dyn Syscalls) -> Result<ExitCode> {
        expect_args(Self::name(), &self.args, 1)?;
        let target = PathBuf::from(&self.args[0]);

        sys.chdir(&target)
            .with_context(|| format!("cd: can't chdir to {}", target.display()))?;
        tracing::debug!(dir = %target.display(), "changed directory");
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Replace the executable search path.
/// With no arguments the search path becomes empty.
pub struct SetPath {
    #[argh(positional, greedy)]
    /// directories to search, in order.
    pub dirs: Vec<String>,
}

impl BuiltinCommand for SetPath {
    fn name() -> &'static str {
        "path"
    }

    fn execute(self, env: &mut Environment, _sys: &mut dyn Syscalls) -> Result<ExitCode> {
        env.search_path.replace(&self.dirs)?;
        tracing::debug!(entries = ?self.dirs, "search path replaced");
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Toggle echoing of parsed commands before they run.
pub struct ToggleDebug {}

impl BuiltinCommand for ToggleDebug {
    fn name() -> &'static str {
        "toggledebug"
    }

    fn execute(self, env: &mut Environment, _sys: &mut dyn Syscalls) -> Result<ExitCode> {
        env.debug = !env.debug;
        Ok(0)
    }
}
