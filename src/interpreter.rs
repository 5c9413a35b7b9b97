use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::input::LineSource;
use crate::parser::{self, Command};
use crate::redirect::StdoutRedirect;
use crate::sys::{Syscalls, exit_code};
use nix::unistd::{ForkResult, Pid};
use std::io::{self, Write};
use std::path::Path;

/// Stateless [`CommandFactory`] for a command type of this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The default command set: `exit`, `cd`, `path`, `toggledebug`, then external programs.
///
/// Builtins come first so that they shadow executables of the same name.
pub fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<SetPath>::default()),
        Box::new(Factory::<ToggleDebug>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

/// Line-at-a-time shell engine.
///
/// A line holds `&`-separated commands. Every command but the last is forked into a
/// child and runs concurrently with the rest; the last one runs in the shell itself,
/// so builtins there change the shell's own state. Before the next line is read all
/// children started by this line have been reaped.
///
/// Every system call is made through the [`Syscalls`] handed to [`Interpreter::new`].
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    sys: Box<dyn Syscalls>,
    stdout: StdoutRedirect,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    ///
    /// Saves a copy of the current stdout, which is the only step that can fail.
    pub fn new(
        commands: Vec<Box<dyn CommandFactory>>,
        env: Environment,
        mut sys: Box<dyn Syscalls>,
    ) -> Result<Self, ShellError> {
        let stdout = StdoutRedirect::capture(sys.as_mut())?;
        Ok(Self {
            env,
            commands,
            sys,
            stdout,
        })
    }

    /// Interpreter with [`default_commands`].
    pub fn with_syscalls(env: Environment, sys: Box<dyn Syscalls>) -> Result<Self, ShellError> {
        Self::new(default_commands(), env, sys)
    }

    /// Current shell state.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Read and run lines until `exit`, end of input, or a fatal error.
    pub fn repl(&mut self, input: &mut dyn LineSource) -> Result<(), ShellError> {
        while !self.env.should_exit {
            match input.read_line() {
                Ok(Some(line)) => self.eval_line(&line)?,
                Ok(None) => self.env.should_exit = true,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    tracing::warn!(error = %e, "skipping undecodable line");
                    eprintln!("read: {}", e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "could not read input");
                    eprintln!("read: {}", e);
                    self.env.should_exit = true;
                }
            }
        }
        Ok(())
    }

    /// Parse and run one line.
    ///
    /// Parse errors and per-command failures are reported on stderr. Only errors for
    /// which [`ShellError::is_fatal`] holds are returned.
    pub fn eval_line(&mut self, line: &str) -> Result<(), ShellError> {
        let commands = match parser::parse_line(line) {
            Ok(commands) => commands,
            Err(e) => {
                eprintln!("{}", e);
                return Ok(());
            }
        };

        if self.env.debug {
            print_commands(&commands);
        }
        self.run_commands(&commands)
    }

    /// Run parsed commands: all but the last in the background, the last in the foreground.
    pub fn run_commands(&mut self, commands: &[Command]) -> Result<(), ShellError> {
        let Some((foreground, background)) = commands.split_last() else {
            return Ok(());
        };

        let mut children = Vec::with_capacity(background.len());
        for cmd in background.iter().filter(|cmd| !cmd.is_empty()) {
            match self.spawn_background(cmd) {
                Ok(pid) => children.push(pid),
                Err(e) => eprintln!("{}", e),
            }
        }

        let result = self.exec_single(foreground);
        self.reap(children);
        result.map(|code| tracing::debug!(code, "foreground command finished"))
    }

    fn spawn_background(&mut self, cmd: &Command) -> Result<Pid, ShellError> {
        flush_stdout();
        match self.sys.fork().map_err(ShellError::Fork)? {
            ForkResult::Child => {
                let code = self.exec_single(cmd).unwrap_or_else(|e| {
                    eprintln!("{}", e);
                    1
                });
                flush_stdout();
                self.sys.exit(code);
            }
            ForkResult::Parent { child } => {
                tracing::debug!(%child, command = %cmd, "started background command");
                Ok(child)
            }
        }
    }

    /// Wait until every pid in `children` has been collected.
    fn reap(&mut self, mut children: Vec<Pid>) {
        while !children.is_empty() {
            match self.sys.wait_any() {
                Ok(status) => {
                    if let Some(pid) = status.pid() {
                        children.retain(|child| *child != pid);
                        tracing::debug!(%pid, code = exit_code(status), "reaped background command");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.raw_os_error() == Some(libc::ECHILD) => {
                    tracing::warn!(remaining = children.len(), "no children left to wait for");
                    break;
                }
                Err(e) => {
                    eprintln!("{}", ShellError::Wait(e));
                    break;
                }
            }
        }
    }

    /// Run one command in the current process, honoring its redirection.
    ///
    /// An empty command does nothing and succeeds.
    fn exec_single(&mut self, cmd: &Command) -> Result<ExitCode, ShellError> {
        if cmd.is_empty() {
            return Ok(0);
        }
        match self.with_redirection(cmd.output_file(), |this| this.dispatch(cmd)) {
            Ok(code) => Ok(code),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                eprintln!("{}", e);
                Ok(1)
            }
        }
    }

    /// Run `body` with stdout pointed at `output_file`, if there is one.
    ///
    /// When the file can't be opened or installed, `body` is skipped. After `body`
    /// stdout is always restored.
    fn with_redirection<T>(
        &mut self,
        output_file: Option<&Path>,
        body: impl FnOnce(&mut Self) -> T,
    ) -> Result<T, ShellError> {
        let Some(path) = output_file else {
            return Ok(body(self));
        };

        self.stdout.redirect(self.sys.as_mut(), path)?;
        let result = body(self);
        self.stdout.restore(self.sys.as_mut())?;
        Ok(result)
    }

    fn dispatch(&mut self, cmd: &Command) -> ExitCode {
        let Some(name) = cmd.name() else {
            return 0;
        };
        let args: Vec<&str> = cmd.params().iter().map(String::as_str).collect();

        let Some(command) = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, &args))
        else {
            eprintln!("command not found: {}", name);
            return 1;
        };

        match command.execute(&mut self.env, self.sys.as_mut()) {
            Ok(code) => code,
            Err(e) => {
                match e.downcast_ref::<ShellError>() {
                    Some(shell) => eprintln!("{}", shell),
                    None => eprintln!("{:#}", e),
                }
                1
            }
        }
    }
}

fn print_commands(commands: &[Command]) {
    println!("Num commands: {}", commands.len());
    for cmd in commands {
        println!("{}", cmd);
    }
    println!();
}

fn flush_stdout() {
    if let Err(e) = io::stdout().flush() {
        tracing::warn!(error = %e, "could not flush stdout");
    }
}
