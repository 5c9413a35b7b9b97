use anyhow::{Context, Result};
use argh::FromArgs;
use shell_runner::Interpreter;
use shell_runner::config::ShellConfig;
use shell_runner::env::Environment;
use shell_runner::fault::FaultInjector;
use shell_runner::input::{Batch, Interactive, LineSource};
use shell_runner::sys::{Posix, Syscalls};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Line-oriented shell with background commands and output redirection.
struct Cli {
    #[argh(positional)]
    /// read commands from this file instead of prompting.
    batch_file: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
    {
        eprintln!("warning: failed to initialize tracing: {err}");
    }
}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();
    init_tracing();

    let config = ShellConfig::from_env();
    let env = Environment::from_config(&config).context("invalid default search path")?;

    let sys: Box<dyn Syscalls> = match &config.fault {
        Some(fault) => {
            tracing::info!(countdown = fault.countdown, "syscall fault injection enabled");
            Box::new(FaultInjector::new(Posix, fault))
        }
        None => Box::new(Posix),
    };

    let mut input: Box<dyn LineSource> = match &cli.batch_file {
        Some(path) => Box::new(
            Batch::open(path).with_context(|| format!("could not open {}", path.display()))?,
        ),
        None => Box::new(Interactive::new(config.prompt.as_str()).context("could not start line editor")?),
    };

    let mut shell = Interpreter::with_syscalls(env, sys)?;
    shell.repl(input.as_mut())?;
    Ok(())
}
