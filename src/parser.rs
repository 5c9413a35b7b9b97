//! Splitting one input line into commands.
//!
//! The grammar is deliberately flat:
//!
//! ```text
//! line    := segment ('&' segment)*
//! segment := word* ('>' word)? word*
//! ```
//!
//! Words are runs of non-whitespace characters. There is no quoting and no escaping, so
//! `&` and `>` are only special as described above: `&` always separates, while `>` is a
//! redirection only when it stands alone as a word.

use std::fmt;
use std::path::{Path, PathBuf};

/// Token separating background commands.
pub const BACKGROUND_SEPARATOR: char = '&';

/// Word introducing an output redirection.
pub const REDIRECT_WORD: &str = ">";

/// A single parsed invocation: program name, its arguments and an optional stdout target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// `args[0]` is the program or builtin name.
    pub args: Vec<String>,
    /// File that stdout goes to while this command runs.
    pub output_file: Option<PathBuf>,
}

impl Command {
    /// Program or builtin name, `None` for an empty segment.
    pub fn name(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Arguments after the program name.
    pub fn params(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }

    /// Number of arguments excluding the program name.
    ///
    /// Returns `None` for an empty segment, where there is no program name to exclude.
    pub fn argc(&self) -> Option<usize> {
        self.args.len().checked_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))?;
        if let Some(path) = &self.output_file {
            write!(f, " {} {}", REDIRECT_WORD, path.display())?;
        }
        Ok(())
    }
}

/// Errors that abort parsing of a whole line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsingError {
    /// A segment contained more than one `>` word.
    #[error("multiple redirects not allowed in a single command")]
    MultipleRedirects,
    /// A `>` word was the last word of its segment.
    #[error("missing file name after '>'")]
    MissingRedirectTarget,
}

struct SegmentParser<'a> {
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> SegmentParser<'a> {
    fn new(segment: &'a str) -> Self {
        Self {
            words: segment.split_whitespace(),
        }
    }

    fn consume(&mut self) -> Option<&'a str> {
        self.words.next()
    }

    /// Parse a segment: word* ('>' word)? word*
    fn parse(mut self) -> Result<Command, ParsingError> {
        let mut command = Command::default();

        while let Some(word) = self.consume() {
            if word != REDIRECT_WORD {
                command.args.push(word.to_owned());
                continue;
            }

            if command.output_file.is_some() {
                return Err(ParsingError::MultipleRedirects);
            }
            match self.consume() {
                Some(REDIRECT_WORD) => return Err(ParsingError::MultipleRedirects),
                Some(target) => command.output_file = Some(PathBuf::from(target)),
                None => return Err(ParsingError::MissingRedirectTarget),
            }
        }

        Ok(command)
    }
}

/// Parse one line into its commands, left to right.
///
/// A line with `k` background separators always yields `k + 1` commands; segments with no
/// words become empty commands. Any malformed segment fails the whole line.
pub fn parse_line(line: &str) -> Result<Vec<Command>, ParsingError> {
    line.split(BACKGROUND_SEPARATOR)
        .map(|segment| SegmentParser::new(segment).parse())
        .collect()
}
