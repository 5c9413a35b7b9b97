use std::path::{Path, PathBuf};

/// Bounds applied whenever the search path is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLimits {
    pub max_entries: usize,
    /// Longest accepted entry, in bytes.
    pub max_entry_len: usize,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self {
            max_entries: 256,
            max_entry_len: 2047,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path: too many entries ({given}, at most {max})")]
    TooManyEntries { given: usize, max: usize },
    #[error("path: entry is too long ({len} bytes, at most {max}): {entry}")]
    EntryTooLong { entry: String, len: usize, max: usize },
}

/// Ordered list of directories searched for external executables.
///
/// The list is only ever replaced as a whole: [`SearchPath::replace`] either installs every
/// candidate or leaves the current entries untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
    limits: PathLimits,
}

impl SearchPath {
    /// Build a store from initial entries, validated against `limits`.
    pub fn new<I, S>(entries: I, limits: PathLimits) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self {
            entries: Vec::new(),
            limits,
        };
        path.replace(entries)?;
        Ok(path)
    }

    /// Swap in a new list of directories, keeping their order.
    ///
    /// An empty list clears the path, after which only the current directory is searched.
    pub fn replace<I, S>(&mut self, entries: I) -> Result<(), PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.as_ref();
            if entry.len() > self.limits.max_entry_len {
                return Err(PathError::EntryTooLong {
                    entry: entry.to_owned(),
                    len: entry.len(),
                    max: self.limits.max_entry_len,
                });
            }
            candidates.push(PathBuf::from(entry));
        }

        if candidates.len() > self.limits.max_entries {
            return Err(PathError::TooManyEntries {
                given: candidates.len(),
                max: self.limits.max_entries,
            });
        }

        self.entries = candidates;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limits(&self) -> PathLimits {
        self.limits
    }
}

impl Default for SearchPath {
    /// Single `/bin` entry.
    fn default() -> Self {
        Self {
            entries: vec![PathBuf::from("/bin")],
            limits: PathLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(path: &SearchPath) -> Vec<&Path> {
        path.iter().collect()
    }

    #[test]
    fn test_default_is_bin() {
        let path = SearchPath::default();
        assert_eq!(entries(&path), [Path::new("/bin")]);
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut path = SearchPath::default();
        path.replace(["/usr/local/bin", "/usr/bin", "/bin"]).unwrap();
        assert_eq!(
            entries(&path),
            [
                Path::new("/usr/local/bin"),
                Path::new("/usr/bin"),
                Path::new("/bin")
            ]
        );
    }

    #[test]
    fn test_replace_with_nothing_clears() {
        let mut path = SearchPath::default();
        path.replace(Vec::<String>::new()).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn test_too_long_entry_keeps_old_value() {
        let limits = PathLimits {
            max_entries: 8,
            max_entry_len: 8,
        };
        let mut path = SearchPath::new(["/bin"], limits).unwrap();

        let err = path.replace(["/usr/bin", "/a/very/long/dir"]).unwrap_err();
        assert_eq!(
            err,
            PathError::EntryTooLong {
                entry: "/a/very/long/dir".to_string(),
                len: 16,
                max: 8,
            }
        );
        assert_eq!(entries(&path), [Path::new("/bin")]);
    }

    #[test]
    fn test_too_many_entries_keeps_old_value() {
        let limits = PathLimits {
            max_entries: 2,
            max_entry_len: 64,
        };
        let mut path = SearchPath::new(["/bin"], limits).unwrap();

        let err = path.replace(["/a", "/b", "/c"]).unwrap_err();
        assert_eq!(err, PathError::TooManyEntries { given: 3, max: 2 });
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_entry_at_the_limit_is_accepted() {
        let limits = PathLimits {
            max_entries: 1,
            max_entry_len: 4,
        };
        let path = SearchPath::new(["/bin"], limits).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.limits(), limits);
    }
}
