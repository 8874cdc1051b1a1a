//! Error types for title-basics-filter

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Error types that can occur while loading keys or filtering
#[derive(Debug)]
pub enum FilterError {
    /// I/O error while streaming a read or a write
    Io(io::Error),

    /// A file could not be opened, renamed or removed
    File {
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// One or more required input files are absent
    MissingInputs {
        /// Every expected path that was not found
        files: Vec<PathBuf>,
    },

    /// The file is empty where a header row was expected
    MissingHeader {
        /// Name of the offending file
        file: String,
    },

    /// The header row does not contain the join-key column
    MissingKeyColumn {
        /// Name of the offending file
        file: String,
        /// Column name that was looked for
        column: String,
    },
}

impl FilterError {
    /// Attach a path to an I/O error from a file-level operation
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FilterError::File {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Io(e) => write!(f, "I/O error: {}", e),
            FilterError::File { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            FilterError::MissingInputs { files } => {
                write!(f, "missing input file(s) in the working directory:")?;
                for path in files {
                    write!(f, " {}", path.display())?;
                }
                Ok(())
            }
            FilterError::MissingHeader { file } => {
                write!(f, "{}: empty file, expected a tab-separated header row", file)
            }
            FilterError::MissingKeyColumn { file, column } => {
                write!(f, "{}: header row has no '{}' column", file, column)
            }
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Io(e) => Some(e),
            FilterError::File { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for FilterError {
    fn from(e: io::Error) -> Self {
        FilterError::Io(e)
    }
}
