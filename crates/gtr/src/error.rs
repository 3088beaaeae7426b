use std::path::{Path, PathBuf};

use crate::executor::StageRunBuilderError;

/// Errors that mean the environment is broken, as opposed to a test failing.
///
/// Toolchain failures never become one of these.  They are recorded as output and show up as mismatches.
#[derive(Debug, derive_more::Display, derive_more::IsVariant)]
enum ErrorPayload {
    #[display(fmt = "I/O error on {}: {}", "_0.display()", _1)]
    Io(PathBuf, std::io::Error),

    #[display(fmt = "Unable to read directory {}: {}", "_0.display()", _1)]
    UnreadableDirectory(PathBuf, std::io::Error),

    #[display(fmt = "Invalid configuration: {}", _0)]
    Config(serde_yaml::Error),

    #[display(fmt = "Invalid stage definition: {}", _0)]
    Stage(StageRunBuilderError),

    #[display(fmt = "Unable to serialize the run summary: {}", _0)]
    Summary(serde_json::Error),

    #[display(fmt = "Invalid fixture pattern: {}", _0)]
    Pattern(globset::Error),

    #[display(fmt = "Unable to walk directory tree: {}", _0)]
    Walk(walkdir::Error),

    #[display(fmt = "Unable to spawn worker thread {}: {}", _0, _1)]
    Spawn(String, std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{payload}")]
pub struct Error {
    payload: ErrorPayload,
}

macro_rules! conv {
    ($variant: ident, $from_err: path) => {
        impl From<$from_err> for Error {
            fn from(value: $from_err) -> Error {
                Error {
                    payload: ErrorPayload::$variant(value),
                }
            }
        }
    };
}

conv!(Config, serde_yaml::Error);
conv!(Stage, StageRunBuilderError);
conv!(Summary, serde_json::Error);
conv!(Pattern, globset::Error);
conv!(Walk, walkdir::Error);

impl Error {
    pub(crate) fn io(path: &Path, error: std::io::Error) -> Error {
        Error {
            payload: ErrorPayload::Io(path.to_path_buf(), error),
        }
    }

    pub(crate) fn unreadable_directory(path: &Path, error: std::io::Error) -> Error {
        Error {
            payload: ErrorPayload::UnreadableDirectory(path.to_path_buf(), error),
        }
    }

    pub(crate) fn spawn(thread: &str, error: std::io::Error) -> Error {
        Error {
            payload: ErrorPayload::Spawn(thread.to_string(), error),
        }
    }

    /// Did this error come from a directory which could not be listed?
    ///
    /// Directories are created by `gtr init`, so this usually means that hasn't been run.
    pub fn is_unreadable_directory(&self) -> bool {
        self.payload.is_unreadable_directory()
    }

    pub fn is_io(&self) -> bool {
        self.payload.is_io()
    }
}

/// Attach a path to I/O errors.
pub(crate) trait IoResultExt<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
