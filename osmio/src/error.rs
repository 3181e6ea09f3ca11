use thiserror::Error;

pub type Result<T> = std::result::Result<T, FileError>;

/// What can go wrong while scanning or writing a database file. The build
/// pipeline wraps these with context and aborts the current phase; readers at
/// query time surface them unchanged.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("{op} failed for '{path}': {source}")]
    Io {
        path: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("format error in '{path}': {context}")]
    Format { path: String, context: String },

    #[error("unexpected end of file in '{path}'")]
    Eof { path: String },
}

impl FileError {
    pub(crate) fn io(path: &str, op: &'static str, source: std::io::Error) -> FileError {
        FileError::Io {
            path: path.to_string(),
            op,
            source,
        }
    }

    pub(crate) fn format(path: &str, context: impl Into<String>) -> FileError {
        FileError::Format {
            path: path.to_string(),
            context: context.into(),
        }
    }

    pub(crate) fn eof(path: &str) -> FileError {
        FileError::Eof {
            path: path.to_string(),
        }
    }
}
