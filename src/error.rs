use std::io;

/// Error taxonomy for every fallible operation in this crate: opening a
/// stream, reading from it, seeking it, writing an output file, or a
/// malformed-data condition that has nothing to do with I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: failed to open: {1}")]
    Open(String, #[source] io::Error),

    #[error("{0}: read error: {1}")]
    Read(String, #[source] io::Error),

    #[error("{0}: seek error: {1}")]
    Seek(String, #[source] io::Error),

    #[error("{0}: write error: {1}")]
    Write(String, #[source] io::Error),

    #[error("{0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn format(context: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Error::Format(format!("{context}: {message}"))
    }
}
