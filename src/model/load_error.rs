use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors that occur when loading a network document.
#[derive(Debug)]
pub enum LoadError {
    /// An I/O error occurred reading the document.
    Io(std::io::Error),

    /// The document is not valid JSON or does not have the expected structure.
    Parse(serde_json::Error),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "failed to read network: {}", err),
            LoadError::Parse(err) => write!(f, "failed to parse network: {}", err),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Io(err) => Some(err),
            LoadError::Parse(err) => Some(err),
        }
    }
}
