use std::error::Error;
use std::fmt;

use crate::model::LoadError;
use crate::propagate::PropagateError;

/// Errors reported when analyzing a network file.
#[derive(Debug)]
pub enum AnalysisError {
    /// The network document could not be read or parsed.
    Load(LoadError),

    /// Shape propagation failed.
    Propagate(PropagateError),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Load(err) => write!(f, "{}", err),
            AnalysisError::Propagate(err) => write!(f, "shape propagation failed: {}", err),
        }
    }
}

impl Error for AnalysisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnalysisError::Load(err) => Some(err),
            AnalysisError::Propagate(err) => Some(err),
        }
    }
}

impl From<LoadError> for AnalysisError {
    fn from(val: LoadError) -> AnalysisError {
        AnalysisError::Load(val)
    }
}

impl From<PropagateError> for AnalysisError {
    fn from(val: PropagateError) -> AnalysisError {
        AnalysisError::Propagate(val)
    }
}
