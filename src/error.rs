use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum InkfallError {
    MissingInput(PathBuf),
    InvalidConfiguration(String),
    Parse(String),
    Backend {
        name: &'static str,
        message: String,
    },
    AllBackendsFailed,
    Asset(String),
    Io(std::io::Error),
}

impl fmt::Display for InkfallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InkfallError::MissingInput(path) => {
                write!(f, "input document does not exist: {}", path.display())
            }
            InkfallError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            InkfallError::Parse(message) => write!(f, "document parse error: {}", message),
            InkfallError::Backend { name, message } => {
                write!(f, "backend '{}' failed: {}", name, message)
            }
            InkfallError::AllBackendsFailed => write!(f, "no conversion backend succeeded"),
            InkfallError::Asset(message) => write!(f, "asset error: {}", message),
            InkfallError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for InkfallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InkfallError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for InkfallError {
    fn from(value: std::io::Error) -> Self {
        InkfallError::Io(value)
    }
}
