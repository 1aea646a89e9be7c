use crate::metadata::TypeId;
use std::path::PathBuf;

/// Result type alias for the document generation pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document generation pipeline
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError { file: PathBuf, message: String },
    /// The structural kind of a type could not be determined. Aborts the pass.
    UnsupportedType { type_id: TypeId, reason: String },
    /// More than one descriptor for the same route and method.
    DuplicateRouteMethod { route: String, method: String, dropped: usize },
    /// A descriptor without a usable route. Indicates a broken provider.
    MissingRelativePath { method: String, operation: Option<String> },
    ManifestError { file: Option<PathBuf>, message: String },
    SerializationError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::ParseError { file, message } => {
                write!(f, "Parse error in {}: {}", file.display(), message)
            }
            Error::UnsupportedType { type_id, reason } => {
                write!(f, "Unsupported type {}: {}", type_id, reason)
            }
            Error::DuplicateRouteMethod {
                route,
                method,
                dropped,
            } => write!(
                f,
                "Duplicate endpoint {} {}: {} later descriptor(s) ignored",
                method, route, dropped
            ),
            Error::MissingRelativePath { method, operation } => match operation {
                Some(name) => write!(
                    f,
                    "Endpoint descriptor {} ({}) has no relative path",
                    name, method
                ),
                None => write!(f, "Endpoint descriptor for {} has no relative path", method),
            },
            Error::ManifestError { file, message } => match file {
                Some(file) => write!(f, "Invalid manifest {}: {}", file.display(), message),
                None => write!(f, "Invalid manifest: {}", message),
            },
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML: {}", err))
    }
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        Error::ParseError {
            file: PathBuf::from("<unknown>"),
            message: err.to_string(),
        }
    }
}
