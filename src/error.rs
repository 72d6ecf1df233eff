//! Error taxonomy for extraction, synthesis, and persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the argsmith library.
#[derive(Error, Debug)]
pub enum Error {
    /// A public method has no docstring while strict extraction is enabled.
    #[error("missing docstring in method {class}.{method}: extraction aborted")]
    MissingDocumentation {
        /// Class that owns the method
        class: String,
        /// Method without a docstring
        method: String,
    },

    /// An annotation call whose arguments cannot be evaluated statically.
    ///
    /// Never returned from the public API: the resolver logs it and drops the flag.
    #[error("cannot resolve @{marker} on {method}: {reason}")]
    UnresolvedAnnotation {
        /// Marker name as written at the call site
        marker: String,
        /// Decorated method
        method: String,
        /// Why the arguments could not be evaluated
        reason: String,
    },

    /// Persistence path with an extension outside the known set.
    #[error("no persistence format for extension '{extension}' ({path})")]
    UnsupportedFormat {
        /// Offending path
        path: PathBuf,
        /// Extension that was not recognised
        extension: String,
    },

    /// An internal identifier used by a synthesis builder is malformed.
    #[error("invalid identifier {name:?}: {reason}")]
    IdentifierFormat {
        /// The rejected identifier
        name: String,
        /// Which rule it broke
        reason: String,
    },

    /// Unknown documentation convention name.
    #[error("unknown docstring format: {0}. Use google, epytext, rest, or numpydoc")]
    UnknownConvention(String),

    /// The input file is not valid Python.
    #[error("syntax error in {location} at line {line}: {message}")]
    Syntax {
        /// Source file reference
        location: String,
        /// 1-based line of the first error node
        line: usize,
        /// Short description
        message: String,
    },

    /// I/O failure on a specific path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The interactive overwrite prompt could not be shown.
    #[error("overwrite prompt failed: {0}")]
    Prompt(String),
}

impl Error {
    /// Attach a path to an [`std::io::Error`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
