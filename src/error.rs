use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while serving a prediction.
///
/// Only the cache miss is recovered (inside the model store); every
/// variant here propagates to the Lambda runtime, which answers the
/// client with the platform's generic error response.
#[derive(Error, Debug)]
pub enum PredictError {
    /// The request carried no input vector
    #[error("missing required query parameter {name:?}")]
    MissingQuery { name: &'static str },

    /// The input was not a bracketed, comma-separated numeric list
    #[error("malformed input vector {input:?}: {reason}")]
    MalformedVector { input: String, reason: String },

    /// Reading the cached artifact failed for a reason other than absence
    #[error("failed to read cached model at {path:?}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the fetched artifact to the cache failed
    #[error("failed to write model to cache at {path:?}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The object-store fetch failed
    #[error("failed to fetch model object {key:?}: {reason}")]
    Fetch { key: String, reason: String },

    /// The artifact bytes did not decode into a predictor
    #[error("failed to deserialize model artifact: {0}")]
    Deserialize(#[from] serde_json::Error),
}
