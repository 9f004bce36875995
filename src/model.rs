use crate::error::PredictError;
use serde::{Deserialize, Serialize};

/// Deserialized prediction model.
///
/// The artifact is a small JSON document uploaded to the model bucket at
/// deployment time and cached on the shared filesystem on first use.
/// `output` is the value returned for every prediction: a placeholder
/// standing in for a real inference pass, kept so the serving path
/// (fetch, cache, deserialize, predict, respond) is exercised end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictor {
    /// Human-readable model identifier
    pub model: String,
    /// Constant returned by [`Predictor::predict`]
    pub output: f64,
}

impl Predictor {
    /// Deserializes an artifact. A readable-but-undecodable artifact is
    /// an error here, never a cache miss.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PredictError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Placeholder inference: accepts the input vector and ignores it.
    /// Replace the artifact format and this method together when a real
    /// model is trained.
    pub fn predict(&self, _input: &[f64]) -> f64 {
        self.output
    }
}
