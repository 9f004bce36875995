use crate::error::PredictError;
use crate::model::Predictor;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Read access to the durable model bucket.
///
/// The production implementation talks to the bucket endpoint over
/// HTTPS; tests substitute an in-memory store.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Fetches a whole object by key. One attempt, no retry.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, PredictError>;
}

/// Fetches objects from the bucket's HTTPS endpoint.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, PredictError> {
        let url = format!("{}/{}", self.base_url, key);
        debug!(%url, "fetching model artifact from object store");
        let fetch_err = |err: reqwest::Error| PredictError::Fetch {
            key: key.to_owned(),
            reason: err.to_string(),
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?;
        let bytes = response.bytes().await.map_err(fetch_err)?;
        Ok(bytes.to_vec())
    }
}

/// Loads the predictor through the read-through cache.
///
/// The cache path is consulted first; only an absent file falls back to
/// the object store, after which the artifact is written to the cache
/// path and deserialized from there. A file that exists but does not
/// decode is fatal, as is any fetch or write failure. Two cold
/// environments racing on the same path both write the same immutable
/// bytes, so the unsynchronized write is tolerated.
pub async fn load_predictor<S: ObjectStore>(
    cache_path: &Path,
    store: &S,
    key: &str,
) -> Result<Predictor, PredictError> {
    match fs::read(cache_path) {
        Ok(bytes) => {
            debug!(path = %cache_path.display(), "model artifact found in cache");
            Predictor::from_slice(&bytes)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %cache_path.display(), key, "cache miss, fetching model artifact");
            let bytes = store.fetch(key).await?;
            fs::write(cache_path, &bytes).map_err(|source| PredictError::CacheWrite {
                path: cache_path.to_path_buf(),
                source,
            })?;
            let cached = fs::read(cache_path).map_err(|source| PredictError::CacheRead {
                path: cache_path.to_path_buf(),
                source,
            })?;
            info!(path = %cache_path.display(), "model artifact cached");
            Predictor::from_slice(&cached)
        }
        Err(source) => Err(PredictError::CacheRead {
            path: cache_path.to_path_buf(),
            source,
        }),
    }
}

/// Process-wide model cache.
///
/// One predictor per execution environment: the first request pays the
/// full acquisition cost, every later request in the same environment
/// reuses the in-memory predictor. There is no teardown; the cell lives
/// until the host recycles the environment. A failed load leaves the
/// cell empty, so the next invocation walks the full fallback path
/// again.
#[derive(Default)]
pub struct ModelCache {
    cell: OnceCell<Predictor>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load<S: ObjectStore>(
        &self,
        cache_path: &Path,
        store: &S,
        key: &str,
    ) -> Result<&Predictor, PredictError> {
        self.cell
            .get_or_try_init(|| load_predictor(cache_path, store, key))
            .await
    }
}
