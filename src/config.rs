use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Base HTTPS endpoint of the bucket holding the serialized model.
pub const DEFAULT_BUCKET_URL: &str = "https://models-bucket.s3.amazonaws.com";

/// Well-known object key of the model artifact.
pub const DEFAULT_OBJECT_KEY: &str = "model.json";

/// Mount path of the shared filesystem inside the execution environment.
pub const DEFAULT_CACHE_DIR: &str = "/mnt/models";

/// Origin echoed in the CORS header of every success response. The
/// allow-all default matches the public function URL; override
/// `ALLOW_ORIGIN` to narrow it.
pub const DEFAULT_ALLOW_ORIGIN: &str = "*";

/// Runtime configuration, resolved once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub bucket_url: String,
    pub object_key: String,
    pub cache_dir: PathBuf,
    pub allow_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_url: DEFAULT_BUCKET_URL.to_owned(),
            object_key: DEFAULT_OBJECT_KEY.to_owned(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            allow_origin: DEFAULT_ALLOW_ORIGIN.to_owned(),
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to the
    /// defaults wired into the deployed stack for any unset variable.
    pub fn from_env() -> Self {
        let var = |name: &str, fallback: &str| env::var(name).unwrap_or_else(|_| fallback.to_owned());

        let config = Self {
            bucket_url: var("MODEL_BUCKET_URL", DEFAULT_BUCKET_URL),
            object_key: var("MODEL_OBJECT_KEY", DEFAULT_OBJECT_KEY),
            cache_dir: PathBuf::from(var("MODEL_CACHE_DIR", DEFAULT_CACHE_DIR)),
            allow_origin: var("ALLOW_ORIGIN", DEFAULT_ALLOW_ORIGIN),
        };
        debug!(?config, "resolved runtime configuration");
        config
    }

    /// Location of the cached artifact on the shared filesystem.
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.object_key)
    }
}
