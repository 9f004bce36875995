use lambda_http::{run, service_fn, tracing, Error};
use prediction_lambda::config::Config;
use prediction_lambda::http_handler::function_handler;
use prediction_lambda::model_store::{HttpObjectStore, ModelCache};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for CloudWatch logs
    tracing::init_default_subscriber();

    let config = Arc::new(Config::from_env());
    let store = Arc::new(HttpObjectStore::new(config.bucket_url.clone()));

    // The model itself is not loaded here: the cache fills lazily on the
    // first request and is reused for the lifetime of this environment.
    let cache = Arc::new(ModelCache::new());

    // Start the Lambda runtime.
    // Each incoming request clones the shared state and calls function_handler.
    run(service_fn(move |event| {
        let config = config.clone();
        let store = store.clone();
        let cache = cache.clone();
        async move { function_handler(config.as_ref(), cache.as_ref(), store.as_ref(), event).await }
    }))
    .await
}
