use crate::config::Config;
use crate::error::PredictError;
use crate::model_store::{ModelCache, ObjectStore};
use lambda_http::{Body, Error, Request, RequestExt, Response};
use tracing::info;

/// Query parameter carrying the input vector
const QUERY_PARAM: &str = "q";

/// Parses the textual form of a numeric list, e.g. `[1,2.5,3]`.
///
/// The client sends a list that was stringified on its side: comma
/// separated, one leading `[` on the first token, one trailing `]` on
/// the last (the same token for a single-element list). Every token
/// must parse as a float; missing brackets, empty input, and
/// non-numeric tokens are all errors.
pub fn parse_vector(raw: &str) -> Result<Vec<f64>, PredictError> {
    let malformed = |reason: String| PredictError::MalformedVector {
        input: raw.to_owned(),
        reason,
    };

    let tokens: Vec<&str> = raw.split(',').collect();
    let last = tokens.len() - 1;

    let mut values = Vec::with_capacity(tokens.len());
    for (i, mut token) in tokens.into_iter().enumerate() {
        if i == 0 {
            token = token
                .strip_prefix('[')
                .ok_or_else(|| malformed("missing leading '['".to_owned()))?;
        }
        if i == last {
            token = token
                .strip_suffix(']')
                .ok_or_else(|| malformed("missing trailing ']'".to_owned()))?;
        }
        let value: f64 = token
            .trim()
            .parse()
            .map_err(|_| malformed(format!("non-numeric token {token:?}")))?;
        values.push(value);
    }
    Ok(values)
}

/// Lambda handler function.
///
/// Reads the input vector from the `q` query parameter, acquires the
/// predictor (lazily on the first request in this environment), and
/// returns the prediction as plain text. Any failure propagates to the
/// runtime, which answers with the platform's generic error response.
pub async fn function_handler<S: ObjectStore>(
    config: &Config,
    cache: &ModelCache,
    store: &S,
    event: Request,
) -> Result<Response<Body>, Error> {
    let params = event.query_string_parameters();
    let raw = params
        .first(QUERY_PARAM)
        .ok_or(PredictError::MissingQuery { name: QUERY_PARAM })?;

    let input = parse_vector(raw)?;

    let predictor = cache
        .get_or_load(&config.cache_path(), store, &config.object_key)
        .await?;
    let prediction = predictor.predict(&input);
    info!(
        model = %predictor.model,
        input_len = input.len(),
        prediction,
        "prediction served"
    );

    let response = Response::builder()
        .status(200)
        .header("Access-Control-Allow-Origin", config.allow_origin.as_str())
        .header("content-type", "text/plain")
        .body(Body::from(format!("The predicted value is {prediction}")))
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    Ok(response)
}
