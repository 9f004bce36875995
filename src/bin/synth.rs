//! Evaluates the resource descriptor and prints the deployment plan.
//!
//! The provisioning tool consumes the JSON emitted on stdout; logs go
//! to stderr.

use prediction_lambda::stack::{prediction_stack, StackConfig};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = StackConfig::default();
    let template = match prediction_stack(&config).and_then(|stack| stack.synth()) {
        Ok(template) => template,
        Err(err) => {
            error!("failed to synthesize stack: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        stack = %template.stack_name,
        resources = template.resources.len(),
        "stack synthesized"
    );

    match serde_json::to_string_pretty(&template) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("failed to serialize template: {err}");
            ExitCode::FAILURE
        }
    }
}
