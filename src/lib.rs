//! Serverless prediction service: a Lambda handler that serves a cached
//! model over a public function URL, plus the typed description of the
//! cloud resources it runs on.

pub mod config;
pub mod error;
pub mod http_handler;
pub mod model;
pub mod model_store;
pub mod stack;
