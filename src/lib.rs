pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod idempotency;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod sources;

pub use config::Config;
pub use error::{DataError, Result};
pub use pipeline::{Orchestrator, RunReport};
