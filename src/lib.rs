pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod logging;
pub mod nlp;
pub mod observability;
pub mod pipeline;
pub mod storage;

pub use config::PipelineConfig;
pub use error::{PrepError, Result};
pub use pipeline::{CleanResult, Pipeline, TokenizeResult};
