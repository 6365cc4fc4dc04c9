// Observability: metrics recorded per pipeline stage

pub mod metrics;

pub use self::metrics::{init, render};
