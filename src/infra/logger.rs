// src/infra/logger.rs — Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

/// Env var consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "SELFEVOLVE_LOG";

pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
