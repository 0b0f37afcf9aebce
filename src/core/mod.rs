// src/core/mod.rs — Generation, correction and bookkeeping engine

pub mod aggregate;
pub mod correction;
pub mod extractor;
pub mod generator;
pub mod prompts;
pub mod runner;
pub mod tokens;
pub mod types;
