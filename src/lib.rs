// src/lib.rs — Library root for selfevolve

pub mod cli;
pub mod core;
pub mod dataset;
pub mod evaluator;
pub mod infra;
pub mod provider;
pub mod retrieval;
pub mod util;
