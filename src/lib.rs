#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod clients;
pub mod codebook;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod store;
