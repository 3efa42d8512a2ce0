//! Shared utilities for intel-rs
//!
//! This crate provides common functionality used across the intel-rs workspace:
//! tracing setup and `.env` loading.

pub mod env;
pub mod logging;

pub use env::{load_env, load_env_from};
pub use logging::{LogFormat, init_tracing};
