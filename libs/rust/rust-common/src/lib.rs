//! Shared library for cross-cutting concerns in auth-platform Rust services.
//!
//! This crate provides centralized implementations for:
//! - Environment variable parsing with typed defaults
//! - Tracing subscriber setup (text or JSON output)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod tracing_config;

pub use env::{EnvError, parse_env, parse_env_from};
pub use tracing_config::{LogFormat, LogTarget, TracingConfig, init_tracing};
