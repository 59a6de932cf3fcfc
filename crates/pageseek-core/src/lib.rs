//! Shared vocabulary of the pageseek engine: chunk and corpus types, the
//! error taxonomy, provider traits and layered configuration.

#![deny(unused_imports)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
