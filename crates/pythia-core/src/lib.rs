//! # pythia-core
//!
//! Core types for the Pythia folder agent.
//!
//! Pythia watches a single folder and treats file state as the user interface:
//!
//! - An empty file is a request to write it
//! - A trailing `UPDATE: ...` line is a request to rewrite it
//! - A trailing `ROLLBACK` line is a request to restore the last snapshot
//! - Anything else is knowledge to remember for later generations
//!
//! This crate holds the pieces every other crate shares: the error type,
//! configuration, the content hasher and the command marker grammar.

pub mod config;
mod error;
pub mod fail_open;
mod hash;
pub mod markers;
mod types;

pub use config::PythiaConfig;
pub use error::{PythiaError, Result};
pub use hash::ContentHash;
pub use types::*;
