//! Authentication for the Anthropic API
//!
//! The key is read from an environment variable named in `[brain]
//! api_key_env` (`ANTHROPIC_API_KEY` unless configured otherwise). A `.env`
//! file is loaded by the CLI before this runs.

use pythia_core::{PythiaError, Result};
use std::env;

/// Read the API key from `env_var`.
///
/// A missing or blank value is an `Auth` error, which is fatal at startup.
pub fn get_api_key(env_var: &str) -> Result<String> {
    match env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => {
            tracing::debug!("Using API key from {}", env_var);
            Ok(key.trim().to_string())
        }
        _ => Err(PythiaError::Auth(format!(
            "No API key found. Set {}=sk-ant-... in the environment or a .env file",
            env_var
        ))),
    }
}
