//! Configuration loading and validation.
//!
//! Everything is read from the process environment once at startup. Callers
//! that want a `.env` file loaded should do so before calling
//! [`load_from_env`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{load_from_env, load_with},
    schema::{ConnectConfig, InstanceGuardSpec, PolicyConfig, Target, TetherConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
