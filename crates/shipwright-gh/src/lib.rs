//! GitHub CLI backend for Shipwright.
//!
//! Implements [`shipwright_core::CiBackend`] by shelling out to `gh`, which
//! owns authentication and repository resolution. Every command requests
//! `--json` output so nothing here parses human-oriented text.

pub mod backend;
pub mod error;
pub mod runner;
pub mod wire;

pub use backend::GhBackend;
pub use error::GhError;
pub use runner::GhRunner;
