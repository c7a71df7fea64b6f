//! Shared primitive types used across the entire pipeline.

use uuid::Uuid;

/// The canonical pipeline run identifier.
pub type RunId = String;

/// Mint a fresh run identifier of the form `run-<uuid>`.
pub fn new_run_id() -> RunId {
    format!("run-{}", Uuid::new_v4())
}
