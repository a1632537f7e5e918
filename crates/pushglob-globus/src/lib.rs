//! pushglob Globus - transfer service adapter
//!
//! Drives the `globus` command-line client as a subprocess and parses its
//! JSON output.
//!
//! ## Modules
//!
//! - [`cli`] - subprocess runner with stdin piping and a timeout
//! - [`response`] - typed views of the client's JSON documents
//! - [`provider`] - [`ITransferService`](pushglob_core::ports::ITransferService)
//!   implementation on top of the two

pub mod cli;
pub mod provider;
pub mod response;

pub use cli::{CommandOutput, GlobusCli};
pub use provider::GlobusTransferService;

use std::time::Duration;

use thiserror::Error;

/// Errors from running the `globus` client
#[derive(Debug, Error)]
pub enum GlobusError {
    /// The client binary could not be started
    #[error("Could not run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the client failed
    #[error("I/O error talking to the globus client: {0}")]
    Io(#[from] std::io::Error),

    /// The client did not finish in time
    #[error("globus client timed out after {0:?}")]
    Timeout(Duration),

    /// The client output was not the JSON document we expected
    #[error("Invalid globus response: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for GlobusError {
    fn from(err: serde_json::Error) -> Self {
        GlobusError::InvalidResponse(err.to_string())
    }
}
