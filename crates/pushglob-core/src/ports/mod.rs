//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the bookkeeping core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILedgerStore`] - Persistent file inventory, sync ledger and job registry
//! - [`IDirectoryWalker`] - Enumerates regular files under a local directory
//! - [`ITransferService`] - Opaque bulk-transfer service (request / poll / list)

pub mod directory_walker;
pub mod ledger_store;
pub mod transfer_service;

pub use directory_walker::{IDirectoryWalker, WalkEntry, WalkError, WalkIter};
pub use ledger_store::{FileObservation, ILedgerStore, NewDispatch, OpenJob, UpsertSummary};
pub use transfer_service::{
    EndpointListing, ITransferService, TaskInfo, TaskReceipt, TransferPair, TransferRequest,
    TransferServiceError,
};
