//! Domain entities and business logic
//!
//! This module contains the core domain types for pushglob:
//! - Newtypes for type-safe identifiers and validated names/paths
//! - Tracked files (the File Inventory rows)
//! - Sync records (the Sync Ledger rows)
//! - Transfer jobs and the status state machine
//! - Sync plans and the ok / pending / stale classification
//! - Domain-specific error types

pub mod errors;
pub mod file;
pub mod newtypes;
pub mod plan;
pub mod sync_record;
pub mod transfer_job;

// Re-export commonly used types
pub use errors::DomainError;
pub use file::TrackedFile;
pub use newtypes::*;
pub use plan::{classify, ClassifiedFile, FileClass, FileSyncStatus, Plan, PlanCounts, StaleFile};
pub use sync_record::{JobLink, SyncRecord};
pub use transfer_job::{JobStatus, LedgerAction, TransferJob};
