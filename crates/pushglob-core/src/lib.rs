//! pushglob Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `TrackedFile`, `SyncRecord`, `TransferJob`, `Plan`
//! - **Classification** - the ok / pending / stale decision for a file
//! - **Port definitions** - Traits for adapters: `ILedgerStore`, `IDirectoryWalker`,
//!   `ITransferService`
//! - **Configuration** - typed, validated endpoint and space mappings
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure bookkeeping logic with no I/O.
//! Ports define trait interfaces that adapter crates implement: the SQLite
//! ledger lives in `pushglob-cache`, the Globus adapter in `pushglob-globus`,
//! and the components that drive them in `pushglob-sync`.

pub mod config;
pub mod domain;
pub mod ports;
