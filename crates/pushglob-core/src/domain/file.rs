//! TrackedFile domain entity
//!
//! A tracked file is one row of the File Inventory: the last observed local
//! modification time of a path inside a space. Rows are upserted on every
//! rescan and never deleted by the bookkeeping core.

use serde::{Deserialize, Serialize};

use super::newtypes::{FileId, RelativePath, SpaceName};

/// A file observed under a space's local root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Store-assigned identifier
    pub id: FileId,
    /// Space the file belongs to
    pub space: SpaceName,
    /// Path relative to the space's local root
    pub path: RelativePath,
    /// Last observed modification time, seconds since the Unix epoch
    pub mtime: f64,
}

impl TrackedFile {
    /// Returns true if the file lies under `subtree` (the root matches everything)
    pub fn is_within(&self, subtree: &RelativePath) -> bool {
        self.path.starts_with(subtree)
    }
}
