//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Store-assigned integer ids
// ============================================================================

/// Identifier of a tracked file row, assigned by the ledger store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i64);

impl FileId {
    /// Wrap a raw store id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw store id
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local identifier of a transfer job, assigned by the ledger store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    /// Wrap a raw store id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw store id
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TaskId - opaque handle issued by the transfer service
// ============================================================================

/// Opaque task handle returned by the external transfer service
///
/// The content is never interpreted; it only has to be non-blank so it can
/// be polled later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Create a new TaskId, rejecting blank handles
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidTaskId(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the handle as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaskId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

// ============================================================================
// Names - spaces and endpoints
// ============================================================================

/// Validates a configured name: non-empty, no surrounding whitespace, no
/// path separators.
fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() || name.trim() != name || name.contains('/') {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Name of a tracked space (a root directory tree)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpaceName(String);

impl SpaceName {
    /// Create a new SpaceName with validation
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SpaceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SpaceName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SpaceName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpaceName> for String {
    fn from(name: SpaceName) -> Self {
        name.0
    }
}

/// Local name of a remote endpoint (mapped to an opaque external id by config)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointName(String);

impl EndpointName {
    /// Create a new EndpointName with validation
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EndpointName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EndpointName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EndpointName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndpointName> for String {
    fn from(name: EndpointName) -> Self {
        name.0
    }
}

// ============================================================================
// RelativePath - a file location inside a space
// ============================================================================

/// A normalized path relative to a space root
///
/// Leading separators, empty components and `.` components are dropped, so
/// the same file compares equal no matter which endpoint root it is later
/// joined onto. `..` components are rejected.
/// The empty path denotes the space root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Create a new RelativePath, normalizing separators
    pub fn new(path: impl AsRef<str>) -> Result<Self, DomainError> {
        let raw = path.as_ref();
        let mut parts = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => continue,
                ".." => return Err(DomainError::InvalidPath(raw.to_string())),
                other => parts.push(other),
            }
        }
        Ok(Self(parts.join("/")))
    }

    /// Build a RelativePath from a filesystem path relative to some root
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let raw = path
            .to_str()
            .ok_or_else(|| DomainError::InvalidPath(path.display().to_string()))?;
        Self::new(raw)
    }

    /// The space root
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Returns true if this is the space root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this path equals `prefix` or lies underneath it
    ///
    /// Every path lies under the root. Matching is component-wise, so
    /// `data2/x` is not under `data`.
    #[must_use]
    pub fn starts_with(&self, prefix: &RelativePath) -> bool {
        if prefix.is_root() || self.0 == prefix.0 {
            return true;
        }
        self.0
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Append `child` below this path
    #[must_use]
    pub fn join(&self, child: &RelativePath) -> RelativePath {
        match (self.is_root(), child.is_root()) {
            (true, _) => child.clone(),
            (false, true) => self.clone(),
            (false, false) => Self(format!("{}/{}", self.0, child.0)),
        }
    }

    /// Join this path onto an absolute root directory
    #[must_use]
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.0.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }

    /// Join this path onto a remote root string with a single `/`
    ///
    /// Remote roots are endpoint-side paths and are never touched on the
    /// local filesystem, so this works on strings only.
    #[must_use]
    pub fn join_remote(&self, root: &str) -> String {
        let root = root.trim_end_matches('/');
        if self.is_root() {
            format!("{root}/")
        } else {
            format!("{root}/{}", self.0)
        }
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl FromStr for RelativePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}
