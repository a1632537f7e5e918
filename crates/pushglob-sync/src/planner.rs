//! Sync Planner
//!
//! Rescans the requested subtree, then classifies every tracked file of the
//! space against one destination endpoint.
//!
//! Jobs registered without their sync records are attached first, so their
//! files count as pending rather than being requested a second time.
//!
//! Classification is space-wide: files outside the rescanned subtree are
//! still counted, with whatever mtime the inventory last saw for them. Use
//! [`Plan::restrict_to_subtree`] to narrow a plan for display.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use pushglob_core::config::Config;
use pushglob_core::domain::{EndpointName, Plan, RelativePath, SpaceName};
use pushglob_core::ports::{IDirectoryWalker, ILedgerStore};

use crate::inventory::FileInventory;
use crate::SyncError;

/// Builds sync plans for configured spaces
#[derive(Clone)]
pub struct SyncPlanner {
    store: Arc<dyn ILedgerStore>,
    inventory: FileInventory,
    local_roots: BTreeMap<SpaceName, PathBuf>,
}

impl SyncPlanner {
    /// Creates a planner over explicit space roots
    pub fn new(
        store: Arc<dyn ILedgerStore>,
        walker: Arc<dyn IDirectoryWalker>,
        local_roots: BTreeMap<SpaceName, PathBuf>,
    ) -> Self {
        let inventory = FileInventory::new(Arc::clone(&store), walker);
        Self {
            store,
            inventory,
            local_roots,
        }
    }

    /// Creates a planner for every space in `config` that has a local root
    pub fn from_config(
        store: Arc<dyn ILedgerStore>,
        walker: Arc<dyn IDirectoryWalker>,
        config: &Config,
    ) -> Self {
        let local_roots = config
            .spaces
            .iter()
            .filter_map(|(name, space)| {
                space
                    .local_root(&config.local_endpoint)
                    .map(|root| (name.clone(), root))
            })
            .collect();
        Self::new(store, walker, local_roots)
    }

    /// Local root directory of a space
    ///
    /// # Errors
    ///
    /// [`SyncError::ConfigInvalid`] if the space is not configured.
    pub fn local_root(&self, space: &SpaceName) -> Result<&Path, SyncError> {
        self.local_roots
            .get(space)
            .map(PathBuf::as_path)
            .ok_or_else(|| SyncError::ConfigInvalid(format!("space '{space}' is not configured")))
    }

    /// Rescans `subtree` of `space` and classifies the whole space for
    /// `destination`
    ///
    /// # Errors
    ///
    /// - [`SyncError::ConfigInvalid`] if the space is not configured
    /// - [`SyncError::ScanTargetMissing`] if the subtree does not exist
    /// - [`SyncError::LedgerWriteFailed`] if registered jobs cannot be attached
    /// - [`SyncError::LedgerReadFailed`] if the ledger cannot be queried
    #[instrument(skip(self), fields(space = %space, endpoint = %destination))]
    pub async fn plan(
        &self,
        space: &SpaceName,
        subtree: &RelativePath,
        destination: &EndpointName,
    ) -> Result<Plan, SyncError> {
        let root = self.local_root(space)?;
        self.inventory.rescan(space, root, subtree).await?;

        self.store
            .attach_registered_batches()
            .await
            .map_err(|e| SyncError::LedgerWriteFailed(format!("{e:#}")))?;

        let statuses = self
            .store
            .file_statuses(space, destination)
            .await
            .map_err(|e| SyncError::LedgerReadFailed(format!("{e:#}")))?;

        let plan = Plan::from_statuses(
            space.clone(),
            subtree.clone(),
            destination.clone(),
            statuses,
        );

        info!(
            ok = plan.counts.ok,
            pending = plan.counts.pending,
            stale = plan.counts.stale,
            "Plan built"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use filetime::{set_file_mtime, FileTime};
    use pushglob_cache::{DatabasePool, SqliteLedgerStore};
    use pushglob_core::config::SpaceConfig;
    use pushglob_core::domain::{FileClass, PlanCounts};

    use super::*;
    use crate::walker::WalkdirWalker;

    async fn planner_for(root: &Path) -> SyncPlanner {
        let pool = DatabasePool::in_memory().await.unwrap();
        let store = Arc::new(SqliteLedgerStore::new(pool.pool().clone()));
        let mut roots = BTreeMap::new();
        roots.insert(SpaceName::new("docs").unwrap(), root.to_path_buf());
        SyncPlanner::new(store, Arc::new(WalkdirWalker::new()), roots)
    }

    fn touch(path: &Path, mtime: i64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
        set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    #[tokio::test]
    async fn plan_classifies_new_files_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"), 100);
        touch(&dir.path().join("sub/b.txt"), 100);
        let planner = planner_for(dir.path()).await;

        let plan = planner
            .plan(
                &SpaceName::new("docs").unwrap(),
                &RelativePath::root(),
                &EndpointName::new("E").unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(plan.counts, PlanCounts { ok: 0, pending: 0, stale: 2 });
        assert!(plan.files.iter().all(|f| f.class == FileClass::Stale));
    }

    #[tokio::test]
    async fn plan_is_space_wide_but_can_be_restricted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"), 100);
        touch(&dir.path().join("sub/b.txt"), 100);
        let planner = planner_for(dir.path()).await;
        let space = SpaceName::new("docs").unwrap();
        let endpoint = EndpointName::new("E").unwrap();

        // Populate the whole space once, then plan only a subtree
        planner.plan(&space, &RelativePath::root(), &endpoint).await.unwrap();
        let plan = planner
            .plan(&space, &RelativePath::new("sub").unwrap(), &endpoint)
            .await
            .unwrap();

        assert_eq!(plan.counts.stale, 2);
        let narrowed = plan.restrict_to_subtree();
        assert_eq!(narrowed.counts.stale, 1);
        assert_eq!(narrowed.stale_files[0].path.as_str(), "sub/b.txt");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn plan_survives_untrackable_file_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"), 100);
        fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.txt")), "x").unwrap();
        let planner = planner_for(dir.path()).await;

        let plan = planner
            .plan(
                &SpaceName::new("docs").unwrap(),
                &RelativePath::root(),
                &EndpointName::new("E").unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(plan.counts, PlanCounts { ok: 0, pending: 0, stale: 1 });
        assert_eq!(plan.stale_files[0].path.as_str(), "a.txt");
    }

    #[tokio::test]
    async fn plan_unknown_space_is_config_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let planner = planner_for(dir.path()).await;

        let err = planner
            .plan(
                &SpaceName::new("photos").unwrap(),
                &RelativePath::root(),
                &EndpointName::new("E").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn plan_missing_subtree_is_scan_target_missing() {
        let dir = tempfile::tempdir().unwrap();
        let planner = planner_for(dir.path()).await;

        let err = planner
            .plan(
                &SpaceName::new("docs").unwrap(),
                &RelativePath::new("nope").unwrap(),
                &EndpointName::new("E").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ScanTargetMissing(_)));
    }

    #[tokio::test]
    async fn from_config_uses_local_roots() {
        let yaml = r#"
db_file: /tmp/x.sqlite
local_endpoint: laptop
globus_endpoints:
  laptop: 'l-id'
spaces:
  docs:
    _local: /srv/docs
  photos:
    laptop: /srv/photos
"#;
        let mut config = Config::from_yaml(yaml).unwrap();
        config.spaces.insert(
            SpaceName::new("remote_only").unwrap(),
            SpaceConfig::from_roots([("cluster", "/p")]),
        );
        let pool = DatabasePool::in_memory().await.unwrap();
        let store = Arc::new(SqliteLedgerStore::new(pool.pool().clone()));
        let planner = SyncPlanner::from_config(store, Arc::new(WalkdirWalker::new()), &config);

        assert_eq!(
            planner.local_root(&SpaceName::new("docs").unwrap()).unwrap(),
            Path::new("/srv/docs")
        );
        assert_eq!(
            planner.local_root(&SpaceName::new("photos").unwrap()).unwrap(),
            Path::new("/srv/photos")
        );
        assert!(planner
            .local_root(&SpaceName::new("remote_only").unwrap())
            .is_err());
    }
}
