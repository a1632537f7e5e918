//! End-to-end bookkeeping tests
//!
//! A real directory tree, the walkdir walker and an in-memory SQLite ledger,
//! with a scripted transfer service standing in for Globus.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use filetime::{set_file_mtime, FileTime};
use tokio_util::sync::CancellationToken;

use pushglob_cache::{DatabasePool, SqliteLedgerStore};
use pushglob_core::domain::{
    EndpointName, FileSyncStatus, JobId, JobStatus, PlanCounts, RelativePath, SpaceName,
    SyncRecord, TaskId, TrackedFile, TransferJob,
};
use pushglob_core::ports::{
    EndpointListing, FileObservation, ILedgerStore, ITransferService, NewDispatch, OpenJob,
    TaskInfo, TaskReceipt, TransferRequest, TransferServiceError, UpsertSummary,
};
use pushglob_sync::dispatcher::{DispatchOutcome, Endpoint, JobDispatcher, TransferRoute};
use pushglob_sync::planner::SyncPlanner;
use pushglob_sync::reconciler::{ReconcileOutcome, Reconciler};
use pushglob_sync::scheduler::ReconcileScheduler;
use pushglob_sync::walker::WalkdirWalker;
use pushglob_sync::{RetryPolicy, SyncError};

// ============================================================================
// Scripted transfer service
// ============================================================================

#[derive(Default)]
struct ScriptedTransfer {
    next_task: AtomicU32,
    reject_requests: Mutex<Option<TransferServiceError>>,
    statuses: Mutex<HashMap<String, Result<JobStatus, TransferServiceError>>>,
    requests: Mutex<Vec<TransferRequest>>,
}

impl ScriptedTransfer {
    fn set_status(&self, task: &TaskId, status: JobStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(task.to_string(), Ok(status));
    }

    fn set_lookup_error(&self, task: &TaskId) {
        self.statuses.lock().unwrap().insert(
            task.to_string(),
            Err(TransferServiceError::LookupFailed {
                task_id: task.to_string(),
                reason: "service unavailable".into(),
            }),
        );
    }

    fn reject_next(&self, err: TransferServiceError) {
        *self.reject_requests.lock().unwrap() = Some(err);
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ITransferService for ScriptedTransfer {
    async fn request_batch_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TaskReceipt, TransferServiceError> {
        if let Some(err) = self.reject_requests.lock().unwrap().take() {
            return Err(err);
        }
        self.requests.lock().unwrap().push(request.clone());
        let n = self.next_task.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TaskReceipt {
            task_id: TaskId::new(format!("task-{n}")).unwrap(),
        })
    }

    async fn poll_task(&self, task_id: &TaskId) -> Result<TaskInfo, TransferServiceError> {
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(task_id.as_str())
            .cloned()
            .unwrap_or(Ok(JobStatus::Active))?;
        Ok(TaskInfo {
            task_id: task_id.clone(),
            status,
            files: None,
            files_transferred: None,
        })
    }

    async fn list_endpoint_root(
        &self,
        _endpoint_id: &str,
    ) -> Result<EndpointListing, TransferServiceError> {
        Ok(EndpointListing { file_count: 0 })
    }
}

// ============================================================================
// Ledger whose dispatch writes always fail
// ============================================================================

struct BrokenDispatchStore {
    inner: SqliteLedgerStore,
    fail_registration: bool,
    dispatch_attempts: AtomicU32,
}

#[async_trait::async_trait]
impl ILedgerStore for BrokenDispatchStore {
    async fn upsert_files(
        &self,
        space: &SpaceName,
        observations: &[FileObservation],
    ) -> anyhow::Result<UpsertSummary> {
        self.inner.upsert_files(space, observations).await
    }

    async fn file_statuses(
        &self,
        space: &SpaceName,
        endpoint: &EndpointName,
    ) -> anyhow::Result<Vec<FileSyncStatus>> {
        self.inner.file_statuses(space, endpoint).await
    }

    async fn record_dispatch(&self, _dispatch: &NewDispatch) -> anyhow::Result<JobId> {
        self.dispatch_attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("database is locked")
    }

    async fn register_job(&self, dispatch: &NewDispatch) -> anyhow::Result<JobId> {
        if self.fail_registration {
            anyhow::bail!("disk I/O error")
        }
        self.inner.register_job(dispatch).await
    }

    async fn attach_registered_batches(&self) -> anyhow::Result<usize> {
        self.inner.attach_registered_batches().await
    }

    async fn open_jobs(&self) -> anyhow::Result<Vec<OpenJob>> {
        self.inner.open_jobs().await
    }

    async fn apply_job_status(&self, job_id: JobId, status: &JobStatus) -> anyhow::Result<usize> {
        self.inner.apply_job_status(job_id, status).await
    }

    async fn list_files(&self, space: &SpaceName) -> anyhow::Result<Vec<TrackedFile>> {
        self.inner.list_files(space).await
    }

    async fn list_sync_records(
        &self,
        endpoint: Option<&EndpointName>,
    ) -> anyhow::Result<Vec<SyncRecord>> {
        self.inner.list_sync_records(endpoint).await
    }

    async fn list_jobs(&self) -> anyhow::Result<Vec<TransferJob>> {
        self.inner.list_jobs().await
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
    store: Arc<dyn ILedgerStore>,
    transfer: Arc<ScriptedTransfer>,
    planner: SyncPlanner,
    dispatcher: JobDispatcher,
    reconciler: Reconciler,
}

fn space() -> SpaceName {
    SpaceName::new("docs").unwrap()
}

fn endpoint() -> EndpointName {
    EndpointName::new("E").unwrap()
}

fn route() -> TransferRoute {
    TransferRoute {
        source: Endpoint {
            name: EndpointName::new("laptop").unwrap(),
            id: "laptop-id".into(),
        },
        destination: Endpoint {
            name: endpoint(),
            id: "e-id".into(),
        },
        source_root: "/~/docs".into(),
        destination_root: "/project/docs".into(),
    }
}

fn touch(root: &Path, rel: &str, mtime: i64) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, rel).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

async fn sqlite_store() -> SqliteLedgerStore {
    let pool = DatabasePool::in_memory().await.unwrap();
    SqliteLedgerStore::new(pool.pool().clone())
}

fn harness_with_store(dir: tempfile::TempDir, store: Arc<dyn ILedgerStore>) -> Harness {
    let root = dir.path().to_path_buf();
    let transfer = Arc::new(ScriptedTransfer::default());
    let mut roots = BTreeMap::new();
    roots.insert(space(), root.clone());

    Harness {
        planner: SyncPlanner::new(store.clone(), Arc::new(WalkdirWalker::new()), roots),
        dispatcher: JobDispatcher::new(store.clone(), transfer.clone()).with_retry_policy(
            RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
        ),
        reconciler: Reconciler::new(store.clone(), transfer.clone()),
        _dir: dir,
        root,
        store,
        transfer,
    }
}

async fn harness() -> Harness {
    let store: Arc<dyn ILedgerStore> = Arc::new(sqlite_store().await);
    harness_with_store(tempfile::tempdir().unwrap(), store)
}

impl Harness {
    async fn counts(&self) -> PlanCounts {
        self.plan().await.counts
    }

    async fn plan(&self) -> pushglob_core::domain::Plan {
        self.planner
            .plan(&space(), &RelativePath::root(), &endpoint())
            .await
            .unwrap()
    }

    async fn dispatch(&self) -> DispatchOutcome {
        let plan = self.plan().await;
        self.dispatcher.dispatch(&plan, &route()).await.unwrap()
    }
}

fn counts(ok: usize, pending: usize, stale: usize) -> PlanCounts {
    PlanCounts { ok, pending, stale }
}

fn dispatched(outcome: DispatchOutcome) -> pushglob_sync::dispatcher::DispatchedJob {
    match outcome {
        DispatchOutcome::Dispatched(job) => job,
        DispatchOutcome::NothingToDo => panic!("expected a dispatch"),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn full_lifecycle_single_file() {
    let h = harness().await;
    touch(&h.root, "a.txt", 100);

    assert_eq!(h.counts().await, counts(0, 0, 1));

    let job = dispatched(h.dispatch().await);
    assert_eq!(job.file_count, 1);
    let records = h.store.list_sync_records(Some(&endpoint())).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, 100.0);
    assert!(!records[0].confirmed);

    assert_eq!(h.counts().await, counts(0, 1, 0));

    h.transfer.set_status(&job.task_id, JobStatus::Succeeded);
    let report = h.reconciler.reconcile_all().await.unwrap();
    assert_eq!(report.confirmed(), 1);
    assert_eq!(h.counts().await, counts(1, 0, 0));

    touch(&h.root, "a.txt", 200);
    assert_eq!(h.counts().await, counts(0, 0, 1));
}

#[tokio::test]
async fn batch_lists_every_stale_file_once() {
    let h = harness().await;
    touch(&h.root, "a.txt", 1);
    touch(&h.root, "sub/b.txt", 1);

    dispatched(h.dispatch().await);

    let requests = h.transfer.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_endpoint_id, "laptop-id");
    assert_eq!(requests[0].destination_endpoint_id, "e-id");
    assert_eq!(
        requests[0].batch_input(),
        "/~/docs/a.txt /project/docs/a.txt\n/~/docs/sub/b.txt /project/docs/sub/b.txt\n"
    );
}

#[tokio::test]
async fn nothing_to_do_makes_no_request() {
    let h = harness().await;
    touch(&h.root, "a.txt", 1);
    let job = dispatched(h.dispatch().await);
    h.transfer.set_status(&job.task_id, JobStatus::Succeeded);
    h.reconciler.reconcile_all().await.unwrap();

    assert_eq!(h.dispatch().await, DispatchOutcome::NothingToDo);
    assert_eq!(h.transfer.request_count(), 1);
}

#[tokio::test]
async fn pending_file_is_not_dispatched_again() {
    let h = harness().await;
    touch(&h.root, "a.txt", 100);
    dispatched(h.dispatch().await);

    touch(&h.root, "a.txt", 150);
    assert_eq!(h.counts().await, counts(0, 1, 0));
    assert_eq!(h.dispatch().await, DispatchOutcome::NothingToDo);
}

#[tokio::test]
async fn failed_job_reverts_files_to_stale() {
    let h = harness().await;
    touch(&h.root, "a.txt", 100);
    touch(&h.root, "b.txt", 100);
    let job = dispatched(h.dispatch().await);

    h.transfer.set_status(&job.task_id, JobStatus::Failed);
    let report = h.reconciler.reconcile_all().await.unwrap();
    assert_eq!(report.discarded(), 1);
    assert!(matches!(
        report.jobs[0].outcome,
        ReconcileOutcome::Discarded { records: 2 }
    ));

    assert_eq!(h.counts().await, counts(0, 0, 2));
    assert!(h.store.list_sync_records(None).await.unwrap().is_empty());
    let jobs = h.store.list_jobs().await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn non_terminal_status_keeps_job_open() {
    let h = harness().await;
    touch(&h.root, "a.txt", 100);
    let job = dispatched(h.dispatch().await);

    h.transfer.set_status(&job.task_id, JobStatus::Active);
    let report = h.reconciler.reconcile_all().await.unwrap();
    assert_eq!(report.still_open(), 1);

    assert_eq!(h.counts().await, counts(0, 1, 0));
    assert_eq!(h.store.list_jobs().await.unwrap()[0].status, JobStatus::Active);
    assert_eq!(h.store.open_jobs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn lookup_failure_does_not_block_other_jobs() {
    let h = harness().await;
    touch(&h.root, "a.txt", 1);
    let first = dispatched(h.dispatch().await);
    touch(&h.root, "b.txt", 1);
    let second = dispatched(h.dispatch().await);

    h.transfer.set_lookup_error(&first.task_id);
    h.transfer.set_status(&second.task_id, JobStatus::Succeeded);

    let report = h.reconciler.reconcile_all().await.unwrap();
    assert_eq!(report.jobs.len(), 2);
    assert_eq!(report.confirmed(), 1);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task_id, first.task_id);
    assert!(matches!(
        failures[0].outcome,
        ReconcileOutcome::Failed {
            error: SyncError::TaskLookupFailed { .. }
        }
    ));

    // a.txt still pending under the first job, b.txt confirmed
    assert_eq!(h.counts().await, counts(1, 1, 0));
}

#[tokio::test]
async fn rejected_request_records_nothing() {
    let h = harness().await;
    touch(&h.root, "a.txt", 1);
    let plan = h.plan().await;

    h.transfer.reject_next(TransferServiceError::RequestFailed {
        exit_code: Some(1),
        stderr: "No such endpoint".into(),
    });
    let err = h.dispatcher.dispatch(&plan, &route()).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::TransferRequestFailed { exit_code: Some(1), .. }
    ));

    assert!(h.store.list_jobs().await.unwrap().is_empty());
    assert!(h.store.list_sync_records(None).await.unwrap().is_empty());
    assert_eq!(h.counts().await, counts(0, 0, 1));
}

#[tokio::test]
async fn route_for_other_endpoint_is_rejected() {
    let h = harness().await;
    touch(&h.root, "a.txt", 1);
    let plan = h.plan().await;
    let mut wrong = route();
    wrong.destination.name = EndpointName::new("F").unwrap();

    let err = h.dispatcher.dispatch(&plan, &wrong).await.unwrap_err();
    assert!(matches!(err, SyncError::ConfigInvalid(_)));
    assert_eq!(h.transfer.request_count(), 0);
}

#[tokio::test]
async fn ledger_failure_after_request_registers_job() {
    let store = Arc::new(BrokenDispatchStore {
        inner: sqlite_store().await,
        fail_registration: false,
        dispatch_attempts: AtomicU32::new(0),
    });
    let h = harness_with_store(tempfile::tempdir().unwrap(), store.clone());
    touch(&h.root, "a.txt", 1);
    let plan = h.plan().await;

    let err = h.dispatcher.dispatch(&plan, &route()).await.unwrap_err();
    match err {
        SyncError::LedgerWriteFailed(msg) => assert!(msg.contains("task-1"), "{msg}"),
        other => panic!("expected LedgerWriteFailed, got {other:?}"),
    }
    // one attempt plus two retries
    assert_eq!(store.dispatch_attempts.load(Ordering::SeqCst), 3);

    let jobs = h.store.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].task_id.as_str(), "task-1");
    assert!(h.store.list_sync_records(None).await.unwrap().is_empty());

    // The registered job is polled and its outcome reaches the file
    h.transfer
        .set_status(&TaskId::new("task-1").unwrap(), JobStatus::Succeeded);
    let report = h.reconciler.reconcile_all().await.unwrap();
    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.jobs[0].task_id.as_str(), "task-1");
    assert!(matches!(
        report.jobs[0].outcome,
        ReconcileOutcome::Confirmed { records: 1 }
    ));
    assert_eq!(h.store.list_jobs().await.unwrap()[0].status, JobStatus::Succeeded);
    assert_eq!(h.counts().await, counts(1, 0, 0));
}

#[tokio::test]
async fn registered_job_files_are_not_requested_again() {
    let store = Arc::new(BrokenDispatchStore {
        inner: sqlite_store().await,
        fail_registration: false,
        dispatch_attempts: AtomicU32::new(0),
    });
    let h = harness_with_store(tempfile::tempdir().unwrap(), store);
    touch(&h.root, "a.txt", 1);
    touch(&h.root, "b.txt", 1);
    let plan = h.plan().await;
    h.dispatcher.dispatch(&plan, &route()).await.unwrap_err();

    assert_eq!(h.counts().await, counts(0, 2, 0));
    assert_eq!(h.dispatch().await, DispatchOutcome::NothingToDo);
    assert_eq!(h.transfer.request_count(), 1);
}

#[tokio::test]
async fn ledger_failure_without_registration_still_names_task() {
    let store = Arc::new(BrokenDispatchStore {
        inner: sqlite_store().await,
        fail_registration: true,
        dispatch_attempts: AtomicU32::new(0),
    });
    let h = harness_with_store(tempfile::tempdir().unwrap(), store);
    touch(&h.root, "a.txt", 1);
    let plan = h.plan().await;

    let err = h.dispatcher.dispatch(&plan, &route()).await.unwrap_err();
    assert!(matches!(err, SyncError::LedgerWriteFailed(ref msg) if msg.contains("task-1")));
    assert!(h.store.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn scheduler_runs_until_cancelled() {
    let h = harness().await;
    touch(&h.root, "a.txt", 1);
    let job = dispatched(h.dispatch().await);
    h.transfer.set_status(&job.task_id, JobStatus::Succeeded);

    let scheduler = ReconcileScheduler::new(Arc::new(h.reconciler), Duration::from_millis(5));
    let shutdown = CancellationToken::new();
    let mut confirmed = 0;
    let passes = scheduler
        .run(shutdown.clone(), |report| {
            confirmed += report.confirmed();
            shutdown.cancel();
        })
        .await;

    assert_eq!(passes, 1);
    assert_eq!(confirmed, 1);
    assert!(h.store.open_jobs().await.unwrap().is_empty());
}
