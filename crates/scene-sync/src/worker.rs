//! Supervised background replication.
//!
//! Jobs enter a bounded queue and run with bounded parallelism on tasks
//! detached from the submitting request. Each job's state is published on
//! its own watch channel:
//!
//! ```text
//! Queued -> Running -> Completed(outcome) | Failed(reason)
//!    \__________\_____> Cancelled            (shutdown)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use scene_types::{BranchId, JobId, SceneId};

use crate::config::ReplicationConfig;
use crate::error::{SyncError, SyncResult};
use crate::replicator::{ElementReplicator, PurgeReport, ReplicationReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Copy the live elements of `source` into `target`.
    Replicate {
        scene_id: SceneId,
        source: BranchId,
        target: BranchId,
    },
    /// Soft-delete the elements of a deleted branch.
    Purge { branch_id: BranchId },
}

impl JobKind {
    /// The branch whose elements the job writes.
    pub fn branch_id(&self) -> BranchId {
        match self {
            Self::Replicate { target, .. } => *target,
            Self::Purge { branch_id } => *branch_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutcome {
    Replicated(ReplicationReport),
    Purged(PurgeReport),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed(JobOutcome),
    Failed(String),
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub job: JobKind,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct QueuedJob {
    id: JobId,
    kind: JobKind,
}

/// Jobs the worker has accepted, keyed by id. Finished jobs are dropped
/// once older than `retention` or beyond `max_finished`.
struct JobRegistry {
    jobs: RwLock<HashMap<JobId, watch::Sender<JobStatus>>>,
    retention: Duration,
    max_finished: usize,
}

impl JobRegistry {
    fn new(config: &ReplicationConfig) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention: config.job_retention(),
            max_finished: config.max_retained_jobs,
        }
    }

    fn insert(&self, id: JobId, kind: JobKind) -> SyncResult<()> {
        let now = Utc::now();
        let (tx, _) = watch::channel(JobStatus {
            id,
            job: kind,
            state: JobState::Queued,
            submitted_at: now,
            updated_at: now,
        });
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| SyncError::Unavailable("job registry lock poisoned".into()))?;
        let evicted = self.evict_finished(&mut jobs, now);
        if evicted > 0 {
            debug!(evicted, "finished jobs evicted");
        }
        jobs.insert(id, tx);
        Ok(())
    }

    /// Drop expired finished jobs, then the oldest finished ones until at
    /// most `max_finished` remain. Returns how many were dropped.
    fn evict_finished(
        &self,
        jobs: &mut HashMap<JobId, watch::Sender<JobStatus>>,
        now: DateTime<Utc>,
    ) -> usize {
        let before = jobs.len();
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention));
        if let Some(cutoff) = cutoff {
            jobs.retain(|_, tx| {
                let status = tx.borrow();
                !status.state.is_terminal() || status.updated_at > cutoff
            });
        }

        let mut finished: Vec<(DateTime<Utc>, JobId)> = jobs
            .values()
            .map(|tx| tx.borrow().clone())
            .filter(|s| s.state.is_terminal())
            .map(|s| (s.updated_at, s.id))
            .collect();
        if finished.len() > self.max_finished {
            finished.sort();
            let excess = finished.len() - self.max_finished;
            for (_, id) in finished.into_iter().take(excess) {
                jobs.remove(&id);
            }
        }
        before - jobs.len()
    }

    fn remove(&self, id: JobId) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.remove(&id);
        }
    }

    /// Move a job to `state` unless it already finished.
    fn transition(&self, id: JobId, state: JobState) {
        let Ok(jobs) = self.jobs.read() else {
            warn!(job_id = %id, "job registry lock poisoned");
            return;
        };
        if let Some(tx) = jobs.get(&id) {
            tx.send_if_modified(|status| {
                if status.state.is_terminal() {
                    return false;
                }
                status.state = state;
                status.updated_at = Utc::now();
                true
            });
        }
    }

    fn get(&self, id: JobId) -> SyncResult<JobStatus> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| SyncError::Unavailable("job registry lock poisoned".into()))?;
        jobs.get(&id)
            .map(|tx| tx.borrow().clone())
            .ok_or(SyncError::JobNotFound(id))
    }

    fn subscribe(&self, id: JobId) -> SyncResult<watch::Receiver<JobStatus>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| SyncError::Unavailable("job registry lock poisoned".into()))?;
        jobs.get(&id)
            .map(watch::Sender::subscribe)
            .ok_or(SyncError::JobNotFound(id))
    }

    fn for_branches(&self, branches: &[BranchId]) -> SyncResult<Vec<JobStatus>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| SyncError::Unavailable("job registry lock poisoned".into()))?;
        let mut found: Vec<JobStatus> = jobs
            .values()
            .map(|tx| tx.borrow().clone())
            .filter(|s| branches.contains(&s.job.branch_id()))
            .collect();
        found.sort_by_key(|s| s.submitted_at);
        Ok(found)
    }

    /// Mark every unfinished job cancelled. Returns how many were.
    fn cancel_unfinished(&self) -> usize {
        let Ok(jobs) = self.jobs.read() else {
            return 0;
        };
        let mut cancelled = 0;
        for tx in jobs.values() {
            let changed = tx.send_if_modified(|status| {
                if status.state.is_terminal() {
                    return false;
                }
                status.state = JobState::Cancelled;
                status.updated_at = Utc::now();
                true
            });
            if changed {
                cancelled += 1;
            }
        }
        cancelled
    }
}

/// Background executor for replication and purge jobs.
pub struct ReplicationWorker {
    sender: mpsc::Sender<QueuedJob>,
    registry: Arc<JobRegistry>,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl ReplicationWorker {
    /// Start the dispatcher on the current runtime.
    pub fn start(replicator: Arc<ElementReplicator>) -> Self {
        let config: ReplicationConfig = replicator.config().clone();
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = Arc::new(JobRegistry::new(&config));

        let dispatcher = tokio::spawn(dispatch(
            receiver,
            replicator,
            registry.clone(),
            shutdown_rx,
            config.clone(),
        ));
        info!(
            queue_capacity = config.queue_capacity,
            max_concurrent_jobs = config.max_concurrent_jobs,
            "replication worker started"
        );

        Self {
            sender,
            registry,
            shutdown_tx,
            dispatcher: Mutex::new(Some(dispatcher)),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Queue a job. Fails with [`SyncError::QueueFull`] or
    /// [`SyncError::WorkerStopped`] without blocking.
    pub fn submit(&self, kind: JobKind) -> SyncResult<JobId> {
        if *self.shutdown_tx.borrow() {
            return Err(SyncError::WorkerStopped);
        }
        let id = JobId::new();
        self.registry.insert(id, kind)?;
        match self.sender.try_send(QueuedJob { id, kind }) {
            Ok(()) => {
                debug!(job_id = %id, ?kind, "job queued");
                Ok(id)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.registry.remove(id);
                Err(SyncError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.registry.remove(id);
                Err(SyncError::WorkerStopped)
            }
        }
    }

    pub fn status(&self, id: JobId) -> SyncResult<JobStatus> {
        self.registry.get(id)
    }

    /// Wait until the job finishes or `timeout` elapses, then return its
    /// latest status.
    pub async fn wait(&self, id: JobId, timeout: Duration) -> SyncResult<JobStatus> {
        let mut rx = self.registry.subscribe(id)?;
        let waited = tokio::time::timeout(timeout, rx.wait_for(|s| s.state.is_terminal())).await;
        match waited {
            Ok(Ok(status)) => Ok(status.clone()),
            Ok(Err(_)) | Err(_) => self.registry.get(id),
        }
    }

    /// Jobs that wrote to any of `branches`, oldest first.
    pub fn jobs_for_branches(&self, branches: &[BranchId]) -> SyncResult<Vec<JobStatus>> {
        self.registry.for_branches(branches)
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }

    /// Stop accepting jobs, give running jobs up to the shutdown timeout,
    /// then cancel whatever is left.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!("replication worker shutting down");

        let handle = match self.dispatcher.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            // The dispatcher enforces the drain deadline itself; this bound
            // only guards against it hanging.
            let bound = self.shutdown_timeout + Duration::from_secs(1);
            match tokio::time::timeout(bound, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "replication dispatcher panicked during shutdown"),
                Err(_) => warn!("replication dispatcher did not stop in time"),
            }
        }

        let cancelled = self.registry.cancel_unfinished();
        info!(cancelled, "replication worker stopped");
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<QueuedJob>,
    replicator: Arc<ElementReplicator>,
    registry: Arc<JobRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
    config: ReplicationConfig,
) {
    let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
    let mut running = JoinSet::new();

    loop {
        let permit = tokio::select! {
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown_rx.changed() => break,
        };
        let job = tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = shutdown_rx.changed() => break,
        };

        let replicator = replicator.clone();
        let registry = registry.clone();
        running.spawn(async move {
            run_job(&replicator, &registry, job).await;
            drop(permit);
        });

        // Reap finished tasks so the set does not grow unbounded.
        while let Some(joined) = running.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "replication task panicked");
            }
        }
    }

    receiver.close();
    while let Ok(job) = receiver.try_recv() {
        registry.transition(job.id, JobState::Cancelled);
    }

    let drain = async {
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "replication task panicked during shutdown");
            }
        }
    };
    if tokio::time::timeout(config.shutdown_timeout(), drain).await.is_err() {
        warn!(
            still_running = running.len(),
            "replication jobs did not finish before the shutdown deadline"
        );
        running.abort_all();
    }
    registry.cancel_unfinished();
}

async fn run_job(replicator: &ElementReplicator, registry: &JobRegistry, job: QueuedJob) {
    registry.transition(job.id, JobState::Running);
    let result = match job.kind {
        JobKind::Replicate {
            scene_id,
            source,
            target,
        } => replicator
            .copy_elements_to_branch(scene_id, source, target)
            .await
            .map(JobOutcome::Replicated),
        JobKind::Purge { branch_id } => replicator
            .delete_branch_elements(branch_id)
            .await
            .map(JobOutcome::Purged),
    };
    let state = match result {
        Ok(outcome) => JobState::Completed(outcome),
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "replication job failed");
            JobState::Failed(e.to_string())
        }
    };
    registry.transition(job.id, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ElementService, ListQuery, LocalElementService, UnavailableElementService};
    use scene_store::{ElementStore, InMemoryElementStore, InMemorySceneDirectory};
    use scene_types::{Element, ElementType};

    struct Fixture {
        store: Arc<InMemoryElementStore>,
        service: Arc<LocalElementService>,
        scene: SceneId,
        main: BranchId,
    }

    async fn fixture(walls: usize) -> Fixture {
        let store = Arc::new(InMemoryElementStore::new());
        let service = Arc::new(LocalElementService::new(
            store.clone(),
            Arc::new(InMemorySceneDirectory::new()),
            Duration::from_secs(1),
        ));
        let scene = SceneId::new();
        let main = BranchId::new();
        for i in 0..walls {
            store
                .create(Element::new(scene, main, ElementType::Wall, format!("w{i}")))
                .await
                .unwrap();
        }
        Fixture {
            store,
            service,
            scene,
            main,
        }
    }

    fn worker(service: Arc<dyn ElementService>, config: ReplicationConfig) -> ReplicationWorker {
        ReplicationWorker::start(Arc::new(ElementReplicator::new(service, config)))
    }

    #[tokio::test]
    async fn replication_job_completes_with_report() {
        let f = fixture(3).await;
        let w = worker(f.service.clone(), ReplicationConfig::for_testing());
        let variant = BranchId::new();
        let id = w
            .submit(JobKind::Replicate {
                scene_id: f.scene,
                source: f.main,
                target: variant,
            })
            .unwrap();

        let status = w.wait(id, Duration::from_secs(2)).await.unwrap();
        match status.state {
            JobState::Completed(JobOutcome::Replicated(report)) => {
                assert_eq!(report.copied, 3);
                assert!(report.is_complete());
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(f.store.count_by_branch(variant).await.unwrap(), 3);
        w.shutdown().await;
    }

    #[tokio::test]
    async fn purge_job_deletes_elements() {
        let f = fixture(2).await;
        let w = worker(f.service.clone(), ReplicationConfig::for_testing());
        let id = w.submit(JobKind::Purge { branch_id: f.main }).unwrap();
        let status = w.wait(id, Duration::from_secs(2)).await.unwrap();
        assert!(matches!(
            status.state,
            JobState::Completed(JobOutcome::Purged(PurgeReport { deleted: 2, .. }))
        ));
        let live = f.service.list_elements(f.main, &ListQuery::live(10)).await.unwrap();
        assert!(live.is_empty());
        w.shutdown().await;
    }

    #[tokio::test]
    async fn unavailable_service_fails_the_job() {
        let w = worker(
            Arc::new(UnavailableElementService::default()),
            ReplicationConfig::for_testing(),
        );
        let id = w
            .submit(JobKind::Replicate {
                scene_id: SceneId::new(),
                source: BranchId::new(),
                target: BranchId::new(),
            })
            .unwrap();
        let status = w.wait(id, Duration::from_secs(2)).await.unwrap();
        assert!(matches!(status.state, JobState::Failed(ref reason) if reason.contains("unavailable")));
        w.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let f = fixture(0).await;
        let w = worker(f.service.clone(), ReplicationConfig::for_testing());
        w.shutdown().await;
        assert!(!w.is_running());
        let err = w.submit(JobKind::Purge { branch_id: f.main }).unwrap_err();
        assert!(matches!(err, SyncError::WorkerStopped));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let f = fixture(0).await;
        let w = worker(f.service.clone(), ReplicationConfig::for_testing());
        assert!(matches!(w.status(JobId::new()), Err(SyncError::JobNotFound(_))));
        w.shutdown().await;
    }

    #[tokio::test]
    async fn jobs_are_listed_by_branch() {
        let f = fixture(1).await;
        let w = worker(f.service.clone(), ReplicationConfig::for_testing());
        let variant = BranchId::new();
        let id = w
            .submit(JobKind::Replicate {
                scene_id: f.scene,
                source: f.main,
                target: variant,
            })
            .unwrap();
        w.wait(id, Duration::from_secs(2)).await.unwrap();
        let jobs = w.jobs_for_branches(&[variant]).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert!(w.jobs_for_branches(&[BranchId::new()]).unwrap().is_empty());
        w.shutdown().await;
    }

    /// Blocks every list call until the test releases it.
    struct Gate {
        inner: Arc<dyn ElementService>,
        open: tokio::sync::Semaphore,
    }

    #[async_trait::async_trait]
    impl ElementService for Gate {
        async fn list_elements(
            &self,
            b: BranchId,
            q: &ListQuery,
        ) -> SyncResult<Vec<Element>> {
            let _ = self.open.acquire().await;
            self.inner.list_elements(b, q).await
        }
        async fn create_element(&self, e: crate::NewElement) -> SyncResult<Element> {
            self.inner.create_element(e).await
        }
        async fn get_element(&self, id: scene_types::ElementId) -> SyncResult<Element> {
            self.inner.get_element(id).await
        }
        async fn update_element(&self, e: Element) -> SyncResult<Element> {
            self.inner.update_element(e).await
        }
        async fn update_with_base(&self, e: Element) -> SyncResult<Element> {
            self.inner.update_with_base(e).await
        }
        async fn delete_element(&self, id: scene_types::ElementId) -> SyncResult<Element> {
            self.inner.delete_element(id).await
        }
        async fn count_elements(&self, b: BranchId) -> SyncResult<usize> {
            self.inner.count_elements(b).await
        }
        async fn get_scene(&self, s: SceneId) -> SyncResult<scene_types::Scene> {
            self.inner.get_scene(s).await
        }
    }

    #[tokio::test]
    async fn shutdown_cancels_stuck_and_queued_jobs() {
        let f = fixture(1).await;
        let gate = Arc::new(Gate {
            inner: f.service.clone(),
            open: tokio::sync::Semaphore::new(0),
        });
        let config = ReplicationConfig {
            max_concurrent_jobs: 1,
            shutdown_timeout_ms: 100,
            ..ReplicationConfig::for_testing()
        };
        let w = worker(gate, config);
        let first = w.submit(JobKind::Purge { branch_id: f.main }).unwrap();
        let second = w.submit(JobKind::Purge { branch_id: f.main }).unwrap();

        // Let the first job start and block on the gate.
        let mut running = w.registry.subscribe(first).unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            running.wait_for(|s| s.state == JobState::Running),
        )
        .await
        .unwrap()
        .unwrap();

        w.shutdown().await;
        assert_eq!(w.status(first).unwrap().state, JobState::Cancelled);
        assert_eq!(w.status(second).unwrap().state, JobState::Cancelled);
    }

    fn purge() -> JobKind {
        JobKind::Purge {
            branch_id: BranchId::new(),
        }
    }

    #[test]
    fn expired_finished_jobs_are_evicted() {
        let registry = JobRegistry::new(&ReplicationConfig {
            job_retention_ms: 0,
            ..ReplicationConfig::for_testing()
        });
        let pending = JobId::new();
        registry.insert(pending, purge()).unwrap();
        let done = JobId::new();
        registry.insert(done, purge()).unwrap();
        registry.transition(done, JobState::Failed("boom".into()));

        registry.insert(JobId::new(), purge()).unwrap();
        assert!(matches!(registry.get(done), Err(SyncError::JobNotFound(_))));
        assert_eq!(registry.get(pending).unwrap().state, JobState::Queued);
    }

    #[test]
    fn finished_jobs_are_capped_oldest_first() {
        let registry = JobRegistry::new(&ReplicationConfig {
            max_retained_jobs: 2,
            ..ReplicationConfig::for_testing()
        });
        let pending = JobId::new();
        registry.insert(pending, purge()).unwrap();
        let finished: Vec<JobId> = (0..3).map(|_| JobId::new()).collect();
        for id in &finished {
            registry.insert(*id, purge()).unwrap();
            registry.transition(*id, JobState::Failed("boom".into()));
        }

        let latest = JobId::new();
        registry.insert(latest, purge()).unwrap();
        let kept = finished.iter().filter(|id| registry.get(**id).is_ok()).count();
        assert_eq!(kept, 2);
        assert!(registry.get(finished[2]).is_ok());
        assert!(registry.get(pending).is_ok());
        assert!(registry.get(latest).is_ok());
    }

    #[tokio::test]
    async fn worker_forgets_old_jobs() {
        let f = fixture(1).await;
        let config = ReplicationConfig {
            max_retained_jobs: 1,
            ..ReplicationConfig::for_testing()
        };
        let w = worker(f.service.clone(), config);
        let first = w.submit(JobKind::Purge { branch_id: f.main }).unwrap();
        w.wait(first, Duration::from_secs(2)).await.unwrap();
        let second = w.submit(JobKind::Purge { branch_id: f.main }).unwrap();
        w.wait(second, Duration::from_secs(2)).await.unwrap();

        // The next submission evicts the oldest finished job.
        let third = w.submit(JobKind::Purge { branch_id: f.main }).unwrap();
        assert!(matches!(w.status(first), Err(SyncError::JobNotFound(_))));
        assert!(w.status(second).is_ok());
        assert!(w.status(third).is_ok());
        w.shutdown().await;
    }

    #[test]
    fn job_state_wire_format() {
        let json = serde_json::to_value(JobState::Failed("boom".into())).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["detail"], "boom");
    }
}
