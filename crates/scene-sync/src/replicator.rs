//! Best-effort bulk copy and purge of branch elements.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use scene_types::{BranchId, Element, ElementId, SceneId};

use crate::config::ReplicationConfig;
use crate::error::SyncResult;
use crate::service::{ElementService, ListQuery, NewElement};

/// Outcome of a bulk copy. Per-element failures are counted, never raised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationReport {
    /// Source rows considered.
    pub total: usize,
    pub copied: usize,
    pub failed: usize,
    /// The batch deadline expired before every row was attempted.
    pub timed_out: bool,
}

impl ReplicationReport {
    pub fn is_complete(&self) -> bool {
        !self.timed_out && self.copied == self.total
    }
}

/// Outcome of a bulk soft delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub total: usize,
    pub deleted: usize,
    pub failed: usize,
    pub timed_out: bool,
}

/// Where written rows come from, which decides their base fingerprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Forked from a live parent row: the base is the parent row's content.
    Fork,
    /// Replayed from a snapshot: the recorded base is kept.
    Restore,
}

pub struct ElementReplicator {
    service: Arc<dyn ElementService>,
    config: ReplicationConfig,
}

impl ElementReplicator {
    pub fn new(service: Arc<dyn ElementService>, config: ReplicationConfig) -> Self {
        Self { service, config }
    }

    pub fn service(&self) -> &Arc<dyn ElementService> {
        &self.service
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Copy every live element of `source` into `target` as new rows.
    ///
    /// Fails only if the source cannot be listed. Rows that fail to copy are
    /// logged and skipped; nothing already copied is rolled back.
    pub async fn copy_elements_to_branch(
        &self,
        scene_id: SceneId,
        source: BranchId,
        target: BranchId,
    ) -> SyncResult<ReplicationReport> {
        let rows = self.fetch(source, false).await?;
        info!(
            scene_id = %scene_id,
            source_branch = %source,
            target_branch = %target,
            elements = rows.len(),
            "replication started"
        );
        let report = self
            .write_elements(scene_id, target, &rows, Provenance::Fork)
            .await;
        info!(
            target_branch = %target,
            total = report.total,
            copied = report.copied,
            failed = report.failed,
            timed_out = report.timed_out,
            "replication finished"
        );
        Ok(report)
    }

    /// Create `rows` in `target`, parents before children.
    ///
    /// Each copy gets a new id, version 1 and fresh timestamps and keeps its
    /// lineage. Parent references point at the parent's copy; a row whose
    /// parent was not copied is created without one. The whole batch shares
    /// one deadline.
    pub async fn write_elements(
        &self,
        scene_id: SceneId,
        target: BranchId,
        rows: &[Element],
        provenance: Provenance,
    ) -> ReplicationReport {
        let deadline = Instant::now() + self.config.batch_timeout();
        let mut report = ReplicationReport {
            total: rows.len(),
            ..ReplicationReport::default()
        };
        let mut copies: HashMap<ElementId, ElementId> = HashMap::with_capacity(rows.len());

        for source in parents_first(rows) {
            let mut new = NewElement::copy_of(source, scene_id, target);
            if provenance == Provenance::Fork {
                match source.content_fingerprint() {
                    Ok(fp) => new.base_fingerprint = Some(fp),
                    Err(e) => {
                        warn!(element_id = %source.id, error = %e, "cannot fingerprint element, skipping");
                        report.failed += 1;
                        continue;
                    }
                }
            }
            if let Some(parent) = source.parent_id {
                match copies.get(&parent) {
                    Some(copy) => new.parent_id = Some(*copy),
                    None => warn!(
                        element_id = %source.id,
                        parent_id = %parent,
                        "parent was not copied, creating without parent"
                    ),
                }
            }

            match tokio::time::timeout_at(deadline, self.service.create_element(new)).await {
                Ok(Ok(created)) => {
                    copies.insert(source.id, created.id);
                    report.copied += 1;
                }
                Ok(Err(e)) => {
                    warn!(element_id = %source.id, target_branch = %target, error = %e, "failed to copy element");
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(
                        target_branch = %target,
                        copied = report.copied,
                        remaining = report.total - report.copied - report.failed,
                        "batch deadline expired"
                    );
                    report.timed_out = true;
                    break;
                }
            }
        }
        report
    }

    /// Soft-delete every live element of a branch.
    pub async fn delete_branch_elements(&self, branch_id: BranchId) -> SyncResult<PurgeReport> {
        let rows = self.fetch(branch_id, false).await?;
        let deadline = Instant::now() + self.config.batch_timeout();
        let mut report = PurgeReport {
            total: rows.len(),
            ..PurgeReport::default()
        };

        for row in &rows {
            match tokio::time::timeout_at(deadline, self.service.delete_element(row.id)).await {
                Ok(Ok(_)) => report.deleted += 1,
                Ok(Err(e)) => {
                    warn!(element_id = %row.id, branch_id = %branch_id, error = %e, "failed to delete element");
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(branch_id = %branch_id, deleted = report.deleted, "batch deadline expired");
                    report.timed_out = true;
                    break;
                }
            }
        }
        info!(
            branch_id = %branch_id,
            deleted = report.deleted,
            failed = report.failed,
            "branch elements purged"
        );
        Ok(report)
    }

    /// Both branches' rows, tombstones included.
    pub async fn get_elements_for_merge(
        &self,
        source: BranchId,
        target: BranchId,
    ) -> SyncResult<(Vec<Element>, Vec<Element>)> {
        tokio::try_join!(self.fetch(source, true), self.fetch(target, true))
    }

    async fn fetch(&self, branch_id: BranchId, include_deleted: bool) -> SyncResult<Vec<Element>> {
        let cap = self.config.max_elements_per_fetch;
        let query = ListQuery {
            limit: Some(cap),
            include_deleted,
            ..ListQuery::default()
        };
        let rows = self.service.list_elements(branch_id, &query).await?;
        if rows.len() >= cap {
            warn!(branch_id = %branch_id, cap, "fetch cap reached, listing may be truncated");
        }
        debug!(branch_id = %branch_id, rows = rows.len(), include_deleted, "fetched branch elements");
        Ok(rows)
    }
}

/// Order rows so every parent precedes its children. Rows whose parent is
/// outside the set are roots; rows caught in a parent cycle go last.
pub fn parents_first(rows: &[Element]) -> Vec<&Element> {
    let present: HashSet<ElementId> = rows.iter().map(|e| e.id).collect();
    let mut children: HashMap<ElementId, Vec<&Element>> = HashMap::new();
    let mut queue: VecDeque<&Element> = VecDeque::new();

    for row in rows {
        match row.parent_id {
            Some(parent) if parent != row.id && present.contains(&parent) => {
                children.entry(parent).or_default().push(row)
            }
            _ => queue.push_back(row),
        }
    }

    let mut ordered = Vec::with_capacity(rows.len());
    while let Some(row) = queue.pop_front() {
        ordered.push(row);
        if let Some(kids) = children.remove(&row.id) {
            queue.extend(kids);
        }
    }
    for (_, kids) in children {
        ordered.extend(kids);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::service::{LocalElementService, UnavailableElementService};
    use async_trait::async_trait;
    use scene_store::{ElementStore, InMemoryElementStore, InMemorySceneDirectory};
    use scene_types::{ElementType, Point3D, Scene};
    use std::time::Duration;

    struct Fixture {
        store: Arc<InMemoryElementStore>,
        service: Arc<LocalElementService>,
        scene: SceneId,
        main: BranchId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryElementStore::new());
        let service = Arc::new(LocalElementService::new(
            store.clone(),
            Arc::new(InMemorySceneDirectory::new()),
            Duration::from_secs(1),
        ));
        Fixture {
            store,
            service,
            scene: SceneId::new(),
            main: BranchId::new(),
        }
    }

    impl Fixture {
        fn replicator(&self) -> ElementReplicator {
            ElementReplicator::new(self.service.clone(), ReplicationConfig::for_testing())
        }

        async fn seed(&self, name: &str) -> Element {
            self.store
                .create(Element::new(self.scene, self.main, ElementType::Wall, name))
                .await
                .unwrap()
        }
    }

    /// Delegates to an inner service but refuses to create rows with a
    /// given name, or sleeps before every create.
    struct Flaky {
        inner: Arc<dyn ElementService>,
        reject: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl ElementService for Flaky {
        async fn list_elements(&self, b: BranchId, q: &ListQuery) -> SyncResult<Vec<Element>> {
            self.inner.list_elements(b, q).await
        }
        async fn create_element(&self, e: NewElement) -> SyncResult<Element> {
            tokio::time::sleep(self.delay).await;
            if e.name == self.reject {
                return Err(SyncError::Unavailable("rejected".into()));
            }
            self.inner.create_element(e).await
        }
        async fn get_element(&self, id: ElementId) -> SyncResult<Element> {
            self.inner.get_element(id).await
        }
        async fn update_element(&self, e: Element) -> SyncResult<Element> {
            self.inner.update_element(e).await
        }
        async fn update_with_base(&self, e: Element) -> SyncResult<Element> {
            self.inner.update_with_base(e).await
        }
        async fn delete_element(&self, id: ElementId) -> SyncResult<Element> {
            self.inner.delete_element(id).await
        }
        async fn count_elements(&self, b: BranchId) -> SyncResult<usize> {
            self.inner.count_elements(b).await
        }
        async fn get_scene(&self, s: SceneId) -> SyncResult<Scene> {
            self.inner.get_scene(s).await
        }
    }

    #[tokio::test]
    async fn copies_every_live_element() {
        let f = fixture();
        let a = f.seed("a").await;
        f.seed("b").await;
        let gone = f.seed("c").await;
        f.store.delete(gone.id, None).await.unwrap();

        let variant = BranchId::new();
        let report = f
            .replicator()
            .copy_elements_to_branch(f.scene, f.main, variant)
            .await
            .unwrap();
        assert_eq!(report, ReplicationReport { total: 2, copied: 2, failed: 0, timed_out: false });
        assert!(report.is_complete());

        let copies = f.service.list_elements(variant, &ListQuery::live(10)).await.unwrap();
        assert_eq!(copies.len(), 2);
        let copy_a = copies.iter().find(|e| e.name == "a").unwrap();
        assert_ne!(copy_a.id, a.id);
        assert_eq!(copy_a.version, 1);
        assert_eq!(copy_a.lineage_id, a.lineage_id);
        assert_eq!(copy_a.base_fingerprint, Some(a.content_fingerprint().unwrap()));
    }

    #[tokio::test]
    async fn parent_links_point_at_copies() {
        let f = fixture();
        let wall = f.seed("wall").await;
        let door = f
            .store
            .create(
                Element::new(f.scene, f.main, ElementType::Door, "door")
                    .with_position(Point3D::new(1.0, 0.0, 0.0))
                    .with_parent(wall.id),
            )
            .await
            .unwrap();

        let variant = BranchId::new();
        f.replicator()
            .copy_elements_to_branch(f.scene, f.main, variant)
            .await
            .unwrap();
        let copies = f.service.list_elements(variant, &ListQuery::live(10)).await.unwrap();
        let wall_copy = copies.iter().find(|e| e.lineage_id == wall.lineage_id).unwrap();
        let door_copy = copies.iter().find(|e| e.lineage_id == door.lineage_id).unwrap();
        assert_eq!(door_copy.parent_id, Some(wall_copy.id));
    }

    #[tokio::test]
    async fn child_of_failed_parent_is_created_without_parent() {
        let f = fixture();
        let wall = f.seed("wall").await;
        f.store
            .create(Element::new(f.scene, f.main, ElementType::Window, "window").with_parent(wall.id))
            .await
            .unwrap();

        let flaky = Arc::new(Flaky {
            inner: f.service.clone(),
            reject: "wall",
            delay: Duration::ZERO,
        });
        let replicator = ElementReplicator::new(flaky, ReplicationConfig::for_testing());
        let variant = BranchId::new();
        let report = replicator
            .copy_elements_to_branch(f.scene, f.main, variant)
            .await
            .unwrap();
        assert_eq!((report.copied, report.failed), (1, 1));
        assert!(!report.is_complete());

        let copies = f.service.list_elements(variant, &ListQuery::live(10)).await.unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].parent_id, None);
    }

    #[tokio::test]
    async fn batch_deadline_stops_the_copy() {
        let f = fixture();
        for i in 0..5 {
            f.seed(&format!("w{i}")).await;
        }
        let slow = Arc::new(Flaky {
            inner: f.service.clone(),
            reject: "",
            delay: Duration::from_millis(40),
        });
        let config = ReplicationConfig {
            batch_timeout_ms: 100,
            ..ReplicationConfig::for_testing()
        };
        let report = ElementReplicator::new(slow, config)
            .copy_elements_to_branch(f.scene, f.main, BranchId::new())
            .await
            .unwrap();
        assert!(report.timed_out);
        assert!(report.copied < 5);
    }

    #[tokio::test]
    async fn fetch_is_capped() {
        let f = fixture();
        for i in 0..4 {
            f.seed(&format!("w{i}")).await;
        }
        let config = ReplicationConfig {
            max_elements_per_fetch: 3,
            ..ReplicationConfig::for_testing()
        };
        let report = ElementReplicator::new(f.service.clone(), config)
            .copy_elements_to_branch(f.scene, f.main, BranchId::new())
            .await
            .unwrap();
        assert_eq!(report.total, 3);
    }

    #[tokio::test]
    async fn purge_soft_deletes_everything() {
        let f = fixture();
        f.seed("a").await;
        f.seed("b").await;
        let report = f.replicator().delete_branch_elements(f.main).await.unwrap();
        assert_eq!((report.total, report.deleted, report.failed), (2, 2, 0));
        assert_eq!(f.service.count_elements(f.main).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn merge_fetch_includes_tombstones() {
        let f = fixture();
        let a = f.seed("a").await;
        f.store.delete(a.id, None).await.unwrap();
        let (source, target) = f
            .replicator()
            .get_elements_for_merge(f.main, BranchId::new())
            .await
            .unwrap();
        assert_eq!(source.len(), 1);
        assert!(source[0].is_deleted);
        assert!(target.is_empty());
    }

    #[tokio::test]
    async fn unavailable_service_fails_the_copy() {
        let replicator = ElementReplicator::new(
            Arc::new(UnavailableElementService::default()),
            ReplicationConfig::for_testing(),
        );
        let err = replicator
            .copy_elements_to_branch(SceneId::new(), BranchId::new(), BranchId::new())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn parents_precede_children() {
        let scene = SceneId::new();
        let branch = BranchId::new();
        let room = Element::new(scene, branch, ElementType::Room, "room");
        let wall = Element::new(scene, branch, ElementType::Wall, "wall").with_parent(room.id);
        let door = Element::new(scene, branch, ElementType::Door, "door").with_parent(wall.id);
        let rows = vec![door.clone(), wall.clone(), room.clone()];
        let order: Vec<&str> = parents_first(&rows).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["room", "wall", "door"]);
    }
}
