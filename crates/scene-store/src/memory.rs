use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use scene_types::{BranchId, Element, ElementId};

use crate::error::{StoreError, StoreResult};
use crate::query::ListOptions;
use crate::traits::ElementStore;

#[derive(Default)]
struct Tables {
    elements: HashMap<ElementId, Element>,
    by_branch: HashMap<BranchId, HashSet<ElementId>>,
    by_parent: HashMap<ElementId, HashSet<ElementId>>,
}

impl Tables {
    fn index(&mut self, element: &Element) {
        self.by_branch
            .entry(element.branch_id)
            .or_default()
            .insert(element.id);
        if let Some(parent) = element.parent_id {
            self.by_parent.entry(parent).or_default().insert(element.id);
        }
    }

    fn unindex_parent(&mut self, child: ElementId, parent: Option<ElementId>) {
        if let Some(parent) = parent {
            if let Some(children) = self.by_parent.get_mut(&parent) {
                children.remove(&child);
                if children.is_empty() {
                    self.by_parent.remove(&parent);
                }
            }
        }
    }

    fn check_parent(&self, element: &Element) -> StoreResult<()> {
        let Some(parent_id) = element.parent_id else {
            return Ok(());
        };
        if parent_id == element.id {
            return Err(StoreError::Invalid(format!(
                "element {} cannot be its own parent",
                element.id
            )));
        }
        match self.elements.get(&parent_id) {
            Some(parent) if parent.branch_id == element.branch_id => Ok(()),
            Some(parent) => Err(StoreError::Invalid(format!(
                "parent {parent_id} belongs to branch {}, not {}",
                parent.branch_id, element.branch_id
            ))),
            None => Err(StoreError::Invalid(format!(
                "parent {parent_id} does not exist"
            ))),
        }
    }
}

/// In-memory, HashMap-based element store.
///
/// Intended for tests and embedding. Rows live behind a single `RwLock`
/// together with the branch and parent indexes, so every write is atomic
/// per row. Rows are cloned on read and write.
pub struct InMemoryElementStore {
    tables: RwLock<Tables>,
}

impl InMemoryElementStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Number of rows currently stored, tombstones included.
    pub fn len(&self) -> usize {
        self.read().map(|t| t.elements.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    /// Compare-and-swap write. `base_fingerprint` is only taken from the
    /// caller when `write_base` is set; otherwise the stored one is kept.
    fn swap(tables: &mut Tables, mut element: Element, write_base: bool) -> StoreResult<Element> {
        let stored = tables
            .elements
            .get(&element.id)
            .ok_or(StoreError::ElementNotFound(element.id))?;
        if stored.is_deleted {
            return Err(StoreError::Invalid(format!(
                "element {} is deleted and cannot be modified",
                element.id
            )));
        }
        if stored.version != element.version {
            return Err(StoreError::VersionConflict {
                id: element.id,
                expected: element.version,
                actual: stored.version,
            });
        }
        if stored.branch_id != element.branch_id
            || stored.scene_id != element.scene_id
            || stored.lineage_id != element.lineage_id
        {
            return Err(StoreError::Invalid(format!(
                "element {} cannot change scene, branch or lineage",
                element.id
            )));
        }
        let previous_parent = stored.parent_id;
        let created_at = stored.created_at;
        if !write_base {
            element.base_fingerprint = stored.base_fingerprint;
        }
        if element.parent_id != previous_parent {
            tables.check_parent(&element)?;
        }

        element.created_at = created_at;
        element.touch();
        if element.parent_id != previous_parent {
            tables.unindex_parent(element.id, previous_parent);
            if let Some(parent) = element.parent_id {
                tables.by_parent.entry(parent).or_default().insert(element.id);
            }
        }
        tables.elements.insert(element.id, element.clone());
        Ok(element)
    }
}

impl Default for InMemoryElementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ElementStore for InMemoryElementStore {
    async fn create(&self, mut element: Element) -> StoreResult<Element> {
        let mut tables = self.write()?;
        if tables.elements.contains_key(&element.id) {
            return Err(StoreError::AlreadyExists(element.id));
        }
        if element.version == 0 {
            return Err(StoreError::Invalid("version must start at 1".into()));
        }
        tables.check_parent(&element)?;
        let now = Utc::now();
        element.created_at = now;
        element.updated_at = now;
        tables.index(&element);
        tables.elements.insert(element.id, element.clone());
        tracing::debug!(element_id = %element.id, branch_id = %element.branch_id, "element created");
        Ok(element)
    }

    async fn find(&self, id: ElementId) -> StoreResult<Option<Element>> {
        let tables = self.read()?;
        Ok(tables.elements.get(&id).cloned())
    }

    async fn list_by_branch(
        &self,
        branch_id: BranchId,
        options: &ListOptions,
    ) -> StoreResult<Vec<Element>> {
        let tables = self.read()?;
        let rows: Vec<Element> = match tables.by_branch.get(&branch_id) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| tables.elements.get(id))
                .filter(|e| options.matches(e))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(options.paginate(rows))
    }

    async fn update(&self, element: Element) -> StoreResult<Element> {
        let mut tables = self.write()?;
        Self::swap(&mut tables, element, false)
    }

    async fn update_with_base(&self, element: Element) -> StoreResult<Element> {
        let mut tables = self.write()?;
        Self::swap(&mut tables, element, true)
    }

    async fn delete(&self, id: ElementId, expected_version: Option<u64>) -> StoreResult<Element> {
        let mut tables = self.write()?;
        let mut element = tables
            .elements
            .get(&id)
            .cloned()
            .ok_or(StoreError::ElementNotFound(id))?;
        if let Some(expected) = expected_version {
            element.version = expected;
        }
        element.mark_deleted();
        Self::swap(&mut tables, element, false)
    }

    async fn count_by_branch(&self, branch_id: BranchId) -> StoreResult<usize> {
        let tables = self.read()?;
        Ok(tables
            .by_branch
            .get(&branch_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.elements.get(id))
                    .filter(|e| e.is_live())
                    .count()
            })
            .unwrap_or(0))
    }

    async fn list_children(&self, parent_id: ElementId) -> StoreResult<Vec<Element>> {
        let tables = self.read()?;
        let rows: Vec<Element> = match tables.by_parent.get(&parent_id) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| tables.elements.get(id))
                .filter(|e| e.is_live())
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(ListOptions::live().paginate(rows))
    }
}

impl std::fmt::Debug for InMemoryElementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryElementStore")
            .field("element_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_types::{Dimensions3D, ElementType, Point3D, SceneId};
    use std::sync::Arc;

    fn make_element(branch: BranchId, name: &str) -> Element {
        Element::new(SceneId::new(), branch, ElementType::Wall, name)
    }

    // -----------------------------------------------------------------------
    // Create / read
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_and_find() {
        let store = InMemoryElementStore::new();
        let e = make_element(BranchId::new(), "w1");
        let created = store.create(e.clone()).await.unwrap();
        assert_eq!(created.version, 1);
        let found = store.find(e.id).await.unwrap().unwrap();
        assert_eq!(found.name, "w1");
    }

    #[tokio::test]
    async fn create_duplicate_id_conflicts() {
        let store = InMemoryElementStore::new();
        let e = make_element(BranchId::new(), "w1");
        store.create(e.clone()).await.unwrap();
        let err = store.create(e).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryElementStore::new();
        let err = store.get(ElementId::new()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.find(ElementId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_parent_in_other_branch() {
        let store = InMemoryElementStore::new();
        let parent = store
            .create(make_element(BranchId::new(), "room"))
            .await
            .unwrap();
        let child = make_element(BranchId::new(), "door").with_parent(parent.id);
        let err = store.create(child).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn create_rejects_missing_parent() {
        let store = InMemoryElementStore::new();
        let child = make_element(BranchId::new(), "door").with_parent(ElementId::new());
        assert!(store.create(child).await.is_err());
    }

    // -----------------------------------------------------------------------
    // Compare-and-swap
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn update_increments_version_by_one() {
        let store = InMemoryElementStore::new();
        let mut e = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();
        e.position = Point3D::new(1.0, 0.0, 0.0);
        let updated = store.update(e).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.position.x, 1.0);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn stale_update_is_rejected() {
        let store = InMemoryElementStore::new();
        let e = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();

        let mut first = e.clone();
        first.name = "first".into();
        store.update(first).await.unwrap();

        let mut second = e.clone();
        second.name = "second".into();
        let err = store.update(second).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("element was modified by another process"));
        match err {
            StoreError::VersionConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.get(e.id).await.unwrap().name, "first");
    }

    #[tokio::test]
    async fn update_cannot_move_branches() {
        let store = InMemoryElementStore::new();
        let mut e = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();
        e.branch_id = BranchId::new();
        assert!(matches!(
            store.update(e).await.unwrap_err(),
            StoreError::Invalid(_)
        ));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = InMemoryElementStore::new();
        let e = make_element(BranchId::new(), "ghost");
        assert!(store.update(e).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let store = InMemoryElementStore::new();
        let created = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();
        let mut tampered = created.clone();
        tampered.created_at = chrono::Utc::now() + chrono::Duration::days(1);
        let updated = store.update(tampered).await.unwrap();
        assert_eq!(updated.created_at, created.created_at);
    }

    // -----------------------------------------------------------------------
    // Soft delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_is_soft_and_versioned() {
        let store = InMemoryElementStore::new();
        let branch = BranchId::new();
        let e = store.create(make_element(branch, "w1")).await.unwrap();
        let deleted = store.delete(e.id, None).await.unwrap();
        assert!(deleted.is_deleted);
        assert_eq!(deleted.version, 2);
        assert_eq!(store.count_by_branch(branch).await.unwrap(), 0);
        assert!(store.find(e.id).await.unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn delete_with_stale_version_conflicts() {
        let store = InMemoryElementStore::new();
        let e = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();
        let mut moved = e.clone();
        moved.name = "moved".into();
        store.update(moved).await.unwrap();
        let err = store.delete(e.id, Some(1)).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.get(e.id).await.unwrap().is_live());
    }

    #[tokio::test]
    async fn tombstone_cannot_be_revived() {
        let store = InMemoryElementStore::new();
        let e = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();
        let mut revived = store.delete(e.id, None).await.unwrap();
        revived.is_deleted = false;
        assert!(matches!(
            store.update(revived.clone()).await.unwrap_err(),
            StoreError::Invalid(_)
        ));
        assert!(store.update_with_base(revived).await.is_err());
        assert!(store.delete(e.id, None).await.is_err());
        let stored = store.get(e.id).await.unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.version, 2);
    }

    // -----------------------------------------------------------------------
    // Base fingerprint
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn plain_update_keeps_stored_base() {
        let store = InMemoryElementStore::new();
        let created = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();
        let base = created.content_fingerprint().unwrap();
        let mut anchored = created.clone();
        anchored.base_fingerprint = Some(base);
        let anchored = store.update_with_base(anchored).await.unwrap();
        assert_eq!(anchored.base_fingerprint, Some(base));

        let mut forged = anchored.clone();
        forged.name = "renamed".into();
        forged.base_fingerprint = None;
        let updated = store.update(forged).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.base_fingerprint, Some(base));
        assert_eq!(store.get(created.id).await.unwrap().base_fingerprint, Some(base));
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_excludes_tombstones_by_default() {
        let store = InMemoryElementStore::new();
        let branch = BranchId::new();
        let a = store.create(make_element(branch, "a")).await.unwrap();
        store.create(make_element(branch, "b")).await.unwrap();
        store.delete(a.id, None).await.unwrap();

        let live = store
            .list_by_branch(branch, &ListOptions::live())
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "b");

        let all = store
            .list_by_branch(branch, &ListOptions::with_tombstones())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_type_and_paginates() {
        let store = InMemoryElementStore::new();
        let branch = BranchId::new();
        let scene = SceneId::new();
        for i in 0..4 {
            store
                .create(Element::new(scene, branch, ElementType::Wall, format!("w{i}")))
                .await
                .unwrap();
        }
        store
            .create(Element::furniture(
                scene,
                branch,
                "bed",
                "BED-1",
                Point3D::default(),
                Dimensions3D::new(1.6, 0.5, 2.0),
            ))
            .await
            .unwrap();

        let walls = store
            .list_by_branch(branch, &ListOptions::live().of_type(ElementType::Wall))
            .await
            .unwrap();
        assert_eq!(walls.len(), 4);

        let page = store
            .list_by_branch(
                branch,
                &ListOptions::live().of_type(ElementType::Wall).offset(1).limit(2),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "w1");
    }

    #[tokio::test]
    async fn list_unknown_branch_is_empty() {
        let store = InMemoryElementStore::new();
        let rows = store
            .list_by_branch(BranchId::new(), &ListOptions::live())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn children_follow_parent_index() {
        let store = InMemoryElementStore::new();
        let branch = BranchId::new();
        let wall = store.create(make_element(branch, "wall")).await.unwrap();
        let door = Element::new(wall.scene_id, branch, ElementType::Door, "door").with_parent(wall.id);
        let door = store.create(door).await.unwrap();

        let children = store.list_children(wall.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, door.id);

        let mut detached = door.clone();
        detached.parent_id = None;
        store.update(detached).await.unwrap();
        assert!(store.list_children(wall.id).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_have_one_winner() {
        let store = Arc::new(InMemoryElementStore::new());
        let e = store
            .create(make_element(BranchId::new(), "w1"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let mut attempt = e.clone();
                attempt.name = format!("writer-{i}");
                tokio::spawn(async move { store.update(attempt).await })
            })
            .collect();

        let mut wins = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert!(err.is_conflict()),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.get(e.id).await.unwrap().version, 2);
    }
}
