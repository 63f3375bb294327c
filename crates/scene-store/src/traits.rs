use async_trait::async_trait;

use scene_types::{BranchId, Element, ElementId, Scene, SceneId};

use crate::error::{StoreError, StoreResult};
use crate::query::ListOptions;

/// Optimistic-concurrency element store.
///
/// All implementations must satisfy these invariants:
/// - `create` rejects an id that already exists.
/// - `update` is a compare-and-swap on `(id, version)`: the caller passes the
///   version it read, the store checks it against the stored row, then writes
///   the row with the version advanced by one and `updated_at` refreshed.
/// - `delete` is an `update` that sets `is_deleted`; rows are never removed.
/// - Tombstones are final: `update`, `update_with_base` and `delete` reject
///   a row that is already deleted.
/// - `update` keeps the stored `base_fingerprint`; only `update_with_base`
///   may change it.
/// - A row's scene, branch and lineage never change after creation.
#[async_trait]
pub trait ElementStore: Send + Sync {
    /// Insert a new element as given. Returns the stored row.
    async fn create(&self, element: Element) -> StoreResult<Element>;

    /// Read an element by id, tombstones included.
    ///
    /// Returns `Ok(None)` if the element does not exist.
    async fn find(&self, id: ElementId) -> StoreResult<Option<Element>>;

    /// List a branch's elements, filtered and paginated by `options`.
    async fn list_by_branch(
        &self,
        branch_id: BranchId,
        options: &ListOptions,
    ) -> StoreResult<Vec<Element>>;

    /// Compare-and-swap update. `element.version` must equal the stored
    /// version. Returns the stored row with its new version.
    async fn update(&self, element: Element) -> StoreResult<Element>;

    /// Compare-and-swap update that also writes `base_fingerprint`. Used by
    /// merge to re-anchor rows to their new common ancestor.
    async fn update_with_base(&self, element: Element) -> StoreResult<Element>;

    /// Soft-delete an element through the update path.
    ///
    /// With `expected_version` set, the delete is checked against it. Without
    /// it the current version is read and used, which can still lose to a
    /// concurrent writer and surface as a conflict.
    async fn delete(&self, id: ElementId, expected_version: Option<u64>) -> StoreResult<Element>;

    /// Number of live elements in a branch.
    async fn count_by_branch(&self, branch_id: BranchId) -> StoreResult<usize>;

    /// Live elements whose parent is `parent_id`.
    async fn list_children(&self, parent_id: ElementId) -> StoreResult<Vec<Element>>;

    /// Read an element by id, failing with `ElementNotFound` if absent.
    async fn get(&self, id: ElementId) -> StoreResult<Element> {
        self.find(id).await?.ok_or(StoreError::ElementNotFound(id))
    }
}

/// Lookup of scene documents owned by the scene service.
#[async_trait]
pub trait SceneDirectory: Send + Sync {
    /// Returns `Ok(None)` if the scene does not exist.
    async fn find_scene(&self, id: SceneId) -> StoreResult<Option<Scene>>;

    /// Insert or replace a scene.
    async fn put_scene(&self, scene: Scene) -> StoreResult<()>;

    /// Record the scene's main branch.
    async fn set_main_branch(&self, id: SceneId, branch_id: BranchId) -> StoreResult<Scene>;

    /// Read a scene, failing with `SceneNotFound` if absent.
    async fn get_scene(&self, id: SceneId) -> StoreResult<Scene> {
        self.find_scene(id).await?.ok_or(StoreError::SceneNotFound(id))
    }
}
