//! The element service boundary.
//!
//! The branching engine never touches the element store directly: every
//! read and write goes through [`ElementService`], which in production is a
//! remote call and here is either [`LocalElementService`] (an in-process
//! adapter with per-call deadlines) or [`UnavailableElementService`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scene_store::{ElementStore, ListOptions, SceneDirectory, StoreError};
use scene_types::{
    BranchId, Dimensions3D, Element, ElementId, ElementProperties, ElementType, Fingerprint,
    LineageId, Point3D, Rotation3D, Scene, SceneId,
};

use crate::error::{SyncError, SyncResult};

/// Filter for [`ElementService::list_elements`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// Only elements of this type.
    #[serde(rename = "type")]
    pub element_type: Option<ElementType>,
    pub limit: Option<usize>,
    /// Rows skipped before `limit` applies.
    pub offset: usize,
    pub include_deleted: bool,
}

impl ListQuery {
    pub fn live(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_tombstones(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            include_deleted: true,
            ..Self::default()
        }
    }

    pub fn of_type(mut self, element_type: ElementType) -> Self {
        self.element_type = Some(element_type);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn to_options(self) -> ListOptions {
        ListOptions {
            element_type: self.element_type,
            limit: self.limit,
            offset: self.offset,
            include_deleted: self.include_deleted,
        }
    }
}

/// Everything needed to create an element in a branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewElement {
    pub scene_id: SceneId,
    pub branch_id: BranchId,
    /// `None` starts a new lineage.
    #[serde(default)]
    pub lineage_id: Option<LineageId>,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
    #[serde(default)]
    pub position: Point3D,
    #[serde(default)]
    pub rotation: Rotation3D,
    #[serde(default)]
    pub dimensions: Dimensions3D,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub parent_id: Option<ElementId>,
    #[serde(default)]
    pub base_fingerprint: Option<Fingerprint>,
}

impl NewElement {
    /// A new element starting its own lineage, with default geometry.
    pub fn new(
        scene_id: SceneId,
        branch_id: BranchId,
        element_type: ElementType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            scene_id,
            branch_id,
            lineage_id: None,
            element_type,
            name: name.into(),
            position: Point3D::default(),
            rotation: Rotation3D::default(),
            dimensions: Dimensions3D::default(),
            properties: ElementProperties::default(),
            parent_id: None,
            base_fingerprint: None,
        }
    }

    pub fn with_position(mut self, position: Point3D) -> Self {
        self.position = position;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions3D) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_parent(mut self, parent_id: ElementId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// A copy of `source` bound for `branch_id`, in `scene_id`.
    ///
    /// Lineage and content are carried over and the parent is cleared; the
    /// caller decides the base fingerprint and the remapped parent.
    pub fn copy_of(source: &Element, scene_id: SceneId, branch_id: BranchId) -> Self {
        Self {
            scene_id,
            branch_id,
            lineage_id: Some(source.lineage_id),
            element_type: source.element_type,
            name: source.name.clone(),
            position: source.position,
            rotation: source.rotation,
            dimensions: source.dimensions,
            properties: source.properties.clone(),
            parent_id: None,
            base_fingerprint: source.base_fingerprint,
        }
    }

    /// Build the row the store will persist: fresh id, version 1, fresh
    /// timestamps.
    pub fn into_element(self) -> Element {
        let mut element = Element::new(self.scene_id, self.branch_id, self.element_type, self.name);
        if let Some(lineage_id) = self.lineage_id {
            element.lineage_id = lineage_id;
        }
        element.position = self.position;
        element.rotation = self.rotation;
        element.dimensions = self.dimensions;
        element.properties = self.properties;
        element.parent_id = self.parent_id;
        element.base_fingerprint = self.base_fingerprint;
        element
    }
}

/// Element operations offered by the scene service.
#[async_trait]
pub trait ElementService: Send + Sync {
    /// Elements of a branch, oldest first.
    async fn list_elements(&self, branch_id: BranchId, query: &ListQuery)
        -> SyncResult<Vec<Element>>;

    /// A single element, tombstones included.
    async fn get_element(&self, id: ElementId) -> SyncResult<Element>;

    async fn create_element(&self, element: NewElement) -> SyncResult<Element>;

    /// Compare-and-swap update on `(id, version)`. The stored base
    /// fingerprint is kept and tombstones are rejected.
    async fn update_element(&self, element: Element) -> SyncResult<Element>;

    /// Compare-and-swap update that also records `element.base_fingerprint`.
    async fn update_with_base(&self, element: Element) -> SyncResult<Element>;

    /// Soft delete.
    async fn delete_element(&self, id: ElementId) -> SyncResult<Element>;

    /// Live elements in a branch.
    async fn count_elements(&self, branch_id: BranchId) -> SyncResult<usize>;

    async fn get_scene(&self, scene_id: SceneId) -> SyncResult<Scene>;
}

/// In-process adapter over an element store and scene directory.
///
/// Every call is bounded by `call_timeout`; an elapsed deadline surfaces as
/// [`SyncError::Timeout`].
pub struct LocalElementService {
    elements: Arc<dyn ElementStore>,
    scenes: Arc<dyn SceneDirectory>,
    call_timeout: Duration,
}

impl LocalElementService {
    pub fn new(
        elements: Arc<dyn ElementStore>,
        scenes: Arc<dyn SceneDirectory>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            elements,
            scenes,
            call_timeout,
        }
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> SyncResult<T> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(SyncError::Timeout {
                operation,
                after: self.call_timeout,
            }),
        }
    }
}

#[async_trait]
impl ElementService for LocalElementService {
    async fn list_elements(
        &self,
        branch_id: BranchId,
        query: &ListQuery,
    ) -> SyncResult<Vec<Element>> {
        let options = query.to_options();
        let rows = self
            .call("list_elements", self.elements.list_by_branch(branch_id, &options))
            .await?;
        tracing::debug!(branch_id = %branch_id, rows = rows.len(), "listed elements");
        Ok(rows)
    }

    async fn get_element(&self, id: ElementId) -> SyncResult<Element> {
        self.call("get_element", self.elements.get(id)).await
    }

    async fn create_element(&self, element: NewElement) -> SyncResult<Element> {
        self.call("create_element", self.elements.create(element.into_element()))
            .await
    }

    async fn update_element(&self, element: Element) -> SyncResult<Element> {
        self.call("update_element", self.elements.update(element))
            .await
    }

    async fn update_with_base(&self, element: Element) -> SyncResult<Element> {
        self.call("update_with_base", self.elements.update_with_base(element))
            .await
    }

    async fn delete_element(&self, id: ElementId) -> SyncResult<Element> {
        self.call("delete_element", self.elements.delete(id, None))
            .await
    }

    async fn count_elements(&self, branch_id: BranchId) -> SyncResult<usize> {
        self.call("count_elements", self.elements.count_by_branch(branch_id))
            .await
    }

    async fn get_scene(&self, scene_id: SceneId) -> SyncResult<Scene> {
        self.call("get_scene", self.scenes.get_scene(scene_id)).await
    }
}

/// Stand-in used when the element service is disabled. Every call fails
/// with [`SyncError::Unavailable`].
#[derive(Clone, Debug)]
pub struct UnavailableElementService {
    reason: String,
}

impl UnavailableElementService {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self, operation: &str) -> SyncResult<T> {
        tracing::debug!(operation, "element service unavailable");
        Err(SyncError::Unavailable(self.reason.clone()))
    }
}

impl Default for UnavailableElementService {
    fn default() -> Self {
        Self::new("element service disabled")
    }
}

#[async_trait]
impl ElementService for UnavailableElementService {
    async fn list_elements(&self, _: BranchId, _: &ListQuery) -> SyncResult<Vec<Element>> {
        self.fail("list_elements")
    }

    async fn get_element(&self, _: ElementId) -> SyncResult<Element> {
        self.fail("get_element")
    }

    async fn create_element(&self, _: NewElement) -> SyncResult<Element> {
        self.fail("create_element")
    }

    async fn update_element(&self, _: Element) -> SyncResult<Element> {
        self.fail("update_element")
    }

    async fn update_with_base(&self, _: Element) -> SyncResult<Element> {
        self.fail("update_with_base")
    }

    async fn delete_element(&self, _: ElementId) -> SyncResult<Element> {
        self.fail("delete_element")
    }

    async fn count_elements(&self, _: BranchId) -> SyncResult<usize> {
        self.fail("count_elements")
    }

    async fn get_scene(&self, _: SceneId) -> SyncResult<Scene> {
        self.fail("get_scene")
    }
}
