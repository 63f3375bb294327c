use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Dimensions3D;
use crate::ids::{BranchId, SceneId};

/// A floor-plan document owning a tree of branches.
///
/// Scenes are owned by the scene service; the branching engine only reads
/// them to validate that a scene exists and to learn its main branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub workspace_id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub dimensions: Dimensions3D,
    /// Unset until the main branch has been created.
    pub main_branch_id: Option<BranchId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scene {
    pub fn new(
        workspace_id: impl Into<String>,
        owner_id: impl Into<String>,
        name: impl Into<String>,
        dimensions: Dimensions3D,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SceneId::new(),
            workspace_id: workspace_id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: String::new(),
            dimensions,
            main_branch_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_scene_has_no_main_branch() {
        let scene = Scene::new("ws-1", "user-1", "Flat 12", Dimensions3D::new(10.0, 2.7, 8.0));
        assert!(scene.main_branch_id.is_none());
        assert_eq!(scene.name, "Flat 12");
    }

    #[test]
    fn description_defaults_when_absent() {
        let scene = Scene::new("ws", "owner", "s", Dimensions3D::default());
        let mut json = serde_json::to_value(&scene).unwrap();
        json.as_object_mut().unwrap().remove("description");
        let back: Scene = serde_json::from_value(json).unwrap();
        assert!(back.description.is_empty());
    }
}
