use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use scene_types::{BranchId, Scene, SceneId};

use crate::error::{StoreError, StoreResult};
use crate::traits::SceneDirectory;

/// In-memory scene directory for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemorySceneDirectory {
    scenes: RwLock<HashMap<SceneId, Scene>>,
}

impl InMemorySceneDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SceneDirectory for InMemorySceneDirectory {
    async fn find_scene(&self, id: SceneId) -> StoreResult<Option<Scene>> {
        let scenes = self
            .scenes
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(scenes.get(&id).cloned())
    }

    async fn put_scene(&self, scene: Scene) -> StoreResult<()> {
        let mut scenes = self
            .scenes
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;
        scenes.insert(scene.id, scene);
        Ok(())
    }

    async fn set_main_branch(&self, id: SceneId, branch_id: BranchId) -> StoreResult<Scene> {
        let mut scenes = self
            .scenes
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;
        let scene = scenes.get_mut(&id).ok_or(StoreError::SceneNotFound(id))?;
        scene.main_branch_id = Some(branch_id);
        scene.updated_at = Utc::now();
        Ok(scene.clone())
    }
}
