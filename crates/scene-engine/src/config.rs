use serde::{Deserialize, Serialize};

/// Lifecycle policy switches, the `[engine]` table of the server config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Soft-delete a branch's elements in the background when the branch is
    /// deleted.
    #[serde(default = "enabled")]
    pub purge_elements_on_delete: bool,

    /// Block merges whose source branch fails the compliance check.
    #[serde(default = "enabled")]
    pub enforce_compliance: bool,
}

fn enabled() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            purge_elements_on_delete: true,
            enforce_compliance: true,
        }
    }
}
