use serde::{Deserialize, Serialize};

use crate::motion::GridSettings;
use crate::scene::{SceneId, EXTRA_FLAG_PERSISTENT};

/// Scene whose entrance matching is bypassed in favor of a fixed index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntranceOverride {
    pub scene_id: SceneId,
    pub entrance_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Object whose visibility is restored when an entrance sequence runs.
    /// Zero leaves the project's own anchor in place.
    pub anchor_object_id: i32,
    /// Scene kept loaded while a preload swaps resources, for progress display.
    pub loader_scene_id: Option<SceneId>,
    pub grid: GridSettings,
    pub entrance_overrides: Vec<EntranceOverride>,
    pub snapshot_flags: u32,
    pub snapshot_extra_flags: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anchor_object_id: 0,
            loader_scene_id: None,
            grid: GridSettings::default(),
            entrance_overrides: vec![EntranceOverride {
                scene_id: SceneId(726),
                entrance_index: 0,
            }],
            snapshot_flags: 0,
            snapshot_extra_flags: EXTRA_FLAG_PERSISTENT,
        }
    }
}

impl EngineConfig {
    pub fn entrance_override(&self, scene_id: SceneId) -> Option<usize> {
        self.entrance_overrides
            .iter()
            .find(|entry| entry.scene_id == scene_id)
            .map(|entry| entry.entrance_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "anchor_object_id": 500, "grid": { "cell_size": 10 } }"#)
                .expect("config");
        assert_eq!(config.anchor_object_id, 500);
        assert_eq!(config.grid.cell_size, 10);
        assert_eq!(config.grid.width, 800);
        assert_eq!(config.snapshot_extra_flags, 128);
        assert_eq!(config.entrance_override(SceneId(726)), Some(0));
        assert_eq!(config.entrance_override(SceneId(1)), None);
    }
}
