use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot kind bit for animated objects.
pub const KIND_ANIMATED: u32 = 1;
/// Snapshot kind bit for still pictures.
pub const KIND_PICTURE: u32 = 2;
/// Bits above this mask are runtime-only and never stored in a snapshot taken
/// from an animated object.
pub const SNAPSHOT_KIND_MASK: u32 = 0xFFFF;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SceneId(pub i32);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Captured runtime state of one picture or animated object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicObjectSnapshot {
    pub kind: u32,
    pub object_id: i32,
    pub copy_index: i32,
    pub scene_id: SceneId,
    pub x: i32,
    pub y: i32,
    pub priority: i32,
    pub statics_id: i32,
    pub movement_id: i32,
    pub phase_index: i32,
    pub flags: u32,
    pub extra_flags: u32,
    pub stop_phase_index: i32,
}

impl DynamicObjectSnapshot {
    pub fn is_picture(&self) -> bool {
        self.kind & KIND_PICTURE != 0
    }

    pub fn is_animated(&self) -> bool {
        !self.is_picture() && self.kind & KIND_ANIMATED != 0
    }
}

/// One way to arrive inside a scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntranceDescriptor {
    pub scene_id: SceneId,
    pub hint_id: i32,
    pub queue_id: i32,
    pub title: String,
    pub entry_function: String,
}

/// Directed authored edge between two scenes' hint points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassageDescriptor {
    pub src_scene: SceneId,
    pub src_hint: i32,
    pub dest_scene: SceneId,
    pub dest_hint: i32,
}

/// Conditional scene swap, matched by `(trigger_scene, trigger_param)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadRequest {
    pub trigger_scene: SceneId,
    pub trigger_param: i32,
    pub destination: SceneId,
    pub param: i32,
}

impl PreloadRequest {
    pub fn matches(&self, scene_id: SceneId, param: i32) -> bool {
        self.trigger_scene == scene_id && self.trigger_param == param
    }
}
