use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::content::write_text_atomic;
use crate::registry::SceneRegistry;
use crate::scene::{AnimatedObject, DynamicObjectSnapshot, Scene, SceneId, SNAPSHOT_KIND_MASK};

pub const SNAPSHOT_SAVE_VERSION: u32 = 1;

/// Captures objects whose flag sets are supersets of both masks, pictures
/// first. A scene without pictures yields nothing.
pub fn capture_snapshots(scene: &Scene, flags: u32, extra_flags: u32) -> Vec<DynamicObjectSnapshot> {
    if scene.pictures().is_empty() {
        return Vec::new();
    }
    let passes = |object_flags: u32, object_extra: u32| {
        object_flags & flags == flags && object_extra & extra_flags == extra_flags
    };

    let mut snapshots = Vec::new();
    for picture in scene.pictures() {
        if passes(picture.flags, picture.extra_flags) {
            snapshots.push(picture.snapshot(scene.id));
        }
    }
    for object in scene.animated() {
        if passes(object.flags, object.extra_flags) {
            let mut snapshot = object.snapshot();
            snapshot.kind &= SNAPSHOT_KIND_MASK;
            snapshots.push(snapshot);
        }
    }
    snapshots
}

/// Animated templates from other live scenes, resolved before the target
/// scene is borrowed mutably.
#[derive(Debug, Default)]
pub(crate) struct ForeignOwners {
    reachable: HashSet<SceneId>,
    templates: HashMap<(SceneId, i32), AnimatedObject>,
}

impl ForeignOwners {
    pub(crate) fn collect(
        registry: &SceneRegistry,
        target: SceneId,
        snapshots: &[DynamicObjectSnapshot],
    ) -> Self {
        let mut owners = Self::default();
        for snapshot in snapshots.iter().filter(|snapshot| snapshot.is_animated()) {
            if snapshot.scene_id == target {
                continue;
            }
            let Some(owner) = registry.live_scene(snapshot.scene_id) else {
                continue;
            };
            owners.reachable.insert(snapshot.scene_id);
            if let Some(template) = owner.animated_by_id(snapshot.object_id, Some(0)) {
                owners
                    .templates
                    .entry((snapshot.scene_id, snapshot.object_id))
                    .or_insert_with(|| template.clone());
            }
        }
        owners
    }
}

/// Pushes snapshots onto matching objects, cloning copy zero for objects
/// that do not exist yet. Animated entries whose owning scene is neither the
/// target nor live are skipped.
pub(crate) fn apply_snapshots(
    scene: &mut Scene,
    snapshots: &[DynamicObjectSnapshot],
    owners: &ForeignOwners,
) {
    for snapshot in snapshots {
        if snapshot.is_picture() {
            if let Some(picture) = scene.picture_by_id_mut(snapshot.object_id, snapshot.copy_index) {
                picture.apply_snapshot(snapshot);
                continue;
            }
            let Some(template) = scene.picture_by_id(snapshot.object_id, 0) else {
                trace!(object_id = snapshot.object_id, "snapshot_picture_unmatched");
                continue;
            };
            let mut copy = template.clone();
            copy.apply_snapshot(snapshot);
            scene.push_picture(copy);
            continue;
        }
        if !snapshot.is_animated() {
            continue;
        }

        let owned_here = snapshot.scene_id == scene.id;
        if !owned_here && !owners.reachable.contains(&snapshot.scene_id) {
            debug!(
                object_id = snapshot.object_id,
                owner_scene = snapshot.scene_id.0,
                "snapshot_owner_unreachable"
            );
            continue;
        }
        if let Some(object) = scene.animated_by_id_mut(snapshot.object_id, Some(snapshot.copy_index)) {
            object.apply_snapshot(snapshot);
            continue;
        }
        let template = if owned_here {
            scene.animated_by_id(snapshot.object_id, Some(0)).cloned()
        } else {
            owners
                .templates
                .get(&(snapshot.scene_id, snapshot.object_id))
                .cloned()
        };
        if let Some(mut copy) = template {
            copy.apply_snapshot(snapshot);
            scene.add_animated(copy);
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    #[error("failed to read/write snapshot save {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot save {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot save {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSnapshots {
    pub scene_id: SceneId,
    pub snapshots: Vec<DynamicObjectSnapshot>,
}

/// Persisted "current" snapshot lists of every scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSave {
    pub version: u32,
    pub scenes: Vec<SceneSnapshots>,
}

pub fn write_snapshot_save(path: &Path, save: &SnapshotSave) -> Result<(), SnapshotStoreError> {
    let text = serde_json::to_string_pretty(save).map_err(|source| SnapshotStoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_text_atomic(path, &text).map_err(|source| SnapshotStoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_snapshot_save(path: &Path) -> Result<SnapshotSave, SnapshotStoreError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotStoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let save: SnapshotSave =
        serde_json::from_str(&raw).map_err(|source| SnapshotStoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    if save.version != SNAPSHOT_SAVE_VERSION {
        return Err(SnapshotStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: save.version,
        });
    }
    Ok(save)
}
