use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::content::{
    decode_project_archive, decode_scene_record, parse_project_document, scene_body_name,
    scene_record_name, ArchiveError, DocumentError, SceneEntry,
};
use crate::loader::{SceneLoadError, SceneLoader};
use crate::motion::{build_from_archive, CompoundController, MotionController, MovementGraph};
use crate::registry::{SceneRegistry, SceneSource};
use crate::resources::{ResourceError, ResourceProvider};
use crate::scene::{DynamicObjectSnapshot, PassageDescriptor, Scene, SceneId};
use crate::snapshot::{
    apply_snapshots, read_snapshot_save, write_snapshot_save, ForeignOwners, SceneSnapshots,
    SnapshotSave, SnapshotStoreError, SNAPSHOT_SAVE_VERSION,
};
use crate::transition::TransitionCoordinator;

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("scene record {resource} describes scene {found}, expected {expected}")]
    RecordMismatch {
        resource: String,
        expected: SceneId,
        found: SceneId,
    },
}

/// Owns every scene of one project and the transition state between them.
pub struct SceneManager {
    pub(crate) config: EngineConfig,
    pub(crate) resources: Box<dyn ResourceProvider>,
    pub(crate) registry: SceneRegistry,
    pub(crate) transition: TransitionCoordinator,
    pub(crate) anchor_object_id: i32,
    title: String,
    passages: Vec<PassageDescriptor>,
}

impl SceneManager {
    pub fn new(resources: Box<dyn ResourceProvider>, config: EngineConfig) -> Self {
        let anchor_object_id = config.anchor_object_id;
        Self {
            config,
            resources,
            registry: SceneRegistry::new(),
            transition: TransitionCoordinator::default(),
            anchor_object_id,
            title: String::new(),
            passages: Vec::new(),
        }
    }

    /// Registers every scene declared by a project document. Referenced scene
    /// documents resolve relative to the project document.
    pub fn boot_from_document(
        resources: Box<dyn ResourceProvider>,
        config: EngineConfig,
        project_name: &str,
    ) -> Result<Self, BootError> {
        let raw = resources.read_text(project_name)?;
        let project = parse_project_document(Path::new(project_name), &raw)?;
        let base = project_name
            .rsplit_once('/')
            .map(|(dir, _)| format!("{dir}/"))
            .unwrap_or_default();

        let mut manager = Self::new(resources, config);
        manager.title = project.title;
        for entry in project.scenes {
            match entry {
                SceneEntry::Reference { id, file } => {
                    manager
                        .registry
                        .register(id, "", SceneSource::Document(format!("{base}{file}")));
                }
                SceneEntry::Inline(document) => {
                    let id = document.description.id;
                    let title = document.description.title.clone();
                    manager
                        .registry
                        .register(id, title, SceneSource::Inline(document));
                }
            }
        }
        manager.passages = project.passages;

        info!(
            project = %manager.title,
            scenes = manager.registry.len(),
            passages = manager.passages.len(),
            "project_booted_from_document"
        );
        Ok(manager)
    }

    /// Registers every scene tag of a binary project and reads each scene's
    /// record archive for its motion data, default snapshots and entrances.
    pub fn boot_from_archive(
        resources: Box<dyn ResourceProvider>,
        config: EngineConfig,
        project_name: &str,
    ) -> Result<Self, BootError> {
        let bytes = resources.read_bytes(project_name)?;
        let project = decode_project_archive(project_name, &bytes)?;

        let mut manager = Self::new(resources, config);
        manager.title = project.game_name;
        if manager.anchor_object_id == 0 {
            manager.anchor_object_id = project.anchor_object_id;
        }

        for tag in &project.scene_tags {
            let index = manager.registry.register(
                tag.scene_id,
                tag.title.clone(),
                SceneSource::Archive(scene_body_name(tag.scene_id)),
            );
            let record_name = scene_record_name(tag.scene_id);
            let record_bytes = manager.resources.read_bytes(&record_name)?;
            let record = decode_scene_record(&record_name, &record_bytes)?;
            if record.scene_id != tag.scene_id {
                return Err(BootError::RecordMismatch {
                    resource: record_name,
                    expected: tag.scene_id,
                    found: record.scene_id,
                });
            }
            if let Some(motion) = &record.motion {
                let controller = build_from_archive(motion, manager.config.grid);
                manager.registry.bind_motion_controller(index, controller);
            }
            if let Some(entry) = manager.registry.record_mut(index) {
                entry.default_snapshots = record.default_snapshots;
                entry.entrances = record.entrances;
            }
        }
        for item in project.preload_items {
            manager.add_preload_item(item);
        }

        info!(
            project = %manager.title,
            version = project.version,
            scenes = manager.registry.len(),
            anchor_object_id = manager.anchor_object_id,
            "project_booted_from_archive"
        );
        Ok(manager)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn anchor_object_id(&self) -> i32 {
        self.anchor_object_id
    }

    pub fn passages(&self) -> &[PassageDescriptor] {
        &self.passages
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SceneRegistry {
        &mut self.registry
    }

    pub fn current_scene(&self) -> Option<SceneId> {
        self.transition.current_scene
    }

    pub fn current_scene_ref(&self) -> Option<&Scene> {
        self.transition
            .current_scene
            .and_then(|scene_id| self.registry.live_scene(scene_id))
    }

    pub fn load_scene(&mut self, scene_id: SceneId) -> Result<bool, SceneLoadError> {
        let loader = SceneLoader::new(self.resources.as_ref(), &self.config);
        loader.load_scene(&mut self.registry, scene_id)
    }

    /// A scene that is current stops being current once unloaded.
    pub fn unload_scene(&mut self, scene_id: SceneId) -> bool {
        let loader = SceneLoader::new(self.resources.as_ref(), &self.config);
        let unloaded = loader.unload_scene(&mut self.registry, scene_id);
        if unloaded && self.transition.current_scene == Some(scene_id) {
            self.transition.current_scene = None;
        }
        unloaded
    }

    /// Loads the scene on demand and returns its live instance.
    pub fn access_scene(&mut self, scene_id: SceneId) -> Result<Option<&mut Scene>, SceneLoadError> {
        if !self.load_scene(scene_id)? {
            return Ok(None);
        }
        Ok(self.registry.live_scene_mut(scene_id))
    }

    pub fn save_scene_snapshots(&mut self, scene_id: SceneId) -> bool {
        let loader = SceneLoader::new(self.resources.as_ref(), &self.config);
        loader.save_scene_snapshots(&mut self.registry, scene_id)
    }

    /// Forgets every saved "current" list and puts live scenes back to their
    /// authored state.
    pub fn restore_default_snapshots(&mut self) {
        let ids: Vec<SceneId> = self
            .registry
            .iter()
            .map(|(tag, _)| tag.scene_id)
            .collect();
        for scene_id in ids {
            let Some(index) = self.registry.find_by_id(scene_id) else {
                continue;
            };
            let defaults = match self.registry.record_mut(index) {
                Some(record) => {
                    record.current_snapshots.clear();
                    record.default_snapshots.clone()
                }
                None => continue,
            };
            let owners = ForeignOwners::collect(&self.registry, scene_id, &defaults);
            if let Some(scene) = self.registry.live_scene_at_mut(index) {
                apply_snapshots(scene, &defaults, &owners);
            }
        }
        info!(scenes = self.registry.len(), "default_snapshots_restored");
    }

    pub fn default_snapshots(&self, scene_id: SceneId) -> Option<&[DynamicObjectSnapshot]> {
        self.registry
            .record_by_id(scene_id)
            .map(|record| record.default_snapshots.as_slice())
    }

    pub fn current_snapshots(&self, scene_id: SceneId) -> Option<&[DynamicObjectSnapshot]> {
        self.registry
            .record_by_id(scene_id)
            .map(|record| record.current_snapshots.as_slice())
    }

    /// Only unloaded scenes accept a replacement list.
    pub fn set_current_snapshots(&mut self, scene_id: SceneId, snapshots: Vec<DynamicObjectSnapshot>) -> bool {
        match self.registry.record_by_id_mut(scene_id) {
            Some(record) if !record.is_loaded() => {
                record.current_snapshots = snapshots;
                true
            }
            _ => false,
        }
    }

    /// Captures every live scene, then writes all current lists.
    pub fn save_snapshots(&mut self, path: &Path) -> Result<(), SnapshotStoreError> {
        let live: Vec<SceneId> = self
            .registry
            .iter()
            .filter(|(_, record)| record.is_loaded())
            .map(|(tag, _)| tag.scene_id)
            .collect();
        let loader = SceneLoader::new(self.resources.as_ref(), &self.config);
        for scene_id in live {
            loader.save_scene_snapshots(&mut self.registry, scene_id);
        }

        let scenes = self
            .registry
            .iter()
            .filter(|(_, record)| !record.current_snapshots.is_empty())
            .map(|(_, record)| SceneSnapshots {
                scene_id: record.scene_id,
                snapshots: record.current_snapshots.clone(),
            })
            .collect();
        write_snapshot_save(
            path,
            &SnapshotSave {
                version: SNAPSHOT_SAVE_VERSION,
                scenes,
            },
        )?;
        info!(path = %path.display(), "snapshots_saved");
        Ok(())
    }

    /// Replaces the current lists from a save file. Live scenes get the
    /// restored state applied on top of their defaults.
    pub fn restore_snapshots(&mut self, path: &Path) -> Result<(), SnapshotStoreError> {
        let save = read_snapshot_save(path)?;
        self.restore_default_snapshots();
        for entry in save.scenes {
            let Some(index) = self.registry.find_by_id(entry.scene_id) else {
                warn!(scene_id = entry.scene_id.0, "snapshot_scene_unknown");
                continue;
            };
            let owners = ForeignOwners::collect(&self.registry, entry.scene_id, &entry.snapshots);
            if let Some(scene) = self.registry.live_scene_at_mut(index) {
                apply_snapshots(scene, &entry.snapshots, &owners);
            }
            if let Some(record) = self.registry.record_mut(index) {
                record.current_snapshots = entry.snapshots;
            }
        }
        info!(path = %path.display(), "snapshots_restored");
        Ok(())
    }

    pub fn motion_controller(&self, scene_id: SceneId) -> Option<&MotionController> {
        self.registry.motion_controller(scene_id)
    }

    pub fn graph_by_scene(&self, scene_id: SceneId) -> Option<&MovementGraph> {
        self.registry.graph_by_scene(scene_id)
    }

    pub fn compound_by_scene(&self, scene_id: SceneId) -> Option<&CompoundController> {
        self.registry.compound_by_scene(scene_id)
    }
}
