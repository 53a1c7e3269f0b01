use std::collections::HashMap;

use tracing::debug;

use crate::content::SceneDocument;
use crate::motion::{CompoundController, MotionController, MovementGraph};
use crate::resources::scene_document_resource;
use crate::scene::{DynamicObjectSnapshot, EntranceDescriptor, Scene, SceneId};

/// Where a scene's body is decoded from on load.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSource {
    /// Binary scene body archive, by resource name.
    Archive(String),
    /// Structured scene document, by resource name.
    Document(String),
    /// Scene authored inline in the project document.
    Inline(Box<SceneDocument>),
    None,
}

impl SceneSource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Archive(_) => "archive",
            Self::Document(_) => "document",
            Self::Inline(_) => "inline",
            Self::None => "none",
        }
    }
}

/// Identity half of a registry entry. Holds the live scene while loaded.
#[derive(Debug)]
pub struct SceneTag {
    pub scene_id: SceneId,
    pub title: String,
    scene: Option<Scene>,
}

impl SceneTag {
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }
}

/// Operational half of a registry entry, index-aligned with its tag.
#[derive(Debug)]
pub struct SceneRecord {
    pub scene_id: SceneId,
    pub source: SceneSource,
    motion_controller: Option<MotionController>,
    pub default_snapshots: Vec<DynamicObjectSnapshot>,
    pub current_snapshots: Vec<DynamicObjectSnapshot>,
    pub entrances: Vec<EntranceDescriptor>,
    pub defaults_initialized: bool,
    is_loaded: bool,
}

impl SceneRecord {
    fn new(scene_id: SceneId, source: SceneSource) -> Self {
        Self {
            scene_id,
            source,
            motion_controller: None,
            default_snapshots: Vec::new(),
            current_snapshots: Vec::new(),
            entrances: Vec::new(),
            defaults_initialized: false,
            is_loaded: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn motion_controller(&self) -> Option<&MotionController> {
        self.motion_controller.as_ref()
    }
}

/// Parallel tag/record lists with an id index over both.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    tags: Vec<SceneTag>,
    records: Vec<SceneRecord>,
    index_by_id: HashMap<SceneId, usize>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_id(&self, scene_id: SceneId) -> Option<usize> {
        self.index_by_id.get(&scene_id).copied()
    }

    /// Registers a scene once; a repeated id returns the existing index and
    /// leaves the entry untouched.
    pub fn register(&mut self, scene_id: SceneId, title: impl Into<String>, source: SceneSource) -> usize {
        if let Some(index) = self.find_by_id(scene_id) {
            debug!(scene_id = scene_id.0, index, "scene_already_registered");
            return index;
        }
        self.push_entry(scene_id, title.into(), source, None)
    }

    /// Adopts a scene discovered at runtime with no prior declaration. The
    /// scene becomes the entry's live scene; later reloads read its
    /// `scNNNNNNNN.xml` document and it starts with an empty compound
    /// controller.
    pub fn create_missing(&mut self, scene: Scene) -> usize {
        if let Some(index) = self.find_by_id(scene.id) {
            return index;
        }
        let scene_id = scene.id;
        let title = scene.title.clone();
        let source = SceneSource::Document(scene_document_resource(scene_id));
        let index = self.push_entry(scene_id, title, source, Some(scene));
        if let Some(record) = self.records.get_mut(index) {
            record.motion_controller =
                Some(MotionController::Compound(CompoundController::default()));
        }
        debug!(scene_id = scene_id.0, index, "scene_adopted");
        index
    }

    fn push_entry(
        &mut self,
        scene_id: SceneId,
        title: String,
        source: SceneSource,
        scene: Option<Scene>,
    ) -> usize {
        let index = self.records.len();
        let mut record = SceneRecord::new(scene_id, source);
        record.is_loaded = scene.is_some();
        self.tags.push(SceneTag {
            scene_id,
            title,
            scene,
        });
        self.records.push(record);
        self.index_by_id.insert(scene_id, index);
        index
    }

    pub fn tag(&self, index: usize) -> Option<&SceneTag> {
        self.tags.get(index)
    }

    pub fn record(&self, index: usize) -> Option<&SceneRecord> {
        self.records.get(index)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut SceneRecord> {
        self.records.get_mut(index)
    }

    pub fn record_by_id(&self, scene_id: SceneId) -> Option<&SceneRecord> {
        self.find_by_id(scene_id).and_then(|index| self.records.get(index))
    }

    pub fn record_by_id_mut(&mut self, scene_id: SceneId) -> Option<&mut SceneRecord> {
        let index = self.find_by_id(scene_id)?;
        self.records.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SceneTag, &SceneRecord)> {
        self.tags.iter().zip(self.records.iter())
    }

    pub fn is_loaded(&self, scene_id: SceneId) -> bool {
        self.record_by_id(scene_id)
            .map_or(false, SceneRecord::is_loaded)
    }

    pub fn live_scene(&self, scene_id: SceneId) -> Option<&Scene> {
        let index = self.find_by_id(scene_id)?;
        self.tags.get(index).and_then(|tag| tag.scene.as_ref())
    }

    pub fn live_scene_mut(&mut self, scene_id: SceneId) -> Option<&mut Scene> {
        let index = self.find_by_id(scene_id)?;
        self.tags.get_mut(index).and_then(|tag| tag.scene.as_mut())
    }

    pub(crate) fn live_scene_at_mut(&mut self, index: usize) -> Option<&mut Scene> {
        self.tags.get_mut(index).and_then(|tag| tag.scene.as_mut())
    }

    /// Installs the live scene and raises the loaded flag together.
    pub(crate) fn attach_scene(&mut self, index: usize, scene: Scene) -> bool {
        let (Some(tag), Some(record)) = (self.tags.get_mut(index), self.records.get_mut(index))
        else {
            return false;
        };
        tag.scene = Some(scene);
        record.is_loaded = true;
        true
    }

    /// Removes the live scene and clears the loaded flag together.
    pub(crate) fn detach_scene(&mut self, index: usize) -> Option<Scene> {
        let (Some(tag), Some(record)) = (self.tags.get_mut(index), self.records.get_mut(index))
        else {
            return None;
        };
        record.is_loaded = false;
        tag.scene.take()
    }

    /// Binds a controller once; controllers are immutable after construction.
    pub(crate) fn bind_motion_controller(&mut self, index: usize, controller: MotionController) -> bool {
        match self.records.get_mut(index) {
            Some(record) if record.motion_controller.is_none() => {
                record.motion_controller = Some(controller);
                true
            }
            _ => false,
        }
    }

    pub fn motion_controller(&self, scene_id: SceneId) -> Option<&MotionController> {
        self.record_by_id(scene_id)
            .and_then(|record| record.motion_controller.as_ref())
    }

    pub fn motion_controller_mut(&mut self, scene_id: SceneId) -> Option<&mut MotionController> {
        self.record_by_id_mut(scene_id)
            .and_then(|record| record.motion_controller.as_mut())
    }

    pub fn graph_by_scene(&self, scene_id: SceneId) -> Option<&MovementGraph> {
        self.motion_controller(scene_id)
            .and_then(MotionController::as_graph)
    }

    pub fn compound_by_scene(&self, scene_id: SceneId) -> Option<&CompoundController> {
        self.motion_controller(scene_id)
            .and_then(MotionController::as_compound)
    }
}
