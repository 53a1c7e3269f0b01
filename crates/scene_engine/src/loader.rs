use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::content::{
    decode_scene_body, parse_scene_document, AnimatedDesc, ArchiveError, CompoundDesc,
    DocumentError, MovementDesc, SceneDescription, SceneDocument,
};
use crate::motion::{build_from_document, MotionPlanner};
use crate::registry::{SceneRegistry, SceneSource};
use crate::resources::{
    animated_prefix, phase_resource, picture_resource, statics_resource, tile_resource,
    ResourceError, ResourceProvider,
};
use crate::scene::{
    compose_backdrop, AnimatedObject, DynamicObjectSnapshot, DynamicPhase, EntranceDescriptor,
    Movement, MovementPhase, PictureObject, Scene, SceneId, Statics, TileInfo,
    EXTRA_FLAG_FORCE_VISIBLE, OBJECT_FLAG_VISIBLE,
};
use crate::snapshot::{apply_snapshots, capture_snapshots, ForeignOwners};

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("scene body {resource} describes scene {found}, expected {expected}")]
    SceneMismatch {
        resource: String,
        expected: SceneId,
        found: SceneId,
    },
}

/// Record-level data that arrives with a document-sourced scene.
struct DocumentExtras {
    entrances: Vec<EntranceDescriptor>,
    object_states: Vec<DynamicObjectSnapshot>,
    motion: Option<CompoundDesc>,
}

/// Builds and tears down live scenes for registry entries.
pub struct SceneLoader<'a> {
    resources: &'a dyn ResourceProvider,
    config: &'a EngineConfig,
}

impl<'a> SceneLoader<'a> {
    pub fn new(resources: &'a dyn ResourceProvider, config: &'a EngineConfig) -> Self {
        Self { resources, config }
    }

    /// Returns `Ok(false)` for an unknown scene or one without a source.
    /// Loading an already loaded scene is a no-op.
    pub fn load_scene(
        &self,
        registry: &mut SceneRegistry,
        scene_id: SceneId,
    ) -> Result<bool, SceneLoadError> {
        let Some(index) = registry.find_by_id(scene_id) else {
            debug!(scene_id = scene_id.0, "scene_load_unknown");
            return Ok(false);
        };
        let Some(record) = registry.record(index) else {
            return Ok(false);
        };
        if record.is_loaded() {
            return Ok(true);
        }

        let (mut scene, extras) = match &record.source {
            SceneSource::Document(name) => {
                let raw = self.resources.read_text(name)?;
                let document = parse_scene_document(Path::new(name), &raw)?;
                self.build_from_document(name, scene_id, document)?
            }
            SceneSource::Inline(document) => {
                self.build_from_document("<inline>", scene_id, document.as_ref().clone())?
            }
            SceneSource::Archive(name) => {
                let bytes = self.resources.read_bytes(name)?;
                let description = decode_scene_body(name, &bytes)?;
                if description.id != scene_id {
                    return Err(SceneLoadError::SceneMismatch {
                        resource: name.clone(),
                        expected: scene_id,
                        found: description.id,
                    });
                }
                (self.materialize(&description)?, None)
            }
            SceneSource::None => {
                warn!(scene_id = scene_id.0, "scene_load_no_source");
                return Ok(false);
            }
        };

        if let Some(extras) = extras {
            let motion = extras
                .motion
                .as_ref()
                .map(|desc| build_from_document(desc, self.config.grid));
            if let Some(record) = registry.record_mut(index) {
                record.entrances = extras.entrances;
                if !record.defaults_initialized {
                    record.default_snapshots = extras.object_states;
                }
            }
            if let Some(controller) = motion {
                registry.bind_motion_controller(index, controller);
            }
        }

        scene.init();

        if let Some(record) = registry.record_mut(index) {
            if !record.defaults_initialized {
                if record.default_snapshots.is_empty() {
                    record.default_snapshots = capture_snapshots(&scene, 0, 0);
                }
                record.defaults_initialized = true;
            }
        }

        let Some(record) = registry.record(index) else {
            return Ok(false);
        };
        let defaults = record.default_snapshots.clone();
        let current = record.current_snapshots.clone();
        let owners = ForeignOwners::collect(registry, scene_id, &defaults);
        apply_snapshots(&mut scene, &defaults, &owners);
        let owners = ForeignOwners::collect(registry, scene_id, &current);
        apply_snapshots(&mut scene, &current, &owners);

        if let Some(controller) = registry.motion_controller_mut(scene_id) {
            for object in scene.animated() {
                controller.attach_object(object.id);
            }
        }

        info!(
            scene_id = scene_id.0,
            pictures = scene.pictures().len(),
            animated = scene.animated().len(),
            restored = current.len(),
            "scene_loaded"
        );
        registry.attach_scene(index, scene);
        Ok(true)
    }

    /// Captures the current snapshot list before the live scene is dropped.
    /// The motion controller survives with its objects detached.
    pub fn unload_scene(&self, registry: &mut SceneRegistry, scene_id: SceneId) -> bool {
        let Some(index) = registry.find_by_id(scene_id) else {
            return false;
        };
        if !registry.is_loaded(scene_id) {
            debug!(scene_id = scene_id.0, "scene_unload_not_loaded");
            return false;
        }
        self.save_scene_snapshots(registry, scene_id);
        if let Some(controller) = registry.motion_controller_mut(scene_id) {
            controller.detach_all_objects();
        }
        let dropped = registry.detach_scene(index);
        info!(
            scene_id = scene_id.0,
            had_scene = dropped.is_some(),
            "scene_unloaded"
        );
        true
    }

    /// Replaces the current snapshot list of a loaded scene.
    pub fn save_scene_snapshots(&self, registry: &mut SceneRegistry, scene_id: SceneId) -> bool {
        let Some(scene) = registry.live_scene(scene_id) else {
            return false;
        };
        let snapshots = capture_snapshots(
            scene,
            self.config.snapshot_flags,
            self.config.snapshot_extra_flags,
        );
        let Some(record) = registry.record_by_id_mut(scene_id) else {
            return false;
        };
        debug!(
            scene_id = scene_id.0,
            count = snapshots.len(),
            "scene_snapshots_saved"
        );
        record.current_snapshots = snapshots;
        true
    }

    fn build_from_document(
        &self,
        resource: &str,
        scene_id: SceneId,
        document: SceneDocument,
    ) -> Result<(Scene, Option<DocumentExtras>), SceneLoadError> {
        if document.description.id != scene_id {
            return Err(SceneLoadError::SceneMismatch {
                resource: resource.to_string(),
                expected: scene_id,
                found: document.description.id,
            });
        }
        let scene = self.materialize(&document.description)?;
        Ok((
            scene,
            Some(DocumentExtras {
                entrances: document.entrances,
                object_states: document.object_states,
                motion: document.motion,
            }),
        ))
    }

    fn materialize(&self, description: &SceneDescription) -> Result<Scene, SceneLoadError> {
        let scene_id = description.id;
        let mut scene = Scene::new(scene_id, description.title.clone());
        scene.low_detail_id = description.low_detail_id;
        scene.parts_x = description.parts_x;
        scene.parts_y = description.parts_y;

        for desc in &description.pictures {
            let resource = picture_resource(scene_id, desc.id);
            let info = self.resources.probe_image(&resource)?;
            scene.push_picture(PictureObject {
                id: desc.id,
                position: desc.position,
                priority: desc.priority,
                flags: desc.flags,
                extra_flags: desc.extra_flags,
                alpha: desc.alpha,
                resource: Some(resource),
                width: info.width,
                height: info.height,
                ..PictureObject::default()
            });
        }

        for desc in &description.animated {
            scene.add_animated(self.materialize_animated(scene_id, desc)?);
        }

        for queue in &description.queues {
            scene.push_queue(queue.clone());
        }

        let tile_count = description.parts_x as usize * description.parts_y as usize;
        if tile_count > 0 {
            let mut tiles = Vec::with_capacity(tile_count);
            for index in 0..tile_count {
                let info = self.resources.probe_image(&tile_resource(scene_id, index))?;
                tiles.push(TileInfo {
                    width: info.width,
                    height: info.height,
                    format: info.format,
                });
            }
            let header = compose_backdrop(description.parts_x, description.parts_y, &tiles);
            debug!(
                scene_id = scene_id.0,
                width = header.width,
                height = header.height,
                format = header.format.0,
                "scene_backdrop_composed"
            );
            scene.background_tiles = tiles;
            scene.insert_backdrop(PictureObject::backdrop(header));
        }

        Ok(scene)
    }

    fn materialize_animated(
        &self,
        scene_id: SceneId,
        desc: &AnimatedDesc,
    ) -> Result<AnimatedObject, SceneLoadError> {
        let prefix = animated_prefix(scene_id, desc.id);
        let mut object = AnimatedObject::new(desc.id, scene_id);
        object.position = desc.position;
        object.priority = desc.priority;
        object.flags = desc.flags;
        object.extra_flags = desc.extra_flags;
        if desc.extra_flags & EXTRA_FLAG_FORCE_VISIBLE != 0 {
            object.flags |= OBJECT_FLAG_VISIBLE;
        }

        for statics in &desc.statics {
            let resource = statics_resource(&prefix, statics.id);
            self.resources.probe_image(&resource)?;
            object.statics.push(Statics {
                id: statics.id,
                title: statics.title.clone(),
                resource,
            });
        }
        object.current_statics = object.statics.first().map_or(0, |statics| statics.id);

        for movement in &desc.movements {
            object.movements.push(self.materialize_movement(&prefix, movement)?);
        }
        Ok(object)
    }

    /// The final authored phase is replaced by the movement's "next" pose.
    fn materialize_movement(
        &self,
        prefix: &str,
        desc: &MovementDesc,
    ) -> Result<Movement, SceneLoadError> {
        let last = desc.phases.len().checked_sub(1);
        let mut phases = Vec::with_capacity(desc.phases.len());
        for (index, phase) in desc.phases.iter().enumerate() {
            if Some(index) == last {
                phases.push(MovementPhase::Pose(desc.next_statics));
                continue;
            }
            let resource = phase_resource(prefix, desc.id, index);
            self.resources.probe_image(&resource)?;
            phases.push(MovementPhase::Dynamic(DynamicPhase {
                resource,
                countdown: phase.pause,
                command: phase.command.clone(),
            }));
        }
        if desc.declared_phases != desc.phases.len() {
            debug!(
                movement_id = desc.id,
                declared = desc.declared_phases,
                found = desc.phases.len(),
                "movement_phase_count_mismatch"
            );
        }

        Ok(Movement {
            id: desc.id,
            title: desc.title.clone(),
            prev_statics: (desc.prev_statics != 0).then_some(desc.prev_statics),
            next_statics: (desc.next_statics != 0).then_some(desc.next_statics),
            prev_step: desc.prev_step,
            next_step: desc.next_step,
            loop_delay: desc.loop_delay,
            auto_phase: desc.use_auto,
            frame_offsets: desc.phases.iter().map(|phase| phase.step).collect(),
            phases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PictureDesc, StaticsDesc};
    use crate::resources::{ImageInfo, MemoryResources};
    use crate::scene::{PixelFormat, Point, KIND_ANIMATED, KIND_PICTURE};

    fn image(format: PixelFormat) -> ImageInfo {
        ImageInfo {
            width: 400,
            height: 300,
            format,
        }
    }

    const SCENE_XML: &str = r#"<SCENE id="301" title="Pier" nPartsX="2" nPartsY="1">
        <PICTURE Id="11" x="10" y="20" wFlags="4"/>
        <ANI Id="50" x="5" y="6" dwExFlags="0x10080">
            <STATICS id="500" title="stand"/>
            <STATICS id="502" title="sit"/>
            <MOVEMENT id="600" nIdPrev="500" nIdNext="502" dwNumPhases="2">
                <PHASE csStep.x="1" csStep.y="0" iPouse="0"/>
                <PHASE csStep.x="2" csStep.y="0" iPouse="0"/>
            </MOVEMENT>
        </ANI>
        <ENTRANCE nIdScene="301" nIdHind="7" nIdQueue="900"/>
        <QUEUE id="900"><COMMAND iId="1" iNum="3"/></QUEUE>
        <MCTLCOMPOUND nNumChildren="1">
            <MCTLGRID/>
        </MCTLCOMPOUND>
    </SCENE>"#;

    fn resources(tile_format: PixelFormat) -> MemoryResources {
        let mut resources = MemoryResources::new();
        resources.insert_text("sc301.xml", SCENE_XML);
        let id = SceneId(301);
        resources.insert_image(picture_resource(id, 11), image(PixelFormat::RGB565));
        let prefix = animated_prefix(id, 50);
        resources.insert_image(statics_resource(&prefix, 500), image(PixelFormat::RGB565));
        resources.insert_image(statics_resource(&prefix, 502), image(PixelFormat::RGB565));
        resources.insert_image(phase_resource(&prefix, 600, 0), image(PixelFormat::RGB565));
        resources.insert_image(tile_resource(id, 0), image(PixelFormat::RGB565));
        resources.insert_image(tile_resource(id, 1), image(tile_format));
        resources
    }

    fn registry() -> SceneRegistry {
        let mut registry = SceneRegistry::new();
        registry.register(SceneId(301), "Pier", SceneSource::Document("sc301.xml".into()));
        registry
    }

    #[test]
    fn document_scene_materializes_in_order_with_backdrop() {
        let resources = resources(PixelFormat::RGB565);
        let config = EngineConfig::default();
        let loader = SceneLoader::new(&resources, &config);
        let mut registry = registry();

        assert!(loader.load_scene(&mut registry, SceneId(301)).expect("load"));
        let scene = registry.live_scene(SceneId(301)).expect("live");
        let backdrop = &scene.pictures()[0];
        assert!(backdrop.is_backdrop());
        assert_eq!(backdrop.width, 800);
        assert_eq!(backdrop.bitmap.map(|header| header.format), Some(PixelFormat::RGB565));
        assert_eq!(scene.pictures()[1].id, 11);

        let ani = scene.animated_by_id(50, Some(0)).expect("ani");
        assert_ne!(ani.flags & OBJECT_FLAG_VISIBLE, 0);
        let movement = ani.movement(600).expect("movement");
        assert_eq!(movement.phases.last(), Some(&MovementPhase::Pose(502)));
        assert_eq!(movement.frame_offsets, vec![Point::new(1, 0), Point::new(2, 0)]);
        assert!(scene.queue_by_id(900).is_some());

        let record = registry.record_by_id(SceneId(301)).expect("record");
        assert_eq!(record.entrances.len(), 1);
        assert!(record.defaults_initialized);
        let controller = registry.compound_by_scene(SceneId(301)).expect("compound");
        assert_eq!(controller.attached_objects(), &[50]);
    }

    #[test]
    fn high_bit_depth_tile_promotes_backdrop() {
        let resources = resources(PixelFormat::ARGB8008);
        let config = EngineConfig::default();
        let loader = SceneLoader::new(&resources, &config);
        let mut registry = registry();
        assert!(loader.load_scene(&mut registry, SceneId(301)).expect("load"));
        let scene = registry.live_scene(SceneId(301)).expect("live");
        assert_eq!(
            scene.pictures()[0].bitmap.map(|header| header.format),
            Some(PixelFormat::ARGB8888)
        );
    }

    #[test]
    fn unknown_or_sourceless_scene_reports_false() {
        let resources = MemoryResources::new();
        let config = EngineConfig::default();
        let loader = SceneLoader::new(&resources, &config);
        let mut registry = SceneRegistry::new();
        registry.register(SceneId(2), "", SceneSource::None);
        assert!(!loader.load_scene(&mut registry, SceneId(1)).expect("unknown"));
        assert!(!loader.load_scene(&mut registry, SceneId(2)).expect("no source"));
        assert!(!registry.is_loaded(SceneId(2)));
    }

    #[test]
    fn missing_picture_resource_is_a_hard_failure() {
        let mut resources = resources(PixelFormat::RGB565);
        resources.insert_text(
            "sc301.xml",
            r#"<SCENE id="301"><PICTURE Id="12"/></SCENE>"#,
        );
        let config = EngineConfig::default();
        let loader = SceneLoader::new(&resources, &config);
        let mut registry = registry();
        let err = loader
            .load_scene(&mut registry, SceneId(301))
            .expect_err("missing");
        assert!(matches!(err, SceneLoadError::Resource(ResourceError::Missing { .. })));
        assert!(!registry.is_loaded(SceneId(301)));
    }

    #[test]
    fn unload_then_reload_restores_captured_state() {
        let resources = resources(PixelFormat::RGB565);
        let config = EngineConfig::default();
        let loader = SceneLoader::new(&resources, &config);
        let mut registry = registry();
        assert!(loader.load_scene(&mut registry, SceneId(301)).expect("load"));

        {
            let scene = registry.live_scene_mut(SceneId(301)).expect("live");
            let ani = scene.animated_by_id_mut(50, Some(0)).expect("ani");
            ani.position = Point::new(120, 130);
            ani.current_statics = 502;
            assert!(ani.start_movement(600));
            ani.phase_index = 1;
        }

        assert!(loader.unload_scene(&mut registry, SceneId(301)));
        assert!(!registry.is_loaded(SceneId(301)));
        let record = registry.record_by_id(SceneId(301)).expect("record");
        let saved = record
            .current_snapshots
            .iter()
            .find(|snapshot| snapshot.object_id == 50)
            .expect("captured");
        assert_eq!(saved.kind, KIND_ANIMATED);
        assert!(registry
            .compound_by_scene(SceneId(301))
            .map_or(false, |controller| controller.attached_objects().is_empty()));

        assert!(loader.load_scene(&mut registry, SceneId(301)).expect("reload"));
        let ani = registry
            .live_scene(SceneId(301))
            .and_then(|scene| scene.animated_by_id(50, Some(0)))
            .expect("ani");
        assert_eq!(ani.position, Point::new(120, 130));
        assert_eq!(ani.current_statics, 502);
        assert_eq!(ani.current_movement, 600);
        assert_eq!(ani.phase_index, 1);
    }

    #[test]
    fn unloading_twice_reports_failure() {
        let resources = resources(PixelFormat::RGB565);
        let config = EngineConfig::default();
        let loader = SceneLoader::new(&resources, &config);
        let mut registry = registry();
        assert!(loader.load_scene(&mut registry, SceneId(301)).expect("load"));
        assert!(loader.unload_scene(&mut registry, SceneId(301)));
        assert!(!loader.unload_scene(&mut registry, SceneId(301)));
        assert!(!loader.unload_scene(&mut registry, SceneId(999)));
    }

    #[test]
    fn current_snapshots_override_defaults() {
        let mut resources = MemoryResources::new();
        let body = SceneDescription {
            id: SceneId(4),
            pictures: vec![PictureDesc {
                id: 1,
                ..PictureDesc::default()
            }],
            animated: vec![AnimatedDesc {
                id: 9,
                statics: vec![StaticsDesc {
                    id: 90,
                    title: "idle".into(),
                }],
                ..AnimatedDesc::default()
            }],
            ..SceneDescription::default()
        };
        let bytes = crate::content::encode_scene_body(&body).expect("encode");
        resources.insert_bytes("0004.sce", bytes);
        resources.insert_image(picture_resource(SceneId(4), 1), image(PixelFormat::RGB565));
        resources.insert_image(
            statics_resource(&animated_prefix(SceneId(4), 9), 90),
            image(PixelFormat::RGB565),
        );

        let config = EngineConfig::default();
        let loader = SceneLoader::new(&resources, &config);
        let mut registry = SceneRegistry::new();
        let index = registry.register(SceneId(4), "", SceneSource::Archive("0004.sce".into()));
        let record = registry.record_mut(index).expect("record");
        record.default_snapshots = vec![DynamicObjectSnapshot {
            kind: KIND_PICTURE,
            object_id: 1,
            x: 5,
            ..DynamicObjectSnapshot::default()
        }];
        record.current_snapshots = vec![DynamicObjectSnapshot {
            kind: KIND_PICTURE,
            object_id: 1,
            x: 8,
            ..DynamicObjectSnapshot::default()
        }];

        assert!(loader.load_scene(&mut registry, SceneId(4)).expect("load"));
        let scene = registry.live_scene(SceneId(4)).expect("live");
        assert_eq!(scene.picture_by_id(1, 0).map(|picture| picture.position.x), Some(8));
        assert_eq!(scene.animated_by_id(9, None).map(|ani| ani.current_statics), Some(90));
    }
}
