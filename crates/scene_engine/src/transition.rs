use tracing::{debug, info, warn};

use crate::host::{Host, PreloadProgress, LAST_ENTRANCE_VAR, SAVEGAME_PATH};
use crate::loader::SceneLoadError;
use crate::manager::SceneManager;
use crate::scene::{
    Command, PreloadRequest, SceneId, OBJECT_FLAG_HIDDEN_ON_ENTRY, QUEUE_FLAG_ON_TRANSITION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    /// A preload was requested once and waits for its confirming repeat.
    Pending { scene_id: SceneId, param: i32 },
    Swapping(PreloadRequest),
    Settled { destination: SceneId },
}

/// Last pointer input seen by the scene; cleared on every scene switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingInput {
    pub object_id: i32,
    pub x: i32,
    pub y: i32,
}

impl Default for PendingInput {
    fn default() -> Self {
        Self {
            object_id: 0,
            x: -1,
            y: -1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitionCoordinator {
    pub(crate) state: TransitionState,
    pub(crate) preload_items: Vec<PreloadRequest>,
    pub(crate) current_scene: Option<SceneId>,
    pub(crate) pending_input: PendingInput,
    pub(crate) tick_counter: u64,
}

impl SceneManager {
    pub fn transition_state(&self) -> TransitionState {
        self.transition.state
    }

    pub fn preload_items(&self) -> &[PreloadRequest] {
        &self.transition.preload_items
    }

    pub fn pending_input(&self) -> PendingInput {
        self.transition.pending_input
    }

    pub fn set_pending_input(&mut self, input: PendingInput) {
        self.transition.pending_input = input;
    }

    pub fn tick_counter(&self) -> u64 {
        self.transition.tick_counter
    }

    pub fn add_preload_item(&mut self, request: PreloadRequest) {
        self.transition.preload_items.push(request);
    }

    /// The first request for a pair only records it; a repeat of the same
    /// pending pair performs the swap. A different pair supersedes the
    /// pending one.
    pub fn preload_scene(
        &mut self,
        host: &mut Host<'_>,
        scene_id: SceneId,
        param: i32,
    ) -> Result<bool, SceneLoadError> {
        let confirmed = matches!(
            self.transition.state,
            TransitionState::Pending { scene_id: pending, param: pending_param }
                if pending == scene_id && pending_param == param
        );
        if !confirmed {
            self.transition.state = TransitionState::Pending { scene_id, param };
            debug!(scene_id = scene_id.0, param, "preload_pending");
            return Ok(true);
        }

        let Some(request) = self
            .transition
            .preload_items
            .iter()
            .find(|item| item.matches(scene_id, param))
            .copied()
        else {
            self.transition.state = TransitionState::Idle;
            warn!(scene_id = scene_id.0, param, "preload_unmatched");
            return Ok(false);
        };

        if !host.hooks.preload_progress(&request, PreloadProgress::Begin) {
            debug!(scene_id = scene_id.0, param, "preload_deferred");
            return Ok(false);
        }
        if let Some(loader_scene) = self.config.loader_scene_id {
            if loader_scene != scene_id && !self.load_scene(loader_scene)? {
                warn!(loader_scene = loader_scene.0, "loader_scene_unavailable");
            }
        }
        self.transition.state = TransitionState::Swapping(request);

        if self.transition.current_scene == Some(scene_id) {
            self.transition.current_scene = None;
        }
        self.save_scene_snapshots(scene_id);
        host.commands.clear_transition_backlog();
        self.unload_scene(scene_id);

        match self.load_scene(request.destination) {
            Ok(true) => {}
            Ok(false) => warn!(
                destination = request.destination.0,
                "preload_destination_unavailable"
            ),
            Err(err) => {
                self.transition.state = TransitionState::Idle;
                return Err(err);
            }
        }
        host.hooks.preload_progress(&request, PreloadProgress::Halfway);

        host.commands
            .post(Command::goto_scene(request.destination.0, request.param));
        self.transition.state = TransitionState::Settled {
            destination: request.destination,
        };

        host.hooks.preload_progress(&request, PreloadProgress::Complete);
        self.transition.state = TransitionState::Idle;
        info!(
            from = scene_id.0,
            to = request.destination.0,
            param = request.param,
            "preload_completed"
        );
        Ok(true)
    }

    /// Makes a loaded scene current through one of its entrances. Every
    /// failure leaves the current scene and game state as they were.
    pub fn goto_scene(&mut self, host: &mut Host<'_>, scene_id: SceneId, entrance_id: i32) -> bool {
        let Some(record) = self.registry.record_by_id(scene_id) else {
            debug!(scene_id = scene_id.0, "goto_unknown_scene");
            return false;
        };
        if !record.is_loaded() {
            debug!(scene_id = scene_id.0, "goto_scene_not_loaded");
            return false;
        }
        if record.entrances.is_empty() {
            self.transition.current_scene = Some(scene_id);
            info!(scene_id = scene_id.0, "scene_entered_without_entrance");
            return true;
        }

        let entrance_index = match self.config.entrance_override(scene_id) {
            Some(index) => index,
            None => match record
                .entrances
                .iter()
                .position(|entrance| entrance.hint_id == entrance_id)
            {
                Some(index) => index,
                None => {
                    debug!(scene_id = scene_id.0, entrance_id, "goto_entrance_unmatched");
                    return false;
                }
            },
        };
        let Some(entrance) = record.entrances.get(entrance_index).cloned() else {
            return false;
        };

        let previous_entrance = host.game_state.get_int(SAVEGAME_PATH, LAST_ENTRANCE_VAR);
        host.game_state
            .set_int(SAVEGAME_PATH, LAST_ENTRANCE_VAR, entrance_id);
        let restore_entrance_var = |host: &mut Host<'_>| match previous_entrance {
            Some(value) => host.game_state.set_int(SAVEGAME_PATH, LAST_ENTRANCE_VAR, value),
            None => host.game_state.remove(SAVEGAME_PATH, LAST_ENTRANCE_VAR),
        };

        if !host.hooks.scene_switch(&entrance) {
            restore_entrance_var(host);
            info!(scene_id = scene_id.0, entrance_id, "scene_switch_vetoed");
            return false;
        }

        let anchor_id = self.anchor_object_id;
        let Some(scene) = self.registry.live_scene_mut(scene_id) else {
            restore_entrance_var(host);
            return false;
        };
        match scene.queue_by_id(entrance.queue_id).cloned() {
            Some(mut queue) => {
                let has_anchor = scene.animated_by_id(anchor_id, None).is_some();
                if has_anchor {
                    queue.push_command(Command::restore_visibility(
                        anchor_id,
                        OBJECT_FLAG_HIDDEN_ON_ENTRY,
                    ));
                }
                queue.flags |= QUEUE_FLAG_ON_TRANSITION;
                let queue_id = queue.id;
                if !host.commands.chain(queue) {
                    restore_entrance_var(host);
                    warn!(scene_id = scene_id.0, queue_id, "entrance_queue_rejected");
                    return false;
                }
                if let Some(anchor) = scene.animated_by_id_mut(anchor_id, None) {
                    anchor.flags &= OBJECT_FLAG_HIDDEN_ON_ENTRY;
                }
            }
            None => {
                if let Some(anchor) = scene.animated_by_id_mut(anchor_id, None) {
                    anchor.flags &= !OBJECT_FLAG_HIDDEN_ON_ENTRY;
                }
            }
        }

        self.transition.pending_input = PendingInput::default();
        self.transition.current_scene = Some(scene_id);
        info!(
            scene_id = scene_id.0,
            entrance_id,
            queue_id = entrance.queue_id,
            "scene_entered"
        );
        true
    }

    /// Advances the current scene, drains messages and drives a pending
    /// preload one step.
    pub fn update_systems(&mut self, host: &mut Host<'_>, delta_ms: u32) -> Result<(), SceneLoadError> {
        if let Some(scene_id) = self.transition.current_scene {
            if let Some(scene) = self.registry.live_scene_mut(scene_id) {
                scene.update(delta_ms);
                self.transition.tick_counter += 1;
                host.commands.post(Command::scene_tick());
            }
        }

        host.commands.process_messages();

        if let TransitionState::Pending { scene_id, param } = self.transition.state {
            host.commands.process_messages();
            self.preload_scene(host, scene_id, param)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::host::{CommandQueue, GameStateStore, GameVarStore, RecordingHooks};
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::content::{encode_scene_body, scene_body_name, SceneDescription};
    use crate::host::TransitionHooks;
    use crate::registry::SceneSource;
    use crate::resources::{MemoryResources, ResourceError, ResourceProvider};
    use crate::scene::{
        AnimatedObject, EntranceDescriptor, MessageQueue, PictureObject, Scene,
        COMMAND_FLAG_NAVIGATION, EXTRA_FLAG_PERSISTENT, MSG_KIND_SET_FLAGS, MSG_NUM_GOTO_SCENE,
        MSG_NUM_SCENE_TICK, OBJECT_FLAG_VISIBLE,
    };

    const ANCHOR: i32 = 500;

    struct Collaborators {
        commands: CommandQueue,
        vars: GameVarStore,
        hooks: RecordingHooks,
    }

    impl Collaborators {
        fn new() -> Self {
            Self {
                commands: CommandQueue::new(),
                vars: GameVarStore::new(),
                hooks: RecordingHooks::default(),
            }
        }

        fn host(&mut self) -> Host<'_> {
            Host::new(&mut self.commands, &mut self.vars, &mut self.hooks)
        }
    }

    fn scene_with_anchor(scene_id: SceneId) -> Scene {
        let mut scene = Scene::new(scene_id, "test");
        scene.push_picture(PictureObject {
            id: 1,
            extra_flags: EXTRA_FLAG_PERSISTENT,
            ..PictureObject::default()
        });
        let mut anchor = AnimatedObject::new(ANCHOR, scene_id);
        anchor.flags = OBJECT_FLAG_VISIBLE | OBJECT_FLAG_HIDDEN_ON_ENTRY;
        anchor.extra_flags = EXTRA_FLAG_PERSISTENT;
        scene.add_animated(anchor);
        scene.push_queue(MessageQueue {
            id: 900,
            flags: 0,
            commands: vec![Command::new(0, 1, 5)],
        });
        scene
    }

    /// Scenes adopted live so no resources are needed.
    fn manager_with_live(scene_ids: &[i32]) -> SceneManager {
        manager_with(Box::new(MemoryResources::new()), scene_ids)
    }

    fn manager_with(resources: Box<dyn ResourceProvider>, scene_ids: &[i32]) -> SceneManager {
        let config = EngineConfig {
            anchor_object_id: ANCHOR,
            ..EngineConfig::default()
        };
        let mut manager = SceneManager::new(resources, config);
        for id in scene_ids {
            manager
                .registry_mut()
                .create_missing(scene_with_anchor(SceneId(*id)));
        }
        manager
    }

    /// Resources holding an empty archived body for `scene_id`.
    fn archived_body(scene_id: i32) -> MemoryResources {
        let mut resources = MemoryResources::new();
        let body = SceneDescription {
            id: SceneId(scene_id),
            title: "destination".to_string(),
            ..SceneDescription::default()
        };
        resources.insert_bytes(
            scene_body_name(SceneId(scene_id)),
            encode_scene_body(&body).expect("encode"),
        );
        resources
    }

    fn register_archived(manager: &mut SceneManager, scene_id: i32) {
        manager.registry_mut().register(
            SceneId(scene_id),
            "destination",
            SceneSource::Archive(scene_body_name(SceneId(scene_id))),
        );
    }

    fn swap_request() -> PreloadRequest {
        PreloadRequest {
            trigger_scene: SceneId(42),
            trigger_param: 7,
            destination: SceneId(43),
            param: 2,
        }
    }

    type EventLog = Rc<RefCell<Vec<String>>>;

    struct LoggedResources {
        inner: MemoryResources,
        log: EventLog,
    }

    impl ResourceProvider for LoggedResources {
        fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
            self.log.borrow_mut().push(format!("read {name}"));
            self.inner.read_bytes(name)
        }
    }

    struct LoggedHooks {
        log: EventLog,
    }

    impl TransitionHooks for LoggedHooks {
        fn preload_progress(&mut self, _request: &PreloadRequest, progress: PreloadProgress) -> bool {
            self.log
                .borrow_mut()
                .push(format!("progress {}", progress.percent()));
            true
        }
    }

    fn add_entrances(manager: &mut SceneManager, scene_id: i32, entrances: &[(i32, i32)]) {
        let record = manager
            .registry_mut()
            .record_by_id_mut(SceneId(scene_id))
            .expect("record");
        record.entrances = entrances
            .iter()
            .map(|(hint_id, queue_id)| EntranceDescriptor {
                scene_id: SceneId(scene_id),
                hint_id: *hint_id,
                queue_id: *queue_id,
                ..EntranceDescriptor::default()
            })
            .collect();
    }

    fn anchor_flags(manager: &SceneManager, scene_id: i32) -> u32 {
        manager
            .registry()
            .live_scene(SceneId(scene_id))
            .and_then(|scene| scene.animated_by_id(ANCHOR, None))
            .map_or(0, |anchor| anchor.flags)
    }

    #[test]
    fn goto_without_entrances_always_succeeds() {
        let mut manager = manager_with_live(&[1]);
        let mut collab = Collaborators::new();
        assert!(manager.goto_scene(&mut collab.host(), SceneId(1), 12345));
        assert_eq!(manager.current_scene(), Some(SceneId(1)));
        assert!(collab.hooks.switches.is_empty());
    }

    #[test]
    fn goto_requires_loaded_scene() {
        let mut manager = manager_with_live(&[]);
        manager
            .registry_mut()
            .register(SceneId(2), "", SceneSource::None);
        let mut collab = Collaborators::new();
        assert!(!manager.goto_scene(&mut collab.host(), SceneId(2), 0));
        assert!(!manager.goto_scene(&mut collab.host(), SceneId(3), 0));
        assert_eq!(manager.current_scene(), None);
    }

    #[test]
    fn goto_chains_marked_queue_with_anchor_restore() {
        let mut manager = manager_with_live(&[1]);
        add_entrances(&mut manager, 1, &[(3, 0), (7, 900)]);
        manager.set_pending_input(PendingInput {
            object_id: 9,
            x: 10,
            y: 20,
        });
        let mut collab = Collaborators::new();

        assert!(manager.goto_scene(&mut collab.host(), SceneId(1), 7));
        assert_eq!(manager.current_scene(), Some(SceneId(1)));
        assert_eq!(manager.pending_input(), PendingInput::default());
        assert_eq!(
            collab.vars.get_int(SAVEGAME_PATH, LAST_ENTRANCE_VAR),
            Some(7)
        );
        assert_eq!(collab.hooks.switches[0].hint_id, 7);

        let queue = &collab.commands.chained[0];
        assert_eq!(queue.id, 900);
        assert!(queue.is_on_transition());
        let restore = queue.commands.last().expect("restore command");
        assert_eq!(restore.kind, MSG_KIND_SET_FLAGS);
        assert_eq!(restore.parent_id, ANCHOR);
        assert_eq!(anchor_flags(&manager, 1), OBJECT_FLAG_HIDDEN_ON_ENTRY);
    }

    #[test]
    fn entrance_without_queue_clears_hidden_flag() {
        let mut manager = manager_with_live(&[1]);
        add_entrances(&mut manager, 1, &[(3, 0)]);
        let mut collab = Collaborators::new();
        assert!(manager.goto_scene(&mut collab.host(), SceneId(1), 3));
        assert!(collab.commands.chained.is_empty());
        assert_eq!(anchor_flags(&manager, 1), OBJECT_FLAG_VISIBLE);
    }

    #[test]
    fn unmatched_entrance_fails() {
        let mut manager = manager_with_live(&[1]);
        add_entrances(&mut manager, 1, &[(3, 0)]);
        let mut collab = Collaborators::new();
        assert!(!manager.goto_scene(&mut collab.host(), SceneId(1), 4));
        assert_eq!(manager.current_scene(), None);
        assert_eq!(collab.vars.get_int(SAVEGAME_PATH, LAST_ENTRANCE_VAR), None);
    }

    #[test]
    fn override_scene_accepts_first_entrance_for_any_id() {
        let mut manager = manager_with_live(&[726]);
        add_entrances(&mut manager, 726, &[(3, 0), (4, 0)]);
        let mut collab = Collaborators::new();
        assert!(manager.goto_scene(&mut collab.host(), SceneId(726), 99));
        assert_eq!(collab.hooks.switches[0].hint_id, 3);
    }

    #[test]
    fn rejected_chain_leaves_state_untouched() {
        let mut manager = manager_with_live(&[1, 2]);
        add_entrances(&mut manager, 2, &[(7, 900)]);
        let mut collab = Collaborators::new();
        assert!(manager.goto_scene(&mut collab.host(), SceneId(1), 0));
        collab.vars.set_int(SAVEGAME_PATH, LAST_ENTRANCE_VAR, 1);
        collab.commands.reject_chains = true;

        assert!(!manager.goto_scene(&mut collab.host(), SceneId(2), 7));
        assert_eq!(manager.current_scene(), Some(SceneId(1)));
        assert_eq!(
            collab.vars.get_int(SAVEGAME_PATH, LAST_ENTRANCE_VAR),
            Some(1)
        );
        assert_eq!(
            anchor_flags(&manager, 2),
            OBJECT_FLAG_VISIBLE | OBJECT_FLAG_HIDDEN_ON_ENTRY
        );
    }

    #[test]
    fn vetoed_switch_fails_cleanly() {
        let mut manager = manager_with_live(&[1]);
        add_entrances(&mut manager, 1, &[(7, 900)]);
        let mut collab = Collaborators::new();
        collab.hooks.veto_switch = true;
        assert!(!manager.goto_scene(&mut collab.host(), SceneId(1), 7));
        assert_eq!(manager.current_scene(), None);
        assert!(collab.commands.chained.is_empty());
    }

    #[test]
    fn first_preload_only_records_pending_pair() {
        let mut manager = manager_with_live(&[42]);
        let mut collab = Collaborators::new();
        assert!(manager
            .preload_scene(&mut collab.host(), SceneId(42), 7)
            .expect("preload"));
        assert_eq!(
            manager.transition_state(),
            TransitionState::Pending {
                scene_id: SceneId(42),
                param: 7
            }
        );
        assert!(manager.registry().is_loaded(SceneId(42)));
        assert!(collab.commands.posted.is_empty());

        assert!(manager
            .preload_scene(&mut collab.host(), SceneId(42), 8)
            .expect("supersede"));
        assert_eq!(
            manager.transition_state(),
            TransitionState::Pending {
                scene_id: SceneId(42),
                param: 8
            }
        );
    }

    #[test]
    fn confirmed_preload_without_match_fails_and_keeps_current_scene() {
        let mut manager = manager_with_live(&[42]);
        let mut collab = Collaborators::new();
        assert!(manager.goto_scene(&mut collab.host(), SceneId(42), 0));
        assert!(manager.preload_scene(&mut collab.host(), SceneId(42), 7).expect("first"));
        assert!(!manager.preload_scene(&mut collab.host(), SceneId(42), 7).expect("second"));
        assert_eq!(manager.transition_state(), TransitionState::Idle);
        assert_eq!(manager.current_scene(), Some(SceneId(42)));
        assert!(manager.registry().is_loaded(SceneId(42)));
    }

    #[test]
    fn confirmed_preload_swaps_scenes_and_posts_navigation() {
        let mut manager = manager_with(Box::new(archived_body(43)), &[42]);
        register_archived(&mut manager, 43);
        manager.add_preload_item(swap_request());
        let mut collab = Collaborators::new();
        assert!(manager.goto_scene(&mut collab.host(), SceneId(42), 0));
        assert!(!manager.registry().is_loaded(SceneId(43)));

        assert!(manager.preload_scene(&mut collab.host(), SceneId(42), 7).expect("first"));
        assert!(manager.preload_scene(&mut collab.host(), SceneId(42), 7).expect("second"));

        assert_eq!(manager.transition_state(), TransitionState::Idle);
        assert_eq!(manager.current_scene(), None);
        assert!(!manager.registry().is_loaded(SceneId(42)));
        assert!(manager.registry().is_loaded(SceneId(43)));
        let saved = manager.current_snapshots(SceneId(42)).expect("record");
        assert_eq!(saved.len(), 2);
        assert_eq!(collab.commands.backlog_clears, 1);

        let progress: Vec<u8> = collab
            .hooks
            .progress
            .iter()
            .map(|(_, progress)| progress.percent())
            .collect();
        assert_eq!(progress, vec![0, 50, 100]);

        let navigation = collab.commands.posted.last().expect("navigation");
        assert_eq!(navigation.message_num, MSG_NUM_GOTO_SCENE);
        assert_eq!(navigation.parent_id, 43);
        assert_eq!(navigation.param, 2);
        assert_eq!(navigation.flags, COMMAND_FLAG_NAVIGATION);
    }

    #[test]
    fn halfway_progress_follows_destination_load() {
        let log = EventLog::default();
        let resources = LoggedResources {
            inner: archived_body(43),
            log: Rc::clone(&log),
        };
        let mut manager = manager_with(Box::new(resources), &[42]);
        register_archived(&mut manager, 43);
        manager.add_preload_item(swap_request());

        let mut commands = CommandQueue::new();
        let mut vars = GameVarStore::new();
        let mut hooks = LoggedHooks {
            log: Rc::clone(&log),
        };
        let mut host = Host::new(&mut commands, &mut vars, &mut hooks);
        assert!(manager.preload_scene(&mut host, SceneId(42), 7).expect("first"));
        assert!(manager.preload_scene(&mut host, SceneId(42), 7).expect("second"));

        assert_eq!(
            *log.borrow(),
            vec!["progress 0", "read 0043.sce", "progress 50", "progress 100"]
        );
    }

    #[test]
    fn vetoed_preload_begin_stays_pending_until_next_frame() {
        let mut manager = manager_with(Box::new(archived_body(43)), &[42]);
        register_archived(&mut manager, 43);
        manager.add_preload_item(swap_request());
        let mut collab = Collaborators::new();
        collab.hooks.veto_preload = true;
        assert!(manager.preload_scene(&mut collab.host(), SceneId(42), 7).expect("first"));
        assert!(!manager.preload_scene(&mut collab.host(), SceneId(42), 7).expect("vetoed"));
        assert!(matches!(
            manager.transition_state(),
            TransitionState::Pending { .. }
        ));
        assert!(manager.registry().is_loaded(SceneId(42)));
        assert!(!manager.registry().is_loaded(SceneId(43)));

        collab.hooks.veto_preload = false;
        manager.update_systems(&mut collab.host(), 16).expect("update");
        assert_eq!(manager.transition_state(), TransitionState::Idle);
        assert!(!manager.registry().is_loaded(SceneId(42)));
        assert!(manager.registry().is_loaded(SceneId(43)));
    }

    #[test]
    fn update_systems_ticks_current_scene() {
        let mut manager = manager_with_live(&[1]);
        let mut collab = Collaborators::new();
        manager.update_systems(&mut collab.host(), 16).expect("idle update");
        assert!(collab.commands.posted.is_empty());
        assert_eq!(collab.commands.process_passes, 1);

        assert!(manager.goto_scene(&mut collab.host(), SceneId(1), 0));
        manager.update_systems(&mut collab.host(), 16).expect("update");
        assert_eq!(manager.tick_counter(), 1);
        assert_eq!(
            collab.commands.posted.last().map(|command| command.message_num),
            Some(MSG_NUM_SCENE_TICK)
        );
        assert_eq!(
            manager.current_scene_ref().map(Scene::elapsed_ms),
            Some(16)
        );
    }
}
