//! Collaborators the scene manager drives but does not implement: the command
//! executor, the game-state variable store and the transition hooks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scene::{Command, EntranceDescriptor, MessageQueue, PreloadRequest};

pub const SAVEGAME_PATH: &[&str] = &["OBJSTATES", "SAVEGAME"];
pub const LAST_ENTRANCE_VAR: &str = "Entrance";

pub trait CommandSink {
    fn post(&mut self, command: Command);
    /// Hands a cloned queue to the executor. `false` rejects it.
    fn chain(&mut self, queue: MessageQueue) -> bool;
    /// Drops queues still waiting from a scene that is being swapped out.
    fn clear_transition_backlog(&mut self);
    fn process_messages(&mut self);
}

pub trait GameStateStore {
    fn get_int(&self, path: &[&str], name: &str) -> Option<i32>;
    fn set_int(&mut self, path: &[&str], name: &str, value: i32);
    fn remove(&mut self, path: &[&str], name: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadProgress {
    Begin,
    Halfway,
    Complete,
}

impl PreloadProgress {
    pub fn percent(self) -> u8 {
        match self {
            Self::Begin => 0,
            Self::Halfway => 50,
            Self::Complete => 100,
        }
    }
}

pub trait TransitionHooks {
    /// Returning `false` at `Begin` defers the swap; later results are ignored.
    fn preload_progress(&mut self, _request: &PreloadRequest, _progress: PreloadProgress) -> bool {
        true
    }

    /// Returning `false` vetoes the scene switch.
    fn scene_switch(&mut self, _entrance: &EntranceDescriptor) -> bool {
        true
    }
}

/// Borrowed collaborators for one manager call.
pub struct Host<'a> {
    pub commands: &'a mut dyn CommandSink,
    pub game_state: &'a mut dyn GameStateStore,
    pub hooks: &'a mut dyn TransitionHooks,
}

impl<'a> Host<'a> {
    pub fn new(
        commands: &'a mut dyn CommandSink,
        game_state: &'a mut dyn GameStateStore,
        hooks: &'a mut dyn TransitionHooks,
    ) -> Self {
        Self {
            commands,
            game_state,
            hooks,
        }
    }
}

/// Command sink that records everything it is given.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pub posted: Vec<Command>,
    pub chained: Vec<MessageQueue>,
    pub reject_chains: bool,
    pub backlog_clears: usize,
    pub process_passes: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandSink for CommandQueue {
    fn post(&mut self, command: Command) {
        self.posted.push(command);
    }

    fn chain(&mut self, queue: MessageQueue) -> bool {
        if self.reject_chains {
            return false;
        }
        self.chained.push(queue);
        true
    }

    fn clear_transition_backlog(&mut self) {
        self.chained.retain(|queue| !queue.is_on_transition());
        self.backlog_clears += 1;
    }

    fn process_messages(&mut self) {
        self.process_passes += 1;
    }
}

/// Flat integer variables keyed by `/`-joined path and name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameVarStore {
    vars: BTreeMap<String, i32>,
}

impl GameVarStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &[&str], name: &str) -> String {
        let mut key = path.join("/");
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(name);
        key
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.vars.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

impl GameStateStore for GameVarStore {
    fn get_int(&self, path: &[&str], name: &str) -> Option<i32> {
        self.vars.get(&Self::key(path, name)).copied()
    }

    fn set_int(&mut self, path: &[&str], name: &str, value: i32) {
        self.vars.insert(Self::key(path, name), value);
    }

    fn remove(&mut self, path: &[&str], name: &str) {
        self.vars.remove(&Self::key(path, name));
    }
}

/// Hooks that accept every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl TransitionHooks for DefaultHooks {}

/// Hooks that record calls and can veto either decision point.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    pub progress: Vec<(PreloadRequest, PreloadProgress)>,
    pub switches: Vec<EntranceDescriptor>,
    pub veto_preload: bool,
    pub veto_switch: bool,
}

impl TransitionHooks for RecordingHooks {
    fn preload_progress(&mut self, request: &PreloadRequest, progress: PreloadProgress) -> bool {
        self.progress.push((*request, progress));
        !(self.veto_preload && progress == PreloadProgress::Begin)
    }

    fn scene_switch(&mut self, entrance: &EntranceDescriptor) -> bool {
        self.switches.push(entrance.clone());
        !self.veto_switch
    }
}
