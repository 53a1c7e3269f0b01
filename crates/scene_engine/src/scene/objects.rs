use super::backdrop::{BitmapHeader, TileInfo};
use super::messages::{Command, MessageQueue};
use super::model::{DynamicObjectSnapshot, Point, SceneId, KIND_ANIMATED, KIND_PICTURE};

pub const OBJECT_FLAG_VISIBLE: u32 = 0x4;
pub const OBJECT_FLAG_HIDDEN_ON_ENTRY: u32 = 0x100;
pub const PICTURE_FLAG_BACKDROP: u32 = 0x1;

/// Extra flag marking objects whose state survives an unload.
pub const EXTRA_FLAG_PERSISTENT: u32 = 0x80;
/// Extra flag authored on animated objects that must start visible.
pub const EXTRA_FLAG_FORCE_VISIBLE: u32 = 0x1_0000;

/// Runtime-only type bit set while a movement plays.
pub const ANI_RUNTIME_MOVING: u32 = 0x1_0000;

const PHASE_FRAME_MS: u32 = 42;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PictureObject {
    pub id: i32,
    pub copy_index: i32,
    pub position: Point,
    pub priority: i32,
    pub flags: u32,
    pub extra_flags: u32,
    pub alpha: u8,
    pub resource: Option<String>,
    pub width: u32,
    pub height: u32,
    pub bitmap: Option<BitmapHeader>,
}

impl PictureObject {
    pub fn backdrop(header: BitmapHeader) -> Self {
        Self {
            flags: PICTURE_FLAG_BACKDROP,
            width: header.width,
            height: header.height,
            bitmap: Some(header),
            ..Self::default()
        }
    }

    pub fn is_backdrop(&self) -> bool {
        self.bitmap.is_some() && self.flags & PICTURE_FLAG_BACKDROP != 0
    }

    pub fn snapshot(&self, scene_id: SceneId) -> DynamicObjectSnapshot {
        DynamicObjectSnapshot {
            kind: KIND_PICTURE,
            object_id: self.id,
            copy_index: self.copy_index,
            scene_id,
            x: self.position.x,
            y: self.position.y,
            priority: self.priority,
            flags: self.flags,
            extra_flags: self.extra_flags,
            ..DynamicObjectSnapshot::default()
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &DynamicObjectSnapshot) {
        self.copy_index = snapshot.copy_index;
        self.position = Point::new(snapshot.x, snapshot.y);
        self.priority = snapshot.priority;
        self.flags = snapshot.flags;
        self.extra_flags = snapshot.extra_flags;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statics {
    pub id: i32,
    pub title: String,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicPhase {
    pub resource: String,
    pub countdown: i32,
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementPhase {
    Dynamic(DynamicPhase),
    /// Resting pose shown as the last frame of a movement.
    Pose(i32),
}

impl MovementPhase {
    fn duration_ms(&self) -> u32 {
        match self {
            Self::Dynamic(phase) => PHASE_FRAME_MS.saturating_mul(1 + phase.countdown.max(0) as u32),
            Self::Pose(_) => PHASE_FRAME_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Movement {
    pub id: i32,
    pub title: String,
    pub prev_statics: Option<i32>,
    pub next_statics: Option<i32>,
    pub prev_step: Point,
    pub next_step: Point,
    pub loop_delay: i32,
    pub auto_phase: bool,
    pub frame_offsets: Vec<Point>,
    pub phases: Vec<MovementPhase>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimatedObject {
    pub id: i32,
    pub copy_index: i32,
    pub scene_id: SceneId,
    pub position: Point,
    pub priority: i32,
    pub flags: u32,
    pub extra_flags: u32,
    pub type_bits: u32,
    pub statics: Vec<Statics>,
    pub movements: Vec<Movement>,
    pub current_statics: i32,
    pub current_movement: i32,
    pub phase_index: i32,
    pub stop_phase_index: i32,
    phase_elapsed_ms: u32,
}

impl AnimatedObject {
    pub fn new(id: i32, scene_id: SceneId) -> Self {
        Self {
            id,
            scene_id,
            type_bits: KIND_ANIMATED,
            ..Self::default()
        }
    }

    pub fn movement(&self, movement_id: i32) -> Option<&Movement> {
        self.movements.iter().find(|movement| movement.id == movement_id)
    }

    pub fn is_moving(&self) -> bool {
        self.current_movement != 0
    }

    pub fn start_movement(&mut self, movement_id: i32) -> bool {
        if self.movement(movement_id).is_none() {
            return false;
        }
        self.current_movement = movement_id;
        self.phase_index = 0;
        self.phase_elapsed_ms = 0;
        self.type_bits |= ANI_RUNTIME_MOVING;
        true
    }

    pub fn snapshot(&self) -> DynamicObjectSnapshot {
        DynamicObjectSnapshot {
            kind: self.type_bits | KIND_ANIMATED,
            object_id: self.id,
            copy_index: self.copy_index,
            scene_id: self.scene_id,
            x: self.position.x,
            y: self.position.y,
            priority: self.priority,
            statics_id: self.current_statics,
            movement_id: self.current_movement,
            phase_index: self.phase_index,
            flags: self.flags,
            extra_flags: self.extra_flags,
            stop_phase_index: self.stop_phase_index,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &DynamicObjectSnapshot) {
        self.copy_index = snapshot.copy_index;
        self.position = Point::new(snapshot.x, snapshot.y);
        self.priority = snapshot.priority;
        self.flags = snapshot.flags;
        self.extra_flags = snapshot.extra_flags;
        self.current_statics = snapshot.statics_id;
        self.stop_phase_index = snapshot.stop_phase_index;
        self.phase_elapsed_ms = 0;
        if snapshot.movement_id != 0 && self.movement(snapshot.movement_id).is_some() {
            self.current_movement = snapshot.movement_id;
            self.phase_index = snapshot.phase_index;
            self.type_bits |= ANI_RUNTIME_MOVING;
        } else {
            self.current_movement = 0;
            self.phase_index = 0;
            self.type_bits &= !ANI_RUNTIME_MOVING;
        }
    }

    fn reset_clock(&mut self) {
        self.phase_elapsed_ms = 0;
    }

    fn advance(&mut self, delta_ms: u32) {
        if !self.is_moving() {
            return;
        }
        self.phase_elapsed_ms = self.phase_elapsed_ms.saturating_add(delta_ms);

        loop {
            let Some(movement) = self.movement(self.current_movement) else {
                self.finish_movement(None);
                return;
            };
            let Some(phase) = movement.phases.get(self.phase_index.max(0) as usize) else {
                let next = movement.next_statics;
                self.finish_movement(next);
                return;
            };
            let duration = phase.duration_ms();
            if self.phase_elapsed_ms < duration {
                return;
            }
            let offset = movement
                .frame_offsets
                .get(self.phase_index.max(0) as usize)
                .copied()
                .unwrap_or_default();
            self.phase_elapsed_ms -= duration;
            self.position.x += offset.x;
            self.position.y += offset.y;
            self.phase_index += 1;
        }
    }

    fn finish_movement(&mut self, next_statics: Option<i32>) {
        if let Some(statics_id) = next_statics {
            self.current_statics = statics_id;
        }
        self.current_movement = 0;
        self.phase_index = 0;
        self.phase_elapsed_ms = 0;
        self.type_bits &= !ANI_RUNTIME_MOVING;
    }
}

/// Live runtime representation of one scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub id: SceneId,
    pub title: String,
    pub low_detail_id: i32,
    pub parts_x: u32,
    pub parts_y: u32,
    pub background_tiles: Vec<TileInfo>,
    pictures: Vec<PictureObject>,
    animated: Vec<AnimatedObject>,
    queues: Vec<MessageQueue>,
    elapsed_ms: u64,
}

impl Scene {
    pub fn new(id: SceneId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Resets the scene clock and every object's phase clock.
    pub fn init(&mut self) {
        self.elapsed_ms = 0;
        for object in &mut self.animated {
            object.reset_clock();
        }
    }

    pub fn update(&mut self, delta_ms: u32) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(delta_ms as u64);
        for object in &mut self.animated {
            object.advance(delta_ms);
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn pictures(&self) -> &[PictureObject] {
        &self.pictures
    }

    pub fn pictures_mut(&mut self) -> &mut [PictureObject] {
        &mut self.pictures
    }

    pub fn push_picture(&mut self, picture: PictureObject) {
        self.pictures.push(picture);
    }

    pub fn insert_backdrop(&mut self, picture: PictureObject) {
        self.pictures.insert(0, picture);
    }

    pub fn picture_by_id(&self, id: i32, copy_index: i32) -> Option<&PictureObject> {
        self.pictures
            .iter()
            .find(|picture| picture.id == id && picture.copy_index == copy_index)
    }

    pub fn picture_by_id_mut(&mut self, id: i32, copy_index: i32) -> Option<&mut PictureObject> {
        self.pictures
            .iter_mut()
            .find(|picture| picture.id == id && picture.copy_index == copy_index)
    }

    pub fn animated(&self) -> &[AnimatedObject] {
        &self.animated
    }

    pub fn animated_mut(&mut self) -> &mut [AnimatedObject] {
        &mut self.animated
    }

    pub fn add_animated(&mut self, object: AnimatedObject) {
        self.animated.push(object);
    }

    /// `copy_index` of `None` matches any copy.
    pub fn animated_by_id(&self, id: i32, copy_index: Option<i32>) -> Option<&AnimatedObject> {
        self.animated.iter().find(|object| {
            object.id == id && copy_index.map_or(true, |copy| object.copy_index == copy)
        })
    }

    pub fn animated_by_id_mut(
        &mut self,
        id: i32,
        copy_index: Option<i32>,
    ) -> Option<&mut AnimatedObject> {
        self.animated.iter_mut().find(|object| {
            object.id == id && copy_index.map_or(true, |copy| object.copy_index == copy)
        })
    }

    pub fn queues(&self) -> &[MessageQueue] {
        &self.queues
    }

    pub fn push_queue(&mut self, queue: MessageQueue) {
        self.queues.push(queue);
    }

    pub fn queue_by_id(&self, id: i32) -> Option<&MessageQueue> {
        self.queues.iter().find(|queue| queue.id == id)
    }
}
