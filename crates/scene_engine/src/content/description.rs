//! Format-neutral scene descriptions shared by the document and archive
//! decoders. The loader materializes a live scene from these.

use crate::scene::{
    Command, DynamicObjectSnapshot, EntranceDescriptor, MessageQueue, PassageDescriptor, Point,
    SceneId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PictureDesc {
    pub id: i32,
    pub position: Point,
    pub priority: i32,
    pub flags: u32,
    pub extra_flags: u32,
    pub alpha: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticsDesc {
    pub id: i32,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseDesc {
    pub step: Point,
    pub pause: i32,
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementDesc {
    pub id: i32,
    pub title: String,
    pub prev_statics: i32,
    pub next_statics: i32,
    pub prev_step: Point,
    pub next_step: Point,
    pub loop_delay: i32,
    pub use_auto: bool,
    pub declared_phases: usize,
    pub phases: Vec<PhaseDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimatedDesc {
    pub id: i32,
    pub position: Point,
    pub priority: i32,
    pub flags: u32,
    pub extra_flags: u32,
    pub statics: Vec<StaticsDesc>,
    pub movements: Vec<MovementDesc>,
}

/// Grid dimensions; unset fields fall back to the engine defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridDesc {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub cell_size: Option<u32>,
}

/// One child of a compound motion controller, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionNodeDesc {
    ReactionZone(Vec<Point>),
    Grid(GridDesc),
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundDesc {
    pub declared_children: usize,
    pub children: Vec<MotionNodeDesc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNodeDesc {
    pub id: i32,
    pub position: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLinkDesc {
    pub from: i32,
    pub to: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundItemDesc {
    pub zone: Option<Vec<Point>>,
    pub grid: Option<GridDesc>,
}

/// Motion data read from a binary scene record; the archive names its own
/// variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchivedMotion {
    Graph {
        nodes: Vec<GraphNodeDesc>,
        links: Vec<GraphLinkDesc>,
    },
    Compound {
        items: Vec<CompoundItemDesc>,
    },
}

/// Object graph of one scene, independent of the on-disk representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDescription {
    pub id: SceneId,
    pub title: String,
    pub low_detail_id: i32,
    pub parts_x: u32,
    pub parts_y: u32,
    pub pictures: Vec<PictureDesc>,
    pub animated: Vec<AnimatedDesc>,
    pub queues: Vec<MessageQueue>,
}

/// A scene as authored in a structured document: the object graph plus the
/// record-level data (entrances, default object states, motion compound).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDocument {
    pub description: SceneDescription,
    pub entrances: Vec<EntranceDescriptor>,
    pub object_states: Vec<DynamicObjectSnapshot>,
    pub motion: Option<CompoundDesc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEntry {
    /// Scene declared by id, body lives in a separate document.
    Reference { id: SceneId, file: String },
    Inline(Box<SceneDocument>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDocument {
    pub title: String,
    pub scenes: Vec<SceneEntry>,
    pub passages: Vec<PassageDescriptor>,
}
