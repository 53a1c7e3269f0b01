mod backdrop;
mod messages;
mod model;
mod objects;

pub use backdrop::{compose_backdrop, BitmapHeader, PixelFormat, TileInfo, BITMAP_HEADER_LEN};
pub use messages::{
    Command, MessageQueue, ObjstateTarget, COMMAND_FLAG_NAVIGATION, COMMAND_FLAG_RESTORE,
    MSG_KIND_GENERIC, MSG_KIND_OBJSTATE, MSG_KIND_SET_FLAGS, MSG_NUM_GOTO_SCENE,
    MSG_NUM_SCENE_TICK, QUEUE_FLAG_ON_TRANSITION,
};
pub use model::{
    DynamicObjectSnapshot, EntranceDescriptor, PassageDescriptor, Point, PreloadRequest, SceneId,
    KIND_ANIMATED, KIND_PICTURE, SNAPSHOT_KIND_MASK,
};
pub use objects::{
    AnimatedObject, DynamicPhase, Movement, MovementPhase, PictureObject, Scene, Statics,
    ANI_RUNTIME_MOVING, EXTRA_FLAG_FORCE_VISIBLE, EXTRA_FLAG_PERSISTENT,
    OBJECT_FLAG_HIDDEN_ON_ENTRY, OBJECT_FLAG_VISIBLE, PICTURE_FLAG_BACKDROP,
};
