pub mod config;
pub mod content;
pub mod host;
pub mod loader;
pub mod manager;
pub mod motion;
pub mod registry;
pub mod resources;
pub mod scene;
pub mod snapshot;
pub mod transition;

pub use config::{EngineConfig, EntranceOverride};
pub use content::{ArchiveError, DocumentError, DocumentErrorCode, SourceLocation};
pub use host::{
    CommandQueue, CommandSink, DefaultHooks, GameStateStore, GameVarStore, Host, PreloadProgress,
    RecordingHooks, TransitionHooks, LAST_ENTRANCE_VAR, SAVEGAME_PATH,
};
pub use loader::{SceneLoadError, SceneLoader};
pub use manager::{BootError, SceneManager};
pub use motion::{
    CompoundController, GridSettings, MotionController, MotionPlanner, MovementGraph,
};
pub use registry::{SceneRecord, SceneRegistry, SceneSource, SceneTag};
pub use resources::{DirectoryResources, ImageInfo, MemoryResources, ResourceError, ResourceProvider};
pub use scene::{
    AnimatedObject, Command, DynamicObjectSnapshot, EntranceDescriptor, MessageQueue,
    PassageDescriptor, PictureObject, Point, PreloadRequest, Scene, SceneId,
};
pub use snapshot::{SnapshotSave, SnapshotStoreError};
pub use transition::{PendingInput, TransitionState};
