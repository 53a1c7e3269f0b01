mod archive;
mod atomic_io;
mod description;
mod document;

pub(crate) use atomic_io::write_text_atomic;

pub use archive::{
    decode_project_archive, decode_scene_body, decode_scene_record, encode_project_archive,
    encode_scene_body, encode_scene_record, scene_body_name, scene_record_name, ArchiveError,
    ArchivedSceneTag, ProjectArchive, SceneRecordArchive, ARCHIVE_FORMAT_VERSION,
    MIN_ARCHIVE_VERSION,
};
pub use description::{
    AnimatedDesc, ArchivedMotion, CompoundDesc, CompoundItemDesc, GraphLinkDesc, GraphNodeDesc,
    GridDesc, MotionNodeDesc, MovementDesc, PhaseDesc, PictureDesc, ProjectDocument,
    SceneDescription, SceneDocument, SceneEntry, StaticsDesc,
};
pub use document::{
    parse_project_document, parse_scene_document, DocumentError, DocumentErrorCode,
    SourceLocation,
};
