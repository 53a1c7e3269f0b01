//! Binary project and scene archives.
//!
//! Every archive shares one container: a four byte magic, a `u16` format
//! version, the payload length, the payload's SHA-256 and the payload itself.
//! Integers are little-endian. Strings carry a `u8` length prefix, with `0xFF`
//! escaping to a following `u16` length.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::scene::{
    Command, DynamicObjectSnapshot, EntranceDescriptor, MessageQueue, ObjstateTarget, Point,
    PreloadRequest, SceneId,
};

use super::description::{
    AnimatedDesc, ArchivedMotion, CompoundItemDesc, GraphLinkDesc, GraphNodeDesc, GridDesc,
    MovementDesc, PhaseDesc, PictureDesc, SceneDescription, StaticsDesc,
};

const PROJECT_MAGIC: &[u8; 4] = b"SCNP";
const SCENE_RECORD_MAGIC: &[u8; 4] = b"SCN2";
const SCENE_BODY_MAGIC: &[u8; 4] = b"SCNB";

/// Oldest project format the loader accepts.
pub const MIN_ARCHIVE_VERSION: u16 = 12;
pub const ARCHIVE_FORMAT_VERSION: u16 = 12;

const LONG_STRING_ESCAPE: u8 = 0xFF;

const MOTION_NONE: u8 = 0;
const MOTION_GRAPH: u8 = 1;
const MOTION_COMPOUND: u8 = 2;

const ITEM_HAS_ZONE: u8 = 1 << 0;
const ITEM_HAS_GRID: u8 = 1 << 1;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive {source_name} has unsupported version {version}")]
    UnsupportedVersion { source_name: String, version: u16 },
    #[error("archive {source_name} has invalid format: {message}")]
    InvalidFormat {
        source_name: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSceneTag {
    pub scene_id: SceneId,
    pub title: String,
}

/// Top-level binary project: the scene catalog plus loader-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectArchive {
    pub version: u16,
    pub game_name: String,
    pub scene_tags: Vec<ArchivedSceneTag>,
    pub preload_items: Vec<PreloadRequest>,
    pub anchor_object_id: i32,
    pub loader_flags: u16,
}

/// Per-scene record (`NNNN.sc2`): motion data, default snapshots, entrances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRecordArchive {
    pub scene_id: SceneId,
    pub motion: Option<ArchivedMotion>,
    pub default_snapshots: Vec<DynamicObjectSnapshot>,
    pub entrances: Vec<EntranceDescriptor>,
}

pub fn scene_record_name(scene_id: SceneId) -> String {
    format!("{:04}.sc2", scene_id.0)
}

pub fn scene_body_name(scene_id: SceneId) -> String {
    format!("{:04}.sce", scene_id.0)
}

pub fn encode_project_archive(project: &ProjectArchive) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ArchiveWriter::new("<project>");
    writer.string(&project.game_name)?;
    writer.len(project.scene_tags.len())?;
    for tag in &project.scene_tags {
        let scene_id = scene_id_as_u16(tag.scene_id, &writer)?;
        writer.u16(scene_id);
        writer.string(&tag.title)?;
    }
    writer.len(project.preload_items.len())?;
    for item in &project.preload_items {
        writer.i32(item.trigger_scene.0);
        writer.i32(item.trigger_param);
        writer.i32(item.destination.0);
        writer.i32(item.param);
    }
    writer.u16(project.anchor_object_id as u16);
    writer.u16(project.loader_flags);
    Ok(seal(PROJECT_MAGIC, project.version, writer.finish()))
}

pub fn decode_project_archive(source_name: &str, bytes: &[u8]) -> Result<ProjectArchive, ArchiveError> {
    let (version, payload) = open(source_name, PROJECT_MAGIC, bytes)?;
    let mut reader = ArchiveReader::new(source_name, payload);

    let game_name = reader.string()?;
    let tag_count = reader.len()?;
    let mut scene_tags = Vec::with_capacity(tag_count.min(1024));
    for _ in 0..tag_count {
        scene_tags.push(ArchivedSceneTag {
            scene_id: SceneId(reader.u16()? as i32),
            title: reader.string()?,
        });
    }
    let item_count = reader.len()?;
    let mut preload_items = Vec::with_capacity(item_count.min(1024));
    for _ in 0..item_count {
        preload_items.push(PreloadRequest {
            trigger_scene: SceneId(reader.i32()?),
            trigger_param: reader.i32()?,
            destination: SceneId(reader.i32()?),
            param: reader.i32()?,
        });
    }
    let anchor_object_id = reader.u16()? as i32;
    let loader_flags = reader.u16()?;
    reader.finish()?;

    Ok(ProjectArchive {
        version,
        game_name,
        scene_tags,
        preload_items,
        anchor_object_id,
        loader_flags,
    })
}

pub fn encode_scene_record(record: &SceneRecordArchive) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ArchiveWriter::new("<scene record>");
    writer.i32(record.scene_id.0);
    match &record.motion {
        None => writer.u8(MOTION_NONE),
        Some(ArchivedMotion::Graph { nodes, links }) => {
            writer.u8(MOTION_GRAPH);
            writer.len(nodes.len())?;
            for node in nodes {
                writer.i32(node.id);
                writer.point(node.position);
            }
            writer.len(links.len())?;
            for link in links {
                writer.i32(link.from);
                writer.i32(link.to);
            }
        }
        Some(ArchivedMotion::Compound { items }) => {
            writer.u8(MOTION_COMPOUND);
            writer.len(items.len())?;
            for item in items {
                let mut mask = 0u8;
                if item.zone.is_some() {
                    mask |= ITEM_HAS_ZONE;
                }
                if item.grid.is_some() {
                    mask |= ITEM_HAS_GRID;
                }
                writer.u8(mask);
                if let Some(zone) = &item.zone {
                    writer.len(zone.len())?;
                    for point in zone {
                        writer.point(*point);
                    }
                }
                if let Some(grid) = &item.grid {
                    writer.u32(grid.width.unwrap_or(0));
                    writer.u32(grid.height.unwrap_or(0));
                    writer.u32(grid.cell_size.unwrap_or(0));
                }
            }
        }
    }
    writer.len(record.default_snapshots.len())?;
    for snapshot in &record.default_snapshots {
        writer.snapshot(snapshot);
    }
    writer.len(record.entrances.len())?;
    for entrance in &record.entrances {
        writer.i32(entrance.scene_id.0);
        writer.i32(entrance.hint_id);
        writer.i32(entrance.queue_id);
        writer.string(&entrance.title)?;
        writer.string(&entrance.entry_function)?;
    }
    Ok(seal(SCENE_RECORD_MAGIC, ARCHIVE_FORMAT_VERSION, writer.finish()))
}

pub fn decode_scene_record(
    source_name: &str,
    bytes: &[u8],
) -> Result<SceneRecordArchive, ArchiveError> {
    let (_, payload) = open(source_name, SCENE_RECORD_MAGIC, bytes)?;
    let mut reader = ArchiveReader::new(source_name, payload);

    let scene_id = SceneId(reader.i32()?);
    let motion = match reader.u8()? {
        MOTION_NONE => None,
        MOTION_GRAPH => {
            let node_count = reader.len()?;
            let mut nodes = Vec::with_capacity(node_count.min(1024));
            for _ in 0..node_count {
                nodes.push(GraphNodeDesc {
                    id: reader.i32()?,
                    position: reader.point()?,
                });
            }
            let link_count = reader.len()?;
            let mut links = Vec::with_capacity(link_count.min(1024));
            for _ in 0..link_count {
                links.push(GraphLinkDesc {
                    from: reader.i32()?,
                    to: reader.i32()?,
                });
            }
            Some(ArchivedMotion::Graph { nodes, links })
        }
        MOTION_COMPOUND => {
            let item_count = reader.len()?;
            let mut items = Vec::with_capacity(item_count.min(1024));
            for _ in 0..item_count {
                let mask = reader.u8()?;
                let zone = if mask & ITEM_HAS_ZONE != 0 {
                    let point_count = reader.len()?;
                    let mut points = Vec::with_capacity(point_count.min(1024));
                    for _ in 0..point_count {
                        points.push(reader.point()?);
                    }
                    Some(points)
                } else {
                    None
                };
                let grid = if mask & ITEM_HAS_GRID != 0 {
                    Some(GridDesc {
                        width: nonzero(reader.u32()?),
                        height: nonzero(reader.u32()?),
                        cell_size: nonzero(reader.u32()?),
                    })
                } else {
                    None
                };
                items.push(CompoundItemDesc { zone, grid });
            }
            Some(ArchivedMotion::Compound { items })
        }
        other => {
            return Err(reader.invalid(&format!("unknown motion controller tag {other}")));
        }
    };

    let snapshot_count = reader.len()?;
    let mut default_snapshots = Vec::with_capacity(snapshot_count.min(1024));
    for _ in 0..snapshot_count {
        default_snapshots.push(reader.snapshot()?);
    }

    let entrance_count = reader.len()?;
    let mut entrances = Vec::with_capacity(entrance_count.min(1024));
    for _ in 0..entrance_count {
        entrances.push(EntranceDescriptor {
            scene_id: SceneId(reader.i32()?),
            hint_id: reader.i32()?,
            queue_id: reader.i32()?,
            title: reader.string()?,
            entry_function: reader.string()?,
        });
    }
    reader.finish()?;

    Ok(SceneRecordArchive {
        scene_id,
        motion,
        default_snapshots,
        entrances,
    })
}

pub fn encode_scene_body(scene: &SceneDescription) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ArchiveWriter::new("<scene body>");
    writer.i32(scene.id.0);
    writer.string(&scene.title)?;
    writer.i32(scene.low_detail_id);
    writer.u32(scene.parts_x);
    writer.u32(scene.parts_y);

    writer.len(scene.pictures.len())?;
    for picture in &scene.pictures {
        writer.i32(picture.id);
        writer.point(picture.position);
        writer.i32(picture.priority);
        writer.u32(picture.flags);
        writer.u32(picture.extra_flags);
        writer.u8(picture.alpha);
    }

    writer.len(scene.animated.len())?;
    for animated in &scene.animated {
        writer.i32(animated.id);
        writer.point(animated.position);
        writer.i32(animated.priority);
        writer.u32(animated.flags);
        writer.u32(animated.extra_flags);
        writer.len(animated.statics.len())?;
        for statics in &animated.statics {
            writer.i32(statics.id);
            writer.string(&statics.title)?;
        }
        writer.len(animated.movements.len())?;
        for movement in &animated.movements {
            writer.movement(movement)?;
        }
    }

    writer.len(scene.queues.len())?;
    for queue in &scene.queues {
        writer.i32(queue.id);
        writer.u32(queue.flags);
        writer.len(queue.commands.len())?;
        for command in &queue.commands {
            writer.command(command)?;
        }
    }
    Ok(seal(SCENE_BODY_MAGIC, ARCHIVE_FORMAT_VERSION, writer.finish()))
}

pub fn decode_scene_body(source_name: &str, bytes: &[u8]) -> Result<SceneDescription, ArchiveError> {
    let (_, payload) = open(source_name, SCENE_BODY_MAGIC, bytes)?;
    let mut reader = ArchiveReader::new(source_name, payload);

    let mut scene = SceneDescription {
        id: SceneId(reader.i32()?),
        title: reader.string()?,
        low_detail_id: reader.i32()?,
        parts_x: reader.u32()?,
        parts_y: reader.u32()?,
        ..SceneDescription::default()
    };

    for _ in 0..reader.len()? {
        scene.pictures.push(PictureDesc {
            id: reader.i32()?,
            position: reader.point()?,
            priority: reader.i32()?,
            flags: reader.u32()?,
            extra_flags: reader.u32()?,
            alpha: reader.u8()?,
        });
    }

    for _ in 0..reader.len()? {
        let mut animated = AnimatedDesc {
            id: reader.i32()?,
            position: reader.point()?,
            priority: reader.i32()?,
            flags: reader.u32()?,
            extra_flags: reader.u32()?,
            ..AnimatedDesc::default()
        };
        for _ in 0..reader.len()? {
            animated.statics.push(StaticsDesc {
                id: reader.i32()?,
                title: reader.string()?,
            });
        }
        for _ in 0..reader.len()? {
            animated.movements.push(reader.movement()?);
        }
        scene.animated.push(animated);
    }

    for _ in 0..reader.len()? {
        let mut queue = MessageQueue {
            id: reader.i32()?,
            flags: reader.u32()?,
            commands: Vec::new(),
        };
        for _ in 0..reader.len()? {
            queue.push_command(reader.command()?);
        }
        scene.queues.push(queue);
    }
    reader.finish()?;

    Ok(scene)
}

fn nonzero(value: u32) -> Option<u32> {
    (value != 0).then_some(value)
}

fn scene_id_as_u16(scene_id: SceneId, writer: &ArchiveWriter) -> Result<u16, ArchiveError> {
    u16::try_from(scene_id.0).map_err(|_| writer.invalid("scene id does not fit in u16"))
}

fn seal(magic: &[u8; 4], version: u16, payload: Vec<u8>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 42);
    bytes.extend_from_slice(magic);
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&sha256_bytes(&payload));
    bytes.extend_from_slice(&payload);
    bytes
}

fn open<'a>(
    source_name: &str,
    magic: &[u8; 4],
    bytes: &'a [u8],
) -> Result<(u16, &'a [u8]), ArchiveError> {
    let mut reader = ArchiveReader::new(source_name, bytes);
    if reader.take(4)? != magic {
        return Err(reader.invalid("invalid magic"));
    }
    let version = reader.u16()?;
    if version < MIN_ARCHIVE_VERSION {
        return Err(ArchiveError::UnsupportedVersion {
            source_name: source_name.to_string(),
            version,
        });
    }
    let payload_len = reader.u32()? as usize;
    let expected_hash = reader.take(32)?;
    let payload = reader.take(payload_len)?;
    if reader.cursor != bytes.len() {
        return Err(reader.invalid("unexpected trailing bytes"));
    }
    if expected_hash != sha256_bytes(payload) {
        return Err(reader.invalid("payload hash mismatch"));
    }
    Ok((version, payload))
}

fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

struct ArchiveWriter {
    source_name: &'static str,
    bytes: Vec<u8>,
}

impl ArchiveWriter {
    fn new(source_name: &'static str) -> Self {
        Self {
            source_name,
            bytes: Vec::new(),
        }
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }

    fn invalid(&self, message: &str) -> ArchiveError {
        ArchiveError::InvalidFormat {
            source_name: self.source_name.to_string(),
            message: message.to_string(),
        }
    }

    fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn bool(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    fn len(&mut self, len: usize) -> Result<(), ArchiveError> {
        let len = u32::try_from(len).map_err(|_| self.invalid("collection too large"))?;
        self.u32(len);
        Ok(())
    }

    fn point(&mut self, point: Point) {
        self.i32(point.x);
        self.i32(point.y);
    }

    fn string(&mut self, value: &str) -> Result<(), ArchiveError> {
        let raw = value.as_bytes();
        if raw.len() < LONG_STRING_ESCAPE as usize {
            self.u8(raw.len() as u8);
        } else {
            let len = u16::try_from(raw.len())
                .map_err(|_| self.invalid("string too long for u16 length"))?;
            self.u8(LONG_STRING_ESCAPE);
            self.u16(len);
        }
        self.bytes.extend_from_slice(raw);
        Ok(())
    }

    fn snapshot(&mut self, snapshot: &DynamicObjectSnapshot) {
        self.u32(snapshot.kind);
        self.i32(snapshot.object_id);
        self.i32(snapshot.copy_index);
        self.i32(snapshot.scene_id.0);
        self.i32(snapshot.x);
        self.i32(snapshot.y);
        self.i32(snapshot.priority);
        self.i32(snapshot.statics_id);
        self.i32(snapshot.movement_id);
        self.i32(snapshot.phase_index);
        self.u32(snapshot.flags);
        self.u32(snapshot.extra_flags);
        self.i32(snapshot.stop_phase_index);
    }

    fn movement(&mut self, movement: &MovementDesc) -> Result<(), ArchiveError> {
        self.i32(movement.id);
        self.string(&movement.title)?;
        self.i32(movement.prev_statics);
        self.i32(movement.next_statics);
        self.point(movement.prev_step);
        self.point(movement.next_step);
        self.i32(movement.loop_delay);
        self.bool(movement.use_auto);
        self.len(movement.declared_phases)?;
        self.len(movement.phases.len())?;
        for phase in &movement.phases {
            self.point(phase.step);
            self.i32(phase.pause);
            match &phase.command {
                Some(command) => {
                    self.bool(true);
                    self.command(command)?;
                }
                None => self.bool(false),
            }
        }
        Ok(())
    }

    fn command(&mut self, command: &Command) -> Result<(), ArchiveError> {
        self.i32(command.kind);
        self.i32(command.parent_id);
        self.i32(command.x);
        self.i32(command.y);
        self.i32(command.z);
        self.i32(command.click_x);
        self.i32(command.click_y);
        self.i32(command.inventory_id);
        self.i32(command.param);
        self.i32(command.message_num);
        self.u32(command.flags);
        self.i32(command.parent_queue_id);
        self.bool(command.wait);
        self.bool(command.free);
        match &command.objstate {
            Some(target) => {
                self.bool(true);
                self.string(&target.object_name)?;
                self.i32(target.value);
            }
            None => self.bool(false),
        }
        Ok(())
    }
}

struct ArchiveReader<'n, 'a> {
    source_name: &'n str,
    bytes: &'a [u8],
    cursor: usize,
}

impl<'n, 'a> ArchiveReader<'n, 'a> {
    fn new(source_name: &'n str, bytes: &'a [u8]) -> Self {
        Self {
            source_name,
            bytes,
            cursor: 0,
        }
    }

    fn invalid(&self, message: &str) -> ArchiveError {
        ArchiveError::InvalidFormat {
            source_name: self.source_name.to_string(),
            message: format!("{message} (offset {})", self.cursor),
        }
    }

    fn finish(&self) -> Result<(), ArchiveError> {
        if self.cursor != self.bytes.len() {
            return Err(self.invalid("payload length mismatch"));
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ArchiveError> {
        let end = self.cursor.saturating_add(len);
        if end > self.bytes.len() {
            return Err(self.invalid("unexpected end of file"));
        }
        let out = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ArchiveError> {
        let raw = self.take(N)?;
        raw.try_into()
            .map_err(|_| self.invalid("invalid fixed-width encoding"))
    }

    fn u8(&mut self) -> Result<u8, ArchiveError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ArchiveError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, ArchiveError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, ArchiveError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn bool(&mut self) -> Result<bool, ArchiveError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(self.invalid("invalid boolean")),
        }
    }

    fn len(&mut self) -> Result<usize, ArchiveError> {
        Ok(self.u32()? as usize)
    }

    fn point(&mut self) -> Result<Point, ArchiveError> {
        Ok(Point::new(self.i32()?, self.i32()?))
    }

    fn string(&mut self) -> Result<String, ArchiveError> {
        let len = match self.u8()? {
            LONG_STRING_ESCAPE => self.u16()? as usize,
            short => short as usize,
        };
        let raw = self.take(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn snapshot(&mut self) -> Result<DynamicObjectSnapshot, ArchiveError> {
        Ok(DynamicObjectSnapshot {
            kind: self.u32()?,
            object_id: self.i32()?,
            copy_index: self.i32()?,
            scene_id: SceneId(self.i32()?),
            x: self.i32()?,
            y: self.i32()?,
            priority: self.i32()?,
            statics_id: self.i32()?,
            movement_id: self.i32()?,
            phase_index: self.i32()?,
            flags: self.u32()?,
            extra_flags: self.u32()?,
            stop_phase_index: self.i32()?,
        })
    }

    fn movement(&mut self) -> Result<MovementDesc, ArchiveError> {
        let mut movement = MovementDesc {
            id: self.i32()?,
            title: self.string()?,
            prev_statics: self.i32()?,
            next_statics: self.i32()?,
            prev_step: self.point()?,
            next_step: self.point()?,
            loop_delay: self.i32()?,
            use_auto: self.bool()?,
            declared_phases: self.len()?,
            phases: Vec::new(),
        };
        for _ in 0..self.len()? {
            let step = self.point()?;
            let pause = self.i32()?;
            let command = if self.bool()? {
                Some(self.command()?)
            } else {
                None
            };
            movement.phases.push(PhaseDesc {
                step,
                pause,
                command,
            });
        }
        Ok(movement)
    }

    fn command(&mut self) -> Result<Command, ArchiveError> {
        Ok(Command {
            kind: self.i32()?,
            parent_id: self.i32()?,
            x: self.i32()?,
            y: self.i32()?,
            z: self.i32()?,
            click_x: self.i32()?,
            click_y: self.i32()?,
            inventory_id: self.i32()?,
            param: self.i32()?,
            message_num: self.i32()?,
            flags: self.u32()?,
            parent_queue_id: self.i32()?,
            wait: self.bool()?,
            free: self.bool()?,
            objstate: if self.bool()? {
                Some(ObjstateTarget {
                    object_name: self.string()?,
                    value: self.i32()?,
                })
            } else {
                None
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::KIND_PICTURE;

    fn project(version: u16) -> ProjectArchive {
        ProjectArchive {
            version,
            game_name: "Demo".to_string(),
            scene_tags: vec![ArchivedSceneTag {
                scene_id: SceneId(301),
                title: "x".repeat(300),
            }],
            preload_items: vec![PreloadRequest {
                trigger_scene: SceneId(301),
                trigger_param: 1,
                destination: SceneId(302),
                param: -1,
            }],
            anchor_object_id: 0x1F4,
            loader_flags: 7,
        }
    }

    #[test]
    fn project_archive_keeps_long_titles_and_preload_items() {
        let bytes = encode_project_archive(&project(ARCHIVE_FORMAT_VERSION)).expect("encode");
        let decoded = decode_project_archive("demo.scp", &bytes).expect("decode");
        assert_eq!(decoded, project(ARCHIVE_FORMAT_VERSION));
    }

    #[test]
    fn project_archive_below_minimum_version_is_rejected() {
        let bytes = encode_project_archive(&project(11)).expect("encode");
        let err = decode_project_archive("old.scp", &bytes).expect_err("old");
        assert!(matches!(
            err,
            ArchiveError::UnsupportedVersion { version: 11, .. }
        ));
    }

    #[test]
    fn scene_record_with_trailing_bytes_is_rejected() {
        let record = SceneRecordArchive {
            scene_id: SceneId(301),
            motion: Some(ArchivedMotion::Compound {
                items: vec![CompoundItemDesc {
                    zone: Some(vec![Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)]),
                    grid: Some(GridDesc {
                        width: None,
                        height: None,
                        cell_size: Some(10),
                    }),
                }],
            }),
            default_snapshots: vec![DynamicObjectSnapshot {
                kind: KIND_PICTURE,
                object_id: 11,
                ..DynamicObjectSnapshot::default()
            }],
            entrances: vec![EntranceDescriptor {
                scene_id: SceneId(301),
                hint_id: 2,
                queue_id: 900,
                ..EntranceDescriptor::default()
            }],
        };
        let mut bytes = encode_scene_record(&record).expect("encode");
        assert_eq!(
            decode_scene_record("0301.sc2", &bytes).expect("decode"),
            record
        );

        bytes.push(0);
        let err = decode_scene_record("0301.sc2", &bytes).expect_err("trailing");
        assert!(matches!(err, ArchiveError::InvalidFormat { .. }));
    }

    #[test]
    fn corrupted_payload_fails_hash_check() {
        let mut bytes = encode_scene_body(&SceneDescription {
            id: SceneId(4),
            title: "Cellar".to_string(),
            ..SceneDescription::default()
        })
        .expect("encode");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = decode_scene_body("0004.sce", &bytes).expect_err("corrupt");
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn opened_payload_outlives_source_name() {
        let bytes = seal(SCENE_BODY_MAGIC, ARCHIVE_FORMAT_VERSION, vec![1, 2, 3]);
        let payload = {
            let name = scene_body_name(SceneId(9));
            let (version, payload) = open(&name, SCENE_BODY_MAGIC, &bytes).expect("open");
            assert_eq!(version, ARCHIVE_FORMAT_VERSION);
            payload
        };
        assert_eq!(payload, &[1, 2, 3]);
    }

    #[test]
    fn record_names_are_zero_padded() {
        assert_eq!(scene_record_name(SceneId(7)), "0007.sc2");
        assert_eq!(scene_body_name(SceneId(1234)), "1234.sce");
    }
}
