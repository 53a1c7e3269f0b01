use std::fmt;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::debug;

use crate::scene::{
    Command, DynamicObjectSnapshot, EntranceDescriptor, MessageQueue, ObjstateTarget,
    PassageDescriptor, Point, SceneId, MSG_KIND_OBJSTATE,
};

use super::description::{
    AnimatedDesc, CompoundDesc, GridDesc, MotionNodeDesc, MovementDesc, PhaseDesc, PictureDesc,
    ProjectDocument, SceneDescription, SceneDocument, SceneEntry, StaticsDesc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentErrorCode {
    XmlMalformed,
    InvalidRoot,
    MissingField,
    InvalidValue,
}

#[derive(Debug, Clone)]
pub struct DocumentError {
    pub code: DocumentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for DocumentError {}

struct DecodeContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl<'a, 'input> DecodeContext<'a, 'input> {
    fn error_at(&self, code: DocumentErrorCode, message: String, node: Node<'_, '_>) -> DocumentError {
        let pos = self.doc.text_pos_at(node.range().start);
        DocumentError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    /// Missing attributes read as zero.
    fn int(&self, node: Node<'_, '_>, name: &str) -> Result<i32, DocumentError> {
        match node.attribute(name) {
            None => Ok(0),
            Some(raw) => parse_int(raw).map(|value| value as i32).ok_or_else(|| {
                self.error_at(
                    DocumentErrorCode::InvalidValue,
                    format!(
                        "attribute '{}' on <{}> is not an integer: '{}'",
                        name,
                        node.tag_name().name(),
                        raw
                    ),
                    node,
                )
            }),
        }
    }

    fn flags(&self, node: Node<'_, '_>, name: &str) -> Result<u32, DocumentError> {
        self.int(node, name).map(|value| value as u32)
    }

    fn optional_u32(&self, node: Node<'_, '_>, name: &str) -> Result<Option<u32>, DocumentError> {
        if node.attribute(name).is_none() {
            return Ok(None);
        }
        let value = self.int(node, name)?;
        u32::try_from(value).map(Some).map_err(|_| {
            self.error_at(
                DocumentErrorCode::InvalidValue,
                format!("attribute '{}' must not be negative", name),
                node,
            )
        })
    }

    fn required_int(&self, node: Node<'_, '_>, name: &str) -> Result<i32, DocumentError> {
        if node.attribute(name).is_none() {
            return Err(self.error_at(
                DocumentErrorCode::MissingField,
                format!(
                    "<{}> requires attribute '{}'",
                    node.tag_name().name(),
                    name
                ),
                node,
            ));
        }
        self.int(node, name)
    }

    fn string(&self, node: Node<'_, '_>, name: &str) -> String {
        node.attribute(name).unwrap_or_default().to_string()
    }

    fn point(&self, node: Node<'_, '_>, x: &str, y: &str) -> Result<Point, DocumentError> {
        Ok(Point::new(self.int(node, x)?, self.int(node, y)?))
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok();
    }
    trimmed.parse::<i64>().ok()
}

fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

fn parse_document<'input>(file_path: &Path, raw: &'input str) -> Result<Document<'input>, DocumentError> {
    Document::parse(raw).map_err(|error| DocumentError {
        code: DocumentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })
}

/// Decodes a project document rooted at `<GAME>`.
pub fn parse_project_document(file_path: &Path, raw: &str) -> Result<ProjectDocument, DocumentError> {
    let doc = parse_document(file_path, raw)?;
    let ctx = DecodeContext {
        file_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "GAME" {
        return Err(ctx.error_at(
            DocumentErrorCode::InvalidRoot,
            "root element must be <GAME>".to_string(),
            root,
        ));
    }

    let mut project = ProjectDocument {
        title: ctx.string(root, "title"),
        ..ProjectDocument::default()
    };

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "SCENE" => {
                let xml_file = ctx.string(child, "szXmlFile");
                if xml_file.is_empty() {
                    let scene = parse_scene_node(&ctx, child)?;
                    project.scenes.push(SceneEntry::Inline(Box::new(scene)));
                } else {
                    project.scenes.push(SceneEntry::Reference {
                        id: SceneId(ctx.required_int(child, "id")?),
                        file: xml_file,
                    });
                }
            }
            "PASSAGE" => project.passages.push(PassageDescriptor {
                src_scene: SceneId(ctx.int(child, "nIdSrcScene")?),
                src_hint: ctx.int(child, "nIdSrcHint")?,
                dest_scene: SceneId(ctx.int(child, "nIdDestScene")?),
                dest_hint: ctx.int(child, "nIdDestHint")?,
            }),
            other => debug!(group = other, "project_group_ignored"),
        }
    }

    Ok(project)
}

/// Decodes a standalone scene document rooted at `<SCENE>`.
pub fn parse_scene_document(file_path: &Path, raw: &str) -> Result<SceneDocument, DocumentError> {
    let doc = parse_document(file_path, raw)?;
    let ctx = DecodeContext {
        file_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "SCENE" {
        return Err(ctx.error_at(
            DocumentErrorCode::InvalidRoot,
            "root element must be <SCENE>".to_string(),
            root,
        ));
    }
    parse_scene_node(&ctx, root)
}

fn parse_scene_node(ctx: &DecodeContext<'_, '_>, node: Node<'_, '_>) -> Result<SceneDocument, DocumentError> {
    let id = SceneId(ctx.required_int(node, "id")?);
    let parts_x = ctx.optional_u32(node, "nPartsX")?.unwrap_or(0);
    let parts_y = ctx.optional_u32(node, "nPartsY")?.unwrap_or(0);
    let mut scene = SceneDocument {
        description: SceneDescription {
            id,
            title: ctx.string(node, "title"),
            low_detail_id: ctx.int(node, "LowDetailId")?,
            parts_x,
            parts_y,
            ..SceneDescription::default()
        },
        ..SceneDocument::default()
    };

    for child in node.children().filter(|child| child.is_element()) {
        match child.tag_name().name() {
            "PICTURE" => scene
                .description
                .pictures
                .push(parse_picture(ctx, child)?),
            "ANI" => {
                if let Some(animated) = parse_animated(ctx, child)? {
                    scene.description.animated.push(animated);
                }
            }
            "ENTRANCE" => scene.entrances.push(parse_entrance(ctx, child)?),
            "QUEUE" => scene.description.queues.push(parse_queue(ctx, child)?),
            "OBJSTATE" => scene.object_states.push(parse_object_state(ctx, child)?),
            "MCTLCOMPOUND" => scene.motion = Some(parse_compound(ctx, child)?),
            other => debug!(scene_id = id.0, group = other, "scene_group_ignored"),
        }
    }

    Ok(scene)
}

fn parse_picture(ctx: &DecodeContext<'_, '_>, node: Node<'_, '_>) -> Result<PictureDesc, DocumentError> {
    Ok(PictureDesc {
        id: ctx.required_int(node, "Id")?,
        position: ctx.point(node, "x", "y")?,
        priority: ctx.int(node, "z")?,
        flags: ctx.flags(node, "wFlags")?,
        extra_flags: ctx.flags(node, "dwExFlags")?,
        alpha: ctx.int(node, "nAlpha")?.clamp(0, u8::MAX as i32) as u8,
    })
}

/// Copies (`iCopy != 0`) are materialized from snapshots, not authored.
fn parse_animated(
    ctx: &DecodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<Option<AnimatedDesc>, DocumentError> {
    if ctx.int(node, "iCopy")? != 0 {
        return Ok(None);
    }
    let mut animated = AnimatedDesc {
        id: ctx.required_int(node, "Id")?,
        position: ctx.point(node, "x", "y")?,
        priority: ctx.int(node, "z")?,
        flags: ctx.flags(node, "wFlags")?,
        extra_flags: ctx.flags(node, "dwExFlags")?,
        ..AnimatedDesc::default()
    };

    for child in node.children().filter(|child| child.is_element()) {
        if ctx.int(child, "nIdMirror")? != 0 {
            continue;
        }
        match child.tag_name().name() {
            "STATICS" => animated.statics.push(StaticsDesc {
                id: ctx.int(child, "id")?,
                title: ctx.string(child, "title"),
            }),
            "MOVEMENT" => animated.movements.push(parse_movement(ctx, child)?),
            _ => {}
        }
    }

    Ok(Some(animated))
}

fn parse_movement(ctx: &DecodeContext<'_, '_>, node: Node<'_, '_>) -> Result<MovementDesc, DocumentError> {
    let mut movement = MovementDesc {
        id: ctx.int(node, "id")?,
        title: ctx.string(node, "title"),
        prev_statics: ctx.int(node, "nIdPrev")?,
        next_statics: ctx.int(node, "nIdNext")?,
        prev_step: ctx.point(node, "nPrevStepX", "nPrevStepY")?,
        next_step: ctx.point(node, "nNextStepX", "nNextStepY")?,
        loop_delay: ctx.int(node, "dwLoopDelay")?,
        use_auto: ctx.int(node, "bUseAuto")? != 0,
        declared_phases: ctx.optional_u32(node, "dwNumPhases")?.unwrap_or(0) as usize,
        phases: Vec::new(),
    };

    for phase in children_named(node, "PHASE") {
        let mut command = None;
        for command_node in children_named(phase, "COMMAND") {
            let mut decoded = parse_command(ctx, command_node)?;
            decoded.free = false;
            command = Some(decoded);
        }
        movement.phases.push(PhaseDesc {
            step: ctx.point(phase, "csStep.x", "csStep.y")?,
            pause: ctx.int(phase, "iPouse")?,
            command,
        });
    }

    Ok(movement)
}

fn parse_command(ctx: &DecodeContext<'_, '_>, node: Node<'_, '_>) -> Result<Command, DocumentError> {
    let kind = ctx.int(node, "iId")?;
    let objstate = if kind == MSG_KIND_OBJSTATE {
        Some(ObjstateTarget {
            object_name: ctx.string(node, "sObject"),
            value: ctx.int(node, "dwState")?,
        })
    } else {
        None
    };
    Ok(Command {
        kind,
        parent_id: ctx.int(node, "oWho")?,
        x: ctx.int(node, "cpXY.x")?,
        y: ctx.int(node, "cpXY.y")?,
        z: ctx.int(node, "iZ")?,
        click_x: ctx.int(node, "cpXYStep.x")?,
        click_y: ctx.int(node, "cpXYStep.y")?,
        inventory_id: ctx.int(node, "iZStep")?,
        param: ctx.int(node, "iReserved")?,
        message_num: ctx.int(node, "iNum")?,
        flags: ctx.flags(node, "dwFlags")?,
        parent_queue_id: ctx.int(node, "dwParent")?,
        wait: ctx.int(node, "bWait")? != 0,
        free: ctx.int(node, "bFree")? != 0,
        objstate,
    })
}

fn parse_entrance(
    ctx: &DecodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<EntranceDescriptor, DocumentError> {
    Ok(EntranceDescriptor {
        scene_id: SceneId(ctx.int(node, "nIdScene")?),
        hint_id: ctx.int(node, "nIdHind")?,
        queue_id: ctx.int(node, "nIdQueue")?,
        title: ctx.string(node, "title"),
        entry_function: ctx.string(node, "entrfunct"),
    })
}

fn parse_queue(ctx: &DecodeContext<'_, '_>, node: Node<'_, '_>) -> Result<MessageQueue, DocumentError> {
    let mut queue = MessageQueue {
        id: ctx.required_int(node, "id")?,
        flags: ctx.flags(node, "dwFlags")?,
        commands: Vec::new(),
    };
    for command in children_named(node, "COMMAND") {
        queue.push_command(parse_command(ctx, command)?);
    }
    Ok(queue)
}

fn parse_object_state(
    ctx: &DecodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<DynamicObjectSnapshot, DocumentError> {
    Ok(DynamicObjectSnapshot {
        kind: ctx.flags(node, "dwObjType")?,
        object_id: ctx.int(node, "nId")?,
        copy_index: ctx.int(node, "iCopy")?,
        scene_id: SceneId(ctx.int(node, "nParentScene")?),
        x: ctx.int(node, "x")?,
        y: ctx.int(node, "y")?,
        priority: ctx.int(node, "z")?,
        statics_id: ctx.int(node, "nIdStatics")?,
        movement_id: ctx.int(node, "nIdMovement")?,
        phase_index: ctx.int(node, "nMovementPhase")?,
        flags: ctx.flags(node, "wFlags")?,
        extra_flags: ctx.flags(node, "dwExFlags")?,
        stop_phase_index: ctx.int(node, "nStopPhase")?,
    })
}

fn parse_compound(ctx: &DecodeContext<'_, '_>, node: Node<'_, '_>) -> Result<CompoundDesc, DocumentError> {
    let mut compound = CompoundDesc {
        declared_children: ctx.optional_u32(node, "nNumChildren")?.unwrap_or(0) as usize,
        children: Vec::new(),
    };
    for child in node.children().filter(|child| child.is_element()) {
        let decoded = match child.tag_name().name() {
            "MCTLREACTZONE" => {
                let mut points = Vec::new();
                for point in children_named(child, "POINT") {
                    points.push(ctx.point(point, "x", "y")?);
                }
                MotionNodeDesc::ReactionZone(points)
            }
            "MCTLGRID" => MotionNodeDesc::Grid(GridDesc {
                width: ctx.optional_u32(child, "nWidth")?,
                height: ctx.optional_u32(child, "nHeight")?,
                cell_size: ctx.optional_u32(child, "nCellSize")?,
            }),
            other => MotionNodeDesc::Other(other.to_string()),
        };
        compound.children.push(decoded);
    }
    Ok(compound)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE_XML: &str = r#"<SCENE id="301" title="Pier" LowDetailId="5" nPartsX="2" nPartsY="1">
        <PICTURE Id="11" x="10" y="20" z="100" wFlags="4" dwExFlags="0x80" nAlpha="200"/>
        <ANI Id="50" x="5" y="6" z="30" wFlags="4" dwExFlags="0x10000">
            <STATICS id="500" title="stand"/>
            <STATICS id="501" title="mirror" nIdMirror="500"/>
            <STATICS id="502" title="sit"/>
            <MOVEMENT id="600" title="sit_down" nIdPrev="500" nIdNext="502" dwNumPhases="2" bUseAuto="1">
                <PHASE csStep.x="1" csStep.y="2" iPouse="3">
                    <COMMAND iId="63" sObject="door" dwState="7" bFree="1"/>
                </PHASE>
                <PHASE csStep.x="4" csStep.y="5" iPouse="0"/>
            </MOVEMENT>
        </ANI>
        <ANI Id="51" iCopy="2"/>
        <ENTRANCE title="from pier" entrfunct="enter" nIdScene="301" nIdHind="7" nIdQueue="900"/>
        <QUEUE id="900" dwFlags="0">
            <COMMAND iId="1" oWho="50" iNum="12"/>
        </QUEUE>
        <OBJSTATE dwObjType="1" nId="50" iCopy="0" nParentScene="301" x="8" y="9" z="30" nIdStatics="502" wFlags="4" dwExFlags="128"/>
        <MCTLCOMPOUND nNumChildren="1">
            <MCTLREACTZONE iNumPoints="3"><POINT x="0" y="0"/><POINT x="100" y="0"/><POINT x="0" y="100"/></MCTLREACTZONE>
            <MCTLGRID nCellSize="10"/>
        </MCTLCOMPOUND>
        <DIALOGS/>
    </SCENE>"#;

    #[test]
    fn scene_document_decodes_every_group() {
        let scene = parse_scene_document(Path::new("sc301.xml"), SCENE_XML).expect("scene");
        let desc = &scene.description;
        assert_eq!(desc.id, SceneId(301));
        assert_eq!(desc.title, "Pier");
        assert_eq!(desc.low_detail_id, 5);
        assert_eq!((desc.parts_x, desc.parts_y), (2, 1));
        assert_eq!(desc.pictures.len(), 1);
        assert_eq!(desc.pictures[0].extra_flags, 0x80);
        assert_eq!(desc.pictures[0].alpha, 200);

        assert_eq!(desc.animated.len(), 1, "copies are not authored objects");
        let ani = &desc.animated[0];
        assert_eq!(ani.statics.len(), 2, "mirrored statics are skipped");
        let movement = &ani.movements[0];
        assert_eq!(movement.declared_phases, 2);
        assert_eq!(movement.phases.len(), 2);
        let command = movement.phases[0].command.as_ref().expect("command");
        assert!(!command.free);
        assert_eq!(
            command.objstate,
            Some(ObjstateTarget {
                object_name: "door".to_string(),
                value: 7
            })
        );

        assert_eq!(scene.entrances[0].hint_id, 7);
        assert_eq!(scene.entrances[0].queue_id, 900);
        assert_eq!(desc.queues[0].commands[0].message_num, 12);
        assert_eq!(scene.object_states[0].statics_id, 502);
        assert_eq!(scene.object_states[0].extra_flags, 128);

        let motion = scene.motion.expect("motion");
        assert_eq!(motion.declared_children, 1);
        assert!(matches!(
            &motion.children[0],
            MotionNodeDesc::ReactionZone(points) if points.len() == 3
        ));
        assert_eq!(
            motion.children[1],
            MotionNodeDesc::Grid(GridDesc {
                width: None,
                height: None,
                cell_size: Some(10)
            })
        );
    }

    #[test]
    fn project_document_collects_scenes_and_passages() {
        let raw = r#"<GAME title="Demo">
            <SCENE id="1" szXmlFile="sc0001.xml"/>
            <SCENE id="2" title="inline"/>
            <PASSAGE nIdSrcScene="1" nIdSrcHint="3" nIdDestScene="2" nIdDestHint="4"/>
            <INVENTORY/>
        </GAME>"#;
        let project = parse_project_document(Path::new("game.xml"), raw).expect("project");
        assert_eq!(project.title, "Demo");
        assert_eq!(project.scenes.len(), 2);
        assert_eq!(
            project.scenes[0],
            SceneEntry::Reference {
                id: SceneId(1),
                file: "sc0001.xml".to_string()
            }
        );
        assert!(matches!(&project.scenes[1], SceneEntry::Inline(doc) if doc.description.id == SceneId(2)));
        assert_eq!(project.passages[0].dest_hint, 4);
    }

    #[test]
    fn wrong_root_is_rejected() {
        let err = parse_project_document(Path::new("game.xml"), "<SCENE id=\"1\"/>").expect_err("err");
        assert_eq!(err.code, DocumentErrorCode::InvalidRoot);
        assert!(err.location.is_some());
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = parse_scene_document(Path::new("bad.xml"), "<SCENE id=\"1\">").expect_err("err");
        assert_eq!(err.code, DocumentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn non_numeric_attribute_is_invalid_value() {
        let err = parse_scene_document(Path::new("bad.xml"), r#"<SCENE id="x1"/>"#).expect_err("err");
        assert_eq!(err.code, DocumentErrorCode::InvalidValue);
    }

    #[test]
    fn scene_without_id_is_missing_field() {
        let err = parse_scene_document(Path::new("bad.xml"), r#"<SCENE title="t"/>"#).expect_err("err");
        assert_eq!(err.code, DocumentErrorCode::MissingField);
    }
}
