pub const MSG_KIND_GENERIC: i32 = 17;
pub const MSG_KIND_SET_FLAGS: i32 = 34;
pub const MSG_KIND_OBJSTATE: i32 = 63;

pub const MSG_NUM_SCENE_TICK: i32 = 33;
pub const MSG_NUM_GOTO_SCENE: i32 = 62;

pub const COMMAND_FLAG_NAVIGATION: u32 = 2;
pub const COMMAND_FLAG_RESTORE: u32 = 3;

/// Set on a queue cloned from an entrance so the executor knows it runs as
/// part of a scene transition.
pub const QUEUE_FLAG_ON_TRANSITION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjstateTarget {
    pub object_name: String,
    pub value: i32,
}

/// A single message handed to the external command executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub kind: i32,
    pub parent_id: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub click_x: i32,
    pub click_y: i32,
    pub inventory_id: i32,
    pub param: i32,
    pub message_num: i32,
    pub flags: u32,
    pub parent_queue_id: i32,
    pub wait: bool,
    pub free: bool,
    pub objstate: Option<ObjstateTarget>,
}

impl Command {
    pub fn new(parent_id: i32, kind: i32, message_num: i32) -> Self {
        Self {
            kind,
            parent_id,
            message_num,
            ..Self::default()
        }
    }

    pub fn scene_tick() -> Self {
        Self::new(0, MSG_KIND_GENERIC, MSG_NUM_SCENE_TICK)
    }

    pub fn goto_scene(scene_id: i32, param: i32) -> Self {
        Self {
            flags: COMMAND_FLAG_NAVIGATION,
            param,
            ..Self::new(scene_id, MSG_KIND_GENERIC, MSG_NUM_GOTO_SCENE)
        }
    }

    /// Re-shows `object_id` once the entrance queue it is appended to runs.
    pub fn restore_visibility(object_id: i32, visibility_flag: u32) -> Self {
        let mut command = Self::new(object_id, MSG_KIND_SET_FLAGS, 0);
        command.z = visibility_flag as i32;
        command.flags |= COMMAND_FLAG_RESTORE;
        command
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQueue {
    pub id: i32,
    pub flags: u32,
    pub commands: Vec<Command>,
}

impl MessageQueue {
    pub fn push_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn is_on_transition(&self) -> bool {
        self.flags & QUEUE_FLAG_ON_TRANSITION != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goto_scene_command_carries_destination_and_param() {
        let command = Command::goto_scene(42, -3);
        assert_eq!(command.parent_id, 42);
        assert_eq!(command.kind, MSG_KIND_GENERIC);
        assert_eq!(command.message_num, MSG_NUM_GOTO_SCENE);
        assert_eq!(command.param, -3);
        assert_eq!(command.flags, COMMAND_FLAG_NAVIGATION);
    }

    #[test]
    fn restore_visibility_targets_object() {
        let command = Command::restore_visibility(7, 0x100);
        assert_eq!(command.parent_id, 7);
        assert_eq!(command.kind, MSG_KIND_SET_FLAGS);
        assert_eq!(command.z, 0x100);
        assert_eq!(command.flags & COMMAND_FLAG_RESTORE, COMMAND_FLAG_RESTORE);
    }
}
