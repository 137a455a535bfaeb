//! Draw-command output types.

use crate::backend::{BatchHandle, MaterialHandle, MeshHandle};

use super::arena::FrameScope;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ShadowCasting {
    #[default]
    Off,
    On,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum MotionVectorMode {
    /// Motion from camera movement only.
    #[default]
    Camera,
    /// Per-object motion vectors.
    Object,
    ForceNone,
}

/// Settings shared by every draw command of one range.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FilterSettings {
    /// Views render the range when `layer_mask & view_mask != 0`.
    pub layer_mask: u32,
    pub shadow_casting: ShadowCasting,
    pub receive_shadows: bool,
    pub motion_vectors: MotionVectorMode,
    pub depth_sorted: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            layer_mask: 1,
            shadow_casting: ShadowCasting::Off,
            receive_shadows: true,
            motion_vectors: MotionVectorMode::Camera,
            depth_sorted: false,
        }
    }
}

/// A run of draw commands sharing one [`FilterSettings`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DrawRange {
    pub draw_command_offset: u32,
    pub draw_command_count: u32,
    pub filter: FilterSettings,
}

/// Render `visible_count` instances of one window.
///
/// The instances drawn are `visible[visible_offset..visible_offset + visible_count]`,
/// interpreted as slot indices inside the batch's window.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DrawCommand {
    pub batch: BatchHandle,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub submesh: u32,
    pub visible_offset: u32,
    pub visible_count: u32,
}

/// Draw commands for one frame, borrowed from the frame arena.
#[derive(Debug, Copy, Clone)]
pub struct DrawOutput<'a> {
    pub ranges: &'a [DrawRange],
    pub commands: &'a [DrawCommand],
    pub visible: &'a [u32],
}

impl DrawOutput<'_> {
    pub const fn empty() -> Self {
        DrawOutput {
            ranges: &[],
            commands: &[],
            visible: &[],
        }
    }

    #[inline]
    pub fn draw_command_count(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Sum of `visible_count` over all commands.
    pub fn total_visible(&self) -> u64 {
        self.commands.iter().map(|c| c.visible_count as u64).sum()
    }

    /// Visible slot indices referenced by `command`.
    pub fn visible_for(&self, command: &DrawCommand) -> &[u32] {
        let start = command.visible_offset as usize;
        &self.visible[start..start + command.visible_count as usize]
    }
}

/// Anything the backend can pull draw commands from once per frame.
///
/// The output borrows `scope`; nothing allocated for it survives past the
/// scope's release.
pub trait DrawCommandSource {
    fn synthesize<'s>(&self, scope: &'s mut FrameScope<'_>) -> DrawOutput<'s>;
}
