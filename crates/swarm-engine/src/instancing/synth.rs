//! Draw-command synthesis.
//!
//! No culling happens here: every live instance is visible. Each window's
//! visible set is therefore a prefix of its own slots, and one identity list
//! `0..min(instance_count, capacity)` serves every command.

use crate::backend::{BatchHandle, MaterialHandle, MeshHandle};

use super::arena::FrameScope;
use super::commands::{DrawCommand, DrawOutput, DrawRange, FilterSettings};

/// Everything synthesis reads from the manager.
#[derive(Debug, Copy, Clone)]
pub struct SynthInput<'a> {
    pub instance_count: u32,
    pub capacity_per_window: u32,
    pub batches: &'a [BatchHandle],
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub filter: FilterSettings,
}

/// Builds one frame's draw commands inside `scope`.
///
/// Emits `ceil(instance_count / capacity)` commands under a single range.
/// With no instances nothing is allocated.
pub fn synthesize<'s>(input: &SynthInput<'_>, scope: &'s mut FrameScope<'_>) -> DrawOutput<'s> {
    if input.instance_count == 0 {
        return DrawOutput::empty();
    }

    let capacity = input.capacity_per_window;
    let command_count = input.instance_count.div_ceil(capacity) as usize;
    debug_assert!(command_count <= input.batches.len());
    let command_count = command_count.min(input.batches.len());
    let visible_len = input.instance_count.min(capacity);

    let alloc = scope.alloc(1, command_count, visible_len as usize);

    for (i, v) in alloc.visible.iter_mut().enumerate() {
        *v = i as u32;
    }

    let mut remaining = input.instance_count;
    for (cmd, &batch) in alloc.commands.iter_mut().zip(input.batches) {
        let visible_count = remaining.min(capacity);
        *cmd = DrawCommand {
            batch,
            mesh: input.mesh,
            material: input.material,
            submesh: 0,
            visible_offset: 0,
            visible_count,
        };
        remaining -= visible_count;
    }

    alloc.ranges[0] = DrawRange {
        draw_command_offset: 0,
        draw_command_count: command_count as u32,
        filter: input.filter,
    };

    log::trace!(
        "synthesized {} draw commands for {} instances",
        command_count,
        input.instance_count
    );

    DrawOutput {
        ranges: alloc.ranges,
        commands: alloc.commands,
        visible: alloc.visible,
    }
}
