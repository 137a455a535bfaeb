//! Frame-scoped scratch memory for draw-command synthesis.
//!
//! The backend owns a [`FrameArena`] and opens one [`FrameScope`] per frame.
//! Sources allocate their output from the scope; the returned slices borrow
//! it, so they cannot be retained once the backend is done. Dropping the scope
//! releases everything, including on early returns.
//!
//! Capacity is kept between frames, so a warmed-up arena does not allocate.

use super::commands::{DrawCommand, DrawRange};

/// Allocation counters, useful for diagnostics and tests.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ArenaStats {
    pub scopes_opened: u64,
    pub scopes_released: u64,
    pub range_allocations: u64,
    pub command_allocations: u64,
    pub visible_allocations: u64,
    pub peak_commands: usize,
    pub peak_visible: usize,
}

#[derive(Debug, Default)]
pub struct FrameArena {
    ranges: Vec<DrawRange>,
    commands: Vec<DrawCommand>,
    visible: Vec<u32>,
    stats: ArenaStats,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the scope for one frame.
    pub fn scope(&mut self) -> FrameScope<'_> {
        self.stats.scopes_opened += 1;
        FrameScope { arena: self }
    }

    #[inline]
    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// True when no scope holds allocations.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.ranges.is_empty() && self.commands.is_empty() && self.visible.is_empty()
    }

    fn release(&mut self) {
        self.stats.peak_commands = self.stats.peak_commands.max(self.commands.len());
        self.stats.peak_visible = self.stats.peak_visible.max(self.visible.len());
        self.ranges.clear();
        self.commands.clear();
        self.visible.clear();
        self.stats.scopes_released += 1;
    }
}

/// One frame's view of the arena. Released on drop.
pub struct FrameScope<'a> {
    arena: &'a mut FrameArena,
}

/// Freshly allocated, default-initialized slices.
pub struct FrameAlloc<'s> {
    pub ranges: &'s mut [DrawRange],
    pub commands: &'s mut [DrawCommand],
    pub visible: &'s mut [u32],
}

impl FrameScope<'_> {
    /// Allocates `ranges` draw ranges, `commands` draw commands and `visible`
    /// visibility entries in one call.
    ///
    /// Each call appends to the frame's pools; earlier allocations stay
    /// reserved until the scope is released.
    pub fn alloc(&mut self, ranges: usize, commands: usize, visible: usize) -> FrameAlloc<'_> {
        let arena = &mut *self.arena;

        if ranges > 0 {
            arena.stats.range_allocations += 1;
        }
        if commands > 0 {
            arena.stats.command_allocations += 1;
        }
        if visible > 0 {
            arena.stats.visible_allocations += 1;
        }

        FrameAlloc {
            ranges: grow(&mut arena.ranges, ranges),
            commands: grow(&mut arena.commands, commands),
            visible: grow(&mut arena.visible, visible),
        }
    }
}

impl Drop for FrameScope<'_> {
    fn drop(&mut self) {
        self.arena.release();
    }
}

fn grow<T: Default + Clone>(pool: &mut Vec<T>, n: usize) -> &mut [T] {
    let start = pool.len();
    pool.resize(start + n, T::default());
    &mut pool[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_requested_lengths() {
        let mut arena = FrameArena::new();
        let mut scope = arena.scope();
        let a = scope.alloc(1, 3, 10);
        assert_eq!((a.ranges.len(), a.commands.len(), a.visible.len()), (1, 3, 10));
    }

    #[test]
    fn dropping_scope_releases_everything() {
        let mut arena = FrameArena::new();
        {
            let mut scope = arena.scope();
            let a = scope.alloc(1, 2, 4);
            a.visible[0] = 7;
        }
        assert!(arena.is_released());
        let stats = arena.stats();
        assert_eq!(stats.scopes_opened, 1);
        assert_eq!(stats.scopes_released, 1);
        assert_eq!(stats.peak_visible, 4);
    }

    #[test]
    fn allocations_within_a_scope_do_not_alias() {
        let mut arena = FrameArena::new();
        let mut scope = arena.scope();
        scope.alloc(0, 0, 5).visible.fill(1);
        let second = scope.alloc(0, 0, 5);
        assert!(second.visible.iter().all(|&v| v == 0));
    }

    #[test]
    fn empty_requests_are_not_counted() {
        let mut arena = FrameArena::new();
        {
            let mut scope = arena.scope();
            scope.alloc(0, 0, 0);
        }
        let stats = arena.stats();
        assert_eq!(stats.visible_allocations, 0);
        assert_eq!(stats.command_allocations, 0);
    }

    #[test]
    fn scope_released_on_early_return() {
        fn consume(arena: &mut FrameArena) -> Result<(), &'static str> {
            let mut scope = arena.scope();
            scope.alloc(1, 1, 1);
            Err("backend failed")
        }
        let mut arena = FrameArena::new();
        assert!(consume(&mut arena).is_err());
        assert!(arena.is_released());
    }
}
