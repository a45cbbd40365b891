//! Per-thread drain for tasks that run on the thread that made them ready.
//!
//! Completing a task resolves its dependents, and a dependent that becomes
//! ready inline would otherwise execute inside its prerequisite's frame. A
//! long chain would then need one frame per link. Instead, dependents made
//! ready while a completion is being propagated go onto this thread's ready
//! list, and the outermost inline run drains that list in a loop.
//!
//! A task body that itself starts inline work gets a fresh level, which is
//! drained before the body continues, so a body may still wait on the tasks
//! it spawned.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::task::TaskRef;

#[derive(Default)]
struct InlineState {
    /// True while a completed task resolves its dependents.
    notifying: bool,
    /// Ready lists, one per nested inline run.
    levels: Vec<VecDeque<TaskRef>>,
}

thread_local! {
    static INLINE: RefCell<InlineState> = const {
        RefCell::new(InlineState {
            notifying: false,
            levels: Vec::new(),
        })
    };
}

/// Executes `task` on this thread, or queues it when called while a
/// completion on this thread is propagating.
pub(crate) fn run(task: &TaskRef) {
    let deferred = INLINE.with(|state| {
        let mut state = state.borrow_mut();
        if state.notifying {
            if let Some(level) = state.levels.last_mut() {
                level.push_back(task.clone());
                return true;
            }
        }
        state.levels.push(VecDeque::new());
        false
    });
    if deferred {
        return;
    }

    let _level = LevelGuard;
    task.execute_now();
    while let Some(next) = pop_ready() {
        next.execute_now();
    }
}

fn pop_ready() -> Option<TaskRef> {
    INLINE.with(|state| {
        state
            .borrow_mut()
            .levels
            .last_mut()
            .and_then(VecDeque::pop_front)
    })
}

/// Marks this thread as propagating a completion until dropped.
pub(crate) fn notifying() -> NotifyGuard {
    let previous = INLINE.with(|state| std::mem::replace(&mut state.borrow_mut().notifying, true));
    NotifyGuard { previous }
}

pub(crate) struct NotifyGuard {
    previous: bool,
}

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        INLINE.with(|state| state.borrow_mut().notifying = self.previous);
    }
}

/// Pops the level pushed by [`run`], also when a body panics.
struct LevelGuard;

impl Drop for LevelGuard {
    fn drop(&mut self) {
        // Released outside the borrow: dropping tasks can run arbitrary drops.
        let leftover = INLINE.with(|state| state.borrow_mut().levels.pop());
        drop(leftover);
    }
}
