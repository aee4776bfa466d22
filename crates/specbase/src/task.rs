//! Cooperative per-frame tasks
//!
//! Tasks run once per [`SpecBase::tick`](crate::SpecBase::tick), in insertion
//! order, each with mutable access to the context. A task may respec, render,
//! or add further tasks; tasks added while a tick is running start on the next
//! tick.

use crate::backend::ResourceBackend;
use crate::context::SpecBase;
use crate::error::SpecResult;

/// What a task wants after running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Run again next tick
    Continue,
    /// Remove this task
    Done,
    /// Remove this task and stop the run loop
    Exit,
}

/// Task body
pub type TaskFn<B> = Box<dyn FnMut(&mut SpecBase<B>) -> SpecResult<TaskStatus>>;

pub(crate) struct Task<B: ResourceBackend> {
    pub name: String,
    pub func: TaskFn<B>,
}

/// Ordered list of named tasks
pub struct TaskManager<B: ResourceBackend> {
    tasks: Vec<Task<B>>,
}

impl<B: ResourceBackend> TaskManager<B> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Append a task. Names need not be unique.
    pub fn add<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: FnMut(&mut SpecBase<B>) -> SpecResult<TaskStatus> + 'static,
    {
        let name = name.into();
        log::debug!("Added task '{}'", name);
        self.tasks.push(Task {
            name,
            func: Box::new(func),
        });
    }

    /// Remove every task with this name, returning how many were removed
    ///
    /// Only sees tasks that are not currently running; a task wanting to stop
    /// itself should return [`TaskStatus::Done`].
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.name != name);
        before - self.tasks.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Take the task list out for a tick
    pub(crate) fn take(&mut self) -> Vec<Task<B>> {
        std::mem::take(&mut self.tasks)
    }

    /// Put the survivors of a tick back, ahead of tasks added during it
    pub(crate) fn restore(&mut self, mut survivors: Vec<Task<B>>) {
        survivors.append(&mut self.tasks);
        self.tasks = survivors;
    }
}

impl<B: ResourceBackend> Default for TaskManager<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ResourceBackend> std::fmt::Debug for TaskManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.names())
            .finish()
    }
}

/// A task that renders one frame per tick, forever
pub fn render_frame_task<B: ResourceBackend>() -> impl FnMut(&mut SpecBase<B>) -> SpecResult<TaskStatus> {
    |base: &mut SpecBase<B>| {
        base.step()?;
        Ok(TaskStatus::Continue)
    }
}

/// A task that renders `frames` frames, one per tick, then stops the run loop
pub fn render_frame_task_for<B: ResourceBackend>(
    frames: u64,
) -> impl FnMut(&mut SpecBase<B>) -> SpecResult<TaskStatus> {
    let mut remaining = frames;
    move |base: &mut SpecBase<B>| {
        if remaining == 0 {
            return Ok(TaskStatus::Exit);
        }
        base.step()?;
        remaining -= 1;
        if remaining == 0 {
            Ok(TaskStatus::Exit)
        } else {
            Ok(TaskStatus::Continue)
        }
    }
}
