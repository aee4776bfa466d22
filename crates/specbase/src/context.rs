//! The SpecBase context
//!
//! Owns the backend, the registry and the task list. `respec` is the only way
//! resources come and go; the attribute namespace mirrors every registered
//! resource whose declaration has `add_to_base` set, and is recomputed from
//! the registry after every respec, failed ones included.

use crate::backend::{Handle, ResourceBackend};
use crate::config::ContextConfig;
use crate::error::SpecResult;
use crate::reconcile::{Reconciler, RespecPlan, RespecReport};
use crate::registry::{Entry, Registry, RegistrySnapshot};
use crate::spec::Spec;
use crate::task::{TaskManager, TaskStatus};
use std::collections::BTreeSet;
use std::path::Path;

/// Declarative render-resource context
pub struct SpecBase<B: ResourceBackend> {
    config: ContextConfig,
    backend: B,
    registry: Registry<B>,
    reconciler: Reconciler,
    /// Names exposed as attributes
    attributes: BTreeSet<String>,
    tasks: TaskManager<B>,
    /// Frames rendered through `step`
    frame: u64,
}

impl<B: ResourceBackend> SpecBase<B> {
    /// Create an empty context around a backend
    pub fn new(backend: B, config: ContextConfig) -> Self {
        log::debug!(
            "SpecBase created (attributes: {}, task manager: {})",
            config.expose_attributes,
            config.task_manager
        );
        Self {
            reconciler: Reconciler::new(config.missing_keep),
            config,
            backend,
            registry: Registry::new(),
            attributes: BTreeSet::new(),
            tasks: TaskManager::new(),
            frame: 0,
        }
    }

    /// Create a context and apply an initial spec
    pub fn with_spec(backend: B, config: ContextConfig, spec: impl Into<Spec>) -> SpecResult<Self> {
        let mut base = Self::new(backend, config);
        base.respec(spec)?;
        Ok(base)
    }

    /// Converge the live resources on `spec`
    pub fn respec(&mut self, spec: impl Into<Spec>) -> SpecResult<RespecReport> {
        let spec = spec.into();
        let result = self
            .reconciler
            .respec(&spec, &mut self.registry, &mut self.backend);
        // Partial progress is committed, so the namespace follows the registry either way
        self.sync_attributes();

        match &result {
            Ok(report) if !report.is_noop() => log::info!(
                "Respec: {} created, {} destroyed, {} live",
                report.created.len(),
                report.destroyed.len(),
                self.registry.len()
            ),
            Ok(_) => log::debug!("Respec: nothing to do"),
            Err(e) => log::warn!("Respec aborted: {}", e),
        }
        result
    }

    /// Load a spec file (TOML or JSON) and respec to it
    pub fn respec_file(&mut self, path: impl AsRef<Path>) -> SpecResult<RespecReport> {
        let spec = Spec::load(path)?;
        self.respec(spec)
    }

    /// Work out what `respec(spec)` would do without doing it
    pub fn plan(&self, spec: &Spec) -> SpecResult<RespecPlan> {
        self.reconciler.plan(spec, &self.registry)
    }

    fn sync_attributes(&mut self) {
        self.attributes = if self.config.expose_attributes {
            self.registry
                .iter()
                .filter(|e| e.declaration.add_to_base())
                .map(|e| e.name().to_string())
                .collect()
        } else {
            BTreeSet::new()
        };
    }

    // Attribute namespace

    /// Look up an exposed resource
    pub fn attr(&self, name: &str) -> Option<&Handle<B>> {
        if !self.attributes.contains(name) {
            return None;
        }
        self.registry.get(name).map(|e| &e.handle)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    /// Exposed names, sorted
    pub fn attr_names(&self) -> Vec<&str> {
        self.attributes.iter().map(String::as_str).collect()
    }

    pub fn pipe(&self, name: &str) -> Option<&B::Pipe> {
        self.attr(name).and_then(Handle::as_pipe)
    }

    pub fn engine(&self, name: &str) -> Option<&B::Engine> {
        self.attr(name).and_then(Handle::as_engine)
    }

    pub fn window(&self, name: &str) -> Option<&B::Window> {
        self.attr(name).and_then(Handle::as_window)
    }

    pub fn scene_root(&self, name: &str) -> Option<&B::SceneRoot> {
        self.attr(name).and_then(Handle::as_scene_root)
    }

    pub fn camera(&self, name: &str) -> Option<&B::Camera> {
        self.attr(name).and_then(Handle::as_camera)
    }

    pub fn display_region(&self, name: &str) -> Option<&B::DisplayRegion> {
        self.attr(name).and_then(Handle::as_display_region)
    }

    // Accessors

    pub fn registry(&self) -> &Registry<B> {
        &self.registry
    }

    /// Registry entry for any registered name, exposed or not
    pub fn entry(&self, name: &str) -> Option<&Entry<B>> {
        self.registry.get(name)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    // Frames and tasks

    /// Render and flip one frame
    pub fn step(&mut self) -> SpecResult<()> {
        self.backend.render_frame()?;
        self.frame += 1;
        Ok(())
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn tasks(&self) -> &TaskManager<B> {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskManager<B> {
        &mut self.tasks
    }

    pub fn add_task<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: FnMut(&mut SpecBase<B>) -> SpecResult<TaskStatus> + 'static,
    {
        self.tasks.add(name, func);
    }

    /// Run every task once, in order
    ///
    /// Returns `true` if a task asked the run loop to exit. Tasks after the
    /// exiting or failing one are skipped this tick but stay scheduled.
    pub fn tick(&mut self) -> SpecResult<bool> {
        let mut pending = self.tasks.take().into_iter();
        let mut survivors = Vec::new();
        let mut outcome = Ok(false);

        for mut task in pending.by_ref() {
            match (task.func)(self) {
                Ok(TaskStatus::Continue) => survivors.push(task),
                Ok(TaskStatus::Done) => log::debug!("Task '{}' done", task.name),
                Ok(TaskStatus::Exit) => {
                    log::debug!("Task '{}' requested exit", task.name);
                    outcome = Ok(true);
                    break;
                }
                Err(e) => {
                    log::warn!("Task '{}' failed: {}", task.name, e);
                    survivors.push(task);
                    outcome = Err(e);
                    break;
                }
            }
        }

        survivors.extend(pending);
        self.tasks.restore(survivors);
        outcome
    }

    fn frame_budget_spent(&self) -> bool {
        self.config
            .max_frames
            .is_some_and(|max| self.frame >= max)
    }

    /// Drive frames until told to stop
    ///
    /// With the task manager enabled this ticks tasks until one exits or none
    /// are left; otherwise it steps frames forever. `max_frames` caps both.
    /// Returns the number of frames rendered during this call.
    pub fn run(&mut self) -> SpecResult<u64> {
        let start = self.frame;
        log::info!("Run loop started at frame {}", start);

        if self.config.task_manager {
            while !self.frame_budget_spent() && !self.tasks.is_empty() {
                if self.tick()? {
                    break;
                }
            }
        } else {
            while !self.frame_budget_spent() {
                self.step()?;
            }
        }

        let rendered = self.frame - start;
        log::info!("Run loop finished after {} frames", rendered);
        Ok(rendered)
    }

    /// Consume the context, handing back the backend
    ///
    /// Live resources are not destroyed; respec to an empty spec first for an
    /// orderly teardown.
    pub fn into_backend(self) -> B {
        self.backend
    }
}

impl<B: ResourceBackend> std::fmt::Debug for SpecBase<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecBase")
            .field("config", &self.config)
            .field("registry", &self.registry.snapshot().names())
            .field("attributes", &self.attributes)
            .field("frame", &self.frame)
            .finish()
    }
}
