//! # SpecBase Headless
//!
//! An in-memory rendering engine behind the [`ResourceBackend`] contract.
//! Nothing is drawn; pipes, engines, windows, scene nodes and display regions
//! are plain shared structures that count the frames they would have rendered.
//!
//! Every create and destroy call is recorded in a [`BackendCall`] journal, which
//! makes ordering and idempotence directly observable. The journal keeps the
//! most recent [`DEFAULT_JOURNAL_LIMIT`] calls unless told otherwise.
//!
//! Destroying a resource releases it rather than tearing down what depends on
//! it: a released window stays up until its last display region is destroyed,
//! a released engine until its last window, a released pipe until its last
//! engine.

pub mod error;
pub mod node;
pub mod surface;

pub use error::{HeadlessError, HeadlessResult};
pub use node::{HeadlessNode, Lens};
pub use surface::{
    HeadlessDisplayRegion, HeadlessEngine, HeadlessPipe, HeadlessWindow, DEFAULT_WINDOW_SIZE,
    FULL_SURFACE,
};

use serde::Serialize;
use specbase::{
    CameraDecl, CreationFlags, DisplayRegionDecl, EngineDecl, PipeDecl, ResourceBackend,
    ResourceKind, SceneRootDecl, SpecError, SpecResult, WindowDecl,
};
use std::collections::HashSet;

/// Display modules a fresh backend can open
pub const DEFAULT_MODULES: [&str; 3] = ["default", "headless", "offscreen"];

/// Name of the engine shared by everything that doesn't ask for its own
pub const SHARED_ENGINE: &str = "shared";

/// Journal entries kept by a fresh backend
pub const DEFAULT_JOURNAL_LIMIT: usize = 4096;

/// Direction of a journaled backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOp {
    Create,
    Destroy,
}

/// One create or destroy call, as seen by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendCall {
    pub op: CallOp,
    pub kind: ResourceKind,
    pub name: String,
}

/// Headless rendering backend
#[derive(Debug)]
pub struct HeadlessBackend {
    modules: Vec<String>,
    shared_engine: HeadlessEngine,
    /// Dedicated engines, bound to a pipe
    engines: Vec<HeadlessEngine>,
    journal: Vec<BackendCall>,
    journal_limit: Option<usize>,
    failing_windows: HashSet<String>,
    failing_destroys: HashSet<String>,
    frames: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            modules: DEFAULT_MODULES.iter().map(|m| m.to_string()).collect(),
            shared_engine: HeadlessEngine::new(SHARED_ENGINE, None),
            engines: Vec::new(),
            journal: Vec::new(),
            journal_limit: Some(DEFAULT_JOURNAL_LIMIT),
            failing_windows: HashSet::new(),
            failing_destroys: HashSet::new(),
            frames: 0,
        }
    }

    /// Make another display module available to named pipes
    pub fn add_module(&mut self, module: impl Into<String>) {
        let module = module.into();
        if !self.modules.contains(&module) {
            self.modules.push(module);
        }
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Have the engine refuse to open a surface for this window name
    pub fn fail_window(&mut self, name: impl Into<String>) {
        self.failing_windows.insert(name.into());
    }

    /// Have every destroy call for this name fail
    pub fn fail_destroy(&mut self, name: impl Into<String>) {
        self.failing_destroys.insert(name.into());
    }

    /// Clear all injected failures
    pub fn clear_failures(&mut self) {
        self.failing_windows.clear();
        self.failing_destroys.clear();
    }

    /// Successful create and destroy calls, oldest first
    ///
    /// Only the most recent calls up to the journal limit are kept.
    pub fn journal(&self) -> &[BackendCall] {
        &self.journal
    }

    /// Cap the journal at `limit` entries, or keep everything with `None`
    pub fn set_journal_limit(&mut self, limit: Option<usize>) {
        self.journal_limit = limit;
        self.trim_journal();
    }

    pub fn journal_limit(&self) -> Option<usize> {
        self.journal_limit
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Names created, in order
    pub fn created(&self) -> Vec<&str> {
        self.journal_names(CallOp::Create)
    }

    /// Names destroyed, in order
    pub fn destroyed(&self) -> Vec<&str> {
        self.journal_names(CallOp::Destroy)
    }

    fn journal_names(&self, op: CallOp) -> Vec<&str> {
        self.journal
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn shared_engine(&self) -> &HeadlessEngine {
        &self.shared_engine
    }

    /// The shared engine followed by every live dedicated engine
    pub fn engines(&self) -> Vec<HeadlessEngine> {
        std::iter::once(self.shared_engine.clone())
            .chain(self.engines.iter().cloned())
            .collect()
    }

    /// Frames rendered through `render_frame`
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn record(&mut self, op: CallOp, kind: ResourceKind, name: &str) {
        self.journal.push(BackendCall {
            op,
            kind,
            name: name.to_string(),
        });
        self.trim_journal();
    }

    fn trim_journal(&mut self) {
        if let Some(limit) = self.journal_limit {
            let excess = self.journal.len().saturating_sub(limit);
            self.journal.drain(..excess);
        }
    }

    /// Forget dedicated engines that have closed
    fn prune_engines(&mut self) {
        self.engines.retain(HeadlessEngine::is_open);
    }

    /// Engine a window declaration lands on
    ///
    /// An explicit engine wins. A pipe alone picks an open engine bound to it,
    /// or starts an undeclared one (flagged `true`) that closes with its last
    /// window. Neither means the shared engine.
    fn engine_for(
        &self,
        pipe: Option<&HeadlessPipe>,
        engine: Option<&HeadlessEngine>,
    ) -> HeadlessResult<(HeadlessEngine, bool)> {
        if let Some(engine) = engine {
            return Ok((engine.clone(), false));
        }
        let Some(pipe) = pipe else {
            return Ok((self.shared_engine.clone(), false));
        };
        let bound = self
            .engines
            .iter()
            .find(|e| !e.is_released() && e.pipe().is_some_and(|p| p.ptr_eq(pipe)));
        if let Some(engine) = bound {
            return Ok((engine.clone(), false));
        }
        if !pipe.is_open() || pipe.is_released() {
            return Err(HeadlessError::PipeClosed(pipe.name()));
        }
        Ok((HeadlessEngine::new(&pipe.name(), Some(pipe.clone())), true))
    }

    fn created_ok(&mut self, kind: ResourceKind, name: &str) {
        log::debug!("Headless: created {} '{}'", kind, name);
        self.record(CallOp::Create, kind, name);
    }

    /// Run a destroy operation, translating failures and journaling success
    fn destroy_with(
        &mut self,
        kind: ResourceKind,
        name: &str,
        op: impl FnOnce(&mut Self) -> HeadlessResult<()>,
    ) -> SpecResult<()> {
        let result = if self.failing_destroys.contains(name) {
            Err(HeadlessError::Injected)
        } else {
            op(self)
        };
        result.map_err(|e| SpecError::DestructionFailed {
            name: name.to_string(),
            kind,
            reason: e.to_string(),
        })?;
        log::debug!("Headless: destroyed {} '{}'", kind, name);
        self.record(CallOp::Destroy, kind, name);
        Ok(())
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn creation_failed(kind: ResourceKind, name: &str) -> impl FnOnce(HeadlessError) -> SpecError + '_ {
    move |e| SpecError::CreationFailed {
        name: name.to_string(),
        kind,
        reason: e.to_string(),
    }
}

impl ResourceBackend for HeadlessBackend {
    type Pipe = HeadlessPipe;
    type Engine = HeadlessEngine;
    type Window = HeadlessWindow;
    type SceneRoot = HeadlessNode;
    type Camera = HeadlessNode;
    type DisplayRegion = HeadlessDisplayRegion;

    fn create_pipe(&mut self, decl: &PipeDecl) -> SpecResult<HeadlessPipe> {
        let module = decl.pipe_name.as_deref().unwrap_or("default");
        if !self.modules.iter().any(|m| m == module) {
            return Err(creation_failed(ResourceKind::Pipe, &decl.name)(
                HeadlessError::ModuleUnavailable(module.to_string()),
            ));
        }
        let pipe = HeadlessPipe::open(&decl.name, module);
        log::info!("Opened pipe '{}' on module '{}'", decl.name, module);
        self.created_ok(ResourceKind::Pipe, &decl.name);
        Ok(pipe)
    }

    fn destroy_pipe(&mut self, pipe: &HeadlessPipe) -> SpecResult<()> {
        self.destroy_with(ResourceKind::Pipe, &pipe.name(), |_| {
            pipe.release()?;
            log::info!("Released pipe '{}'", pipe.name());
            Ok(())
        })
    }

    fn create_engine(
        &mut self,
        decl: &EngineDecl,
        pipe: Option<&HeadlessPipe>,
    ) -> SpecResult<HeadlessEngine> {
        let engine = match pipe {
            None => self.shared_engine.clone(),
            Some(pipe) => {
                if !pipe.is_open() || pipe.is_released() {
                    return Err(creation_failed(ResourceKind::Engine, &decl.name)(
                        HeadlessError::PipeClosed(pipe.name()),
                    ));
                }
                let engine = HeadlessEngine::new(&decl.name, Some(pipe.clone()));
                self.engines.push(engine.clone());
                engine
            }
        };
        self.created_ok(ResourceKind::Engine, &decl.name);
        Ok(engine)
    }

    fn destroy_engine(&mut self, engine: &HeadlessEngine) -> SpecResult<()> {
        let name = engine.name();
        if engine.ptr_eq(&self.shared_engine) {
            // The shared engine outlives its declarations
            return self.destroy_with(ResourceKind::Engine, &name, |_| Ok(()));
        }
        self.destroy_with(ResourceKind::Engine, &name, |backend| {
            engine.release()?;
            backend.prune_engines();
            log::info!("Released engine '{}'", engine.name());
            Ok(())
        })
    }

    fn create_window(
        &mut self,
        decl: &WindowDecl,
        pipe: Option<&HeadlessPipe>,
        engine: Option<&HeadlessEngine>,
    ) -> SpecResult<HeadlessWindow> {
        let (engine, implicit) = self
            .engine_for(pipe, engine)
            .map_err(creation_failed(ResourceKind::Window, &decl.name))?;
        let size = decl.win_props.size.unwrap_or(DEFAULT_WINDOW_SIZE);
        let refuse = decl.flags.contains(CreationFlags::REFUSE_WINDOW)
            || self.failing_windows.contains(&decl.name);

        let opened = engine.open_window(&decl.name, size, decl.sort, refuse);
        if implicit {
            // Nobody declared this engine, so it lives exactly as long as its window
            engine
                .release()
                .map_err(creation_failed(ResourceKind::Window, &decl.name))?;
        }
        let window = opened.map_err(creation_failed(ResourceKind::Window, &decl.name))?;
        if implicit {
            self.engines.push(engine.clone());
        }
        log::info!(
            "Opened window '{}' ({}x{}) on engine '{}'",
            decl.name,
            size[0],
            size[1],
            engine.name()
        );
        self.created_ok(ResourceKind::Window, &decl.name);
        Ok(window)
    }

    fn destroy_window(&mut self, window: &HeadlessWindow) -> SpecResult<()> {
        self.destroy_with(ResourceKind::Window, &window.name(), |backend| {
            window.release()?;
            backend.prune_engines();
            Ok(())
        })
    }

    fn create_scene_root(&mut self, decl: &SceneRootDecl) -> SpecResult<HeadlessNode> {
        let node = HeadlessNode::root(&decl.name);
        self.created_ok(ResourceKind::SceneRoot, &decl.name);
        Ok(node)
    }

    fn destroy_scene_root(&mut self, root: &HeadlessNode) -> SpecResult<()> {
        self.destroy_with(ResourceKind::SceneRoot, &root.name(), |_| root.remove())
    }

    fn create_camera(&mut self, decl: &CameraDecl) -> SpecResult<HeadlessNode> {
        let camera = HeadlessNode::camera(&decl.name);
        self.created_ok(ResourceKind::Camera, &decl.name);
        Ok(camera)
    }

    fn destroy_camera(&mut self, camera: &HeadlessNode) -> SpecResult<()> {
        self.destroy_with(ResourceKind::Camera, &camera.name(), |_| camera.remove())
    }

    fn create_display_region(
        &mut self,
        decl: &DisplayRegionDecl,
        window: &HeadlessWindow,
        camera: Option<&HeadlessNode>,
    ) -> SpecResult<HeadlessDisplayRegion> {
        let region = window
            .make_region(&decl.name, decl.dimensions, camera.cloned())
            .map_err(creation_failed(ResourceKind::DisplayRegion, &decl.name))?;
        self.created_ok(ResourceKind::DisplayRegion, &decl.name);
        Ok(region)
    }

    fn destroy_display_region(&mut self, region: &HeadlessDisplayRegion) -> SpecResult<()> {
        self.destroy_with(ResourceKind::DisplayRegion, &region.name(), |backend| {
            match region.window() {
                Some(window) => window.remove_region(region)?,
                None => region.close_orphan()?,
            }
            backend.prune_engines();
            Ok(())
        })
    }

    fn render_frame(&mut self) -> SpecResult<()> {
        for engine in self.engines() {
            engine.render_frame();
        }
        self.frames += 1;
        Ok(())
    }
}

/// Match the camera's lens aspect ratio to the window's shape
pub fn refov(camera: &HeadlessNode, window: &HeadlessWindow) -> HeadlessResult<f32> {
    let aspect_ratio = window.aspect_ratio()?;
    camera.set_aspect_ratio(aspect_ratio)?;
    log::debug!(
        "Camera '{}' aspect ratio set to {:.3} from window '{}'",
        camera.name(),
        aspect_ratio,
        window.name()
    );
    Ok(aspect_ratio)
}
