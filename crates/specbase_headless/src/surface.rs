//! Pipes, engines, windows and display regions
//!
//! Ownership runs downwards: an engine holds its windows, a window holds its
//! display regions. Back-links (window → engine, region → window) are weak, so
//! dropping the last strong handle of an engine frees the whole tree.
//!
//! Releasing a resource never closes its dependents. A released pipe, engine
//! or window stays open for as long as something still runs on it and closes
//! when the last dependent goes.

use crate::error::{HeadlessError, HeadlessResult};
use crate::node::HeadlessNode;
use glam::Vec4;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Full-surface rectangle (left, right, bottom, top)
pub const FULL_SURFACE: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

/// Default window size when the declaration has none
pub const DEFAULT_WINDOW_SIZE: [u32; 2] = [800, 600];

#[derive(Debug)]
struct PipeState {
    name: String,
    module: String,
    /// Open engines bound to this pipe
    engines: usize,
    released: bool,
    open: bool,
}

/// Shared handle to an open graphics device
#[derive(Debug, Clone)]
pub struct HeadlessPipe {
    inner: Arc<RwLock<PipeState>>,
}

impl HeadlessPipe {
    pub(crate) fn open(name: &str, module: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PipeState {
                name: name.to_string(),
                module: module.to_string(),
                engines: 0,
                released: false,
                open: true,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// Display module this pipe was opened on
    pub fn module(&self) -> String {
        self.inner.read().module.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().open
    }

    /// Whether the pipe's owner let go of it
    pub fn is_released(&self) -> bool {
        self.inner.read().released
    }

    pub fn ptr_eq(&self, other: &HeadlessPipe) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Let go of the pipe; it closes once no engine runs on it
    pub(crate) fn release(&self) -> HeadlessResult<()> {
        let mut state = self.inner.write();
        if state.released {
            return Err(HeadlessError::AlreadyReleased(state.name.clone()));
        }
        state.released = true;
        if state.engines == 0 {
            state.open = false;
        }
        Ok(())
    }

    fn attach_engine(&self) {
        self.inner.write().engines += 1;
    }

    fn detach_engine(&self) {
        let mut state = self.inner.write();
        state.engines = state.engines.saturating_sub(1);
        if state.released && state.engines == 0 {
            state.open = false;
            log::debug!("Pipe '{}' closed with its last engine", state.name);
        }
    }
}

#[derive(Debug)]
struct EngineState {
    name: String,
    pipe: Option<HeadlessPipe>,
    windows: Vec<HeadlessWindow>,
    frames: u64,
    released: bool,
    open: bool,
}

/// Shared handle to a rendering engine
#[derive(Debug, Clone)]
pub struct HeadlessEngine {
    inner: Arc<RwLock<EngineState>>,
}

impl HeadlessEngine {
    pub(crate) fn new(name: &str, pipe: Option<HeadlessPipe>) -> Self {
        if let Some(pipe) = &pipe {
            pipe.attach_engine();
        }
        Self {
            inner: Arc::new(RwLock::new(EngineState {
                name: name.to_string(),
                pipe,
                windows: Vec::new(),
                frames: 0,
                released: false,
                open: true,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    pub fn pipe(&self) -> Option<HeadlessPipe> {
        self.inner.read().pipe.clone()
    }

    pub fn windows(&self) -> Vec<HeadlessWindow> {
        self.inner.read().windows.clone()
    }

    pub fn window_names(&self) -> Vec<String> {
        self.inner.read().windows.iter().map(HeadlessWindow::name).collect()
    }

    /// Frames this engine has rendered
    pub fn frames(&self) -> u64 {
        self.inner.read().frames
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().open
    }

    /// Whether the engine's owner let go of it
    pub fn is_released(&self) -> bool {
        self.inner.read().released
    }

    pub fn ptr_eq(&self, other: &HeadlessEngine) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Allocate a surface, or `NoSurface` if the engine refuses
    pub(crate) fn open_window(
        &self,
        name: &str,
        size: [u32; 2],
        sort: i32,
        refuse: bool,
    ) -> HeadlessResult<HeadlessWindow> {
        let mut state = self.inner.write();
        if !state.open || state.released {
            return Err(HeadlessError::EngineClosed(state.name.clone()));
        }
        if let Some(pipe) = &state.pipe {
            if !pipe.is_open() {
                return Err(HeadlessError::PipeClosed(pipe.name()));
            }
        }
        if refuse {
            return Err(HeadlessError::NoSurface(name.to_string()));
        }

        let window = HeadlessWindow {
            inner: Arc::new(RwLock::new(WindowState {
                name: name.to_string(),
                size,
                sort,
                engine: Arc::downgrade(&self.inner),
                regions: Vec::new(),
                frames: 0,
                released: false,
                open: true,
            })),
        };
        state.windows.push(window.clone());
        // Windows render in sort order
        state.windows.sort_by_key(HeadlessWindow::sort);
        Ok(window)
    }

    /// Close one of this engine's surfaces
    pub(crate) fn close_window(&self, window: &HeadlessWindow) -> HeadlessResult<()> {
        let mut state = self.inner.write();
        let before = state.windows.len();
        state.windows.retain(|w| !w.ptr_eq(window));
        if state.windows.len() == before {
            return Err(HeadlessError::AlreadyReleased(window.name()));
        }
        let idle = state.released && state.windows.is_empty();
        drop(state);
        window.close();
        if idle {
            self.shut_down();
        }
        Ok(())
    }

    /// Let go of the engine; it keeps rendering its remaining windows and
    /// closes after the last of them
    pub(crate) fn release(&self) -> HeadlessResult<()> {
        let mut state = self.inner.write();
        if state.released {
            return Err(HeadlessError::AlreadyReleased(state.name.clone()));
        }
        state.released = true;
        let idle = state.windows.is_empty();
        if !idle {
            log::debug!(
                "Engine '{}' released, still serving {} window(s)",
                state.name,
                state.windows.len()
            );
        }
        drop(state);
        if idle {
            self.shut_down();
        }
        Ok(())
    }

    /// Stop rendering and let go of the pipe
    fn shut_down(&self) {
        let pipe = {
            let mut state = self.inner.write();
            if !state.open {
                return;
            }
            state.open = false;
            state.pipe.clone()
        };
        if let Some(pipe) = pipe {
            pipe.detach_engine();
        }
    }

    /// Render then flip every open surface
    pub(crate) fn render_frame(&self) {
        let windows = {
            let mut state = self.inner.write();
            if !state.open {
                return;
            }
            state.frames += 1;
            state.windows.clone()
        };
        for window in windows {
            window.render();
        }
    }
}

#[derive(Debug)]
struct WindowState {
    name: String,
    size: [u32; 2],
    sort: i32,
    engine: Weak<RwLock<EngineState>>,
    regions: Vec<HeadlessDisplayRegion>,
    frames: u64,
    released: bool,
    open: bool,
}

/// Shared handle to a rendering surface
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    inner: Arc<RwLock<WindowState>>,
}

impl HeadlessWindow {
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    pub fn size(&self) -> [u32; 2] {
        self.inner.read().size
    }

    /// Resize the surface, as a window manager would
    pub fn set_size(&self, width: u32, height: u32) {
        self.inner.write().size = [width, height];
    }

    pub fn sort(&self) -> i32 {
        self.inner.read().sort
    }

    /// Width / height
    pub fn aspect_ratio(&self) -> HeadlessResult<f32> {
        let state = self.inner.read();
        let [width, height] = state.size;
        if height == 0 {
            return Err(HeadlessError::DegenerateWindow(state.name.clone()));
        }
        Ok(width as f32 / height as f32)
    }

    /// Owning engine, if it is still alive
    pub fn engine(&self) -> Option<HeadlessEngine> {
        self.inner
            .read()
            .engine
            .upgrade()
            .map(|inner| HeadlessEngine { inner })
    }

    pub fn regions(&self) -> Vec<HeadlessDisplayRegion> {
        self.inner.read().regions.clone()
    }

    /// Frames flipped on this surface
    pub fn frames(&self) -> u64 {
        self.inner.read().frames
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().open
    }

    /// Whether the window's owner let go of it
    pub fn is_released(&self) -> bool {
        self.inner.read().released
    }

    pub fn ptr_eq(&self, other: &HeadlessWindow) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Carve a viewport out of this surface
    pub(crate) fn make_region(
        &self,
        name: &str,
        dimensions: Option<Vec4>,
        camera: Option<HeadlessNode>,
    ) -> HeadlessResult<HeadlessDisplayRegion> {
        let mut state = self.inner.write();
        if !state.open || state.released {
            return Err(HeadlessError::WindowClosed(state.name.clone()));
        }
        if let Some(camera) = &camera {
            if !camera.is_camera() {
                return Err(HeadlessError::NotACamera(camera.name()));
            }
        }

        let region = HeadlessDisplayRegion {
            inner: Arc::new(RwLock::new(RegionState {
                name: name.to_string(),
                dimensions: dimensions.unwrap_or(FULL_SURFACE),
                camera,
                window: Arc::downgrade(&self.inner),
                renders: 0,
                open: true,
            })),
        };
        state.regions.push(region.clone());
        Ok(region)
    }

    /// Close one of this surface's viewports
    pub(crate) fn remove_region(&self, region: &HeadlessDisplayRegion) -> HeadlessResult<()> {
        let mut state = self.inner.write();
        let before = state.regions.len();
        state.regions.retain(|r| !r.ptr_eq(region));
        if state.regions.len() == before {
            return Err(HeadlessError::AlreadyReleased(region.name()));
        }
        let idle = state.released && state.regions.is_empty();
        drop(state);
        region.close();
        if idle {
            self.detach_from_engine()?;
        }
        Ok(())
    }

    /// Let go of the surface; it stays up while viewports remain on it
    pub(crate) fn release(&self) -> HeadlessResult<()> {
        let mut state = self.inner.write();
        if state.released {
            return Err(HeadlessError::AlreadyReleased(state.name.clone()));
        }
        state.released = true;
        let idle = state.regions.is_empty();
        if !idle {
            log::debug!(
                "Window '{}' released, still hosting {} region(s)",
                state.name,
                state.regions.len()
            );
        }
        drop(state);
        if idle {
            self.detach_from_engine()?;
        }
        Ok(())
    }

    fn detach_from_engine(&self) -> HeadlessResult<()> {
        match self.engine() {
            Some(engine) => engine.close_window(self),
            None => {
                self.close();
                Ok(())
            }
        }
    }

    fn close(&self) {
        self.inner.write().open = false;
    }

    fn render(&self) {
        let regions = {
            let mut state = self.inner.write();
            if !state.open {
                return;
            }
            state.frames += 1;
            state.regions.clone()
        };
        for region in regions {
            region.render();
        }
    }
}

#[derive(Debug)]
struct RegionState {
    name: String,
    dimensions: Vec4,
    camera: Option<HeadlessNode>,
    window: Weak<RwLock<WindowState>>,
    renders: u64,
    open: bool,
}

/// Shared handle to a viewport
#[derive(Debug, Clone)]
pub struct HeadlessDisplayRegion {
    inner: Arc<RwLock<RegionState>>,
}

impl HeadlessDisplayRegion {
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// (left, right, bottom, top) as fractions of the surface
    pub fn dimensions(&self) -> Vec4 {
        self.inner.read().dimensions
    }

    pub fn camera(&self) -> Option<HeadlessNode> {
        self.inner.read().camera.clone()
    }

    /// Bind a different camera, or none
    pub fn set_camera(&self, camera: Option<HeadlessNode>) {
        self.inner.write().camera = camera;
    }

    /// Owning window, if it is still alive
    pub fn window(&self) -> Option<HeadlessWindow> {
        self.inner
            .read()
            .window
            .upgrade()
            .map(|inner| HeadlessWindow { inner })
    }

    /// Frames in which this region drew through a camera
    pub fn renders(&self) -> u64 {
        self.inner.read().renders
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().open
    }

    pub fn ptr_eq(&self, other: &HeadlessDisplayRegion) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Close a viewport whose window is already gone
    pub(crate) fn close_orphan(&self) -> HeadlessResult<()> {
        let mut state = self.inner.write();
        if !state.open {
            return Err(HeadlessError::AlreadyReleased(state.name.clone()));
        }
        state.open = false;
        Ok(())
    }

    fn close(&self) {
        self.inner.write().open = false;
    }

    fn render(&self) {
        let mut state = self.inner.write();
        // Unbound regions draw nothing
        if state.open && state.camera.is_some() {
            state.renders += 1;
        }
    }
}
