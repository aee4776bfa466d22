//! Backend contract for rendering engine integrations
//!
//! The reconciler never talks to a graphics engine directly. It drives a
//! [`ResourceBackend`], which owns the engine bindings and hands back opaque
//! live handles. Each kind has exactly one create and one destroy operation;
//! creation receives the declaration plus already-resolved dependency handles.
//!
//! Destruction borrows the handle. The registry entry owns it; after a
//! successful `destroy_*` the reconciler removes the entry and the handle is
//! dropped right there, so pipes and engines are released deterministically
//! rather than whenever the last stray reference goes away.

use crate::decl::{
    CameraDecl, DisplayRegionDecl, EngineDecl, PipeDecl, ResourceKind, SceneRootDecl, WindowDecl,
};
use crate::error::SpecResult;
use std::fmt;

/// Per-kind creation and destruction of live engine resources
pub trait ResourceBackend {
    type Pipe;
    type Engine;
    type Window;
    type SceneRoot;
    type Camera;
    type DisplayRegion;

    /// Open the default graphics device, or the named display module
    fn create_pipe(&mut self, decl: &PipeDecl) -> SpecResult<Self::Pipe>;

    /// Release a pipe
    fn destroy_pipe(&mut self, pipe: &Self::Pipe) -> SpecResult<()>;

    /// Return the shared engine when `pipe` is `None`, otherwise build one bound to it
    fn create_engine(&mut self, decl: &EngineDecl, pipe: Option<&Self::Pipe>)
        -> SpecResult<Self::Engine>;

    /// Release an engine
    fn destroy_engine(&mut self, engine: &Self::Engine) -> SpecResult<()>;

    /// Ask an engine to allocate a rendering surface
    ///
    /// `engine` is `None` when the declaration names no engine; the backend
    /// then picks an engine on `pipe` if one is given, or its default engine
    /// otherwise. Fails with
    /// [`SpecError::CreationFailed`](crate::SpecError::CreationFailed) if the
    /// engine produces no surface.
    fn create_window(
        &mut self,
        decl: &WindowDecl,
        pipe: Option<&Self::Pipe>,
        engine: Option<&Self::Engine>,
    ) -> SpecResult<Self::Window>;

    /// Ask the owning engine to release a surface
    fn destroy_window(&mut self, window: &Self::Window) -> SpecResult<()>;

    /// Allocate an empty named graph root
    fn create_scene_root(&mut self, decl: &SceneRootDecl) -> SpecResult<Self::SceneRoot>;

    /// Detach and free a graph root
    fn destroy_scene_root(&mut self, root: &Self::SceneRoot) -> SpecResult<()>;

    /// Allocate a camera node wrapped in a graph-attachable handle
    fn create_camera(&mut self, decl: &CameraDecl) -> SpecResult<Self::Camera>;

    /// Detach and free a camera
    fn destroy_camera(&mut self, camera: &Self::Camera) -> SpecResult<()>;

    /// Carve a viewport out of `window`, bind `camera` and apply the rectangle
    fn create_display_region(
        &mut self,
        decl: &DisplayRegionDecl,
        window: &Self::Window,
        camera: Option<&Self::Camera>,
    ) -> SpecResult<Self::DisplayRegion>;

    /// Ask the owning window to release a viewport
    fn destroy_display_region(&mut self, region: &Self::DisplayRegion) -> SpecResult<()>;

    /// Render and flip one frame on every live engine
    fn render_frame(&mut self) -> SpecResult<()>;
}

/// A live resource of any kind
pub enum Handle<B: ResourceBackend> {
    Pipe(B::Pipe),
    Engine(B::Engine),
    Window(B::Window),
    SceneRoot(B::SceneRoot),
    Camera(B::Camera),
    DisplayRegion(B::DisplayRegion),
}

impl<B: ResourceBackend> Handle<B> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Pipe(_) => ResourceKind::Pipe,
            Self::Engine(_) => ResourceKind::Engine,
            Self::Window(_) => ResourceKind::Window,
            Self::SceneRoot(_) => ResourceKind::SceneRoot,
            Self::Camera(_) => ResourceKind::Camera,
            Self::DisplayRegion(_) => ResourceKind::DisplayRegion,
        }
    }

    pub fn as_pipe(&self) -> Option<&B::Pipe> {
        match self {
            Self::Pipe(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_engine(&self) -> Option<&B::Engine> {
        match self {
            Self::Engine(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_window(&self) -> Option<&B::Window> {
        match self {
            Self::Window(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_scene_root(&self) -> Option<&B::SceneRoot> {
        match self {
            Self::SceneRoot(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&B::Camera> {
        match self {
            Self::Camera(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_display_region(&self) -> Option<&B::DisplayRegion> {
        match self {
            Self::DisplayRegion(h) => Some(h),
            _ => None,
        }
    }
}

impl<B: ResourceBackend> fmt::Debug for Handle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle::{:?}", self.kind())
    }
}
