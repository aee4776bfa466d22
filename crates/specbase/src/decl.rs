//! Resource declarations
//!
//! A declaration describes a resource the caller *wants* to exist. It never
//! holds a live handle: references to other resources (`pipe`, `engine`,
//! `window_name`, `camera_name`) are plain names, resolved through the
//! registry when the declaration is materialized.

use crate::error::{SpecError, SpecResult};
use bitflags::bitflags;
use glam::Vec4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of resource kinds, in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Pipe,
    Engine,
    Window,
    SceneRoot,
    Camera,
    DisplayRegion,
}

impl ResourceKind {
    /// All kinds in creation order. Destruction walks this in reverse.
    pub const CREATION_ORDER: [ResourceKind; 6] = [
        Self::Pipe,
        Self::Engine,
        Self::Window,
        Self::SceneRoot,
        Self::Camera,
        Self::DisplayRegion,
    ];

    /// Position in the creation order
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Tag used in spec files
    pub fn tag(self) -> &'static str {
        match self {
            Self::Pipe => "pipe",
            Self::Engine => "engine",
            Self::Window => "window",
            Self::SceneRoot => "scene_root",
            Self::Camera => "camera",
            Self::DisplayRegion => "display_region",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipe => write!(f, "pipe"),
            Self::Engine => write!(f, "engine"),
            Self::Window => write!(f, "window"),
            Self::SceneRoot => write!(f, "scene root"),
            Self::Camera => write!(f, "camera"),
            Self::DisplayRegion => write!(f, "display region"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "pipe" => Ok(Self::Pipe),
            "engine" => Ok(Self::Engine),
            "window" => Ok(Self::Window),
            "scene_root" | "scene_graph" => Ok(Self::SceneRoot),
            "camera" => Ok(Self::Camera),
            "display_region" => Ok(Self::DisplayRegion),
            _ => Err(SpecError::UnknownKind(s.to_string())),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Frame-buffer requirements for a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameBufferProperties {
    pub color_bits: u32,
    pub alpha_bits: u32,
    pub depth_bits: u32,
    pub stencil_bits: u32,
    pub multisamples: u32,
    pub back_buffers: u32,
    pub srgb_color: bool,
}

impl Default for FrameBufferProperties {
    fn default() -> Self {
        Self {
            color_bits: 24,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 0,
            multisamples: 0,
            back_buffers: 1,
            srgb_color: false,
        }
    }
}

/// Window-level properties requested at creation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowProperties {
    /// Title bar text (defaults to the window's name)
    pub title: Option<String>,
    /// Size in pixels (backend default if unset)
    pub size: Option<[u32; 2]>,
    /// Position of the top-left corner in pixels
    pub origin: Option<[i32; 2]>,
    pub fullscreen: bool,
    pub undecorated: bool,
}

bitflags! {
    /// Flags controlling how the engine may satisfy a window request
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CreationFlags: u32 {
        /// Accept a surface even if the frame-buffer request can't be met
        const FB_PROPS_OPTIONAL = 1 << 0;
        const REFUSE_WINDOW = 1 << 1;
        const REQUIRE_WINDOW = 1 << 2;
        const REFUSE_PARASITE = 1 << 3;
        const REQUIRE_PARASITE = 1 << 4;
        const RESIZEABLE = 1 << 5;
        const CAN_BIND_COLOR = 1 << 6;
        const SIZE_TRACK_HOST = 1 << 7;
    }
}

impl Default for CreationFlags {
    fn default() -> Self {
        Self::FB_PROPS_OPTIONAL
    }
}

/// A graphics device ("pipe")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeDecl {
    pub name: String,
    /// Display module to load; `None` opens the default device
    #[serde(default)]
    pub pipe_name: Option<String>,
    #[serde(default = "default_true")]
    pub add_to_base: bool,
}

impl PipeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipe_name: None,
            add_to_base: true,
        }
    }

    /// Open a specific display module instead of the default device
    pub fn module(mut self, pipe_name: impl Into<String>) -> Self {
        self.pipe_name = Some(pipe_name.into());
        self
    }
}

/// A graphics engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineDecl {
    pub name: String,
    /// Pipe to bind to; `None` selects the shared engine
    #[serde(default)]
    pub pipe: Option<String>,
    #[serde(default = "default_true")]
    pub add_to_base: bool,
}

impl EngineDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipe: None,
            add_to_base: true,
        }
    }

    pub fn with_pipe(mut self, pipe: impl Into<String>) -> Self {
        self.pipe = Some(pipe.into());
        self
    }
}

/// An on-screen rendering surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDecl {
    pub name: String,
    #[serde(default)]
    pub pipe: Option<String>,
    /// Engine that owns the surface; `None` uses the default engine
    #[serde(default)]
    pub engine: Option<String>,
    /// Creation order among windows of the same engine
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub fb_props: FrameBufferProperties,
    #[serde(default)]
    pub win_props: WindowProperties,
    #[serde(default)]
    pub flags: CreationFlags,
    #[serde(default = "default_true")]
    pub add_to_base: bool,
}

impl WindowDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipe: None,
            engine: None,
            sort: 0,
            fb_props: FrameBufferProperties::default(),
            win_props: WindowProperties::default(),
            flags: CreationFlags::default(),
            add_to_base: true,
        }
    }

    pub fn with_pipe(mut self, pipe: impl Into<String>) -> Self {
        self.pipe = Some(pipe.into());
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn with_sort(mut self, sort: i32) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.win_props.size = Some([width, height]);
        self
    }

    pub fn with_flags(mut self, flags: CreationFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// An empty named scene graph root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRootDecl {
    pub name: String,
    #[serde(default = "default_true")]
    pub add_to_base: bool,
}

impl SceneRootDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            add_to_base: true,
        }
    }
}

/// A camera node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDecl {
    pub name: String,
    #[serde(default = "default_true")]
    pub add_to_base: bool,
}

impl CameraDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            add_to_base: true,
        }
    }
}

/// A viewport carved out of a window and bound to a camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRegionDecl {
    pub name: String,
    #[serde(default, alias = "window")]
    pub window_name: Option<String>,
    #[serde(default, alias = "camera")]
    pub camera_name: Option<String>,
    /// Normalized `(left, right, bottom, top)`; full surface when unset
    #[serde(default)]
    pub dimensions: Option<Vec4>,
    #[serde(default = "default_true")]
    pub add_to_base: bool,
}

impl DisplayRegionDecl {
    pub fn new(
        name: impl Into<String>,
        window_name: impl Into<String>,
        camera_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            window_name: Some(window_name.into()),
            camera_name: Some(camera_name.into()),
            dimensions: None,
            add_to_base: true,
        }
    }

    pub fn with_dimensions(mut self, left: f32, right: f32, bottom: f32, top: f32) -> Self {
        self.dimensions = Some(Vec4::new(left, right, bottom, top));
        self
    }

    fn validate(&self) -> SpecResult<()> {
        let Some(dims) = self.dimensions else {
            return Ok(());
        };
        let invalid = |reason: String| SpecError::InvalidDeclaration {
            name: self.name.clone(),
            reason,
        };
        if dims.to_array().iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(invalid(format!("dimensions {dims} fall outside [0, 1]")));
        }
        if dims.x > dims.y || dims.z > dims.w {
            return Err(invalid(format!("dimensions {dims} are inverted")));
        }
        Ok(())
    }
}

/// Keep whatever is registered under `name` as it is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepDecl {
    pub name: String,
}

/// One entry of a spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Pipe(PipeDecl),
    Engine(EngineDecl),
    Window(WindowDecl),
    #[serde(alias = "scene_graph")]
    SceneRoot(SceneRootDecl),
    Camera(CameraDecl),
    DisplayRegion(DisplayRegionDecl),
    Keep(KeepDecl),
}

impl Declaration {
    /// Keep-marker for `name`
    pub fn keep(name: impl Into<String>) -> Self {
        Self::Keep(KeepDecl { name: name.into() })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Pipe(d) => &d.name,
            Self::Engine(d) => &d.name,
            Self::Window(d) => &d.name,
            Self::SceneRoot(d) => &d.name,
            Self::Camera(d) => &d.name,
            Self::DisplayRegion(d) => &d.name,
            Self::Keep(d) => &d.name,
        }
    }

    /// Kind of resource declared; `None` for a Keep-marker
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Pipe(_) => Some(ResourceKind::Pipe),
            Self::Engine(_) => Some(ResourceKind::Engine),
            Self::Window(_) => Some(ResourceKind::Window),
            Self::SceneRoot(_) => Some(ResourceKind::SceneRoot),
            Self::Camera(_) => Some(ResourceKind::Camera),
            Self::DisplayRegion(_) => Some(ResourceKind::DisplayRegion),
            Self::Keep(_) => None,
        }
    }

    pub fn add_to_base(&self) -> bool {
        match self {
            Self::Pipe(d) => d.add_to_base,
            Self::Engine(d) => d.add_to_base,
            Self::Window(d) => d.add_to_base,
            Self::SceneRoot(d) => d.add_to_base,
            Self::Camera(d) => d.add_to_base,
            Self::DisplayRegion(d) => d.add_to_base,
            Self::Keep(_) => false,
        }
    }

    /// Hide (or expose) the resource from the context's attribute namespace
    pub fn exposed(mut self, add_to_base: bool) -> Self {
        match &mut self {
            Self::Pipe(d) => d.add_to_base = add_to_base,
            Self::Engine(d) => d.add_to_base = add_to_base,
            Self::Window(d) => d.add_to_base = add_to_base,
            Self::SceneRoot(d) => d.add_to_base = add_to_base,
            Self::Camera(d) => d.add_to_base = add_to_base,
            Self::DisplayRegion(d) => d.add_to_base = add_to_base,
            Self::Keep(_) => {}
        }
        self
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep(_))
    }

    /// Sort key used when flattening: kinds in creation order, Keep-markers last
    pub(crate) fn order_rank(&self) -> usize {
        self.kind()
            .map(ResourceKind::rank)
            .unwrap_or(ResourceKind::CREATION_ORDER.len())
    }

    /// Check the declaration on its own, without looking at the registry
    pub fn validate(&self) -> SpecResult<()> {
        if self.name().is_empty() {
            return Err(SpecError::InvalidDeclaration {
                name: String::new(),
                reason: "name is empty".into(),
            });
        }
        match self {
            Self::DisplayRegion(d) => d.validate(),
            _ => Ok(()),
        }
    }
}

impl From<PipeDecl> for Declaration {
    fn from(d: PipeDecl) -> Self {
        Self::Pipe(d)
    }
}

impl From<EngineDecl> for Declaration {
    fn from(d: EngineDecl) -> Self {
        Self::Engine(d)
    }
}

impl From<WindowDecl> for Declaration {
    fn from(d: WindowDecl) -> Self {
        Self::Window(d)
    }
}

impl From<SceneRootDecl> for Declaration {
    fn from(d: SceneRootDecl) -> Self {
        Self::SceneRoot(d)
    }
}

impl From<CameraDecl> for Declaration {
    fn from(d: CameraDecl) -> Self {
        Self::Camera(d)
    }
}

impl From<DisplayRegionDecl> for Declaration {
    fn from(d: DisplayRegionDecl) -> Self {
        Self::DisplayRegion(d)
    }
}

impl From<KeepDecl> for Declaration {
    fn from(d: KeepDecl) -> Self {
        Self::Keep(d)
    }
}
