//! Recording backend for unit tests
//!
//! Handles are just the resource names. Every call lands in `calls`, so tests
//! can assert on exact creation and destruction order.

use crate::backend::ResourceBackend;
use crate::decl::{
    CameraDecl, DisplayRegionDecl, EngineDecl, PipeDecl, ResourceKind, SceneRootDecl, WindowDecl,
};
use crate::error::{SpecError, SpecResult};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Create,
    Destroy,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    pub calls: Vec<(Op, ResourceKind, String)>,
    pub fail_create: HashSet<String>,
    pub fail_destroy: HashSet<String>,
    pub frames: u64,
    /// Dependencies seen by the last display region creation
    pub last_region_deps: Option<(String, Option<String>)>,
}

impl RecordingBackend {
    pub fn created(&self) -> Vec<&str> {
        self.names_for(Op::Create)
    }

    pub fn destroyed(&self) -> Vec<&str> {
        self.names_for(Op::Destroy)
    }

    fn names_for(&self, op: Op) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|(o, _, _)| *o == op)
            .map(|(_, _, name)| name.as_str())
            .collect()
    }

    fn create(&mut self, kind: ResourceKind, name: &str) -> SpecResult<String> {
        if self.fail_create.contains(name) {
            return Err(SpecError::CreationFailed {
                name: name.to_string(),
                kind,
                reason: "injected failure".into(),
            });
        }
        self.calls.push((Op::Create, kind, name.to_string()));
        Ok(name.to_string())
    }

    fn destroy(&mut self, kind: ResourceKind, name: &str) -> SpecResult<()> {
        if self.fail_destroy.contains(name) {
            return Err(SpecError::DestructionFailed {
                name: name.to_string(),
                kind,
                reason: "injected failure".into(),
            });
        }
        self.calls.push((Op::Destroy, kind, name.to_string()));
        Ok(())
    }
}

impl ResourceBackend for RecordingBackend {
    type Pipe = String;
    type Engine = String;
    type Window = String;
    type SceneRoot = String;
    type Camera = String;
    type DisplayRegion = String;

    fn create_pipe(&mut self, decl: &PipeDecl) -> SpecResult<String> {
        self.create(ResourceKind::Pipe, &decl.name)
    }

    fn destroy_pipe(&mut self, pipe: &String) -> SpecResult<()> {
        self.destroy(ResourceKind::Pipe, pipe)
    }

    fn create_engine(&mut self, decl: &EngineDecl, _pipe: Option<&String>) -> SpecResult<String> {
        self.create(ResourceKind::Engine, &decl.name)
    }

    fn destroy_engine(&mut self, engine: &String) -> SpecResult<()> {
        self.destroy(ResourceKind::Engine, engine)
    }

    fn create_window(
        &mut self,
        decl: &WindowDecl,
        _pipe: Option<&String>,
        _engine: Option<&String>,
    ) -> SpecResult<String> {
        self.create(ResourceKind::Window, &decl.name)
    }

    fn destroy_window(&mut self, window: &String) -> SpecResult<()> {
        self.destroy(ResourceKind::Window, window)
    }

    fn create_scene_root(&mut self, decl: &SceneRootDecl) -> SpecResult<String> {
        self.create(ResourceKind::SceneRoot, &decl.name)
    }

    fn destroy_scene_root(&mut self, root: &String) -> SpecResult<()> {
        self.destroy(ResourceKind::SceneRoot, root)
    }

    fn create_camera(&mut self, decl: &CameraDecl) -> SpecResult<String> {
        self.create(ResourceKind::Camera, &decl.name)
    }

    fn destroy_camera(&mut self, camera: &String) -> SpecResult<()> {
        self.destroy(ResourceKind::Camera, camera)
    }

    fn create_display_region(
        &mut self,
        decl: &DisplayRegionDecl,
        window: &String,
        camera: Option<&String>,
    ) -> SpecResult<String> {
        self.last_region_deps = Some((window.clone(), camera.cloned()));
        self.create(ResourceKind::DisplayRegion, &decl.name)
    }

    fn destroy_display_region(&mut self, region: &String) -> SpecResult<()> {
        self.destroy(ResourceKind::DisplayRegion, region)
    }

    fn render_frame(&mut self) -> SpecResult<()> {
        self.frames += 1;
        Ok(())
    }
}
