//! Scene graph nodes
//!
//! Scene roots and cameras are both [`HeadlessNode`]s: a name, a weak link to
//! the parent and strong links to the children. Cameras additionally carry a
//! [`Lens`].

use crate::error::{HeadlessError, HeadlessResult};
use glam::Vec3;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Perspective lens parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    /// Horizontal field of view in degrees
    pub fov: f32,
    /// Width / height
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            fov: 40.0,
            aspect_ratio: 4.0 / 3.0,
            near: 1.0,
            far: 100_000.0,
        }
    }
}

#[derive(Debug)]
struct NodeState {
    name: String,
    lens: Option<Lens>,
    /// Position relative to the parent
    pos: Vec3,
    /// Heading, pitch, roll in degrees
    hpr: Vec3,
    parent: Option<Weak<RwLock<NodeState>>>,
    children: Vec<HeadlessNode>,
    removed: bool,
}

/// Shared handle to a scene graph node
#[derive(Debug, Clone)]
pub struct HeadlessNode {
    inner: Arc<RwLock<NodeState>>,
}

impl HeadlessNode {
    fn with_lens(name: &str, lens: Option<Lens>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(NodeState {
                name: name.to_string(),
                lens,
                pos: Vec3::ZERO,
                hpr: Vec3::ZERO,
                parent: None,
                children: Vec::new(),
                removed: false,
            })),
        }
    }

    /// An empty graph root
    pub fn root(name: &str) -> Self {
        Self::with_lens(name, None)
    }

    /// A camera node with a default lens
    pub fn camera(name: &str) -> Self {
        Self::with_lens(name, Some(Lens::default()))
    }

    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    pub fn is_camera(&self) -> bool {
        self.inner.read().lens.is_some()
    }

    pub fn lens(&self) -> Option<Lens> {
        self.inner.read().lens
    }

    /// Set the lens aspect ratio
    pub fn set_aspect_ratio(&self, aspect_ratio: f32) -> HeadlessResult<()> {
        let mut state = self.inner.write();
        let name = state.name.clone();
        let lens = state.lens.as_mut().ok_or(HeadlessError::NotACamera(name))?;
        lens.aspect_ratio = aspect_ratio;
        Ok(())
    }

    pub fn pos(&self) -> Vec3 {
        self.inner.read().pos
    }

    pub fn set_pos(&self, pos: Vec3) {
        self.inner.write().pos = pos;
    }

    pub fn hpr(&self) -> Vec3 {
        self.inner.read().hpr
    }

    pub fn set_hpr(&self, hpr: Vec3) {
        self.inner.write().hpr = hpr;
    }

    /// Move along the node's own forward axis (+Y rotated by the heading)
    pub fn move_forward(&self, distance: f32) {
        let mut state = self.inner.write();
        let heading = state.hpr.x.to_radians();
        let forward = Vec3::new(-heading.sin(), heading.cos(), 0.0);
        state.pos += forward * distance;
    }

    pub fn parent(&self) -> Option<HeadlessNode> {
        self.inner
            .read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| HeadlessNode { inner })
    }

    pub fn children(&self) -> Vec<HeadlessNode> {
        self.inner.read().children.clone()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.inner.read().children.iter().map(HeadlessNode::name).collect()
    }

    pub fn is_removed(&self) -> bool {
        self.inner.read().removed
    }

    pub fn ptr_eq(&self, other: &HeadlessNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Move this node under `parent`, detaching it from any previous parent
    ///
    /// Reparenting a node to itself is ignored.
    pub fn reparent_to(&self, parent: &HeadlessNode) {
        if self.ptr_eq(parent) {
            return;
        }
        self.detach();
        parent.inner.write().children.push(self.clone());
        self.inner.write().parent = Some(Arc::downgrade(&parent.inner));
    }

    /// Remove this node from its parent's children
    pub fn detach(&self) {
        let parent = self.inner.write().parent.take();
        if let Some(parent) = parent.and_then(|p| p.upgrade()) {
            parent.write().children.retain(|c| !c.ptr_eq(self));
        }
    }

    /// Detach and mark as freed; children are detached too
    pub(crate) fn remove(&self) -> HeadlessResult<()> {
        if self.is_removed() {
            return Err(HeadlessError::AlreadyReleased(self.name()));
        }
        self.detach();
        let children = std::mem::take(&mut self.inner.write().children);
        for child in children {
            child.inner.write().parent = None;
        }
        self.inner.write().removed = true;
        Ok(())
    }
}
