//! # SpecBase
//!
//! Declarative management of a rendering engine's top-level resources:
//! graphics pipes, engines, windows, scene roots, cameras and display regions.
//!
//! Callers describe the desired set of named resources as a [`Spec`] and hand
//! it to [`SpecBase::respec`]. The reconciler compares it with what currently
//! exists and brings the world in line:
//!
//! ```text
//! Spec ──► flatten ──► plan (diff vs Registry) ──► create (kind order) ──► destroy (reverse)
//!                                                        │                        │
//!                                                        ▼                        ▼
//!                                               ResourceBackend            Registry / attributes
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Idempotent** - applying the same spec twice does nothing the second time
//! 2. **Minimal** - only names that appear or disappear touch the backend
//! 3. **Ordered** - Pipe → Engine → Window → SceneRoot → Camera → DisplayRegion on
//!    creation, the exact reverse on destruction
//! 4. **No rollback** - a failure leaves earlier steps committed
//!
//! The engine itself sits behind [`ResourceBackend`]; see the
//! `specbase_headless` crate for an in-memory implementation.

pub mod backend;
pub mod config;
pub mod context;
pub mod decl;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod spec;
pub mod task;

#[cfg(test)]
mod testing;

pub use backend::{Handle, ResourceBackend};
pub use config::ContextConfig;
pub use context::SpecBase;
pub use decl::{
    CameraDecl, CreationFlags, Declaration, DisplayRegionDecl, EngineDecl, FrameBufferProperties,
    KeepDecl, PipeDecl, ResourceKind, SceneRootDecl, WindowDecl, WindowProperties,
};
pub use error::{SpecError, SpecResult};
pub use reconcile::{MissingKeepPolicy, Reconciler, RespecPlan, RespecReport};
pub use registry::{Entry, EntrySummary, Registry, RegistrySnapshot};
pub use spec::{GroupedSpec, Spec};
pub use task::{render_frame_task, render_frame_task_for, TaskFn, TaskManager, TaskStatus};
