//! Reconciler - diffs a spec against the registry and converges
//!
//! A respec runs in two phases:
//!
//! 1. **Plan** ([`Reconciler::plan`]): flatten the spec, validate every
//!    declaration, and work out which names must be created, which are kept,
//!    and which registry entries are obsolete. Planning never touches the
//!    backend.
//! 2. **Apply** ([`Reconciler::apply`]): create in kind order
//!    (Pipe → Engine → Window → SceneRoot → Camera → DisplayRegion), then
//!    destroy in the exact reverse order.
//!
//! References only ever point to an earlier kind, so the fixed kind order is
//! enough to guarantee dependencies exist before their dependents are created
//! and outlive them on teardown.
//!
//! A failure aborts the respec on the spot. Whatever was committed before the
//! failure stays committed; there is no rollback.

use crate::backend::{Handle, ResourceBackend};
use crate::decl::{Declaration, ResourceKind};
use crate::error::{SpecError, SpecResult};
use crate::registry::{Entry, Registry};
use crate::spec::Spec;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;

/// What to do with a Keep-marker whose name isn't registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeepPolicy {
    /// Treat it as a no-op; a Keep can't resurrect a resource
    #[default]
    Ignore,
    /// Fail the respec before any backend call
    Error,
}

/// The transition from the registry's contents to a spec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RespecPlan {
    /// Declarations to materialize, in creation order
    pub create: Vec<Declaration>,
    /// Registry entries to tear down, in destruction order
    pub destroy: Vec<(String, ResourceKind)>,
    /// Names that stay as they are (re-declared or Keep-marked)
    pub keep: Vec<String>,
    /// Keep-markers naming nothing in the registry
    pub missing_keep: Vec<String>,
}

impl RespecPlan {
    /// True if applying the plan would not call the backend at all
    pub fn is_noop(&self) -> bool {
        self.create.is_empty() && self.destroy.is_empty()
    }

    pub fn create_names(&self) -> Vec<&str> {
        self.create.iter().map(Declaration::name).collect()
    }

    pub fn destroy_names(&self) -> Vec<&str> {
        self.destroy.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// What a respec actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RespecReport {
    /// Created resources, in creation order
    pub created: Vec<(String, ResourceKind)>,
    /// Destroyed resources, in destruction order
    pub destroyed: Vec<(String, ResourceKind)>,
}

impl RespecReport {
    pub fn created_names(&self) -> Vec<&str> {
        self.created.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn destroyed_names(&self) -> Vec<&str> {
        self.destroyed.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty()
    }
}

/// Drives a backend and a registry towards a spec
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    missing_keep: MissingKeepPolicy,
}

impl Reconciler {
    pub fn new(missing_keep: MissingKeepPolicy) -> Self {
        Self { missing_keep }
    }

    pub fn missing_keep_policy(&self) -> MissingKeepPolicy {
        self.missing_keep
    }

    /// Plan and apply in one go
    pub fn respec<B: ResourceBackend>(
        &self,
        spec: &Spec,
        registry: &mut Registry<B>,
        backend: &mut B,
    ) -> SpecResult<RespecReport> {
        let plan = self.plan(spec, registry)?;
        self.apply(plan, registry, backend)
    }

    /// Work out the transition without executing it
    pub fn plan<B: ResourceBackend>(
        &self,
        spec: &Spec,
        registry: &Registry<B>,
    ) -> SpecResult<RespecPlan> {
        let mut plan = RespecPlan::default();
        let mut wanted: HashSet<String> = HashSet::new();
        let mut scheduled: HashSet<String> = HashSet::new();

        for decl in spec.flatten() {
            decl.validate()?;
            let name = decl.name().to_string();
            wanted.insert(name.clone());

            let Some(kind) = decl.kind() else {
                // Keep-markers sort last, so `scheduled` already holds every
                // name this spec creates
                if registry.contains(&name) || scheduled.contains(&name) {
                    plan.keep.push(name);
                } else if self.missing_keep == MissingKeepPolicy::Error {
                    return Err(SpecError::KeepTargetMissing(name));
                } else {
                    log::debug!("Keep-marker '{}' names nothing, ignoring", name);
                    plan.missing_keep.push(name);
                }
                continue;
            };

            if let Some(entry) = registry.get(&name) {
                if entry.kind() != kind {
                    log::warn!(
                        "'{}' is declared as a {} but registered as a {}; keeping the existing {}",
                        name,
                        kind,
                        entry.kind(),
                        entry.kind()
                    );
                }
                plan.keep.push(name);
                continue;
            }

            if !scheduled.insert(name.clone()) {
                log::warn!("'{}' is declared more than once; using the first declaration", name);
                continue;
            }
            plan.create.push(decl);
        }

        let mut obsolete: Vec<&Entry<B>> = registry
            .iter()
            .filter(|entry| !wanted.contains(entry.name()))
            .collect();
        obsolete.sort_by_key(|entry| (Reverse(entry.kind()), Reverse(entry.sequence)));
        plan.destroy = obsolete
            .into_iter()
            .map(|entry| (entry.name().to_string(), entry.kind()))
            .collect();

        log::debug!(
            "Respec plan: create {:?}, destroy {:?}, keep {:?}",
            plan.create_names(),
            plan.destroy_names(),
            plan.keep
        );
        Ok(plan)
    }

    /// Execute a plan: all creations first, then all destructions
    pub fn apply<B: ResourceBackend>(
        &self,
        plan: RespecPlan,
        registry: &mut Registry<B>,
        backend: &mut B,
    ) -> SpecResult<RespecReport> {
        let mut report = RespecReport::default();

        for decl in plan.create {
            // A name registered since planning is an idempotent re-declaration
            if registry.contains(decl.name()) {
                continue;
            }
            let handle = materialize(&decl, registry, backend)?;
            let name = decl.name().to_string();
            let kind = handle.kind();
            registry.insert(name.clone(), decl, handle)?;
            log::info!("Created {} '{}'", kind, name);
            report.created.push((name, kind));
        }

        for (name, kind) in plan.destroy {
            teardown(registry.lookup(&name)?, backend)?;
            // Dropping the entry releases the registry's ownership of the handle
            drop(registry.remove(&name)?);
            log::info!("Destroyed {} '{}'", kind, name);
            report.destroyed.push((name, kind));
        }

        Ok(report)
    }
}

/// Resolve an optional reference to a live handle of the expected kind
fn resolve<'r, B, T>(
    registry: &'r Registry<B>,
    decl: &Declaration,
    reference: Option<&str>,
    expected: ResourceKind,
    project: impl Fn(&'r Handle<B>) -> Option<&'r T>,
) -> SpecResult<Option<&'r T>>
where
    B: ResourceBackend,
{
    let Some(dependency) = reference else {
        return Ok(None);
    };
    let kind = decl.kind().unwrap_or(expected);
    let entry = registry
        .get(dependency)
        .ok_or_else(|| SpecError::DependencyNotFound {
            name: decl.name().to_string(),
            kind,
            dependency: dependency.to_string(),
        })?;
    project(&entry.handle)
        .map(Some)
        .ok_or_else(|| SpecError::InvalidDeclaration {
            name: decl.name().to_string(),
            reason: format!("'{}' is a {}, not a {}", dependency, entry.kind(), expected),
        })
}

/// Resolve dependencies and call the backend's create operation for `decl`
fn materialize<B: ResourceBackend>(
    decl: &Declaration,
    registry: &Registry<B>,
    backend: &mut B,
) -> SpecResult<Handle<B>> {
    match decl {
        Declaration::Pipe(d) => backend.create_pipe(d).map(Handle::Pipe),
        Declaration::Engine(d) => {
            let pipe = resolve(registry, decl, d.pipe.as_deref(), ResourceKind::Pipe, Handle::as_pipe)?;
            backend.create_engine(d, pipe).map(Handle::Engine)
        }
        Declaration::Window(d) => {
            let pipe = resolve(registry, decl, d.pipe.as_deref(), ResourceKind::Pipe, Handle::as_pipe)?;
            let engine = resolve(
                registry,
                decl,
                d.engine.as_deref(),
                ResourceKind::Engine,
                Handle::as_engine,
            )?;
            backend.create_window(d, pipe, engine).map(Handle::Window)
        }
        Declaration::SceneRoot(d) => backend.create_scene_root(d).map(Handle::SceneRoot),
        Declaration::Camera(d) => backend.create_camera(d).map(Handle::Camera),
        Declaration::DisplayRegion(d) => {
            let window_name = d.window_name.as_deref().ok_or_else(|| SpecError::InvalidDeclaration {
                name: d.name.clone(),
                reason: "a display region needs a window".into(),
            })?;
            let window = resolve(
                registry,
                decl,
                Some(window_name),
                ResourceKind::Window,
                Handle::as_window,
            )?
            .ok_or_else(|| SpecError::NotFound(window_name.to_string()))?;
            let camera = resolve(
                registry,
                decl,
                d.camera_name.as_deref(),
                ResourceKind::Camera,
                Handle::as_camera,
            )?;
            backend
                .create_display_region(d, window, camera)
                .map(Handle::DisplayRegion)
        }
        // Keep-markers have no backend operation
        Declaration::Keep(d) => Err(SpecError::UnknownKind(format!("keep ('{}')", d.name))),
    }
}

/// Call the backend's destroy operation for a registered resource
fn teardown<B: ResourceBackend>(entry: &Entry<B>, backend: &mut B) -> SpecResult<()> {
    match &entry.handle {
        Handle::Pipe(h) => backend.destroy_pipe(h),
        Handle::Engine(h) => backend.destroy_engine(h),
        Handle::Window(h) => backend.destroy_window(h),
        Handle::SceneRoot(h) => backend.destroy_scene_root(h),
        Handle::Camera(h) => backend.destroy_camera(h),
        Handle::DisplayRegion(h) => backend.destroy_display_region(h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{CameraDecl, DisplayRegionDecl, EngineDecl, PipeDecl, SceneRootDecl, WindowDecl};
    use crate::spec::GroupedSpec;
    use crate::testing::{Op, RecordingBackend};

    struct Fixture {
        reconciler: Reconciler,
        registry: Registry<RecordingBackend>,
        backend: RecordingBackend,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_policy(MissingKeepPolicy::Ignore)
        }

        fn with_policy(policy: MissingKeepPolicy) -> Self {
            Self {
                reconciler: Reconciler::new(policy),
                registry: Registry::new(),
                backend: RecordingBackend::default(),
            }
        }

        fn respec(&mut self, decls: Vec<Declaration>) -> SpecResult<RespecReport> {
            self.reconciler
                .respec(&Spec::Flat(decls), &mut self.registry, &mut self.backend)
        }

        fn names(&self) -> Vec<&str> {
            let mut names: Vec<_> = self.registry.names().into_iter().collect();
            names.sort_unstable();
            names
        }
    }

    fn first_spec() -> Vec<Declaration> {
        vec![
            WindowDecl::new("w").into(),
            SceneRootDecl::new("r").into(),
            CameraDecl::new("c").into(),
            DisplayRegionDecl::new("dr", "w", "c")
                .with_dimensions(0.0, 0.5, 0.0, 1.0)
                .into(),
        ]
    }

    fn second_spec() -> Vec<Declaration> {
        vec![
            Declaration::keep("w"),
            WindowDecl::new("w2").into(),
            Declaration::keep("r"),
            CameraDecl::new("c2").into(),
            Declaration::keep("c"),
            DisplayRegionDecl::new("dr2", "w2", "c2")
                .with_dimensions(0.5, 1.0, 0.0, 1.0)
                .into(),
            Declaration::keep("dr"),
        ]
    }

    #[test]
    fn test_creates_in_kind_order() {
        let mut fx = Fixture::new();
        let report = fx
            .respec(vec![
                DisplayRegionDecl::new("dr", "w", "c").into(),
                CameraDecl::new("c").into(),
                SceneRootDecl::new("r").into(),
                WindowDecl::new("w").with_pipe("pipe").with_engine("engine").into(),
                EngineDecl::new("engine").with_pipe("pipe").into(),
                PipeDecl::new("pipe").into(),
            ])
            .unwrap();

        assert_eq!(fx.backend.created(), vec!["pipe", "engine", "w", "r", "c", "dr"]);
        assert_eq!(report.created_names(), fx.backend.created());
        assert_eq!(
            fx.backend.last_region_deps,
            Some(("w".to_string(), Some("c".to_string())))
        );
    }

    #[test]
    fn test_respec_is_idempotent() {
        let mut fx = Fixture::new();
        fx.respec(first_spec()).unwrap();
        let calls_after_first = fx.backend.calls.len();

        let report = fx.respec(first_spec()).unwrap();
        assert!(report.is_noop());
        assert_eq!(fx.backend.calls.len(), calls_after_first);
        assert_eq!(fx.names(), vec!["c", "dr", "r", "w"]);
    }

    #[test]
    fn test_keep_markers_preserve_entries() {
        let mut fx = Fixture::new();
        fx.respec(first_spec()).unwrap();
        let report = fx.respec(second_spec()).unwrap();

        assert_eq!(report.created_names(), vec!["w2", "c2", "dr2"]);
        assert!(report.destroyed.is_empty());
        assert!(fx.backend.destroyed().is_empty());
        assert_eq!(fx.names(), vec!["c", "c2", "dr", "dr2", "r", "w", "w2"]);
    }

    #[test]
    fn test_teardown_in_reverse_kind_order() {
        let mut fx = Fixture::new();
        fx.respec(first_spec()).unwrap();
        fx.respec(second_spec()).unwrap();

        let report = fx
            .respec(vec![
                WindowDecl::new("w2").into(),
                SceneRootDecl::new("r").into(),
                CameraDecl::new("c2").into(),
                DisplayRegionDecl::new("dr2", "w2", "c2").into(),
            ])
            .unwrap();

        assert!(report.created.is_empty());
        assert_eq!(report.destroyed_names(), vec!["dr", "c", "w"]);
        assert_eq!(fx.backend.destroyed(), vec!["dr", "c", "w"]);
        assert_eq!(fx.names(), vec!["c2", "dr2", "r", "w2"]);
    }

    #[test]
    fn test_destroy_within_kind_is_reverse_creation() {
        let mut fx = Fixture::new();
        fx.respec(vec![
            CameraDecl::new("a").into(),
            CameraDecl::new("b").into(),
            CameraDecl::new("c").into(),
        ])
        .unwrap();

        fx.respec(vec![]).unwrap();
        assert_eq!(fx.backend.destroyed(), vec!["c", "b", "a"]);
        assert!(fx.registry.is_empty());
    }

    #[test]
    fn test_missing_dependency_fails_fast() {
        let mut fx = Fixture::new();
        let err = fx
            .respec(vec![
                WindowDecl::new("w").into(),
                CameraDecl::new("c").into(),
                DisplayRegionDecl::new("dr", "nowhere", "c").into(),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            SpecError::DependencyNotFound { ref name, kind: ResourceKind::DisplayRegion, ref dependency }
                if name == "dr" && dependency == "nowhere"
        ));
        // Earlier creations stay committed
        assert_eq!(fx.names(), vec!["c", "w"]);
    }

    #[test]
    fn test_wrong_dependency_kind() {
        let mut fx = Fixture::new();
        let err = fx
            .respec(vec![
                CameraDecl::new("c").into(),
                EngineDecl::new("engine").with_pipe("c").into(),
            ])
            .unwrap_err();

        assert!(matches!(err, SpecError::InvalidDeclaration { ref name, .. } if name == "engine"));
    }

    #[test]
    fn test_display_region_requires_window() {
        let mut fx = Fixture::new();
        let mut region = DisplayRegionDecl::new("dr", "w", "c");
        region.window_name = None;

        let err = fx.respec(vec![region.into()]).unwrap_err();
        assert!(matches!(err, SpecError::InvalidDeclaration { .. }));
        assert!(fx.backend.calls.is_empty());
    }

    #[test]
    fn test_unbound_display_region() {
        let mut fx = Fixture::new();
        let mut region = DisplayRegionDecl::new("dr", "w", "c");
        region.camera_name = None;

        fx.respec(vec![WindowDecl::new("w").into(), region.into()]).unwrap();
        assert_eq!(fx.backend.last_region_deps, Some(("w".to_string(), None)));
    }

    #[test]
    fn test_no_rollback_on_creation_failure() {
        let mut fx = Fixture::new();
        fx.backend.fail_create.insert("c".into());

        let err = fx.respec(first_spec()).unwrap_err();
        assert!(matches!(err, SpecError::CreationFailed { ref name, .. } if name == "c"));
        assert_eq!(fx.names(), vec!["r", "w"]);

        // Retrying after the fault clears finishes the job without recreating
        fx.backend.fail_create.clear();
        let report = fx.respec(first_spec()).unwrap();
        assert_eq!(report.created_names(), vec!["c", "dr"]);
    }

    #[test]
    fn test_destruction_failure_keeps_entry() {
        let mut fx = Fixture::new();
        fx.respec(first_spec()).unwrap();
        fx.backend.fail_destroy.insert("c".into());

        let err = fx.respec(vec![]).unwrap_err();
        assert!(matches!(err, SpecError::DestructionFailed { ref name, .. } if name == "c"));
        // dr went first; c and everything after it are still registered
        assert_eq!(fx.backend.destroyed(), vec!["dr"]);
        assert_eq!(fx.names(), vec!["c", "r", "w"]);
    }

    #[test]
    fn test_missing_keep_ignored_by_default() {
        let mut fx = Fixture::new();
        let plan = fx
            .reconciler
            .plan(&Spec::Flat(vec![Declaration::keep("ghost")]), &fx.registry)
            .unwrap();
        assert_eq!(plan.missing_keep, vec!["ghost"]);
        assert!(plan.is_noop());

        fx.respec(vec![Declaration::keep("ghost")]).unwrap();
        assert!(fx.registry.is_empty());
    }

    #[test]
    fn test_missing_keep_error_policy() {
        let mut fx = Fixture::with_policy(MissingKeepPolicy::Error);
        let err = fx
            .respec(vec![WindowDecl::new("w").into(), Declaration::keep("ghost")])
            .unwrap_err();

        assert!(matches!(err, SpecError::KeepTargetMissing(ref n) if n == "ghost"));
        // Planning failed, so the backend was never called
        assert!(fx.backend.calls.is_empty());
    }

    #[test]
    fn test_keep_for_name_created_in_same_spec() {
        let mut fx = Fixture::with_policy(MissingKeepPolicy::Error);
        fx.respec(vec![Declaration::keep("w"), WindowDecl::new("w").into()])
            .unwrap();
        assert_eq!(fx.names(), vec!["w"]);
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let mut fx = Fixture::new();
        fx.respec(vec![
            CameraDecl::new("x").into(),
            Declaration::from(CameraDecl::new("x")).exposed(false),
        ])
        .unwrap();

        assert_eq!(fx.backend.created(), vec!["x"]);
        assert!(fx.registry.lookup("x").unwrap().declaration.add_to_base());
    }

    #[test]
    fn test_kind_mismatch_keeps_existing() {
        let mut fx = Fixture::new();
        fx.respec(vec![CameraDecl::new("x").into()]).unwrap();
        let report = fx.respec(vec![SceneRootDecl::new("x").into()]).unwrap();

        assert!(report.is_noop());
        assert_eq!(fx.registry.lookup("x").unwrap().kind(), ResourceKind::Camera);
    }

    #[test]
    fn test_plan_does_not_touch_backend() {
        let mut fx = Fixture::new();
        fx.respec(first_spec()).unwrap();
        let calls = fx.backend.calls.len();

        let plan = fx
            .reconciler
            .plan(&Spec::Flat(second_spec()), &fx.registry)
            .unwrap();
        assert_eq!(plan.create_names(), vec!["w2", "c2", "dr2"]);
        assert!(plan.destroy.is_empty());
        assert_eq!(plan.keep, vec!["w", "r", "c", "dr"]);
        assert_eq!(fx.backend.calls.len(), calls);
    }

    #[test]
    fn test_grouped_spec_matches_flat() {
        let mut flat = Fixture::new();
        flat.respec(first_spec()).unwrap();

        let mut grouped = Fixture::new();
        let spec: GroupedSpec = first_spec().into_iter().collect();
        grouped
            .reconciler
            .respec(&Spec::Grouped(spec), &mut grouped.registry, &mut grouped.backend)
            .unwrap();

        assert_eq!(flat.backend.calls, grouped.backend.calls);
        assert!(grouped.backend.calls.iter().all(|(op, _, _)| *op == Op::Create));
    }
}
