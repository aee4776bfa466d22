//! Replays the demo's spec files against the headless backend

use specbase::*;
use specbase_headless::*;
use std::path::PathBuf;

fn spec_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../specbase_demo/specs"))
}

fn demo_base() -> SpecBase<HeadlessBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = ContextConfig::load(spec_dir().join("context.toml")).unwrap();
    SpecBase::new(HeadlessBackend::new(), config)
}

fn registry_names(base: &SpecBase<HeadlessBackend>) -> Vec<String> {
    let mut names: Vec<String> = base.registry().names().into_iter().map(String::from).collect();
    names.sort();
    names
}

#[test]
fn test_demo_context_config() {
    let base = demo_base();
    assert_eq!(base.config().missing_keep, MissingKeepPolicy::Error);
    assert_eq!(base.config().max_frames, Some(120));
    assert!(base.config().expose_attributes);
    assert!(base.config().task_manager);
}

#[test]
fn test_demo_stages() {
    let mut base = demo_base();
    let dir = spec_dir();

    let first = base.respec_file(dir.join("first.toml")).unwrap();
    assert_eq!(
        first.created_names(),
        vec!["pipe", "engine", "win", "render", "cam", "win_dr3d"]
    );
    assert!(first.destroyed.is_empty());
    let engine = base.engine("engine").unwrap().clone();
    assert!(!engine.ptr_eq(base.backend().shared_engine()));
    assert_eq!(base.window("win").unwrap().size(), [800, 600]);
    let first_window = base.window("win").unwrap().clone();

    let second = base.respec_file(dir.join("second.toml")).unwrap();
    assert_eq!(second.created_names(), vec!["win_2", "cam_2", "win_dr3d_2"]);
    assert!(second.destroyed.is_empty());
    assert_eq!(engine.window_names(), vec!["win", "win_2"]);
    assert_eq!(base.window("win_2").unwrap().size(), [1024, 576]);

    let third = base.respec_file(dir.join("third.toml")).unwrap();
    assert!(third.created.is_empty());
    assert_eq!(third.destroyed_names(), vec!["win_dr3d", "cam", "win"]);
    assert_eq!(
        registry_names(&base),
        vec!["cam_2", "engine", "pipe", "render", "win_2", "win_dr3d_2"]
    );
    assert!(!first_window.is_open());
    assert_eq!(engine.window_names(), vec!["win_2"]);

    base.add_task("render_frame", render_frame_task::<HeadlessBackend>());
    assert_eq!(base.run().unwrap(), 120);
    assert_eq!(engine.frames(), 120);
    assert_eq!(base.display_region("win_dr3d_2").unwrap().renders(), 120);
}
