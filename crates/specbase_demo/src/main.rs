//! SpecBase demo
//!
//! Walks a headless scene through three specs:
//! 1. one window with a camera showing the left half of it
//! 2. a second window and camera added next to the first
//! 3. the first window closed again
//!
//! then renders until the frame budget runs out.
//!
//! Run with: cargo run -p specbase_demo
//!       or: cargo run --bin specbase-demo -- path/to/specs

use glam::Vec3;
use specbase::{render_frame_task, ContextConfig, SpecBase, SpecError};
use specbase_headless::{refov, HeadlessBackend, HeadlessError, HeadlessNode};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the demo's spec files
const SPEC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/specs");

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Headless(#[from] HeadlessError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{0}' is not exposed")]
    Missing(&'static str),
}

type DemoResult<T> = Result<T, DemoError>;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let spec_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SPEC_DIR));

    if let Err(e) = run(&spec_dir) {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Context config from `context.toml` next to the specs, then the environment
fn load_config(spec_dir: &Path) -> DemoResult<ContextConfig> {
    let path = spec_dir.join("context.toml");
    let mut config = if path.exists() {
        log::info!("Loaded context config from {}", path.display());
        ContextConfig::load(&path)?
    } else {
        ContextConfig::default()
    };

    if let Ok(frames) = std::env::var("SPECBASE_FRAMES") {
        match frames.parse() {
            Ok(frames) => {
                config.max_frames = Some(frames);
                log::info!("Frame budget from env: {}", frames);
            }
            Err(_) => log::warn!("Ignoring SPECBASE_FRAMES={:?}", frames),
        }
    }

    Ok(config)
}

fn run(spec_dir: &Path) -> DemoResult<()> {
    let config = load_config(spec_dir)?;
    let mut base = SpecBase::new(HeadlessBackend::new(), config);

    base.respec_file(spec_dir.join("first.toml"))?;

    // Now that the renderer exists, set up the scene
    let render = base.scene_root("render").ok_or(DemoError::Missing("render"))?.clone();
    let cam = base.camera("cam").ok_or(DemoError::Missing("cam"))?;
    cam.reparent_to(&render);
    cam.set_pos(Vec3::new(0.0, -10.0, 0.0));
    refov(cam, base.window("win").ok_or(DemoError::Missing("win"))?)?;

    let model = HeadlessNode::root("smiley");
    model.reparent_to(&render);
    base.step()?;

    // Change the scene at runtime by handing over the intended state
    base.respec_file(spec_dir.join("second.toml"))?;

    let cam_2 = base.camera("cam_2").ok_or(DemoError::Missing("cam_2"))?;
    cam_2.reparent_to(&render);
    cam_2.set_hpr(Vec3::new(45.0, 0.0, 0.0));
    cam_2.move_forward(-10.0);
    refov(cam_2, base.window("win_2").ok_or(DemoError::Missing("win_2"))?)?;
    base.step()?;

    // Close the first window
    base.respec_file(spec_dir.join("third.toml"))?;
    log::info!("Scene graph under 'render': {:?}", render.child_names());

    println!("{}", serde_json::to_string_pretty(&base.snapshot())?);

    base.add_task("render_frame", render_frame_task::<HeadlessBackend>());
    let frames = base.run()?;

    for engine in base.backend().engines() {
        log::info!(
            "Engine '{}': {} frames, windows {:?}",
            engine.name(),
            engine.frames(),
            engine.window_names()
        );
    }
    log::info!("Rendered {} frames ({} total)", frames, base.frame_count());
    Ok(())
}
