//! Specs: the caller's desired state
//!
//! A spec comes in two shapes:
//!
//! - **Flat**: an ordered list of [`Declaration`]s of any kind.
//! - **Grouped**: one ordered list per kind ([`GroupedSpec`]).
//!
//! Both are flattened into the same canonical order before reconciliation:
//! kinds in creation order, declaration order within a kind, Keep-markers last.
//!
//! # File format
//!
//! Grouped specs map naturally onto TOML arrays of tables:
//!
//! ```toml
//! [[pipe]]
//! name = "pipe"
//!
//! [[window]]
//! name = "win"
//! pipe = "pipe"
//!
//! [[camera]]
//! name = "cam"
//!
//! [[display_region]]
//! name = "win_dr3d"
//! window_name = "win"
//! camera_name = "cam"
//! dimensions = [0.0, 0.5, 0.0, 1.0]
//!
//! [[keep]]
//! name = "render"
//! ```
//!
//! Flat specs use a single `[[resource]]` array with a `kind` tag per entry.
//! JSON documents follow the same structure.

use crate::decl::{
    CameraDecl, Declaration, DisplayRegionDecl, EngineDecl, KeepDecl, PipeDecl, ResourceKind,
    SceneRootDecl, WindowDecl,
};
use crate::error::{SpecError, SpecResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Key of the flat declaration list in spec documents
const FLAT_KEY: &str = "resource";
/// Key of the Keep-marker list in grouped spec documents
const KEEP_KEY: &str = "keep";

/// Declarations grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupedSpec {
    pub pipe: Vec<PipeDecl>,
    pub engine: Vec<EngineDecl>,
    pub window: Vec<WindowDecl>,
    #[serde(alias = "scene_graph")]
    pub scene_root: Vec<SceneRootDecl>,
    pub camera: Vec<CameraDecl>,
    pub display_region: Vec<DisplayRegionDecl>,
    pub keep: Vec<KeepDecl>,
}

impl GroupedSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a declaration under its kind
    pub fn push(&mut self, decl: impl Into<Declaration>) {
        match decl.into() {
            Declaration::Pipe(d) => self.pipe.push(d),
            Declaration::Engine(d) => self.engine.push(d),
            Declaration::Window(d) => self.window.push(d),
            Declaration::SceneRoot(d) => self.scene_root.push(d),
            Declaration::Camera(d) => self.camera.push(d),
            Declaration::DisplayRegion(d) => self.display_region.push(d),
            Declaration::Keep(d) => self.keep.push(d),
        }
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, decl: impl Into<Declaration>) -> Self {
        self.push(decl);
        self
    }

    pub fn len(&self) -> usize {
        self.pipe.len()
            + self.engine.len()
            + self.window.len()
            + self.scene_root.len()
            + self.camera.len()
            + self.display_region.len()
            + self.keep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate the groups in creation order, Keep-markers last
    pub fn flatten(&self) -> Vec<Declaration> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.pipe.iter().cloned().map(Declaration::Pipe));
        out.extend(self.engine.iter().cloned().map(Declaration::Engine));
        out.extend(self.window.iter().cloned().map(Declaration::Window));
        out.extend(self.scene_root.iter().cloned().map(Declaration::SceneRoot));
        out.extend(self.camera.iter().cloned().map(Declaration::Camera));
        out.extend(self.display_region.iter().cloned().map(Declaration::DisplayRegion));
        out.extend(self.keep.iter().cloned().map(Declaration::Keep));
        out
    }
}

impl FromIterator<Declaration> for GroupedSpec {
    fn from_iter<I: IntoIterator<Item = Declaration>>(iter: I) -> Self {
        let mut grouped = Self::new();
        for decl in iter {
            grouped.push(decl);
        }
        grouped
    }
}

/// Desired state, flat or grouped
#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
    Flat(Vec<Declaration>),
    Grouped(GroupedSpec),
}

impl Default for Spec {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl Spec {
    /// Canonical declaration order for reconciliation
    pub fn flatten(&self) -> Vec<Declaration> {
        match self {
            Self::Flat(decls) => {
                let mut decls = decls.clone();
                // `sort_by_key` is stable, so declaration order survives within a kind
                decls.sort_by_key(Declaration::order_rank);
                decls
            }
            Self::Grouped(grouped) => grouped.flatten(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Flat(decls) => decls.len(),
            Self::Grouped(grouped) => grouped.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a spec from a TOML document
    pub fn from_toml_str(content: &str) -> SpecResult<Self> {
        let doc: serde_json::Value = toml::from_str(content)?;
        Self::from_document(doc)
    }

    /// Parse a spec from a JSON document
    pub fn from_json_str(content: &str) -> SpecResult<Self> {
        let doc: serde_json::Value = serde_json::from_str(content)?;
        Self::from_document(doc)
    }

    /// Load a spec file; `.json` files are read as JSON, anything else as TOML
    pub fn load(path: impl AsRef<Path>) -> SpecResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        log::debug!("Loading spec from {}", path.display());
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    fn from_document(doc: serde_json::Value) -> SpecResult<Self> {
        let serde_json::Value::Object(map) = doc else {
            return Err(SpecError::Config("spec document must be a table".into()));
        };

        let mut flat: Option<Vec<Declaration>> = None;
        let mut grouped = GroupedSpec::new();

        for (key, value) in map {
            if key == FLAT_KEY {
                flat = Some(serde_json::from_value(value)?);
                continue;
            }
            if key == KEEP_KEY {
                grouped.keep = serde_json::from_value(value)?;
                continue;
            }
            match key.parse::<ResourceKind>()? {
                ResourceKind::Pipe => grouped.pipe = serde_json::from_value(value)?,
                ResourceKind::Engine => grouped.engine = serde_json::from_value(value)?,
                ResourceKind::Window => grouped.window = serde_json::from_value(value)?,
                ResourceKind::SceneRoot => grouped.scene_root = serde_json::from_value(value)?,
                ResourceKind::Camera => grouped.camera = serde_json::from_value(value)?,
                ResourceKind::DisplayRegion => {
                    grouped.display_region = serde_json::from_value(value)?
                }
            }
        }

        match flat {
            Some(_) if !grouped.is_empty() => Err(SpecError::Config(format!(
                "spec mixes a flat `{FLAT_KEY}` list with grouped tables"
            ))),
            Some(decls) => Ok(Self::Flat(decls)),
            None => Ok(Self::Grouped(grouped)),
        }
    }
}

impl From<Vec<Declaration>> for Spec {
    fn from(decls: Vec<Declaration>) -> Self {
        Self::Flat(decls)
    }
}

impl From<GroupedSpec> for Spec {
    fn from(grouped: GroupedSpec) -> Self {
        Self::Grouped(grouped)
    }
}

impl FromIterator<Declaration> for Spec {
    fn from_iter<I: IntoIterator<Item = Declaration>>(iter: I) -> Self {
        Self::Flat(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::CreationFlags;

    fn names(decls: &[Declaration]) -> Vec<&str> {
        decls.iter().map(Declaration::name).collect()
    }

    #[test]
    fn test_flat_sort_is_stable_within_kind() {
        let spec = Spec::Flat(vec![
            DisplayRegionDecl::new("dr", "w", "c").into(),
            Declaration::keep("old"),
            CameraDecl::new("c").into(),
            WindowDecl::new("w").into(),
            CameraDecl::new("c2").into(),
            PipeDecl::new("pipe").into(),
            WindowDecl::new("w2").into(),
        ]);

        assert_eq!(
            names(&spec.flatten()),
            vec!["pipe", "w", "w2", "c", "c2", "dr", "old"]
        );
    }

    #[test]
    fn test_grouped_and_flat_agree() {
        let decls: Vec<Declaration> = vec![
            WindowDecl::new("w").into(),
            SceneRootDecl::new("r").into(),
            EngineDecl::new("engine").into(),
            Declaration::keep("k"),
            CameraDecl::new("c").into(),
        ];
        let flat = Spec::Flat(decls.clone());
        let grouped: GroupedSpec = decls.into_iter().collect();

        assert_eq!(flat.flatten(), Spec::Grouped(grouped).flatten());
    }

    #[test]
    fn test_parse_grouped_toml() {
        let content = r#"
[[pipe]]
name = "pipe"

[[engine]]
name = "engine"
pipe = "pipe"

[[window]]
name = "win"
pipe = "pipe"
sort = 2
flags = "FB_PROPS_OPTIONAL | RESIZEABLE"

[window.win_props]
title = "Main"
size = [1280, 720]

[[scene_graph]]
name = "render"

[[camera]]
name = "cam"
add_to_base = false

[[display_region]]
name = "win_dr3d"
window = "win"
camera = "cam"
dimensions = [0.0, 0.5, 0.0, 1.0]

[[keep]]
name = "aux"
"#;

        let spec = Spec::from_toml_str(content).unwrap();
        let Spec::Grouped(grouped) = &spec else {
            panic!("expected a grouped spec");
        };

        assert_eq!(grouped.window[0].sort, 2);
        assert_eq!(
            grouped.window[0].flags,
            CreationFlags::FB_PROPS_OPTIONAL | CreationFlags::RESIZEABLE
        );
        assert_eq!(grouped.window[0].win_props.size, Some([1280, 720]));
        assert_eq!(grouped.window[0].win_props.title.as_deref(), Some("Main"));
        assert_eq!(grouped.scene_root[0].name, "render");
        assert!(!grouped.camera[0].add_to_base);
        assert_eq!(grouped.display_region[0].window_name.as_deref(), Some("win"));
        assert_eq!(
            grouped.display_region[0].dimensions.unwrap().to_array(),
            [0.0, 0.5, 0.0, 1.0]
        );

        assert_eq!(
            names(&spec.flatten()),
            vec!["pipe", "engine", "win", "render", "cam", "win_dr3d", "aux"]
        );
    }

    #[test]
    fn test_parse_flat_toml() {
        let content = r#"
[[resource]]
kind = "display_region"
name = "dr"
window_name = "w"

[[resource]]
kind = "window"
name = "w"

[[resource]]
kind = "keep"
name = "r"
"#;

        let spec = Spec::from_toml_str(content).unwrap();
        assert!(matches!(spec, Spec::Flat(ref decls) if decls.len() == 3));
        assert_eq!(names(&spec.flatten()), vec!["w", "dr", "r"]);
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{
            "camera": [{ "name": "cam" }],
            "scene_root": [{ "name": "render" }]
        }"#;

        let spec = Spec::from_json_str(content).unwrap();
        assert_eq!(names(&spec.flatten()), vec!["render", "cam"]);
    }

    #[test]
    fn test_unknown_kind_table() {
        let content = r#"
[[lamp]]
name = "sun"
"#;
        assert!(matches!(
            Spec::from_toml_str(content),
            Err(SpecError::UnknownKind(tag)) if tag == "lamp"
        ));
    }

    #[test]
    fn test_mixed_shapes_rejected() {
        let content = r#"
[[resource]]
kind = "camera"
name = "cam"

[[window]]
name = "w"
"#;
        assert!(matches!(Spec::from_toml_str(content), Err(SpecError::Config(_))));
    }
}
