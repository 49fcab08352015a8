//! Asset loading for the scenes.
//!
//! Scenes never load files themselves. They hand out `AssetRequest`s and the
//! host completes each one with the result of `load_asset`, possibly much
//! later and in any order.
use std::{path::Path, rc::Rc};

use tracing::debug;

use crate::{animation::AnimationClip, platform::load_as_string, scene_graph::NodeDesc};

mod obj_model;

pub use obj_model::load_obj_subtree;

/// A request for the host to load an asset on behalf of a scene.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
    /// Unique per scene instance. Echoed back with the completion.
    pub id: u64,
    /// Path relative to the content directory.
    pub path: String,
}

/// A loaded model, ready to merge into a scene.
#[derive(Clone, Debug)]
pub struct LoadedAsset {
    pub root: NodeDesc,
    pub clips: Vec<Rc<AnimationClip>>,
}

impl LoadedAsset {
    pub fn new(root: NodeDesc) -> Self {
        Self {
            root,
            clips: Vec::new(),
        }
    }

    pub fn with_clips(mut self, clips: Vec<AnimationClip>) -> Self {
        self.clips = clips.into_iter().map(Rc::new).collect();
        self
    }
}

/// Path of the optional clip file stored next to a model,
/// `models/foo.obj` → `models/foo.clips.json`.
pub fn clips_path(model_path: &Path) -> std::path::PathBuf {
    model_path.with_extension("clips.json")
}

/// Load the model at `path` along with the clips in its companion clip file.
/// A model without a clip file has no clips; a clip file that fails to parse
/// is an error.
#[tracing::instrument(level = "info")]
pub async fn load_asset(path: &str) -> anyhow::Result<LoadedAsset> {
    let model_path = Path::new(path);
    let name = model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path);

    let root = load_obj_subtree(model_path, name).await?;

    let clips = match load_as_string(clips_path(model_path)).await {
        Ok(json) => serde_json::from_str::<Vec<AnimationClip>>(&json)?,
        Err(error) => {
            debug!(%error, "model has no clip file");
            Vec::new()
        }
    };

    Ok(LoadedAsset::new(root).with_clips(clips))
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::scene_graph::NodeKind;

    #[test]
    fn clip_file_sits_next_to_the_model() {
        assert_eq!(
            Path::new("models/navbar_ico.clips.json"),
            clips_path(Path::new("models/navbar_ico.obj"))
        );
    }

    #[test]
    fn loads_bundled_model_with_clips() {
        let asset = pollster::block_on(load_asset("models/navbar_ico.obj")).unwrap();

        assert_eq!("navbar_ico", asset.root.name);
        assert_eq!("Icosahedron", asset.root.children[0].name);
        assert!(matches!(asset.root.children[0].kind, NodeKind::Mesh(ref m) if m.geometry.triangle_count() == 20));
        assert_eq!(1, asset.clips.len());
        assert_eq!("Icosahedron", asset.clips[0].tracks[0].target);
    }

    #[test]
    fn model_without_clips_loads() {
        let asset = pollster::block_on(load_asset("models/navbar_scene.obj")).unwrap();

        assert!(asset.clips.is_empty());
        assert_eq!(3, asset.root.node_count());
    }

    #[test]
    fn missing_model_is_an_error() {
        assert!(pollster::block_on(load_asset("models/missing.obj")).is_err());
    }
}
