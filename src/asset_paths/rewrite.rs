use std::path::{Path, PathBuf};

use crate::asset_paths::normalize::{normalize_path, relative_path, to_forward_slashes};
use crate::models::{AssetReference, PathMode, SkipReason};

/// Resolve an asset path to its normalised absolute form.
///
/// Absolute paths are normalised as-is. Relative paths need an absolute anchor directory;
/// without one the path is not guessed at and `None` is returned.
pub fn resolve_absolute(anchor_dir: Option<&Path>, path: &str) -> Option<PathBuf> {
    if path.is_empty() {
        return None;
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Some(normalize_path(candidate));
    }

    anchor_dir
        .map(|anchor| normalize_path(&anchor.join(candidate)))
        .filter(|resolved| resolved.is_absolute())
}

/// Convert a source asset reference into the value authored in the exported document.
///
/// Relative output is always computed against `output_dir`, the directory of the document
/// being written, never against the source anchor. The result only carries a `path`; the
/// exported document resolves it on its own.
pub fn rewrite_asset_path(
    anchor_dir: Option<&Path>,
    asset: &AssetReference,
    mode: PathMode,
    output_dir: &Path,
) -> Result<AssetReference, SkipReason> {
    let source = asset.resolution_input().ok_or(SkipReason::EmptyAssetPath)?;

    let absolute =
        resolve_absolute(anchor_dir, source).ok_or_else(|| SkipReason::AnchorUnresolvable {
            path: source.to_string(),
        })?;

    match mode {
        PathMode::Absolute => Ok(AssetReference::new(absolute.to_string_lossy())),
        PathMode::Relative => relative_path(&absolute, output_dir)
            .map(AssetReference::new)
            .ok_or_else(|| SkipReason::NotRelativizable {
                path: to_forward_slashes(&absolute),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_source_is_reanchored_at_output_directory() {
        let rewritten = rewrite_asset_path(
            Some(Path::new("/scene")),
            &AssetReference::new("textures/diffuse.mdl"),
            PathMode::Relative,
            Path::new("/export"),
        );
        assert_eq!(
            rewritten,
            Ok(AssetReference::new("../scene/textures/diffuse.mdl"))
        );
    }

    #[test]
    fn absolute_mode_normalises_the_resolved_path() {
        let rewritten = rewrite_asset_path(
            Some(Path::new("/scene/shots")),
            &AssetReference::new("../textures/./diffuse.mdl"),
            PathMode::Absolute,
            Path::new("/export"),
        );
        assert_eq!(
            rewritten,
            Ok(AssetReference::new("/scene/textures/diffuse.mdl"))
        );
    }

    #[test]
    fn absolute_sources_ignore_the_anchor() {
        let rewritten = rewrite_asset_path(
            None,
            &AssetReference::new("/lib/mdl/../mdl/base.mdl"),
            PathMode::Absolute,
            Path::new("/export"),
        );
        assert_eq!(rewritten, Ok(AssetReference::new("/lib/mdl/base.mdl")));
    }

    #[test]
    fn resolved_path_is_preferred_input() {
        let asset = AssetReference {
            path: "diffuse.mdl".into(),
            resolved_path: Some("/resolved/diffuse.mdl".into()),
        };
        let rewritten =
            rewrite_asset_path(None, &asset, PathMode::Relative, Path::new("/resolved/out"));
        assert_eq!(rewritten, Ok(AssetReference::new("../diffuse.mdl")));
    }

    #[test]
    fn relative_source_without_anchor_is_dropped() {
        let rewritten = rewrite_asset_path(
            None,
            &AssetReference::new("textures/diffuse.mdl"),
            PathMode::Absolute,
            Path::new("/export"),
        );
        assert_eq!(
            rewritten,
            Err(SkipReason::AnchorUnresolvable {
                path: "textures/diffuse.mdl".into()
            })
        );
    }

    #[test]
    fn relative_anchor_cannot_resolve_relative_sources() {
        for mode in [PathMode::Absolute, PathMode::Relative] {
            let rewritten = rewrite_asset_path(
                Some(Path::new("layers")),
                &AssetReference::new("tex/a.png"),
                mode,
                Path::new("/export"),
            );
            assert_eq!(
                rewritten,
                Err(SkipReason::AnchorUnresolvable {
                    path: "tex/a.png".into()
                }),
                "{mode}"
            );
        }
        assert_eq!(
            resolve_absolute(Some(Path::new("/scene")), "../../tex/a.png"),
            Some(PathBuf::from("/tex/a.png"))
        );
    }

    #[test]
    fn empty_reference_is_dropped() {
        let rewritten = rewrite_asset_path(
            Some(Path::new("/scene")),
            &AssetReference::default(),
            PathMode::Relative,
            Path::new("/export"),
        );
        assert_eq!(rewritten, Err(SkipReason::EmptyAssetPath));
    }

    #[test]
    fn relative_output_round_trips_to_absolute_output() {
        let output_dir = Path::new("/export/materials");
        let sources = [
            ("/scene", "textures/diffuse.mdl"),
            ("/scene/shots/010", "../../lib/base.mdl"),
            ("/export/materials", "local/tex.png"),
            ("/other", "/abs/./path/x.exr"),
        ];

        for (anchor, path) in sources {
            let asset = AssetReference::new(path);
            let absolute =
                rewrite_asset_path(Some(Path::new(anchor)), &asset, PathMode::Absolute, output_dir)
                    .unwrap();
            let relative =
                rewrite_asset_path(Some(Path::new(anchor)), &asset, PathMode::Relative, output_dir)
                    .unwrap();

            let rejoined = normalize_path(&output_dir.join(&relative.path));
            assert_eq!(rejoined, PathBuf::from(&absolute.path), "source {anchor} + {path}");
        }
    }
}
