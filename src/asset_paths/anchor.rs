use std::path::{Path, PathBuf};

use crate::asset_paths::filters::is_path_like_identifier;
use crate::models::{LayerIdentity, PropertySpecStack, parent_dir};

/// Find the directory that anchors relative asset paths authored on a property.
///
/// The stack is scanned strongest to weakest and the first layer that yields a directory
/// wins, whether or not that spec carries the value itself: the strongest opinion is where
/// the composed value currently lives. An empty stack, or one where no layer exposes a
/// usable location, yields `None` and the caller decides how to degrade.
pub fn resolve_anchor_dir(stack: &PropertySpecStack) -> Option<PathBuf> {
    let anchor = stack.iter().find_map(|spec| layer_anchor_dir(&spec.layer));
    tracing::trace!(layers = stack.len(), anchor = ?anchor, "resolved property anchor");
    anchor
}

/// Directory of a single layer, preferring its resolved filesystem path over the identifier.
pub fn layer_anchor_dir(layer: &LayerIdentity) -> Option<PathBuf> {
    if let Some(dir) = layer.real_path.as_deref().and_then(parent_dir) {
        return Some(dir);
    }

    if is_path_like_identifier(&layer.identifier) {
        return parent_dir(Path::new(&layer.identifier));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertySpec;

    fn spec(identifier: &str, real_path: Option<&str>, has_value: bool) -> PropertySpec {
        PropertySpec {
            layer: LayerIdentity::new(identifier, real_path.map(PathBuf::from)),
            has_value,
        }
    }

    #[test]
    fn empty_stack_has_no_anchor() {
        assert_eq!(resolve_anchor_dir(&PropertySpecStack::default()), None);
    }

    #[test]
    fn strongest_layer_wins_even_without_a_value() {
        let stack = PropertySpecStack::new(vec![
            spec("override.usda", Some("/shots/override.usda"), false),
            spec("base.usda", Some("/assets/base.usda"), true),
        ]);
        assert_eq!(resolve_anchor_dir(&stack), Some(PathBuf::from("/shots")));
    }

    #[test]
    fn prefers_real_path_over_identifier() {
        let stack = PropertySpecStack::new(vec![spec(
            "/logical/shot.usda",
            Some("/real/shot.usda"),
            true,
        )]);
        assert_eq!(resolve_anchor_dir(&stack), Some(PathBuf::from("/real")));
    }

    #[test]
    fn falls_back_to_identifier_directory() {
        let stack = PropertySpecStack::new(vec![spec("/scene/shot.usda", None, true)]);
        assert_eq!(resolve_anchor_dir(&stack), Some(PathBuf::from("/scene")));
    }

    #[test]
    fn skips_layers_without_a_location() {
        let stack = PropertySpecStack::new(vec![
            spec("anon:0x1:session.usda", None, true),
            spec("shot.usda", None, true),
            spec("/scene/base.usda", None, true),
        ]);
        assert_eq!(resolve_anchor_dir(&stack), Some(PathBuf::from("/scene")));
    }
}
