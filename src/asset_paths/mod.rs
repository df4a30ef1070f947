//! Path primitives for re-anchoring asset references in an exported document.
//!
//! Resolution happens in two steps that can be tested independently: the anchor resolver
//! picks the directory of the layer holding a property's strongest opinion, and the rewriter
//! turns the authored value into an absolute path and then into the requested output form.

mod anchor;
mod filters;
mod normalize;
mod rewrite;

pub use anchor::{layer_anchor_dir, resolve_anchor_dir};
pub use filters::is_path_like_identifier;
pub use normalize::{normalize_path, relative_path, to_forward_slashes};
pub use rewrite::{resolve_absolute, rewrite_asset_path};
