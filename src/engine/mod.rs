//! Scene graph engine interface consumed by the exporter.
//!
//! The exporter only ever talks to a [`Stage`]: it reads nodes, attributes and their
//! per-layer property stacks from the source, and issues a small set of authoring calls on
//! the destination. [`LayeredStage`] is the reference implementation, composing JSON/YAML
//! layer files and saving to JSON, YAML or USDA text.

mod layer_file;
mod layered;
mod usda;

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

use crate::asset_paths::layer_anchor_dir;
use crate::models::{LayerIdentity, PropertySpecStack, Value};

pub use layer_file::{LayerFile, LayerFormat, PrimRecord, PropertyRecord};
pub use layered::LayeredStage;
pub use usda::render_usda;

/// Errors raised by a scene graph engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading or writing a layer file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A layer file could not be parsed.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse {
        /// Layer file path.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// The layer format cannot be read or written by this engine.
    #[error("unsupported layer format: {}", path.display())]
    UnsupportedFormat {
        /// Offending path.
        path: PathBuf,
    },

    /// An authored value does not match its declared type.
    #[error("value of type {type_name} is malformed: {reason}")]
    InvalidValue {
        /// Declared value type.
        type_name: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// Authoring targeted a node that has not been defined.
    #[error("no prim at {0}")]
    UnknownNode(String),

    /// A prim or property path is syntactically invalid.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Serialising the layer for saving failed.
    #[error("failed to serialise layer: {0}")]
    Serialize(String),
}

/// A composed node as seen through the stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Absolute prim path.
    pub path: String,
    /// Strongest authored type name, if any.
    pub type_name: Option<String>,
}

impl Node {
    /// Returns `true` when the node's type name matches exactly.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.type_name.as_deref() == Some(type_name)
    }
}

/// Snapshot of a composed attribute.
#[derive(Debug)]
pub struct Attribute {
    /// Full property name, e.g. `inputs:diffuse_texture`.
    pub name: String,
    /// Declared value type name.
    pub type_name: String,
    value: Result<Option<Value>, EngineError>,
    stack: PropertySpecStack,
}

impl Attribute {
    /// Assemble a snapshot from its composed parts.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: Result<Option<Value>, EngineError>,
        stack: PropertySpecStack,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value,
            stack,
        }
    }

    /// Returns `true` when any layer carries a value opinion, readable or not.
    pub fn has_authored_value(&self) -> bool {
        self.stack.iter().any(|spec| spec.has_value)
    }

    /// The composed value, `None` when nothing is authored.
    pub fn get(&self) -> Result<Option<&Value>, &EngineError> {
        self.value.as_ref().map(Option::as_ref)
    }

    /// Per-layer opinions, strongest first.
    pub fn property_stack(&self) -> &PropertySpecStack {
        &self.stack
    }
}

/// Declared shader input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Name without the `inputs:` namespace.
    pub base_name: String,
    /// Declared value type name.
    pub type_name: String,
}

impl Input {
    /// Full property name of the input.
    pub fn property_name(&self) -> String {
        format!("{INPUTS_NAMESPACE}{}", self.base_name)
    }
}

/// Output socket of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Node owning the output.
    pub node: String,
    /// Full property name, e.g. `outputs:mdl:surface`.
    pub name: String,
    /// Declared value type name.
    pub type_name: String,
}

impl Output {
    /// Connection target string, `<node>.<property>`.
    pub fn target(&self) -> String {
        format!("{}.{}", self.node, self.name)
    }
}

/// Kind of property a connection points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Another node's output.
    Output,
    /// Another node's input (interface connection).
    Input,
    /// Anything else.
    Invalid,
}

/// Resolved upstream end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedSource {
    /// Upstream node path.
    pub node: String,
    /// Property base name on the upstream node.
    pub output_name: String,
    /// Kind of upstream property.
    pub source_type: SourceType,
}

impl ConnectedSource {
    /// Parse a `<node>.<property>` connection target.
    pub fn parse(target: &str) -> Option<Self> {
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let (node, property) = target.rsplit_once('.')?;
        if validate_prim_path(node).is_err() || property.is_empty() {
            return None;
        }

        let (output_name, source_type) = if let Some(name) = property.strip_prefix(OUTPUTS_NAMESPACE)
        {
            (name, SourceType::Output)
        } else if let Some(name) = property.strip_prefix(INPUTS_NAMESPACE) {
            (name, SourceType::Input)
        } else {
            (property, SourceType::Invalid)
        };

        Some(Self {
            node: node.to_string(),
            output_name: output_name.to_string(),
            source_type,
        })
    }
}

/// Namespace of shader inputs.
pub const INPUTS_NAMESPACE: &str = "inputs:";
/// Namespace of node outputs.
pub const OUTPUTS_NAMESPACE: &str = "outputs:";

/// Full property name of a material's surface output for a render context.
///
/// The empty context is the universal one, `outputs:surface`.
pub fn surface_output_name(render_context: &str) -> String {
    if render_context.is_empty() {
        format!("{OUTPUTS_NAMESPACE}surface")
    } else {
        format!("{OUTPUTS_NAMESPACE}{render_context}:surface")
    }
}

/// Composed scene document, readable for export and writable as a destination.
///
/// Capabilities that a node-oriented API would hang off node handles are expressed here as
/// path-addressed methods. A source stage is only ever borrowed immutably.
pub trait Stage {
    /// Identity of the root layer.
    fn root_layer(&self) -> &LayerIdentity;

    /// Node at `path`, `None` when no layer defines it.
    fn node(&self, path: &str) -> Option<Node>;

    /// Sorted names of every property authored on the node.
    fn property_names(&self, path: &str) -> Vec<String>;

    /// Composed attribute snapshot, `None` when the property does not exist.
    fn attribute(&self, path: &str, name: &str) -> Option<Attribute>;

    /// Upstream end of the connection authored on a property.
    fn connected_source(&self, path: &str, name: &str) -> Option<ConnectedSource>;

    /// Define (or retype) a node.
    fn define_node(&mut self, path: &str, type_name: &str) -> Result<Node, EngineError>;

    /// Create an attribute on a defined node, optionally setting its value.
    fn create_attribute(
        &mut self,
        path: &str,
        name: &str,
        type_name: &str,
        value: Option<&Value>,
    ) -> Result<(), EngineError>;

    /// Author a connection from `output` to `source`.
    fn connect_to_source(&mut self, output: &Output, source: &Output) -> Result<(), EngineError>;

    /// Mark a root-level node as the document's default prim.
    fn set_default_prim(&mut self, path: &str) -> Result<(), EngineError>;

    /// Persist the root layer, returning where it was written.
    fn save(&mut self) -> Result<PathBuf, EngineError>;

    /// Directory of the root layer, used to relativise exported asset paths.
    fn root_layer_directory(&self) -> Option<PathBuf> {
        layer_anchor_dir(self.root_layer())
    }

    /// Declared inputs of a shader node.
    fn inputs(&self, path: &str) -> Vec<Input> {
        self.property_names(path)
            .into_iter()
            .filter_map(|name| {
                let base_name = name.strip_prefix(INPUTS_NAMESPACE)?.to_string();
                let attribute = self.attribute(path, &name)?;
                Some(Input {
                    base_name,
                    type_name: attribute.type_name,
                })
            })
            .collect()
    }

    /// The material's surface output for a render context, if declared.
    fn surface_output(&self, path: &str, render_context: &str) -> Option<Output> {
        let name = surface_output_name(render_context);
        let attribute = self.attribute(path, &name)?;
        Some(Output {
            node: path.to_string(),
            name,
            type_name: attribute.type_name,
        })
    }

    /// Declare the material's surface output for a render context.
    fn create_surface_output(
        &mut self,
        path: &str,
        render_context: &str,
    ) -> Result<Output, EngineError> {
        let name = surface_output_name(render_context);
        declare_output(self, path, &name, "token")
    }

    /// Declare an output named `name` (without namespace) on a node.
    fn create_output(
        &mut self,
        path: &str,
        name: &str,
        type_name: &str,
    ) -> Result<Output, EngineError> {
        declare_output(self, path, &format!("{OUTPUTS_NAMESPACE}{name}"), type_name)
    }

    /// Declare an input on a shader node, optionally setting its value.
    fn create_input(
        &mut self,
        path: &str,
        base_name: &str,
        type_name: &str,
        value: Option<&Value>,
    ) -> Result<Input, EngineError> {
        self.create_attribute(
            path,
            &format!("{INPUTS_NAMESPACE}{base_name}"),
            type_name,
            value,
        )?;
        Ok(Input {
            base_name: base_name.to_string(),
            type_name: type_name.to_string(),
        })
    }
}

fn declare_output<S: Stage + ?Sized>(
    stage: &mut S,
    path: &str,
    name: &str,
    type_name: &str,
) -> Result<Output, EngineError> {
    stage.create_attribute(path, name, type_name, None)?;
    Ok(Output {
        node: path.to_string(),
        name: name.to_string(),
        type_name: type_name.to_string(),
    })
}

fn prim_path_pattern() -> &'static Regex {
    use std::sync::OnceLock;

    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(/[A-Za-z_][A-Za-z0-9_]*)+$").expect("invalid prim path regex")
    })
}

/// Check that `path` is an absolute prim path such as `/World/Looks/MyMat`.
pub fn validate_prim_path(path: &str) -> Result<(), EngineError> {
    if prim_path_pattern().is_match(path) {
        Ok(())
    } else {
        Err(EngineError::InvalidPath(path.to_string()))
    }
}

/// Parent prim path, `None` for root-level prims.
pub fn parent_prim_path(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(index) => Some(&path[..index]),
    }
}

/// Last element of a prim path.
pub fn prim_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns `true` when the two files are the same on disk.
pub(crate) fn same_document(left: &Path, right: &Path) -> bool {
    left.exists() && right.exists() && same_file::is_same_file(left, right).unwrap_or(false)
}
