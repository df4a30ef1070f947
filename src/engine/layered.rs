//! Reference stage composing a root layer and its sublayers.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::asset_paths::normalize_path;
use crate::engine::layer_file::{LayerFile, LayerFormat, PropertyRecord, decode_value, encode_value};
use crate::engine::{
  Attribute, ConnectedSource, EngineError, Node, Output, Stage, parent_prim_path, prim_name,
  same_document, validate_prim_path,
};
use crate::models::{LayerIdentity, PropertySpec, PropertySpecStack, Value};

#[derive(Debug)]
struct LoadedLayer {
  identity: LayerIdentity,
  file: LayerFile,
}

/// Stage backed by a stack of layer files, strongest first.
///
/// The root layer is index zero and is the only layer authoring calls write to. Sublayers
/// follow depth first, so a sublayer's own sublayers sit directly beneath it.
#[derive(Debug)]
pub struct LayeredStage {
  layers: Vec<LoadedLayer>,
}

impl LayeredStage {
  /// Open a layer file and compose its sublayers.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let path = path.as_ref();
    let mut layers = Vec::new();
    let mut visited = HashSet::new();
    load_layer_stack(
      path,
      path.to_string_lossy().into_owned(),
      &mut layers,
      &mut visited,
    )?;

    tracing::debug!(root = %path.display(), layers = layers.len(), "opened layer stack");
    Ok(Self { layers })
  }

  /// Create an empty stage whose root layer will be saved at `path`.
  ///
  /// Nothing is written until [`Stage::save`] is called.
  pub fn create_new(path: impl AsRef<Path>) -> Result<Self, EngineError> {
    let path = path.as_ref();
    LayerFormat::from_path(path)?;
    let real_path = absolute_path(path)?;

    Ok(Self {
      layers: vec![LoadedLayer {
        identity: LayerIdentity::new(path.to_string_lossy(), Some(real_path)),
        file: LayerFile::default(),
      }],
    })
  }

  /// Create an in-memory stage with no file location.
  pub fn anonymous(tag: &str) -> Self {
    Self {
      layers: vec![LoadedLayer {
        identity: LayerIdentity::new(format!("anon:{tag}"), None),
        file: LayerFile::default(),
      }],
    }
  }

  /// Identities of every layer in the stack, strongest first.
  pub fn layer_stack(&self) -> impl Iterator<Item = &LayerIdentity> {
    self.layers.iter().map(|layer| &layer.identity)
  }

  /// Returns `true` when `path` is the same file as any layer in the stack.
  pub fn uses_file(&self, path: &Path) -> bool {
    self
      .layer_stack()
      .filter_map(|layer| layer.real_path.as_deref())
      .any(|layer_path| same_document(layer_path, path))
  }

  /// Default prim name from the strongest layer that declares one.
  pub fn default_prim(&self) -> Option<&str> {
    self
      .layers
      .iter()
      .find_map(|layer| layer.file.default_prim.as_deref())
  }

  /// Root layer contents as currently authored.
  pub fn root_layer_file(&self) -> &LayerFile {
    &self.root().file
  }

  fn root(&self) -> &LoadedLayer {
    &self.layers[0]
  }

  fn root_mut(&mut self) -> &mut LoadedLayer {
    &mut self.layers[0]
  }

  fn property_records<'a>(
    &'a self,
    path: &'a str,
    name: &'a str,
  ) -> impl Iterator<Item = (&'a LoadedLayer, &'a PropertyRecord)> + 'a {
    self.layers.iter().filter_map(move |layer| {
      layer
        .file
        .prims
        .get(path)
        .and_then(|prim| prim.properties.get(name))
        .map(|record| (layer, record))
    })
  }
}

fn absolute_path(path: &Path) -> Result<PathBuf, EngineError> {
  std::path::absolute(path)
    .map(|absolute| normalize_path(&absolute))
    .map_err(|source| EngineError::Io {
      path: path.to_path_buf(),
      source,
    })
}

fn load_layer_stack(
  path: &Path,
  identifier: String,
  layers: &mut Vec<LoadedLayer>,
  visited: &mut HashSet<PathBuf>,
) -> Result<(), EngineError> {
  let real_path = absolute_path(path)?;
  if !visited.insert(real_path.clone()) {
    tracing::debug!(layer = %real_path.display(), "skipping sublayer cycle");
    return Ok(());
  }

  let file = LayerFile::load(&real_path)?;
  let base_dir = real_path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_default();
  let sub_layers = file.sub_layers.clone();

  layers.push(LoadedLayer {
    identity: LayerIdentity::new(identifier, Some(real_path)),
    file,
  });

  for sub_layer in sub_layers {
    let sub_path = base_dir.join(&sub_layer);
    let sub_identifier = sub_path.to_string_lossy().into_owned();
    load_layer_stack(&sub_path, sub_identifier, layers, visited)?;
  }

  Ok(())
}

impl Stage for LayeredStage {
  fn root_layer(&self) -> &LayerIdentity {
    &self.root().identity
  }

  fn node(&self, path: &str) -> Option<Node> {
    let mut specs = self
      .layers
      .iter()
      .filter_map(|layer| layer.file.prims.get(path))
      .peekable();
    specs.peek()?;

    Some(Node {
      path: path.to_string(),
      type_name: specs.find_map(|prim| prim.type_name.clone()),
    })
  }

  fn property_names(&self, path: &str) -> Vec<String> {
    self
      .layers
      .iter()
      .filter_map(|layer| layer.file.prims.get(path))
      .flat_map(|prim| prim.properties.keys().cloned())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  fn attribute(&self, path: &str, name: &str) -> Option<Attribute> {
    let records: Vec<(&LoadedLayer, &PropertyRecord)> = self.property_records(path, name).collect();
    let (_, strongest) = records.first()?;
    let type_name = strongest.type_name.clone();

    let value = records
      .iter()
      .find_map(|(_, record)| record.value.as_ref())
      .map(|raw| decode_value(&type_name, raw))
      .transpose();

    let stack = PropertySpecStack::new(
      records
        .iter()
        .map(|(layer, record)| PropertySpec {
          layer: layer.identity.clone(),
          has_value: record.value.is_some(),
        })
        .collect(),
    );

    Some(Attribute::new(name, type_name, value, stack))
  }

  fn connected_source(&self, path: &str, name: &str) -> Option<ConnectedSource> {
    self
      .property_records(path, name)
      .find_map(|(_, record)| record.connect.as_deref())
      .and_then(ConnectedSource::parse)
  }

  fn define_node(&mut self, path: &str, type_name: &str) -> Result<Node, EngineError> {
    validate_prim_path(path)?;
    let prim = self
      .root_mut()
      .file
      .prims
      .entry(path.to_string())
      .or_default();
    prim.type_name = Some(type_name.to_string());

    Ok(Node {
      path: path.to_string(),
      type_name: Some(type_name.to_string()),
    })
  }

  fn create_attribute(
    &mut self,
    path: &str,
    name: &str,
    type_name: &str,
    value: Option<&Value>,
  ) -> Result<(), EngineError> {
    if name.is_empty() || name.starts_with(':') || name.ends_with(':') {
      return Err(EngineError::InvalidPath(format!("{path}.{name}")));
    }
    if self.node(path).is_none() {
      return Err(EngineError::UnknownNode(path.to_string()));
    }

    let prim = self
      .root_mut()
      .file
      .prims
      .entry(path.to_string())
      .or_default();
    let record = prim
      .properties
      .entry(name.to_string())
      .or_insert_with(|| PropertyRecord::declare(type_name));
    record.type_name = type_name.to_string();
    if let Some(value) = value {
      record.value = Some(encode_value(value));
    }

    Ok(())
  }

  fn connect_to_source(&mut self, output: &Output, source: &Output) -> Result<(), EngineError> {
    if self.node(&source.node).is_none() {
      return Err(EngineError::UnknownNode(source.node.clone()));
    }
    self.create_attribute(&output.node, &output.name, &output.type_name, None)?;

    let record = self
      .root_mut()
      .file
      .prims
      .get_mut(&output.node)
      .and_then(|prim| prim.properties.get_mut(&output.name))
      .ok_or_else(|| EngineError::UnknownNode(output.node.clone()))?;
    record.connect = Some(source.target());
    Ok(())
  }

  fn set_default_prim(&mut self, path: &str) -> Result<(), EngineError> {
    validate_prim_path(path)?;
    if parent_prim_path(path).is_some() {
      return Err(EngineError::InvalidPath(format!(
        "default prim must be a root prim: {path}"
      )));
    }
    if self.node(path).is_none() {
      return Err(EngineError::UnknownNode(path.to_string()));
    }

    self.root_mut().file.default_prim = Some(prim_name(path).to_string());
    Ok(())
  }

  fn save(&mut self) -> Result<PathBuf, EngineError> {
    let root = self.root();
    let path = root
      .identity
      .real_path
      .clone()
      .ok_or_else(|| EngineError::InvalidPath(root.identity.identifier.clone()))?;

    let written = root.file.write(&path)?;
    tracing::info!(path = %written.display(), "saved layer");
    Ok(written)
  }
}
