//! Shading network export: locate a material's MDL shader and re-author it in a new document.

use std::path::{Path, PathBuf};

use crate::asset_paths::{resolve_anchor_dir, rewrite_asset_path};
use crate::config::ExportConfig;
use crate::engine::{Attribute, EngineError, LayeredStage, Node, Stage};
use crate::error::{ExportError, ExportResult};
use crate::models::{
  AssetReference, ExportReport, PathMode, PropertyOutcome, PropertyStatus, SkipReason, Value,
};
use crate::selection::PropertySelection;

const MATERIAL_TYPE: &str = "Material";
const SHADER_TYPE: &str = "Shader";
const ROOT_TYPE: &str = "Xform";
const SCOPE_TYPE: &str = "Scope";
const ID_PROPERTY: &str = "info:id";
const ID_TYPE: &str = "token";
const SOURCE_ASSET_PROPERTY: &str = "info:mdl:sourceAsset";

/// What to export from the source document.
#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
  /// Material prim path in the source document.
  pub material_path: &'a str,
  /// Shader prim path; followed from the material's surface output when absent.
  pub shader_path: Option<&'a str>,
  /// How asset references are written.
  pub path_mode: PathMode,
}

/// High-level helper exporting one material's shading network.
pub struct MaterialExporter<'a> {
  config: &'a ExportConfig,
  selection: PropertySelection,
}

impl<'a> MaterialExporter<'a> {
  /// Create an exporter for the provided configuration.
  pub fn new(config: &'a ExportConfig) -> Self {
    Self {
      config,
      selection: PropertySelection::from_config(config),
    }
  }

  /// Open `input`, export the requested material into a new document at `output`, and save it.
  ///
  /// The output is refused when it names any layer the source document is composed from.
  pub fn export_file(
    &self,
    input: &Path,
    output: &Path,
    request: &ExportRequest<'_>,
  ) -> ExportResult<ExportReport> {
    let source = LayeredStage::open(input).map_err(|source| ExportError::OpenFailure {
      path: input.to_path_buf(),
      source,
    })?;

    if source.uses_file(output) {
      return Err(ExportError::OverwritesSource {
        path: output.to_path_buf(),
      });
    }

    let mut destination =
      LayeredStage::create_new(output).map_err(|source| ExportError::OutputCreation {
        path: output.to_path_buf(),
        source,
      })?;

    self.export(&source, request, &mut destination)
  }

  /// Export the requested material from `source` into `destination` and save `destination`.
  ///
  /// Material and shader are located before anything is authored, so a lookup failure
  /// leaves the destination untouched and unsaved. Problems with individual properties are
  /// recorded in the returned report and never abort the export.
  #[tracing::instrument(skip_all, fields(material = request.material_path, mode = %request.path_mode))]
  pub fn export<S: Stage, D: Stage>(
    &self,
    source: &S,
    request: &ExportRequest<'_>,
    destination: &mut D,
  ) -> ExportResult<ExportReport> {
    let material = locate_material(source, request.material_path)?;
    let shader = self.locate_shader(source, &material, request.shader_path)?;
    tracing::info!(shader = %shader.path, "exporting shading network");

    let material_path = self.config.material_path();
    let shader_path = self.config.shader_path();
    let output_dir = destination.root_layer_directory().unwrap_or_default();

    define(destination, &self.config.root_path(), ROOT_TYPE)?;
    define(destination, &self.config.looks_path(), SCOPE_TYPE)?;
    define(destination, &material_path, MATERIAL_TYPE)?;
    define(destination, &shader_path, SHADER_TYPE)?;

    let mut network = NetworkWriter {
      source,
      destination: &mut *destination,
      source_shader: &shader.path,
      shader_path: &shader_path,
      output_dir: &output_dir,
      path_mode: request.path_mode,
      outcomes: Vec::new(),
    };

    network.copy_shader_id(&self.config.default_shader_id)?;
    network.copy_implementation_properties(&self.selection)?;

    let surface = network
      .destination
      .create_output(
        &shader_path,
        &self.config.surface_output_name,
        &self.config.surface_output_type,
      )
      .map_err(|source| authoring_error(&shader_path, source))?;

    network.copy_inputs()?;
    let outcomes = network.outcomes;

    let material_output = match destination.surface_output(&material_path, &self.config.render_context)
    {
      Some(output) => output,
      None => destination
        .create_surface_output(&material_path, &self.config.render_context)
        .map_err(|source| authoring_error(&material_path, source))?,
    };
    destination
      .connect_to_source(&material_output, &surface)
      .map_err(|source| authoring_error(&material_output.target(), source))?;

    let root_path = self.config.root_path();
    destination
      .set_default_prim(&root_path)
      .map_err(|source| authoring_error(&root_path, source))?;

    let output = destination.save().map_err(|source| ExportError::SaveFailure {
      path: destination
        .root_layer()
        .real_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(&destination.root_layer().identifier)),
      source,
    })?;

    let report = ExportReport {
      source_material: material.path,
      source_shader: shader.path,
      material: material_path,
      shader: shader_path,
      path_mode: request.path_mode,
      output,
      properties: outcomes,
    };
    tracing::info!(
      output = %report.output.display(),
      properties = report.properties.len(),
      skipped = report.skipped().count(),
      "export complete"
    );
    Ok(report)
  }

  fn locate_shader<S: Stage>(
    &self,
    source: &S,
    material: &Node,
    explicit: Option<&str>,
  ) -> ExportResult<Node> {
    if let Some(path) = explicit {
      return source.node(path).ok_or_else(|| ExportError::ShaderNotFound {
        path: path.to_string(),
      });
    }

    let not_locatable = || ExportError::ShaderNotLocatable {
      material: material.path.clone(),
    };
    let output = source
      .surface_output(&material.path, &self.config.render_context)
      .ok_or_else(not_locatable)?;
    let connected = source
      .connected_source(&output.node, &output.name)
      .ok_or_else(not_locatable)?;

    tracing::debug!(
      shader = %connected.node,
      output = %connected.output_name,
      "followed material surface connection"
    );
    source.node(&connected.node).ok_or_else(not_locatable)
  }
}

fn locate_material<S: Stage>(source: &S, path: &str) -> ExportResult<Node> {
  let node = source
    .node(path)
    .ok_or_else(|| ExportError::MaterialNotFound {
      path: path.to_string(),
    })?;

  if !node.is_a(MATERIAL_TYPE) {
    return Err(ExportError::NotAMaterial {
      path: path.to_string(),
      found: node.type_name.clone().unwrap_or_else(|| "<none>".to_string()),
    });
  }
  Ok(node)
}

fn define<D: Stage>(destination: &mut D, path: &str, type_name: &str) -> ExportResult<()> {
  destination
    .define_node(path, type_name)
    .map(|_| ())
    .map_err(|source| authoring_error(path, source))
}

fn authoring_error(path: &str, source: EngineError) -> ExportError {
  ExportError::Authoring {
    path: path.to_string(),
    source,
  }
}

/// Per-export state for copying shader properties.
struct NetworkWriter<'s, S, D> {
  source: &'s S,
  destination: &'s mut D,
  source_shader: &'s str,
  shader_path: &'s str,
  output_dir: &'s Path,
  path_mode: PathMode,
  outcomes: Vec<PropertyOutcome>,
}

impl<S: Stage, D: Stage> NetworkWriter<'_, S, D> {
  fn copy_shader_id(&mut self, default_id: &str) -> ExportResult<()> {
    let attribute = self
      .source
      .attribute(self.source_shader, ID_PROPERTY)
      .filter(Attribute::has_authored_value);

    let authored = match attribute.as_ref().map(Attribute::get) {
      Some(Ok(Some(value))) => Ok(value.clone()),
      Some(Err(err)) => Err(SkipReason::PropertyReadFailure {
        message: err.to_string(),
      }),
      None | Some(Ok(None)) => Err(SkipReason::NotAuthored),
    };

    let (value, status) = match authored {
      Ok(value) => (value, PropertyStatus::Copied),
      Err(cause) => (
        Value::Token(default_id.to_string()),
        PropertyStatus::Defaulted {
          value: default_id.to_string(),
          cause,
        },
      ),
    };

    self.author(ID_PROPERTY, ID_TYPE, Some(&value))?;
    self.record(ID_PROPERTY, status);
    Ok(())
  }

  fn copy_implementation_properties(&mut self, selection: &PropertySelection) -> ExportResult<()> {
    let names: Vec<String> = self
      .source
      .property_names(self.source_shader)
      .into_iter()
      .filter(|name| selection.is_included(name))
      .collect();

    for name in names {
      let Some(attribute) = self.source.attribute(self.source_shader, &name) else {
        continue;
      };
      if !attribute.has_authored_value() {
        self.record(&name, PropertyStatus::Skipped(SkipReason::NotAuthored));
        continue;
      }

      let value = match attribute.get() {
        Ok(Some(value)) => value,
        Ok(None) => {
          self.record(&name, PropertyStatus::Skipped(SkipReason::NotAuthored));
          continue;
        }
        Err(err) => {
          self.record(&name, read_failure(err));
          continue;
        }
      };

      match value {
        Value::Asset(asset) => {
          let anchor = resolve_anchor_dir(attribute.property_stack());
          match self.rewrite(anchor.as_deref(), asset) {
            Ok(rewritten) => {
              self.author(&name, &attribute.type_name, Some(&Value::Asset(rewritten.clone())))?;
              self.record(&name, rewritten_status(asset, &rewritten));
            }
            Err(reason) => self.record(&name, PropertyStatus::Skipped(reason)),
          }
        }
        other => {
          self.author(&name, &attribute.type_name, Some(other))?;
          self.record(&name, PropertyStatus::Copied);
        }
      }
    }

    Ok(())
  }

  fn copy_inputs(&mut self) -> ExportResult<()> {
    let source_asset_anchor = self
      .source
      .attribute(self.source_shader, SOURCE_ASSET_PROPERTY)
      .and_then(|attribute| resolve_anchor_dir(attribute.property_stack()));

    for input in self.source.inputs(self.source_shader) {
      let name = input.property_name();
      let attribute = self.source.attribute(self.source_shader, &name);

      let (value, status) = match attribute.as_ref().map(Attribute::get) {
        None | Some(Ok(None)) => (None, PropertyStatus::Skipped(SkipReason::NotAuthored)),
        Some(Err(err)) => (None, read_failure(err)),
        Some(Ok(Some(Value::Asset(asset)))) => {
          let anchor = attribute
            .as_ref()
            .and_then(|attribute| resolve_anchor_dir(attribute.property_stack()))
            .or_else(|| source_asset_anchor.clone());
          match self.rewrite(anchor.as_deref(), asset) {
            Ok(rewritten) => {
              let status = rewritten_status(asset, &rewritten);
              (Some(Value::Asset(rewritten)), status)
            }
            Err(reason) => (None, PropertyStatus::Skipped(reason)),
          }
        }
        Some(Ok(Some(other))) => (Some(other.clone()), PropertyStatus::Copied),
      };

      self
        .destination
        .create_input(self.shader_path, &input.base_name, &input.type_name, value.as_ref())
        .map_err(|source| authoring_error(&format!("{}.{name}", self.shader_path), source))?;
      self.record(&name, status);
    }

    Ok(())
  }

  fn rewrite(
    &self,
    anchor: Option<&Path>,
    asset: &AssetReference,
  ) -> Result<AssetReference, SkipReason> {
    rewrite_asset_path(anchor, asset, self.path_mode, self.output_dir)
  }

  fn author(&mut self, name: &str, type_name: &str, value: Option<&Value>) -> ExportResult<()> {
    self
      .destination
      .create_attribute(self.shader_path, name, type_name, value)
      .map_err(|source| authoring_error(&format!("{}.{name}", self.shader_path), source))
  }

  fn record(&mut self, name: &str, status: PropertyStatus) {
    match &status {
      PropertyStatus::Skipped(reason) => {
        tracing::debug!(property = name, ?reason, "skipped property value")
      }
      PropertyStatus::Rewritten { from, to } => {
        tracing::debug!(property = name, from = %from, to = %to, "rewrote asset path")
      }
      PropertyStatus::Defaulted { value, cause } => {
        tracing::debug!(property = name, value = %value, ?cause, "authored fallback value")
      }
      PropertyStatus::Copied => tracing::debug!(property = name, "copied property"),
    }
    self.outcomes.push(PropertyOutcome {
      name: name.to_string(),
      status,
    });
  }
}

fn rewritten_status(original: &AssetReference, rewritten: &AssetReference) -> PropertyStatus {
  PropertyStatus::Rewritten {
    from: original
      .resolution_input()
      .unwrap_or(original.path.as_str())
      .to_string(),
    to: rewritten.path.clone(),
  }
}

fn read_failure(err: &EngineError) -> PropertyStatus {
  PropertyStatus::Skipped(SkipReason::PropertyReadFailure {
    message: err.to_string(),
  })
}
