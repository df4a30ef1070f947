//! Data structures shared by the anchor resolver, the path rewriter and the exporter.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identity of one layer contributing opinions to a composed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerIdentity {
  /// Logical identifier of the layer, usually the path it was opened with.
  pub identifier: String,
  /// Resolved absolute filesystem path, when the layer is file backed.
  pub real_path: Option<PathBuf>,
}

impl LayerIdentity {
  /// Identity for a file-backed layer.
  pub fn new(identifier: impl Into<String>, real_path: Option<PathBuf>) -> Self {
    Self {
      identifier: identifier.into(),
      real_path,
    }
  }
}

/// One layer's opinion about a property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
  /// Layer that holds the spec.
  pub layer: LayerIdentity,
  /// Whether this spec carries a value opinion (a spec may only declare the type).
  pub has_value: bool,
}

/// Ordered per-layer opinions about a single property, strongest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySpecStack {
  specs: Vec<PropertySpec>,
}

impl PropertySpecStack {
  /// Build a stack from specs already ordered strongest first.
  pub fn new(specs: Vec<PropertySpec>) -> Self {
    Self { specs }
  }

  /// Iterate strongest to weakest.
  pub fn iter(&self) -> impl Iterator<Item = &PropertySpec> {
    self.specs.iter()
  }

  /// Returns `true` when no layer holds an opinion.
  pub fn is_empty(&self) -> bool {
    self.specs.is_empty()
  }

  /// Number of contributing specs.
  pub fn len(&self) -> usize {
    self.specs.len()
  }
}

/// Asset-valued reference as authored on a property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
  /// Authored path, possibly relative to the layer that authored it.
  #[serde(default)]
  pub path: String,
  /// Absolute path pre-resolved by the engine; takes precedence over `path`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resolved_path: Option<String>,
}

impl AssetReference {
  /// Reference holding only an authored path.
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      resolved_path: None,
    }
  }

  /// The path that should feed resolution: `resolved_path` when present, else `path`.
  pub fn resolution_input(&self) -> Option<&str> {
    self
      .resolved_path
      .as_deref()
      .filter(|value| !value.is_empty())
      .or_else(|| Some(self.path.as_str()).filter(|value| !value.is_empty()))
  }
}

impl fmt::Display for AssetReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "@{}@", self.path)
  }
}

/// Property value as seen by the exporter.
///
/// Only [`Value::Asset`] receives path logic, every other variant is copied verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// Asset reference.
  Asset(AssetReference),
  /// Interned token string.
  Token(String),
  /// Free-form string.
  String(String),
  /// Boolean flag.
  Bool(bool),
  /// Integer scalar.
  Int(i64),
  /// Floating point scalar.
  Float(f64),
  /// Fixed-width numeric tuple such as a colour or a vector.
  Vector(Vec<f64>),
  /// Any value whose type the exporter does not interpret.
  Opaque(serde_json::Value),
}

impl Value {
  /// Borrow the asset reference when this value is one.
  pub fn as_asset(&self) -> Option<&AssetReference> {
    match self {
      Value::Asset(asset) => Some(asset),
      _ => None,
    }
  }
}

/// How asset references are written into the exported document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
  /// Relative to the output document's directory, forward-slash separated.
  #[default]
  Relative,
  /// Normalised absolute filesystem path.
  Absolute,
}

impl fmt::Display for PathMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PathMode::Relative => f.write_str("relative"),
      PathMode::Absolute => f.write_str("absolute"),
    }
  }
}

/// Reason a property was left out of the exported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SkipReason {
  /// The source property carries no authored value.
  NotAuthored,
  /// The asset reference has neither a resolved nor an authored path.
  EmptyAssetPath,
  /// The path is relative and no layer anchor could be found.
  AnchorUnresolvable {
    /// Relative path that could not be anchored.
    path: String,
  },
  /// The absolute path shares no root with the output directory.
  NotRelativizable {
    /// Absolute path that could not be expressed relatively.
    path: String,
  },
  /// Reading the value failed.
  PropertyReadFailure {
    /// Diagnostic reported by the engine.
    message: String,
  },
}

/// What happened to one source property during export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PropertyStatus {
  /// Value authored unchanged.
  Copied,
  /// Asset reference rewritten for the output location.
  Rewritten {
    /// Path as read from the source.
    from: String,
    /// Path authored in the output.
    to: String,
  },
  /// Source value unusable, a fallback value was authored instead.
  Defaulted {
    /// Value authored in the output.
    value: String,
    /// Why the source value was not used.
    cause: SkipReason,
  },
  /// Property declared without a value, or dropped entirely.
  Skipped(SkipReason),
}

/// Outcome for a single property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyOutcome {
  /// Full property name on the exported shader.
  pub name: String,
  /// Result of copying the property.
  #[serde(flatten)]
  pub status: PropertyStatus,
}

/// Summary of a completed export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
  /// Source material that was exported.
  pub source_material: String,
  /// Source shader node the network was read from.
  pub source_shader: String,
  /// Material created in the output document.
  pub material: String,
  /// Shader created in the output document.
  pub shader: String,
  /// Asset path mode used.
  pub path_mode: PathMode,
  /// Output document location.
  pub output: PathBuf,
  /// Per-property results in authoring order.
  pub properties: Vec<PropertyOutcome>,
}

impl ExportReport {
  /// Properties that were not authored with a value.
  pub fn skipped(&self) -> impl Iterator<Item = &PropertyOutcome> {
    self
      .properties
      .iter()
      .filter(|outcome| matches!(outcome.status, PropertyStatus::Skipped(_)))
  }

  /// Look up the outcome recorded for a property name.
  pub fn outcome(&self, name: &str) -> Option<&PropertyStatus> {
    self
      .properties
      .iter()
      .find(|outcome| outcome.name == name)
      .map(|outcome| &outcome.status)
  }
}

/// Directory portion of a path string, `None` when it has no parent component.
pub(crate) fn parent_dir(path: &Path) -> Option<PathBuf> {
  path
    .parent()
    .filter(|parent| !parent.as_os_str().is_empty())
    .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolved_path_takes_precedence() {
    let asset = AssetReference {
      path: "tex/a.png".into(),
      resolved_path: Some("/abs/tex/a.png".into()),
    };
    assert_eq!(asset.resolution_input(), Some("/abs/tex/a.png"));
  }

  #[test]
  fn empty_resolved_path_falls_back_to_authored_path() {
    let asset = AssetReference {
      path: "tex/a.png".into(),
      resolved_path: Some(String::new()),
    };
    assert_eq!(asset.resolution_input(), Some("tex/a.png"));
    assert_eq!(AssetReference::default().resolution_input(), None);
  }

  #[test]
  fn asset_reference_deserialises_camel_case() {
    let asset: AssetReference =
      serde_json::from_str(r#"{"path": "a.mdl", "resolvedPath": "/x/a.mdl"}"#).unwrap();
    assert_eq!(asset.resolved_path.as_deref(), Some("/x/a.mdl"));
  }

  #[test]
  fn report_lists_skipped_properties() {
    let report = ExportReport {
      source_material: "/World/Looks/A".into(),
      source_shader: "/World/Looks/A/mdlShader".into(),
      material: "/World/Looks/ExportedMat".into(),
      shader: "/World/Looks/ExportedMat/mdlShader".into(),
      path_mode: PathMode::Relative,
      output: PathBuf::from("/out/a.usda"),
      properties: vec![
        PropertyOutcome {
          name: "inputs:roughness".into(),
          status: PropertyStatus::Copied,
        },
        PropertyOutcome {
          name: "inputs:tex".into(),
          status: PropertyStatus::Skipped(SkipReason::AnchorUnresolvable {
            path: "tex.png".into(),
          }),
        },
      ],
    };

    let skipped: Vec<&str> = report.skipped().map(|o| o.name.as_str()).collect();
    assert_eq!(skipped, vec!["inputs:tex"]);
    assert_eq!(report.outcome("inputs:roughness"), Some(&PropertyStatus::Copied));
  }
}
