//! On-disk layer format and the typed value codec.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as RawValue;
use tempfile::NamedTempFile;

use crate::engine::EngineError;
use crate::engine::usda::render_usda;
use crate::models::{AssetReference, Value};

/// One layer: optional sublayers, default prim, and prim specs keyed by absolute path.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFile {
  /// Weaker layers composed under this one, strongest first.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub sub_layers: Vec<String>,
  /// Name of the root prim treated as the document's default.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_prim: Option<String>,
  /// Prim specs authored in this layer.
  #[serde(default)]
  pub prims: BTreeMap<String, PrimRecord>,
}

/// Prim spec within a layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PrimRecord {
  /// Type name opinion, absent for pure overrides.
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub type_name: Option<String>,
  /// Property specs keyed by full property name.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub properties: BTreeMap<String, PropertyRecord>,
}

/// Property spec within a prim spec.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PropertyRecord {
  /// Declared value type name.
  #[serde(rename = "type")]
  pub type_name: String,
  /// Raw authored value, decoded lazily against `type_name`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<RawValue>,
  /// Connection target, `<node>.<property>`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub connect: Option<String>,
}

impl PropertyRecord {
  /// Declaration without a value or connection.
  pub fn declare(type_name: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      value: None,
      connect: None,
    }
  }
}

/// Serialisation chosen from a layer's file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFormat {
  /// `.json`
  Json,
  /// `.yaml` / `.yml`
  Yaml,
  /// `.usda`, write only.
  Usda,
}

impl LayerFormat {
  /// Detect the format of a layer path.
  pub fn from_path(path: &Path) -> Result<Self, EngineError> {
    let extension = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(str::to_ascii_lowercase);

    match extension.as_deref() {
      Some("json") => Ok(Self::Json),
      Some("yaml" | "yml") => Ok(Self::Yaml),
      Some("usda") => Ok(Self::Usda),
      _ => Err(EngineError::UnsupportedFormat {
        path: path.to_path_buf(),
      }),
    }
  }
}

impl LayerFile {
  /// Read and parse a layer file.
  pub fn load(path: &Path) -> Result<Self, EngineError> {
    let format = LayerFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| EngineError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let parse_error = |reason: String| EngineError::Parse {
      path: path.to_path_buf(),
      reason,
    };
    match format {
      LayerFormat::Json => serde_json::from_str(&content).map_err(|err| parse_error(err.to_string())),
      LayerFormat::Yaml => serde_yaml::from_str(&content).map_err(|err| parse_error(err.to_string())),
      LayerFormat::Usda => Err(EngineError::UnsupportedFormat {
        path: path.to_path_buf(),
      }),
    }
  }

  /// Serialise the layer in the given format.
  pub fn render(&self, format: LayerFormat) -> Result<String, EngineError> {
    match format {
      LayerFormat::Json => serde_json::to_string_pretty(self)
        .map(|mut text| {
          text.push('\n');
          text
        })
        .map_err(|err| EngineError::Serialize(err.to_string())),
      LayerFormat::Yaml => {
        serde_yaml::to_string(self).map_err(|err| EngineError::Serialize(err.to_string()))
      }
      LayerFormat::Usda => Ok(render_usda(self)),
    }
  }

  /// Write the layer to `path`, creating parent directories as needed.
  ///
  /// The text is staged in a temporary file in the target directory and renamed over
  /// `path`, so the target is either fully replaced or left as it was.
  pub fn write(&self, path: &Path) -> Result<PathBuf, EngineError> {
    let text = self.render(LayerFormat::from_path(path)?)?;
    let io_error = |source| EngineError::Io {
      path: path.to_path_buf(),
      source,
    };

    let dir = match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
      Some(parent) => {
        fs::create_dir_all(parent).map_err(io_error)?;
        parent
      }
      None => Path::new("."),
    };

    let mut staged = staging_file(dir).map_err(io_error)?;
    staged.write_all(text.as_bytes()).map_err(io_error)?;
    staged.as_file().sync_all().map_err(io_error)?;
    staged.persist(path).map_err(|err| io_error(err.error))?;
    Ok(path.to_path_buf())
  }
}

#[cfg(unix)]
fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
  use std::os::unix::fs::PermissionsExt;

  tempfile::Builder::new()
    .prefix(".mdl_export")
    .permissions(fs::Permissions::from_mode(0o644))
    .tempfile_in(dir)
}

#[cfg(not(unix))]
fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
  tempfile::Builder::new().prefix(".mdl_export").tempfile_in(dir)
}

fn tuple_type_pattern() -> &'static Regex {
  use std::sync::OnceLock;

  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"^(?:float|double|half|color|normal|point|vector|texCoord)([234])[fdh]?$")
      .expect("invalid tuple type regex")
  })
}

/// Number of components of a fixed-width numeric type such as `color3f`.
pub(crate) fn tuple_width(type_name: &str) -> Option<usize> {
  tuple_type_pattern()
    .captures(type_name)
    .and_then(|caps| caps.get(1))
    .and_then(|width| width.as_str().parse().ok())
}

/// Decode a raw value against its declared type name.
pub fn decode_value(type_name: &str, raw: &RawValue) -> Result<Value, EngineError> {
  let invalid = |reason: &str| EngineError::InvalidValue {
    type_name: type_name.to_string(),
    reason: reason.to_string(),
  };

  match type_name {
    "asset" => serde_json::from_value::<AssetReference>(match raw {
      RawValue::String(path) => serde_json::json!({ "path": path }),
      other => other.clone(),
    })
    .map(Value::Asset)
    .map_err(|err| invalid(&err.to_string())),
    "token" => raw
      .as_str()
      .map(|text| Value::Token(text.to_string()))
      .ok_or_else(|| invalid("expected a string")),
    "string" => raw
      .as_str()
      .map(|text| Value::String(text.to_string()))
      .ok_or_else(|| invalid("expected a string")),
    "bool" => raw
      .as_bool()
      .map(Value::Bool)
      .ok_or_else(|| invalid("expected a boolean")),
    "int" | "int64" | "uint" | "uint64" | "uchar" => raw
      .as_i64()
      .map(Value::Int)
      .ok_or_else(|| invalid("expected an integer")),
    "float" | "double" | "half" => raw
      .as_f64()
      .map(Value::Float)
      .ok_or_else(|| invalid("expected a number")),
    other => match tuple_width(other) {
      Some(width) => {
        let components = raw
          .as_array()
          .filter(|items| items.len() == width)
          .ok_or_else(|| invalid(&format!("expected {width} components")))?;
        components
          .iter()
          .map(|item| item.as_f64().ok_or_else(|| invalid("expected numeric components")))
          .collect::<Result<Vec<_>, _>>()
          .map(Value::Vector)
      }
      None => Ok(Value::Opaque(raw.clone())),
    },
  }
}

/// Encode a value for storage in a layer file.
pub fn encode_value(value: &Value) -> RawValue {
  match value {
    Value::Asset(asset) if asset.resolved_path.is_none() => RawValue::String(asset.path.clone()),
    Value::Asset(asset) => serde_json::to_value(asset).unwrap_or(RawValue::Null),
    Value::Token(text) | Value::String(text) => RawValue::String(text.clone()),
    Value::Bool(flag) => RawValue::Bool(*flag),
    Value::Int(number) => RawValue::from(*number),
    Value::Float(number) => RawValue::from(*number),
    Value::Vector(components) => {
      RawValue::Array(components.iter().map(|c| RawValue::from(*c)).collect())
    }
    Value::Opaque(raw) => raw.clone(),
  }
}
