//! Human-readable USD text output for saved layers.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value as RawValue;

use crate::engine::layer_file::{LayerFile, PrimRecord, PropertyRecord, tuple_width};

const INDENT: &str = "    ";

#[derive(Default)]
struct PrimTree<'a> {
  record: Option<&'a PrimRecord>,
  children: BTreeMap<&'a str, PrimTree<'a>>,
}

/// Render a layer as `.usda` text.
///
/// Prims are nested by path; ancestors without a spec of their own are written as `over`.
/// Output is fully deterministic for a given layer.
pub fn render_usda(layer: &LayerFile) -> String {
  let mut root = PrimTree::default();
  for (path, record) in &layer.prims {
    let mut node = &mut root;
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
      node = node.children.entry(segment).or_default();
    }
    node.record = Some(record);
  }

  let mut out = String::from("#usda 1.0\n");
  let mut metadata = Vec::new();
  if let Some(default_prim) = &layer.default_prim {
    metadata.push(format!("defaultPrim = {}", quote(default_prim)));
  }
  if !layer.sub_layers.is_empty() {
    let entries: Vec<String> = layer
      .sub_layers
      .iter()
      .map(|sublayer| format!("@{sublayer}@"))
      .collect();
    metadata.push(format!("subLayers = [{}]", entries.join(", ")));
  }
  if !metadata.is_empty() {
    out.push_str("(\n");
    for line in metadata {
      let _ = writeln!(out, "{INDENT}{line}");
    }
    out.push_str(")\n");
  }

  for (name, child) in &root.children {
    out.push('\n');
    write_prim(&mut out, name, child, 0);
  }

  out
}

fn write_prim(out: &mut String, name: &str, tree: &PrimTree<'_>, depth: usize) {
  let pad = INDENT.repeat(depth);
  let header = match tree.record.and_then(|record| record.type_name.as_deref()) {
    Some(type_name) => format!("def {type_name} {}", quote(name)),
    None if tree.record.is_some() => format!("def {}", quote(name)),
    None => format!("over {}", quote(name)),
  };
  let _ = writeln!(out, "{pad}{header}");
  let _ = writeln!(out, "{pad}{{");

  let inner = INDENT.repeat(depth + 1);
  let properties = tree
    .record
    .map(|record| &record.properties)
    .into_iter()
    .flatten();
  let mut wrote_properties = false;
  for (property, record) in properties {
    for line in property_lines(property, record) {
      let _ = writeln!(out, "{inner}{line}");
    }
    wrote_properties = true;
  }

  for (index, (child_name, child)) in tree.children.iter().enumerate() {
    if wrote_properties || index > 0 {
      out.push('\n');
    }
    write_prim(out, child_name, child, depth + 1);
  }

  let _ = writeln!(out, "{pad}}}");
}

fn property_lines(name: &str, record: &PropertyRecord) -> Vec<String> {
  let variability = if name.starts_with("info:") {
    "uniform "
  } else {
    ""
  };
  let declaration = format!("{variability}{} {name}", record.type_name);

  let mut lines = Vec::new();
  match &record.value {
    Some(value) => lines.push(format!(
      "{declaration} = {}",
      format_value(&record.type_name, value)
    )),
    None if record.connect.is_none() => lines.push(declaration.clone()),
    None => {}
  }
  if let Some(target) = &record.connect {
    lines.push(format!("{declaration}.connect = <{target}>"));
  }
  lines
}

fn format_value(type_name: &str, value: &RawValue) -> String {
  let element_type = type_name.trim_end_matches("[]");
  if element_type != type_name {
    if let RawValue::Array(items) = value {
      let rendered: Vec<String> = items
        .iter()
        .map(|item| format_value(element_type, item))
        .collect();
      return format!("[{}]", rendered.join(", "));
    }
  }

  match value {
    RawValue::String(text) if element_type == "asset" => format!("@{text}@"),
    RawValue::Object(fields) if element_type == "asset" => {
      let path = fields.get("path").and_then(RawValue::as_str).unwrap_or_default();
      format!("@{path}@")
    }
    RawValue::String(text) => quote(text),
    RawValue::Bool(flag) => (if *flag { "1" } else { "0" }).to_string(),
    RawValue::Number(number) => format_number(number),
    RawValue::Array(items) if tuple_width(element_type).is_some() => {
      let rendered: Vec<String> = items
        .iter()
        .map(|item| format_value(element_type, item))
        .collect();
      format!("({})", rendered.join(", "))
    }
    RawValue::Array(items) => {
      let rendered: Vec<String> = items
        .iter()
        .map(|item| format_value(element_type, item))
        .collect();
      format!("[{}]", rendered.join(", "))
    }
    RawValue::Null => "None".to_string(),
    RawValue::Object(_) => quote(&value.to_string()),
  }
}

fn format_number(number: &serde_json::Number) -> String {
  match (number.as_i64(), number.as_f64()) {
    (Some(integer), _) => integer.to_string(),
    (None, Some(float)) => float.to_string(),
    (None, None) => number.to_string(),
  }
}

fn quote(text: &str) -> String {
  let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
  format!("\"{escaped}\"")
}
