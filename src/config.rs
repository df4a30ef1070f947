//! Export configuration describing the authored hierarchy and which properties travel.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::models::PathMode;

const DEFAULT_CONFIG_FILE: &str = "mdl_export.config.json";

/// Discoverable export configuration; every field has a default matching common MDL exports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Child name of the shader created under the exported material.
    pub shader_name: String,
    /// `info:id` authored when the source shader has none.
    pub default_shader_id: String,
    /// Render context whose surface output links material and shader.
    pub render_context: String,
    /// Output declared on the exported shader.
    pub surface_output_name: String,
    /// Value type of the shader output.
    pub surface_output_type: String,
    /// Root prim of the exported document; also its default prim.
    pub root_prim: String,
    /// Scope under the root prim holding the material.
    pub looks_scope: String,
    /// Name of the exported material prim.
    pub material_name: String,
    /// Property namespaces copied from the shader's implementation metadata.
    pub metadata_prefixes: Vec<String>,
    /// Individual implementation hint properties copied alongside the namespaces.
    pub implementation_hints: Vec<String>,
    /// Asset path mode used when the command line does not specify one.
    pub default_path_mode: PathMode,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            shader_name: "mdlShader".into(),
            default_shader_id: "mdlMaterial".into(),
            render_context: "mdl".into(),
            surface_output_name: "surface".into(),
            surface_output_type: "token".into(),
            root_prim: "World".into(),
            looks_scope: "Looks".into(),
            material_name: "ExportedMat".into(),
            metadata_prefixes: vec!["info:mdl:".into()],
            implementation_hints: vec![
                "info:implementationSource".into(),
                "info:sourceAsset".into(),
            ],
            default_path_mode: PathMode::Relative,
        }
    }
}

impl ExportConfig {
    /// Attempt to load configuration from the provided directory.
    ///
    /// A missing or malformed file falls back to the defaults.
    pub fn discover(dir: &Path) -> Self {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        Self::from_path(&candidate).unwrap_or_default()
    }

    /// Read configuration from a JSON or YAML file, chosen by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content).ok(),
            _ => serde_json::from_str(&content).ok(),
        }
    }

    /// Path of the root prim, e.g. `/World`.
    pub fn root_path(&self) -> String {
        format!("/{}", self.root_prim)
    }

    /// Path of the scope holding exported materials, e.g. `/World/Looks`.
    pub fn looks_path(&self) -> String {
        format!("{}/{}", self.root_path(), self.looks_scope)
    }

    /// Path of the exported material.
    pub fn material_path(&self) -> String {
        format!("{}/{}", self.looks_path(), self.material_name)
    }

    /// Path of the exported shader under the exported material.
    pub fn shader_path(&self) -> String {
        format!("{}/{}", self.material_path(), self.shader_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_build_the_standard_hierarchy() {
        let config = ExportConfig::default();
        assert_eq!(config.looks_path(), "/World/Looks");
        assert_eq!(config.shader_path(), "/World/Looks/ExportedMat/mdlShader");
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let temp = tempdir().expect("failed to create temp dir");
        let config = ExportConfig::discover(temp.path());
        assert_eq!(config.shader_name, "mdlShader");
        assert_eq!(config.default_path_mode, PathMode::Relative);
    }

    #[test]
    fn discover_reads_partial_json() {
        let temp = tempdir().expect("failed to create temp dir");
        fs::write(
            temp.path().join(DEFAULT_CONFIG_FILE),
            r#"{"material_name": "Hero", "default_path_mode": "absolute"}"#,
        )
        .expect("failed to write config");

        let config = ExportConfig::discover(temp.path());
        assert_eq!(config.material_path(), "/World/Looks/Hero");
        assert_eq!(config.default_path_mode, PathMode::Absolute);
        assert_eq!(config.render_context, "mdl");
    }

    #[test]
    fn from_path_reads_yaml() {
        let temp = tempdir().expect("failed to create temp dir");
        let path = temp.path().join("export.yaml");
        fs::write(&path, "shader_name: surfaceShader\nmetadata_prefixes: [\"info:osl:\"]\n")
            .expect("failed to write config");

        let config = ExportConfig::from_path(&path).expect("yaml config should parse");
        assert_eq!(config.shader_name, "surfaceShader");
        assert_eq!(config.metadata_prefixes, vec!["info:osl:".to_string()]);
    }
}
