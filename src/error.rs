//! Fatal export conditions and the exit codes they map to.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Result alias used by the exporter.
pub type ExportResult<T> = Result<T, ExportError>;

/// Conditions that abort an export.
///
/// Per-property problems never show up here; they are recorded in the
/// [`ExportReport`](crate::models::ExportReport) instead.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The source document could not be opened.
    #[error("cannot open {}", path.display())]
    OpenFailure {
        /// Source document path.
        path: PathBuf,
        /// Engine diagnostic.
        #[source]
        source: EngineError,
    },

    /// No node exists at the material path.
    #[error("invalid material prim path: {path}")]
    MaterialNotFound {
        /// Requested material path.
        path: String,
    },

    /// The node at the material path is not material-typed.
    #[error("prim {path} is not a Material (type: {found})")]
    NotAMaterial {
        /// Requested material path.
        path: String,
        /// Type name found on the node.
        found: String,
    },

    /// The explicitly requested shader node does not exist.
    #[error("invalid shader prim path: {path}")]
    ShaderNotFound {
        /// Requested shader path.
        path: String,
    },

    /// No explicit shader was given and the material has no connected surface source.
    #[error("cannot locate MDL shader for {material} (try --shader)")]
    ShaderNotLocatable {
        /// Material whose surface output was followed.
        material: String,
    },

    /// The destination document could not be created.
    #[error("cannot create output: {}", path.display())]
    OutputCreation {
        /// Destination path.
        path: PathBuf,
        /// Engine diagnostic.
        #[source]
        source: EngineError,
    },

    /// The destination is the source document itself.
    #[error("refusing to overwrite source document {}", path.display())]
    OverwritesSource {
        /// Destination path.
        path: PathBuf,
    },

    /// Authoring a node or property in the destination failed.
    #[error("failed to author {path}")]
    Authoring {
        /// Node or property path being authored.
        path: String,
        /// Engine diagnostic.
        #[source]
        source: EngineError,
    },

    /// The destination document could not be written.
    #[error("failed to save {}", path.display())]
    SaveFailure {
        /// Destination path.
        path: PathBuf,
        /// Engine diagnostic.
        #[source]
        source: EngineError,
    },
}

impl ExportError {
    /// Process exit code reported by the CLI for this condition.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::OpenFailure { .. } => 1,
            ExportError::MaterialNotFound { .. } => 2,
            ExportError::NotAMaterial { .. } => 3,
            ExportError::ShaderNotLocatable { .. } | ExportError::ShaderNotFound { .. } => 4,
            ExportError::OutputCreation { .. } | ExportError::OverwritesSource { .. } => 5,
            ExportError::Authoring { .. } => 6,
            ExportError::SaveFailure { .. } => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failures_map_to_exit_codes() {
        let codes = [
            ExportError::MaterialNotFound { path: "/A".into() }.exit_code(),
            ExportError::NotAMaterial {
                path: "/A".into(),
                found: "Xform".into(),
            }
            .exit_code(),
            ExportError::ShaderNotLocatable {
                material: "/A".into(),
            }
            .exit_code(),
            ExportError::ShaderNotFound { path: "/A/s".into() }.exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 4]);
    }

    #[test]
    fn diagnostics_name_the_failing_path() {
        let err = ExportError::MaterialNotFound {
            path: "/World/Looks/Missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid material prim path: /World/Looks/Missing"
        );
    }
}
