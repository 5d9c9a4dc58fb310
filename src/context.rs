//! Per-parse bookkeeping shared by the format parsers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use tracing::warn;

use crate::schema::{CommonSchema, Material};

/// Accumulator for diagnostics and shared assets during a single parse.
///
/// Parsers recover from element-level problems by recording them here and
/// continuing; the collected warnings and errors are attached to the parsed
/// schema's extensions so they survive serialization and reach the caller.
#[derive(Debug, Default)]
pub struct ParseContext {
    /// Path of the document being parsed, if it came from a file.
    pub source: Option<PathBuf>,
    /// Directory for resolving relative asset references.
    pub base_dir: Option<PathBuf>,
    /// Globally declared materials, by name.
    pub materials: BTreeMap<String, Material>,
    /// Mesh references encountered, name to resolved path.
    pub meshes: BTreeMap<String, String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ParseContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context rooted at a source file.
    #[must_use]
    pub fn for_file(path: &Path) -> Self {
        Self {
            source: Some(path.to_path_buf()),
            base_dir: path.parent().map(Path::to_path_buf),
            ..Self::default()
        }
    }

    /// Record a recoverable warning.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Record an element-level error. The parse continues; the element that
    /// produced the error is skipped.
    pub fn add_error(&mut self, element: &str, message: impl Into<String>) {
        let message = format!("{element}: {}", message.into());
        warn!("{message}");
        self.errors.push(message);
    }

    /// Warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Errors recorded so far.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Resolve a mesh reference against the base directory and remember it.
    ///
    /// Mesh files are never opened; the path is normalized for the exporter
    /// and recorded for diagnostics.
    pub fn resolve_mesh(&mut self, name: &str, filename: &str) -> String {
        let is_uri = filename.contains("://");
        let resolved = match &self.base_dir {
            Some(dir) if !filename.starts_with('/') && !is_uri => {
                dir.join(filename).to_string_lossy().into_owned()
            }
            _ => filename.to_string(),
        };
        if self.base_dir.is_some() && !is_uri && !Path::new(&resolved).exists() {
            self.add_warning(format!("mesh file not found: {resolved}"));
        }
        self.meshes.insert(name.to_string(), resolved.clone());
        resolved
    }

    /// Attach collected diagnostics and assets to a schema's extensions.
    pub fn attach(self, schema: &mut CommonSchema) {
        if !self.warnings.is_empty() {
            schema
                .extensions
                .insert("warnings".to_string(), serde_json::json!(self.warnings));
        }
        if !self.errors.is_empty() {
            schema
                .extensions
                .insert("errors".to_string(), serde_json::json!(self.errors));
        }
        if !self.meshes.is_empty() {
            schema
                .extensions
                .insert("meshes".to_string(), serde_json::json!(self.meshes));
        }
        if !self.materials.is_empty() {
            if let Ok(materials) = serde_json::to_value(&self.materials) {
                schema.extensions.insert("materials".to_string(), materials);
            }
        }
    }
}

/// Normalize a joint axis to unit length. A near-zero axis is replaced with
/// the Z default and warned about rather than poisoning downstream math.
pub(crate) fn normalize_axis(
    axis: Option<Vector3<f64>>,
    joint_name: &str,
    ctx: &mut ParseContext,
) -> Vector3<f64> {
    let Some(axis) = axis else {
        return Vector3::z();
    };
    let norm = axis.norm();
    if norm < 1e-9 {
        ctx.add_warning(format!(
            "joint '{joint_name}' has zero-length axis, using default (0 0 1)"
        ));
        return Vector3::z();
    }
    axis / norm
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::Metadata;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_axis() {
        let mut ctx = ParseContext::new();
        let axis = normalize_axis(Some(Vector3::new(0.0, 3.0, 4.0)), "j", &mut ctx);
        assert_relative_eq!(axis.y, 0.6, epsilon = 1e-10);
        assert_relative_eq!(axis.z, 0.8, epsilon = 1e-10);
        assert!(ctx.warnings().is_empty());

        let axis = normalize_axis(Some(Vector3::zeros()), "j", &mut ctx);
        assert_relative_eq!(axis.z, 1.0);
        assert_eq!(ctx.warnings().len(), 1);

        assert_relative_eq!(normalize_axis(None, "j", &mut ctx).z, 1.0);
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn test_diagnostics_attach() {
        let mut ctx = ParseContext::new();
        ctx.add_warning("negative mass on link 'base'");
        ctx.add_error("joint 'j1'", "unknown joint type 'bendy'");

        let mut schema = CommonSchema::new(Metadata::new("test"));
        ctx.attach(&mut schema);

        assert_eq!(schema.warnings(), vec!["negative mass on link 'base'"]);
        assert_eq!(schema.errors(), vec!["joint 'j1': unknown joint type 'bendy'"]);
    }

    #[test]
    fn test_empty_context_attaches_nothing() {
        let mut schema = CommonSchema::new(Metadata::new("test"));
        ParseContext::new().attach(&mut schema);
        assert!(schema.extensions.is_empty());
    }

    #[test]
    fn test_resolve_mesh_relative() {
        let mut ctx = ParseContext::for_file(Path::new("/models/robot.urdf"));
        let resolved = ctx.resolve_mesh("arm_mesh", "meshes/arm.stl");
        assert_eq!(resolved, "/models/meshes/arm.stl");
        assert_eq!(ctx.meshes["arm_mesh"], "/models/meshes/arm.stl");
    }

    #[test]
    fn test_resolve_mesh_absolute_and_uri() {
        let mut ctx = ParseContext::for_file(Path::new("/models/robot.urdf"));
        assert_eq!(ctx.resolve_mesh("a", "/abs/arm.stl"), "/abs/arm.stl");
        assert_eq!(
            ctx.resolve_mesh("b", "package://pkg/arm.stl"),
            "package://pkg/arm.stl"
        );
    }
}
